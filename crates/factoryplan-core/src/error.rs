use thiserror::Error;

use crate::geometry::CellCoord;
use crate::ids::EntityId;
use crate::layer::Occupant;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("'{0}' is a resource and cannot be placed")]
    NotPlaceable(String),

    #[error("Unknown prototype '{0}'")]
    UnknownPrototype(String),

    #[error("Cell {},{} is already occupied by {by}", cell.x, cell.y)]
    Occupied { cell: CellCoord, by: Occupant },

    #[error("Entity id {0} is already in use")]
    IdInUse(EntityId),

    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("Operation not allowed while a transaction is open")]
    TransactionOpen,
}
