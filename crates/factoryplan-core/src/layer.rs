use serde::{Deserialize, Serialize};

use crate::geometry::CellCoord;
use crate::ids::EntityId;

/// Occupancy layer. Occupants on different layers may share a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Layer {
    Tile,
    Entity,
}

/// Something that claims grid cells in the spatial index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Occupant {
    Entity(EntityId),
    Tile(CellCoord),
}

impl Occupant {
    pub fn layer(&self) -> Layer {
        match self {
            Occupant::Entity(_) => Layer::Entity,
            Occupant::Tile(_) => Layer::Tile,
        }
    }

    pub fn entity_id(&self) -> Option<EntityId> {
        match self {
            Occupant::Entity(id) => Some(*id),
            Occupant::Tile(_) => None,
        }
    }
}

impl std::fmt::Display for Occupant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Occupant::Entity(id) => write!(f, "entity {id}"),
            Occupant::Tile(cell) => write!(f, "tile at {},{}", cell.x, cell.y),
        }
    }
}
