use thiserror::Error;

use factoryplan_core::EntityId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeneratorError {
    #[error("Generation needs between 2 and 200 pumpjacks, found {0}")]
    InvalidSourceCount(usize),

    #[error("Layout contains {0} entities that are not pumpjacks")]
    ForeignEntities(usize),

    #[error("No pipe route reaches pumpjack {0}")]
    NoRoute(EntityId),

    #[error("{} entities cannot be powered", .0.len())]
    Unpowered(Vec<EntityId>),

    #[error("Power poles could not be joined into one network")]
    Disconnected,

    #[error("Generation was cancelled")]
    Cancelled,

    #[error("Generation worker exited without a result")]
    WorkerLost,
}
