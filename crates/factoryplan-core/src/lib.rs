//! # FactoryPlan Core
//!
//! Entity/tile store for grid-based factory layouts, with a cell occupancy
//! index and a transactional undo/redo history that every mutation flows
//! through.
//!
//! This crate is the heart of the FactoryPlan editor.

pub mod geometry;
pub mod prototypes;
pub mod ids;
pub mod entity;
pub mod layer;
pub mod error;
pub mod spatial;
pub mod collections;
pub mod history;
pub mod events;
pub mod store;
pub mod icons;

pub use store::{EntityStore, StoreChange, StoreSnapshot};
pub use entity::{Entity, EntityDescriptor, Tile};
pub use error::StoreError;
pub use events::{LayoutEvent, LayoutObserver};
pub use geometry::{BBox, CellCoord, CellRect, Direction, Position};
pub use history::{ChangeKind, ChangeRecord, Emit, History};
pub use ids::EntityId;
pub use layer::{Layer, Occupant};
pub use spatial::SpatialIndex;
