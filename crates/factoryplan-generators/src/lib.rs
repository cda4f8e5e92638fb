//! # FactoryPlan Generators
//!
//! Procedural layout generation for oil outposts: a pipe network joining
//! the pumpjacks, beacons around them and a connected power-pole network.
//!
//! Generators are pure functions over copied footprints. They return entity
//! descriptors and never touch the store; the caller applies the result in
//! one transaction.

pub mod error;
pub mod cancel;
pub mod grid;
pub mod pipes;
pub mod beacons;
pub mod poles;
pub mod outpost;
pub mod worker;

pub use error::GeneratorError;
pub use cancel::CancelToken;
pub use grid::{Footprint, Source};
pub use pipes::{PipeRoute, PipeRouter, PipeStats};
pub use beacons::{BeaconPlacement, BeaconPlacer};
pub use poles::{PolePlacement, PolePlacer};
pub use outpost::{plan_outpost, sources_from_store, OutpostPlan, OutpostSettings, OutpostStats};
pub use worker::{spawn_outpost_generation, OutpostJob, OutpostRequest};
