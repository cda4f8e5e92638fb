//! # FactoryPlan I/O
//!
//! The blueprint document the editor exports and imports, and the JSON
//! messages exchanged with the map-hosting sync peer.

pub mod error;
pub mod blueprint;
pub mod sync;

pub use error::IoError;
pub use blueprint::{
    export, import, BlueprintDocument, BlueprintEnvelope, BlueprintReader, BlueprintWriter,
    ImportReport,
};
pub use sync::{ChunkCoord, InboundMessage, OutboundMessage, PeerEntity};
