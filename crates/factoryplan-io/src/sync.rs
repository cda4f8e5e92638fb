//! Messages exchanged with the map-hosting sync peer.
//!
//! The peer speaks in map coordinates and hyphenated names. Internally every
//! coordinate is shifted by [`SYNC_OFFSET`] to stay non-negative and names use
//! underscores; the conversion happens here and nowhere else.

use serde::{Deserialize, Serialize};

use factoryplan_core::{CellCoord, Direction, Entity, EntityDescriptor, Position};

pub const SYNC_OFFSET: f64 = 2000.0;
/// Side of a map chunk, in cells.
pub const CHUNK_SIZE: i64 = 32;
/// Entity name the peer uses to announce a removal.
pub const DELETED: &str = "deleted";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum OutboundMessage {
    CreateEntity { entity: PeerEntity },
    DeleteEntity { entity: PeerPosition },
    GetChunk(ChunkCoord),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum InboundMessage {
    UpdateEntity { entities: Vec<PeerEntityUpdate> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerEntity {
    pub name: String,
    pub position: Position,
    #[serde(default)]
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerPosition {
    pub position: Position,
}

/// One entity as reported by the peer, in map coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerEntityUpdate {
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i64,
    pub y: i64,
}

impl ChunkCoord {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// The peer chunk holding an internal position.
    pub fn containing(position: Position) -> Self {
        let size = CHUNK_SIZE as f64;
        Self::new(
            ((position.x - SYNC_OFFSET) / size).floor() as i64,
            ((position.y - SYNC_OFFSET) / size).floor() as i64,
        )
    }

    pub fn offset(&self, dx: i64, dy: i64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

pub fn to_peer_name(name: &str) -> String {
    name.replace('_', "-")
}

pub fn from_peer_name(name: &str) -> String {
    name.replace('-', "_")
}

pub fn create_message(entity: &Entity) -> OutboundMessage {
    OutboundMessage::CreateEntity {
        entity: PeerEntity {
            name: to_peer_name(&entity.name),
            position: entity.position.translate(-SYNC_OFFSET, -SYNC_OFFSET),
            direction: entity.direction,
        },
    }
}

/// Deletions are addressed by the entity's grid cell.
pub fn delete_message(entity: &Entity) -> OutboundMessage {
    let cell = entity.position.cell();
    OutboundMessage::DeleteEntity {
        entity: PeerPosition {
            position: Position::new(cell.x as f64 - SYNC_OFFSET, cell.y as f64 - SYNC_OFFSET),
        },
    }
}

impl PeerEntityUpdate {
    pub fn is_deletion(&self) -> bool {
        self.name == DELETED
    }

    pub fn internal_position(&self) -> Position {
        Position::new(self.x + SYNC_OFFSET, self.y + SYNC_OFFSET)
    }

    pub fn internal_cell(&self) -> CellCoord {
        self.internal_position().cell()
    }

    pub fn to_descriptor(&self) -> EntityDescriptor {
        EntityDescriptor::new(&from_peer_name(&self.name), self.internal_position())
            .with_direction(self.direction)
    }
}
