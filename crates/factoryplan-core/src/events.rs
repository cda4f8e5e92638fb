use crate::entity::{Entity, Tile};

/// Notifications delivered after a transaction commits, or after undo/redo
/// replays one. The spatial index already reflects the change.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutEvent {
    EntityCreated {
        entity: Entity,
        /// Whether render order should be re-sorted after this insert.
        sort: bool,
        notify_peer: bool,
    },
    EntityDestroyed {
        entity: Entity,
        notify_peer: bool,
    },
    TileCreated {
        tile: Tile,
    },
    TileDestroyed {
        tile: Tile,
    },
}

/// Subscriber to store mutations (renderers, the sync-peer bridge, tests).
pub trait LayoutObserver: Send {
    fn on_event(&mut self, event: &LayoutEvent);
}
