//! The map-hosting sync peer, as seen from the editor.
//!
//! Local state is authoritative: every failure talking to the peer is logged
//! and swallowed so it never blocks an edit.

use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};

use factoryplan_core::{LayoutEvent, LayoutObserver};
use factoryplan_io::sync::{self, PeerEntityUpdate};
use factoryplan_io::{ChunkCoord, InboundMessage, OutboundMessage};

use crate::error::SyncError;

pub trait SyncPeer: Send {
    /// Fire-and-forget delivery of one message.
    fn emit(&mut self, message: &OutboundMessage) -> Result<(), SyncError>;

    /// Ask for the contents of one chunk and wait for the reply.
    fn request_chunk(&mut self, chunk: ChunkCoord) -> Result<Vec<PeerEntityUpdate>, SyncError>;
}

pub type SharedPeer = Arc<Mutex<dyn SyncPeer>>;

pub(crate) fn with_peer<T>(
    peer: &SharedPeer,
    f: impl FnOnce(&mut dyn SyncPeer) -> Result<T, SyncError>,
) -> Result<T, SyncError> {
    let mut guard = peer
        .lock()
        .map_err(|_| SyncError::Unreachable("peer lock poisoned".to_string()))?;
    f(&mut *guard)
}

/// Store observer forwarding local creations and deletions to the peer.
pub struct PeerBridge {
    peer: SharedPeer,
}

impl PeerBridge {
    pub fn new(peer: SharedPeer) -> Self {
        Self { peer }
    }
}

impl LayoutObserver for PeerBridge {
    fn on_event(&mut self, event: &LayoutEvent) {
        let message = match event {
            LayoutEvent::EntityCreated {
                entity,
                notify_peer: true,
                ..
            } => sync::create_message(entity),
            LayoutEvent::EntityDestroyed {
                entity,
                notify_peer: true,
            } => sync::delete_message(entity),
            _ => return,
        };
        if let Err(err) = with_peer(&self.peer, |peer| peer.emit(&message)) {
            log::warn!("sync peer did not take {message:?}: {err}");
        }
    }
}

/// A peer reached over a line-delimited JSON stream, one message per line.
pub struct StreamPeer<R: BufRead, W: Write> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> StreamPeer<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }

    fn send(&mut self, message: &OutboundMessage) -> Result<(), SyncError> {
        let line =
            serde_json::to_string(message).map_err(|e| SyncError::Rejected(e.to_string()))?;
        writeln!(self.writer, "{line}").map_err(|e| SyncError::Unreachable(e.to_string()))?;
        self.writer
            .flush()
            .map_err(|e| SyncError::Unreachable(e.to_string()))
    }
}

impl<R, W> SyncPeer for StreamPeer<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn emit(&mut self, message: &OutboundMessage) -> Result<(), SyncError> {
        self.send(message)
    }

    fn request_chunk(&mut self, chunk: ChunkCoord) -> Result<Vec<PeerEntityUpdate>, SyncError> {
        self.send(&OutboundMessage::GetChunk(chunk))?;
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .map_err(|e| SyncError::Unreachable(e.to_string()))?;
        if read == 0 {
            return Err(SyncError::Unreachable("peer closed the stream".to_string()));
        }
        let message: InboundMessage =
            serde_json::from_str(line.trim()).map_err(|e| SyncError::Rejected(e.to_string()))?;
        let InboundMessage::UpdateEntity { entities } = message;
        Ok(entities)
    }
}
