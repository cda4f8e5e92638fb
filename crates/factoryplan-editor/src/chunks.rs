use std::collections::BTreeMap;

use factoryplan_core::{Emit, EntityId, EntityStore, Position};
use factoryplan_io::sync::PeerEntityUpdate;
use factoryplan_io::ChunkCoord;

use crate::peer::{self, SharedPeer};

#[derive(Debug, Clone, Default)]
struct CachedChunk {
    data: Vec<PeerEntityUpdate>,
    /// Entities materialised from `data`; empty while unloaded.
    loaded: Vec<EntityId>,
    is_loaded: bool,
}

/// What one [`ChunkCache::refresh`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkRefresh {
    pub requested: usize,
    pub loaded: usize,
    pub evicted: usize,
}

/// Peer chunks around the viewpoint, cached by chunk coordinate.
///
/// A chunk's data is fetched once; leaving the window only removes its
/// entities from the store, and coming back re-creates them from the cache.
#[derive(Debug, Clone)]
pub struct ChunkCache {
    chunks: BTreeMap<ChunkCoord, CachedChunk>,
    span: i64,
    margin: i64,
}

impl ChunkCache {
    pub fn new(span: i64, margin: i64) -> Self {
        Self {
            chunks: BTreeMap::new(),
            span: span.max(1),
            margin: margin.max(0),
        }
    }

    pub fn is_cached(&self, chunk: ChunkCoord) -> bool {
        self.chunks.contains_key(&chunk)
    }

    pub fn is_loaded(&self, chunk: ChunkCoord) -> bool {
        self.chunks.get(&chunk).is_some_and(|c| c.is_loaded)
    }

    pub fn loaded_chunks(&self) -> Vec<ChunkCoord> {
        self.chunks
            .iter()
            .filter(|(_, c)| c.is_loaded)
            .map(|(coord, _)| *coord)
            .collect()
    }

    /// Forget every chunk without touching the store.
    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    pub fn refresh(
        &mut self,
        viewpoint: Position,
        store: &mut EntityStore,
        peer: Option<&SharedPeer>,
    ) -> ChunkRefresh {
        let base = ChunkCoord::containing(viewpoint);
        let mut refresh = ChunkRefresh::default();

        for dy in 0..self.span {
            for dx in 0..self.span {
                let coord = base.offset(dx, dy);
                if !self.chunks.contains_key(&coord) {
                    let Some(peer) = peer else {
                        continue;
                    };
                    refresh.requested += 1;
                    match peer::with_peer(peer, |p| p.request_chunk(coord)) {
                        Ok(data) => {
                            self.chunks.insert(
                                coord,
                                CachedChunk {
                                    data,
                                    ..CachedChunk::default()
                                },
                            );
                        }
                        Err(err) => {
                            log::warn!("chunk {coord:?} unavailable: {err}");
                            continue;
                        }
                    }
                }
                if let Some(chunk) = self.chunks.get_mut(&coord) {
                    if !chunk.is_loaded {
                        materialise(chunk, store);
                        refresh.loaded += 1;
                    }
                }
            }
        }

        let (low, high) = (-self.margin, self.span + self.margin);
        let outside = |c: &ChunkCoord| {
            let (rx, ry) = (c.x - base.x, c.y - base.y);
            rx < low || rx > high || ry < low || ry > high
        };
        for (coord, chunk) in self.chunks.iter_mut() {
            if chunk.is_loaded && outside(coord) {
                evict(chunk, store);
                refresh.evicted += 1;
            }
        }

        if refresh != ChunkRefresh::default() {
            log::debug!("chunks around {base:?}: {refresh:?}");
        }
        refresh
    }
}

fn materialise(chunk: &mut CachedChunk, store: &mut EntityStore) {
    let creations: Vec<&PeerEntityUpdate> = chunk.data.iter().filter(|e| !e.is_deletion()).collect();
    store.start_transaction("Loaded chunk");
    for (i, entity) in creations.iter().enumerate() {
        let emit = Emit {
            notify_peer: false,
            sort: i + 1 == creations.len(),
        };
        match store.create_entity(entity.to_descriptor(), emit) {
            Ok(id) => chunk.loaded.push(id),
            Err(err) => log::debug!("chunk entity '{}' skipped: {err}", entity.name),
        }
    }
    store.commit_transaction();
    chunk.is_loaded = true;
}

fn evict(chunk: &mut CachedChunk, store: &mut EntityStore) {
    store.start_transaction("Unloaded chunk");
    for id in chunk.loaded.drain(..) {
        // Already gone if the user deleted it.
        if store.entity(id).is_some() {
            if let Err(err) = store.remove_entity(id, false) {
                log::warn!("could not unload {id:?}: {err}");
            }
        }
    }
    store.commit_transaction();
    chunk.is_loaded = false;
}
