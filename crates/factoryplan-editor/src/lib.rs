//! # FactoryPlan Editor
//!
//! The session object tying together the entity store, the layout
//! generators, blueprint import/export and the sync peer. Everything a user
//! action can do goes through [`Editor`]; the store is only ever mutated on
//! the thread that owns it.

pub mod chunks;
pub mod error;
pub mod peer;
pub mod settings;

pub use chunks::{ChunkCache, ChunkRefresh};
pub use error::{EditorError, SyncError};
pub use peer::{PeerBridge, SharedPeer, StreamPeer, SyncPeer};
pub use settings::EditorSettings;

use factoryplan_core::prototypes::PUMPJACK;
use factoryplan_core::{
    CellCoord, Direction, Emit, Entity, EntityDescriptor, EntityId, EntityStore, Position,
};
use factoryplan_generators::{
    plan_outpost, sources_from_store, spawn_outpost_generation, CancelToken, OutpostJob,
    OutpostPlan, OutpostRequest, OutpostStats,
};
use factoryplan_io::{BlueprintDocument, ImportReport, InboundMessage};

pub const OUTPOST_LABEL: &str = "Generated oil outpost";

pub struct Editor {
    store: EntityStore,
    settings: EditorSettings,
    peer: Option<SharedPeer>,
    chunks: ChunkCache,
}

impl Editor {
    pub fn new(settings: EditorSettings) -> Self {
        let store = EntityStore::new(&settings.label);
        Self::with_store(store, settings)
    }

    pub fn with_store(store: EntityStore, settings: EditorSettings) -> Self {
        let chunks = ChunkCache::new(settings.chunk_load_span, settings.chunk_keep_margin);
        Self {
            store,
            settings,
            peer: None,
            chunks,
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn chunks(&self) -> &ChunkCache {
        &self.chunks
    }

    /// Start mirroring local edits to `peer` and accepting its chunks.
    pub fn connect_peer(&mut self, peer: SharedPeer) {
        self.store.observe(Box::new(PeerBridge::new(peer.clone())));
        self.peer = Some(peer);
    }

    // ── Entity operations ────────────────────────────────────────────

    pub fn create_entity(&mut self, descriptor: EntityDescriptor) -> Result<EntityId, EditorError> {
        Ok(self.store.create_entity(descriptor, Emit::default())?)
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Result<Entity, EditorError> {
        Ok(self.store.remove_entity(id, true)?)
    }

    pub fn fast_replace_entity(
        &mut self,
        id: EntityId,
        name: &str,
        direction: Direction,
    ) -> Result<EntityId, EditorError> {
        Ok(self.store.fast_replace_entity(id, name, direction)?)
    }

    pub fn update_entity<F>(&mut self, id: EntityId, f: F) -> Result<(), EditorError>
    where
        F: FnOnce(&mut Entity),
    {
        Ok(self.store.update_entity(id, f)?)
    }

    pub fn connect(&mut self, a: EntityId, b: EntityId) -> Result<(), EditorError> {
        Ok(self.store.connect(a, b)?)
    }

    pub fn create_tiles(&mut self, name: &str, cells: &[CellCoord]) -> Result<usize, EditorError> {
        Ok(self.store.create_tiles(name, cells)?)
    }

    pub fn remove_tiles(&mut self, cells: &[CellCoord]) -> usize {
        self.store.remove_tiles(cells)
    }

    pub fn undo(&mut self) -> bool {
        self.store.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.store.redo()
    }

    // ── Blueprints ───────────────────────────────────────────────────

    /// Replace the session's layout with `document`.
    ///
    /// The store is rebuilt from scratch and the import is not undoable.
    /// Observers other than the peer bridge have to be attached again.
    pub fn load_blueprint(&mut self, document: &BlueprintDocument) -> Result<ImportReport, EditorError> {
        let mut store = EntityStore::new(&self.settings.label);
        if let Some(peer) = &self.peer {
            store.observe(Box::new(PeerBridge::new(peer.clone())));
        }
        let report = factoryplan_io::import(&mut store, document)?;
        self.store = store;
        self.chunks.clear();
        Ok(report)
    }

    pub fn export_blueprint(&self) -> BlueprintDocument {
        factoryplan_io::export(&self.store)
    }

    // ── Generation ───────────────────────────────────────────────────

    /// Plan and apply an oil outpost around the store's pumpjacks.
    ///
    /// Validation failures leave the store untouched.
    pub fn generate_outpost(&mut self) -> Result<OutpostStats, EditorError> {
        let sources = sources_from_store(&self.store)?;
        let plan = plan_outpost(&sources, &self.settings.outpost, &CancelToken::new())?;
        self.apply_outpost(&plan)
    }

    /// Plan an outpost on a worker thread; hand the result to
    /// [`Editor::apply_outpost`] once it arrives.
    pub fn spawn_generation(&self, cancel: CancelToken) -> Result<OutpostJob, EditorError> {
        let request = OutpostRequest {
            sources: sources_from_store(&self.store)?,
            settings: self.settings.outpost.clone(),
        };
        Ok(spawn_outpost_generation(request, cancel))
    }

    /// Apply a generated plan as a single undo step.
    pub fn apply_outpost(&mut self, plan: &OutpostPlan) -> Result<OutpostStats, EditorError> {
        self.store.transaction(OUTPOST_LABEL, |store| -> Result<(), EditorError> {
            for (id, direction) in &plan.rotations {
                store.update_entity(*id, |e| e.direction = *direction)?;
            }
            if !plan.source_modules.is_empty() {
                let sources: Vec<EntityId> = store
                    .filter_entities(|e| e.name == PUMPJACK)
                    .iter()
                    .map(|e| e.id)
                    .collect();
                for id in sources {
                    store.update_entity(id, |e| e.modules = plan.source_modules.clone())?;
                }
            }
            for pipe in &plan.pipes {
                store.create_entity(pipe.clone(), Emit::default())?;
            }
            for beacon in &plan.beacons {
                store.create_entity(beacon.clone(), Emit::default())?;
            }
            let mut poles = Vec::with_capacity(plan.poles.len());
            for pole in &plan.poles {
                poles.push(store.create_entity(pole.clone(), Emit::default())?);
            }
            for (a, b) in &plan.wires {
                store.connect(poles[*a], poles[*b])?;
            }
            Ok(())
        })?;
        Ok(plan.stats)
    }

    // ── Sync peer ────────────────────────────────────────────────────

    /// Apply an inbound peer message. Nothing is echoed back.
    pub fn handle_inbound(&mut self, message: InboundMessage) {
        let InboundMessage::UpdateEntity { entities } = message;
        let count = entities.len();
        for (i, update) in entities.into_iter().enumerate() {
            if update.is_deletion() {
                let cell = update.internal_cell();
                let Some(id) = self.store.entity_at(cell).map(|e| e.id) else {
                    log::debug!("peer deleted empty cell {cell:?}");
                    continue;
                };
                if let Err(err) = self.store.remove_entity(id, false) {
                    log::warn!("peer deletion at {cell:?} failed: {err}");
                }
            } else {
                let emit = Emit {
                    notify_peer: false,
                    sort: i + 1 == count,
                };
                if let Err(err) = self.store.create_entity(update.to_descriptor(), emit) {
                    log::warn!("peer entity '{}' not created: {err}", update.name);
                }
            }
        }
    }

    /// Load and evict peer chunks around `viewpoint`.
    pub fn refresh_chunks(&mut self, viewpoint: Position) -> ChunkRefresh {
        self.chunks
            .refresh(viewpoint, &mut self.store, self.peer.as_ref())
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorSettings::default())
    }
}
