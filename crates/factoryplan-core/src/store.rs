use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use uuid::Uuid;

use crate::collections::{filter_all, find_first};
use crate::entity::{Entity, EntityDescriptor, Tile};
use crate::error::StoreError;
use crate::events::{LayoutEvent, LayoutObserver};
use crate::geometry::{BBox, CellCoord, Direction, Position};
use crate::history::{update_map, ChangeRecord, Commit, Emit, History};
use crate::ids::{self, EntityId};
use crate::layer::Occupant;
use crate::prototypes;
use crate::spatial::SpatialIndex;

pub type EntityChange = ChangeRecord<EntityId, Entity>;
pub type TileChange = ChangeRecord<CellCoord, Tile>;

/// A change record against one of the store's collections.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreChange {
    Entity(EntityChange),
    Tile(TileChange),
}

impl StoreChange {
    pub fn inverse(&self) -> Self {
        match self {
            StoreChange::Entity(c) => StoreChange::Entity(c.inverse()),
            StoreChange::Tile(c) => StoreChange::Tile(c.inverse()),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            StoreChange::Entity(c) => &c.description,
            StoreChange::Tile(c) => &c.description,
        }
    }
}

/// Everything observable about the store's contents, for comparisons.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    pub entities: BTreeMap<EntityId, Entity>,
    pub tiles: BTreeMap<CellCoord, Tile>,
    pub index: SpatialIndex,
}

/// The canonical set of entities and tiles.
///
/// Bundles the spatial index and the history: every mutation goes through a
/// transaction, and the store is the only writer of the index.
pub struct EntityStore {
    /// Session identifier, for log correlation.
    pub id: Uuid,
    pub label: String,
    pub icons: Vec<String>,
    entities: BTreeMap<EntityId, Entity>,
    tiles: BTreeMap<CellCoord, Tile>,
    index: SpatialIndex,
    history: History<StoreChange>,
    observers: Vec<Box<dyn LayoutObserver>>,
    next_entity_number: u128,
    rng: StdRng,
}

impl EntityStore {
    pub fn new(label: &str) -> Self {
        Self::with_rng(label, StdRng::from_entropy())
    }

    /// A store whose identifier suffixes are reproducible.
    pub fn with_seed(label: &str, seed: u64) -> Self {
        Self::with_rng(label, StdRng::seed_from_u64(seed))
    }

    fn with_rng(label: &str, rng: StdRng) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.to_string(),
            icons: Vec::new(),
            entities: BTreeMap::new(),
            tiles: BTreeMap::new(),
            index: SpatialIndex::new(),
            history: History::new(),
            observers: Vec::new(),
            next_entity_number: 1,
            rng,
        }
    }

    pub fn observe(&mut self, observer: Box<dyn LayoutObserver>) {
        self.observers.push(observer);
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn tile(&self, cell: CellCoord) -> Option<&Tile> {
        self.tiles.get(&cell)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.tiles.is_empty()
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn entity_at(&self, cell: CellCoord) -> Option<&Entity> {
        self.index.entity_at(&cell).and_then(|id| self.entities.get(&id))
    }

    pub fn find_entity<P>(&self, mut predicate: P) -> Option<&Entity>
    where
        P: FnMut(&Entity) -> bool,
    {
        find_first(&self.entities, |_, e| predicate(e))
    }

    pub fn filter_entities<P>(&self, mut predicate: P) -> Vec<&Entity>
    where
        P: FnMut(&Entity) -> bool,
    {
        filter_all(&self.entities, |_, e| predicate(e))
    }

    pub fn first_rail(&self) -> Option<&Entity> {
        self.find_entity(|e| e.name == prototypes::STRAIGHT_RAIL)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            entities: self.entities.clone(),
            tiles: self.tiles.clone(),
            index: self.index.clone(),
        }
    }

    /// Whether every entity and tile is indexed at exactly its footprint cells.
    pub fn index_is_consistent(&self) -> bool {
        if self.index.len() != self.entities.len() + self.tiles.len() {
            return false;
        }
        let entities_ok = self.entities.values().all(|e| {
            let occupant = Occupant::Entity(e.id);
            let cells = e.cells();
            self.index.cells_of(occupant) == Some(cells.as_slice())
                && cells.iter().all(|c| self.index.query(c).contains(&occupant))
        });
        let tiles_ok = self.tiles.keys().all(|cell| {
            let occupant = Occupant::Tile(*cell);
            self.index.cells_of(occupant) == Some(std::slice::from_ref(cell))
        });
        entities_ok && tiles_ok
    }

    // ── Transactions ─────────────────────────────────────────────────

    pub fn start_transaction(&mut self, label: &str) {
        self.history.start_transaction(Some(label));
    }

    /// Commit the innermost transaction; observers hear about the changes
    /// only when the outermost one commits.
    pub fn commit_transaction(&mut self) {
        if let Commit::Committed(transaction) = self.history.commit_transaction() {
            log::debug!(
                "[{}] committed '{}' ({} changes)",
                self.id,
                transaction.label.as_deref().unwrap_or_default(),
                transaction.changes.len()
            );
            for change in &transaction.changes {
                dispatch(&mut self.observers, change);
            }
        }
    }

    /// Revert everything staged since the matching start. Observers are not told.
    pub fn abort_transaction(&mut self) {
        let staged = self.history.abort_transaction();
        for change in staged.iter().rev() {
            self.replay(&change.inverse());
        }
        log::debug!("[{}] aborted transaction, reverted {} changes", self.id, staged.len());
    }

    /// Run `f` inside a transaction, committing on `Ok` and rolling back on `Err`.
    pub fn transaction<T, E, F>(&mut self, label: &str, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        self.start_transaction(label);
        match f(self) {
            Ok(value) => {
                self.commit_transaction();
                Ok(value)
            }
            Err(err) => {
                self.abort_transaction();
                Err(err)
            }
        }
    }

    pub fn is_in_transaction(&self) -> bool {
        self.history.is_in_transaction()
    }

    // ── Undo / Redo ──────────────────────────────────────────────────

    pub fn undo(&mut self) -> bool {
        let Some(transaction) = self.history.undo() else {
            return false;
        };
        let inverses: Vec<StoreChange> = transaction
            .changes
            .iter()
            .rev()
            .map(StoreChange::inverse)
            .collect();
        self.replay_all(&inverses);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(transaction) = self.history.redo() else {
            return false;
        };
        let changes = transaction.changes.clone();
        self.replay_all(&changes);
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.history.undo_label()
    }

    /// Forget all undo/redo steps, e.g. after an import.
    pub fn reset_history(&mut self) -> Result<(), StoreError> {
        if self.history.is_in_transaction() {
            return Err(StoreError::TransactionOpen);
        }
        self.history.clear();
        Ok(())
    }

    fn replay_all(&mut self, changes: &[StoreChange]) {
        for change in changes {
            self.replay(change);
        }
        for change in changes {
            dispatch(&mut self.observers, change);
        }
    }

    /// Force the collections and the index to a change's `new` side.
    fn replay(&mut self, change: &StoreChange) {
        match change {
            StoreChange::Entity(c) => {
                let occupant = Occupant::Entity(c.key);
                match &c.new {
                    Some(entity) => {
                        let cells = entity.cells();
                        if let Err(err) = self.index.place(occupant, &cells, false) {
                            log::error!("replay of '{}' overlaps: {}", c.description, err);
                            let _ = self.index.place(occupant, &cells, true);
                        }
                        self.entities.insert(c.key, entity.clone());
                    }
                    None => {
                        self.index.unplace(occupant);
                        self.entities.remove(&c.key);
                    }
                }
            }
            StoreChange::Tile(c) => {
                let occupant = Occupant::Tile(c.key);
                match &c.new {
                    Some(tile) => {
                        let _ = self.index.place(occupant, &[c.key], true);
                        self.tiles.insert(c.key, tile.clone());
                    }
                    None => {
                        self.index.unplace(occupant);
                        self.tiles.remove(&c.key);
                    }
                }
            }
        }
    }

    // ── Entities ─────────────────────────────────────────────────────

    /// Create an entity from `descriptor`.
    ///
    /// Resource names are refused with [`StoreError::NotPlaceable`] and an
    /// occupied footprint with [`StoreError::Occupied`]; neither mutates
    /// anything.
    pub fn create_entity(
        &mut self,
        descriptor: EntityDescriptor,
        emit: Emit,
    ) -> Result<EntityId, StoreError> {
        check_prototype(&descriptor.name)?;
        let id = self.allocate_id(&descriptor)?;
        let entity = Entity::from_descriptor(id, descriptor);
        let description = format!("Added entity: {}", entity.name);

        self.index
            .place(Occupant::Entity(id), &entity.cells(), false)?;

        self.start_transaction(&description);
        let record = update_map(&mut self.entities, id, Some(entity), &description).emit(emit);
        self.history.stage(StoreChange::Entity(record));
        self.commit_transaction();
        Ok(id)
    }

    /// Delete an entity, first severing the connections its neighbours hold to it.
    pub fn remove_entity(&mut self, id: EntityId, notify_peer: bool) -> Result<Entity, StoreError> {
        let entity = self
            .entities
            .get(&id)
            .cloned()
            .ok_or(StoreError::EntityNotFound(id))?;
        let description = format!("Deleted entity: {}", entity.name);
        log::debug!("{description}, notify peer: {notify_peer}");

        self.transaction(&description, |store| -> Result<(), StoreError> {
            for neighbour in &entity.connections {
                if store.entities.contains_key(neighbour) {
                    store.modify(*neighbour, "Removed connection", |n| {
                        n.connections.retain(|c| *c != id)
                    })?;
                }
            }
            store.index.unplace(Occupant::Entity(id));
            let emit = Emit {
                notify_peer,
                sort: false,
            };
            let record = update_map(&mut store.entities, id, None, &description).emit(emit);
            store.history.stage(StoreChange::Entity(record));
            Ok(())
        })?;
        Ok(entity)
    }

    /// Replace an entity with another type/direction in one undo step,
    /// carrying over modules and recipe. Wire connections are not preserved.
    pub fn fast_replace_entity(
        &mut self,
        id: EntityId,
        name: &str,
        direction: Direction,
    ) -> Result<EntityId, StoreError> {
        let old = self
            .entities
            .get(&id)
            .cloned()
            .ok_or(StoreError::EntityNotFound(id))?;
        let label = format!("Fast replaced entity: {}", old.name);

        self.transaction(&label, |store| {
            store.remove_entity(id, true)?;
            let descriptor = EntityDescriptor::new(name, old.position).with_direction(direction);
            let new_id = store.create_entity(descriptor, Emit::default())?;
            store.update_entity(new_id, |e| e.paste_settings(&old))?;
            Ok(new_id)
        })
    }

    /// Apply `f` to a copy of the entity and record the difference.
    ///
    /// Observers are told (as destroy + create) when the name, position or
    /// direction changed; setting changes are recorded silently.
    pub fn update_entity<F>(&mut self, id: EntityId, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Entity),
    {
        self.start_transaction("Updated entity");
        let result = self.modify(id, "Updated entity", f);
        match result {
            Ok(()) => self.commit_transaction(),
            Err(_) => self.abort_transaction(),
        }
        result
    }

    /// Record a symmetric wire connection between two entities.
    pub fn connect(&mut self, a: EntityId, b: EntityId) -> Result<(), StoreError> {
        if a == b {
            return Ok(());
        }
        for id in [a, b] {
            if !self.entities.contains_key(&id) {
                return Err(StoreError::EntityNotFound(id));
            }
        }
        self.transaction("Connected entities", |store| {
            store.modify(a, "Added connection", |e| {
                if !e.connections.contains(&b) {
                    e.connections.push(b);
                }
            })?;
            store.modify(b, "Added connection", |e| {
                if !e.connections.contains(&a) {
                    e.connections.push(a);
                }
            })
        })
    }

    /// Stage an update inside the open transaction.
    fn modify<F>(&mut self, id: EntityId, description: &str, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Entity),
    {
        let old = self
            .entities
            .get(&id)
            .ok_or(StoreError::EntityNotFound(id))?;
        let mut new = old.clone();
        f(&mut new);
        new.id = id;
        if new == *old {
            return Ok(());
        }
        if new.name != old.name {
            check_prototype(&new.name)?;
        }
        let visible = new.name != old.name
            || new.position != old.position
            || new.direction != old.direction;
        let (old_cells, new_cells) = (old.cells(), new.cells());

        if old_cells != new_cells {
            self.index.place(Occupant::Entity(id), &new_cells, false)?;
        }
        let mut record = update_map(&mut self.entities, id, Some(new), description);
        if visible {
            record = record.emit(Emit::default());
        }
        self.history.stage(StoreChange::Entity(record));
        Ok(())
    }

    fn allocate_id(&mut self, descriptor: &EntityDescriptor) -> Result<EntityId, StoreError> {
        if let Some(id) = descriptor.id {
            if self.entities.contains_key(&id) {
                return Err(StoreError::IdInUse(id));
            }
            return Ok(id);
        }
        if let Some(id) = ids::encode(descriptor.position, &mut self.rng) {
            if !self.entities.contains_key(&id) {
                return Ok(id);
            }
        }
        loop {
            let id = EntityId(self.next_entity_number);
            self.next_entity_number += 1;
            if !self.entities.contains_key(&id) {
                return Ok(id);
            }
        }
    }

    // ── Tiles ────────────────────────────────────────────────────────

    /// Cover `cells` with tile `name`, replacing differently-named tiles.
    /// Returns the number of cells that changed.
    pub fn create_tiles(&mut self, name: &str, cells: &[CellCoord]) -> Result<usize, StoreError> {
        if prototypes::tile(name).is_none() {
            return Err(StoreError::UnknownPrototype(name.to_string()));
        }
        let description = format!("Added tiles: {name}");
        self.transaction(&description, |store| {
            let mut changed = 0;
            for cell in cells {
                let existing = store.tiles.get(cell).map(|t| t.name.clone());
                if existing.as_deref() == Some(name) {
                    continue;
                }
                if existing.is_some() {
                    store.stage_tile(*cell, None, &description)?;
                }
                store.stage_tile(*cell, Some(Tile::new(name, *cell)), &description)?;
                changed += 1;
            }
            Ok(changed)
        })
    }

    pub fn remove_tiles(&mut self, cells: &[CellCoord]) -> usize {
        let removed: Result<usize, StoreError> = self.transaction("Deleted tiles", |store| {
            let mut removed = 0;
            for cell in cells {
                if store.tiles.contains_key(cell) {
                    store.stage_tile(*cell, None, "Deleted tiles")?;
                    removed += 1;
                }
            }
            Ok(removed)
        });
        removed.unwrap_or(0)
    }

    fn stage_tile(
        &mut self,
        cell: CellCoord,
        tile: Option<Tile>,
        description: &str,
    ) -> Result<(), StoreError> {
        let occupant = Occupant::Tile(cell);
        match tile {
            Some(_) => self.index.place(occupant, &[cell], false)?,
            None => {
                self.index.unplace(occupant);
            }
        }
        let record = update_map(&mut self.tiles, cell, tile, description).emit(Emit::default());
        self.history.stage(StoreChange::Tile(record));
        Ok(())
    }

    // ── Bounds ───────────────────────────────────────────────────────

    fn bboxes(&self) -> impl Iterator<Item = BBox> + '_ {
        self.entities
            .values()
            .map(Entity::bbox)
            .chain(self.tiles.values().map(Tile::bbox))
    }

    /// Bounding box over every entity and tile footprint; `None` when empty.
    pub fn bounds(&self) -> Option<BBox> {
        self.bboxes().reduce(|a, b| a.union(&b))
    }

    pub fn top_left(&self) -> Position {
        self.bounds().map(|b| b.min).unwrap_or(Position::new(0.0, 0.0))
    }

    pub fn top_right(&self) -> Position {
        self.bounds()
            .map(|b| Position::new(b.max.x, b.min.y))
            .unwrap_or(Position::new(0.0, 0.0))
    }

    pub fn bottom_left(&self) -> Position {
        self.bounds()
            .map(|b| Position::new(b.min.x, b.max.y))
            .unwrap_or(Position::new(0.0, 0.0))
    }

    pub fn bottom_right(&self) -> Position {
        self.bounds().map(|b| b.max).unwrap_or(Position::new(0.0, 0.0))
    }

    /// Centre of the bounds, snapped to the middle of a cell.
    pub fn center(&self) -> Position {
        if self.is_empty() {
            return Position::new(0.0, 0.0);
        }
        let (tl, tr, bl) = (self.top_left(), self.top_right(), self.bottom_left());
        Position::new(
            ((tl.x + tr.x) / 2.0).floor() + 0.5,
            ((tl.y + bl.y) / 2.0).floor() + 0.5,
        )
    }
}

/// Resources are refused before unknown names.
fn check_prototype(name: &str) -> Result<(), StoreError> {
    if !prototypes::is_placeable(name) {
        return Err(StoreError::NotPlaceable(name.to_string()));
    }
    if prototypes::entity(name).is_none() {
        return Err(StoreError::UnknownPrototype(name.to_string()));
    }
    Ok(())
}

fn dispatch(observers: &mut [Box<dyn LayoutObserver>], change: &StoreChange) {
    for event in events_for(change) {
        for observer in observers.iter_mut() {
            observer.on_event(&event);
        }
    }
}

fn events_for(change: &StoreChange) -> Vec<LayoutEvent> {
    let mut events = Vec::new();
    match change {
        StoreChange::Entity(c) => {
            let Some(emit) = c.emit else {
                return events;
            };
            if let Some(old) = &c.old {
                events.push(LayoutEvent::EntityDestroyed {
                    entity: old.clone(),
                    notify_peer: emit.notify_peer,
                });
            }
            if let Some(new) = &c.new {
                events.push(LayoutEvent::EntityCreated {
                    entity: new.clone(),
                    sort: emit.sort,
                    notify_peer: emit.notify_peer,
                });
            }
        }
        StoreChange::Tile(c) => {
            if c.emit.is_none() {
                return events;
            }
            if let Some(old) = &c.old {
                events.push(LayoutEvent::TileDestroyed { tile: old.clone() });
            }
            if let Some(new) = &c.new {
                events.push(LayoutEvent::TileCreated { tile: new.clone() });
            }
        }
    }
    events
}
