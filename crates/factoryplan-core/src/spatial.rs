use std::collections::{BTreeSet, HashMap};

use crate::error::StoreError;
use crate::geometry::{CellCoord, CellRect};
use crate::ids::EntityId;
use crate::layer::{Layer, Occupant};

/// Cell occupancy index: every cell maps to the occupants claiming it.
///
/// Each occupant also remembers its own cells, so removal only touches the
/// cells it owned. No operation scans the whole grid.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SpatialIndex {
    cells: HashMap<CellCoord, Vec<Occupant>>,
    owned: HashMap<Occupant, Vec<CellCoord>>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `cells` for `occupant`.
    ///
    /// Fails with [`StoreError::Occupied`] if a different occupant on the same
    /// layer already holds one of the cells, unless `allow_stacking` is set.
    /// Nothing is modified on failure. Placing an occupant that is already
    /// indexed moves it.
    pub fn place(
        &mut self,
        occupant: Occupant,
        cells: &[CellCoord],
        allow_stacking: bool,
    ) -> Result<(), StoreError> {
        if !allow_stacking {
            if let Some((cell, by)) = self.first_conflict(occupant, cells) {
                return Err(StoreError::Occupied { cell, by });
            }
        }

        self.unplace(occupant);
        for cell in cells {
            let slot = self.cells.entry(*cell).or_default();
            if !slot.contains(&occupant) {
                slot.push(occupant);
            }
        }
        self.owned.insert(occupant, cells.to_vec());
        Ok(())
    }

    /// Release every cell owned by `occupant`. Returns whether it was indexed.
    pub fn unplace(&mut self, occupant: Occupant) -> bool {
        let Some(cells) = self.owned.remove(&occupant) else {
            return false;
        };
        for cell in cells {
            if let Some(slot) = self.cells.get_mut(&cell) {
                slot.retain(|o| *o != occupant);
                if slot.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        }
        true
    }

    /// The first cell (in the given order) claimed by another occupant on the same layer.
    pub fn first_conflict(&self, occupant: Occupant, cells: &[CellCoord]) -> Option<(CellCoord, Occupant)> {
        cells.iter().find_map(|cell| {
            self.query(cell)
                .iter()
                .find(|o| **o != occupant && o.layer() == occupant.layer())
                .map(|o| (*cell, *o))
        })
    }

    pub fn query(&self, cell: &CellCoord) -> &[Occupant] {
        self.cells.get(cell).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The entity occupying `cell`, if any.
    pub fn entity_at(&self, cell: &CellCoord) -> Option<EntityId> {
        self.query(cell).iter().find_map(Occupant::entity_id)
    }

    /// All occupants of cells between `top_left` and `bottom_right` inclusive,
    /// deduplicated and in a stable order.
    pub fn query_region(&self, top_left: CellCoord, bottom_right: CellCoord) -> Vec<Occupant> {
        if bottom_right.x < top_left.x || bottom_right.y < top_left.y {
            return Vec::new();
        }
        let rect = CellRect::new(
            top_left,
            (bottom_right.x - top_left.x + 1) as u32,
            (bottom_right.y - top_left.y + 1) as u32,
        );
        let found: BTreeSet<Occupant> = rect
            .cells()
            .flat_map(|cell| self.query(&cell).iter().copied())
            .collect();
        found.into_iter().collect()
    }

    /// Whether any cell of `rect` is held on `layer`.
    pub fn is_region_free(&self, rect: &CellRect, layer: Layer) -> bool {
        rect.cells()
            .all(|cell| self.query(&cell).iter().all(|o| o.layer() != layer))
    }

    pub fn cells_of(&self, occupant: Occupant) -> Option<&[CellCoord]> {
        self.owned.get(&occupant).map(Vec::as_slice)
    }

    /// Number of indexed occupants.
    pub fn len(&self) -> usize {
        self.owned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owned.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.owned.clear();
    }
}
