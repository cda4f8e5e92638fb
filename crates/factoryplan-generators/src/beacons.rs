use std::cmp::Reverse;

use factoryplan_core::prototypes::BEACON;
use factoryplan_core::{CellRect, EntityDescriptor};

use crate::cancel::CancelToken;
use crate::error::GeneratorError;
use crate::grid::{self, Blocked, FootprintTree};

const BEACON_SIZE: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct BeaconPlacement {
    pub beacons: Vec<EntityDescriptor>,
    /// For each beacon, the indices of the affectable footprints it reaches.
    pub affected: Vec<Vec<usize>>,
}

impl BeaconPlacement {
    /// Total beacon-to-entity effects handed out.
    pub fn effects(&self) -> usize {
        self.affected.iter().map(Vec::len).sum()
    }

    pub fn footprints(&self) -> Vec<CellRect> {
        self.beacons
            .iter()
            .map(|b| CellRect::centered(b.position, BEACON_SIZE, BEACON_SIZE))
            .collect()
    }
}

/// Greedy beacon cover.
///
/// Every free 3×3 spot is scored by how many affectable footprints its
/// effect area touches. Spots under the threshold are dropped, the rest are
/// taken best-first (ties in scan order) while they do not overlap anything
/// already placed. This is a heuristic, not an optimal cover.
pub struct BeaconPlacer {
    pub min_affected: usize,
    pub module: Option<String>,
}

impl BeaconPlacer {
    pub fn new(min_affected: usize, module: Option<String>) -> Self {
        Self {
            min_affected: min_affected.max(1),
            module,
        }
    }

    pub fn place(
        &self,
        affectable: &[CellRect],
        obstacles: &[CellRect],
        cancel: &CancelToken,
    ) -> Result<BeaconPlacement, GeneratorError> {
        let mut placement = BeaconPlacement {
            beacons: Vec::new(),
            affected: Vec::new(),
        };
        let Some(area) = grid::bounds(affectable) else {
            return Ok(placement);
        };
        let effect = grid::beacon_effect_distance();
        let search = area.expand(effect + BEACON_SIZE - 1);
        let tree = FootprintTree::build(affectable);
        let mut blocked = Blocked::from_rects(affectable.iter().chain(obstacles));

        let mut candidates: Vec<(CellRect, Vec<usize>)> = Vec::new();
        for (n, origin) in search.cells().enumerate() {
            if n % 256 == 0 {
                cancel.check()?;
            }
            let rect = CellRect::new(origin, BEACON_SIZE, BEACON_SIZE);
            if !blocked.is_rect_free(&rect) {
                continue;
            }
            let touched = tree.touching(&rect.expand(effect));
            if touched.len() >= self.min_affected {
                candidates.push((rect, touched));
            }
        }
        candidates.sort_by_key(|(rect, touched)| {
            (Reverse(touched.len()), rect.origin.y, rect.origin.x)
        });

        let modules: Vec<String> = self
            .module
            .iter()
            .flat_map(|m| std::iter::repeat(m.clone()).take(2))
            .collect();
        for (rect, touched) in candidates {
            if !blocked.is_rect_free(&rect) {
                continue;
            }
            blocked.block_rect(&rect);
            placement.beacons.push(
                EntityDescriptor::new(BEACON, rect.center()).with_modules(modules.clone()),
            );
            placement.affected.push(touched);
        }
        log::debug!(
            "placed {} beacons giving {} effects",
            placement.beacons.len(),
            placement.effects()
        );
        Ok(placement)
    }
}
