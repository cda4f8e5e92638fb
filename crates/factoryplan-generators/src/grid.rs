use std::collections::HashSet;

use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use factoryplan_core::prototypes::{self, EntityKind};
use factoryplan_core::{CellCoord, CellRect, Direction, EntityId, Position};

/// A pumpjack the pipe network must reach.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: EntityId,
    pub position: Position,
    pub direction: Direction,
}

impl Source {
    pub fn footprint(&self) -> CellRect {
        CellRect::centered(self.position, 3, 3)
    }

    /// Cell a pipe must occupy to take fluid from this pumpjack facing `direction`.
    pub fn output_cell(&self, direction: Direction) -> CellCoord {
        let (dx, dy) = match direction {
            Direction::North => (1.0, -2.0),
            Direction::East => (2.0, -1.0),
            Direction::South => (-1.0, 2.0),
            _ => (-2.0, 1.0),
        };
        self.position.translate(dx, dy).cell()
    }
}

/// A rectangle of cells tagged with the index of whatever owns it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    pub index: usize,
    pub rect: CellRect,
}

impl RTreeObject for Footprint {
    type Envelope = AABB<[i64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        let last = self.rect.last();
        AABB::from_corners([self.rect.origin.x, self.rect.origin.y], [last.x, last.y])
    }
}

/// R-tree over footprints for "which of these does this area touch" queries.
pub struct FootprintTree {
    tree: RTree<Footprint>,
}

impl FootprintTree {
    pub fn build(rects: &[CellRect]) -> Self {
        let entries = rects
            .iter()
            .enumerate()
            .map(|(index, rect)| Footprint { index, rect: *rect })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Indices of the footprints intersecting `area`, ascending.
    pub fn touching(&self, area: &CellRect) -> Vec<usize> {
        let last = area.last();
        let envelope = AABB::from_corners([area.origin.x, area.origin.y], [last.x, last.y]);
        let mut found: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|f| f.index)
            .collect();
        found.sort_unstable();
        found
    }
}

/// Cells no generated entity may use.
#[derive(Debug, Clone, Default)]
pub struct Blocked {
    cells: HashSet<CellCoord>,
}

impl Blocked {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rects<'a>(rects: impl IntoIterator<Item = &'a CellRect>) -> Self {
        let mut blocked = Self::new();
        for rect in rects {
            blocked.block_rect(rect);
        }
        blocked
    }

    pub fn block(&mut self, cell: CellCoord) {
        self.cells.insert(cell);
    }

    pub fn block_rect(&mut self, rect: &CellRect) {
        self.cells.extend(rect.cells());
    }

    pub fn is_blocked(&self, cell: &CellCoord) -> bool {
        self.cells.contains(cell)
    }

    pub fn is_rect_free(&self, rect: &CellRect) -> bool {
        rect.cells().all(|c| !self.cells.contains(&c))
    }
}

/// Smallest rectangle covering every rect, `None` for an empty slice.
pub fn bounds(rects: &[CellRect]) -> Option<CellRect> {
    rects.iter().copied().reduce(|a, b| a.union(&b))
}

pub(crate) fn underground_max_distance() -> u32 {
    match prototypes::entity(prototypes::PIPE_TO_GROUND).map(|p| p.kind) {
        Some(EntityKind::UndergroundPipe { max_distance }) => max_distance,
        _ => 10,
    }
}

pub(crate) fn beacon_effect_distance() -> u32 {
    match prototypes::entity(prototypes::BEACON).map(|p| p.kind) {
        Some(EntityKind::Beacon { effect_distance }) => effect_distance,
        _ => 3,
    }
}

/// `(supply_distance, wire_reach)` of the medium pole.
pub(crate) fn pole_reach() -> (f64, f64) {
    match prototypes::entity(prototypes::MEDIUM_ELECTRIC_POLE).map(|p| p.kind) {
        Some(EntityKind::ElectricPole {
            supply_distance,
            wire_reach,
        }) => (supply_distance, wire_reach),
        _ => (3.5, 9.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(x: f64, y: f64) -> Source {
        Source {
            id: EntityId(1),
            position: Position::new(x, y),
            direction: Direction::North,
        }
    }

    #[test]
    fn test_output_cells_touch_the_footprint() {
        let pump = source(1.5, 1.5);
        assert_eq!(pump.footprint(), CellRect::new(CellCoord::new(0, 0), 3, 3));
        assert_eq!(pump.output_cell(Direction::North), CellCoord::new(2, -1));
        assert_eq!(pump.output_cell(Direction::East), CellCoord::new(3, 0));
        assert_eq!(pump.output_cell(Direction::South), CellCoord::new(0, 3));
        assert_eq!(pump.output_cell(Direction::West), CellCoord::new(-1, 2));
    }

    #[test]
    fn test_tree_reports_touching_rects() {
        let rects = [
            CellRect::new(CellCoord::new(0, 0), 3, 3),
            CellRect::new(CellCoord::new(10, 0), 3, 3),
        ];
        let tree = FootprintTree::build(&rects);
        assert_eq!(tree.touching(&CellRect::new(CellCoord::new(2, 2), 9, 1)), vec![0, 1]);
        assert_eq!(tree.touching(&CellRect::new(CellCoord::new(3, 0), 7, 3)), Vec::<usize>::new());
    }

    #[test]
    fn test_prototype_constants() {
        assert_eq!(underground_max_distance(), 10);
        assert_eq!(beacon_effect_distance(), 3);
        assert_eq!(pole_reach(), (3.5, 9.0));
    }
}
