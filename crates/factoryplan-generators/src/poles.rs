use std::cmp::Reverse;
use std::collections::{BTreeSet, HashSet};

use pathfinding::prelude::{bfs, bfs_reach, kruskal};

use factoryplan_core::prototypes::MEDIUM_ELECTRIC_POLE;
use factoryplan_core::{CellCoord, CellRect, EntityDescriptor};

use crate::cancel::CancelToken;
use crate::error::GeneratorError;
use crate::grid::{self, Blocked, FootprintTree};

#[derive(Debug, Clone, PartialEq)]
pub struct PolePlacement {
    pub poles: Vec<EntityDescriptor>,
    /// Wire pairs as indices into `poles`; a spanning tree of the network.
    pub wires: Vec<(usize, usize)>,
    /// Indices of powered footprints no free cell could supply.
    pub unpowered: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Bridge {
    Source,
    Cell(CellCoord),
}

/// Medium-pole placement: a greedy supply cover followed by bridging poles
/// along breadth-first paths until the wires form one network.
pub struct PolePlacer {
    supply_cells: i64,
    wire_reach: f64,
}

impl Default for PolePlacer {
    fn default() -> Self {
        let (supply, reach) = grid::pole_reach();
        Self {
            supply_cells: supply.floor() as i64,
            wire_reach: reach,
        }
    }
}

impl PolePlacer {
    pub fn new() -> Self {
        Self::default()
    }

    fn supply_area(&self, cell: CellCoord) -> CellRect {
        let side = (2 * self.supply_cells + 1) as u32;
        CellRect::new(cell.offset(-self.supply_cells, -self.supply_cells), side, side)
    }

    fn in_reach(&self, a: &CellCoord, b: &CellCoord) -> bool {
        let (dx, dy) = ((a.x - b.x) as f64, (a.y - b.y) as f64);
        dx * dx + dy * dy <= self.wire_reach * self.wire_reach
    }

    /// Cells within wire reach of `cell`, excluding itself.
    fn reachable_cells(&self, cell: CellCoord) -> impl Iterator<Item = CellCoord> + '_ {
        let r = self.wire_reach.floor() as i64;
        (-r..=r)
            .flat_map(move |dy| (-r..=r).map(move |dx| cell.offset(dx, dy)))
            .filter(move |other| *other != cell && self.in_reach(&cell, other))
    }

    pub fn place(
        &self,
        powered: &[CellRect],
        obstacles: &[CellRect],
        cancel: &CancelToken,
    ) -> Result<PolePlacement, GeneratorError> {
        let mut placement = PolePlacement {
            poles: Vec::new(),
            wires: Vec::new(),
            unpowered: Vec::new(),
        };
        let Some(area) = grid::bounds(powered) else {
            return Ok(placement);
        };
        let search = area.expand(self.supply_cells as u32);
        let tree = FootprintTree::build(powered);
        let mut blocked = Blocked::from_rects(powered.iter().chain(obstacles));

        let candidates: Vec<(CellCoord, Vec<usize>)> = search
            .cells()
            .filter(|c| !blocked.is_blocked(c))
            .map(|c| (c, tree.touching(&self.supply_area(c))))
            .filter(|(_, touched)| !touched.is_empty())
            .collect();

        let mut needs_power = vec![true; powered.len()];
        let mut remaining = powered.len();
        let mut poles: Vec<CellCoord> = Vec::new();

        while remaining > 0 {
            cancel.check()?;
            let best = candidates
                .iter()
                .filter(|(cell, _)| !blocked.is_blocked(cell))
                .map(|(cell, touched)| {
                    let gain = touched.iter().filter(|i| needs_power[**i]).count();
                    let near = poles.iter().any(|p| self.in_reach(p, cell));
                    (gain, near, Reverse((cell.y, cell.x)), cell, touched)
                })
                .max_by_key(|(gain, near, order, _, _)| (*gain, *near, *order));
            let Some((gain, _, _, cell, touched)) = best else {
                break;
            };
            if gain == 0 {
                break;
            }
            for i in touched {
                if needs_power[*i] {
                    needs_power[*i] = false;
                    remaining -= 1;
                }
            }
            blocked.block(*cell);
            poles.push(*cell);
        }
        placement.unpowered = needs_power
            .iter()
            .enumerate()
            .filter_map(|(i, needs)| needs.then_some(i))
            .collect();

        let bounds = search.expand(self.wire_reach.ceil() as u32);
        self.bridge(&mut poles, &mut blocked, &bounds, cancel)?;

        placement.wires = self.spanning_wires(&poles);
        placement.poles = poles
            .iter()
            .map(|c| EntityDescriptor::new(MEDIUM_ELECTRIC_POLE, c.center()))
            .collect();
        Ok(placement)
    }

    /// Add poles until every pole is wire-connected to the first one.
    fn bridge(
        &self,
        poles: &mut Vec<CellCoord>,
        blocked: &mut Blocked,
        bounds: &CellRect,
        cancel: &CancelToken,
    ) -> Result<(), GeneratorError> {
        loop {
            cancel.check()?;
            let main = self.component_of(poles, 0);
            if main.len() >= poles.len() {
                return Ok(());
            }
            let others: Vec<CellCoord> = poles
                .iter()
                .filter(|p| !main.contains(p))
                .copied()
                .collect();
            let free = |c: &CellCoord| bounds.contains(c) && !blocked.is_blocked(c);

            let path = bfs(
                &Bridge::Source,
                |node| -> Vec<Bridge> {
                    match node {
                        Bridge::Source => main
                            .iter()
                            .flat_map(|p| self.reachable_cells(*p))
                            .filter(|c| free(c))
                            .collect::<BTreeSet<_>>()
                            .into_iter()
                            .map(Bridge::Cell)
                            .collect(),
                        Bridge::Cell(cell) => self
                            .reachable_cells(*cell)
                            .filter(|c| free(c))
                            .map(Bridge::Cell)
                            .collect(),
                    }
                },
                |node| match node {
                    Bridge::Cell(cell) => others.iter().any(|o| self.in_reach(o, cell)),
                    Bridge::Source => false,
                },
            )
            .ok_or(GeneratorError::Disconnected)?;

            for node in path {
                if let Bridge::Cell(cell) = node {
                    blocked.block(cell);
                    poles.push(cell);
                }
            }
        }
    }

    fn component_of(&self, poles: &[CellCoord], start: usize) -> HashSet<CellCoord> {
        match poles.get(start) {
            Some(first) => bfs_reach(*first, |p| {
                let p = *p;
                poles
                    .iter()
                    .filter(move |q| **q != p && self.in_reach(&p, q))
                    .copied()
                    .collect::<Vec<_>>()
            })
            .collect(),
            None => HashSet::new(),
        }
    }

    fn spanning_wires(&self, poles: &[CellCoord]) -> Vec<(usize, usize)> {
        let mut edges = Vec::new();
        for (i, a) in poles.iter().enumerate() {
            for (j, b) in poles.iter().enumerate().skip(i + 1) {
                if self.in_reach(a, b) {
                    edges.push((i, j, (a.x - b.x).pow(2) + (a.y - b.y).pow(2)));
                }
            }
        }
        let mut wires: Vec<(usize, usize)> = kruskal(&edges).map(|(a, b, _)| (*a, *b)).collect();
        wires.sort_unstable();
        wires
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factoryplan_core::Position;

    fn pump(x: i64, y: i64) -> CellRect {
        CellRect::new(CellCoord::new(x, y), 3, 3)
    }

    fn pole_cells(placement: &PolePlacement) -> Vec<CellCoord> {
        placement.poles.iter().map(|p| p.position.cell()).collect()
    }

    fn assert_connected(placement: &PolePlacement) {
        let placer = PolePlacer::new();
        let cells = pole_cells(placement);
        assert_eq!(placer.component_of(&cells, 0).len(), cells.len());
        assert_eq!(placement.wires.len(), cells.len().saturating_sub(1));
    }

    #[test]
    fn test_every_entity_is_supplied() {
        let pumps = [pump(0, 0), pump(5, 0), pump(0, 5), pump(12, 12)];
        let placer = PolePlacer::new();
        let placement = placer.place(&pumps, &[], &CancelToken::new()).unwrap();
        assert!(placement.unpowered.is_empty());
        let cells = pole_cells(&placement);
        for rect in &pumps {
            assert!(cells.iter().any(|c| placer.supply_area(*c).intersects(rect)));
            assert!(cells.iter().all(|c| !rect.contains(c)));
        }
        assert_connected(&placement);
    }

    #[test]
    fn test_distant_clusters_get_bridged() {
        let pumps = [pump(0, 0), pump(40, 0)];
        let placement = PolePlacer::new()
            .place(&pumps, &[], &CancelToken::new())
            .unwrap();
        assert!(placement.poles.len() > 2);
        assert_connected(&placement);
    }

    #[test]
    fn test_walled_in_entity_is_reported() {
        let target = CellRect::new(CellCoord::new(0, 0), 1, 1);
        let wall = CellRect::new(CellCoord::new(-5, -5), 11, 11);
        let obstacles: Vec<CellRect> = wall
            .cells()
            .filter(|c| *c != CellCoord::new(0, 0))
            .map(|c| CellRect::new(c, 1, 1))
            .collect();
        let placement = PolePlacer::new()
            .place(&[target], &obstacles, &CancelToken::new())
            .unwrap();
        assert_eq!(placement.unpowered, vec![0]);
        assert!(placement.poles.is_empty());
    }

    #[test]
    fn test_pole_descriptors_are_cell_centred() {
        let placement = PolePlacer::new()
            .place(&[pump(0, 0)], &[], &CancelToken::new())
            .unwrap();
        assert_eq!(placement.poles.len(), 1);
        let p = placement.poles[0].position;
        assert_eq!(p, Position::new(p.x.floor() + 0.5, p.y.floor() + 0.5));
    }
}
