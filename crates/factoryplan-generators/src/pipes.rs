//! Pipe network between pumpjacks.
//!
//! The network grows Prim-style: starting from the first pumpjack, each
//! round runs a Dijkstra search from every pipe laid so far to the nearest
//! output cell of a pumpjack not yet connected. Turns cost extra so runs stay
//! straight. Afterwards straight stretches of plain pipe are swapped for
//! underground pairs.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use pathfinding::prelude::dijkstra;

use factoryplan_core::prototypes::{PIPE, PIPE_TO_GROUND};
use factoryplan_core::{CellCoord, CellRect, Direction, EntityDescriptor, EntityId};

use crate::cancel::CancelToken;
use crate::error::GeneratorError;
use crate::grid::{self, Blocked, Source};

const STEP_COST: u32 = 2;
const TURN_COST: u32 = 1;
/// Cells of free space around the pumpjacks the router may use.
const SEARCH_MARGIN: u32 = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipeStats {
    pub pipes: usize,
    pub underground_pipes: usize,
    /// Surface pipes removed by underground substitution.
    pub replaced: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipeRoute {
    pub entities: Vec<EntityDescriptor>,
    /// Pumpjacks whose facing has to change to feed the chosen output cell.
    pub rotations: Vec<(EntityId, Direction)>,
    pub stats: PipeStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Node {
    Start,
    Cell(CellCoord, Option<Direction>),
}

pub struct PipeRouter {
    /// Shortest straight run, in cells, worth bridging with an underground pair.
    pub min_gap: usize,
}

impl PipeRouter {
    pub fn new(min_gap: usize) -> Self {
        Self { min_gap }
    }

    pub fn route(&self, sources: &[Source], cancel: &CancelToken) -> Result<PipeRoute, GeneratorError> {
        let footprints: Vec<CellRect> = sources.iter().map(Source::footprint).collect();
        let Some(area) = grid::bounds(&footprints) else {
            return Ok(PipeRoute {
                entities: Vec::new(),
                rotations: Vec::new(),
                stats: PipeStats::default(),
            });
        };
        let area = area.expand(SEARCH_MARGIN);
        let blocked = Blocked::from_rects(&footprints);

        let mut network: BTreeSet<CellCoord> = BTreeSet::new();
        let mut facing: Vec<Option<Direction>> = vec![None; sources.len()];
        let mut connected = vec![false; sources.len()];
        connected[0] = true;

        while let Some(pending) = connected.iter().position(|c| !c) {
            cancel.check()?;

            let goals: HashMap<CellCoord, (usize, Direction)> = sources
                .iter()
                .enumerate()
                .filter(|(i, _)| !connected[*i])
                .flat_map(|(i, s)| {
                    Direction::CARDINALS
                        .iter()
                        .map(move |d| (s.output_cell(*d), (i, *d)))
                })
                .filter(|(cell, _)| !blocked.is_blocked(cell) && area.contains(cell))
                .collect();

            let starts: Vec<CellCoord> = if network.is_empty() {
                Direction::CARDINALS
                    .iter()
                    .map(|d| sources[0].output_cell(*d))
                    .filter(|c| !blocked.is_blocked(c))
                    .collect()
            } else {
                network.iter().copied().collect()
            };

            let found = dijkstra(
                &Node::Start,
                |node| successors(node, &starts, &blocked, &area),
                |node| matches!(node, Node::Cell(cell, _) if goals.contains_key(cell)),
            );
            let Some((path, _)) = found else {
                return Err(GeneratorError::NoRoute(sources[pending].id));
            };

            let cells: Vec<CellCoord> = path
                .iter()
                .filter_map(|node| match node {
                    Node::Cell(cell, _) => Some(*cell),
                    Node::Start => None,
                })
                .collect();

            if network.is_empty() {
                if let Some(first) = cells.first() {
                    facing[0] = Direction::CARDINALS
                        .iter()
                        .copied()
                        .find(|d| sources[0].output_cell(*d) == *first);
                }
            }
            if let Some((index, direction)) = cells.last().and_then(|c| goals.get(c)) {
                connected[*index] = true;
                facing[*index] = Some(*direction);
            }
            network.extend(cells);
        }

        let outputs: BTreeSet<CellCoord> = sources
            .iter()
            .zip(&facing)
            .filter_map(|(s, d)| d.map(|d| s.output_cell(d)))
            .collect();

        let rotations = sources
            .iter()
            .zip(&facing)
            .filter_map(|(s, d)| match d {
                Some(d) if *d != s.direction => Some((s.id, *d)),
                _ => None,
            })
            .collect();

        let (entities, stats) = self.substitute_undergrounds(&network, &outputs);
        log::debug!(
            "routed {} pumpjacks: {} pipes, {} underground pipes",
            sources.len(),
            stats.pipes,
            stats.underground_pipes
        );
        Ok(PipeRoute {
            entities,
            rotations,
            stats,
        })
    }

    /// Swap straight chains of interior pipe for underground pairs.
    fn substitute_undergrounds(
        &self,
        network: &BTreeSet<CellCoord>,
        outputs: &BTreeSet<CellCoord>,
    ) -> (Vec<EntityDescriptor>, PipeStats) {
        let interior: BTreeMap<CellCoord, bool> = network
            .iter()
            .filter(|c| !outputs.contains(c))
            .filter_map(|c| interior_axis(c, network).map(|horizontal| (*c, horizontal)))
            .collect();

        let reach = grid::underground_max_distance() as usize + 1;
        let mut undergrounds: BTreeMap<CellCoord, Direction> = BTreeMap::new();
        let mut replaced: BTreeSet<CellCoord> = BTreeSet::new();

        for (&cell, &horizontal) in &interior {
            let (back, forward) = if horizontal {
                (Direction::West, Direction::East)
            } else {
                (Direction::North, Direction::South)
            };
            if interior.get(&cell.step(back)) == Some(&horizontal) {
                continue;
            }
            let mut chain = vec![cell];
            let mut next = cell.step(forward);
            while interior.get(&next) == Some(&horizontal) {
                chain.push(next);
                next = next.step(forward);
            }

            let mut remaining = chain.as_slice();
            while !remaining.is_empty() {
                let take = remaining.len().min(reach);
                // The run a pair spans includes the surface pipe at each end.
                if take < 2 || take + 2 < self.min_gap {
                    break;
                }
                let chunk = &remaining[..take];
                undergrounds.insert(chunk[0], back);
                undergrounds.insert(chunk[take - 1], forward);
                replaced.extend(chunk.iter().copied());
                remaining = &remaining[take..];
            }
        }

        let mut entities = Vec::new();
        let mut pipes = 0;
        for cell in network {
            if let Some(direction) = undergrounds.get(cell) {
                entities.push(EntityDescriptor::new(PIPE_TO_GROUND, cell.center()).with_direction(*direction));
            } else if !replaced.contains(cell) {
                entities.push(EntityDescriptor::new(PIPE, cell.center()));
                pipes += 1;
            }
        }
        let stats = PipeStats {
            pipes,
            underground_pipes: undergrounds.len(),
            replaced: replaced.len(),
        };
        (entities, stats)
    }
}

fn successors(
    node: &Node,
    starts: &[CellCoord],
    blocked: &Blocked,
    area: &CellRect,
) -> Vec<(Node, u32)> {
    match node {
        Node::Start => starts.iter().map(|c| (Node::Cell(*c, None), 0)).collect(),
        Node::Cell(cell, heading) => Direction::CARDINALS
            .iter()
            .map(|d| (cell.step(*d), *d))
            .filter(|(next, _)| area.contains(next) && !blocked.is_blocked(next))
            .map(|(next, d)| {
                let turn = match heading {
                    Some(h) if *h != d => TURN_COST,
                    _ => 0,
                };
                (Node::Cell(next, Some(d)), STEP_COST + turn)
            })
            .collect(),
    }
}

/// `Some(horizontal)` when exactly two pipe neighbours sit on opposite sides.
fn interior_axis(cell: &CellCoord, network: &BTreeSet<CellCoord>) -> Option<bool> {
    let [north, east, south, west] = cell.neighbours().map(|n| network.contains(&n));
    match (north, east, south, west) {
        (false, true, false, true) => Some(true),
        (true, false, true, false) => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factoryplan_core::Position;

    fn source(id: u128, x: f64, y: f64) -> Source {
        Source {
            id: EntityId(id),
            position: Position::new(x, y),
            direction: Direction::North,
        }
    }

    fn names(route: &PipeRoute, name: &str) -> Vec<CellCoord> {
        route
            .entities
            .iter()
            .filter(|e| e.name == name)
            .map(|e| e.position.cell())
            .collect()
    }

    fn pair() -> Vec<Source> {
        vec![source(1, 1.5, 1.5), source(2, 12.5, -0.5)]
    }

    #[test]
    fn test_short_run_stays_surface_pipe() {
        let route = PipeRouter::new(9).route(&pair(), &CancelToken::new()).unwrap();
        assert_eq!(route.stats.pipes, 8);
        assert_eq!(route.stats.underground_pipes, 0);
        assert_eq!(route.stats.replaced, 0);
        assert_eq!(names(&route, PIPE).first(), Some(&CellCoord::new(3, 0)));
        assert_eq!(
            route.rotations,
            vec![(EntityId(1), Direction::East), (EntityId(2), Direction::West)]
        );
    }

    #[test]
    fn test_lower_gap_substitutes_one_pair() {
        let route = PipeRouter::new(4).route(&pair(), &CancelToken::new()).unwrap();
        assert_eq!(names(&route, PIPE), vec![CellCoord::new(3, 0), CellCoord::new(10, 0)]);
        assert_eq!(
            names(&route, PIPE_TO_GROUND),
            vec![CellCoord::new(4, 0), CellCoord::new(9, 0)]
        );
        let directions: Vec<Direction> = route
            .entities
            .iter()
            .filter(|e| e.name == PIPE_TO_GROUND)
            .map(|e| e.direction)
            .collect();
        assert_eq!(directions, vec![Direction::West, Direction::East]);
        assert_eq!(route.stats.replaced, 6);
    }

    #[test]
    fn test_threshold_against_a_six_cell_gap() {
        // Footprints x=0..=2 and x=9..=11 leave six free cells between them.
        let sources = vec![source(1, 1.5, 1.5), source(2, 10.5, -0.5)];
        for min_gap in [4, 6] {
            let route = PipeRouter::new(min_gap).route(&sources, &CancelToken::new()).unwrap();
            assert_eq!(
                route.stats,
                PipeStats {
                    pipes: 2,
                    underground_pipes: 2,
                    replaced: 4
                },
                "min_gap {min_gap}"
            );
            assert_eq!(names(&route, PIPE), vec![CellCoord::new(3, 0), CellCoord::new(8, 0)]);
            assert_eq!(
                names(&route, PIPE_TO_GROUND),
                vec![CellCoord::new(4, 0), CellCoord::new(7, 0)]
            );
        }

        let route = PipeRouter::new(7).route(&sources, &CancelToken::new()).unwrap();
        assert_eq!(
            route.stats,
            PipeStats {
                pipes: 6,
                underground_pipes: 0,
                replaced: 0
            }
        );
    }

    #[test]
    fn test_long_runs_are_chained() {
        let sources = vec![source(1, 1.5, 1.5), source(2, 30.5, -0.5)];
        let route = PipeRouter::new(0).route(&sources, &CancelToken::new()).unwrap();
        let undergrounds = names(&route, PIPE_TO_GROUND);
        assert!(undergrounds.len() >= 4);
        for pair in undergrounds.chunks(2) {
            assert!(pair[0].manhattan(&pair[1]) <= 10);
        }
    }

    #[test]
    fn test_cancelled_routing() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = PipeRouter::new(1).route(&pair(), &cancel);
        assert_eq!(result, Err(GeneratorError::Cancelled));
    }
}
