use std::collections::{HashMap, HashSet};

use pathfinding::prelude::bfs_reach;

use factoryplan_core::prototypes::{PIPE, PIPE_TO_GROUND};
use factoryplan_core::{CellCoord, CellRect, Direction, EntityId, Position};
use factoryplan_generators::{plan_outpost, CancelToken, OutpostSettings, PipeRouter, Source};

fn field() -> Vec<Source> {
    // A loose, irregular field of pumpjacks.
    let centers = [
        (1.5, 1.5),
        (9.5, 3.5),
        (20.5, -2.5),
        (3.5, 14.5),
        (15.5, 12.5),
        (28.5, 9.5),
        (-8.5, 6.5),
        (11.5, 25.5),
    ];
    centers
        .iter()
        .enumerate()
        .map(|(i, (x, y))| Source {
            id: EntityId(i as u128 + 1),
            position: Position::new(*x, *y),
            direction: Direction::North,
        })
        .collect()
}

#[test]
fn test_pipes_and_pumpjacks_form_one_network() {
    let sources = field();
    let route = PipeRouter::new(2).route(&sources, &CancelToken::new()).unwrap();

    let mut kinds: HashMap<CellCoord, (&str, Direction)> = HashMap::new();
    for e in &route.entities {
        kinds.insert(e.position.cell(), (e.name.as_str(), e.direction));
    }
    assert!(kinds.values().all(|(name, _)| *name == PIPE || *name == PIPE_TO_GROUND));

    // Underground pairs: a west/north end links to the next end along its axis.
    let mut links: HashMap<CellCoord, CellCoord> = HashMap::new();
    for (cell, (name, direction)) in &kinds {
        if *name != PIPE_TO_GROUND || !matches!(direction, Direction::West | Direction::North) {
            continue;
        }
        let forward = direction.opposite();
        let partner = (1..=10)
            .map(|n| (0..n).fold(*cell, |c, _| c.step(forward)))
            .find(|c| matches!(kinds.get(c), Some((PIPE_TO_GROUND, d)) if *d == forward))
            .expect("underground end without a partner within reach");
        links.insert(*cell, partner);
        links.insert(partner, *cell);
    }

    let start = *kinds.keys().min().unwrap();
    let reached: HashSet<CellCoord> = bfs_reach(start, |c| {
        let mut next: Vec<CellCoord> = c
            .neighbours()
            .into_iter()
            .filter(|n| kinds.contains_key(n))
            .collect();
        next.extend(links.get(c));
        next
    })
    .collect();
    assert_eq!(reached.len(), kinds.len());

    let facing: HashMap<EntityId, Direction> = route.rotations.iter().copied().collect();
    for source in &sources {
        let direction = facing.get(&source.id).copied().unwrap_or(source.direction);
        assert!(reached.contains(&source.output_cell(direction)));
    }
}

#[test]
fn test_generated_outpost_meets_coverage_rules() {
    let sources = field();
    let settings = OutpostSettings {
        min_affected_entities: 2,
        ..OutpostSettings::default()
    };
    let plan = plan_outpost(&sources, &settings, &CancelToken::new()).unwrap();

    let pumps: Vec<CellRect> = sources.iter().map(Source::footprint).collect();
    for beacon in &plan.beacons {
        let effect = CellRect::centered(beacon.position, 3, 3).expand(3);
        assert!(pumps.iter().filter(|p| p.intersects(&effect)).count() >= 2);
    }

    let poles: Vec<CellCoord> = plan.poles.iter().map(|p| p.position.cell()).collect();
    let supplies = |rect: &CellRect| {
        poles
            .iter()
            .any(|c| CellRect::new(c.offset(-3, -3), 7, 7).intersects(rect))
    };
    assert!(pumps.iter().all(supplies));
    assert!(plan
        .beacons
        .iter()
        .all(|b| supplies(&CellRect::centered(b.position, 3, 3))));

    let occupied: Vec<CellRect> = pumps
        .iter()
        .copied()
        .chain(plan.pipes.iter().map(|p| CellRect::centered(p.position, 1, 1)))
        .chain(plan.beacons.iter().map(|b| CellRect::centered(b.position, 3, 3)))
        .chain(poles.iter().map(|c| CellRect::new(*c, 1, 1)))
        .collect();
    for (i, a) in occupied.iter().enumerate() {
        assert!(occupied[i + 1..].iter().all(|b| !a.intersects(b)));
    }

    let connected: HashSet<usize> = bfs_reach(0usize, |i| {
        plan.wires
            .iter()
            .filter_map(|(a, b)| match (*a == *i, *b == *i) {
                (true, _) => Some(*b),
                (_, true) => Some(*a),
                _ => None,
            })
            .collect::<Vec<_>>()
    })
    .collect();
    assert_eq!(connected.len(), plan.poles.len());
}
