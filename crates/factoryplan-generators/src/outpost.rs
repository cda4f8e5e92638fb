//! Oil outpost pipeline: pipes, then beacons, then power.

use std::collections::BTreeSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use factoryplan_core::prototypes::PUMPJACK;
use factoryplan_core::{CellRect, Direction, EntityDescriptor, EntityId, EntityStore};

use crate::beacons::{BeaconPlacement, BeaconPlacer};
use crate::cancel::CancelToken;
use crate::error::GeneratorError;
use crate::grid::Source;
use crate::pipes::{PipeRouter, PipeStats};
use crate::poles::{PolePlacement, PolePlacer};

pub const MIN_SOURCES: usize = 2;
pub const MAX_SOURCES: usize = 200;

/// Module names meaning "install nothing".
const NO_MODULE: &str = "none";

/// Options for [`plan_outpost`]. Every field has a default so partial JSON
/// documents deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutpostSettings {
    /// Module installed in every pumpjack, or `"none"`.
    pub source_module: String,
    /// Interior run length an underground pair must span before replacing pipes.
    pub min_gap_between_undergrounds: usize,
    pub beacons: bool,
    /// Candidate beacons reaching fewer pumpjacks than this are rejected.
    pub min_affected_entities: usize,
    /// Module installed in every beacon; `"none"` disables beacons.
    pub beacon_module: String,
}

impl Default for OutpostSettings {
    fn default() -> Self {
        Self {
            source_module: "productivity_module_3".to_string(),
            min_gap_between_undergrounds: 1,
            beacons: true,
            min_affected_entities: 1,
            beacon_module: "speed_module_3".to_string(),
        }
    }
}

impl OutpostSettings {
    fn source_module(&self) -> Option<&str> {
        (self.source_module != NO_MODULE).then_some(self.source_module.as_str())
    }

    fn beacons_enabled(&self) -> bool {
        self.beacons && self.beacon_module != NO_MODULE
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutpostStats {
    pub pipes: PipeStats,
    pub beacons: usize,
    pub effects: usize,
    pub poles: usize,
}

/// Everything the editor needs to apply one generated outpost.
#[derive(Debug, Clone, PartialEq)]
pub struct OutpostPlan {
    pub rotations: Vec<(EntityId, Direction)>,
    /// Modules to install in every pumpjack.
    pub source_modules: Vec<String>,
    pub pipes: Vec<EntityDescriptor>,
    pub beacons: Vec<EntityDescriptor>,
    pub poles: Vec<EntityDescriptor>,
    /// Pole wire pairs, indices into `poles`.
    pub wires: Vec<(usize, usize)>,
    pub stats: OutpostStats,
}

/// Read the pumpjacks out of a store holding nothing else.
pub fn sources_from_store(store: &EntityStore) -> Result<Vec<Source>, GeneratorError> {
    let foreign = store.filter_entities(|e| e.name != PUMPJACK).len();
    if foreign > 0 {
        return Err(GeneratorError::ForeignEntities(foreign));
    }
    let sources: Vec<Source> = store
        .entities()
        .map(|e| Source {
            id: e.id,
            position: e.position,
            direction: e.direction,
        })
        .collect();
    validate_count(sources.len())?;
    Ok(sources)
}

fn validate_count(n: usize) -> Result<(), GeneratorError> {
    if (MIN_SOURCES..=MAX_SOURCES).contains(&n) {
        Ok(())
    } else {
        Err(GeneratorError::InvalidSourceCount(n))
    }
}

pub fn plan_outpost(
    sources: &[Source],
    settings: &OutpostSettings,
    cancel: &CancelToken,
) -> Result<OutpostPlan, GeneratorError> {
    validate_count(sources.len())?;
    let pumps: Vec<CellRect> = sources.iter().map(Source::footprint).collect();

    let started = Instant::now();
    let route = PipeRouter::new(settings.min_gap_between_undergrounds).route(sources, cancel)?;
    log::debug!("pipes routed in {:?}", started.elapsed());
    let pipe_rects: Vec<CellRect> = route
        .entities
        .iter()
        .map(|p| CellRect::centered(p.position, 1, 1))
        .collect();

    let started = Instant::now();
    let mut beacons = if settings.beacons_enabled() {
        BeaconPlacer::new(
            settings.min_affected_entities,
            Some(settings.beacon_module.clone()),
        )
        .place(&pumps, &pipe_rects, cancel)?
    } else {
        BeaconPlacement {
            beacons: Vec::new(),
            affected: Vec::new(),
        }
    };
    log::debug!("beacons placed in {:?}", started.elapsed());

    let started = Instant::now();
    let poles = power(sources, &pumps, &pipe_rects, &mut beacons, cancel)?;
    log::debug!("poles placed in {:?}", started.elapsed());

    let source_modules = settings
        .source_module()
        .map(|m| vec![m.to_string(); 2])
        .unwrap_or_default();

    let stats = OutpostStats {
        pipes: route.stats,
        beacons: beacons.beacons.len(),
        effects: beacons.effects(),
        poles: poles.poles.len(),
    };
    log_stats(&stats);

    Ok(OutpostPlan {
        rotations: route.rotations,
        source_modules,
        pipes: route.entities,
        beacons: beacons.beacons,
        poles: poles.poles,
        wires: poles.wires,
        stats,
    })
}

/// Place poles for pumpjacks and beacons, dropping beacons that cannot be
/// powered or that crowd out the pumpjacks' poles.
fn power(
    sources: &[Source],
    pumps: &[CellRect],
    pipes: &[CellRect],
    beacons: &mut BeaconPlacement,
    cancel: &CancelToken,
) -> Result<PolePlacement, GeneratorError> {
    let placer = PolePlacer::new();
    loop {
        let beacon_rects = beacons.footprints();
        let powered: Vec<CellRect> = pumps.iter().chain(&beacon_rects).copied().collect();
        let placement = placer.place(&powered, pipes, cancel)?;
        if placement.unpowered.is_empty() {
            return Ok(placement);
        }

        let unpowered_pumps: Vec<usize> = placement
            .unpowered
            .iter()
            .copied()
            .filter(|i| *i < pumps.len())
            .collect();
        let mut drop: BTreeSet<usize> = placement
            .unpowered
            .iter()
            .filter_map(|i| i.checked_sub(pumps.len()))
            .collect();
        if drop.is_empty() {
            // Only pumpjacks are dark: free the ground around them.
            for pump in &unpowered_pumps {
                let near = pumps[*pump].expand(3);
                drop.extend(
                    beacon_rects
                        .iter()
                        .enumerate()
                        .filter(|(_, b)| b.intersects(&near))
                        .map(|(i, _)| i),
                );
            }
        }
        if drop.is_empty() {
            return Err(GeneratorError::Unpowered(
                unpowered_pumps.iter().map(|i| sources[*i].id).collect(),
            ));
        }
        log::warn!("dropping {} beacons that block power", drop.len());
        for i in drop.iter().rev() {
            beacons.beacons.remove(*i);
            beacons.affected.remove(*i);
        }
    }
}

fn log_stats(stats: &OutpostStats) {
    let ratio = if stats.pipes.underground_pipes > 0 {
        stats.pipes.replaced as f64 / stats.pipes.underground_pipes as f64
    } else {
        0.0
    };
    log::info!("Total pipes: {}", stats.pipes.pipes);
    log::info!("Total underground pipes: {}", stats.pipes.underground_pipes);
    log::info!("Pipes replaced by underground pipes: {}", stats.pipes.replaced);
    log::info!("Ratio (pipes replaced/underground pipes): {ratio:.2}");
    log::info!("Total beacons: {}", stats.beacons);
    log::info!("Total effects given by beacons: {}", stats.effects);
    log::info!("Total poles: {}", stats.poles);
}

#[cfg(test)]
mod tests {
    use super::*;
    use factoryplan_core::{Emit, Position};

    fn sources(positions: &[(f64, f64)]) -> Vec<Source> {
        positions
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
    fn test_too_few_sources_is_a_validation_failure() {
        let result = plan_outpost(&sources(&[(1.5, 1.5)]), &OutpostSettings::default(), &CancelToken::new());
        assert_eq!(result, Err(GeneratorError::InvalidSourceCount(1)));
    }

    #[test]
    fn test_store_with_other_entities_is_rejected() {
        let mut store = EntityStore::with_seed("outpost", 3);
        store
            .create_entity(EntityDescriptor::new(PUMPJACK, Position::new(1.5, 1.5)), Emit::default())
            .unwrap();
        store
            .create_entity(EntityDescriptor::new("pipe", Position::new(10.5, 10.5)), Emit::default())
            .unwrap();
        assert_eq!(sources_from_store(&store), Err(GeneratorError::ForeignEntities(1)));
    }

    #[test]
    fn test_full_pipeline_without_beacons() {
        let settings = OutpostSettings {
            beacons: false,
            ..OutpostSettings::default()
        };
        let plan = plan_outpost(
            &sources(&[(1.5, 1.5), (12.5, -0.5), (4.5, 12.5)]),
            &settings,
            &CancelToken::new(),
        )
        .unwrap();
        assert!(plan.beacons.is_empty());
        assert!(!plan.pipes.is_empty());
        assert!(!plan.poles.is_empty());
        assert_eq!(plan.wires.len(), plan.poles.len() - 1);
        assert_eq!(plan.source_modules, vec!["productivity_module_3".to_string(); 2]);
        assert_eq!(plan.stats.poles, plan.poles.len());
    }

    #[test]
    fn test_none_modules_disable_beacons() {
        let settings = OutpostSettings {
            source_module: "none".into(),
            beacon_module: "none".into(),
            ..OutpostSettings::default()
        };
        let plan = plan_outpost(&sources(&[(1.5, 1.5), (9.5, 1.5)]), &settings, &CancelToken::new()).unwrap();
        assert!(plan.beacons.is_empty());
        assert!(plan.source_modules.is_empty());
    }

    #[test]
    fn test_settings_fill_missing_fields() {
        let settings: OutpostSettings = serde_json::from_str(r#"{"beacons": false}"#).unwrap();
        assert!(!settings.beacons);
        assert_eq!(settings.min_gap_between_undergrounds, 1);
        assert_eq!(settings.beacon_module, "speed_module_3");
    }
}
