//! Blueprint document export and import.
//!
//! ## Layout
//! `{ "blueprint": { icons, entities?, tiles?, item, version, label } }`
//!
//! Entity positions are written relative to the layout centre and entity
//! numbers are renumbered densely `1..N` in identifier order, so equivalent
//! layouts export byte-identically. Import places the layout around the
//! fixed origin used by the sync peer.

use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use factoryplan_core::icons::generate_icons;
use factoryplan_core::ids;
use factoryplan_core::prototypes::{self, ItemType};
use factoryplan_core::{
    CellCoord, Direction, Emit, Entity, EntityDescriptor, EntityId, EntityStore, Position,
};

use crate::error::IoError;

/// Factorio 0.17.14 as `major << 48 | minor << 32 | patch << 16`.
pub const EXPORT_VERSION: u64 = (17 << 32) | (14 << 16);
/// Imported layouts are centred around this cell coordinate.
pub const IMPORT_ORIGIN: f64 = 2000.0;
const ITEM: &str = "blueprint";

// ── Document ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintEnvelope {
    pub blueprint: BlueprintDocument,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintDocument {
    #[serde(default)]
    pub icons: Vec<Icon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<EntityRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiles: Option<Vec<TileRecord>>,
    pub item: String,
    pub version: u64,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Icon {
    pub signal: SignalId,
    /// 1-based slot.
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalId {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_number: u32,
    pub name: String,
    pub position: Position,
    #[serde(default, skip_serializing_if = "is_north")]
    pub direction: Direction,
    /// Installed modules, item name to count.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub items: BTreeMap<String, u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<String>,
    /// Wire neighbours by entity number.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub neighbours: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    pub position: Position,
    pub name: String,
}

fn is_north(direction: &Direction) -> bool {
    *direction == Direction::North
}

// ── Export ────────────────────────────────────────────────────────────

/// Build the export document for the store's current contents.
pub fn export(store: &EntityStore) -> BlueprintDocument {
    let icons = if store.icons.is_empty() {
        generate_icons(store)
    } else {
        store.icons.clone()
    };

    let mut center = store.center();
    if let Some(rail) = store.first_rail() {
        center.x += (rail.position.x - center.x) % 2.0;
        center.y += (rail.position.y - center.y) % 2.0;
    }

    let numbers = renumber(store.entities());
    let mut entities: Vec<EntityRecord> = store
        .entities()
        .filter_map(|e| {
            let entity_number = *numbers.get(&e.id)?;
            let mut items = BTreeMap::new();
            for module in &e.modules {
                *items.entry(module.clone()).or_insert(0) += 1;
            }
            let mut neighbours: Vec<u32> = e
                .connections
                .iter()
                .filter_map(|n| numbers.get(n).copied())
                .collect();
            neighbours.sort_unstable();
            Some(EntityRecord {
                entity_number,
                name: e.name.clone(),
                position: e.position.translate(-center.x, -center.y),
                direction: e.direction,
                items,
                recipe: e.recipe.clone(),
                neighbours,
            })
        })
        .collect();
    entities.sort_unstable_by_key(|r| r.entity_number);

    let (tile_dx, tile_dy) = (center.x.floor(), center.y.floor());
    let tiles: Vec<TileRecord> = store
        .tiles()
        .map(|t| TileRecord {
            position: Position::new(t.position.x as f64 - tile_dx, t.position.y as f64 - tile_dy),
            name: t.name.clone(),
        })
        .collect();

    BlueprintDocument {
        icons: icons
            .iter()
            .enumerate()
            .map(|(i, name)| Icon {
                signal: SignalId {
                    kind: signal_type(name).to_string(),
                    name: name.clone(),
                },
                index: i as u32 + 1,
            })
            .collect(),
        entities: (!entities.is_empty()).then_some(entities),
        tiles: (!tiles.is_empty()).then_some(tiles),
        item: ITEM.to_string(),
        version: EXPORT_VERSION,
        label: store.label.clone(),
    }
}

/// Dense `1..N` numbering in ascending identifier order.
///
/// Counter-allocated identifiers carry no position, so they sort by the cell
/// their entity occupies, the same key an encoded identifier starts with.
pub fn renumber<'a>(entities: impl Iterator<Item = &'a Entity>) -> HashMap<EntityId, u32> {
    let mut keyed: Vec<(CellCoord, &str, Direction, EntityId)> = entities
        .map(|e| {
            let origin = ids::decode(e.id).unwrap_or_else(|| e.position.cell());
            (origin, e.name.as_str(), e.direction, e.id)
        })
        .collect();
    keyed.sort_unstable();
    keyed
        .into_iter()
        .enumerate()
        .map(|(i, (_, _, _, id))| (id, i as u32 + 1))
        .collect()
}

fn signal_type(item: &str) -> &'static str {
    match prototypes::item_type(item) {
        ItemType::Virtual => "virtual",
        ItemType::Fluid => "fluid",
        ItemType::Item => "item",
    }
}

// ── Import ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub entities: usize,
    pub tiles: usize,
    /// Entities and tiles that could not be created.
    pub skipped: usize,
}

/// Load `document` into an empty store as a single, non-undoable step.
pub fn import(store: &mut EntityStore, document: &BlueprintDocument) -> Result<ImportReport, IoError> {
    if document.item != ITEM {
        return Err(IoError::UnsupportedItem(document.item.clone()));
    }
    if !store.is_empty() {
        return Err(IoError::StoreNotEmpty);
    }

    store.label = document.label.clone();
    let mut icons = document.icons.clone();
    icons.sort_by_key(|i| i.index);
    store.icons = icons.into_iter().map(|i| i.signal.name).collect();

    let report = store.transaction("Imported blueprint", |store| -> Result<ImportReport, IoError> {
        let mut report = ImportReport::default();
        import_tiles(store, document.tiles.as_deref().unwrap_or_default(), &mut report);
        import_entities(store, document.entities.as_deref().unwrap_or_default(), &mut report)?;
        Ok(report)
    })?;
    store.reset_history()?;

    if report.skipped > 0 {
        log::warn!("import skipped {} entities/tiles", report.skipped);
    }
    log::info!(
        "imported '{}': {} entities, {} tiles",
        store.label,
        report.entities,
        report.tiles
    );
    Ok(report)
}

fn import_tiles(store: &mut EntityStore, tiles: &[TileRecord], report: &mut ImportReport) {
    let mut by_name: BTreeMap<&str, Vec<CellCoord>> = BTreeMap::new();
    for tile in tiles {
        let cell = tile.position.translate(IMPORT_ORIGIN, IMPORT_ORIGIN).cell();
        by_name.entry(tile.name.as_str()).or_default().push(cell);
    }
    for (name, cells) in by_name {
        match store.create_tiles(name, &cells) {
            Ok(created) => report.tiles += created,
            Err(err) => {
                log::warn!("skipping {} '{}' tiles: {}", cells.len(), name, err);
                report.skipped += cells.len();
            }
        }
    }
}

/// Offset that keeps the first on-grid entity's footprint on whole cells.
fn entity_offset(entities: &[EntityRecord]) -> (f64, f64) {
    let first = entities.iter().find_map(|e| {
        prototypes::entity(&e.name)
            .filter(|p| !p.placeable_off_grid)
            .map(|p| (e, p.size(e.direction)))
    });
    let align = |v: f64| if v.fract() == 0.0 { 0.0 } else { 0.5 };
    match first {
        Some((e, (w, h))) => (
            IMPORT_ORIGIN + align(e.position.x - w as f64 / 2.0),
            IMPORT_ORIGIN + align(e.position.y - h as f64 / 2.0),
        ),
        None => (IMPORT_ORIGIN, IMPORT_ORIGIN),
    }
}

fn import_entities(
    store: &mut EntityStore,
    entities: &[EntityRecord],
    report: &mut ImportReport,
) -> Result<(), IoError> {
    let (dx, dy) = entity_offset(entities);
    let mut created: HashMap<u32, EntityId> = HashMap::new();

    for record in entities {
        let modules = record
            .items
            .iter()
            .flat_map(|(item, count)| std::iter::repeat(item.clone()).take(*count as usize))
            .collect();
        let mut descriptor = EntityDescriptor::new(&record.name, record.position.translate(dx, dy))
            .with_direction(record.direction)
            .with_modules(modules);
        descriptor.recipe = record.recipe.clone();

        let emit = Emit {
            notify_peer: false,
            sort: false,
        };
        match store.create_entity(descriptor, emit) {
            Ok(id) => {
                created.insert(record.entity_number, id);
                report.entities += 1;
            }
            Err(err) => {
                log::warn!("skipping entity {} '{}': {}", record.entity_number, record.name, err);
                report.skipped += 1;
            }
        }
    }

    for record in entities {
        let Some(id) = created.get(&record.entity_number) else {
            continue;
        };
        for neighbour in &record.neighbours {
            if let Some(other) = created.get(neighbour) {
                store.connect(*id, *other)?;
            }
        }
    }
    Ok(())
}

// ── Reader / Writer ───────────────────────────────────────────────────

pub struct BlueprintReader<R: Read> {
    reader: R,
}

impl<R: Read> BlueprintReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Parse a `{"blueprint": …}` envelope.
    pub fn read(self) -> Result<BlueprintDocument, IoError> {
        let envelope: BlueprintEnvelope = serde_json::from_reader(self.reader)?;
        if envelope.blueprint.item != ITEM {
            return Err(IoError::UnsupportedItem(envelope.blueprint.item));
        }
        Ok(envelope.blueprint)
    }
}

pub struct BlueprintWriter<W: Write> {
    writer: W,
}

impl<W: Write> BlueprintWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write(&mut self, document: &BlueprintDocument) -> Result<(), IoError> {
        let envelope = BlueprintEnvelope {
            blueprint: document.clone(),
        };
        serde_json::to_writer_pretty(&mut self.writer, &envelope)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factoryplan_core::prototypes::{PIPE, PUMPJACK, STRAIGHT_RAIL};

    fn place(store: &mut EntityStore, name: &str, x: f64, y: f64) -> EntityId {
        store
            .create_entity(EntityDescriptor::new(name, Position::new(x, y)), Emit::default())
            .unwrap()
    }

    #[test]
    fn test_export_renumbers_in_id_order() {
        let mut store = EntityStore::with_seed("export", 11);
        let ids = [
            place(&mut store, PIPE, 2010.5, 2000.5),
            place(&mut store, PIPE, 2000.5, 2000.5),
            place(&mut store, PIPE, 2005.5, 2003.5),
        ];
        store.connect(ids[0], ids[1]).unwrap();

        let document = export(&store);
        let entities = document.entities.unwrap();
        let numbers: Vec<u32> = entities.iter().map(|e| e.entity_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        // Identifiers encode x first, so x order is id order here.
        let xs: Vec<f64> = entities.iter().map(|e| e.position.x).collect();
        assert!(xs.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(entities[0].neighbours, vec![3]);
        assert_eq!(entities[2].neighbours, vec![1]);
    }

    #[test]
    fn test_export_ignores_creation_order() {
        let build = |xs: [f64; 3]| {
            let mut store = EntityStore::with_seed("order", 5);
            for x in xs {
                place(&mut store, PIPE, x, 0.5);
            }
            place(&mut store, PUMPJACK, 4.5, 4.5);
            let mut bytes = Vec::new();
            BlueprintWriter::new(&mut bytes).write(&export(&store)).unwrap();
            bytes
        };
        // Negative cells fall back to counter identifiers.
        let forward = build([-3.5, -10.5, 1.5]);
        let backward = build([1.5, -10.5, -3.5]);
        assert_eq!(String::from_utf8(forward).unwrap(), String::from_utf8(backward).unwrap());
    }

    #[test]
    fn test_counter_identifiers_number_by_cell() {
        let mut store = EntityStore::with_seed("counter", 2);
        place(&mut store, PIPE, -3.5, 0.5);
        place(&mut store, PIPE, -10.5, 0.5);
        let entities = export(&store).entities.unwrap();
        assert_eq!(entities[0].entity_number, 1);
        assert!(entities[0].position.x < entities[1].position.x);
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let mut store = EntityStore::with_seed("tiles", 1);
        store.create_tiles("concrete", &[CellCoord::new(0, 0)]).unwrap();
        let json = serde_json::to_value(export(&store)).unwrap();
        assert!(json.get("entities").is_none());
        assert_eq!(json["tiles"].as_array().map(Vec::len), Some(1));
        assert_eq!(json["icons"][0]["index"], 1);
        assert_eq!(json["icons"][0]["signal"]["name"], "concrete");
        assert_eq!(json["version"], 73015361536u64);
    }

    #[test]
    fn test_direction_is_omitted_when_north() {
        let mut store = EntityStore::with_seed("dir", 1);
        let id = place(&mut store, PUMPJACK, 1.5, 1.5);
        place(&mut store, PIPE, 10.5, 1.5);
        store.update_entity(id, |e| e.direction = Direction::East).unwrap();
        let json = serde_json::to_value(export(&store)).unwrap();
        let entities = json["entities"].as_array().unwrap();
        assert_eq!(entities[0]["direction"], 2);
        assert!(entities[1].get("direction").is_none());
    }

    #[test]
    fn test_round_trip_at_import_origin_is_exact() {
        let mut store = EntityStore::with_seed("round trip", 5);
        place(&mut store, PUMPJACK, 1999.5, 1999.5);
        place(&mut store, PIPE, 2001.5, 2001.5);
        store
            .create_tiles("stone_path", &[CellCoord::new(2000, 1998), CellCoord::new(1998, 2001)])
            .unwrap();
        assert_eq!(store.center(), Position::new(2000.5, 2000.5));

        let document = export(&store);
        let mut restored = EntityStore::with_seed("restored", 6);
        let report = import(&mut restored, &document).unwrap();
        assert_eq!(report, ImportReport { entities: 2, tiles: 2, skipped: 0 });

        let tuples = |s: &EntityStore| -> Vec<(String, (i64, i64), Direction)> {
            let mut v: Vec<_> = s
                .entities()
                .map(|e| (e.name.clone(), ((e.position.x * 2.0) as i64, (e.position.y * 2.0) as i64), e.direction))
                .collect();
            v.sort();
            v
        };
        assert_eq!(tuples(&store), tuples(&restored));
        let cells = |s: &EntityStore| s.tiles().map(|t| t.position).collect::<Vec<_>>();
        assert_eq!(cells(&store), cells(&restored));
        assert!(!restored.can_undo());
        assert_eq!(restored.label, "round trip");
    }

    #[test]
    fn test_unknown_entities_are_skipped() {
        let document = BlueprintDocument {
            icons: Vec::new(),
            entities: Some(vec![
                EntityRecord {
                    entity_number: 1,
                    name: "iron_ore".into(),
                    position: Position::new(0.5, 0.5),
                    direction: Direction::North,
                    items: BTreeMap::new(),
                    recipe: None,
                    neighbours: Vec::new(),
                },
                EntityRecord {
                    entity_number: 2,
                    name: PIPE.into(),
                    position: Position::new(2.5, 0.5),
                    direction: Direction::North,
                    items: BTreeMap::new(),
                    recipe: None,
                    neighbours: vec![1],
                },
            ]),
            tiles: None,
            item: ITEM.into(),
            version: EXPORT_VERSION,
            label: String::new(),
        };
        let mut store = EntityStore::with_seed("skip", 1);
        let report = import(&mut store, &document).unwrap();
        assert_eq!(report.entities, 1);
        assert_eq!(report.skipped, 1);
        assert!(store.entities().all(|e| e.connections.is_empty()));
    }

    #[test]
    fn test_rails_keep_export_centre_on_rail_grid() {
        let mut store = EntityStore::with_seed("rails", 1);
        place(&mut store, STRAIGHT_RAIL, 1.0, 1.0);
        place(&mut store, PIPE, 4.5, 0.5);
        let document = export(&store);
        let rail = &document.entities.unwrap()[0];
        assert_eq!(rail.name, STRAIGHT_RAIL);
        assert_eq!(rail.position.x % 2.0, 0.0);
        assert_eq!(rail.position.y % 2.0, 0.0);
    }

    #[test]
    fn test_reader_and_writer() {
        let mut store = EntityStore::with_seed("io", 1);
        place(&mut store, PUMPJACK, 1.5, 1.5);
        let document = export(&store);

        let mut writer = BlueprintWriter::new(Vec::new());
        writer.write(&document).unwrap();
        let bytes = writer.into_inner();
        let read = BlueprintReader::new(bytes.as_slice()).read().unwrap();
        assert_eq!(read, document);

        let bogus = br#"{"blueprint": {"item": "deconstruction_planner", "version": 1}}"#;
        assert!(matches!(
            BlueprintReader::new(&bogus[..]).read(),
            Err(IoError::UnsupportedItem(_))
        ));
    }
}
