//! Static data for every placeable entity and tile type.
//!
//! Names use underscores (`pipe_to_ground`); the sync peer expects dashes and
//! converts at its boundary.

use crate::geometry::Direction;

/// Resource and decoration names that can never be placed in a layout.
pub const NOT_PLACEABLE: [&str; 7] = [
    "coal",
    "stone",
    "rock_huge",
    "rock_big",
    "sand_rock_big",
    "iron_ore",
    "copper_ore",
];

pub const PUMPJACK: &str = "pumpjack";
pub const PIPE: &str = "pipe";
pub const PIPE_TO_GROUND: &str = "pipe_to_ground";
pub const BEACON: &str = "beacon";
pub const MEDIUM_ELECTRIC_POLE: &str = "medium_electric_pole";
pub const STRAIGHT_RAIL: &str = "straight_rail";

/// Signal category an item is exported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Item,
    Fluid,
    Virtual,
}

impl ItemType {
    pub fn signal_type(self) -> &'static str {
        match self {
            ItemType::Item => "item",
            ItemType::Fluid => "fluid",
            ItemType::Virtual => "virtual",
        }
    }
}

/// Behaviour-bearing categories the generators care about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityKind {
    Plain,
    Pipe,
    UndergroundPipe { max_distance: u32 },
    Beacon { effect_distance: u32 },
    ElectricPole { supply_distance: f64, wire_reach: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityPrototype {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub item: &'static str,
    pub kind: EntityKind,
    pub module_slots: u32,
    pub placeable_off_grid: bool,
    pub electric: bool,
}

impl EntityPrototype {
    const fn plain(name: &'static str, width: u32, height: u32) -> Self {
        Self {
            name,
            width,
            height,
            item: name,
            kind: EntityKind::Plain,
            module_slots: 0,
            placeable_off_grid: false,
            electric: false,
        }
    }

    const fn electric(mut self, module_slots: u32) -> Self {
        self.electric = true;
        self.module_slots = module_slots;
        self
    }

    const fn kind(mut self, kind: EntityKind) -> Self {
        self.kind = kind;
        self
    }

    const fn item(mut self, item: &'static str) -> Self {
        self.item = item;
        self
    }

    /// Footprint `(width, height)` once rotated to `direction`.
    pub fn size(&self, direction: Direction) -> (u32, u32) {
        if direction.is_horizontal() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    pub fn area(&self) -> u32 {
        self.width * self.height
    }
}

static ENTITIES: &[EntityPrototype] = &[
    EntityPrototype::plain(PUMPJACK, 3, 3).electric(2),
    EntityPrototype::plain(PIPE, 1, 1).kind(EntityKind::Pipe),
    EntityPrototype::plain(PIPE_TO_GROUND, 1, 1)
        .kind(EntityKind::UndergroundPipe { max_distance: 10 }),
    EntityPrototype::plain(BEACON, 3, 3)
        .electric(2)
        .kind(EntityKind::Beacon { effect_distance: 3 }),
    EntityPrototype::plain("small_electric_pole", 1, 1).kind(EntityKind::ElectricPole {
        supply_distance: 2.5,
        wire_reach: 7.5,
    }),
    EntityPrototype::plain(MEDIUM_ELECTRIC_POLE, 1, 1).kind(EntityKind::ElectricPole {
        supply_distance: 3.5,
        wire_reach: 9.0,
    }),
    EntityPrototype::plain("big_electric_pole", 2, 2).kind(EntityKind::ElectricPole {
        supply_distance: 2.0,
        wire_reach: 30.0,
    }),
    EntityPrototype::plain("substation", 2, 2).kind(EntityKind::ElectricPole {
        supply_distance: 9.0,
        wire_reach: 18.0,
    }),
    EntityPrototype::plain("assembling_machine_1", 3, 3).electric(0),
    EntityPrototype::plain("assembling_machine_2", 3, 3).electric(2),
    EntityPrototype::plain("assembling_machine_3", 3, 3).electric(4),
    EntityPrototype::plain("electric_mining_drill", 3, 3).electric(3),
    EntityPrototype::plain("chemical_plant", 3, 3).electric(3),
    EntityPrototype::plain("oil_refinery", 5, 5).electric(3),
    EntityPrototype::plain("lab", 3, 3).electric(2),
    EntityPrototype::plain("roboport", 4, 4).electric(0),
    EntityPrototype::plain("electric_furnace", 3, 3).electric(2),
    EntityPrototype::plain("stone_furnace", 2, 2),
    EntityPrototype::plain("steel_furnace", 2, 2),
    EntityPrototype::plain("storage_tank", 3, 3),
    EntityPrototype::plain("pump", 1, 2).electric(0),
    EntityPrototype::plain("offshore_pump", 1, 2),
    EntityPrototype::plain("transport_belt", 1, 1),
    EntityPrototype::plain("underground_belt", 1, 1),
    EntityPrototype::plain("splitter", 2, 1),
    EntityPrototype::plain("inserter", 1, 1).electric(0),
    EntityPrototype::plain("fast_inserter", 1, 1).electric(0),
    EntityPrototype::plain("wooden_chest", 1, 1),
    EntityPrototype::plain("iron_chest", 1, 1),
    EntityPrototype::plain("steel_chest", 1, 1),
    EntityPrototype::plain("solar_panel", 3, 3),
    EntityPrototype::plain("accumulator", 2, 2),
    EntityPrototype::plain("radar", 3, 3).electric(0),
    EntityPrototype::plain("small_lamp", 1, 1).electric(0),
    EntityPrototype::plain(STRAIGHT_RAIL, 2, 2).item("rail"),
    EntityPrototype::plain("rail_signal", 1, 1),
];

/// A ground covering type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePrototype {
    pub name: &'static str,
    pub item: &'static str,
}

static TILES: &[TilePrototype] = &[
    TilePrototype { name: "stone_path", item: "stone_brick" },
    TilePrototype { name: "concrete", item: "concrete" },
    TilePrototype { name: "hazard_concrete_left", item: "hazard_concrete" },
    TilePrototype { name: "hazard_concrete_right", item: "hazard_concrete" },
    TilePrototype { name: "refined_concrete", item: "refined_concrete" },
    TilePrototype { name: "refined_hazard_concrete_left", item: "refined_hazard_concrete" },
    TilePrototype { name: "refined_hazard_concrete_right", item: "refined_hazard_concrete" },
    TilePrototype { name: "landfill", item: "landfill" },
];

static FLUIDS: &[&str] = &["crude_oil", "water", "steam", "petroleum_gas"];

pub fn entity(name: &str) -> Option<&'static EntityPrototype> {
    ENTITIES.iter().find(|p| p.name == name)
}

pub fn tile(name: &str) -> Option<&'static TilePrototype> {
    TILES.iter().find(|p| p.name == name)
}

pub fn is_placeable(name: &str) -> bool {
    !NOT_PLACEABLE.contains(&name)
}

/// Footprint area of the entity an item places, `1` for anything else.
pub fn item_area(item: &str) -> u32 {
    ENTITIES
        .iter()
        .find(|p| p.item == item)
        .map(|p| p.area())
        .unwrap_or(1)
}

pub fn item_type(item: &str) -> ItemType {
    if FLUIDS.contains(&item) {
        ItemType::Fluid
    } else if item.starts_with("signal_") {
        ItemType::Virtual
    } else {
        ItemType::Item
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotated_size() {
        let pump = entity("pump").unwrap();
        assert_eq!(pump.size(Direction::North), (1, 2));
        assert_eq!(pump.size(Direction::East), (2, 1));
    }

    #[test]
    fn test_resources_are_not_placeable() {
        assert!(!is_placeable("iron_ore"));
        assert!(is_placeable(PUMPJACK));
        assert!(entity("iron_ore").is_none());
    }

    #[test]
    fn test_item_lookup() {
        assert_eq!(entity(STRAIGHT_RAIL).unwrap().item, "rail");
        assert_eq!(item_area("rail"), 4);
        assert_eq!(item_area("stone_brick"), 1);
        assert_eq!(item_type("crude_oil"), ItemType::Fluid);
        assert_eq!(item_type("signal_A"), ItemType::Virtual);
        assert_eq!(tile("stone_path").unwrap().item, "stone_brick");
    }
}
