use serde::{Deserialize, Serialize};

use crate::geometry::{BBox, CellCoord, CellRect, Direction, Position};
use crate::ids::EntityId;
use crate::prototypes::{self, EntityPrototype};

/// What a caller asks the store to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Pre-assigned identifier, e.g. replayed from the sync peer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    pub name: String,
    pub position: Position,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<String>,
}

impl EntityDescriptor {
    pub fn new(name: &str, position: Position) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            position,
            direction: Direction::North,
            modules: Vec::new(),
            recipe: None,
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_modules(mut self, modules: Vec<String>) -> Self {
        self.modules = modules;
        self
    }
}

/// A placed entity. Owned by the store; everything else refers to it by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub position: Position,
    pub direction: Direction,
    pub modules: Vec<String>,
    pub recipe: Option<String>,
    /// Wire neighbours, resolved through the store. Dangling ids mean "no connection".
    pub connections: Vec<EntityId>,
}

impl Entity {
    pub(crate) fn from_descriptor(id: EntityId, descriptor: EntityDescriptor) -> Self {
        Self {
            id,
            name: descriptor.name,
            position: descriptor.position,
            direction: descriptor.direction,
            modules: descriptor.modules,
            recipe: descriptor.recipe,
            connections: Vec::new(),
        }
    }

    pub fn prototype(&self) -> Option<&'static EntityPrototype> {
        prototypes::entity(&self.name)
    }

    /// Footprint size after rotation, `1×1` for names without a prototype.
    pub fn size(&self) -> (u32, u32) {
        self.prototype()
            .map(|p| p.size(self.direction))
            .unwrap_or((1, 1))
    }

    pub fn footprint(&self) -> CellRect {
        let (width, height) = self.size();
        CellRect::centered(self.position, width, height)
    }

    pub fn cells(&self) -> Vec<CellCoord> {
        self.footprint().cells().collect()
    }

    pub fn bbox(&self) -> BBox {
        let (width, height) = self.size();
        let half_w = width as f64 / 2.0;
        let half_h = height as f64 / 2.0;
        BBox::new(
            self.position.translate(-half_w, -half_h),
            self.position.translate(half_w, half_h),
        )
    }

    pub fn top_left(&self) -> Position {
        self.bbox().min
    }

    pub fn top_right(&self) -> Position {
        let b = self.bbox();
        Position::new(b.max.x, b.min.y)
    }

    pub fn bottom_left(&self) -> Position {
        let b = self.bbox();
        Position::new(b.min.x, b.max.y)
    }

    pub fn bottom_right(&self) -> Position {
        self.bbox().max
    }

    pub fn item_name(&self) -> &str {
        self.prototype().map(|p| p.item).unwrap_or(self.name.as_str())
    }

    /// Copy the settings that survive a fast replace.
    pub fn paste_settings(&mut self, from: &Entity) {
        let slots = self.prototype().map(|p| p.module_slots).unwrap_or(0) as usize;
        self.modules = from.modules.iter().take(slots).cloned().collect();
        self.recipe = from.recipe.clone();
    }
}

/// A ground covering. Identity is its cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub name: String,
    pub position: CellCoord,
}

impl Tile {
    pub fn new(name: &str, position: CellCoord) -> Self {
        Self {
            name: name.to_string(),
            position,
        }
    }

    pub fn bbox(&self) -> BBox {
        CellRect::new(self.position, 1, 1).bbox()
    }

    pub fn item_name(&self) -> &str {
        prototypes::tile(&self.name)
            .map(|p| p.item)
            .unwrap_or(self.name.as_str())
    }
}
