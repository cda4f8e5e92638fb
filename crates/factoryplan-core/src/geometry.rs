use serde::{Deserialize, Serialize};

/// A position on the layout plane, measured in cells.
///
/// Entity positions name the centre of the footprint, so a 1x1 entity sits
/// at `n + 0.5` and a 2x2 entity on a whole number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// The cell containing this position.
    pub fn cell(&self) -> CellCoord {
        CellCoord::new(self.x.floor() as i64, self.y.floor() as i64)
    }
}

/// Integer grid cell, identified by its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    pub x: i64,
    pub y: i64,
}

impl CellCoord {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, dx: i64, dy: i64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn step(&self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        self.offset(dx, dy)
    }

    pub fn center(&self) -> Position {
        Position::new(self.x as f64 + 0.5, self.y as f64 + 0.5)
    }

    pub fn manhattan(&self, other: &CellCoord) -> u64 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// The four orthogonal neighbours, in north, east, south, west order.
    pub fn neighbours(&self) -> [CellCoord; 4] {
        Direction::CARDINALS.map(|d| self.step(d))
    }
}

/// One of the eight compass directions, numbered clockwise from north.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Direction {
    #[default]
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    pub const CARDINALS: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        Some(match index {
            0 => Direction::North,
            1 => Direction::NorthEast,
            2 => Direction::East,
            3 => Direction::SouthEast,
            4 => Direction::South,
            5 => Direction::SouthWest,
            6 => Direction::West,
            7 => Direction::NorthWest,
            _ => return None,
        })
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn opposite(self) -> Self {
        Self::from_index((self.index() + 4) % 8).unwrap_or_default()
    }

    /// Whether a footprint placed in this direction swaps width and height.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::East | Direction::West)
    }

    /// Unit step in grid coordinates (y grows southwards).
    pub fn delta(self) -> (i64, i64) {
        match self {
            Direction::North => (0, -1),
            Direction::NorthEast => (1, -1),
            Direction::East => (1, 0),
            Direction::SouthEast => (1, 1),
            Direction::South => (0, 1),
            Direction::SouthWest => (-1, 1),
            Direction::West => (-1, 0),
            Direction::NorthWest => (-1, -1),
        }
    }
}

impl From<Direction> for u8 {
    fn from(direction: Direction) -> u8 {
        direction.index()
    }
}

impl TryFrom<u8> for Direction {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Direction::from_index(value).ok_or_else(|| format!("invalid direction {value}"))
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Position,
    pub max: Position,
}

impl BBox {
    pub fn new(min: Position, max: Position) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Position {
        Position::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    pub fn union(&self, other: &BBox) -> Self {
        Self {
            min: Position::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Position::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }
}

/// A rectangle of whole cells: `width × height` cells starting at `origin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRect {
    pub origin: CellCoord,
    pub width: u32,
    pub height: u32,
}

impl CellRect {
    pub fn new(origin: CellCoord, width: u32, height: u32) -> Self {
        Self {
            origin,
            width,
            height,
        }
    }

    /// The rectangle of cells a `width × height` footprint covers when centred at `center`.
    pub fn centered(center: Position, width: u32, height: u32) -> Self {
        let left = (center.x - width as f64 / 2.0).round() as i64;
        let top = (center.y - height as f64 / 2.0).round() as i64;
        Self::new(CellCoord::new(left, top), width, height)
    }

    /// Inclusive bottom-right cell.
    pub fn last(&self) -> CellCoord {
        self.origin
            .offset(self.width as i64 - 1, self.height as i64 - 1)
    }

    pub fn center(&self) -> Position {
        Position::new(
            self.origin.x as f64 + self.width as f64 / 2.0,
            self.origin.y as f64 + self.height as f64 / 2.0,
        )
    }

    pub fn area(&self) -> u32 {
        self.width * self.height
    }

    pub fn contains(&self, cell: &CellCoord) -> bool {
        let last = self.last();
        cell.x >= self.origin.x && cell.x <= last.x && cell.y >= self.origin.y && cell.y <= last.y
    }

    pub fn intersects(&self, other: &CellRect) -> bool {
        let a = self.last();
        let b = other.last();
        self.origin.x <= b.x && a.x >= other.origin.x && self.origin.y <= b.y && a.y >= other.origin.y
    }

    /// Grow the rectangle by `margin` cells on every side.
    pub fn expand(&self, margin: u32) -> Self {
        Self::new(
            self.origin.offset(-(margin as i64), -(margin as i64)),
            self.width + 2 * margin,
            self.height + 2 * margin,
        )
    }

    pub fn union(&self, other: &CellRect) -> Self {
        let a = self.last();
        let b = other.last();
        let min = CellCoord::new(self.origin.x.min(other.origin.x), self.origin.y.min(other.origin.y));
        let max = CellCoord::new(a.x.max(b.x), a.y.max(b.y));
        Self::new(min, (max.x - min.x + 1) as u32, (max.y - min.y + 1) as u32)
    }

    /// Cells in row-major (scan) order.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        let origin = self.origin;
        let width = self.width as i64;
        (0..self.height as i64)
            .flat_map(move |dy| (0..width).map(move |dx| origin.offset(dx, dy)))
    }

    pub fn bbox(&self) -> BBox {
        BBox::new(
            Position::new(self.origin.x as f64, self.origin.y as f64),
            Position::new(
                (self.origin.x + self.width as i64) as f64,
                (self.origin.y + self.height as i64) as f64,
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_distance() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_centered_rect_for_odd_and_even_sizes() {
        let three = CellRect::centered(Position::new(1.5, 1.5), 3, 3);
        assert_eq!(three.origin, CellCoord::new(0, 0));
        assert_eq!(three.last(), CellCoord::new(2, 2));

        let two = CellRect::centered(Position::new(4.0, 4.0), 2, 2);
        assert_eq!(two.origin, CellCoord::new(3, 3));
        assert_eq!(two.cells().count(), 4);
    }

    #[test]
    fn test_rect_intersection() {
        let a = CellRect::new(CellCoord::new(0, 0), 3, 3);
        let b = CellRect::new(CellCoord::new(2, 2), 3, 3);
        let c = CellRect::new(CellCoord::new(3, 0), 1, 1);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_direction_opposite_and_serde() {
        assert_eq!(Direction::North.opposite(), Direction::South);
        assert_eq!(Direction::West.opposite(), Direction::East);
        let json = serde_json::to_string(&Direction::East).unwrap();
        assert_eq!(json, "2");
        let back: Direction = serde_json::from_str("6").unwrap();
        assert_eq!(back, Direction::West);
    }
}
