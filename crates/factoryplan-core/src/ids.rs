//! Entity identifiers derived from grid coordinates.
//!
//! Layout: `"1" + x(7 digits) + y(7 digits) + "000" + suffix(6 digits)`,
//! 24 decimal digits in total, which needs a `u128`.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geometry::{CellCoord, Position};

/// Largest coordinate that fits the 7-digit fields.
pub const MAX_ENCODED_COORD: i64 = 9_999_999;

const ENCODED_LEN: usize = 24;
const SUFFIX_RANGE: u32 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u128);

impl EntityId {
    pub fn value(self) -> u128 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encode a position and a disambiguating suffix; `None` when either
/// coordinate falls outside `0..=MAX_ENCODED_COORD`.
pub fn encode_with_suffix(position: Position, suffix: u32) -> Option<EntityId> {
    let cell = position.cell();
    if !(0..=MAX_ENCODED_COORD).contains(&cell.x) || !(0..=MAX_ENCODED_COORD).contains(&cell.y) {
        return None;
    }
    let text = format!(
        "1{:07}{:07}000{:06}",
        cell.x,
        cell.y,
        suffix % SUFFIX_RANGE
    );
    text.parse().ok().map(EntityId)
}

/// Encode a position with a random six-digit suffix.
pub fn encode<R: Rng>(position: Position, rng: &mut R) -> Option<EntityId> {
    encode_with_suffix(position, rng.gen_range(0..SUFFIX_RANGE))
}

/// Recover the grid cell an encoded identifier was derived from.
///
/// Counter-allocated identifiers do not carry a position and decode to `None`.
pub fn decode(id: EntityId) -> Option<CellCoord> {
    let text = id.0.to_string();
    if text.len() != ENCODED_LEN || !text.starts_with('1') {
        return None;
    }
    let x = text.get(1..8)?.parse().ok()?;
    let y = text.get(8..15)?.parse().ok()?;
    Some(CellCoord::new(x, y))
}
