//! Blueprint icon selection.

use std::collections::BTreeMap;

use crate::prototypes;
use crate::store::EntityStore;

/// Pick up to two icon item names for the store's contents.
///
/// Entities are ranked by `count × footprint area`. The runner-up is kept
/// only when it is larger than one cell and scores above 40% of the leader.
/// A store holding only tiles gets its most common tile item.
pub fn generate_icons(store: &EntityStore) -> Vec<String> {
    if store.entity_count() > 0 {
        let counts = count_items(store.entities().map(|e| e.item_name()));
        select_by_score(counts)
    } else if store.tile_count() > 0 {
        let counts = count_items(store.tiles().map(|t| t.item_name()));
        select_by_count(counts)
    } else {
        Vec::new()
    }
}

fn count_items<'a>(items: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for item in items {
        *counts.entry(item).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(item, count)| (item.to_string(), count))
        .collect()
}

fn select_by_score(mut counts: Vec<(String, usize)>) -> Vec<String> {
    let score = |(item, count): &(String, usize)| prototypes::item_area(item) as usize * count;
    counts.sort_by(|a, b| score(b).cmp(&score(a)).then_with(|| a.0.cmp(&b.0)));

    let mut icons = Vec::new();
    let mut ranked = counts.iter();
    let Some(top) = ranked.next() else {
        return icons;
    };
    icons.push(top.0.clone());
    if let Some(second) = ranked.next() {
        // score(second) * 2.5 > score(top), kept in integers
        if prototypes::item_area(&second.0) > 1 && score(second) * 5 > score(top) * 2 {
            icons.push(second.0.clone());
        }
    }
    icons
}

fn select_by_count(mut counts: Vec<(String, usize)>) -> Vec<String> {
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts.into_iter().take(1).map(|(item, _)| item).collect()
}
