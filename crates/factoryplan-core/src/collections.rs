//! Query helpers over the store's ordered maps.

use std::collections::BTreeMap;

/// The first value, in key order, matching `predicate`.
pub fn find_first<'a, K, V, P>(map: &'a BTreeMap<K, V>, mut predicate: P) -> Option<&'a V>
where
    P: FnMut(&K, &V) -> bool,
{
    map.iter().find(|&(k, v)| predicate(k, v)).map(|(_, v)| v)
}

/// Every value, in key order, matching `predicate`.
pub fn filter_all<'a, K, V, P>(map: &'a BTreeMap<K, V>, mut predicate: P) -> Vec<&'a V>
where
    P: FnMut(&K, &V) -> bool,
{
    map.iter()
        .filter(|&(k, v)| predicate(k, v))
        .map(|(_, v)| v)
        .collect()
}
