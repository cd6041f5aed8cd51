//! Keyed collection builds with last-write-wins semantics.

use std::collections::HashMap;
use std::hash::Hash;

/// Collapse `(key, value)` pairs so each key appears once.
///
/// A key keeps the position of its first appearance and the value of its
/// last, like repeatedly assigning into an insertion-ordered map.
pub(crate) fn last_wins<K, V, I>(items: I) -> Vec<(K, V)>
where
    K: Hash + Eq + Clone,
    I: IntoIterator<Item = (K, V)>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut out: Vec<(K, V)> = Vec::new();
    for (key, value) in items {
        match index.get(&key) {
            Some(&i) => out[i].1 = value,
            None => {
                index.insert(key.clone(), out.len());
                out.push((key, value));
            }
        }
    }
    out
}
