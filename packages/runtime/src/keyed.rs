//! Keyed list reconciliation
//!
//! [`diff_keys`] classifies every key of a re-render in one left-to-right
//! pass over the new order. The previous order is edited in place while
//! scanning (removals dropped first, then each out-of-place key swapped into
//! its slot), so a key whose index only shifted because earlier keys were
//! removed is reported as unchanged rather than moved.
//!
//! Apply the result in order: removals, then moves (each a swap of two
//! existing entries), then additions (each inserted after its anchor, which
//! is either the template or the key before it in the new order).

use indexmap::IndexSet;
use std::hash::Hash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedDiff<K> {
    /// Keys that no longer appear
    pub removes: Vec<K>,
    /// `(key_in_spot, key_for_spot)`: swap these two entries
    pub moves: Vec<(K, K)>,
    /// `(anchor, index)`: insert `next[index]` after `anchor` (`None` is the list start)
    pub adds: Vec<(Option<K>, usize)>,
    /// Retained keys whose entries stay where they are
    pub sames: Vec<K>,
}

impl<K> KeyedDiff<K> {
    pub fn is_noop(&self) -> bool {
        self.removes.is_empty() && self.moves.is_empty() && self.adds.is_empty()
    }
}

pub fn diff_keys<K: Eq + Hash + Clone>(previous: &[K], next: &[K]) -> KeyedDiff<K> {
    let wanted: IndexSet<&K> = next.iter().collect();
    let removes: Vec<K> = previous.iter().filter(|key| !wanted.contains(key)).cloned().collect();

    let mut order: Vec<K> = previous.iter().filter(|key| wanted.contains(key)).cloned().collect();
    let mut moves = Vec::new();
    let mut adds = Vec::new();
    let mut sames = Vec::new();
    let mut anchor: Option<K> = None;

    for (index, key) in next.iter().enumerate() {
        match order.iter().position(|candidate| candidate == key) {
            None => {
                order.insert(index.min(order.len()), key.clone());
                adds.push((anchor.clone(), index));
            }
            // Every slot before `index` already matches `next`, so a misplaced
            // key always sits further right.
            Some(prev_index) if prev_index != index => {
                let in_spot = order.remove(index);
                let for_spot = order.remove(prev_index - 1);
                order.insert(index, for_spot.clone());
                order.insert(prev_index, in_spot.clone());
                moves.push((in_spot, for_spot));
            }
            Some(_) => sames.push(key.clone()),
        }
        anchor = Some(key.clone());
    }

    KeyedDiff {
        removes,
        moves,
        adds,
        sames,
    }
}

/// Indices to keep when several items share a key (the first one wins) and
/// the duplicated keys, once each, in order of their second occurrence
pub fn first_occurrences<K: Eq + Hash + Clone>(keys: &[K]) -> (Vec<usize>, Vec<K>) {
    let mut seen: IndexSet<&K> = IndexSet::new();
    let mut duplicates: IndexSet<K> = IndexSet::new();
    let mut kept = Vec::with_capacity(keys.len());
    for (index, key) in keys.iter().enumerate() {
        if seen.insert(key) {
            kept.push(index);
        } else {
            duplicates.insert(key.clone());
        }
    }
    (kept, duplicates.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays a diff on the previous order, the way the list directive
    /// applies it to the DOM
    fn apply(previous: &[&'static str], next: &[&'static str]) -> Vec<&'static str> {
        let diff = diff_keys(previous, next);
        let mut order: Vec<&str> = previous.iter().copied().filter(|k| !diff.removes.contains(k)).collect();
        for (in_spot, for_spot) in &diff.moves {
            let a = order.iter().position(|k| k == in_spot).unwrap();
            let b = order.iter().position(|k| k == for_spot).unwrap();
            order.swap(a, b);
        }
        for (anchor, index) in &diff.adds {
            let at = match anchor {
                None => 0,
                Some(anchor) => order.iter().position(|k| k == anchor).unwrap() + 1,
            };
            order.insert(at, next[*index]);
        }
        order
    }

    #[test]
    fn test_swap_with_removal_and_append() {
        let diff = diff_keys(&["a", "b", "c", "d"], &["a", "c", "b", "e"]);
        assert_eq!(diff.removes, vec!["d"]);
        assert_eq!(diff.moves, vec![("b", "c")]);
        assert_eq!(diff.adds, vec![(Some("b"), 3)]);
        assert_eq!(diff.sames, vec!["a", "b"]);
        assert_eq!(apply(&["a", "b", "c", "d"], &["a", "c", "b", "e"]), vec!["a", "c", "b", "e"]);
    }

    #[test]
    fn test_shift_after_removal_is_not_a_move() {
        let diff = diff_keys(&["a", "b", "c"], &["b", "c"]);
        assert_eq!(diff.removes, vec!["a"]);
        assert!(diff.moves.is_empty());
        assert_eq!(diff.sames, vec!["b", "c"]);
    }

    #[test]
    fn test_prepend_anchors_at_start() {
        let diff = diff_keys(&["b"], &["a", "b"]);
        assert_eq!(diff.adds, vec![(None, 0)]);
        assert_eq!(diff.sames, vec!["b"]);
    }

    #[test]
    fn test_unchanged_order_is_noop() {
        assert!(diff_keys(&["a", "b"], &["a", "b"]).is_noop());
        assert!(diff_keys::<&str>(&[], &[]).is_noop());
    }

    #[test]
    fn test_replays_reach_the_new_order() {
        let cases: &[(&[&str], &[&str])] = &[
            (&["a", "b", "c", "d"], &["d", "c", "b", "a"]),
            (&["a", "b", "c"], &["c", "a", "x", "b"]),
            (&[], &["a", "b"]),
            (&["a", "b"], &[]),
            (&["a", "b", "c", "d", "e"], &["e", "b", "a", "z", "d"]),
        ];
        for (previous, next) in cases {
            assert_eq!(apply(previous, next), next.to_vec(), "{previous:?} -> {next:?}");
        }
    }

    #[test]
    fn test_first_occurrence_wins() {
        let (kept, duplicates) = first_occurrences(&["x", "y", "x", "x"]);
        assert_eq!(kept, vec![0, 1]);
        assert_eq!(duplicates, vec!["x"]);
    }
}
