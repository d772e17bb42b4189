mod iterator;
mod node;
mod pool;

use iterator::ArtIterator;
use node::{Kind, Node};
use pool::NodePool;

use crate::index::{MemTable, MemValue};
use crate::options::ArtOptions;

/// An Adaptive Radix Tree keyed on raw byte strings, used as the engine's
/// sole in-memory index. Path-compressed, with per-kind node pools backing
/// allocation and recycling.
pub struct AdaptiveRadixTree {
    root: Option<Box<Node>>,
    pool: NodePool,
    size: i64,
}

impl AdaptiveRadixTree {
    pub fn new(opts: ArtOptions) -> Self {
        Self { root: None, pool: NodePool::new(opts), size: 0 }
    }
}

fn longest_common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

impl MemTable for AdaptiveRadixTree {
    fn get(&self, key: &[u8]) -> Option<MemValue> {
        if key.is_empty() {
            return None;
        }

        let mut cp = self.root.as_deref();
        let mut depth = 0usize;
        while let Some(current) = cp {
            let c_key = current.key();
            if current.kind() == Kind::Leaf {
                return if &key[depth..] == c_key { current.value().cloned() } else { None };
            }
            if !key[depth..].starts_with(c_key) {
                return None;
            }
            depth += c_key.len();
            cp = current.find_child(&key[depth..]);
        }
        None
    }

    fn put(&mut self, key: &[u8], value: MemValue) -> Option<MemValue> {
        if key.is_empty() {
            return None;
        }
        let replaced = put_into(&mut self.root, key, 0, value, &mut self.pool);
        if replaced.is_none() {
            self.size += 1;
        }
        replaced
    }

    fn delete(&mut self, key: &[u8]) -> Option<MemValue> {
        if key.is_empty() {
            return None;
        }
        let deleted = delete_from(&mut self.root, key, 0, &mut self.pool);
        if deleted.is_some() {
            self.size -= 1;
        }
        deleted
    }

    fn minimum(&self) -> Option<(Vec<u8>, MemValue)> {
        let mut cp = self.root.as_deref()?;
        let mut key = Vec::new();
        loop {
            if cp.kind() == Kind::Leaf {
                key.extend_from_slice(cp.key());
                return Some((key, cp.value()?.clone()));
            }
            key.extend_from_slice(cp.key());
            cp = cp.first_child()?;
        }
    }

    fn maximum(&self) -> Option<(Vec<u8>, MemValue)> {
        let mut cp = self.root.as_deref()?;
        let mut key = Vec::new();
        loop {
            if cp.kind() == Kind::Leaf {
                key.extend_from_slice(cp.key());
                return Some((key, cp.value()?.clone()));
            }
            key.extend_from_slice(cp.key());
            cp = cp.last_child()?;
        }
    }

    fn iterate(&self) -> Box<dyn Iterator<Item = (Vec<u8>, MemValue)> + '_> {
        Box::new(ArtIterator::new(self.root.as_deref()))
    }

    fn size(&self) -> i64 {
        self.size
    }
}

/// Recursive insert. `slot` is the mutable reference to the `Option<Box<Node>>`
/// currently under consideration; `depth` is how many bytes of `key` have
/// already been consumed by ancestors. Returns the previous value on a
/// same-key overwrite, or `None` for a fresh insert.
fn put_into(
    slot: &mut Option<Box<Node>>,
    key: &[u8],
    depth: usize,
    value: MemValue,
    pool: &mut NodePool,
) -> Option<MemValue> {
    if slot.is_none() {
        *slot = Some(pool.new_leaf(key[depth..].to_vec(), value));
        return None;
    }

    let current = slot.as_mut().unwrap();
    let c_key = current.key().to_vec();
    let lcp = longest_common_prefix(&key[depth..], &c_key);

    if current.kind() == Kind::Leaf && c_key == key[depth..] {
        let old = current.value().cloned();
        current.set_value(value);
        return old;
    }

    if current.kind() != Kind::Leaf && c_key.len() == lcp {
        let new_depth = depth + lcp;
        if let Some(child_slot) = current.find_child_slot_mut(&key[new_depth..]) {
            if child_slot.is_some() {
                return put_into(child_slot, key, new_depth, value, pool);
            }
        }

        let taken = slot.take().unwrap();
        let mut upgraded = pool.upgrade(taken);
        upgraded.insert_child(pool.new_leaf(key[new_depth..].to_vec(), value));
        *slot = Some(upgraded);
        return None;
    }

    // Prefixes diverge partway through: splice a new Node4 above both.
    let mut taken = slot.take().unwrap();
    taken.set_key(c_key[lcp..].to_vec());

    let mut splice = pool.alloc_node4();
    splice.set_key(c_key[..lcp].to_vec());
    splice.insert_child(taken);
    splice.insert_child(pool.new_leaf(key[depth + lcp..].to_vec(), value));
    *slot = Some(splice);
    None
}

/// Recursive delete, mirroring `put_into`'s slot-threading. Downgrades the
/// parent node (if any) after a successful removal.
fn delete_from(slot: &mut Option<Box<Node>>, key: &[u8], depth: usize, pool: &mut NodePool) -> Option<MemValue> {
    let current = slot.as_mut()?;

    if current.kind() == Kind::Leaf {
        return if current.key() == &key[depth..] {
            let taken = slot.take().unwrap();
            let deleted = taken.value().cloned();
            pool.recycle(taken);
            deleted
        } else {
            None
        };
    }

    let c_key = current.key().to_vec();
    if !key[depth..].starts_with(c_key.as_slice()) {
        return None;
    }
    let new_depth = depth + c_key.len();

    let child_slot = current.find_child_slot_mut(&key[new_depth..])?;
    let child_matches_leaf = match child_slot {
        Some(child) => child.kind() == Kind::Leaf && child.key() == &key[new_depth..],
        None => false,
    };

    if child_matches_leaf {
        let removed = current.remove_child(&key[new_depth..])?;
        let deleted = removed.value().cloned();
        pool.recycle(removed);
        let taken = slot.take().unwrap();
        *slot = Some(pool.downgrade(taken));
        deleted
    } else {
        delete_from(child_slot, key, new_depth, pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn mv(file_id: i32) -> MemValue {
        MemValue::new(file_id, 0, 0)
    }

    /// Boundary table for the Node4->16->48->256 upgrade ladder: one
    /// single-byte key per child, so the root's kind after `n` inserts
    /// directly reflects which capacity boundary was just crossed.
    #[test_case(4, Kind::Inner4; "stays node4 at capacity")]
    #[test_case(5, Kind::Inner16; "upgrades to node16 past capacity")]
    #[test_case(16, Kind::Inner16; "stays node16 at capacity")]
    #[test_case(17, Kind::Inner48; "upgrades to node48 past capacity")]
    #[test_case(48, Kind::Inner48; "stays node48 at capacity")]
    #[test_case(49, Kind::Inner256; "upgrades to node256 past capacity")]
    fn node_kind_after_n_single_byte_inserts(n: u8, expected: Kind) {
        let mut tree = AdaptiveRadixTree::new(ArtOptions::default());
        for b in 0..n {
            tree.put(&[b], mv(b as i32));
        }
        let kind = tree.root.as_deref().expect("root present after at least one insert").kind();
        assert_eq!(kind, expected);
    }

    #[test]
    fn put_get_delete_round_trip() {
        let mut tree = AdaptiveRadixTree::new(ArtOptions::default());
        assert!(tree.put(b"apple", mv(1)).is_none());
        assert!(tree.put(b"app", mv(2)).is_none());
        assert!(tree.put(b"application", mv(3)).is_none());
        assert_eq!(tree.size(), 3);

        assert_eq!(tree.get(b"apple"), Some(mv(1)));
        assert_eq!(tree.get(b"app"), Some(mv(2)));
        assert_eq!(tree.get(b"application"), Some(mv(3)));
        assert_eq!(tree.get(b"appl"), None);

        let replaced = tree.put(b"app", mv(20));
        assert_eq!(replaced, Some(mv(2)));
        assert_eq!(tree.size(), 3);
        assert_eq!(tree.get(b"app"), Some(mv(20)));

        assert_eq!(tree.delete(b"app"), Some(mv(20)));
        assert_eq!(tree.size(), 2);
        assert_eq!(tree.get(b"app"), None);
        assert_eq!(tree.get(b"apple"), Some(mv(1)));
        assert_eq!(tree.get(b"application"), Some(mv(3)));
    }

    #[test]
    fn minimum_and_maximum_track_sorted_order() {
        let mut tree = AdaptiveRadixTree::new(ArtOptions::default());
        for (k, id) in [("banana", 1), ("apple", 2), ("cherry", 3), ("avocado", 4)] {
            tree.put(k.as_bytes(), mv(id));
        }
        let (min_key, _) = tree.minimum().unwrap();
        let (max_key, _) = tree.maximum().unwrap();
        assert_eq!(min_key, b"apple");
        assert_eq!(max_key, b"cherry");
    }

    #[test]
    fn iterate_yields_keys_in_sorted_order() {
        let mut tree = AdaptiveRadixTree::new(ArtOptions::default());
        let mut keys: Vec<&str> = vec!["dog", "cat", "deer", "cow", "dolphin", "catfish"];
        for k in &keys {
            tree.put(k.as_bytes(), mv(1));
        }
        keys.sort();

        let got: Vec<Vec<u8>> = tree.iterate().map(|(k, _)| k).collect();
        let expected: Vec<Vec<u8>> = keys.iter().map(|k| k.as_bytes().to_vec()).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn capacity_transitions_preserve_present_keys() {
        let mut tree = AdaptiveRadixTree::new(ArtOptions::default());
        let keys: Vec<Vec<u8>> = (0u8..49).map(|b| vec![b]).collect();
        for (i, k) in keys.iter().enumerate() {
            tree.put(k, mv(i as i32));
        }
        assert_eq!(tree.size(), 49);
        for (i, k) in keys.iter().enumerate() {
            assert_eq!(tree.get(k), Some(mv(i as i32)));
        }

        for k in keys.iter().take(40) {
            assert!(tree.delete(k).is_some());
        }
        assert_eq!(tree.size(), 9);
        for k in keys.iter().skip(40) {
            assert!(tree.get(k).is_some());
        }
        for k in keys.iter().take(40) {
            assert!(tree.get(k).is_none());
        }
    }
}
