use super::node::{Inner16, Inner256, Inner4, Inner48, Kind, Leaf, Node};
use crate::index::MemValue;
use crate::options::ArtOptions;

/// Per-kind free lists of previously allocated interior nodes, plus a free
/// list of boxed `MemValue` allocations reused by freshly built leaves.
///
/// Mirrors the original's node pool: `alloc` refills in batches once a free
/// list runs low, and `recycle` caps how large a free list is allowed to
/// grow. This crate uses the `2x`/truncate-to-half bookkeeping variant (see
/// DESIGN.md Open Questions).
pub(super) struct NodePool {
    opts: ArtOptions,
    leaf_free: Vec<Box<MemValue>>,
    node4_free: Vec<Box<Inner4>>,
    node16_free: Vec<Box<Inner16>>,
    node48_free: Vec<Box<Inner48>>,
    node256_free: Vec<Box<Inner256>>,
}

impl NodePool {
    pub(super) fn new(opts: ArtOptions) -> Self {
        let mut pool = Self {
            opts,
            leaf_free: Vec::new(),
            node4_free: Vec::new(),
            node16_free: Vec::new(),
            node48_free: Vec::new(),
            node256_free: Vec::new(),
        };
        pool.leaf_free.extend((0..pool.opts.leaf_pool_size).map(|_| Box::new(MemValue::new(0, 0, 0))));
        pool.node4_free.extend((0..pool.opts.node4_pool_size).map(|_| Box::new(Inner4::empty())));
        pool.node16_free.extend((0..pool.opts.node16_pool_size).map(|_| Box::new(Inner16::empty())));
        pool.node48_free.extend((0..pool.opts.node48_pool_size).map(|_| Box::new(Inner48::empty())));
        pool.node256_free.extend((0..pool.opts.node256_pool_size).map(|_| Box::new(Inner256::empty())));
        pool
    }

    fn pool_size(&self, kind: Kind) -> usize {
        match kind {
            Kind::Leaf => self.opts.leaf_pool_size,
            Kind::Inner4 => self.opts.node4_pool_size,
            Kind::Inner16 => self.opts.node16_pool_size,
            Kind::Inner48 => self.opts.node48_pool_size,
            Kind::Inner256 => self.opts.node256_pool_size,
        }
    }

    pub(super) fn new_leaf(&mut self, key: Vec<u8>, value: MemValue) -> Box<Node> {
        let pool_size = self.pool_size(Kind::Leaf).max(1);
        if self.leaf_free.len() <= pool_size / 8 {
            self.leaf_free.extend((0..pool_size / 4).map(|_| Box::new(MemValue::new(0, 0, 0))));
        }
        let mut boxed_value = self.leaf_free.pop().unwrap_or_else(|| Box::new(MemValue::new(0, 0, 0)));
        *boxed_value = value;
        Box::new(Node::Leaf(Leaf { key, value: boxed_value }))
    }

    fn refill_if_low<T>(free: &mut Vec<Box<T>>, pool_size: usize, make: impl Fn() -> T) {
        let pool_size = pool_size.max(1);
        if free.len() <= pool_size / 8 {
            free.extend((0..pool_size / 4).map(|_| Box::new(make())));
        }
    }

    pub(super) fn alloc4(&mut self) -> Box<Inner4> {
        Self::refill_if_low(&mut self.node4_free, self.opts.node4_pool_size, Inner4::empty);
        self.node4_free.pop().unwrap_or_else(|| Box::new(Inner4::empty()))
    }

    pub(super) fn alloc16(&mut self) -> Box<Inner16> {
        Self::refill_if_low(&mut self.node16_free, self.opts.node16_pool_size, Inner16::empty);
        self.node16_free.pop().unwrap_or_else(|| Box::new(Inner16::empty()))
    }

    pub(super) fn alloc48(&mut self) -> Box<Inner48> {
        Self::refill_if_low(&mut self.node48_free, self.opts.node48_pool_size, Inner48::empty);
        self.node48_free.pop().unwrap_or_else(|| Box::new(Inner48::empty()))
    }

    pub(super) fn alloc256(&mut self) -> Box<Inner256> {
        Self::refill_if_low(&mut self.node256_free, self.opts.node256_pool_size, Inner256::empty);
        self.node256_free.pop().unwrap_or_else(|| Box::new(Inner256::empty()))
    }

    /// Recycles a node (of any kind) back into its free list, clearing its
    /// fields first. Truncates the free list to half once it has grown
    /// beyond twice the configured pool size.
    pub(super) fn recycle(&mut self, node: Box<Node>) {
        match *node {
            Node::Leaf(leaf) => {
                let mut value = leaf.value;
                *value = MemValue::new(0, 0, 0);
                self.leaf_free.push(value);
                let cap = self.pool_size(Kind::Leaf) * 2;
                if self.leaf_free.len() > cap {
                    self.leaf_free.truncate(self.leaf_free.len() / 2);
                }
            }
            Node::Inner4(mut n) => {
                *n = Inner4::empty();
                self.node4_free.push(n);
                let cap = self.pool_size(Kind::Inner4) * 2;
                if self.node4_free.len() > cap {
                    self.node4_free.truncate(self.node4_free.len() / 2);
                }
            }
            Node::Inner16(mut n) => {
                *n = Inner16::empty();
                self.node16_free.push(n);
                let cap = self.pool_size(Kind::Inner16) * 2;
                if self.node16_free.len() > cap {
                    self.node16_free.truncate(self.node16_free.len() / 2);
                }
            }
            Node::Inner48(mut n) => {
                *n = Inner48::empty();
                self.node48_free.push(n);
                let cap = self.pool_size(Kind::Inner48) * 2;
                if self.node48_free.len() > cap {
                    self.node48_free.truncate(self.node48_free.len() / 2);
                }
            }
            Node::Inner256(mut n) => {
                *n = Inner256::empty();
                self.node256_free.push(n);
                let cap = self.pool_size(Kind::Inner256) * 2;
                if self.node256_free.len() > cap {
                    self.node256_free.truncate(self.node256_free.len() / 2);
                }
            }
        }
    }

    /// Allocates a brand-new `Node4` for use as a splice point when two
    /// keys diverge.
    pub(super) fn alloc_node4(&mut self) -> Box<Node> {
        Box::new(Node::Inner4(self.alloc4()))
    }

    /// Upgrades `node` to the next larger kind if it's at capacity, copying
    /// over `prefix`, `zero_leaf`, and children in key order. Returns the
    /// node unchanged if it still has room, or is already a `Node256`.
    pub(super) fn upgrade(&mut self, node: Box<Node>) -> Box<Node> {
        if node.num_of_child() + 1 <= node.max_size() || node.kind() == Kind::Leaf {
            return node;
        }
        match *node {
            Node::Inner4(old) => Box::new(Node::Inner16(self.upgrade_to_16(old))),
            Node::Inner16(old) => Box::new(Node::Inner48(self.upgrade_to_48(old))),
            Node::Inner48(old) => Box::new(Node::Inner256(self.upgrade_to_256(old))),
            other => Box::new(other),
        }
    }

    fn upgrade_to_16(&mut self, mut old: Box<Inner4>) -> Box<Inner16> {
        let mut new_node = self.alloc16();
        new_node.base.prefix = std::mem::take(&mut old.base.prefix);
        new_node.base.zero_leaf = old.base.zero_leaf.take();
        new_node.num_of_child = old.num_of_child;
        for i in 0..old.num_of_child as usize {
            new_node.keys[i] = old.keys[i];
            new_node.children[i] = old.children[i].take();
        }
        self.recycle_inner4(old);
        new_node
    }

    fn upgrade_to_48(&mut self, mut old: Box<Inner16>) -> Box<Inner48> {
        let mut new_node = self.alloc48();
        new_node.base.prefix = std::mem::take(&mut old.base.prefix);
        new_node.base.zero_leaf = old.base.zero_leaf.take();
        new_node.num_of_child = old.num_of_child;
        for k in 0..old.num_of_child as usize {
            let c = old.keys[k];
            let (word, bit) = ((c >> 6) as usize, 1u64 << (c % 64));
            new_node.presents[word] |= bit;
            new_node.keys[c as usize] = k as u8;
            new_node.children[k] = old.children[k].take();
        }
        self.recycle_inner16(old);
        new_node
    }

    fn upgrade_to_256(&mut self, mut old: Box<Inner48>) -> Box<Inner256> {
        let mut new_node = self.alloc256();
        new_node.base.prefix = std::mem::take(&mut old.base.prefix);
        new_node.base.zero_leaf = old.base.zero_leaf.take();
        new_node.num_of_child = old.num_of_child as u16;
        new_node.presents = old.presents;
        for c in 0usize..256 {
            let (word, bit) = (c >> 6, 1u64 << (c % 64));
            if old.presents[word] & bit != 0 {
                let idx = old.keys[c] as usize;
                new_node.children[c] = old.children[idx].take();
            }
        }
        self.recycle_inner48(old);
        new_node
    }

    /// Downgrades `node` to the next smaller kind if it has dropped below
    /// `min` occupancy. `Node4` additionally performs path compression: a
    /// node left with exactly one child (whether the `zero_leaf` or a
    /// single indexed child) is collapsed away, splicing its prefix onto
    /// the surviving child.
    pub(super) fn downgrade(&mut self, node: Box<Node>) -> Box<Node> {
        if node.kind() == Kind::Leaf || node.num_of_child() >= node.min_size() {
            return node;
        }
        match *node {
            Node::Inner256(old) => Box::new(Node::Inner48(self.downgrade_to_48(old))),
            Node::Inner48(old) => Box::new(Node::Inner16(self.downgrade_to_16(old))),
            Node::Inner16(old) => Box::new(Node::Inner4(self.downgrade_to_4(old))),
            Node::Inner4(old) => self.compress4(old),
            other => Box::new(other),
        }
    }

    fn downgrade_to_48(&mut self, mut old: Box<Inner256>) -> Box<Inner48> {
        let mut new_node = self.alloc48();
        new_node.base.prefix = std::mem::take(&mut old.base.prefix);
        new_node.base.zero_leaf = old.base.zero_leaf.take();
        new_node.num_of_child = old.num_of_child as u8;
        new_node.presents = old.presents;
        let mut k = 0u8;
        for c in 0usize..256 {
            let (word, bit) = (c >> 6, 1u64 << (c % 64));
            if old.presents[word] & bit != 0 {
                new_node.keys[c] = k;
                new_node.children[k as usize] = old.children[c].take();
                k += 1;
            }
        }
        self.recycle_inner256(old);
        new_node
    }

    fn downgrade_to_16(&mut self, mut old: Box<Inner48>) -> Box<Inner16> {
        let mut new_node = self.alloc16();
        new_node.base.prefix = std::mem::take(&mut old.base.prefix);
        new_node.base.zero_leaf = old.base.zero_leaf.take();
        new_node.num_of_child = old.num_of_child;
        let mut k = 0u8;
        for c in 0usize..256 {
            let (word, bit) = (c >> 6, 1u64 << (c % 64));
            if old.presents[word] & bit != 0 {
                let idx = old.keys[c] as usize;
                new_node.keys[k as usize] = c as u8;
                new_node.children[k as usize] = old.children[idx].take();
                k += 1;
            }
        }
        self.recycle_inner48(old);
        new_node
    }

    fn downgrade_to_4(&mut self, mut old: Box<Inner16>) -> Box<Inner4> {
        let mut new_node = self.alloc4();
        new_node.base.prefix = std::mem::take(&mut old.base.prefix);
        new_node.base.zero_leaf = old.base.zero_leaf.take();
        new_node.num_of_child = old.num_of_child;
        for i in 0..old.num_of_child as usize {
            new_node.keys[i] = old.keys[i];
            new_node.children[i] = old.children[i].take();
        }
        self.recycle_inner16(old);
        new_node
    }

    /// Collapses a `Node4` that has been reduced to a single child
    /// (`zero_leaf` alone, or one indexed child alone) by splicing the
    /// node's prefix onto the front of the surviving child's own key.
    fn compress4(&mut self, mut old: Box<Inner4>) -> Box<Node> {
        let total = old.num_of_child as usize + if old.base.zero_leaf.is_some() { 1 } else { 0 };
        if total != 1 {
            return Box::new(Node::Inner4(old));
        }

        let mut surviving = if let Some(zl) = old.base.zero_leaf.take() {
            zl
        } else {
            old.children[0].take().expect("node4 with one indexed child")
        };

        let mut new_key = std::mem::take(&mut old.base.prefix);
        new_key.extend_from_slice(surviving.key());
        surviving.set_key(new_key);

        self.recycle_inner4(old);
        surviving
    }

    fn recycle_inner4(&mut self, mut n: Box<Inner4>) {
        *n = Inner4::empty();
        self.node4_free.push(n);
    }

    fn recycle_inner16(&mut self, mut n: Box<Inner16>) {
        *n = Inner16::empty();
        self.node16_free.push(n);
    }

    fn recycle_inner48(&mut self, mut n: Box<Inner48>) {
        *n = Inner48::empty();
        self.node48_free.push(n);
    }

    fn recycle_inner256(&mut self, mut n: Box<Inner256>) {
        *n = Inner256::empty();
        self.node256_free.push(n);
    }
}
