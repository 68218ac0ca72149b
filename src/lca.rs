//! Build-once LCA index: Euler tour, sparse table, root-path prefix sums.
//!
//! # Overview
//! The optimized distance query needs, per tree: node depths, subtree leaf
//! counts, their parent-side complements, two prefix sums along every
//! root-path, and O(1) lowest-common-ancestor lookup. All of it is derived
//! here in one pass over the tree — O(n log n) for the sparse table,
//! O(n) for everything else — and then never mutated again. If the tree
//! changed, the index would be rebuilt, not patched; trees are immutable
//! after construction, so in practice it is built exactly once.
//!
//! # Euler-tour LCA
//! The tour records every node each time it is entered or returned to
//! (`2n - 1` entries). The LCA of two nodes is the minimum-depth entry
//! between their first occurrences, which a sparse table answers in O(1)
//! after precomputing overlapping power-of-two windows.

use std::mem;

use crate::tree::{GeneTree, NodeId};

/// Immutable index over one tree, sized to its node count.
#[derive(Debug)]
pub struct LcaIndex {
    depth: Vec<u32>,
    subtree_leaves: Vec<i64>,
    parent_side_leaves: Vec<i64>,
    down_prefix: Vec<i64>,
    up_prefix: Vec<i64>,
    euler: Vec<u32>,
    euler_depth: Vec<u32>,
    first_occurrence: Vec<u32>,
    log2: Vec<u32>,
    rmq: Vec<Vec<u32>>,
}

impl LcaIndex {
    pub(crate) fn build(tree: &GeneTree) -> Self {
        let nodes = tree.nodes();
        let n = nodes.len();
        let root = tree.root();
        let total = tree.leaf_count() as i64;

        let mut children: Vec<Vec<NodeId>> = vec![Vec::new(); n];
        for node in nodes {
            if let Some(p) = node.parent {
                children[p].push(node.id);
            }
        }

        // Preorder with an explicit stack; recursion could blow the call
        // stack on a degenerate caterpillar tree.
        let mut depth = vec![0u32; n];
        let mut preorder = Vec::with_capacity(n);
        let mut stack = vec![root];
        while let Some(u) = stack.pop() {
            preorder.push(u);
            for &v in children[u].iter().rev() {
                depth[v] = depth[u] + 1;
                stack.push(v);
            }
        }

        // Subtree leaf counts: reverse preorder visits children first.
        let mut subtree_leaves = vec![0i64; n];
        for &u in preorder.iter().rev() {
            subtree_leaves[u] = if children[u].is_empty() {
                1
            } else {
                children[u].iter().map(|&c| subtree_leaves[c]).sum()
            };
        }

        // Root-path prefix sums: preorder visits parents first. The root's
        // three values stay 0.
        let mut parent_side_leaves = vec![0i64; n];
        let mut down_prefix = vec![0i64; n];
        let mut up_prefix = vec![0i64; n];
        for &u in preorder.iter().skip(1) {
            let p = nodes[u].parent.expect("non-root node has a parent");
            parent_side_leaves[u] = total - subtree_leaves[u];
            down_prefix[u] = down_prefix[p] + subtree_leaves[u];
            up_prefix[u] = up_prefix[p] + parent_side_leaves[u];
        }

        // Euler tour, again with an explicit stack. A frame (u, i) means
        // "the tour is at u, about to descend into child i"; every frame
        // visit appends one tour entry, so u is recorded once on entry and
        // once more after each child completes.
        let tour_len = 2 * n - 1;
        let mut euler: Vec<u32> = Vec::with_capacity(tour_len);
        let mut euler_depth: Vec<u32> = Vec::with_capacity(tour_len);
        let mut first_occurrence = vec![u32::MAX; n];
        let mut frames: Vec<(NodeId, usize)> = Vec::with_capacity(n);
        frames.push((root, 0));
        while let Some((u, i)) = frames.pop() {
            if i == 0 {
                first_occurrence[u] = euler.len() as u32;
            }
            euler.push(u as u32);
            euler_depth.push(depth[u]);
            if i < children[u].len() {
                frames.push((u, i + 1));
                frames.push((children[u][i], 0));
            }
        }
        debug_assert_eq!(euler.len(), tour_len);

        // log2 lookup so a query range maps to its sparse-table row in O(1).
        let m = euler.len();
        let mut log2 = vec![0u32; m + 1];
        for i in 2..=m {
            log2[i] = log2[i / 2] + 1;
        }

        // Sparse table over tour positions, keyed by depth. Row k answers
        // windows of length 2^k; ties keep the earlier position.
        let max_log = log2[m] as usize + 1;
        let mut rmq: Vec<Vec<u32>> = Vec::with_capacity(max_log);
        rmq.push((0..m as u32).collect());
        for k in 1..max_log {
            let span = 1usize << k;
            let half = span >> 1;
            let prev = &rmq[k - 1];
            let mut row = Vec::with_capacity(m - span + 1);
            for i in 0..=(m - span) {
                let a = prev[i];
                let b = prev[i + half];
                row.push(if euler_depth[a as usize] <= euler_depth[b as usize] {
                    a
                } else {
                    b
                });
            }
            rmq.push(row);
        }

        LcaIndex {
            depth,
            subtree_leaves,
            parent_side_leaves,
            down_prefix,
            up_prefix,
            euler,
            euler_depth,
            first_occurrence,
            log2,
            rmq,
        }
    }

    /// Lowest common ancestor of `u` and `v` in O(1): the minimum-depth
    /// tour entry between their first occurrences.
    pub fn lca(&self, u: NodeId, v: NodeId) -> NodeId {
        let mut left = self.first_occurrence[u] as usize;
        let mut right = self.first_occurrence[v] as usize;
        if left > right {
            mem::swap(&mut left, &mut right);
        }
        let len = right - left + 1;
        let k = self.log2[len] as usize;
        let a = self.rmq[k][left] as usize;
        let b = self.rmq[k][right + 1 - (1usize << k)] as usize;
        if self.euler_depth[a] <= self.euler_depth[b] {
            self.euler[a] as NodeId
        } else {
            self.euler[b] as NodeId
        }
    }

    pub fn depth(&self, u: NodeId) -> u32 {
        self.depth[u]
    }

    pub fn subtree_leaves(&self, u: NodeId) -> i64 {
        self.subtree_leaves[u]
    }

    pub fn parent_side_leaves(&self, u: NodeId) -> i64 {
        self.parent_side_leaves[u]
    }

    pub fn down_prefix(&self, u: NodeId) -> i64 {
        self.down_prefix[u]
    }

    pub fn up_prefix(&self, u: NodeId) -> i64 {
        self.up_prefix[u]
    }

    pub fn tour_len(&self) -> usize {
        self.euler.len()
    }

    /// Byte footprint of the derived structures, for cost/benefit reporting
    /// of the optimized path against the preprocessing-free baseline.
    pub fn memory_bytes(&self) -> usize {
        let mut bytes = 0;
        bytes += self.depth.capacity() * mem::size_of::<u32>();
        bytes += self.subtree_leaves.capacity() * mem::size_of::<i64>();
        bytes += self.parent_side_leaves.capacity() * mem::size_of::<i64>();
        bytes += self.down_prefix.capacity() * mem::size_of::<i64>();
        bytes += self.up_prefix.capacity() * mem::size_of::<i64>();
        bytes += self.euler.capacity() * mem::size_of::<u32>();
        bytes += self.euler_depth.capacity() * mem::size_of::<u32>();
        bytes += self.first_occurrence.capacity() * mem::size_of::<u32>();
        bytes += self.log2.capacity() * mem::size_of::<u32>();
        bytes += self.rmq.capacity() * mem::size_of::<Vec<u32>>();
        for row in &self.rmq {
            bytes += row.capacity() * mem::size_of::<u32>();
        }
        bytes
    }
}

impl GeneTree {
    /// The tree's LCA index, building it on first use.
    ///
    /// One-shot: the first caller builds, every later call returns the same
    /// index unchanged, so preprocessing is idempotent and the derived
    /// structures stay immutable for the tree's lifetime. The underlying
    /// `OnceLock` also makes it safe to share a tree across threads once
    /// construction has finished.
    pub fn lca_index(&self) -> &LcaIndex {
        self.index.get_or_init(|| LcaIndex::build(self))
    }

    /// Whether the index has been built yet.
    pub fn preprocessed(&self) -> bool {
        self.index.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::build::random_binary_tree;

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("t{}", i)).collect()
    }

    #[test]
    fn tour_has_2n_minus_1_entries() {
        let mut rng = StdRng::seed_from_u64(5);
        let tree = random_binary_tree(&labels(9), &mut rng).unwrap();
        let idx = tree.lca_index();
        assert_eq!(idx.tour_len(), 2 * tree.nodes().len() - 1);
    }

    #[test]
    fn root_depth_and_prefixes_are_zero() {
        let mut rng = StdRng::seed_from_u64(6);
        let tree = random_binary_tree(&labels(7), &mut rng).unwrap();
        let idx = tree.lca_index();
        let root = tree.root();
        assert_eq!(idx.depth(root), 0);
        assert_eq!(idx.parent_side_leaves(root), 0);
        assert_eq!(idx.down_prefix(root), 0);
        assert_eq!(idx.up_prefix(root), 0);
        assert_eq!(idx.subtree_leaves(root), tree.leaf_count() as i64);
    }

    #[test]
    fn euler_lca_matches_ancestor_chain_walk() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in [2usize, 3, 8, 13, 17] {
            let tree = random_binary_tree(&labels(n), &mut rng).unwrap();
            let idx = tree.lca_index();
            let count = tree.nodes().len();
            for u in 0..count {
                for v in 0..count {
                    assert_eq!(
                        idx.lca(u, v),
                        tree.ancestor_chain_lca(u, v),
                        "lca disagreement for ({}, {}) on {} leaves",
                        u,
                        v,
                        n
                    );
                }
            }
        }
    }

    #[test]
    fn preprocessing_is_idempotent() {
        let mut rng = StdRng::seed_from_u64(8);
        let tree = random_binary_tree(&labels(10), &mut rng).unwrap();
        assert!(!tree.preprocessed());
        let first = tree.lca_index() as *const _;
        assert!(tree.preprocessed());
        let second = tree.lca_index() as *const _;
        assert_eq!(first, second);
    }

    #[test]
    fn memory_estimate_is_positive() {
        let mut rng = StdRng::seed_from_u64(9);
        let tree = random_binary_tree(&labels(8), &mut rng).unwrap();
        assert!(tree.lca_index().memory_bytes() > 0);
    }
}
