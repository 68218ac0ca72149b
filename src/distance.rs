//! Pairwise taxon distances within one gene tree.
//!
//! This module implements three equivalent distance computations:
//!
//! 1. **Baseline**: a direct ancestor-path walk, O(depth) per query with no
//!    preprocessing. Ground truth for the other two.
//! 2. **Optimized**: O(1) per query from Euler-tour LCA and root-path prefix
//!    sums, after a one-time O(n log n) build.
//! 3. **All-LCA**: finds the meeting ancestor by exhaustively comparing the
//!    two full ancestor chains, then accumulates along both bounded paths.
//!    Shares no machinery with the Euler-tour query, which makes it an
//!    independent witness in cross-validation.
//!
//! The distance itself accumulates, over every ancestor separating the two
//! leaves, the number of other taxa dividing their subtrees at that ancestor
//! (`a + b - 2`), and halves the total of the two one-sided walks.

use crate::tree::{GeneTree, NodeId, TreeError};

/// Per-ancestor contribution: with `a` and `b` the leaf counts of the slots
/// holding the two query leaves, `a + b - 2` other taxa separate them there.
fn calc(a: usize, b: usize) -> usize {
    a + b - 2
}

impl GeneTree {
    /// Default distance entry point; delegates to the baseline walk.
    pub fn find_dist(&self, taxon_a: &str, taxon_b: &str) -> Result<f64, TreeError> {
        self.find_dist_baseline(taxon_a, taxon_b)
    }

    /// Linear-time ancestor walk.
    ///
    /// # Algorithm
    /// Starting at the smaller leaf id's parent, climb while the current
    /// ancestor still holds the two leaves in different subtree slots: each
    /// such ancestor contributes `calc(a, b)` and becomes the best LCA
    /// candidate so far. Then climb from the other leaf's parent up to the
    /// recorded LCA, accumulating the same contributions. The two one-sided
    /// walks double-count the shared ancestor structure, so the distance is
    /// half the accumulated total.
    ///
    /// # Errors
    /// `TreeError::TaxonNotPresent` if either taxon is unknown or absent.
    pub fn find_dist_baseline(&self, taxon_a: &str, taxon_b: &str) -> Result<f64, TreeError> {
        let m = self.leaf_id(taxon_a)?;
        let n = self.leaf_id(taxon_b)?;
        if m == n {
            return Ok(0.0);
        }

        let x = m.min(n);
        let y = m.max(n);
        let nodes = self.nodes();

        let mut acc: usize = 0;
        let mut lca = self.root();

        let mut current = nodes[x].parent.expect("present leaf is not the root");
        let mut slot_x = self.subtree_no(current, x);
        let mut slot_y = self.subtree_no(current, y);
        while slot_x != slot_y {
            let a = nodes[current].descendants[slot_x];
            let b = nodes[current].descendants[slot_y];
            acc += calc(a, b);
            lca = current;

            if current == self.root() {
                break;
            }
            current = nodes[current].parent.expect("non-root node has a parent");
            slot_x = self.subtree_no(current, x);
            slot_y = self.subtree_no(current, y);
        }

        let mut current = nodes[y].parent.expect("present leaf is not the root");
        while current != lca {
            let slot_x = self.subtree_no(current, x);
            let slot_y = self.subtree_no(current, y);
            let a = nodes[current].descendants[slot_x];
            let b = nodes[current].descendants[slot_y];
            acc += calc(a, b);
            current = nodes[current].parent.expect("walk from y passes through its LCA");
        }

        Ok(acc as f64 / 2.0)
    }

    /// O(1) closed-form distance; triggers the one-time preprocessing on
    /// first use.
    ///
    /// # Algorithm
    /// With `w` the LCA of leaves `x` and `y`, the baseline's per-ancestor
    /// contributions telescope into prefix-sum differences along the two
    /// root paths:
    ///
    /// ```text
    /// sum_cx = (down[x] - down[w]) + (up[parent(y)] - up[w])
    /// sum_cy = (down[y] - down[w]) + (up[parent(x)] - up[w])
    /// internal = max(0, depth[x] + depth[y] - 2*depth[w] - 1)
    /// dist = (sum_cx + sum_cy - 2*internal) / 2
    /// ```
    ///
    /// A parent that does not exist (the root) contributes an up-prefix
    /// of 0.
    ///
    /// # Errors
    /// `TreeError::TaxonNotPresent` if either taxon is unknown or absent.
    pub fn find_dist_optimized(&self, taxon_a: &str, taxon_b: &str) -> Result<f64, TreeError> {
        let x = self.leaf_id(taxon_a)?;
        let y = self.leaf_id(taxon_b)?;
        if x == y {
            return Ok(0.0);
        }

        let idx = self.lca_index();
        let w = idx.lca(x, y);

        let up_at_parent = |leaf: NodeId| -> i64 {
            match self.nodes()[leaf].parent {
                Some(p) => idx.up_prefix(p),
                None => 0,
            }
        };

        let sum_cx =
            (idx.down_prefix(x) - idx.down_prefix(w)) + (up_at_parent(y) - idx.up_prefix(w));
        let sum_cy =
            (idx.down_prefix(y) - idx.down_prefix(w)) + (up_at_parent(x) - idx.up_prefix(w));

        let internal =
            (idx.depth(x) as i64 + idx.depth(y) as i64 - 2 * idx.depth(w) as i64 - 1).max(0);

        Ok(0.5 * (sum_cx + sum_cy - 2 * internal) as f64)
    }

    /// Distance via exhaustive ancestor-chain comparison.
    ///
    /// The meeting ancestor is found by marking every ancestor of one leaf
    /// and walking the other leaf's chain until it hits a marked node; the
    /// per-ancestor contributions are then accumulated along both paths
    /// bounded by that ancestor, counted once on the first path and
    /// excluded on the second, mirroring the baseline's halving.
    ///
    /// # Errors
    /// `TreeError::TaxonNotPresent` if either taxon is unknown or absent.
    pub fn find_dist_all_lca(&self, taxon_a: &str, taxon_b: &str) -> Result<f64, TreeError> {
        let m = self.leaf_id(taxon_a)?;
        let n = self.leaf_id(taxon_b)?;
        if m == n {
            return Ok(0.0);
        }

        let x = m.min(n);
        let y = m.max(n);
        let w = self.ancestor_chain_lca(x, y);
        let nodes = self.nodes();

        let mut acc: usize = 0;

        let mut current = nodes[x].parent;
        while let Some(u) = current {
            let a = nodes[u].descendants[self.subtree_no(u, x)];
            let b = nodes[u].descendants[self.subtree_no(u, y)];
            acc += calc(a, b);
            if u == w {
                break;
            }
            current = nodes[u].parent;
        }

        let mut current = nodes[y].parent;
        while let Some(u) = current {
            if u == w {
                break;
            }
            let a = nodes[u].descendants[self.subtree_no(u, x)];
            let b = nodes[u].descendants[self.subtree_no(u, y)];
            acc += calc(a, b);
            current = nodes[u].parent;
        }

        Ok(acc as f64 / 2.0)
    }

    /// Naive LCA by ancestor-chain intersection. Oracle for the Euler-tour
    /// reduction, and the meeting-point search of `find_dist_all_lca`.
    pub(crate) fn ancestor_chain_lca(&self, u: NodeId, v: NodeId) -> NodeId {
        let nodes = self.nodes();
        let mut on_u_path = vec![false; nodes.len()];
        let mut a = Some(u);
        while let Some(node) = a {
            on_u_path[node] = true;
            a = nodes[node].parent;
        }
        let mut b = v;
        loop {
            if on_u_path[b] {
                return b;
            }
            b = nodes[b].parent.expect("the root is a common ancestor");
        }
    }
}
