//! Gene tree encoding with id-contiguous subtree ranges.
//!
//! # Overview
//! A `GeneTree` stores one rooted tree as a flat node array in which a node's
//! id equals its array position and every child subtree occupies a contiguous
//! id range. "Is this leaf inside that subtree?" then becomes two integer
//! comparisons (`subtree_no`) with no pointer traversal, which is what keeps
//! the distance walks cheap.
//!
//! # CRITICAL: Why ids must be assigned by one traversal order
//! The contiguity invariant is easy to violate silently when assembling trees
//! by hand. Ids must come from a single preorder numbering (the builders in
//! [`crate::build`] do this), and `GeneTree::new` re-checks the whole
//! invariant once so that a bad encoding fails at construction instead of
//! producing quietly wrong distances.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use crate::lca::LcaIndex;

/// NodeId is an index into the tree's node vector.
/// It is lightweight (Copy) and safe (no pointers).
pub type NodeId = usize;

/// Errors produced by tree construction and distance queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The node array violates the encoding invariant (no unique root,
    /// broken parent chain, non-contiguous child ranges, ...).
    Malformed(String),
    /// A queried taxon is unknown to this tree, or mapped as absent.
    TaxonNotPresent(String),
    /// Failure while parsing or converting an input tree.
    Newick(String),
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::Malformed(msg) => write!(f, "malformed tree encoding: {}", msg),
            TreeError::TaxonNotPresent(taxon) => {
                write!(f, "taxon '{}' not present in this tree", taxon)
            }
            TreeError::Newick(msg) => write!(f, "newick input error: {}", msg),
        }
    }
}

impl std::error::Error for TreeError {}

/// One vertex of the rooted tree.
///
/// `max_id` holds, per child-subtree slot, the greatest leaf id reachable in
/// that slot: slot 0 covers ids `(id, max_id[0]]`, slot 1 covers
/// `(max_id[0], max_id[1]]`, and slot 2 is implicit — everything else,
/// including leaves outside this node's subtree. `descendants` holds the
/// matching leaf counts; `descendants[2]` is derived at `GeneTree`
/// construction as `leaf_count - descendants[0] - descendants[1]`.
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique identifier, equal to the node's position in the tree array
    pub id: NodeId,

    /// Parent node id (None for the root)
    pub parent: Option<NodeId>,

    /// Greatest leaf id per subtree slot, initialized to the node's own id
    pub max_id: [NodeId; 3],

    /// Leaf count per subtree slot
    pub descendants: [usize; 3],
}

impl Node {
    pub fn new(id: NodeId, parent: Option<NodeId>) -> Self {
        Node {
            id,
            parent,
            max_id: [id; 3],
            descendants: [0; 3],
        }
    }
}

/// An immutable rooted gene tree over a subset of taxa.
///
/// # Fields
/// - `nodes`: the flat node array (position == id)
/// - `taxa`: taxon label → leaf id; id 0 (or a missing entry) means the
///   taxon is absent from this tree
/// - `leaf_count`: total number of leaves
///
/// The tree is read-only after construction. The derived LCA structures are
/// built lazily, exactly once, behind a `OnceLock`, so queries may freely be
/// shared across threads once construction has finished.
#[derive(Debug)]
pub struct GeneTree {
    nodes: Vec<Node>,
    taxa: BTreeMap<String, NodeId>,
    leaf_count: usize,
    root: NodeId,
    pub(crate) index: OnceLock<LcaIndex>,
}

impl GeneTree {
    /// Build a tree from an already-id-assigned node array and label map.
    ///
    /// Validates the full encoding invariant and fills in the derived
    /// `descendants[2]` values.
    ///
    /// # Errors
    /// `TreeError::Malformed` if the array has no unique root, an
    /// inconsistent parent chain, a leaf count mismatch, or any child range
    /// that is not contiguous or disagrees with the stored `max_id` /
    /// `descendants` slots.
    pub fn new(
        mut nodes: Vec<Node>,
        taxa: BTreeMap<String, NodeId>,
        leaf_count: usize,
    ) -> Result<Self, TreeError> {
        let root = validate_encoding(&nodes, &taxa, leaf_count)?;

        // descendants[2] is "everything not in slots 0/1", tree-wide.
        for node in nodes.iter_mut() {
            if node.parent.is_some() {
                node.descendants[2] = leaf_count - node.descendants[0] - node.descendants[1];
            }
        }

        Ok(GeneTree {
            nodes,
            taxa,
            leaf_count,
            root,
            index: OnceLock::new(),
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Which subtree slot of `current` contains `leaf`?
    ///
    /// Two integer comparisons thanks to the contiguous-id invariant. Slot 2
    /// is the default: further children of a multifurcating node as well as
    /// every leaf outside `current`'s subtree land there.
    pub fn subtree_no(&self, current: NodeId, leaf: NodeId) -> usize {
        let node = &self.nodes[current];
        if leaf > current && leaf <= node.max_id[0] {
            0
        } else if leaf > node.max_id[0] && leaf <= node.max_id[1] {
            1
        } else {
            2
        }
    }

    /// Do both taxa occur in this tree?
    ///
    /// This is the documented way to check before querying a distance:
    /// a taxon mapped to id 0, or not mapped at all, is absent.
    pub fn is_present(&self, taxon_a: &str, taxon_b: &str) -> bool {
        let present = |t: &str| self.taxa.get(t).is_some_and(|&id| id > 0);
        present(taxon_a) && present(taxon_b)
    }

    /// Resolve a taxon label to its leaf id.
    ///
    /// # Errors
    /// `TreeError::TaxonNotPresent` for unknown or absent taxa, so a missing
    /// taxon can never silently turn into a misleading distance.
    pub fn leaf_id(&self, taxon: &str) -> Result<NodeId, TreeError> {
        match self.taxa.get(taxon) {
            Some(&id) if id > 0 => Ok(id),
            _ => Err(TreeError::TaxonNotPresent(taxon.to_string())),
        }
    }

    /// All taxa present in this tree, in deterministic (sorted) order.
    pub fn present_taxa(&self) -> Vec<&str> {
        self.taxa
            .iter()
            .filter(|&(_, &id)| id > 0)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Check the whole encoding invariant; returns the root id on success.
///
/// Recomputes subtree id bounds and leaf counts from the parent
/// back-references and compares them against the stored `max_id` /
/// `descendants` slots, so callers cannot hand over an array that only
/// looks plausible.
fn validate_encoding(
    nodes: &[Node],
    taxa: &BTreeMap<String, NodeId>,
    leaf_count: usize,
) -> Result<NodeId, TreeError> {
    if nodes.is_empty() {
        return Err(TreeError::Malformed("empty node array".to_string()));
    }
    let n = nodes.len();

    let mut root = None;
    for (i, node) in nodes.iter().enumerate() {
        if node.id != i {
            return Err(TreeError::Malformed(format!(
                "node at position {} carries id {}",
                i, node.id
            )));
        }
        match node.parent {
            None => {
                if root.replace(i).is_some() {
                    return Err(TreeError::Malformed("more than one root".to_string()));
                }
            }
            // Preorder numbering puts every parent before its children, so a
            // parent id >= the child id can never be part of a valid encoding.
            Some(p) => {
                if p >= i {
                    return Err(TreeError::Malformed(format!(
                        "node {} has invalid parent {}",
                        i, p
                    )));
                }
            }
        }
    }
    let root = root.ok_or_else(|| TreeError::Malformed("no root node".to_string()))?;

    let mut children: Vec<Vec<NodeId>> = vec![Vec::new(); n];
    for node in nodes.iter() {
        if let Some(p) = node.parent {
            children[p].push(node.id);
        }
    }

    // Subtree bounds and leaf counts, children first (ids grow root-to-leaf,
    // so a reverse index scan visits every child before its parent).
    let mut bound = vec![0; n];
    let mut leaves = vec![0usize; n];
    for i in (0..n).rev() {
        if children[i].is_empty() {
            bound[i] = i;
            leaves[i] = 1;
        } else {
            bound[i] = children[i].iter().map(|&c| bound[c]).max().unwrap_or(i);
            leaves[i] = children[i].iter().map(|&c| leaves[c]).sum();
        }
    }

    if leaves[root] != leaf_count {
        return Err(TreeError::Malformed(format!(
            "tree has {} leaves but constructor was given leaf_count {}",
            leaves[root], leaf_count
        )));
    }

    for (i, kids) in children.iter().enumerate() {
        let node = &nodes[i];
        if kids.is_empty() {
            if node.max_id[0] != i || node.max_id[1] != i {
                return Err(TreeError::Malformed(format!(
                    "leaf {} carries a subtree bound",
                    i
                )));
            }
            if node.descendants[0] > 1 || node.descendants[1] != 0 {
                return Err(TreeError::Malformed(format!(
                    "leaf {} carries subtree leaf counts",
                    i
                )));
            }
            continue;
        }
        // Each child range must start exactly where the previous one ends.
        let mut next = i + 1;
        for (slot, &c) in kids.iter().enumerate() {
            if c != next {
                return Err(TreeError::Malformed(format!(
                    "child {} of node {} breaks id contiguity (expected id {})",
                    c, i, next
                )));
            }
            if slot < 2
                && (node.max_id[slot] != bound[c] || node.descendants[slot] != leaves[c])
            {
                return Err(TreeError::Malformed(format!(
                    "slot {} of node {} disagrees with the subtree of child {}",
                    slot, i, c
                )));
            }
            next = bound[c] + 1;
        }
    }

    for (name, &id) in taxa.iter() {
        if id > 0 && (id >= n || !children[id].is_empty()) {
            return Err(TreeError::Malformed(format!(
                "taxon '{}' maps to id {}, which is not a leaf",
                name, id
            )));
        }
    }

    Ok(root)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn node(
        id: NodeId,
        parent: Option<NodeId>,
        max0: NodeId,
        max1: NodeId,
        d0: usize,
        d1: usize,
    ) -> Node {
        let mut n = Node::new(id, parent);
        n.max_id[0] = max0;
        n.max_id[1] = max1;
        n.descendants[0] = d0;
        n.descendants[1] = d1;
        n
    }

    /// Hand-encoded ((A,B),(C,D)) in preorder:
    ///
    /// ```text
    ///          0
    ///        /   \
    ///       1     4
    ///      / \   / \
    ///     2   3 5   6
    ///     A   B C   D
    /// ```
    pub(crate) fn balanced_four() -> GeneTree {
        let nodes = vec![
            node(0, None, 3, 6, 2, 2),
            node(1, Some(0), 2, 3, 1, 1),
            node(2, Some(1), 2, 2, 1, 0),
            node(3, Some(1), 3, 3, 1, 0),
            node(4, Some(0), 5, 6, 1, 1),
            node(5, Some(4), 5, 5, 1, 0),
            node(6, Some(4), 6, 6, 1, 0),
        ];
        let taxa: BTreeMap<String, NodeId> = [("A", 2), ("B", 3), ("C", 5), ("D", 6)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        GeneTree::new(nodes, taxa, 4).unwrap()
    }

    #[test]
    fn subtree_slots() {
        let t = balanced_four();
        // Relative to node 1 = (A,B): A left, B right, C outside.
        assert_eq!(t.subtree_no(1, 2), 0);
        assert_eq!(t.subtree_no(1, 3), 1);
        assert_eq!(t.subtree_no(1, 5), 2);
        // Relative to the root everything is in slot 0 or 1.
        assert_eq!(t.subtree_no(0, 2), 0);
        assert_eq!(t.subtree_no(0, 6), 1);
    }

    #[test]
    fn derived_third_slot() {
        let t = balanced_four();
        // Node 1 sees 4 - 1 - 1 = 2 leaves outside its two child ranges.
        assert_eq!(t.nodes()[1].descendants[2], 2);
        // The root covers everything.
        assert_eq!(t.nodes()[0].descendants[2], 0);
    }

    #[test]
    fn presence_and_lookup() {
        let t = balanced_four();
        assert!(t.is_present("A", "D"));
        assert!(!t.is_present("A", "Z"));
        assert_eq!(t.leaf_id("C").unwrap(), 5);
        assert!(matches!(
            t.leaf_id("Z"),
            Err(TreeError::TaxonNotPresent(_))
        ));
        assert_eq!(t.present_taxa(), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn absent_taxon_is_not_present() {
        // Two-leaf cherry; "Q" is mapped as absent (id 0).
        let nodes = vec![
            node(0, None, 1, 2, 1, 1),
            node(1, Some(0), 1, 1, 1, 0),
            node(2, Some(0), 2, 2, 1, 0),
        ];
        let taxa: BTreeMap<String, NodeId> =
            [("A".to_string(), 1), ("B".to_string(), 2), ("Q".to_string(), 0)]
                .into_iter()
                .collect();
        let t = GeneTree::new(nodes, taxa, 2).unwrap();
        assert!(t.is_present("A", "B"));
        assert!(!t.is_present("A", "Q"));
        assert!(t.leaf_id("Q").is_err());
        assert_eq!(t.present_taxa(), vec!["A", "B"]);
    }

    #[test]
    fn rejects_two_roots() {
        let nodes = vec![node(0, None, 1, 0, 1, 0), node(1, None, 1, 1, 1, 0)];
        let err = GeneTree::new(nodes, BTreeMap::new(), 2).unwrap_err();
        assert!(matches!(err, TreeError::Malformed(_)));
    }

    #[test]
    fn rejects_parent_after_child() {
        let nodes = vec![
            node(0, Some(1), 0, 0, 1, 0),
            node(1, None, 0, 1, 1, 1),
        ];
        assert!(GeneTree::new(nodes, BTreeMap::new(), 2).is_err());
    }

    #[test]
    fn rejects_broken_contiguity() {
        // Claims the left subtree of the root ends at 2 when it ends at 3.
        let nodes = vec![
            node(0, None, 2, 6, 2, 2),
            node(1, Some(0), 2, 3, 1, 1),
            node(2, Some(1), 2, 2, 1, 0),
            node(3, Some(1), 3, 3, 1, 0),
            node(4, Some(0), 5, 6, 1, 1),
            node(5, Some(4), 5, 5, 1, 0),
            node(6, Some(4), 6, 6, 1, 0),
        ];
        assert!(GeneTree::new(nodes, BTreeMap::new(), 4).is_err());
    }

    #[test]
    fn rejects_leaf_count_mismatch() {
        let nodes = vec![
            node(0, None, 1, 2, 1, 1),
            node(1, Some(0), 1, 1, 1, 0),
            node(2, Some(0), 2, 2, 1, 0),
        ];
        assert!(GeneTree::new(nodes, BTreeMap::new(), 5).is_err());
    }
}
