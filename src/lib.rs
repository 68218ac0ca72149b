//! Crate root: lightweight module orchestration and public re-exports.
//!
//! Modules:
//! - `tree`: id-contiguous gene tree encoding + construction-time validation.
//! - `distance`: baseline / optimized / all-LCA pairwise taxon distances.
//! - `lca`: build-once Euler-tour LCA index with root-path prefix sums.
//! - `validate`: baseline-vs-optimized cross-validation harness.
//! - `aggregate`: averaged distance matrices over many gene trees.
//! - `build`: validated tree construction (seeded random or Newick).
//! - `stats`: descriptive statistics for distance distributions.
//! - `io`: reading Newick tree files and writing TSV matrices.

pub mod aggregate;
pub mod build;
pub mod distance;
pub mod io;
pub mod lca;
pub mod stats;
pub mod tree;
pub mod validate;

// Re-export frequently used types & functions
pub use aggregate::{Algorithm, NO_COOCCURRENCE, aggregate_matrix};
pub use build::{from_newick, from_phylo, random_binary_tree};
pub use io::{read_newick_trees, write_matrix_tsv};
pub use lca::LcaIndex;
pub use tree::{GeneTree, Node, NodeId, TreeError};
pub use validate::{ValidationReport, validate_optimized};
