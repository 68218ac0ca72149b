//! Summarize many gene trees into one taxon-by-taxon distance matrix.
//!
//! Each cell averages the chosen algorithm's distance over only the trees
//! where both taxa occur; taxa missing from a tree simply do not vote.
//! Pairs that co-occur nowhere get a sentinel instead of a fake zero.
//!
//! Pair cells are independent, so they are computed in parallel. Indexes
//! are built eagerly before the parallel phase: build fully, then share
//! read-only.

use rayon::prelude::*;

use crate::tree::{GeneTree, TreeError};

/// Which distance computation drives the queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Baseline,
    Optimized,
    AllLca,
}

impl Algorithm {
    pub fn dist(self, tree: &GeneTree, a: &str, b: &str) -> Result<f64, TreeError> {
        match self {
            Algorithm::Baseline => tree.find_dist_baseline(a, b),
            Algorithm::Optimized => tree.find_dist_optimized(a, b),
            Algorithm::AllLca => tree.find_dist_all_lca(a, b),
        }
    }
}

/// Matrix entry for taxon pairs that co-occur in no tree.
pub const NO_COOCCURRENCE: f64 = -1.0;

/// Average pairwise distances over a tree collection.
///
/// Cell `(i, j)` is the arithmetic mean of the distance over exactly the
/// trees where both `taxa[i]` and `taxa[j]` are present, or
/// [`NO_COOCCURRENCE`] when no tree holds both. The result is symmetric
/// with a zero diagonal.
pub fn aggregate_matrix(
    trees: &[GeneTree],
    taxa: &[String],
    algorithm: Algorithm,
) -> Result<Vec<Vec<f64>>, TreeError> {
    let n = taxa.len();

    if algorithm == Algorithm::Optimized {
        for tree in trees {
            tree.lca_index();
        }
    }

    let cells: Vec<(usize, usize, f64)> = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| ((i + 1)..n).map(move |j| (i, j)))
        .map(|(i, j)| {
            let mut sum = 0.0;
            let mut count = 0usize;
            for tree in trees {
                if !tree.is_present(&taxa[i], &taxa[j]) {
                    continue;
                }
                sum += algorithm.dist(tree, &taxa[i], &taxa[j])?;
                count += 1;
            }
            let cell = if count == 0 {
                NO_COOCCURRENCE
            } else {
                sum / count as f64
            };
            Ok((i, j, cell))
        })
        .collect::<Result<Vec<_>, TreeError>>()?;

    let mut matrix = vec![vec![0.0f64; n]; n];
    for (i, j, d) in cells {
        matrix[i][j] = d;
        matrix[j][i] = d;
    }
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::build::random_binary_tree;

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    /// Three 4-leaf trees drawn from a 6-taxon universe with partial
    /// overlap.
    fn overlapping_trees() -> (Vec<GeneTree>, Vec<String>) {
        let mut rng = StdRng::seed_from_u64(123);
        let trees = vec![
            random_binary_tree(&strings(&["A", "B", "C", "D"]), &mut rng).unwrap(),
            random_binary_tree(&strings(&["B", "C", "E", "F"]), &mut rng).unwrap(),
            random_binary_tree(&strings(&["A", "C", "D", "E"]), &mut rng).unwrap(),
        ];
        (trees, strings(&["A", "B", "C", "D", "E", "F"]))
    }

    #[test]
    fn algorithms_agree_cell_wise() {
        let (trees, universe) = overlapping_trees();
        let baseline = aggregate_matrix(&trees, &universe, Algorithm::Baseline).unwrap();
        let optimized = aggregate_matrix(&trees, &universe, Algorithm::Optimized).unwrap();
        let all_lca = aggregate_matrix(&trees, &universe, Algorithm::AllLca).unwrap();

        for i in 0..universe.len() {
            for j in 0..universe.len() {
                assert!(
                    (baseline[i][j] - optimized[i][j]).abs() <= 1e-12,
                    "cell ({}, {})",
                    i,
                    j
                );
                assert!(
                    (baseline[i][j] - all_lca[i][j]).abs() <= 1e-12,
                    "cell ({}, {})",
                    i,
                    j
                );
            }
        }
    }

    #[test]
    fn never_cooccurring_pairs_get_the_sentinel() {
        let (trees, universe) = overlapping_trees();
        let matrix = aggregate_matrix(&trees, &universe, Algorithm::Baseline).unwrap();

        // F occurs only in tree 2, which holds neither A nor D.
        let a = universe.iter().position(|t| t == "A").unwrap();
        let d = universe.iter().position(|t| t == "D").unwrap();
        let f = universe.iter().position(|t| t == "F").unwrap();
        assert_eq!(matrix[a][f], NO_COOCCURRENCE);
        assert_eq!(matrix[d][f], NO_COOCCURRENCE);
    }

    #[test]
    fn single_tree_pairs_are_exact() {
        let (trees, universe) = overlapping_trees();
        let matrix = aggregate_matrix(&trees, &universe, Algorithm::Optimized).unwrap();

        // (B, F) lives only in tree 2; its cell must equal that tree's
        // distance exactly, not approximately.
        let b = universe.iter().position(|t| t == "B").unwrap();
        let f = universe.iter().position(|t| t == "F").unwrap();
        assert_eq!(
            matrix[b][f],
            trees[1].find_dist_optimized("B", "F").unwrap()
        );
    }

    #[test]
    fn matrix_is_symmetric_with_zero_diagonal() {
        let (trees, universe) = overlapping_trees();
        let matrix = aggregate_matrix(&trees, &universe, Algorithm::Baseline).unwrap();
        for i in 0..universe.len() {
            assert_eq!(matrix[i][i], 0.0);
            for j in 0..universe.len() {
                assert_eq!(matrix[i][j], matrix[j][i]);
            }
        }
    }

    #[test]
    fn mean_over_present_trees_only() {
        let (trees, universe) = overlapping_trees();
        let matrix = aggregate_matrix(&trees, &universe, Algorithm::Baseline).unwrap();

        // (B, C) occurs in trees 1 and 2 but not 3.
        let b = universe.iter().position(|t| t == "B").unwrap();
        let c = universe.iter().position(|t| t == "C").unwrap();
        let expected = (trees[0].find_dist_baseline("B", "C").unwrap()
            + trees[1].find_dist_baseline("B", "C").unwrap())
            / 2.0;
        assert!((matrix[b][c] - expected).abs() <= 1e-12);
    }
}
