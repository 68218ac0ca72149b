//! Cross-validation of the optimized distance path against the baseline.
//!
//! The optimized query is only worth its preprocessing if it is numerically
//! indistinguishable from the linear walk. This harness checks taxon pairs —
//! exhaustively, or by seeded sampling when the pair count is large — and
//! reports the worst observed discrepancy. A tolerance violation is a fail
//! *result* carrying the offending pair, never a panic: the caller decides
//! whether that aborts anything.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::tree::{GeneTree, TreeError};

/// Outcome of one validation run.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub passed: bool,
    /// Largest |baseline − optimized| observed before stopping.
    pub worst_diff: f64,
    /// `"taxonA,taxonB"` achieving `worst_diff`; empty while every checked
    /// pair agrees exactly.
    pub worst_pair: String,
    pub pairs_checked: usize,
}

/// Compare baseline and optimized distances across taxon pairs of one tree.
///
/// Every unordered pair is checked when `pair_sample_limit` is 0 or at least
/// the total pair count; otherwise `pair_sample_limit` distinct pairs are
/// drawn with a seeded generator (self-pairs and duplicates rejected).
/// Short-circuits on the first pair whose difference exceeds `tolerance`.
/// Fewer than two present taxa is a trivial pass.
pub fn validate_optimized(
    tree: &GeneTree,
    pair_sample_limit: usize,
    seed: u64,
    tolerance: f64,
) -> Result<ValidationReport, TreeError> {
    let taxa = tree.present_taxa();
    let n = taxa.len();

    let mut report = ValidationReport {
        passed: true,
        worst_diff: 0.0,
        worst_pair: String::new(),
        pairs_checked: 0,
    };
    if n < 2 {
        return Ok(report);
    }

    let total_pairs = n * (n - 1) / 2;
    let check_all = pair_sample_limit == 0 || total_pairs <= pair_sample_limit;

    let mut check_pair =
        |i: usize, j: usize, report: &mut ValidationReport| -> Result<bool, TreeError> {
            let baseline = tree.find_dist_baseline(taxa[i], taxa[j])?;
            let optimized = tree.find_dist_optimized(taxa[i], taxa[j])?;
            let diff = (baseline - optimized).abs();
            report.pairs_checked += 1;
            if diff > report.worst_diff {
                report.worst_diff = diff;
                report.worst_pair = format!("{},{}", taxa[i], taxa[j]);
            }
            Ok(diff <= tolerance)
        };

    if check_all {
        for i in 0..n - 1 {
            for j in i + 1..n {
                if !check_pair(i, j, &mut report)? {
                    report.passed = false;
                    return Ok(report);
                }
            }
        }
        return Ok(report);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut sampled: HashSet<u64> = HashSet::with_capacity(pair_sample_limit * 2);
    while sampled.len() < pair_sample_limit {
        let i = rng.gen_range(0..n);
        let j = rng.gen_range(0..n);
        if i == j {
            continue;
        }
        let (i, j) = (i.min(j), i.max(j));
        if !sampled.insert((i * n + j) as u64) {
            continue;
        }
        if !check_pair(i, j, &mut report)? {
            report.passed = false;
            return Ok(report);
        }
    }

    Ok(report)
}
