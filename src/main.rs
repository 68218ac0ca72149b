use clap::{Parser, ValueEnum};
use gene_tree_distances::aggregate::{Algorithm, aggregate_matrix};
use gene_tree_distances::io::{read_newick_trees, write_matrix_tsv};
use gene_tree_distances::validate::validate_optimized;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;

/// Aggregate pairwise taxon distances over a file of gene trees and write
/// a labeled distance matrix (TSV) where row/column names are taxon labels.
#[derive(Parser, Debug)]
#[command(
    name = "gene-tree-dists",
    version,
    about = "Taxon distance matrix aggregated over gene trees"
)]
struct Args {
    /// Path to a Newick tree file, one tree per line (.gz supported)
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Output path for the TSV distance matrix ("-" for stdout, .gz compresses)
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Distance algorithm to aggregate with: baseline | optimized | all-lca
    #[arg(long = "algorithm", value_enum, default_value_t = AlgorithmArg::Optimized)]
    algorithm: AlgorithmArg,

    /// Cross-validate optimized vs baseline on every tree before aggregating
    #[arg(long = "validate", default_value_t = false)]
    validate: bool,

    /// Max sampled pairs per tree during validation (0 checks every pair)
    #[arg(long = "sample-limit", default_value_t = 0)]
    sample_limit: usize,

    /// Seed for the validation pair sampler
    #[arg(long = "seed", default_value_t = 42)]
    seed: u64,

    /// Numeric tolerance for validation
    #[arg(long = "tolerance", default_value_t = 1e-12)]
    tolerance: f64,

    /// Quiet mode: suppresses progress messages on stdout
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum AlgorithmArg {
    Baseline,
    Optimized,
    AllLca,
}

impl From<AlgorithmArg> for Algorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Baseline => Algorithm::Baseline,
            AlgorithmArg::Optimized => Algorithm::Optimized,
            AlgorithmArg::AllLca => Algorithm::AllLca,
        }
    }
}

fn main() {
    let args = Args::parse();

    // Read trees with names
    let t0 = Instant::now();
    let named_trees = match read_newick_trees(&args.input) {
        Ok(trees) => trees,
        Err(e) => {
            eprintln!("Failed to read {:?}: {e}", args.input);
            std::process::exit(2);
        }
    };
    if named_trees.is_empty() {
        eprintln!("No trees parsed from {:?}.", args.input);
        std::process::exit(2);
    }
    let read_s = t0.elapsed().as_secs_f64();
    log_if(!args.quiet, format!("Reading newick trees {read_s:.3}s"));
    let (names, trees): (Vec<String>, Vec<_>) = named_trees.into_iter().unzip();

    // Taxon universe: union of every tree's present taxa, sorted.
    let universe: Vec<String> = trees
        .iter()
        .flat_map(|t| t.present_taxa().into_iter().map(str::to_string))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    log_if(
        !args.quiet,
        format!("Read {} trees over {} taxa", trees.len(), universe.len()),
    );

    if args.validate {
        let t1 = Instant::now();
        for (name, tree) in names.iter().zip(&trees) {
            match validate_optimized(tree, args.sample_limit, args.seed, args.tolerance) {
                Ok(report) if report.passed => {}
                Ok(report) => {
                    eprintln!(
                        "Validation failed on {name}: pair ({}) differs by {:e} after {} pairs",
                        report.worst_pair, report.worst_diff, report.pairs_checked
                    );
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Validation error on {name}: {e}");
                    std::process::exit(3);
                }
            }
        }
        let val_s = t1.elapsed().as_secs_f64();
        log_if(
            !args.quiet,
            format!("Cross-validated {} trees {val_s:.3}s", trees.len()),
        );
    }

    let algorithm = Algorithm::from(args.algorithm);
    let n = universe.len();
    log_if(
        !args.quiet,
        format!(
            "Determining distances using {algorithm:?} for {} taxon pairs",
            n * n.saturating_sub(1) / 2
        ),
    );

    let t2 = Instant::now();
    let matrix = match aggregate_matrix(&trees, &universe, algorithm) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Failed to aggregate distances: {e}");
            std::process::exit(3);
        }
    };
    let comp_s = t2.elapsed().as_secs_f64();
    log_if(
        !args.quiet,
        format!("Determining distances using {algorithm:?} {comp_s:.3}s"),
    );

    if matches!(algorithm, Algorithm::Optimized) && !args.quiet {
        let bytes: usize = trees.iter().map(|t| t.lca_index().memory_bytes()).sum();
        println!(
            "Preprocessed LCA indexes hold {bytes} bytes across {} trees",
            trees.len()
        );
    }

    let t3 = Instant::now();
    if let Err(e) = write_matrix_tsv(&args.output, &universe, &matrix) {
        eprintln!("Failed to write output {:?}: {e}", args.output);
        std::process::exit(4);
    }
    let write_s = t3.elapsed().as_secs_f64();
    log_if(!args.quiet, format!("Writing to output {write_s:.3}s"));
}

fn log_if(show: bool, msg: String) {
    if show {
        println!("{}", msg);
    }
}
