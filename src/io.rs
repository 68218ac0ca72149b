use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::build::from_newick;
use crate::tree::GeneTree;

/// Read gene trees from a Newick file, one tree per line.
///
/// If `path` ends with `.gz` the input is gunzipped on the fly. Blank lines
/// and `#` comment lines are skipped. Lines that fail to parse or convert
/// are reported on stderr and skipped rather than aborting the whole file.
/// Each tree is named `<basename>_tree_<line index>`.
pub fn read_newick_trees<P: AsRef<Path>>(path: P) -> io::Result<Vec<(String, GeneTree)>> {
    let p = path.as_ref();
    let file = File::open(p)?;
    let is_gz = p.to_string_lossy().ends_with(".gz");
    let reader: Box<dyn BufRead> = if is_gz {
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let base_name = p
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| {
            s.trim_end_matches(".gz")
                .trim_end_matches(".nwk")
                .trim_end_matches(".newick")
        })
        .unwrap_or("unknown")
        .to_string();

    let mut trees = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let newick = line.trim();
        if newick.is_empty() || newick.starts_with('#') {
            continue;
        }
        match from_newick(newick) {
            Ok(tree) => trees.push((format!("{base_name}_tree_{idx}"), tree)),
            Err(e) => {
                eprintln!("Skipping tree at line {} of {}: {}", idx + 1, p.display(), e);
            }
        }
    }
    Ok(trees)
}

/// Write a labeled square matrix as TSV to a file or stdout.
/// If `path` ends with `.gz`, the output is gzip-compressed.
/// If `path` equals `-`, the matrix is written to stdout (uncompressed).
pub fn write_matrix_tsv<P: AsRef<Path>, T: std::fmt::Display>(
    path: P,
    names: &[String],
    mat: &[Vec<T>],
) -> io::Result<()> {
    let p = path.as_ref();

    let mut out: Box<dyn Write> = if p.as_os_str() == "-" {
        Box::new(BufWriter::new(io::stdout()))
    } else if p.to_string_lossy().ends_with(".gz") {
        let f = File::create(p)?;
        let enc = GzEncoder::new(f, Compression::default());
        Box::new(BufWriter::new(enc))
    } else {
        Box::new(BufWriter::new(File::create(p)?))
    };

    // Header row
    write!(&mut out, "\t")?;
    for (k, name) in names.iter().enumerate() {
        if k > 0 {
            write!(&mut out, "\t")?;
        }
        write!(&mut out, "{}", name)?;
    }
    writeln!(&mut out)?;

    // Rows
    for (i, row) in mat.iter().enumerate() {
        write!(&mut out, "{}", names[i])?;
        for val in row {
            write!(&mut out, "\t{}", val)?;
        }
        writeln!(&mut out)?;
    }

    out.flush()?;
    Ok(())
}
