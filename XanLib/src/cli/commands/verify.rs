//! Round-trip verification command

use std::path::Path;
use std::time::Instant;

use crate::batch::{VerifyStatus, find_xbf_files, verify_batch, verify_file};
use crate::cli::progress::{LOOKING_GLASS, print_done, print_step, simple_bar};

/// Verify a single file or every XBF file under a directory.
pub fn execute(path: &Path, quiet: bool) -> anyhow::Result<()> {
    if path.is_file() {
        return verify_single(path);
    }

    let started = Instant::now();
    if !quiet {
        print_step(1, 1, LOOKING_GLASS, &format!("Scanning {}...", path.display()));
    }
    let files = find_xbf_files(path);
    if files.is_empty() {
        println!("No XBF files found in: {}", path.display());
        return Ok(());
    }

    let pb = if quiet {
        None
    } else {
        Some(simple_bar(files.len() as u64, "Verifying"))
    };
    let result = verify_batch(&files, |progress| {
        if let Some(pb) = &pb {
            pb.set_position(progress.current as u64);
        }
    });
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if !quiet {
        for line in &result.results {
            println!("{line}");
        }
        println!();
    }
    println!(
        "Verified {} files: {} exact, {} partial, {} failed",
        files.len(),
        result.exact_count,
        result.partial_count,
        result.fail_count
    );
    if !quiet {
        print_done(started.elapsed());
    }

    if result.fail_count > 0 {
        anyhow::bail!("{} files did not round-trip", result.fail_count);
    }
    Ok(())
}

fn verify_single(path: &Path) -> anyhow::Result<()> {
    let report = verify_file(path)?;
    match report.status {
        VerifyStatus::Exact => {
            println!("OK: {} ({} nodes, {} bytes)", path.display(), report.node_count, report.file_size);
        }
        VerifyStatus::Partial { error, tail_len } => {
            println!("Partial: {}: {error}", path.display());
            println!("  {} nodes decoded, {tail_len} bytes kept unparsed", report.node_count);
        }
        VerifyStatus::Mismatch { first_difference } => {
            anyhow::bail!(
                "{} did not round-trip: first difference at byte {first_difference}",
                path.display()
            );
        }
    }
    Ok(())
}
