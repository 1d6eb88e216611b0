//! Batch XBF verification
//!
//! Finds XBF files under a directory and checks, in parallel, that each one
//! decodes and re-encodes to the exact bytes it was read from.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::error::Result;
use crate::formats::xbf::{parse_xbf_bytes, serialize_xbf};

/// Outcome of verifying one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyStatus {
    /// Fully decoded and re-encoded byte for byte.
    Exact,
    /// Re-encoded byte for byte, but part of the file was kept as an
    /// unparsed tail.
    Partial { error: String, tail_len: usize },
    /// The re-encoded bytes differ from the file.
    Mismatch { first_difference: usize },
}

/// Verification report for one file.
#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub path: PathBuf,
    pub file_size: usize,
    pub node_count: usize,
    pub status: VerifyStatus,
}

impl VerifyReport {
    /// Whether re-encoding reproduced the file.
    pub fn is_lossless(&self) -> bool {
        !matches!(self.status, VerifyStatus::Mismatch { .. })
    }
}

/// Progress update sent once per file as it starts.
#[derive(Debug, Clone)]
pub struct VerifyProgress {
    pub current: usize,
    pub total: usize,
    pub current_file: String,
}

/// Result of a batch verification
#[derive(Debug, Clone)]
pub struct BatchVerifyResult {
    /// Files that decoded completely and round-tripped exactly
    pub exact_count: usize,
    /// Files that round-tripped only through an unparsed tail
    pub partial_count: usize,
    /// Files that could not be read or did not round-trip
    pub fail_count: usize,
    /// One message per file, in input order
    pub results: Vec<String>,
}

/// Find all .xbf files in a directory recursively
///
/// # Returns
/// A sorted list of paths to .xbf files found in the directory tree.
pub fn find_xbf_files<P: AsRef<Path>>(dir: P) -> Vec<PathBuf> {
    let mut xbf_files: Vec<_> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| {
            e.path().is_file()
                && e.path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("xbf"))
        })
        .map(|e| e.path().to_path_buf())
        .collect();

    xbf_files.sort();
    xbf_files
}

/// Decode one file, encode it again and compare against the original bytes.
///
/// # Errors
/// Returns an error if the file cannot be read or the decoded scene cannot be
/// encoded.
pub fn verify_file<P: AsRef<Path>>(path: P) -> Result<VerifyReport> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let scene = parse_xbf_bytes(&data);
    let encoded = serialize_xbf(&scene)?;

    let status = if encoded != data {
        let first_difference = encoded
            .iter()
            .zip(&data)
            .position(|(a, b)| a != b)
            .unwrap_or_else(|| encoded.len().min(data.len()));
        VerifyStatus::Mismatch { first_difference }
    } else if let Some(err) = &scene.error {
        VerifyStatus::Partial {
            error: err.to_string(),
            tail_len: scene.unparsed_tail.as_ref().map_or(0, Vec::len),
        }
    } else {
        VerifyStatus::Exact
    };

    tracing::debug!("{}: {:?}", path.display(), status);
    Ok(VerifyReport {
        path: path.to_path_buf(),
        file_size: data.len(),
        node_count: scene.nodes.len(),
        status,
    })
}

/// Verify XBF files in parallel
///
/// # Arguments
/// * `files` - Files to verify
/// * `progress` - Callback invoked as each file starts
pub fn verify_batch<F>(files: &[PathBuf], progress: F) -> BatchVerifyResult
where
    F: Fn(&VerifyProgress) + Send + Sync,
{
    let exact_counter = AtomicUsize::new(0);
    let partial_counter = AtomicUsize::new(0);
    let fail_counter = AtomicUsize::new(0);
    let processed = AtomicUsize::new(0);
    let total = files.len();

    let results: Vec<String> = files
        .par_iter()
        .map(|path| {
            let display_path = path.to_string_lossy().to_string();
            let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
            progress(&VerifyProgress {
                current,
                total,
                current_file: display_path.clone(),
            });

            match verify_file(path) {
                Ok(report) => match report.status {
                    VerifyStatus::Exact => {
                        exact_counter.fetch_add(1, Ordering::SeqCst);
                        format!("OK: {display_path} ({} nodes)", report.node_count)
                    }
                    VerifyStatus::Partial { error, tail_len } => {
                        partial_counter.fetch_add(1, Ordering::SeqCst);
                        format!("Partial: {display_path}: {error} ({tail_len} bytes unparsed)")
                    }
                    VerifyStatus::Mismatch { first_difference } => {
                        fail_counter.fetch_add(1, Ordering::SeqCst);
                        format!("Mismatch: {display_path}: first difference at byte {first_difference}")
                    }
                },
                Err(e) => {
                    fail_counter.fetch_add(1, Ordering::SeqCst);
                    format!("Failed {display_path}: {e}")
                }
            }
        })
        .collect();

    let result = BatchVerifyResult {
        exact_count: exact_counter.load(Ordering::SeqCst),
        partial_count: partial_counter.load(Ordering::SeqCst),
        fail_count: fail_counter.load(Ordering::SeqCst),
        results,
    };
    tracing::info!(
        "Verified {} files: {} exact, {} partial, {} failed",
        total,
        result.exact_count,
        result.partial_count,
        result.fail_count
    );
    result
}
