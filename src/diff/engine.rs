//! Byte-level comparison primitives.
//!
//! The verdict for a pair of payloads is a pure function of the two byte
//! sequences plus the order-sensitivity setting; nothing here touches
//! metrics or IO except the external comparator hook.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Bytes of context extracted on each side of the first mismatch.
pub const CONTEXT_BYTES: usize = 100;

/// Index of the first differing byte, or `min(a.len(), b.len())` when one
/// payload is a prefix of the other.
pub fn first_mismatch(a: &[u8], b: &[u8]) -> usize {
    let limit = a.len().min(b.len());
    for i in 0..limit {
        if a[i] != b[i] {
            return i;
        }
    }
    limit
}

/// Window `[max(0, i-100), min(limit, i+100))` around a mismatch at `i`,
/// where `limit` is the shorter payload length.
pub fn context_bounds(i: usize, limit: usize) -> (usize, usize) {
    (
        i.saturating_sub(CONTEXT_BYTES),
        (i + CONTEXT_BYTES).min(limit),
    )
}

/// Order-insensitive equality: equal multisets of bytes.
pub fn canonical_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut histogram = [0i64; 256];
    for &byte in a {
        histogram[byte as usize] += 1;
    }
    for &byte in b {
        histogram[byte as usize] -= 1;
    }
    histogram.iter().all(|&n| n == 0)
}

/// External comparator failed to run; the verdict falls back to `diff`.
#[derive(Debug, Error)]
pub enum ComparatorError {
    #[error("comparator io failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the configured comparator command against the two payloads.
///
/// The payloads are written to scratch files and the command is invoked
/// with both paths as arguments; exit status zero means the payloads are
/// equivalent.
pub async fn external_compare(cmd: &str, a: &[u8], b: &[u8]) -> Result<bool, ComparatorError> {
    let tag = Uuid::new_v4();
    let path_a = scratch_path(tag, "a");
    let path_b = scratch_path(tag, "b");

    tokio::fs::write(&path_a, a).await?;
    tokio::fs::write(&path_b, b).await?;

    let status = tokio::process::Command::new(cmd)
        .arg(&path_a)
        .arg(&path_b)
        .status()
        .await;

    let _ = tokio::fs::remove_file(&path_a).await;
    let _ = tokio::fs::remove_file(&path_b).await;

    Ok(status?.success())
}

fn scratch_path(tag: Uuid, side: &str) -> PathBuf {
    std::env::temp_dir().join(format!("diffmirror-{tag}-{side}"))
}
