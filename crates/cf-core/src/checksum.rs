//! SHA-256 checksums for idempotent re-submission detection.

use crate::error::CoreResult;
use crate::record::RawRecord;
use sha2::{Digest, Sha256};

/// Compute SHA256 checksum of a string
pub fn compute_checksum(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Content hash of a record batch.
///
/// Hashes the canonical JSON encoding, so two batches hash equal exactly when
/// they contain the same records in the same order.
pub fn records_checksum(records: &[RawRecord]) -> CoreResult<String> {
    let canonical = serde_json::to_string(records)?;
    Ok(compute_checksum(&canonical))
}

#[cfg(test)]
#[path = "checksum_test.rs"]
mod tests;
