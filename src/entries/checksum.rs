//! CRC32 trailer for entity records
//!
//! Every record ends with a CRC32 (IEEE polynomial) over all preceding
//! bytes, length prefix and type name included. A window that straddles
//! two records, or cuts one short, almost never verifies.

use crc32fast::Hasher;

/// Computes a CRC32 checksum over the provided data.
///
/// This function is deterministic: the same input always produces the same output.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Verifies that the computed checksum matches the expected checksum.
pub fn verify_checksum(data: &[u8], expected: u32) -> bool {
    compute_checksum(data) == expected
}
