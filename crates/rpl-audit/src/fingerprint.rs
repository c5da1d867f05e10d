//! Policy-table fingerprints.
//!
//! A fingerprint commits to every policy in a frozen table, so a caller can
//! prove that the table evaluated at the end of an epoch is the one that was
//! published at its start.
//!
//! Hash input layout (bytes, in order, per policy in id order):
//!   1. policy name as UTF-8 bytes
//!   2. a single zero byte
//!   3. canonical JSON of the policy (serde_json, no pretty-printing)

use sha2::{Digest, Sha256};

use rpl_core::registry::PolicyTable;

/// SHA-256 over every policy in `table`, as a lowercase hex string.
///
/// Links (`PolicyId`s) are not serialized, so two tables built from the same
/// configuration have the same fingerprint.
///
/// # Panics
///
/// Panics if a policy cannot be serialized to JSON, which cannot happen for
/// the IR types.
pub fn fingerprint(table: &PolicyTable) -> String {
    let mut hasher = Sha256::new();
    for policy in table.iter() {
        let json = serde_json::to_vec(policy).expect("RoutingPolicy must always be serializable to JSON");
        hasher.update(policy.name.as_bytes());
        hasher.update([0u8]);
        hasher.update(&json);
    }
    hex::encode(hasher.finalize())
}

/// True if `table` still hashes to `expected`.
pub fn verify_fingerprint(table: &PolicyTable, expected: &str) -> bool {
    fingerprint(table) == expected
}
