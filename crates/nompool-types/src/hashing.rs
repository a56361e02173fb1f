//! Domain-separated BLAKE3 hashing for pool records.
//!
//! Proposal identifiers and booking hashes are both content hashes, so each
//! uses its own BLAKE3 key-derivation context. A config can never collide with
//! a booking that happens to share its byte encoding.

use crate::Hash;

/// Registered context strings.
pub mod contexts {
    pub const CONFIG_PROPOSAL: &str = "nompool v1 config-proposal";
    pub const BOOKING_RECORD: &str = "nompool v1 booking-record";

    /// All registered context strings.
    pub const ALL_CONTEXTS: &[&str] = &[CONFIG_PROPOSAL, BOOKING_RECORD];
}

/// Plain BLAKE3 hash.
pub fn hash(data: &[u8]) -> Hash {
    *::blake3::hash(data).as_bytes()
}

/// Hash `data` under a registered context using BLAKE3's derive-key mode.
pub fn domain_hash(context: &str, data: &[u8]) -> Hash {
    let mut hasher = ::blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Length-prefixed encoding of several dynamic fields:
/// `LE32(len(f1)) || f1 || LE32(len(f2)) || f2 || ...`
pub fn encode_multi_field(fields: &[&[u8]]) -> Vec<u8> {
    let total_len: usize = fields.iter().map(|f| 4 + f.len()).sum();
    let mut output = Vec::with_capacity(total_len);
    for field in fields {
        output.extend_from_slice(&(field.len() as u32).to_le_bytes());
        output.extend_from_slice(field);
    }
    output
}
