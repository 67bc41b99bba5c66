//! ContentHasher trait for computing integrity hashes.
//!
//! Defined in nanoclaw-core so the materializer can fingerprint written files
//! without coupling to a specific hashing algorithm. The `Sha256ContentHasher`
//! adapter lives in nanoclaw-infra.

/// Abstraction over content hashing for the applied-skill ledger.
///
/// Every file a skill writes is hashed and recorded under the skill's ledger
/// entry, so later tooling can tell whether a file still holds what the skill
/// put there.
pub trait ContentHasher: Send + Sync {
    /// Compute a hex-encoded hash of the given content.
    fn compute_hash(&self, content: &[u8]) -> String;
}
