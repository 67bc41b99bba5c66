//! SHA-256 content hashing for applied-skill file records.
//!
//! Implements the `ContentHasher` trait from `nanoclaw-core` using the
//! `sha2` crate (RustCrypto ecosystem).

use sha2::{Digest, Sha256};

use nanoclaw_core::service::hash::ContentHasher;

/// SHA-256 implementation of `ContentHasher`.
///
/// Produces lowercase hex digests of raw file bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256ContentHasher;

impl Sha256ContentHasher {
    pub fn new() -> Self {
        Self
    }
}

impl ContentHasher for Sha256ContentHasher {
    fn compute_hash(&self, content: &[u8]) -> String {
        format!("{:x}", Sha256::digest(content))
    }
}
