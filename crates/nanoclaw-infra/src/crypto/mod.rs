//! Cryptographic operations for nanoclaw.
//!
//! - `hash`: SHA-256 content hashing for the applied-skill ledger

pub mod hash;
