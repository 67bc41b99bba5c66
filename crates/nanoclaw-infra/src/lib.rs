//! Infrastructure layer for nanoclaw.
//!
//! Contains implementations of the ports defined in `nanoclaw-core`: git-backed
//! checkpoints, shell hook execution and SHA-256 content hashing, plus the
//! engine configuration loader and project-root resolution.

pub mod config;
pub mod crypto;
pub mod project;
pub mod skill;
