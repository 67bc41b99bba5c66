//! Shared domain types for the nanoclaw skills engine.
//!
//! Skill manifests, the per-project state document, engine configuration and
//! the error types every layer reports through.
//!
//! Zero infrastructure dependencies -- only serde, semver, chrono, thiserror.

pub mod config;
pub mod error;
pub mod skill;
pub mod state;
