//! Business logic and port definitions for the nanoclaw skills engine.
//!
//! This crate owns the apply pipeline (manifest validation, path sandboxing,
//! snapshots, materialization, orchestration) and defines the "ports" the
//! infrastructure layer implements: version-control checkpoints, hook
//! execution and content hashing. It never shells out itself.

pub mod service;
pub mod skill;
