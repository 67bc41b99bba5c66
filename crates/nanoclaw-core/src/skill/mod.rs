//! Skill package application.
//!
//! The pipeline runs leaves-first: [`manifest`] validation, [`sandbox`] path
//! resolution, the [`snapshot`] store, a [`transaction`] checkpoint around
//! [`materializer`] writes and [`hooks`], then the [`state`] ledger update.
//! [`apply`] sequences all of it and drives rollback.

pub mod apply;
pub mod hooks;
pub mod manifest;
pub mod materializer;
pub mod sandbox;
pub mod snapshot;
pub mod state;
pub mod transaction;
