//! Service-level ports shared by the skill pipeline.

pub mod hash;
