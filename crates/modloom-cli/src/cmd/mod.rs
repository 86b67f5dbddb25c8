//! Subcommand implementations.

pub mod resolve;
pub mod sources;
pub mod targets;
