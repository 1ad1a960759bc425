//! Side-effecting collaborators around the engine.

pub mod artifacts;
pub mod checks;
pub mod config;
pub mod git;
pub mod policy;
pub mod process;
pub mod strategy;
