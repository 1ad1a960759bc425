//! Deterministic evaluation engine.
//!
//! Core modules never touch the filesystem, spawn processes, or log. They
//! turn raw per-candidate signals into gates, metrics, scores, a ranking,
//! and one winner decision. Malformed input is reported through
//! [`error::EngineError`]; every other outcome is an ordinary return value.

pub mod error;
pub mod evaluation;
pub mod gates;
pub mod metrics;
pub mod ranking;
pub mod scoring;
pub mod selection;
pub mod types;
