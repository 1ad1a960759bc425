//! Patch tournament referee.
//!
//! Several strategies attempt the same task in isolated working copies. The
//! referee judges each candidate on hard gates and weighted quality metrics,
//! ranks them under a strict total order and selects a winner, or reports that
//! no candidate is safe to adopt.
//!
//! - **[`core`]**: pure, deterministic evaluation engine (gates, metrics,
//!   scoring, ranking, selection). No I/O.
//! - **[`io`]**: side-effecting collaborators (git, processes, checks,
//!   strategies, policy, configuration, artifacts).
//!
//! [`tournament`] wires the two together for one round; [`report`] renders
//! and validates its outcome.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pool;
pub mod report;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tournament;
