//! Stable exit codes for the referee CLI.

/// A winner was selected, or a read-only command succeeded.
pub const OK: i32 = 0;
/// Invalid input, configuration, repository state, or any other error.
pub const INVALID: i32 = 1;
/// `referee run` completed but no candidate passed every hard gate.
pub const NO_SAFE_WINNER: i32 = 2;
