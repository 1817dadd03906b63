//! Stable exit codes for ticketwatcher CLI commands.

/// Command succeeded, including runs that were ignored or need human input.
pub const OK: i32 = 0;
/// Invalid input, configuration, or an unexpected runtime error.
pub const INVALID: i32 = 1;
/// `ticketwatcher handle` ran and ended in the `failed` state.
pub const FAILED: i32 = 2;
