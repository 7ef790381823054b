//! Stable exit codes for storydiff commands.

/// Diff produced, or the model answered without calling the tool.
pub const OK: i32 = 0;
/// Invalid config, planner failure, no valid diff after retries, or any
/// other fatal error.
pub const FAILED: i32 = 1;
