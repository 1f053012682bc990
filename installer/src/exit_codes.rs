//! Stable exit codes for the installer CLI.

/// Every required task completed.
pub const OK: i32 = 0;
/// Bad arguments, unreadable settings, or an undiscoverable host location.
pub const INVALID: i32 = 1;
/// A required task failed (an install run was rolled back).
pub const FAILED: i32 = 2;
