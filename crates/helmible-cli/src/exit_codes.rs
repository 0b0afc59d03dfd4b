//! Exit codes for CLI operations.

#![allow(dead_code)]

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - usage problems and failed exports
pub const ERROR: i32 = 1;
