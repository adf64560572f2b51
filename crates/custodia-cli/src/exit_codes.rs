//! Process exit codes.
//!
//! Usage errors exit with 2 through clap's own error handling.

/// Success; for `verify`, the chain is valid.
pub const OK: i32 = 0;
/// I/O or parse failure.
pub const IO_ERROR: i32 = 1;
/// The chain was validated and rejected.
pub const VALIDATION_REJECTED: i32 = 3;
