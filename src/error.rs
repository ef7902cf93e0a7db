//! Error classification shared by every component.
//!
//! Each component owns a `thiserror` enum; this trait gives all of them a
//! grepable code so that transports and the error diagram can report a
//! failure's classification without matching on concrete types.

/// Grepable error code and retryable flag for structured error reporting.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
