//! Common code shared between `detect_server` and `classify_server`.
pub mod api;
pub mod types;

/// Error type.
pub type Error = Box<dyn std::error::Error>;
