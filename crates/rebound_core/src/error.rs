//! Error types
//!
//! None of these are fatal. Value APIs recover locally and log through
//! `tracing`; the typed errors exist for the lower-level entry points
//! (configuration validation, scheduler handles, range construction).

use thiserror::Error;

/// Recoverable errors raised by the Rebound runtime
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A spring parameter is outside its valid domain
    #[error("invalid spring parameter `{field}`: {value}")]
    InvalidConfig { field: &'static str, value: f64 },

    /// The scheduler behind a weak handle no longer exists
    #[error("animation scheduler has been dropped")]
    SchedulerDropped,

    /// Input and output ranges cannot be mapped onto each other
    #[error("invalid range mapping: {0}")]
    InvalidRange(String),
}

/// Result type for Rebound operations
pub type Result<T> = std::result::Result<T, Error>;
