//! Error handling for the loadmon measurement core
//!
//! This module defines custom error types and a Result alias for use
//! throughout the crate. The taxonomy follows three tiers:
//!
//! - configuration-fatal: bad system configuration (double column
//!   assignment, mismatched array shapes, invalid config files) — raised
//!   immediately, intended to abort startup
//! - data-contract violations: wrong-length update vectors, writes after
//!   finalize — typed errors handled by the immediate caller
//! - soft conditions (missing node address, unknown packet address, audit
//!   log write failures) are not represented here; they are logged and
//!   processing continues

use thiserror::Error;

/// Main error type for loadmon operations
#[derive(Error, Debug)]
pub enum LoadMonError {
    /// Write attempted on finalized measurement data
    #[error("measurement data is finalized, writes are rejected")]
    FinalizedWrite,

    /// An update row did not match the channel count
    #[error("data length mismatch: expected {expected} channel values, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    /// A sensor tried to claim columns in the shared arrays twice
    #[error("sensor {sensor} already has columns assigned; re-registration would grow the arrays unboundedly")]
    ColumnsAlreadyAssigned { sensor: String },

    /// A sensor data operation was attempted before `register`
    #[error("sensor {sensor} is not registered with a sample store")]
    NotRegistered { sensor: String },

    /// Input and output arrays disagree on history depth
    #[error("array shape mismatch: input has {input_rows} rows, output has {output_rows}")]
    ShapeMismatch {
        input_rows: usize,
        output_rows: usize,
    },

    /// Errors related to system configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Errors related to converter script compilation or execution
    #[error("script error: {0}")]
    Script(String),

    /// IO errors (audit log, config files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization errors
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<LoadMonError>,
    },
}

impl LoadMonError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        LoadMonError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a script error from a Rhai error
    pub fn from_rhai_error(err: Box<rhai::EvalAltResult>) -> Self {
        LoadMonError::Script(err.to_string())
    }
}

/// Result type alias for loadmon operations
pub type Result<T> = std::result::Result<T, LoadMonError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
