//! Error types for the reporter.

use core::error::Error;

use derive_more::Display;
use error_stack::Report;

/// Result type for collection and submission operations.
pub type ReportResult<T> = Result<T, Report<ReportError>>;

/// Errors that can end a reporting cycle.
#[derive(Debug, Display)]
pub enum ReportError {
    /// A row does not match the column schema of its series
    #[display(
        "Schema mismatch in series {series}: {columns} columns but a row has {values} values"
    )]
    SchemaMismatch {
        series: String,
        columns: usize,
        values: usize,
    },

    /// An instrument panicked while being read
    #[display("Instrument failure: {message}")]
    Instrument { message: String },

    /// Network connectivity issues
    #[display("Network error: {message}")]
    Network { message: String },

    /// Remote rejected the write
    #[display("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Failed to encode a batch for the wire
    #[display("Encoding error: {message}")]
    Encoding { message: String },

    /// Configuration errors
    #[display("Configuration error: {message}")]
    Configuration { message: String },
}

impl Error for ReportError {}

/// Errors raised by [`crate::registry::MetricRegistry`].
#[derive(Debug, Display)]
pub enum RegistryError {
    #[display("A metric named {name} already exists")]
    DuplicateName { name: String },
}

impl Error for RegistryError {}
