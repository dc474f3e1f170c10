//! Error types for collector communication.

use core::error::Error;

use derive_more::Display;
use error_stack::Report;

/// Result type for communication operations.
pub type CommResult<T> = Result<T, Report<CommError>>;

/// Errors that can occur while talking to a collector host.
#[derive(Debug, Display)]
pub enum CommError {
    /// Network connectivity issues
    #[display("Network error: {message}")]
    Network { message: String },

    /// Serialization/deserialization errors
    #[display("Serialization error: {message}")]
    Serialization { message: String },

    /// Configuration errors
    #[display("Configuration error: {message}")]
    Configuration { message: String },

    /// Timeout errors
    #[display("Operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Collector answered with something other than 200
    #[display("Collector responded with HTTP {status}")]
    UnexpectedStatus { status: u16 },

    /// SPNEGO negotiation failed
    #[display("Authentication error: {message}")]
    Authentication { message: String },

    /// Shutdown was requested while a delivery was in progress
    #[display("Delivery interrupted by shutdown")]
    Interrupted,
}

impl Error for CommError {}
