//! Custom error types for ccs configuration.

use thiserror::Error;

/// Errors raised while validating configuration, before any pipeline work
/// begins. These are fatal: the command reports them and exits non-zero
/// without creating or truncating any output file.
#[derive(Error, Debug)]
pub enum CcsError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// Malformed ZMW whitelist specification
    #[error("Invalid ZMW whitelist specification: '{spec}'")]
    InvalidWhitelist {
        /// The offending specification string
        spec: String,
    },

    /// Output file already exists and --force was not given
    #[error("Output file already exists: '{path}' (use --force to overwrite)")]
    OutputExists {
        /// Path to the existing output file
        path: String,
    },
}
