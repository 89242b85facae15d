//! Custom error types for fgdedup operations.

use thiserror::Error;

/// Result type alias for fgdedup operations
pub type Result<T> = std::result::Result<T, DedupError>;

/// Error type for fgdedup operations
///
/// Expected data conditions (no duplicate found, a mate that never arrives, a malformed UMI)
/// are not errors; they are represented with `Option`, end-of-run fallbacks and singleton
/// UMI groups respectively. These variants cover contract violations and bad input.
#[derive(Error, Debug)]
pub enum DedupError {
    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// A partition name was empty
    #[error("Invalid partition name '{name}': partition names must be non-empty")]
    InvalidPartition {
        /// The offending partition name
        name: String,
    },

    /// A CIGAR string could not be parsed
    #[error("Invalid CIGAR '{cigar}' for read '{read}': {reason}")]
    InvalidCigar {
        /// The read name
        read: String,
        /// The CIGAR string
        cigar: String,
        /// Explanation of the problem
        reason: String,
    },

    /// File format error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "reads TSV")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },
}
