//! Input validation utilities
//!
//! Validation functions for command-line parameters and file paths with consistent error
//! messages, built on the structured error types in [`crate::errors`].

use std::fmt::Display;
use std::path::Path;

use crate::errors::{DedupError, Result};

/// Validate that a file exists
///
/// # Errors
/// Returns an error if the file does not exist
///
/// # Example
/// ```
/// use fgdedup_lib::validation::validate_file_exists;
///
/// let result = validate_file_exists("/nonexistent/reads.tsv", "Input reads");
/// assert!(result.is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Err(DedupError::InvalidFileFormat {
            file_type: description.to_string(),
            path: path_ref.display().to_string(),
            reason: "File does not exist".to_string(),
        });
    }
    Ok(())
}

/// Validate that a quality score is in the valid Phred range [0, 93]
///
/// # Errors
/// Returns an error if the quality is not in [0, 93]
///
/// # Example
/// ```
/// use fgdedup_lib::validation::validate_quality_score;
///
/// validate_quality_score(15, "quality-cap").unwrap();
/// assert!(validate_quality_score(100, "quality-cap").is_err());
/// ```
pub fn validate_quality_score(quality: u8, name: &str) -> Result<()> {
    if quality > 93 {
        return Err(DedupError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("{quality} is outside the Phred range [0, 93]"),
        });
    }
    Ok(())
}

/// Validate that a value is positive (> 0)
///
/// # Errors
/// Returns an error if the value is not positive
///
/// # Example
/// ```
/// use fgdedup_lib::validation::validate_positive;
///
/// validate_positive(4, "threads").unwrap();
/// assert!(validate_positive(0, "threads").is_err());
/// ```
pub fn validate_positive<T: PartialOrd + Default + Display>(value: T, name: &str) -> Result<()> {
    if value <= T::default() {
        return Err(DedupError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be > 0, got: {value}"),
        });
    }
    Ok(())
}
