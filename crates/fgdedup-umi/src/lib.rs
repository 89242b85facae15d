#![deny(unsafe_code)]

//! UMI (Unique Molecular Identifier) utilities
//!
//! This crate provides the UMI handling used by duplicate marking:
//! - extraction of the UMI token from a read identifier
//! - validation of UMI sequences
//! - the single-edit distance predicate used to decide whether two UMIs can be reconciled
//! - clustering of UMIs into consensus groups (see [`cluster`])

pub mod cluster;

pub use cluster::{UmiClusterConfig, UmiGroup, build_umi_groups};

/// Delimiter separating the fields of a read identifier.
///
/// Identifiers have the form `<instrument>:<run>:<lane>:<tile>:<UMI>`; the UMI is the token
/// after the final delimiter.
pub const READ_ID_DELIMITER: char = ':';

/// Default number of mismatching bases two UMIs may have and still be grouped together.
pub const DEFAULT_PERMITTED_UMI_DIFF: usize = 1;

/// Extracts the UMI token from a read identifier.
///
/// Returns the substring following the final `:` of the identifier. An identifier with
/// no delimiter is returned whole, and an identifier ending in the delimiter yields an
/// empty token (which [`validate_umi`] reports as malformed).
///
/// # Examples
///
/// ```
/// use fgdedup_umi::extract_umi_id;
///
/// assert_eq!(extract_umi_id("A00624:8:HHKYHDSXX:2:1101:TATCGC"), "TATCGC");
/// assert_eq!(extract_umi_id("READ_001"), "READ_001");
/// assert_eq!(extract_umi_id("A00624:8:"), "");
/// ```
#[must_use]
pub fn extract_umi_id(read_id: &str) -> &str {
    match read_id.rfind(READ_ID_DELIMITER) {
        Some(idx) => &read_id[idx + 1..],
        None => read_id,
    }
}

/// Result of validating a UMI string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UmiValidation {
    /// UMI is valid with the given number of bases
    Valid(usize),
    /// UMI is empty
    Empty,
    /// UMI contains a character that is not a nucleotide (ACGTN, case-insensitive)
    InvalidBase(u8),
}

impl UmiValidation {
    /// Returns true if the UMI can take part in clustering.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, UmiValidation::Valid(_))
    }
}

/// Validates a UMI string.
///
/// Accepts `A`, `C`, `G`, `T` and `N` in either case. Anything else, or an empty token,
/// cannot be clustered and leaves the fragment in its own UMI group.
///
/// # Examples
///
/// ```
/// use fgdedup_umi::{validate_umi, UmiValidation};
///
/// assert_eq!(validate_umi("ACGT"), UmiValidation::Valid(4));
/// assert_eq!(validate_umi("acgn"), UmiValidation::Valid(4));
/// assert_eq!(validate_umi(""), UmiValidation::Empty);
/// assert_eq!(validate_umi("AC-T"), UmiValidation::InvalidBase(b'-'));
/// ```
#[must_use]
pub fn validate_umi(umi: &str) -> UmiValidation {
    if umi.is_empty() {
        return UmiValidation::Empty;
    }
    for &b in umi.as_bytes() {
        match b.to_ascii_uppercase() {
            b'A' | b'C' | b'G' | b'T' | b'N' => {}
            _ => return UmiValidation::InvalidBase(b),
        }
    }
    UmiValidation::Valid(umi.len())
}

/// Count mismatches between two sequences.
///
/// Returns `None` if the sequences have different lengths, since no number of substitutions
/// can reconcile them.
///
/// # Examples
///
/// ```
/// use fgdedup_umi::count_mismatches;
///
/// assert_eq!(count_mismatches("ACGT", "ACGT"), Some(0));
/// assert_eq!(count_mismatches("ACGT", "ACTT"), Some(1));
/// assert_eq!(count_mismatches("ACG", "ACGT"), None);
/// ```
#[must_use]
pub fn count_mismatches(a: &str, b: &str) -> Option<usize> {
    if a.len() != b.len() {
        return None;
    }
    Some(
        a.bytes()
            .zip(b.bytes())
            .filter(|(x, y)| !x.eq_ignore_ascii_case(y))
            .count(),
    )
}

/// Returns true when two UMIs differ by more than `permitted_diff` bases.
///
/// A difference in length always exceeds the threshold. Exits as soon as the mismatch
/// count passes `permitted_diff`.
///
/// # Examples
///
/// ```
/// use fgdedup_umi::exceeds_umi_id_diff;
///
/// assert!(!exceeds_umi_id_diff("TATCGC", "TATCGG", 1));
/// assert!(exceeds_umi_id_diff("TATCGC", "TATGGG", 1));
/// assert!(exceeds_umi_id_diff("TATCGC", "TATCG", 1));
/// ```
#[must_use]
pub fn exceeds_umi_id_diff(a: &str, b: &str, permitted_diff: usize) -> bool {
    if a.len() != b.len() {
        return true;
    }

    let mut diffs = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        if !x.eq_ignore_ascii_case(&y) {
            diffs += 1;
            if diffs > permitted_diff {
                return true;
            }
        }
    }

    false
}
