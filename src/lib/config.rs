//! Configuration for duplicate classification.
//!
//! Configuration is an immutable value passed explicitly into the classifier, the partition
//! assembler and the combiner. Nothing reads configuration from global state.

use fgdedup_umi::UmiClusterConfig;
use fgdedup_umi::cluster::DEFAULT_LARGE_GROUP_SIZE;

use crate::errors::{DedupError, Result};

/// How base qualities are aggregated into a fragment's tie-break score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityScoring {
    /// Sum of all base qualities of the primary reads
    #[default]
    Sum,
    /// Sum of base qualities, each capped at the given value (Picard uses 15)
    CappedSum(u8),
    /// Mean base quality over the primary reads
    Mean,
}

/// UMI-aware deduplication settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UmiConfig {
    /// Maximum number of mismatching bases for two UMIs to be grouped
    pub permitted_diff: usize,
    /// Group size at which two UMI groups are no longer merged on a borderline match
    pub large_group_size: usize,
}

impl Default for UmiConfig {
    fn default() -> Self {
        Self { permitted_diff: 1, large_group_size: DEFAULT_LARGE_GROUP_SIZE }
    }
}

impl UmiConfig {
    /// The clustering parameters for the UMI crate.
    #[must_use]
    pub fn cluster_config(&self) -> UmiClusterConfig {
        UmiClusterConfig {
            permitted_diff: self.permitted_diff,
            large_group_size: self.large_group_size,
        }
    }
}

/// Settings shared by every stage of duplicate classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupConfig {
    /// UMI settings; `None` disables UMI-aware deduplication
    pub umi: Option<UmiConfig>,
    /// Base quality aggregation used to pick primaries
    pub scoring: QualityScoring,
    /// Break quality ties on the fragment identifier instead of first-seen order
    pub use_secondary_tie_break: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { umi: None, scoring: QualityScoring::Sum, use_secondary_tie_break: true }
    }
}

impl DedupConfig {
    /// Returns a copy of this configuration with UMI-aware deduplication enabled.
    #[must_use]
    pub fn with_umi(mut self, umi: UmiConfig) -> Self {
        self.umi = Some(umi);
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the UMI large-group size is zero.
    pub fn validate(&self) -> Result<()> {
        if let Some(umi) = &self.umi {
            if umi.large_group_size == 0 {
                return Err(DedupError::InvalidParameter {
                    parameter: "umi-large-group-size".to_string(),
                    reason: "must be >= 1".to_string(),
                });
            }
        }
        Ok(())
    }
}
