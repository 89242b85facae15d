//! Common CLI options shared across commands.
//!
//! This module provides shared argument structures that can be composed into
//! command structs using `#[command(flatten)]`.

use std::path::PathBuf;

use clap::{Args, ValueEnum};

use fgdedup_lib::config::{DedupConfig, QualityScoring, UmiConfig};
use fgdedup_lib::partition::{DEFAULT_PARTITION_SIZE, Partitioner};
use fgdedup_lib::validation::{validate_file_exists, validate_positive, validate_quality_score};
use fgdedup_umi::DEFAULT_PERMITTED_UMI_DIFF;
use fgdedup_umi::cluster::DEFAULT_LARGE_GROUP_SIZE;

/// Input/output options for commands that read a read table and write a decision table.
#[derive(Debug, Clone, Args)]
pub struct ReadTableIoOptions {
    /// Input read table (TSV, one aligned record per row)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output decision table (TSV, one row per input record)
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
}

impl ReadTableIoOptions {
    /// Validates that the input file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the input file does not exist.
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_file_exists(&self.input, "Input read table")?;
        Ok(())
    }
}

/// Threading options for processing partitions in parallel.
///
/// # Example
///
/// ```bash
/// fgdedup dedup --threads 8 ...
/// # Processes up to 8 partitions at once
/// ```
#[derive(Debug, Clone, Args)]
pub struct ThreadingOptions {
    /// Number of worker threads. Defaults to a single thread.
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,
}

impl ThreadingOptions {
    /// Creates threading options with N threads.
    #[must_use]
    pub fn new(threads: usize) -> Self {
        Self { threads: Some(threads) }
    }

    /// Creates threading options with no threads specified.
    #[must_use]
    pub fn none() -> Self {
        Self { threads: None }
    }

    /// Returns the number of threads.
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.threads.unwrap_or(1)
    }

    /// Returns true if more than one thread will be used.
    #[must_use]
    pub fn is_parallel(&self) -> bool {
        self.num_threads() > 1
    }

    /// Returns a log message describing the threading configuration.
    #[must_use]
    pub fn log_message(&self) -> String {
        if self.is_parallel() {
            format!("Using {} threads", self.num_threads())
        } else {
            "Single-threaded mode".to_string()
        }
    }

    /// Validates the thread count.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit thread count of zero was given.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(threads) = self.threads {
            validate_positive(threads, "threads")?;
        }
        Ok(())
    }
}

/// Options controlling how reads are bucketed into partitions.
#[derive(Debug, Clone, Args)]
pub struct PartitionOptions {
    /// Width of each genomic partition in bases
    #[arg(long = "partition-size", default_value_t = DEFAULT_PARTITION_SIZE)]
    pub partition_size: u32,
}

impl PartitionOptions {
    /// Builds the partitioner.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition size is zero.
    pub fn partitioner(&self) -> anyhow::Result<Partitioner> {
        Ok(Partitioner::new(self.partition_size)?)
    }
}

/// How base qualities are aggregated when choosing the primary of a duplicate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ScoringMethod {
    /// Sum of base qualities
    #[default]
    Sum,
    /// Sum of base qualities, each capped at --quality-cap
    CappedSum,
    /// Mean base quality
    Mean,
}

/// Options for duplicate classification.
#[derive(Debug, Clone, Args)]
pub struct ClassificationOptions {
    /// Base quality aggregation used to pick the primary of each duplicate set
    #[arg(long = "scoring", value_enum, default_value_t = ScoringMethod::default())]
    pub scoring: ScoringMethod,

    /// Per-base cap used with `--scoring capped-sum`
    #[arg(long = "quality-cap", default_value_t = 15)]
    pub quality_cap: u8,

    /// Break quality ties by keeping the first fragment seen rather than the smallest name
    #[arg(long = "first-seen-tie-break", default_value_t = false)]
    pub first_seen_tie_break: bool,

    /// Split duplicate sets by the UMI in the read name
    #[arg(short = 'u', long = "umi", default_value_t = false)]
    pub umi: bool,

    /// Maximum mismatching bases for two UMIs to be grouped
    #[arg(long = "umi-permitted-diff", default_value_t = DEFAULT_PERMITTED_UMI_DIFF)]
    pub umi_permitted_diff: usize,

    /// Group size at which borderline UMI matches are no longer merged
    #[arg(long = "umi-large-group-size", default_value_t = DEFAULT_LARGE_GROUP_SIZE)]
    pub umi_large_group_size: usize,
}

impl ClassificationOptions {
    /// Builds the immutable classification configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the quality cap or UMI settings are invalid.
    pub fn config(&self) -> anyhow::Result<DedupConfig> {
        validate_quality_score(self.quality_cap, "quality-cap")?;
        let scoring = match self.scoring {
            ScoringMethod::Sum => QualityScoring::Sum,
            ScoringMethod::CappedSum => QualityScoring::CappedSum(self.quality_cap),
            ScoringMethod::Mean => QualityScoring::Mean,
        };

        let mut config = DedupConfig {
            scoring,
            use_secondary_tie_break: !self.first_seen_tie_break,
            ..DedupConfig::default()
        };
        if self.umi {
            config = config.with_umi(UmiConfig {
                permitted_diff: self.umi_permitted_diff,
                large_group_size: self.umi_large_group_size,
            });
        }
        config.validate()?;
        Ok(config)
    }
}
