//! Partitioned duplicate marking command.
//!
//! This command marks PCR duplicates in a table of aligned records. Records are bucketed into
//! fixed-width genomic partitions which are processed independently and in parallel; a
//! shared [`GroupCombiner`] reconciles templates whose reads span partitions.
//!
//! # Algorithm
//!
//! 1. Bucket records into partitions by chromosome and unclipped 5′ position
//! 2. Within each partition, assemble the reads of each template into fragments
//! 3. Classify fragments whose owner partition holds enough information; defer the rest
//! 4. Deliver every partition's resolved, candidate and supplementary fragments to the
//!    combiner, which finalizes each template exactly once
//! 5. Mark anything still pending at the end of the run as unique
//!
//! # Input
//!
//! A tab-separated table with a header line and one aligned record per row:
//!
//! | column | meaning |
//! |---|---|
//! | `name` | read name (UMIs are read from the last `:`-delimited field) |
//! | `flag` | SAM flags |
//! | `chrom`, `pos` | reference name and 1-based alignment start |
//! | `cigar` | CIGAR, or `*` |
//! | `mate_chrom`, `mate_pos` | mate location, or `*` and `0` |
//! | `mate_cigar` | `MC` tag value, or `*` |
//! | `sa` | `SA` tag value, or `*` |
//! | `quals` | Phred+33 base qualities, or `*` |

use std::path::PathBuf;

use ahash::AHashMap;
use anyhow::{Context, Result, bail};
use clap::Parser;
use fgoxide::io::DelimFile;
use fgdedup_lib::assembly::process_partition;
use fgdedup_lib::combiner::GroupCombiner;
use fgdedup_lib::fragment::Fragment;
use fgdedup_lib::logging::{OperationTimer, format_count, log_dedup_summary};
use fgdedup_lib::metrics::{DedupMetrics, DedupMetricsOutput};
use fgdedup_lib::read::{Read, ReadBuilder, SupplementaryAlignment};
use fgdedup_lib::validation::validate_quality_score;
use fgdedup_lib::writer::{FragmentCollector, OutputTags};
use log::{debug, info};
use noodles::sam::alignment::record::Flags;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::commands::command::Command;
use crate::commands::common::{
    ClassificationOptions, PartitionOptions, ReadTableIoOptions, ThreadingOptions,
};

/// Placeholder for an absent string field.
const MISSING: &str = "*";

/// Offset of Phred+33 encoded qualities.
const PHRED_OFFSET: u8 = 33;

//////////////////////////////////////////////////////////////////////////////
// Records
//////////////////////////////////////////////////////////////////////////////

/// One row of the input read table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRecord {
    pub name: String,
    pub flag: u16,
    pub chrom: String,
    pub pos: u32,
    pub cigar: String,
    pub mate_chrom: String,
    pub mate_pos: u32,
    pub mate_cigar: String,
    pub sa: String,
    pub quals: String,
}

impl ReadRecord {
    /// Converts the row into a [`Read`].
    ///
    /// Mate placement is only taken from the row when the mate is flagged as mapped.
    ///
    /// # Errors
    ///
    /// Returns an error if the CIGAR or mate CIGAR cannot be parsed, or if the qualities are
    /// not valid Phred+33.
    pub fn to_read(&self) -> Result<Read> {
        let flags = Flags::from(self.flag);
        let qualities = decode_qualities(&self.quals)
            .with_context(|| format!("Invalid base qualities for read {}", self.name))?;
        let mut builder = ReadBuilder::new()
            .name(&self.name)
            .flags(self.flag)
            .chromosome(&self.chrom)
            .position(self.pos)
            .cigar(&self.cigar)
            .qualities(&qualities);

        if flags.is_segmented() && !flags.is_mate_unmapped() && self.mate_chrom != MISSING {
            let mate_chrom = if self.mate_chrom == "=" { &self.chrom } else { &self.mate_chrom };
            builder =
                builder.mate(mate_chrom, self.mate_pos, flags.is_mate_reverse_complemented());
        }
        if self.mate_cigar != MISSING {
            builder = builder.mate_cigar(&self.mate_cigar);
        }
        if self.sa != MISSING {
            match SupplementaryAlignment::parse_all(&self.sa) {
                Some(alignments) => {
                    for sa in alignments {
                        builder = builder.supplementary_alignment(sa);
                    }
                }
                None => debug!("Ignoring malformed SA tag '{}' on read {}", self.sa, self.name),
            }
        }

        builder.build().with_context(|| format!("Failed to parse record for read {}", self.name))
    }
}

/// One row of the output decision table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub name: String,
    pub flag: u16,
    pub chrom: String,
    pub pos: u32,
    pub status: String,
    pub duplicate: bool,
    pub duplicate_count: Option<usize>,
    pub umi_group: Option<String>,
}

impl DecisionRecord {
    /// One row per read of a finalized fragment.
    fn for_fragment(fragment: &Fragment) -> Vec<Self> {
        let tags = OutputTags::for_fragment(fragment);
        let status = fragment.status().as_str();
        fragment
            .reads()
            .iter()
            .map(|read| {
                let mut flags = read.flags();
                flags.set(Flags::DUPLICATE, tags.duplicate);
                Self {
                    name: read.name().to_string(),
                    flag: u16::from(flags),
                    chrom: read.chromosome().to_string(),
                    pos: read.position(),
                    status: status.to_string(),
                    duplicate: tags.duplicate,
                    duplicate_count: tags.duplicate_count,
                    umi_group: tags.umi_group.clone(),
                }
            })
            .collect()
    }
}

fn decode_qualities(quals: &str) -> Result<Vec<u8>> {
    if quals == MISSING {
        return Ok(Vec::new());
    }
    quals
        .bytes()
        .map(|b| -> Result<u8> {
            let Some(q) = b.checked_sub(PHRED_OFFSET) else {
                bail!("quality character {:?} is below '!'", char::from(b));
            };
            validate_quality_score(q, "quals")?;
            Ok(q)
        })
        .collect()
}

//////////////////////////////////////////////////////////////////////////////
// Command
//////////////////////////////////////////////////////////////////////////////

/// Marks duplicates in a read table, processing genomic partitions independently.
#[derive(Parser, Debug)]
#[command(
    about = "Mark duplicates across independently processed genomic partitions",
    long_about = r#"
Marks PCR duplicates in a table of aligned records.

Records are bucketed into fixed-width genomic partitions which are processed in parallel.
Templates whose reads span partitions are reconciled so that every template receives
exactly one classification (PRIMARY, DUPLICATE or NONE) regardless of processing order.

With --umi, duplicate sets are further split by the UMI taken from the last ':'-delimited
field of the read name.
"#
)]
pub struct MarkDuplicates {
    /// Input read table and output decision table
    #[command(flatten)]
    pub io: ReadTableIoOptions,

    /// Path to write deduplication metrics
    #[arg(short = 'm', long = "metrics")]
    pub metrics: Option<PathBuf>,

    /// Partitioning options
    #[command(flatten)]
    pub partitioning: PartitionOptions,

    /// Classification options
    #[command(flatten)]
    pub classification: ClassificationOptions,

    /// Threading options for parallel processing
    #[command(flatten)]
    pub threading: ThreadingOptions,
}

impl Command for MarkDuplicates {
    fn execute(&self, command_line: &str) -> Result<()> {
        self.io.validate()?;
        self.threading.validate()?;
        let config = self.classification.config()?;
        let partitioner = self.partitioning.partitioner()?;

        let timer = OperationTimer::new("Marking duplicates");

        debug!("Command line: {command_line}");
        info!("Input: {}", self.io.input.display());
        info!("Output: {}", self.io.output.display());
        info!("Partition size: {}", format_count(u64::from(partitioner.bucket_size())));
        info!("Scoring: {:?}", config.scoring);
        info!("UMI-aware: {}", config.umi.is_some());
        info!("{}", self.threading.log_message());

        let records: Vec<ReadRecord> = DelimFile::default()
            .read_tsv(&self.io.input)
            .with_context(|| format!("Failed to read {}", self.io.input.display()))?;
        info!("Read {} records", format_count(records.len() as u64));

        let mut partitions: AHashMap<String, Vec<Read>> = AHashMap::new();
        for record in &records {
            let read = record.to_read()?;
            partitions.entry(partitioner.partition_of(&read)).or_default().push(read);
        }
        let mut partitions: Vec<(String, Vec<Read>)> = partitions.into_iter().collect();
        partitions.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        info!("Bucketed records into {} partitions", format_count(partitions.len() as u64));

        let combiner = GroupCombiner::new(FragmentCollector::new(), config);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threading.num_threads())
            .build()
            .context("Failed to build thread pool")?;

        pool.install(|| {
            partitions.into_par_iter().try_for_each(|(partition, reads)| {
                let output = process_partition(&partition, reads, &partitioner, &config);
                combiner
                    .process_partition_output(&partition, output)
                    .with_context(|| format!("Failed to combine partition {partition}"))
            })
        })?;

        let unresolved = combiner.finish();
        let fragments = combiner.into_writer().into_fragments();

        let mut metrics = DedupMetrics::from_fragments(&fragments);
        metrics.add_unresolved(&unresolved);

        let mut decisions: Vec<DecisionRecord> =
            fragments.iter().flat_map(DecisionRecord::for_fragment).collect();
        decisions.sort_by(|a, b| {
            (&a.name, a.flag, &a.chrom, a.pos).cmp(&(&b.name, b.flag, &b.chrom, b.pos))
        });

        DelimFile::default()
            .write_tsv(&self.io.output, decisions)
            .with_context(|| format!("Failed to write {}", self.io.output.display()))?;

        if let Some(metrics_path) = &self.metrics {
            DelimFile::default()
                .write_tsv(metrics_path, [DedupMetricsOutput::from(&metrics)])
                .with_context(|| format!("Failed to write metrics to {}", metrics_path.display()))?;
            info!("Wrote metrics to {}", metrics_path.display());
        }

        log_dedup_summary(&metrics);
        timer.log_completion(metrics.total_reads);
        Ok(())
    }
}
