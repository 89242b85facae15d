//! Genome partitions and template ownership.
//!
//! The genome is cut into fixed-size buckets per chromosome, each named
//! `"<chromosome>_<bucketIndex>"`. A read is delivered to the bucket holding its unclipped
//! 5′ end, so fragments that share a position signature are always assembled together.
//! Every template is classified in exactly one partition, the one holding its lower primary
//! read (see [`is_lower_read`]). Reads of the template that land elsewhere (the upper mate,
//! supplementary alignments) are routed to that owner partition by name.
//!
//! A read without `MC` cannot see its mate's clipping and routes to the bucket of the
//! mate's alignment start instead, which the owner reports as its [start
//! partition](Partitioner::start_partition).

use crate::errors::{DedupError, Result};
use crate::position::{ReadEnd, is_lower_alignment, is_lower_read};
use crate::read::Read;

/// Default partition width in bases.
pub const DEFAULT_PARTITION_SIZE: u32 = 1_000_000;

/// Assigns genomic positions to named partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    bucket_size: u32,
}

impl Default for Partitioner {
    fn default() -> Self {
        Self { bucket_size: DEFAULT_PARTITION_SIZE }
    }
}

impl Partitioner {
    /// Creates a partitioner with buckets of `bucket_size` bases.
    ///
    /// # Errors
    ///
    /// Returns an error if `bucket_size` is zero.
    pub fn new(bucket_size: u32) -> Result<Self> {
        if bucket_size == 0 {
            return Err(DedupError::InvalidParameter {
                parameter: "partition-size".to_string(),
                reason: "must be >= 1".to_string(),
            });
        }
        Ok(Self { bucket_size })
    }

    #[must_use]
    pub fn bucket_size(&self) -> u32 {
        self.bucket_size
    }

    /// Name of the partition containing a 1-based position.
    #[must_use]
    pub fn partition_name(&self, chromosome: &str, position: usize) -> String {
        format!("{chromosome}_{}", position / self.bucket_size as usize)
    }

    /// Name of the partition containing a read end.
    #[must_use]
    pub fn end_partition(&self, end: &ReadEnd) -> String {
        self.partition_name(&end.chromosome, end.position)
    }

    /// Partition a read is delivered to: the one holding its unclipped 5′ end, or its
    /// alignment start when it is unmapped.
    #[must_use]
    pub fn partition_of(&self, read: &Read) -> String {
        match ReadEnd::of_read(read) {
            Some(end) => self.end_partition(&end),
            None => self.start_partition(read),
        }
    }

    /// Partition holding a read's alignment start.
    #[must_use]
    pub fn start_partition(&self, read: &Read) -> String {
        self.partition_name(read.chromosome(), read.position() as usize)
    }

    /// Partition the read's mate is delivered to, as far as this read can tell.
    ///
    /// Exact when the read carries `MC`; otherwise the partition of the mate's alignment
    /// start. `None` when the mate is unmapped.
    #[must_use]
    pub fn mate_partition(&self, read: &Read) -> Option<String> {
        let mate_chromosome = read.mate_chromosome().filter(|_| read.has_mapped_mate())?;
        Some(match ReadEnd::of_mate(read) {
            Some(end) => self.end_partition(&end),
            None => self.partition_name(mate_chromosome, read.mate_position() as usize),
        })
    }

    /// Partition classifying the read's template.
    ///
    /// For a primary read this is its own partition when it is the lower read and its mate's
    /// otherwise. For a supplementary read the primary alignment is taken from the `SA` tag;
    /// without one the supplementary is treated as its own owner.
    #[must_use]
    pub fn owner_partition(&self, read: &Read) -> String {
        if read.is_supplementary() {
            let Some(sa) = read.supplementary_alignment() else {
                return self.partition_of(read);
            };
            let primary = ReadEnd::of_alignment(sa);
            if is_lower_alignment(&primary, sa.position, read) {
                return self.end_partition(&primary);
            }
        } else if is_lower_read(read) {
            return self.partition_of(read);
        }

        self.mate_partition(read).unwrap_or_else(|| self.partition_of(read))
    }

    /// Partitions other than `local` that hold reads of this read's template, as far as this
    /// read can tell: its mate's and those of every `SA` alignment.
    #[must_use]
    pub fn remote_partitions(&self, read: &Read, local: &str) -> Vec<String> {
        let mut remote = Vec::with_capacity(1 + read.supplementary_alignments().len());
        remote.extend(self.mate_partition(read));
        for sa in read.supplementary_alignments() {
            remote.push(self.end_partition(&ReadEnd::of_alignment(sa)));
        }
        remote.retain(|p| p != local);
        remote
    }
}
