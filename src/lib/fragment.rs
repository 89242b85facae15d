//! Fragments: all reads of one sequencing template.
//!
//! A [`Fragment`] owns the reads of a template seen so far, together with the mutable
//! classification state the duplicate marker drives to a final value. Fragments are created
//! from the first read of a template, merged into when a mate or supplementary for the same
//! template arrives, and handed to a [`RecordWriter`](crate::writer::RecordWriter) exactly
//! once.

use std::collections::BTreeSet;
use std::fmt;

use crate::read::Read;

/// Classification state of a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum FragmentStatus {
    /// Not yet classified
    #[default]
    Unset,
    /// Unique: no other fragment shares its position signature
    None,
    /// The representative of a set of duplicates
    Primary,
    /// A duplicate of another fragment's primary
    Duplicate,
    /// Pending: shares a position with other fragments but mate information is missing
    Unclear,
}

impl FragmentStatus {
    /// Returns true for final statuses (`None`, `Primary`, `Duplicate`).
    #[inline]
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, FragmentStatus::None | FragmentStatus::Primary | FragmentStatus::Duplicate)
    }

    #[inline]
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, FragmentStatus::Duplicate)
    }

    /// Upper-case name used in output files.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentStatus::Unset => "UNSET",
            FragmentStatus::None => "NONE",
            FragmentStatus::Primary => "PRIMARY",
            FragmentStatus::Duplicate => "DUPLICATE",
            FragmentStatus::Unclear => "UNCLEAR",
        }
    }
}

impl fmt::Display for FragmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads of a template seen so far, against the number its primary reads announce.
///
/// A paired template expects two primary reads and an unpaired one a single read. Each
/// primary's `SA` tag names its supplementary alignments. Once every announced read has been
/// counted no further read of the template can arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadTally {
    pub primaries: usize,
    pub expected_primaries: usize,
    pub supplementaries: usize,
    pub expected_supplementaries: usize,
}

impl ReadTally {
    /// Tallies the reads of a fragment.
    #[must_use]
    pub fn of(fragment: &Fragment) -> Self {
        let mut tally = Self::default();
        for read in fragment.reads() {
            tally.expected_primaries =
                tally.expected_primaries.max(if read.is_paired() { 2 } else { 1 });
            if read.is_supplementary() {
                tally.supplementaries += 1;
            } else {
                tally.primaries += 1;
                tally.expected_supplementaries += read.supplementary_alignments().len();
            }
        }
        tally
    }

    /// Adds the reads of another fragment of the same template.
    pub fn add(&mut self, other: ReadTally) {
        self.primaries += other.primaries;
        self.expected_primaries = self.expected_primaries.max(other.expected_primaries);
        self.supplementaries += other.supplementaries;
        self.expected_supplementaries += other.expected_supplementaries;
    }

    /// True once every primary read and every supplementary alignment they name is counted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.expected_primaries > 0
            && self.primaries >= self.expected_primaries
            && self.supplementaries >= self.expected_supplementaries
    }
}

/// All reads of one template seen so far, plus classification state.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Template name, taken from the first read
    id: String,
    /// Owned reads: primary pair members and any supplementaries
    reads: Vec<Read>,
    status: FragmentStatus,
    /// Number of duplicates collapsed into this fragment while it is the primary
    duplicate_count: usize,
    reads_written: bool,
    /// Partitions holding other reads of this template
    remote_partitions: BTreeSet<String>,
    /// Partition classifying this template, when it is not the one delivering this fragment
    primary_partition: Option<String>,
    /// Partition of the owner read's alignment start, when it differs from the one holding
    /// its unclipped end
    start_partition: Option<String>,
    /// Representative UMI of the UMI group the fragment was classified in
    umi_group: Option<String>,
}

impl Fragment {
    /// Creates a fragment from the first read of a template.
    #[must_use]
    pub fn new(read: Read) -> Self {
        Self {
            id: read.name().to_string(),
            reads: vec![read],
            status: FragmentStatus::Unset,
            duplicate_count: 0,
            reads_written: false,
            remote_partitions: BTreeSet::new(),
            primary_partition: None,
            start_partition: None,
            umi_group: None,
        }
    }

    /// Creates a fragment from a non-empty list of reads of one template.
    ///
    /// Returns `None` for an empty list.
    #[must_use]
    pub fn from_reads(reads: Vec<Read>) -> Option<Self> {
        let mut iter = reads.into_iter();
        let mut fragment = Fragment::new(iter.next()?);
        fragment.reads.extend(iter);
        Some(fragment)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn reads(&self) -> &[Read] {
        &self.reads
    }

    /// Consumes the fragment, returning its reads.
    #[must_use]
    pub fn into_reads(self) -> Vec<Read> {
        self.reads
    }

    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.len()
    }

    #[must_use]
    pub fn status(&self) -> FragmentStatus {
        self.status
    }

    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.duplicate_count
    }

    #[must_use]
    pub fn reads_written(&self) -> bool {
        self.reads_written
    }

    #[must_use]
    pub fn remote_partitions(&self) -> &BTreeSet<String> {
        &self.remote_partitions
    }

    #[must_use]
    pub fn primary_partition(&self) -> Option<&str> {
        self.primary_partition.as_deref()
    }

    #[must_use]
    pub fn start_partition(&self) -> Option<&str> {
        self.start_partition.as_deref()
    }

    #[must_use]
    pub fn umi_group(&self) -> Option<&str> {
        self.umi_group.as_deref()
    }

    /// Primary (non-supplementary) reads, in arrival order.
    pub fn primary_reads(&self) -> impl Iterator<Item = &Read> {
        self.reads.iter().filter(|r| !r.is_supplementary())
    }

    /// Supplementary reads, in arrival order.
    pub fn supplementary_reads(&self) -> impl Iterator<Item = &Read> {
        self.reads.iter().filter(|r| r.is_supplementary())
    }

    /// True if the fragment holds no primary read.
    #[must_use]
    pub fn is_supplementary_only(&self) -> bool {
        self.primary_reads().next().is_none()
    }

    /// True if both primary reads of a mapped pair are present.
    #[must_use]
    pub fn has_both_mates(&self) -> bool {
        self.primary_reads().count() >= 2
    }

    /// True if the fragment holds a single primary read whose mate is mapped, i.e. the other
    /// primary read of the pair lives elsewhere.
    #[must_use]
    pub fn is_awaiting_mate(&self) -> bool {
        let mut primaries = self.primary_reads();
        match (primaries.next(), primaries.next()) {
            (Some(read), None) => read.has_mapped_mate(),
            _ => false,
        }
    }

    /// Sets the status.
    ///
    /// A settled status is never reverted to `Unset` or `Unclear`; such a request is ignored
    /// and `false` is returned.
    pub fn set_status(&mut self, status: FragmentStatus) -> bool {
        if self.status.is_settled() && !status.is_settled() {
            return false;
        }
        self.status = status;
        true
    }

    pub fn set_duplicate_count(&mut self, count: usize) {
        self.duplicate_count = count;
    }

    pub fn increment_duplicate_count(&mut self) {
        self.duplicate_count += 1;
    }

    /// Records that the fragment's reads have been handed to the writer.
    pub fn mark_written(&mut self) {
        debug_assert!(!self.reads_written, "fragment '{}' written twice", self.id);
        self.reads_written = true;
    }

    pub fn add_remote_partition(&mut self, partition: impl Into<String>) {
        self.remote_partitions.insert(partition.into());
    }

    /// Sets the partition that classifies this template.
    pub fn set_primary_partition(&mut self, partition: Option<String>) {
        self.primary_partition = partition;
    }

    /// Sets the partition that reads lacking the owner's clipping route this template to.
    pub fn set_start_partition(&mut self, partition: Option<String>) {
        self.start_partition = partition;
    }

    pub fn set_umi_group(&mut self, umi: Option<String>) {
        self.umi_group = umi;
    }

    /// Adds a read of the same template.
    pub fn add_read(&mut self, read: Read) {
        debug_assert_eq!(read.name(), self.id);
        self.reads.push(read);
    }

    /// Merges another partial fragment of the same template into this one.
    ///
    /// Reads are appended and remote partitions unioned; classification state is unchanged.
    pub fn merge(&mut self, other: Fragment) {
        debug_assert_eq!(other.id, self.id);
        self.reads.extend(other.reads);
        self.remote_partitions.extend(other.remote_partitions);
    }
}
