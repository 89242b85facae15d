//! Aligned read records and CIGAR utilities.
//!
//! A [`Read`] is the immutable leaf value of the duplicate marker: one alignment record with
//! just the fields needed to key and score it. Flags reuse the noodles SAM [`Flags`] type and
//! CIGARs are held as `(Kind, len)` operation lists, so the clipping helpers here match the
//! ones used for `RecordBuf`s elsewhere in the toolkit.
//!
//! Reads are constructed with [`ReadBuilder`]:
//!
//! ```
//! use fgdedup_lib::read::ReadBuilder;
//!
//! let read = ReadBuilder::new()
//!     .name("inst:1:1:1:ACGTAC")
//!     .chromosome("chr1")
//!     .position(100)
//!     .cigar("5S45M")
//!     .qualities(&[30; 50])
//!     .build()
//!     .unwrap();
//! assert_eq!(read.alignment_end(), 144);
//! ```

use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record::cigar::op::Kind;

use crate::errors::{DedupError, Result};

/// A parsed CIGAR: `(operation kind, length)` pairs.
pub type CigarOps = Vec<(Kind, usize)>;

/// Parses a CIGAR string into `(Kind, len)` operations.
///
/// `*` (and the empty string) denote an absent CIGAR and parse to no operations.
///
/// # Errors
///
/// Returns [`DedupError::InvalidCigar`] for unknown operations, operations without a length,
/// lengths that do not fit in 32 bits, or trailing digits.
pub fn parse_cigar(read: &str, cigar: &str) -> Result<CigarOps> {
    if cigar.is_empty() || cigar == "*" {
        return Ok(Vec::new());
    }

    let invalid = |reason: String| DedupError::InvalidCigar {
        read: read.to_string(),
        cigar: cigar.to_string(),
        reason,
    };

    let mut ops = Vec::new();
    let mut len: Option<u32> = None;

    for ch in cigar.chars() {
        if let Some(digit) = ch.to_digit(10) {
            let next = len.unwrap_or(0).checked_mul(10).and_then(|n| n.checked_add(digit));
            let Some(next) = next else {
                return Err(invalid("operation length is too large".to_string()));
            };
            len = Some(next);
            continue;
        }

        let kind = match ch {
            'M' => Kind::Match,
            'I' => Kind::Insertion,
            'D' => Kind::Deletion,
            'N' => Kind::Skip,
            'S' => Kind::SoftClip,
            'H' => Kind::HardClip,
            'P' => Kind::Pad,
            '=' => Kind::SequenceMatch,
            'X' => Kind::SequenceMismatch,
            _ => return Err(invalid(format!("unknown operation '{ch}'"))),
        };

        let Some(n) = len.take() else {
            return Err(invalid(format!("operation '{ch}' has no length")));
        };
        if n > 0 {
            ops.push((kind, n as usize));
        }
    }

    if len.is_some() {
        return Err(invalid("trailing length without an operation".to_string()));
    }

    Ok(ops)
}

/// Calculates the reference length consumed by CIGAR operations.
#[must_use]
pub fn reference_length(ops: &[(Kind, usize)]) -> usize {
    ops.iter()
        .filter_map(|(kind, len)| match kind {
            Kind::Match
            | Kind::Deletion
            | Kind::Skip
            | Kind::SequenceMatch
            | Kind::SequenceMismatch => Some(*len),
            _ => None,
        })
        .sum()
}

/// Calculates leading soft clipping only from CIGAR operations.
#[must_use]
pub fn leading_soft_clipping(ops: &[(Kind, usize)]) -> usize {
    ops.iter()
        .skip_while(|(kind, _)| *kind == Kind::HardClip)
        .take_while(|(kind, _)| *kind == Kind::SoftClip)
        .map(|(_, len)| *len)
        .sum()
}

/// Calculates trailing soft clipping only from CIGAR operations.
#[must_use]
pub fn trailing_soft_clipping(ops: &[(Kind, usize)]) -> usize {
    ops.iter()
        .rev()
        .skip_while(|(kind, _)| *kind == Kind::HardClip)
        .take_while(|(kind, _)| *kind == Kind::SoftClip)
        .map(|(_, len)| *len)
        .sum()
}

/// One entry of a read's `SA` tag.
///
/// On a primary record each entry is one of its supplementary alignments; on a
/// supplementary record the first entry is its primary alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplementaryAlignment {
    /// Reference sequence name
    pub chromosome: String,
    /// 1-based alignment start
    pub position: u32,
    /// True if aligned to the reverse strand
    pub reverse: bool,
    /// Parsed CIGAR of the alignment
    pub cigar: CigarOps,
}

impl SupplementaryAlignment {
    /// Parses the first entry of an `SA` tag value (`rname,pos,strand,CIGAR,mapQ,NM;...`).
    ///
    /// Returns `None` if the value has fewer than four fields or malformed values.
    #[must_use]
    pub fn parse(sa: &str) -> Option<Self> {
        Self::parse_entry(sa.split(';').next()?)
    }

    /// Parses every entry of an `SA` tag value.
    ///
    /// Returns `None` if the value is empty or any entry is malformed.
    #[must_use]
    pub fn parse_all(sa: &str) -> Option<Vec<Self>> {
        let entries: Option<Vec<Self>> =
            sa.split(';').filter(|e| !e.is_empty()).map(Self::parse_entry).collect();
        entries.filter(|e| !e.is_empty())
    }

    fn parse_entry(entry: &str) -> Option<Self> {
        let mut fields = entry.split(',');
        let chromosome = fields.next().filter(|s| !s.is_empty())?.to_string();
        let position: u32 = fields.next()?.parse().ok()?;
        let reverse = match fields.next()? {
            "+" => false,
            "-" => true,
            _ => return None,
        };
        let cigar = parse_cigar("SA", fields.next()?).ok()?;
        Some(Self { chromosome, position, reverse, cigar })
    }
}

/// A single aligned record.
///
/// Mate fields follow the SAM convention: on a supplementary record they describe the mate
/// of the record's primary alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Read {
    name: String,
    flags: Flags,
    chromosome: String,
    position: u32,
    cigar: CigarOps,
    mate_chromosome: Option<String>,
    mate_position: u32,
    mate_cigar: Option<CigarOps>,
    supplementary_alignments: Vec<SupplementaryAlignment>,
    qualities: Vec<u8>,
}

impl Read {
    /// The read (template) name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The SAM flags.
    #[must_use]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Reference sequence name.
    #[must_use]
    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    /// 1-based alignment start.
    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Parsed CIGAR.
    #[must_use]
    pub fn cigar(&self) -> &[(Kind, usize)] {
        &self.cigar
    }

    /// Per-base qualities.
    #[must_use]
    pub fn qualities(&self) -> &[u8] {
        &self.qualities
    }

    #[must_use]
    pub fn is_reverse(&self) -> bool {
        self.flags.is_reverse_complemented()
    }

    #[must_use]
    pub fn is_supplementary(&self) -> bool {
        self.flags.is_supplementary()
    }

    #[must_use]
    pub fn is_unmapped(&self) -> bool {
        self.flags.is_unmapped()
    }

    #[must_use]
    pub fn is_paired(&self) -> bool {
        self.flags.is_segmented()
    }

    /// True for the first read of a pair, and for unpaired reads.
    #[must_use]
    pub fn is_first_of_pair(&self) -> bool {
        !self.flags.is_segmented() || self.flags.is_first_segment()
    }

    /// True if the read is paired and its mate is mapped.
    #[must_use]
    pub fn has_mapped_mate(&self) -> bool {
        self.flags.is_segmented() && !self.flags.is_mate_unmapped() && self.mate_chromosome.is_some()
    }

    #[must_use]
    pub fn mate_reverse(&self) -> bool {
        self.flags.is_mate_reverse_complemented()
    }

    /// Mate reference sequence name, if the mate is mapped.
    #[must_use]
    pub fn mate_chromosome(&self) -> Option<&str> {
        self.mate_chromosome.as_deref()
    }

    /// Mate 1-based alignment start.
    #[must_use]
    pub fn mate_position(&self) -> u32 {
        self.mate_position
    }

    /// Mate CIGAR from the `MC` tag, when present.
    #[must_use]
    pub fn mate_cigar(&self) -> Option<&[(Kind, usize)]> {
        self.mate_cigar.as_deref()
    }

    /// The first `SA` entry, when present. On a supplementary record this is its primary.
    #[must_use]
    pub fn supplementary_alignment(&self) -> Option<&SupplementaryAlignment> {
        self.supplementary_alignments.first()
    }

    /// Every `SA` entry, in tag order.
    #[must_use]
    pub fn supplementary_alignments(&self) -> &[SupplementaryAlignment] {
        &self.supplementary_alignments
    }

    /// 1-based inclusive alignment end.
    ///
    /// The span is checked when the read is built, so this never overflows.
    #[must_use]
    pub fn alignment_end(&self) -> u32 {
        let ref_len = u32::try_from(reference_length(&self.cigar)).unwrap_or(u32::MAX);
        self.position.saturating_add(ref_len.saturating_sub(1))
    }
}

/// Builder for [`Read`]s.
///
/// Defaults describe a mapped, unpaired, forward-strand read at `chr1:1` with no CIGAR.
#[derive(Debug, Clone)]
pub struct ReadBuilder {
    name: String,
    flags: Flags,
    chromosome: String,
    position: u32,
    cigar: String,
    mate_chromosome: Option<String>,
    mate_position: u32,
    mate_cigar: Option<String>,
    supplementary_alignments: Vec<SupplementaryAlignment>,
    qualities: Vec<u8>,
}

impl Default for ReadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: String::new(),
            flags: Flags::empty(),
            chromosome: "chr1".to_string(),
            position: 1,
            cigar: String::new(),
            mate_chromosome: None,
            mate_position: 0,
            mate_cigar: None,
            supplementary_alignments: Vec::new(),
            qualities: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Sets all flags at once from their SAM integer value.
    #[must_use]
    pub fn flags(mut self, flags: u16) -> Self {
        self.flags = Flags::from(flags);
        self
    }

    #[must_use]
    pub fn chromosome(mut self, chromosome: &str) -> Self {
        self.chromosome = chromosome.to_string();
        self
    }

    #[must_use]
    pub fn position(mut self, position: u32) -> Self {
        self.position = position;
        self
    }

    #[must_use]
    pub fn cigar(mut self, cigar: &str) -> Self {
        self.cigar = cigar.to_string();
        self
    }

    #[must_use]
    pub fn qualities(mut self, qualities: &[u8]) -> Self {
        self.qualities = qualities.to_vec();
        self
    }

    #[must_use]
    pub fn reverse(self, reverse: bool) -> Self {
        self.flag(Flags::REVERSE_COMPLEMENTED, reverse)
    }

    #[must_use]
    pub fn supplementary(self, supplementary: bool) -> Self {
        self.flag(Flags::SUPPLEMENTARY, supplementary)
    }

    #[must_use]
    pub fn unmapped(self, unmapped: bool) -> Self {
        self.flag(Flags::UNMAPPED, unmapped)
    }

    /// Marks the read as paired and sets which end of the pair it is.
    #[must_use]
    pub fn first_of_pair(self, first: bool) -> Self {
        self.flag(Flags::SEGMENTED, true)
            .flag(Flags::FIRST_SEGMENT, first)
            .flag(Flags::LAST_SEGMENT, !first)
    }

    /// Sets a mapped mate location; marks the read as paired.
    #[must_use]
    pub fn mate(mut self, chromosome: &str, position: u32, reverse: bool) -> Self {
        self.mate_chromosome = Some(chromosome.to_string());
        self.mate_position = position;
        self.flag(Flags::SEGMENTED, true)
            .flag(Flags::MATE_UNMAPPED, false)
            .flag(Flags::MATE_REVERSE_COMPLEMENTED, reverse)
    }

    /// Marks the mate as unmapped; marks the read as paired.
    #[must_use]
    pub fn mate_unmapped(mut self) -> Self {
        self.mate_chromosome = None;
        self.mate_position = 0;
        self.flag(Flags::SEGMENTED, true).flag(Flags::MATE_UNMAPPED, true)
    }

    /// Sets the mate CIGAR (`MC` tag).
    #[must_use]
    pub fn mate_cigar(mut self, cigar: &str) -> Self {
        self.mate_cigar = Some(cigar.to_string());
        self
    }

    /// Adds an `SA` entry; the first one added is the first in the tag.
    #[must_use]
    pub fn supplementary_alignment(mut self, sa: SupplementaryAlignment) -> Self {
        self.supplementary_alignments.push(sa);
        self
    }

    fn flag(mut self, flag: Flags, on: bool) -> Self {
        self.flags.set(flag, on);
        self
    }

    /// Builds the read.
    ///
    /// # Errors
    ///
    /// Returns an error if the CIGAR or mate CIGAR cannot be parsed, or if the alignment
    /// would end past the largest representable position.
    pub fn build(self) -> Result<Read> {
        let cigar = parse_cigar(&self.name, &self.cigar)?;
        let span = u32::try_from(reference_length(&cigar)).ok();
        if span.and_then(|s| self.position.checked_add(s)).is_none() {
            return Err(DedupError::InvalidCigar {
                read: self.name,
                cigar: self.cigar,
                reason: format!(
                    "alignment at {} extends past the end of the reference",
                    self.position
                ),
            });
        }
        let mate_cigar = match &self.mate_cigar {
            Some(mc) => Some(parse_cigar(&self.name, mc)?).filter(|ops| !ops.is_empty()),
            None => None,
        };

        Ok(Read {
            name: self.name,
            flags: self.flags,
            chromosome: self.chromosome,
            position: self.position,
            cigar,
            mate_chromosome: self.mate_chromosome,
            mate_position: self.mate_position,
            mate_cigar,
            supplementary_alignments: self.supplementary_alignments,
            qualities: self.qualities,
        })
    }
}
