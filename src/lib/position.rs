//! Position keying: unclipped 5′ positions, position signatures and quality totals.
//!
//! Two fragments are duplicates when their reads start at the same unclipped 5′ positions
//! on the same strands. Unclipped positions undo soft clipping so that fragments whose 5′
//! ends coincide still match when the aligner clipped them differently.
//!
//! Each template is owned by its *lower* read: the primary read whose end
//! `(chromosome, unclipped 5′ position, strand)` sorts first, with ties going to the first
//! of pair. A read sees its mate's end through the `MC` tag. Without `MC` the mate's clipping
//! is unknown, so both mates fall back to comparing `(chromosome, alignment start)`, which
//! each of them can see.

use std::cmp::Ordering;

use noodles::sam::alignment::record::cigar::op::Kind;

use crate::config::QualityScoring;
use crate::fragment::Fragment;
use crate::read::{
    Read, SupplementaryAlignment, leading_soft_clipping, reference_length, trailing_soft_clipping,
};

/// Gets the unclipped 5′ position of a read.
///
/// For forward strand reads this is the alignment start minus leading soft clipping; for
/// reverse strand reads it is the alignment end plus trailing soft clipping.
///
/// Returns `None` for unmapped reads.
#[must_use]
pub fn unclipped_position(read: &Read) -> Option<usize> {
    if read.is_unmapped() {
        return None;
    }
    Some(five_prime(read.position(), read.cigar(), read.is_reverse()))
}

/// Gets the unclipped 5′ position of a read's mate from the mate position and `MC` tag.
///
/// Returns `None` when the mate is unmapped or its CIGAR is unknown.
#[must_use]
pub fn mate_unclipped_position(read: &Read) -> Option<usize> {
    if !read.has_mapped_mate() {
        return None;
    }
    let mate_cigar = read.mate_cigar()?;
    Some(five_prime(read.mate_position(), mate_cigar, read.mate_reverse()))
}

fn five_prime(position: u32, cigar: &[(Kind, usize)], reverse: bool) -> usize {
    let start = position as usize;
    if reverse {
        start + reference_length(cigar).saturating_sub(1) + trailing_soft_clipping(cigar)
    } else {
        start.saturating_sub(leading_soft_clipping(cigar))
    }
}

/// True if the read is the lower primary read of its template.
///
/// Unpaired reads and reads with an unmapped mate are always lower; an unmapped read with a
/// mapped mate never is. Otherwise see [`is_lower_alignment`].
#[must_use]
pub fn is_lower_read(read: &Read) -> bool {
    match ReadEnd::of_read(read) {
        Some(end) => is_lower_alignment(&end, read.position(), read),
        None => !read.has_mapped_mate(),
    }
}

/// True if the primary alignment ending at `end` and starting at `position` is the lower
/// read of its template, where `read` carries that alignment's flags and mate fields.
///
/// With `MC` the two ends are compared; without it the two alignment starts are. Ties go to
/// the first of pair. Supplementary records carry the mate fields of their primary
/// alignment, so this also locates the owner of a template from a supplementary's `SA` tag.
#[must_use]
pub fn is_lower_alignment(end: &ReadEnd, position: u32, read: &Read) -> bool {
    let Some(mate_chromosome) = read.mate_chromosome().filter(|_| read.has_mapped_mate()) else {
        return true;
    };
    let ordering = match ReadEnd::of_mate(read) {
        Some(mate) => end.cmp(&mate),
        None => (end.chromosome.as_str(), position).cmp(&(mate_chromosome, read.mate_position())),
    };
    match ordering {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => read.is_first_of_pair(),
    }
}

/// One end of a template: chromosome, unclipped 5′ position and strand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReadEnd {
    pub chromosome: String,
    pub position: usize,
    pub reverse: bool,
}

impl ReadEnd {
    /// The end described by a mapped read.
    #[must_use]
    pub fn of_read(read: &Read) -> Option<Self> {
        Some(Self {
            chromosome: read.chromosome().to_string(),
            position: unclipped_position(read)?,
            reverse: read.is_reverse(),
        })
    }

    /// The end described by a read's mate fields, when the mate CIGAR is known.
    #[must_use]
    pub fn of_mate(read: &Read) -> Option<Self> {
        Some(Self {
            chromosome: read.mate_chromosome()?.to_string(),
            position: mate_unclipped_position(read)?,
            reverse: read.mate_reverse(),
        })
    }

    /// The end of an alignment named in an `SA` tag.
    #[must_use]
    pub fn of_alignment(sa: &SupplementaryAlignment) -> Self {
        Self {
            chromosome: sa.chromosome.clone(),
            position: five_prime(sa.position, &sa.cigar, sa.reverse),
            reverse: sa.reverse,
        }
    }
}

/// The normalized key under which fragments are compared for duplication.
///
/// `first` and `second` are the two ends of the template in sorted order, so both mates of a
/// pair yield the same signature whichever read is the lower one. `second` is `None` for
/// unpaired reads, pairs with an unmapped mate, and incomplete signatures, where `first` is
/// the end of the read at hand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionSignature {
    pub first: ReadEnd,
    pub second: Option<ReadEnd>,
    /// False when the mate is mapped but neither its read nor its `MC` tag is available
    pub complete: bool,
    /// True for fragments holding only supplementary alignments
    pub supplementary: bool,
}

impl PositionSignature {
    /// Derives the signature of a fragment.
    ///
    /// Returns `None` if the fragment has no mapped read.
    #[must_use]
    pub fn from_fragment(fragment: &Fragment) -> Option<Self> {
        let mapped_primaries: Vec<&Read> =
            fragment.primary_reads().filter(|r| !r.is_unmapped()).collect();

        let supplementary = mapped_primaries.is_empty();
        let (read, mate_end, complete) = match mapped_primaries.as_slice() {
            [] => (fragment.supplementary_reads().find(|r| !r.is_unmapped())?, None, true),
            [read] if read.has_mapped_mate() => {
                let end = ReadEnd::of_mate(read);
                let complete = end.is_some();
                (*read, end, complete)
            }
            [read] => (*read, None, true),
            [read, mate, ..] => (*read, ReadEnd::of_read(mate), true),
        };
        let end = ReadEnd::of_read(read)?;

        let (first, second) = match mate_end {
            Some(mate) if mate < end => (mate, Some(end)),
            Some(mate) => (end, Some(mate)),
            None => (end, None),
        };

        Some(Self { first, second, complete, supplementary })
    }

    /// The end fragments are grouped on before full comparison.
    #[must_use]
    pub fn anchor(&self) -> &ReadEnd {
        &self.first
    }
}

/// Aggregates base qualities over a fragment's primary reads.
///
/// Used only to choose which fragment of a duplicate set becomes the primary.
#[must_use]
pub fn calc_base_qual_total(fragment: &Fragment, scoring: QualityScoring) -> f64 {
    let qualities = fragment.primary_reads().flat_map(|r| r.qualities().iter().copied());
    match scoring {
        QualityScoring::Sum => qualities.map(f64::from).sum(),
        QualityScoring::CappedSum(cap) => qualities.map(|q| f64::from(q.min(cap))).sum(),
        QualityScoring::Mean => {
            let (total, count) =
                qualities.fold((0u64, 0u64), |(total, count), q| (total + u64::from(q), count + 1));
            if count == 0 { 0.0 } else { total as f64 / count as f64 }
        }
    }
}
