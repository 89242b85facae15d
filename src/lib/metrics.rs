//! Run-level duplicate marking metrics.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::combiner::UnresolvedSummary;
use crate::fragment::{Fragment, FragmentStatus};

/// Metrics collected during duplicate marking.
///
/// Template counts are taken over distinct template names, since the reads of one template
/// may be written as several fragments (one per partition holding them).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DedupMetrics {
    /// Total templates written
    pub total_templates: u64,
    /// Templates alone at their position signature
    pub unique_templates: u64,
    /// Templates kept as the representative of a duplicate set
    pub primary_templates: u64,
    /// Templates marked as duplicates
    pub duplicate_templates: u64,
    /// Total reads written
    pub total_reads: u64,
    /// Reads marked as duplicates
    pub duplicate_reads: u64,
    /// Supplementary reads written
    pub supplementary_reads: u64,
    /// Fragments that fell back to unique at the end of the run
    pub unresolved_fragments: u64,
}

impl DedupMetrics {
    /// Tallies finalized fragments.
    #[must_use]
    pub fn from_fragments(fragments: &[Fragment]) -> Self {
        let mut metrics = Self::default();
        let mut templates: AHashMap<&str, FragmentStatus> = AHashMap::new();

        for fragment in fragments {
            let reads = fragment.read_count() as u64;
            metrics.total_reads += reads;
            metrics.supplementary_reads += fragment.supplementary_reads().count() as u64;
            if fragment.status().is_duplicate() {
                metrics.duplicate_reads += reads;
            }
            templates.entry(fragment.id()).or_insert(fragment.status());
        }

        for status in templates.values() {
            metrics.total_templates += 1;
            match status {
                FragmentStatus::Primary => metrics.primary_templates += 1,
                FragmentStatus::Duplicate => metrics.duplicate_templates += 1,
                _ => metrics.unique_templates += 1,
            }
        }
        metrics
    }

    /// Records the end-of-run fallback count.
    pub fn add_unresolved(&mut self, summary: &UnresolvedSummary) {
        self.unresolved_fragments += summary.total_fragments() as u64;
    }

    /// Calculate duplicate rate.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duplicate_rate(&self) -> f64 {
        if self.total_templates == 0 {
            0.0
        } else {
            self.duplicate_templates as f64 / self.total_templates as f64
        }
    }
}

/// Serializable version of `DedupMetrics` for file output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupMetricsOutput {
    pub total_templates: u64,
    pub unique_templates: u64,
    pub primary_templates: u64,
    pub duplicate_templates: u64,
    pub duplicate_rate: f64,
    pub total_reads: u64,
    pub duplicate_reads: u64,
    pub supplementary_reads: u64,
    pub unresolved_fragments: u64,
}

impl From<&DedupMetrics> for DedupMetricsOutput {
    fn from(m: &DedupMetrics) -> Self {
        Self {
            total_templates: m.total_templates,
            unique_templates: m.unique_templates,
            primary_templates: m.primary_templates,
            duplicate_templates: m.duplicate_templates,
            duplicate_rate: m.duplicate_rate(),
            total_reads: m.total_reads,
            duplicate_reads: m.duplicate_reads,
            supplementary_reads: m.supplementary_reads,
            unresolved_fragments: m.unresolved_fragments,
        }
    }
}
