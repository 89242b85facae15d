//! Per-partition reconciliation state.
//!
//! A recorded status is kept only while reads of its template are still expected, and is
//! dropped once the last of them has been counted. Templates whose announced reads never all
//! arrive keep their entry until [`GroupCombiner::reset`](crate::combiner::GroupCombiner::reset).

use ahash::AHashMap;

use crate::candidates::CandidateDuplicates;
use crate::fragment::{Fragment, FragmentStatus, ReadTally};
use crate::position::ReadEnd;

/// Final classification recorded for a template whose other reads may still arrive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStatus {
    pub status: FragmentStatus,
    pub duplicate_count: usize,
    pub umi_group: Option<String>,
}

impl ResolvedStatus {
    #[must_use]
    pub fn of(fragment: &Fragment) -> Self {
        Self {
            status: fragment.status(),
            duplicate_count: fragment.duplicate_count(),
            umi_group: fragment.umi_group().map(str::to_string),
        }
    }

    /// Copies this classification onto another fragment of the same template.
    pub fn apply_to(&self, fragment: &mut Fragment) {
        fragment.set_status(self.status);
        fragment.set_duplicate_count(self.duplicate_count);
        fragment.set_umi_group(self.umi_group.clone());
    }
}

/// A recorded status with the reads of its template counted so far.
#[derive(Debug, Clone)]
struct RecordedStatus {
    status: ResolvedStatus,
    tally: ReadTally,
}

/// Pending state of one partition.
///
/// Owned by the [`GroupCombiner`](crate::combiner::GroupCombiner) behind a per-partition
/// lock. Every fragment held here is owned by exactly one map entry.
#[derive(Debug, Default)]
pub struct PartitionCache {
    /// Pending groups, keyed on their shared lower-read end
    candidate_duplicates: AHashMap<ReadEnd, CandidateDuplicates>,
    /// Template name -> key of the pending group it belongs to
    candidate_index: AHashMap<String, ReadEnd>,
    /// Fragments waiting for their template to be classified
    incomplete_fragments: AHashMap<String, Vec<Fragment>>,
    resolved_statuses: AHashMap<String, RecordedStatus>,
    /// Template name -> owner partition, for templates whose owner read starts here but
    /// whose unclipped end lies elsewhere
    redirects: AHashMap<String, String>,
}

impl PartitionCache {
    #[must_use]
    pub fn candidate_duplicates(&self) -> &AHashMap<ReadEnd, CandidateDuplicates> {
        &self.candidate_duplicates
    }

    #[must_use]
    pub fn incomplete_fragments(&self) -> &AHashMap<String, Vec<Fragment>> {
        &self.incomplete_fragments
    }

    /// Number of templates whose status is recorded here.
    #[must_use]
    pub fn recorded_status_count(&self) -> usize {
        self.resolved_statuses.len()
    }

    /// Recorded classification of a template, if any.
    #[must_use]
    pub fn status_of(&self, template: &str) -> Option<&ResolvedStatus> {
        self.resolved_statuses.get(template).map(|recorded| &recorded.status)
    }

    /// Owner partition a template's reads arriving here are sent on to.
    #[must_use]
    pub fn redirect_of(&self, template: &str) -> Option<&str> {
        self.redirects.get(template).map(String::as_str)
    }

    /// True if nothing is pending; recorded statuses are not counted.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.candidate_duplicates.is_empty() && self.incomplete_fragments.is_empty()
    }

    /// Records a fragment's classification for reads of its template still to come.
    ///
    /// Nothing is recorded when the fragment already holds every read of its template.
    pub(crate) fn record_status(&mut self, fragment: &Fragment) {
        let tally = ReadTally::of(fragment);
        if !tally.is_complete() {
            let recorded = RecordedStatus { status: ResolvedStatus::of(fragment), tally };
            self.resolved_statuses.insert(fragment.id().to_string(), recorded);
        }
    }

    /// Counts the reads of a fragment that inherited its template's recorded status, and
    /// drops the status once no further read of the template can arrive.
    pub(crate) fn count_reads(&mut self, fragment: &Fragment) {
        let Some(recorded) = self.resolved_statuses.get_mut(fragment.id()) else {
            return;
        };
        recorded.tally.add(ReadTally::of(fragment));
        if recorded.tally.is_complete() {
            self.resolved_statuses.remove(fragment.id());
        }
    }

    pub(crate) fn add_redirect(&mut self, template: &str, owner_partition: &str) {
        self.redirects.insert(template.to_string(), owner_partition.to_string());
    }

    pub(crate) fn add_incomplete(&mut self, fragment: Fragment) {
        self.incomplete_fragments.entry(fragment.id().to_string()).or_default().push(fragment);
    }

    /// Removes every pending fragment of a template.
    pub(crate) fn take_incomplete(&mut self, template: &str) -> Vec<Fragment> {
        self.incomplete_fragments.remove(template).unwrap_or_default()
    }

    /// Removes the pending fragments of a template that carry a primary read, leaving
    /// supplementary-only fragments in place.
    pub(crate) fn take_pending_mates(&mut self, template: &str) -> Vec<Fragment> {
        let Some(pending) = self.incomplete_fragments.get_mut(template) else {
            return Vec::new();
        };
        let (mates, rest): (Vec<Fragment>, Vec<Fragment>) =
            std::mem::take(pending).into_iter().partition(|f| !f.is_supplementary_only());
        if rest.is_empty() {
            self.incomplete_fragments.remove(template);
        } else {
            *pending = rest;
        }
        mates
    }

    /// Key of the pending group holding a template, if any.
    #[must_use]
    pub fn candidate_key_of(&self, template: &str) -> Option<&ReadEnd> {
        self.candidate_index.get(template)
    }

    pub(crate) fn candidate_mut(&mut self, key: &ReadEnd) -> Option<&mut CandidateDuplicates> {
        self.candidate_duplicates.get_mut(key)
    }

    /// Stores a pending group, extending any group already held under the same key.
    pub(crate) fn insert_candidates(&mut self, group: CandidateDuplicates) {
        for name in group.template_names() {
            self.candidate_index.insert(name.to_string(), group.key().clone());
        }
        match self.candidate_duplicates.get_mut(group.key()) {
            Some(existing) => existing.extend(group),
            None => {
                self.candidate_duplicates.insert(group.key().clone(), group);
            }
        }
    }

    pub(crate) fn remove_candidates(&mut self, key: &ReadEnd) -> Option<CandidateDuplicates> {
        let group = self.candidate_duplicates.remove(key)?;
        for name in group.template_names() {
            self.candidate_index.remove(name);
        }
        Some(group)
    }

    /// Removes all pending groups and fragments.
    pub(crate) fn drain_pending(&mut self) -> (Vec<CandidateDuplicates>, Vec<Fragment>) {
        self.candidate_index.clear();
        let groups = self.candidate_duplicates.drain().map(|(_, group)| group).collect();
        let fragments = self.incomplete_fragments.drain().flat_map(|(_, f)| f).collect();
        (groups, fragments)
    }

    pub(crate) fn clear(&mut self) {
        self.candidate_duplicates.clear();
        self.candidate_index.clear();
        self.incomplete_fragments.clear();
        self.resolved_statuses.clear();
        self.redirects.clear();
    }
}
