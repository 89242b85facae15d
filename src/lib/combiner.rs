// Copyright (c) 2025, Fulcrum Genomics LLC
// All rights reserved.

//! # Cross-partition reconciliation
//!
//! The [`GroupCombiner`] merges the evidence produced by independently processed partitions
//! into one final, write-once classification per fragment. Each partition contributes three
//! streams which may arrive in any order and over any number of calls:
//!
//! 1. **Resolved** fragments, already classified by their owner partition.
//! 2. **Candidate** groups, anchor groups waiting for mate reads held by other partitions.
//! 3. **Supplementary** fragments: reads of a template that live outside its owner
//!    partition (upper mates and supplementary alignments), routed to the owner by name.
//!
//! ## Protocol
//!
//! State lives in one [`PartitionCache`] per owner partition, each behind its own mutex.
//!
//! - A resolved fragment is forwarded. If reads of its template are still to come its status
//!   is recorded, and any fragments of the template already waiting are given that status
//!   and forwarded.
//! - A candidate group absorbs waiting mate fragments of its members. Once no member is
//!   waiting for a mate the group is classified, every member is forwarded and its status
//!   recorded; otherwise the group is stored.
//! - A supplementary fragment inherits a recorded status and is forwarded. A fragment
//!   carrying the mate of a stored candidate member is merged into that member, which may
//!   make the group classifiable. Anything else waits.
//!
//! A recorded status counts the reads that inherit it and is dropped once every read the
//! template's primaries announce has been seen.
//!
//! Reads without `MC` route to the partition of their owner's alignment start, which need not
//! hold the owner's unclipped end. Before an owner partition takes in such a template it
//! leaves a redirect in the start partition and takes over any of the template's fragments
//! already waiting there; fragments arriving later follow the redirect.
//!
//! Mate fragments are always merged into their candidate member before it is classified,
//! and supplementary-only fragments never are, so the fragments forwarded and their final
//! status, `reads_written` and `duplicate_count` do not depend on arrival order.
//!
//! ## Concurrency
//!
//! Every check-and-update on a partition's state holds that partition's lock, so a template
//! is finalized exactly once however deliveries race. No operation holds two partition
//! locks, and fragments are handed to the [`RecordWriter`] after the lock is released.
//! Redirects are kept until [`GroupCombiner::reset`].

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};

use crate::assembly::PartitionOutput;
use crate::candidates::CandidateDuplicates;
use crate::classifier::resolve_fragments;
use crate::config::DedupConfig;
use crate::errors::{DedupError, Result};
use crate::fragment::{Fragment, FragmentStatus};
use crate::logging::format_count;
use crate::partition_cache::{PartitionCache, ResolvedStatus};
use crate::writer::RecordWriter;

/// Fragments still pending when the run finished.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UnresolvedSummary {
    /// Candidate groups never completed
    pub candidate_groups: usize,
    /// Fragments in those groups
    pub candidate_fragments: usize,
    /// Fragments whose template was never classified
    pub incomplete_fragments: usize,
}

impl UnresolvedSummary {
    #[must_use]
    pub fn total_fragments(&self) -> usize {
        self.candidate_fragments + self.incomplete_fragments
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_fragments() == 0
    }
}

/// Reconciles per-partition evidence into final fragment classifications.
pub struct GroupCombiner<W: RecordWriter> {
    writer: W,
    config: DedupConfig,
    partitions: RwLock<AHashMap<String, Arc<Mutex<PartitionCache>>>>,
}

impl<W: RecordWriter> GroupCombiner<W> {
    /// Creates a combiner forwarding finalized fragments to `writer`.
    ///
    /// `config` is used to classify candidate groups once their mates arrive.
    pub fn new(writer: W, config: DedupConfig) -> Self {
        Self { writer, config, partitions: RwLock::new(AHashMap::new()) }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Live state of a partition, created on first reference.
    pub fn partition_cache(&self, partition: &str) -> Arc<Mutex<PartitionCache>> {
        if let Some(cache) = self.partitions.read().get(partition) {
            return Arc::clone(cache);
        }
        let mut partitions = self.partitions.write();
        Arc::clone(partitions.entry(partition.to_string()).or_default())
    }

    /// Names of all partitions referenced so far, sorted.
    pub fn partition_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.partitions.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Clears all partition state.
    pub fn reset(&self) {
        let mut partitions = self.partitions.write();
        for cache in partitions.values() {
            cache.lock().clear();
        }
        partitions.clear();
    }

    /// Delivers evidence from one partition.
    ///
    /// Supplementary fragments are handled in the partition named by their
    /// `primary_partition`, or in `partition` when that is unset.
    ///
    /// # Errors
    ///
    /// Returns an error if `partition` is empty.
    pub fn process_partition_fragments(
        &self,
        partition: &str,
        resolved: Vec<Fragment>,
        candidates: Vec<CandidateDuplicates>,
        supplementaries: Vec<Fragment>,
    ) -> Result<()> {
        if partition.is_empty() {
            return Err(DedupError::InvalidPartition { name: partition.to_string() });
        }

        let mut finished = Vec::new();

        if !resolved.is_empty() || !candidates.is_empty() {
            let moved = self.take_over_start_partitions(partition, &resolved, &candidates);
            let cache = self.partition_cache(partition);
            let mut cache = cache.lock();
            for fragment in moved {
                cache.add_incomplete(fragment);
            }
            for fragment in resolved {
                self.accept_resolved(&mut cache, fragment, &mut finished);
            }
            for group in candidates {
                self.accept_candidates(&mut cache, group, &mut finished);
            }
        }

        let mut redirected = Vec::new();
        for (target, fragments) in route_by(supplementaries, |f| {
            f.primary_partition().unwrap_or(partition).to_string()
        }) {
            let cache = self.partition_cache(&target);
            let mut cache = cache.lock();
            for fragment in fragments {
                let redirect = cache.redirect_of(fragment.id()).filter(|owner| *owner != target);
                match redirect.map(str::to_string) {
                    Some(owner) => redirected.push((owner, fragment)),
                    None => self.accept_supplementary(&mut cache, fragment, &mut finished),
                }
            }
        }
        for (target, fragments) in route_by(redirected, |(owner, _)| owner.clone()) {
            let cache = self.partition_cache(&target);
            let mut cache = cache.lock();
            for (_, fragment) in fragments {
                self.accept_supplementary(&mut cache, fragment, &mut finished);
            }
        }

        for fragment in finished {
            self.writer.write_fragment(fragment);
        }
        Ok(())
    }

    /// Leaves a redirect to `partition` in the start partition of every owned fragment that
    /// has one, returning the fragments of those templates already waiting there.
    fn take_over_start_partitions(
        &self,
        partition: &str,
        resolved: &[Fragment],
        candidates: &[CandidateDuplicates],
    ) -> Vec<Fragment> {
        let owned = resolved.iter().chain(candidates.iter().flat_map(|g| g.fragments()));
        let mut by_start: AHashMap<&str, Vec<&str>> = AHashMap::new();
        for fragment in owned {
            if let Some(start) = fragment.start_partition().filter(|s| *s != partition) {
                by_start.entry(start).or_default().push(fragment.id());
            }
        }

        let mut moved = Vec::new();
        for (start, templates) in by_start {
            let cache = self.partition_cache(start);
            let mut cache = cache.lock();
            for template in templates {
                cache.add_redirect(template, partition);
                moved.extend(cache.take_incomplete(template));
            }
        }
        moved
    }

    /// Delivers all three streams produced by [`process_partition`](crate::assembly::process_partition).
    ///
    /// # Errors
    ///
    /// Returns an error if `partition` is empty.
    pub fn process_partition_output(&self, partition: &str, output: PartitionOutput) -> Result<()> {
        self.process_partition_fragments(
            partition,
            output.resolved,
            output.candidates,
            output.supplementaries,
        )
    }

    /// Delivers a single resolved fragment.
    ///
    /// # Errors
    ///
    /// Returns an error if `partition` is empty.
    pub fn local_resolved_fragment(&self, partition: &str, fragment: Fragment) -> Result<()> {
        self.process_partition_fragments(partition, vec![fragment], Vec::new(), Vec::new())
    }

    /// Delivers a single supplementary fragment.
    ///
    /// # Errors
    ///
    /// Returns an error if `partition` is empty.
    pub fn local_supplementary(&self, partition: &str, fragment: Fragment) -> Result<()> {
        self.process_partition_fragments(partition, Vec::new(), Vec::new(), vec![fragment])
    }

    /// Ends the run, forwarding everything still pending as `None`.
    ///
    /// Pending fragments point at mates or primaries that never arrived. They are written with
    /// the fallback status rather than dropped, and counted in the returned summary.
    pub fn finish(&self) -> UnresolvedSummary {
        let mut summary = UnresolvedSummary::default();

        for name in self.partition_names() {
            let cache = self.partition_cache(&name);
            let (groups, incomplete) = cache.lock().drain_pending();

            summary.candidate_groups += groups.len();
            summary.incomplete_fragments += incomplete.len();

            let members = groups.into_iter().flat_map(CandidateDuplicates::into_fragments);
            for mut fragment in members {
                summary.candidate_fragments += 1;
                fragment.set_status(FragmentStatus::None);
                self.forward_to_writer(fragment);
            }
            for mut fragment in incomplete {
                if !fragment.status().is_settled() {
                    fragment.set_status(FragmentStatus::None);
                }
                self.forward_to_writer(fragment);
            }
        }

        if !summary.is_empty() {
            log::warn!(
                "{} fragments were unresolved at the end of the run and were marked unique: \
                 {} in {} candidate groups, {} awaiting their template",
                format_count(summary.total_fragments() as u64),
                format_count(summary.candidate_fragments as u64),
                format_count(summary.candidate_groups as u64),
                format_count(summary.incomplete_fragments as u64),
            );
        }
        summary
    }

    fn forward_to_writer(&self, mut fragment: Fragment) {
        fragment.mark_written();
        self.writer.write_fragment(fragment);
    }

    fn accept_resolved(
        &self,
        cache: &mut PartitionCache,
        fragment: Fragment,
        finished: &mut Vec<Fragment>,
    ) {
        cache.record_status(&fragment);
        let status = ResolvedStatus::of(&fragment);
        settle_pending(cache, fragment.id(), &status, finished);
        mark_finished(fragment, finished);
    }

    fn accept_candidates(
        &self,
        cache: &mut PartitionCache,
        mut group: CandidateDuplicates,
        finished: &mut Vec<Fragment>,
    ) {
        let names: Vec<String> = group.template_names().map(str::to_string).collect();
        for name in &names {
            for mate in cache.take_pending_mates(name) {
                if let Some(unmatched) = group.merge_into_member(mate) {
                    cache.add_incomplete(unmatched);
                }
            }
        }

        if group.is_resolvable() {
            self.resolve_candidates(cache, group, finished);
        } else {
            cache.insert_candidates(group);
        }
    }

    fn accept_supplementary(
        &self,
        cache: &mut PartitionCache,
        mut fragment: Fragment,
        finished: &mut Vec<Fragment>,
    ) {
        if let Some(status) = cache.status_of(fragment.id()) {
            status.apply_to(&mut fragment);
            cache.count_reads(&fragment);
            mark_finished(fragment, finished);
            return;
        }

        let key = if fragment.is_supplementary_only() {
            None
        } else {
            cache.candidate_key_of(fragment.id()).cloned()
        };
        let Some(key) = key else {
            cache.add_incomplete(fragment);
            return;
        };

        let resolvable = match cache.candidate_mut(&key) {
            Some(group) => {
                if let Some(unmatched) = group.merge_into_member(fragment) {
                    cache.add_incomplete(unmatched);
                    return;
                }
                group.is_resolvable()
            }
            None => {
                cache.add_incomplete(fragment);
                return;
            }
        };

        if resolvable {
            if let Some(group) = cache.remove_candidates(&key) {
                self.resolve_candidates(cache, group, finished);
            }
        }
    }

    /// Classifies a complete candidate group and forwards its members.
    fn resolve_candidates(
        &self,
        cache: &mut PartitionCache,
        group: CandidateDuplicates,
        finished: &mut Vec<Fragment>,
    ) {
        for fragment in resolve_fragments(group.into_fragments(), &self.config) {
            cache.record_status(&fragment);
            let status = ResolvedStatus::of(&fragment);
            settle_pending(cache, fragment.id(), &status, finished);
            mark_finished(fragment, finished);
        }
    }
}

/// Gives a template's waiting fragments their final status and queues them for writing.
fn settle_pending(
    cache: &mut PartitionCache,
    template: &str,
    status: &ResolvedStatus,
    finished: &mut Vec<Fragment>,
) {
    for mut pending in cache.take_incomplete(template) {
        status.apply_to(&mut pending);
        cache.count_reads(&pending);
        mark_finished(pending, finished);
    }
}

/// Groups items by target partition, keeping arrival order within each target.
fn route_by<T>(items: Vec<T>, target: impl Fn(&T) -> String) -> Vec<(String, Vec<T>)> {
    let mut index: AHashMap<String, usize> = AHashMap::new();
    let mut routed: Vec<(String, Vec<T>)> = Vec::new();
    for item in items {
        let name = target(&item);
        match index.get(&name) {
            Some(&idx) => routed[idx].1.push(item),
            None => {
                index.insert(name.clone(), routed.len());
                routed.push((name, vec![item]));
            }
        }
    }
    routed
}

fn mark_finished(mut fragment: Fragment, finished: &mut Vec<Fragment>) {
    fragment.mark_written();
    finished.push(fragment);
}
