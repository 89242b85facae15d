//! Per-partition fragment assembly.
//!
//! Turns the reads delivered to one partition into the three evidence streams consumed by
//! the [`GroupCombiner`](crate::combiner::GroupCombiner):
//!
//! - **resolved** fragments, classified here because their lower read is local and their
//!   signature is known;
//! - **candidates**, anchor groups that cannot be classified until mates arrive;
//! - **supplementaries**, reads of templates owned by another partition (or whose owner read
//!   is missing), grouped per template and routed to the owner by name.

use ahash::AHashMap;

use crate::candidates::CandidateDuplicates;
use crate::classifier::classify_fragments;
use crate::config::DedupConfig;
use crate::fragment::{Fragment, ReadTally};
use crate::partition::Partitioner;
use crate::position::is_lower_read;
use crate::read::Read;

/// The evidence a partition contributes.
#[derive(Debug, Default)]
pub struct PartitionOutput {
    pub resolved: Vec<Fragment>,
    pub candidates: Vec<CandidateDuplicates>,
    pub supplementaries: Vec<Fragment>,
}

impl PartitionOutput {
    /// Total fragments across all three streams.
    #[must_use]
    pub fn fragment_count(&self) -> usize {
        self.resolved.len()
            + self.candidates.iter().map(CandidateDuplicates::len).sum::<usize>()
            + self.supplementaries.len()
    }
}

/// Groups reads by template name, in order of first appearance.
#[must_use]
pub fn group_by_template(reads: Vec<Read>) -> Vec<Vec<Read>> {
    let mut index: AHashMap<String, usize> = AHashMap::new();
    let mut templates: Vec<Vec<Read>> = Vec::new();
    for read in reads {
        match index.get(read.name()) {
            Some(&idx) => templates[idx].push(read),
            None => {
                index.insert(read.name().to_string(), templates.len());
                templates.push(vec![read]);
            }
        }
    }
    templates
}

/// Splits a partition's reads into owned fragments and dependent fragments.
///
/// A template is owned when its lower primary read is among the partition's reads; all of
/// its local reads form one fragment whose remote partitions name where the rest of the
/// template lives. When reads are still to come and the owner read starts in another
/// partition, that partition is kept as the fragment's `start_partition`. Otherwise the
/// local reads form a dependent fragment routed to the owner partition (`primary_partition`
/// is left empty when that is the partition itself).
#[must_use]
pub fn assemble_fragments(
    partition: &str,
    reads: Vec<Read>,
    partitioner: &Partitioner,
) -> (Vec<Fragment>, Vec<Fragment>) {
    let mut owned = Vec::new();
    let mut dependent = Vec::new();

    for template in group_by_template(reads) {
        let start_partition = template
            .iter()
            .find(|r| !r.is_supplementary() && is_lower_read(r))
            .map(|owner| partitioner.start_partition(owner));
        let owner_partition = partitioner.owner_partition(&template[0]);
        let remote: Vec<String> =
            template.iter().flat_map(|r| partitioner.remote_partitions(r, partition)).collect();

        let Some(mut fragment) = Fragment::from_reads(template) else {
            continue;
        };

        if let Some(start_partition) = start_partition {
            for name in remote {
                fragment.add_remote_partition(name);
            }
            if start_partition != partition && !ReadTally::of(&fragment).is_complete() {
                fragment.set_start_partition(Some(start_partition));
            }
            owned.push(fragment);
        } else {
            if owner_partition != partition {
                fragment.set_primary_partition(Some(owner_partition));
            }
            dependent.push(fragment);
        }
    }

    (owned, dependent)
}

/// Assembles and classifies the reads of one partition.
#[must_use]
pub fn process_partition(
    partition: &str,
    reads: Vec<Read>,
    partitioner: &Partitioner,
    config: &DedupConfig,
) -> PartitionOutput {
    let (owned, supplementaries) = assemble_fragments(partition, reads, partitioner);
    let mut output = PartitionOutput { supplementaries, ..PartitionOutput::default() };
    classify_fragments(owned, config, &mut output.resolved, &mut output.candidates);
    log::debug!(
        "Partition {partition}: {} resolved, {} candidate groups, {} supplementary fragments",
        output.resolved.len(),
        output.candidates.len(),
        output.supplementaries.len()
    );
    output
}
