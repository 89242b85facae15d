//! Shared builders and drivers for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;

use fgdedup_lib::assembly::process_partition;
use fgdedup_lib::candidates::CandidateDuplicates;
use fgdedup_lib::combiner::GroupCombiner;
use fgdedup_lib::config::DedupConfig;
use fgdedup_lib::fragment::Fragment;
use fgdedup_lib::partition::Partitioner;
use fgdedup_lib::read::{Read, ReadBuilder, SupplementaryAlignment};
use fgdedup_lib::writer::{FragmentCollector, RecordWriter};

/// A forward first-of-pair read at `pos` whose reverse mate starts at `mate_pos`.
pub fn lower_read(name: &str, pos: u32, mate_pos: u32, qual: u8) -> ReadBuilder {
    ReadBuilder::new()
        .name(name)
        .position(pos)
        .cigar("10M")
        .qualities(&[qual; 10])
        .first_of_pair(true)
        .mate("chr1", mate_pos, true)
}

/// A reverse second-of-pair read at `pos` whose forward mate starts at `mate_pos`.
pub fn upper_read(name: &str, pos: u32, cigar: &str, mate_pos: u32, qual: u8) -> ReadBuilder {
    ReadBuilder::new()
        .name(name)
        .position(pos)
        .cigar(cigar)
        .qualities(&[qual; 10])
        .reverse(true)
        .first_of_pair(false)
        .mate("chr1", mate_pos, false)
}

/// Both primary reads of a template, neither carrying a mate CIGAR.
pub fn pair(name: &str, lower: u32, upper: u32, qual: u8) -> Vec<Read> {
    vec![
        lower_read(name, lower, upper, qual).build().unwrap(),
        upper_read(name, upper, "10M", lower, qual).build().unwrap(),
    ]
}

/// A forward `10M` alignment on chr1, for use as an `SA` tag value.
pub fn sa(pos: u32) -> SupplementaryAlignment {
    SupplementaryAlignment::parse(&format!("chr1,{pos},+,10M,60,0;")).unwrap()
}

/// Evidence from one partition, delivered to the combiner in one call.
pub enum Delivery {
    Resolved(String, Vec<Fragment>),
    Candidates(String, Vec<CandidateDuplicates>),
    Supplementaries(String, Vec<Fragment>),
}

impl Delivery {
    pub fn deliver<W: RecordWriter>(self, combiner: &GroupCombiner<W>) {
        let result = match self {
            Delivery::Resolved(partition, fragments) => {
                combiner.process_partition_fragments(&partition, fragments, vec![], vec![])
            }
            Delivery::Candidates(partition, groups) => {
                combiner.process_partition_fragments(&partition, vec![], groups, vec![])
            }
            Delivery::Supplementaries(partition, fragments) => {
                combiner.process_partition_fragments(&partition, vec![], vec![], fragments)
            }
        };
        result.unwrap();
    }
}

/// Reads bucketed by partition, sorted by partition name.
pub fn bucket(reads: &[Read], partitioner: &Partitioner) -> Vec<(String, Vec<Read>)> {
    let mut buckets: BTreeMap<String, Vec<Read>> = BTreeMap::new();
    for read in reads {
        buckets.entry(partitioner.partition_of(read)).or_default().push(read.clone());
    }
    buckets.into_iter().collect()
}

/// Processes every partition and splits its output into non-empty single-stream deliveries.
pub fn deliveries(reads: &[Read], partitioner: &Partitioner, config: &DedupConfig) -> Vec<Delivery> {
    let mut deliveries = Vec::new();
    for (partition, reads) in bucket(reads, partitioner) {
        let output = process_partition(&partition, reads, partitioner, config);
        if !output.resolved.is_empty() {
            deliveries.push(Delivery::Resolved(partition.clone(), output.resolved));
        }
        if !output.candidates.is_empty() {
            deliveries.push(Delivery::Candidates(partition.clone(), output.candidates));
        }
        if !output.supplementaries.is_empty() {
            deliveries.push(Delivery::Supplementaries(partition, output.supplementaries));
        }
    }
    deliveries
}

/// All orderings of `0..n`.
pub fn permutations(n: usize) -> Vec<Vec<usize>> {
    fn extend(prefix: &mut Vec<usize>, remaining: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if remaining.is_empty() {
            out.push(prefix.clone());
            return;
        }
        for i in 0..remaining.len() {
            let next = remaining.remove(i);
            prefix.push(next);
            extend(prefix, remaining, out);
            prefix.pop();
            remaining.insert(i, next);
        }
    }
    let mut out = Vec::new();
    extend(&mut Vec::new(), &mut (0..n).collect(), &mut out);
    out
}

/// Identifies a written read: template name, position and supplementary flag.
pub type ReadKey = (String, u32, bool);

/// Final `(status, duplicate_count)` of every written read.
///
/// Panics if any read was written more than once or a fragment was not marked written.
pub fn outcome(fragments: &[Fragment]) -> BTreeMap<ReadKey, (String, usize)> {
    let mut out = BTreeMap::new();
    for fragment in fragments {
        assert!(fragment.reads_written(), "fragment {} not marked written", fragment.id());
        for read in fragment.reads() {
            let key = (read.name().to_string(), read.position(), read.is_supplementary());
            let value = (fragment.status().as_str().to_string(), fragment.duplicate_count());
            assert!(out.insert(key.clone(), value).is_none(), "read {key:?} written twice");
        }
    }
    out
}

/// Delivers `deliveries` in the given order to a fresh combiner and finishes the run.
pub fn run_in_order(
    mut deliveries: Vec<Delivery>,
    order: &[usize],
    config: DedupConfig,
) -> (BTreeMap<ReadKey, (String, usize)>, usize) {
    let combiner = GroupCombiner::new(FragmentCollector::new(), config);
    let mut slots: Vec<Option<Delivery>> = deliveries.drain(..).map(Some).collect();
    for &i in order {
        if let Some(delivery) = slots[i].take() {
            delivery.deliver(&combiner);
        }
    }
    let unresolved = combiner.finish().total_fragments();
    let fragments = combiner.into_writer().into_fragments();
    (outcome(&fragments), unresolved)
}

/// Status of every read of `template`.
pub fn statuses_of<'a>(
    outcome: &'a BTreeMap<ReadKey, (String, usize)>,
    template: &str,
) -> Vec<&'a str> {
    outcome
        .iter()
        .filter(|((name, _, _), _)| name == template)
        .map(|(_, (status, _))| status.as_str())
        .collect()
}

/// Splits every supplementary delivery into one delivery per fragment.
pub fn split_supplementaries(deliveries: Vec<Delivery>) -> Vec<Delivery> {
    deliveries
        .into_iter()
        .flat_map(|delivery| match delivery {
            Delivery::Supplementaries(partition, fragments) => fragments
                .into_iter()
                .map(|f| Delivery::Supplementaries(partition.clone(), vec![f]))
                .collect(),
            other => vec![other],
        })
        .collect()
}
