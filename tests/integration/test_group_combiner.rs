//! Cross-partition reconciliation tests.
//!
//! These tests build realistic reads, run them through partition assembly, and deliver the
//! resulting evidence to a `GroupCombiner` in every possible order, checking that the final
//! classification never depends on that order.

use std::collections::BTreeMap;

use fgdedup_lib::combiner::GroupCombiner;
use fgdedup_lib::config::DedupConfig;
use fgdedup_lib::partition::Partitioner;
use fgdedup_lib::read::{Read, ReadBuilder};
use fgdedup_lib::writer::FragmentCollector;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::helpers::{
    Delivery, ReadKey, deliveries, lower_read, outcome, pair, permutations, run_in_order, sa,
    split_supplementaries, statuses_of, upper_read,
};

fn partitioner() -> Partitioner {
    Partitioner::new(1000).unwrap()
}

/// Templates spread over three partitions:
///
/// - `a`, `b`: duplicates at 100 whose mates (no `MC`) live in `chr1_1`; `a` also has a
///   supplementary alignment in `chr1_2`
/// - `c`: a singleton whose mate lives in `chr1_1`, with `MC` so it resolves locally
/// - `d`, `e`: local duplicate pairs at 300/400; `d` has a supplementary alignment in `chr1_2`
fn scenario() -> Vec<Read> {
    let mut reads = vec![
        lower_read("a", 100, 1500, 40).supplementary_alignment(sa(2600)).build().unwrap(),
        upper_read("a", 1500, "10M", 100, 40).build().unwrap(),
        supplementary_record("a", 2600, 1500, 100),
    ];
    reads.extend(pair("b", 100, 1500, 30));
    reads.push(lower_read("c", 200, 1600, 35).mate_cigar("10M").build().unwrap());
    reads.push(upper_read("c", 1600, "10M", 200, 35).build().unwrap());
    reads.push(lower_read("d", 300, 400, 40).supplementary_alignment(sa(2500)).build().unwrap());
    reads.push(upper_read("d", 400, "10M", 300, 40).build().unwrap());
    reads.push(supplementary_record("d", 2500, 400, 300));
    reads.extend(pair("e", 300, 400, 20));
    reads
}

/// The supplementary alignment of a first-of-pair read whose primary is at `primary_pos`.
fn supplementary_record(name: &str, pos: u32, mate_pos: u32, primary_pos: u32) -> Read {
    ReadBuilder::new()
        .name(name)
        .position(pos)
        .cigar("10M")
        .qualities(&[30; 10])
        .supplementary(true)
        .first_of_pair(true)
        .mate("chr1", mate_pos, true)
        .supplementary_alignment(sa(primary_pos))
        .build()
        .unwrap()
}

fn expected_scenario_outcome() -> BTreeMap<ReadKey, (String, usize)> {
    let entry = |name: &str, pos: u32, supp: bool, status: &str, dc: usize| {
        ((name.to_string(), pos, supp), (status.to_string(), dc))
    };
    BTreeMap::from([
        entry("a", 100, false, "PRIMARY", 1),
        entry("a", 1500, false, "PRIMARY", 1),
        entry("a", 2600, true, "PRIMARY", 1),
        entry("b", 100, false, "DUPLICATE", 0),
        entry("b", 1500, false, "DUPLICATE", 0),
        entry("c", 200, false, "NONE", 0),
        entry("c", 1600, false, "NONE", 0),
        entry("d", 300, false, "PRIMARY", 1),
        entry("d", 400, false, "PRIMARY", 1),
        entry("d", 2500, true, "PRIMARY", 1),
        entry("e", 300, false, "DUPLICATE", 0),
        entry("e", 400, false, "DUPLICATE", 0),
    ])
}

#[test]
fn test_scenario_produces_all_three_evidence_kinds() {
    let deliveries = deliveries(&scenario(), &partitioner(), &DedupConfig::default());
    let kinds: Vec<String> = deliveries
        .iter()
        .map(|d| match d {
            Delivery::Resolved(p, _) => format!("{p}:resolved"),
            Delivery::Candidates(p, _) => format!("{p}:candidates"),
            Delivery::Supplementaries(p, _) => format!("{p}:supplementaries"),
        })
        .collect();
    assert_eq!(
        kinds,
        [
            "chr1_0:resolved",
            "chr1_0:candidates",
            "chr1_1:supplementaries",
            "chr1_2:supplementaries"
        ]
    );
}

#[test]
fn test_every_delivery_order_gives_the_same_outcome() {
    let config = DedupConfig::default();
    let expected = expected_scenario_outcome();
    let n = deliveries(&scenario(), &partitioner(), &config).len();

    for order in permutations(n) {
        let (outcome, unresolved) =
            run_in_order(deliveries(&scenario(), &partitioner(), &config), &order, config);
        assert_eq!(outcome, expected, "order {order:?}");
        assert_eq!(unresolved, 0, "order {order:?}");
    }
}

#[test]
fn test_every_fragment_order_gives_the_same_outcome() {
    let config = DedupConfig::default();
    let expected = expected_scenario_outcome();
    let build = || split_supplementaries(deliveries(&scenario(), &partitioner(), &config));
    let n = build().len();
    assert_eq!(n, 7);

    for order in permutations(n) {
        let (outcome, unresolved) = run_in_order(build(), &order, config);
        assert_eq!(outcome, expected, "order {order:?}");
        assert_eq!(unresolved, 0, "order {order:?}");
    }
}

#[test]
fn test_supplementary_inherits_status_in_both_orders() {
    let config = DedupConfig::default();
    let reads = vec![
        lower_read("d", 300, 400, 40).supplementary_alignment(sa(2500)).build().unwrap(),
        upper_read("d", 400, "10M", 300, 40).build().unwrap(),
        supplementary_record("d", 2500, 400, 300),
    ];
    let build = || deliveries(&reads, &partitioner(), &config);
    assert_eq!(build().len(), 2);

    for order in [[0, 1], [1, 0]] {
        let (outcome, unresolved) = run_in_order(build(), &order, config);
        assert_eq!(unresolved, 0);
        assert_eq!(statuses_of(&outcome, "d"), vec!["NONE", "NONE", "NONE"], "order {order:?}");
        assert!(outcome.contains_key(&("d".to_string(), 2500, true)));
    }
}

#[test]
fn test_three_candidates_with_two_matching_mates() {
    let config = DedupConfig::default();
    // Reverse mates ending at 1209, 1209 and 1211
    let reads = vec![
        lower_read("t1", 100, 1200, 40).build().unwrap(),
        lower_read("t2", 100, 1201, 30).build().unwrap(),
        lower_read("t3", 100, 1202, 35).build().unwrap(),
        upper_read("t1", 1200, "10M", 100, 40).build().unwrap(),
        upper_read("t2", 1201, "9M", 100, 30).build().unwrap(),
        upper_read("t3", 1202, "10M", 100, 35).build().unwrap(),
    ];
    let build = || split_supplementaries(deliveries(&reads, &partitioner(), &config));
    assert_eq!(build().len(), 4);

    for order in permutations(4) {
        let combiner = GroupCombiner::new(FragmentCollector::new(), config);
        let mut slots: Vec<_> = build().into_iter().map(Some).collect();
        for &i in &order {
            slots[i].take().unwrap().deliver(&combiner);
        }
        assert!(combiner.partition_cache("chr1_0").lock().incomplete_fragments().is_empty());
        assert!(combiner.partition_cache("chr1_0").lock().candidate_duplicates().is_empty());
        assert!(combiner.finish().is_empty());

        let outcome = outcome(&combiner.into_writer().into_fragments());
        assert_eq!(statuses_of(&outcome, "t1"), vec!["PRIMARY", "PRIMARY"], "order {order:?}");
        assert_eq!(statuses_of(&outcome, "t2"), vec!["DUPLICATE", "DUPLICATE"]);
        assert_eq!(statuses_of(&outcome, "t3"), vec!["NONE", "NONE"]);
        assert_eq!(outcome[&("t1".to_string(), 100, false)].1, 1);
    }
}

#[test]
fn test_missing_mate_falls_back_to_none() {
    let config = DedupConfig::default();
    // The mate of `y` is never delivered
    let mut reads = pair("x", 100, 1500, 40);
    reads.push(lower_read("y", 100, 1500, 30).build().unwrap());

    let build = || deliveries(&reads, &partitioner(), &config);
    let n = build().len();
    for order in permutations(n) {
        let (outcome, unresolved) = run_in_order(build(), &order, config);
        assert_eq!(unresolved, 2, "order {order:?}");
        assert_eq!(statuses_of(&outcome, "x"), vec!["NONE", "NONE"]);
        assert_eq!(statuses_of(&outcome, "y"), vec!["NONE"]);
    }
}

/// Random templates with duplicates, remote mates and supplementary alignments.
fn random_reads(seed: u64, templates: usize) -> Vec<Read> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut reads = Vec::new();
    for i in 0..templates {
        let name = format!("t{i:04}");
        let lower = rng.gen_range(1..100u32) * 50;
        let upper = lower + rng.gen_range(2..20u32) * 50;
        let qual = rng.gen_range(20..41u8);

        let mut first = lower_read(&name, lower, upper, qual);
        if rng.gen_bool(0.3) {
            first = first.mate_cigar("10M");
        }
        if rng.gen_bool(0.2) {
            let supp_pos = rng.gen_range(1..120u32) * 50;
            first = first.supplementary_alignment(sa(supp_pos));
            reads.push(supplementary_record(&name, supp_pos, upper, lower));
        }
        reads.push(first.build().unwrap());
        reads.push(upper_read(&name, upper, "10M", lower, qual).build().unwrap());
    }
    reads
}

#[test]
fn test_concurrent_delivery_matches_sequential() {
    let config = DedupConfig::default();
    let partitioner = Partitioner::new(500).unwrap();

    for seed in 0..5 {
        let reads = random_reads(seed, 400);
        let build = || split_supplementaries(deliveries(&reads, &partitioner, &config));
        let sequential: Vec<usize> = (0..build().len()).collect();
        let (expected, unresolved) = run_in_order(build(), &sequential, config);
        assert_eq!(unresolved, 0);
        assert_eq!(expected.len(), reads.len());

        // Every template has one status across all of its reads
        let mut by_template: BTreeMap<&str, (&str, usize)> = BTreeMap::new();
        for ((name, _, _), (status, dc)) in &expected {
            let prior = by_template.insert(name.as_str(), (status.as_str(), *dc));
            assert!(prior.is_none_or(|p| p == (status.as_str(), *dc)), "template {name}");
        }
        // Each primary accounts for exactly its duplicates
        let duplicates = by_template.values().filter(|(s, _)| *s == "DUPLICATE").count();
        let collapsed: usize =
            by_template.values().filter(|(s, _)| *s == "PRIMARY").map(|(_, dc)| dc).sum();
        assert_eq!(duplicates, collapsed);
        assert!(duplicates > 0);

        let mut rng = StdRng::seed_from_u64(seed + 100);
        let mut shuffled = build();
        shuffled.shuffle(&mut rng);
        let combiner = GroupCombiner::new(FragmentCollector::new(), config);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(8).build().unwrap();
        pool.install(|| shuffled.into_par_iter().for_each(|d| d.deliver(&combiner)));
        assert!(combiner.finish().is_empty());

        let actual = outcome(&combiner.into_writer().into_fragments());
        assert_eq!(actual, expected, "seed {seed}");
    }
}

/// Two pairs whose forward reads share the unclipped start 985 but whose alignment starts
/// (995 and 1005) fall on either side of a partition edge.
fn clipped_across_edge(with_mate_cigar: bool) -> Vec<Read> {
    let mut reads = Vec::new();
    for (name, pos, cigar, qual) in [("a", 995, "10S10M", 40), ("b", 1005, "20S10M", 30)] {
        let mut lower = lower_read(name, pos, 1200, qual).cigar(cigar);
        let mut upper = upper_read(name, 1200, "10M", pos, qual);
        if with_mate_cigar {
            lower = lower.mate_cigar("10M");
            upper = upper.mate_cigar(cigar);
        }
        reads.push(lower.build().unwrap());
        reads.push(upper.build().unwrap());
    }
    reads
}

#[test]
fn test_clipped_duplicates_across_partition_edge() {
    let config = DedupConfig::default();
    for with_mate_cigar in [false, true] {
        let reads = clipped_across_edge(with_mate_cigar);
        assert_eq!(partitioner().partition_of(&reads[2]), "chr1_0");

        let build = || split_supplementaries(deliveries(&reads, &partitioner(), &config));
        let n = build().len();
        for order in permutations(n) {
            let (outcome, unresolved) = run_in_order(build(), &order, config);
            assert_eq!(unresolved, 0, "MC {with_mate_cigar}, order {order:?}");
            assert_eq!(statuses_of(&outcome, "a"), vec!["PRIMARY", "PRIMARY"]);
            assert_eq!(
                statuses_of(&outcome, "b"),
                vec!["DUPLICATE", "DUPLICATE"],
                "MC {with_mate_cigar}, order {order:?}"
            );
        }
    }
}

#[test]
fn test_mates_starting_apart_with_same_ends_across_partitions() {
    let config = DedupConfig::default();
    // Both reverse mates end at 1003, one partition past their forward mates at 995
    let mut reads = Vec::new();
    for (name, mate_pos, mate_cigar, qual) in [("a", 994, "10M", 40), ("b", 996, "8M", 30)] {
        reads.push(lower_read(name, 995, mate_pos, qual).mate_cigar(mate_cigar).build().unwrap());
        reads.push(
            upper_read(name, mate_pos, mate_cigar, 995, qual).mate_cigar("10M").build().unwrap(),
        );
    }

    let build = || split_supplementaries(deliveries(&reads, &partitioner(), &config));
    let n = build().len();
    assert_eq!(n, 3);
    for order in permutations(n) {
        let (outcome, unresolved) = run_in_order(build(), &order, config);
        assert_eq!(unresolved, 0);
        assert_eq!(statuses_of(&outcome, "a"), vec!["PRIMARY", "PRIMARY"], "order {order:?}");
        assert_eq!(statuses_of(&outcome, "b"), vec!["DUPLICATE", "DUPLICATE"], "order {order:?}");
    }
}

#[test]
fn test_recorded_statuses_are_dropped_once_templates_complete() {
    let config = DedupConfig::default();
    let build = || split_supplementaries(deliveries(&scenario(), &partitioner(), &config));
    let n = build().len();

    for order in permutations(n) {
        let combiner = GroupCombiner::new(FragmentCollector::new(), config);
        let mut slots: Vec<_> = build().into_iter().map(Some).collect();
        for &i in &order {
            slots[i].take().unwrap().deliver(&combiner);
        }
        for name in combiner.partition_names() {
            let cache = combiner.partition_cache(&name);
            assert_eq!(cache.lock().recorded_status_count(), 0, "{name}, order {order:?}");
        }
    }

    // A mate that never arrives leaves its template's status behind
    let reads = vec![lower_read("c", 200, 1600, 35).mate_cigar("10M").build().unwrap()];
    let combiner = GroupCombiner::new(FragmentCollector::new(), config);
    for delivery in deliveries(&reads, &partitioner(), &config) {
        delivery.deliver(&combiner);
    }
    assert_eq!(combiner.partition_cache("chr1_0").lock().recorded_status_count(), 1);
}
