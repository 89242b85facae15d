// Copyright (c) 2025, Fulcrum Genomics LLC
// All rights reserved.

//! # UMI Clustering
//!
//! Groups the fragments observed at one position signature into UMI-consensus groups, so
//! that a sequencing error in a UMI does not split one set of true duplicates into several.
//!
//! ## Algorithm
//!
//! 1. Malformed UMIs (empty, non-nucleotide) are set aside; each becomes its own group.
//! 2. Identical UMIs (case-insensitive) are collapsed into clusters with a member count.
//! 3. Clusters are ordered by decreasing count, then by sequence so that the result does
//!    not depend on input order.
//! 4. Each unassigned cluster becomes a root. A breadth-first walk grows the root's group
//!    over every unassigned cluster whose UMI is within `permitted_diff` mismatches of a
//!    cluster already in the group, so similarity is transitive.
//! 5. A merge is suppressed when the growing group *and* the candidate cluster both hold at
//!    least `large_group_size` fragments. Two well supported molecules never collapse into
//!    each other on a borderline match, which stops chains of marginal similarity from
//!    swallowing unrelated UMIs.
//!
//! This is the same breadth-first capture used by the directed adjacency method of
//! Smith et al. (2017), with the count gradient replaced by the large-group guard.

use std::collections::VecDeque;

use ahash::AHashMap;

use crate::{DEFAULT_PERMITTED_UMI_DIFF, exceeds_umi_id_diff, validate_umi};

/// Default size at which a UMI group is considered well supported.
pub const DEFAULT_LARGE_GROUP_SIZE: usize = 5;

/// Parameters for UMI clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UmiClusterConfig {
    /// Maximum number of mismatching bases for two UMIs to be grouped
    pub permitted_diff: usize,
    /// Number of fragments at which a group no longer absorbs another large cluster
    pub large_group_size: usize,
}

impl Default for UmiClusterConfig {
    fn default() -> Self {
        Self {
            permitted_diff: DEFAULT_PERMITTED_UMI_DIFF,
            large_group_size: DEFAULT_LARGE_GROUP_SIZE,
        }
    }
}

/// A UMI-consensus group.
///
/// Members are indices into the slice of UMIs passed to [`build_umi_groups`], in ascending
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UmiGroup {
    /// Representative UMI (the most abundant sequence in the group)
    pub umi: String,
    /// Indices of the member fragments
    pub members: Vec<usize>,
    /// Number of member fragments
    pub fragment_count: usize,
}

impl UmiGroup {
    fn new(umi: String, mut members: Vec<usize>) -> Self {
        members.sort_unstable();
        let fragment_count = members.len();
        Self { umi, members, fragment_count }
    }
}

/// A run of identical UMIs.
struct Cluster {
    umi: String,
    members: Vec<usize>,
}

/// Clusters UMIs into consensus groups.
///
/// `umis[i]` is the UMI of fragment `i`. The returned groups are disjoint, cover every
/// index exactly once, and their `fragment_count`s sum to `umis.len()`.
///
/// # Examples
///
/// ```
/// use fgdedup_umi::{UmiClusterConfig, build_umi_groups};
///
/// let umis = ["TATCGC", "TATCGC", "TATCGG", "GGGGGG"];
/// let groups = build_umi_groups(&umis, &UmiClusterConfig::default());
/// assert_eq!(groups.len(), 2);
/// assert_eq!(groups[0].members, vec![0, 1, 2]);
/// assert_eq!(groups[1].members, vec![3]);
/// ```
#[must_use]
pub fn build_umi_groups<S: AsRef<str>>(umis: &[S], config: &UmiClusterConfig) -> Vec<UmiGroup> {
    let mut by_umi: AHashMap<String, Vec<usize>> = AHashMap::with_capacity(umis.len());
    let mut malformed: Vec<UmiGroup> = Vec::new();

    for (idx, umi) in umis.iter().enumerate() {
        let umi = umi.as_ref();
        if validate_umi(umi).is_valid() {
            by_umi.entry(umi.to_ascii_uppercase()).or_default().push(idx);
        } else {
            malformed.push(UmiGroup::new(umi.to_string(), vec![idx]));
        }
    }

    let mut clusters: Vec<Cluster> =
        by_umi.into_iter().map(|(umi, members)| Cluster { umi, members }).collect();
    clusters.sort_by(|a, b| b.members.len().cmp(&a.members.len()).then_with(|| a.umi.cmp(&b.umi)));

    let mut groups = Vec::with_capacity(clusters.len() + malformed.len());
    let mut assigned = vec![false; clusters.len()];
    let mut queue = VecDeque::new();

    for root in 0..clusters.len() {
        if assigned[root] {
            continue;
        }

        assigned[root] = true;
        let mut members = clusters[root].members.clone();
        queue.push_back(root);

        while let Some(idx) = queue.pop_front() {
            for child in 0..clusters.len() {
                if assigned[child] {
                    continue;
                }
                if exceeds_umi_id_diff(&clusters[idx].umi, &clusters[child].umi, config.permitted_diff)
                {
                    continue;
                }
                if members.len() >= config.large_group_size
                    && clusters[child].members.len() >= config.large_group_size
                {
                    continue;
                }

                assigned[child] = true;
                members.extend_from_slice(&clusters[child].members);
                queue.push_back(child);
            }
        }

        groups.push(UmiGroup::new(clusters[root].umi.clone(), members));
    }

    groups.extend(malformed);
    groups
}
