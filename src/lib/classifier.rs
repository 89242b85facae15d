//! Duplicate classification of fragments.
//!
//! Fragments sharing a position signature are duplicates of each other: exactly one becomes
//! the `Primary` (the one with the best base-quality score) and the rest `Duplicate`s. A
//! fragment alone at its signature is unique (`None`).
//!
//! Classification happens in two settings:
//!
//! - [`classify_fragments`] works on all fragments anchored in one partition. Fragments whose
//!   mate coordinates are unknown cannot be compared yet; when they share an anchor with
//!   other fragments the whole anchor group is held back as a [`CandidateDuplicates`].
//! - [`check_duplicate_fragment`] classifies fragments one at a time against a pool holding
//!   one representative per signature, for callers that do not partition.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::candidates::CandidateDuplicates;
use crate::config::{DedupConfig, QualityScoring};
use crate::fragment::{Fragment, FragmentStatus};
use crate::position::{PositionSignature, ReadEnd, calc_base_qual_total};
use crate::umi::build_fragment_umi_groups;

/// Classifies the fragments anchored in one partition.
///
/// Fragments are grouped on their anchor (the template's first end in sorted order). A group whose members all
/// have complete signatures is split by full signature and resolved at once. A group of two
/// or more with any incomplete member is emitted as a [`CandidateDuplicates`] with every
/// member `Unclear`. An incomplete fragment alone at its anchor has no possible duplicate and
/// resolves to `None`. Fragments without a mapped read are `None`.
pub fn classify_fragments(
    fragments: Vec<Fragment>,
    config: &DedupConfig,
    resolved: &mut Vec<Fragment>,
    candidates: &mut Vec<CandidateDuplicates>,
) {
    let mut by_anchor: BTreeMap<ReadEnd, Vec<(PositionSignature, Fragment)>> = BTreeMap::new();

    for mut fragment in fragments {
        match PositionSignature::from_fragment(&fragment) {
            Some(signature) => {
                by_anchor.entry(signature.anchor().clone()).or_default().push((signature, fragment));
            }
            None => {
                fragment.set_status(FragmentStatus::None);
                resolved.push(fragment);
            }
        }
    }

    for (anchor, group) in by_anchor {
        let pending = group.len() > 1 && group.iter().any(|(signature, _)| !signature.complete);
        if pending {
            let members = group
                .into_iter()
                .map(|(_, mut fragment)| {
                    fragment.set_status(FragmentStatus::Unclear);
                    fragment
                })
                .collect();
            candidates.push(CandidateDuplicates::new(anchor, members));
        } else {
            resolve_by_signature(group, config, resolved);
        }
    }
}

/// Resolves fragments that may span several signatures.
///
/// Members are split by full signature; each split is resolved with
/// [`resolve_duplicate_group`]. Used for anchor groups and for candidate groups whose mates
/// have all arrived.
pub fn resolve_fragments(fragments: Vec<Fragment>, config: &DedupConfig) -> Vec<Fragment> {
    let mut resolved = Vec::with_capacity(fragments.len());
    let mut keyed = Vec::with_capacity(fragments.len());
    for mut fragment in fragments {
        match PositionSignature::from_fragment(&fragment) {
            Some(signature) => keyed.push((signature, fragment)),
            None => {
                fragment.set_status(FragmentStatus::None);
                resolved.push(fragment);
            }
        }
    }
    resolve_by_signature(keyed, config, &mut resolved);
    resolved
}

fn resolve_by_signature(
    keyed: Vec<(PositionSignature, Fragment)>,
    config: &DedupConfig,
    resolved: &mut Vec<Fragment>,
) {
    let mut by_signature: BTreeMap<PositionSignature, Vec<Fragment>> = BTreeMap::new();
    for (signature, fragment) in keyed {
        by_signature.entry(signature).or_default().push(fragment);
    }
    for (_, mut fragments) in by_signature {
        resolve_duplicate_group(&mut fragments, config);
        resolved.append(&mut fragments);
    }
}

/// Marks a set of fragments sharing one signature.
///
/// Without UMIs one fragment becomes `Primary` with `duplicate_count` equal to the number of
/// others, which become `Duplicate`. With UMIs this is applied per UMI group and fragments
/// alone in their UMI group are `None`. A single fragment is `None`.
pub fn resolve_duplicate_group(fragments: &mut [Fragment], config: &DedupConfig) {
    let Some(umi) = &config.umi else {
        let all: Vec<usize> = (0..fragments.len()).collect();
        mark_primary_and_duplicates(fragments, &all, config);
        return;
    };

    for group in build_fragment_umi_groups(fragments, umi) {
        for &idx in &group.members {
            fragments[idx].set_umi_group(Some(group.umi.clone()));
        }
        mark_primary_and_duplicates(fragments, &group.members, config);
    }
}

fn mark_primary_and_duplicates(fragments: &mut [Fragment], members: &[usize], config: &DedupConfig) {
    if let [only] = members {
        fragments[*only].set_status(FragmentStatus::None);
        fragments[*only].set_duplicate_count(0);
        return;
    }

    let candidates = members.iter().map(|&idx| (idx, &fragments[idx]));
    let Some(primary) = select_primary(candidates, config.scoring, config.use_secondary_tie_break)
    else {
        return;
    };

    for &idx in members {
        let fragment = &mut fragments[idx];
        if idx == primary {
            fragment.set_status(FragmentStatus::Primary);
            fragment.set_duplicate_count(members.len() - 1);
        } else {
            fragment.set_status(FragmentStatus::Duplicate);
            fragment.set_duplicate_count(0);
        }
    }
}

/// Returns the index of the fragment with the best quality score.
///
/// Ties go to the smallest fragment identifier when `use_secondary_tie_break` is set, and to
/// the first fragment seen otherwise. Returns `None` for an empty slice.
#[must_use]
pub fn find_primary_fragment(
    fragments: &[Fragment],
    scoring: QualityScoring,
    use_secondary_tie_break: bool,
) -> Option<usize> {
    select_primary(fragments.iter().enumerate(), scoring, use_secondary_tie_break)
}

fn select_primary<'a>(
    candidates: impl Iterator<Item = (usize, &'a Fragment)>,
    scoring: QualityScoring,
    use_secondary_tie_break: bool,
) -> Option<usize> {
    let mut best: Option<(usize, &Fragment, f64)> = None;
    for (idx, fragment) in candidates {
        let score = calc_base_qual_total(fragment, scoring);
        let better = match &best {
            None => true,
            Some((_, current, current_score)) => match score.total_cmp(current_score) {
                Ordering::Greater => true,
                Ordering::Less => false,
                Ordering::Equal => use_secondary_tie_break && fragment.id() < current.id(),
            },
        };
        if better {
            best = Some((idx, fragment, score));
        }
    }
    best.map(|(idx, _, _)| idx)
}

/// Classifies one fragment against a pool holding one representative per signature.
///
/// - No pool member shares the signature: the fragment joins the pool and `None` is returned.
/// - The pool member scores at least as well: the new fragment becomes `Duplicate`, the member
///   becomes `Primary` with one more duplicate, and the new fragment is returned.
/// - The new fragment scores strictly better: it becomes `Primary` with the member's
///   duplicate count plus one and replaces it in the pool; the displaced member becomes
///   `Duplicate` and is returned.
///
/// The pool never gains an entry for a signature it already holds.
pub fn check_duplicate_fragment(
    mut new: Fragment,
    pool: &mut Vec<Fragment>,
    scoring: QualityScoring,
) -> Option<Fragment> {
    let signature = PositionSignature::from_fragment(&new);
    let existing = signature.as_ref().and_then(|signature| {
        pool.iter()
            .position(|f| PositionSignature::from_fragment(f).as_ref() == Some(signature))
    });

    let Some(idx) = existing else {
        pool.push(new);
        return None;
    };

    let existing_score = calc_base_qual_total(&pool[idx], scoring);
    let new_score = calc_base_qual_total(&new, scoring);

    if existing_score >= new_score {
        new.set_status(FragmentStatus::Duplicate);
        let primary = &mut pool[idx];
        primary.set_status(FragmentStatus::Primary);
        primary.increment_duplicate_count();
        Some(new)
    } else {
        let previous_count = pool[idx].duplicate_count();
        new.set_status(FragmentStatus::Primary);
        new.set_duplicate_count(previous_count + 1);
        let mut displaced = std::mem::replace(&mut pool[idx], new);
        displaced.set_status(FragmentStatus::Duplicate);
        displaced.set_duplicate_count(0);
        Some(displaced)
    }
}
