//! UMI grouping of fragments.
//!
//! Thin adapter between fragments and the `fgdedup-umi` clustering crate: the UMI of a
//! fragment is the last `:`-delimited token of its template name.

pub use fgdedup_umi::{
    UmiClusterConfig, UmiGroup, build_umi_groups, exceeds_umi_id_diff, extract_umi_id,
    validate_umi,
};

use crate::config::UmiConfig;
use crate::fragment::Fragment;

/// Clusters fragments into UMI-consensus groups.
///
/// Group members are indices into `fragments`.
#[must_use]
pub fn build_fragment_umi_groups(fragments: &[Fragment], config: &UmiConfig) -> Vec<UmiGroup> {
    let umis: Vec<&str> = fragments.iter().map(|f| extract_umi_id(f.id())).collect();
    build_umi_groups(&umis, &config.cluster_config())
}
