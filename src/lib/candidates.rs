//! Candidate duplicate groups awaiting mate information.

use crate::fragment::Fragment;
use crate::position::ReadEnd;

/// Fragments sharing a lower-read end that cannot be classified yet.
///
/// At least one member lacked mate information when the group was formed. The group is
/// resolved once every member holds both primary reads of its pair; until then every member
/// stays `Unclear`.
#[derive(Debug, Clone)]
pub struct CandidateDuplicates {
    key: ReadEnd,
    fragments: Vec<Fragment>,
}

impl CandidateDuplicates {
    #[must_use]
    pub fn new(key: ReadEnd, fragments: Vec<Fragment>) -> Self {
        Self { key, fragments }
    }

    /// The shared lower-read end.
    #[must_use]
    pub fn key(&self) -> &ReadEnd {
        &self.key
    }

    #[must_use]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    #[must_use]
    pub fn into_fragments(self) -> Vec<Fragment> {
        self.fragments
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Template names of the members, in member order.
    pub fn template_names(&self) -> impl Iterator<Item = &str> {
        self.fragments.iter().map(Fragment::id)
    }

    #[must_use]
    pub fn contains(&self, template: &str) -> bool {
        self.fragments.iter().any(|f| f.id() == template)
    }

    /// True once no member is still waiting for its mate's primary read.
    #[must_use]
    pub fn is_resolvable(&self) -> bool {
        self.fragments.iter().all(|f| !f.is_awaiting_mate())
    }

    /// Appends the members of another group with the same key.
    pub fn extend(&mut self, other: CandidateDuplicates) {
        debug_assert_eq!(self.key, other.key);
        self.fragments.extend(other.fragments);
    }

    /// Merges a partial fragment into the member of the same template.
    ///
    /// Returns the fragment back if no member matches.
    pub fn merge_into_member(&mut self, fragment: Fragment) -> Option<Fragment> {
        match self.fragments.iter_mut().find(|f| f.id() == fragment.id()) {
            Some(member) => {
                member.merge(fragment);
                None
            }
            None => Some(fragment),
        }
    }
}
