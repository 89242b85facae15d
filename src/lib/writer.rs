//! Sinks for finalized fragments.

use parking_lot::Mutex;

use crate::fragment::{Fragment, FragmentStatus};

/// Receives each finalized fragment exactly once.
///
/// Called from multiple partition workers concurrently, never while a partition lock is held.
pub trait RecordWriter: Send + Sync {
    fn write_fragment(&self, fragment: Fragment);
}

/// A [`RecordWriter`] that keeps every fragment in memory, in arrival order.
#[derive(Debug, Default)]
pub struct FragmentCollector {
    fragments: Mutex<Vec<Fragment>>,
}

impl FragmentCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.lock().is_empty()
    }

    /// Runs `f` over the fragments collected so far.
    pub fn with_fragments<R>(&self, f: impl FnOnce(&[Fragment]) -> R) -> R {
        f(&self.fragments.lock())
    }

    /// Consumes the collector, returning the fragments in arrival order.
    #[must_use]
    pub fn into_fragments(self) -> Vec<Fragment> {
        self.fragments.into_inner()
    }
}

impl RecordWriter for FragmentCollector {
    fn write_fragment(&self, fragment: Fragment) {
        self.fragments.lock().push(fragment);
    }
}

/// Per-read output tags derived from a fragment's final state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTags {
    /// Set the SAM duplicate flag
    pub duplicate: bool,
    /// `DC`: number of duplicates collapsed into this primary
    pub duplicate_count: Option<usize>,
    /// `RX`-style UMI group representative
    pub umi_group: Option<String>,
}

impl OutputTags {
    /// Tags applied to every read of `fragment`.
    #[must_use]
    pub fn for_fragment(fragment: &Fragment) -> Self {
        let status = fragment.status();
        Self {
            duplicate: status == FragmentStatus::Duplicate,
            duplicate_count: (status == FragmentStatus::Primary)
                .then_some(fragment.duplicate_count()),
            umi_group: fragment.umi_group().map(str::to_string),
        }
    }
}
