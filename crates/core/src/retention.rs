//! Version retention policy.

use serde::{Deserialize, Serialize};

/// Decides which historical versions of a document are discarded.
///
/// The policy keeps the `retained` most recent versions. It performs no I/O.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    retained: u32,
}

impl RetentionPolicy {
    /// Create a policy keeping the given number of versions (at least one).
    pub fn new(retained: u32) -> Self {
        Self {
            retained: retained.max(1),
        }
    }

    /// Number of versions kept per document.
    pub fn retained(&self) -> u32 {
        self.retained
    }

    /// Lowest version number that survives pruning once `current` is the latest.
    ///
    /// Always at least 1 and never greater than `current`.
    pub fn keep_from(&self, current: i64) -> i64 {
        (current - i64::from(self.retained) + 1).max(1)
    }

    /// Whether a new `current` version pushes older versions out of the window.
    pub fn should_prune(&self, current: i64) -> bool {
        current > i64::from(self.retained)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(crate::DEFAULT_RETAINED_VERSIONS)
    }
}
