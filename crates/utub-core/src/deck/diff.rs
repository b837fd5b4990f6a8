//! Set difference between the identities on screen and the identities the
//! server just reported.

use std::collections::BTreeSet;

/// What has to change for a deck to match the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta<I: Ord> {
    /// On screen but no longer reported.
    pub to_remove: BTreeSet<I>,
    /// Reported but not on screen.
    pub to_add: BTreeSet<I>,
}

impl<I: Ord> Default for Delta<I> {
    fn default() -> Self {
        Self {
            to_remove: BTreeSet::new(),
            to_add: BTreeSet::new(),
        }
    }
}

impl<I: Ord + Copy> Delta<I> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }

    /// `old - to_remove + to_add`.
    #[must_use]
    pub fn apply(&self, old: &BTreeSet<I>) -> BTreeSet<I> {
        old.difference(&self.to_remove)
            .chain(self.to_add.iter())
            .copied()
            .collect()
    }
}

/// Compute the delta from `old` to `new`. Identities present in both sets
/// appear in neither half of the result.
#[must_use]
pub fn diff<I: Ord + Copy>(old: &BTreeSet<I>, new: &BTreeSet<I>) -> Delta<I> {
    Delta {
        to_remove: old.difference(new).copied().collect(),
        to_add: new.difference(old).copied().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[u64]) -> BTreeSet<u64> {
        ids.iter().copied().collect()
    }

    #[test]
    fn overlapping_sets() {
        let delta = diff(&set(&[1, 2, 3]), &set(&[2, 3, 4]));
        assert_eq!(delta.to_remove, set(&[1]));
        assert_eq!(delta.to_add, set(&[4]));
        assert_eq!(delta.apply(&set(&[1, 2, 3])), set(&[2, 3, 4]));
    }

    #[test]
    fn identical_sets_produce_empty_delta() {
        let delta = diff(&set(&[1, 2]), &set(&[2, 1]));
        assert!(delta.is_empty());
    }

    #[test]
    fn empty_old_adds_everything() {
        let delta = diff(&BTreeSet::new(), &set(&[5, 6]));
        assert!(delta.to_remove.is_empty());
        assert_eq!(delta.to_add, set(&[5, 6]));
    }

    #[test]
    fn empty_new_removes_everything() {
        let delta = diff(&set(&[5, 6]), &BTreeSet::new());
        assert_eq!(delta.to_remove, set(&[5, 6]));
        assert!(delta.to_add.is_empty());
        assert!(delta.apply(&set(&[5, 6])).is_empty());
    }
}
