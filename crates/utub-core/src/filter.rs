//! Tag filter for the URL deck.
//!
//! Selecting tags narrows the visible URLs to rows carrying every selected
//! tag. Filtering only toggles a class on existing rows; it never adds or
//! removes elements.

use std::collections::BTreeSet;

use crate::model::TagId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    selected: BTreeSet<TagId>,
}

impl TagFilter {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            selected: BTreeSet::new(),
        }
    }

    /// Flip `tag` in or out of the selection; returns whether it is now
    /// selected.
    pub fn toggle(&mut self, tag: TagId) -> bool {
        if self.selected.remove(&tag) {
            false
        } else {
            self.selected.insert(tag);
            true
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Drop selected tags that are no longer in `known`. Returns the dropped
    /// tags.
    pub fn retain_known(&mut self, known: &BTreeSet<TagId>) -> Vec<TagId> {
        let dropped: Vec<TagId> = self.selected.difference(known).copied().collect();
        for tag in &dropped {
            self.selected.remove(tag);
        }
        dropped
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.selected.is_empty()
    }

    #[must_use]
    pub const fn selected(&self) -> &BTreeSet<TagId> {
        &self.selected
    }

    /// Whether a URL with `tags` passes the filter.
    #[must_use]
    pub fn admits(&self, tags: &BTreeSet<TagId>) -> bool {
        self.selected.is_subset(tags)
    }
}
