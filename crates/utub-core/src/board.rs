//! The page-level owner of the document and its decks.
//!
//! A [`Board`] shows one selected UTub at a time:
//!
//! ```text
//! <body>
//!   <ul id="utubs-deck">     one entry per UTub, the active one marked
//!   <h2 id="utub-name">
//!   <div id="owner-slot">    the owner badge, rendered once per selection
//!   <ul id="members-deck">   every other member
//!   <ul id="tags-deck">
//!   <ul id="urls-deck">
//! ```
//!
//! Callers fetch, then hand the response to the board together with the
//! [`RefreshToken`] issued when the fetch started. Responses whose token has
//! been superseded are discarded without touching the document.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EffectiveConfig;
use crate::deck::render::{
    self, ACTIVE_CLASS, HIDDEN_CLASS, SELECTED_CLASS, URL_TAG_CHIP_CLASS, URL_TAG_IDS_ATTR,
    URL_TAGS_CLASS,
};
use crate::deck::{
    Deck, DeckKind, DeckReport, ExitTransition, Members, RemoveOutcome, RenderContext,
    RenderError, RenderHooks, Tags, Urls, Utubs, extract,
};
use crate::error::ErrorCode;
use crate::filter::TagFilter;
use crate::model::{
    Member, MemberId, Tag, TagId, Url, UrlId, UrlPayload, UtubId, UtubPayload,
    UtubSummaryPayload,
};
use crate::refresh::{RefreshGuard, RefreshToken};
use crate::view::{Document, ElementHandle, ViewError};

pub const UTUB_NAME_ID: &str = "utub-name";
pub const OWNER_SLOT_ID: &str = "owner-slot";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("no UTub is selected")]
    NoActiveUtub,

    #[error(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl BoardError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NoActiveUtub => ErrorCode::NoActiveUtub,
            Self::Render(RenderError::Malformed(_)) => ErrorCode::MalformedEntity,
            Self::View(ViewError::StaleHandle(_))
            | Self::Render(RenderError::View(ViewError::StaleHandle(_))) => {
                ErrorCode::StaleReference
            }
            Self::View(_) | Self::Render(RenderError::View(_)) => ErrorCode::InternalUnexpected,
        }
    }
}

/// Why a response was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// A newer refresh was issued after this one.
    Superseded,
    /// The response is for a UTub other than the active one.
    NotActive,
}

/// Per-deck results of one applied snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotReport {
    pub token: RefreshToken,
    pub urls: DeckReport<UrlId>,
    pub tags: DeckReport<TagId>,
    pub members: DeckReport<MemberId>,
    /// Owner badge rendered by this snapshot, if the slot was empty.
    pub owner_rendered: Option<MemberId>,
    /// Filter tags dropped because their tag left the deck.
    pub dropped_filters: Vec<TagId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SnapshotOutcome {
    Applied(SnapshotReport),
    Discarded { reason: DiscardReason },
}

/// Result of a single-URL refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlOutcome {
    /// The existing row was rewritten in place.
    Updated,
    /// The existing row already matched.
    Unchanged,
    Appended,
    /// The row is exiting; the refetch is ignored.
    Deferred,
    Discarded(DiscardReason),
    /// The payload failed validation and was skipped.
    Malformed,
}

/// A fetch that failed while its token was current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub token: RefreshToken,
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug)]
pub struct Board {
    doc: Document,
    utubs: Deck<Utubs>,
    urls: Deck<Urls>,
    tags: Deck<Tags>,
    members: Deck<Members>,
    name_slot: ElementHandle,
    owner_slot: ElementHandle,
    owner: Option<MemberId>,
    guard: RefreshGuard,
    filter: TagFilter,
    active: Option<UtubId>,
    tag_names: BTreeMap<TagId, String>,
    hooks: RenderHooks,
    last_failure: Option<FetchFailure>,
}

fn context<'a>(
    active: Option<UtubId>,
    tag_names: &'a BTreeMap<TagId, String>,
    filter: &'a TagFilter,
    hooks: &'a RenderHooks,
) -> RenderContext<'a> {
    RenderContext {
        active_utub: active,
        tag_names,
        selected_tags: filter.selected(),
        hooks,
    }
}

impl Board {
    /// Build an empty board using the configured exit transition.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::View`] if the layout cannot be created.
    pub fn new(config: &EffectiveConfig, hooks: RenderHooks) -> Result<Self, BoardError> {
        Self::with_transition(config.exit_transition(), hooks)
    }

    /// # Errors
    ///
    /// Returns [`BoardError::View`] if the layout cannot be created.
    pub fn with_transition(
        transition: ExitTransition,
        hooks: RenderHooks,
    ) -> Result<Self, BoardError> {
        let mut doc = Document::new();
        let body = doc.body();
        let utubs = Deck::mount(&mut doc, body, transition)?;
        let name_slot = slot(&mut doc, body, "h2", UTUB_NAME_ID)?;
        let owner_slot = slot(&mut doc, body, "div", OWNER_SLOT_ID)?;
        let members = Deck::mount(&mut doc, body, transition)?;
        let tags = Deck::mount(&mut doc, body, transition)?;
        let urls = Deck::mount(&mut doc, body, transition)?;

        Ok(Self {
            doc,
            utubs,
            urls,
            tags,
            members,
            name_slot,
            owner_slot,
            owner: None,
            guard: RefreshGuard::new(),
            filter: TagFilter::new(),
            active: None,
            tag_names: BTreeMap::new(),
            hooks,
            last_failure: None,
        })
    }

    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.doc
    }

    #[must_use]
    pub const fn active_utub(&self) -> Option<UtubId> {
        self.active
    }

    #[must_use]
    pub const fn owner(&self) -> Option<MemberId> {
        self.owner
    }

    #[must_use]
    pub const fn filter(&self) -> &TagFilter {
        &self.filter
    }

    #[must_use]
    pub const fn last_failure(&self) -> Option<&FetchFailure> {
        self.last_failure.as_ref()
    }

    /// Name of the active UTub as last reported by the server.
    #[must_use]
    pub fn utub_name(&self) -> &str {
        self.doc.text(self.name_slot).unwrap_or_default()
    }

    #[must_use]
    pub const fn urls(&self) -> &Deck<Urls> {
        &self.urls
    }

    #[must_use]
    pub const fn tags(&self) -> &Deck<Tags> {
        &self.tags
    }

    #[must_use]
    pub const fn members(&self) -> &Deck<Members> {
        &self.members
    }

    #[must_use]
    pub const fn utubs(&self) -> &Deck<Utubs> {
        &self.utubs
    }

    /// Indented outline of the whole board.
    #[must_use]
    pub fn outline(&self) -> String {
        self.doc.render_tree(self.doc.body())
    }

    /// Reconcile the UTub selector. If the active UTub is no longer listed
    /// it is deselected and its decks are cleared.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::View`] if the document rejects a mutation.
    pub fn apply_utub_list(
        &mut self,
        list: &[UtubSummaryPayload],
        now: Instant,
    ) -> Result<DeckReport<UtubId>, BoardError> {
        let ctx = context(self.active, &self.tag_names, &self.filter, &self.hooks);
        let report = self.utubs.reconcile(&mut self.doc, list, &ctx, now)?;

        if let Some(active) = self.active {
            if !self.utubs.ids(&self.doc)?.contains(&active) {
                info!(utub = %active, "active UTub no longer listed; deselecting");
                self.deselect()?;
            }
        }
        Ok(report)
    }

    /// Make `utub` the active UTub and start loading it. The URL, tag and
    /// member decks are emptied immediately; the returned token must
    /// accompany the snapshot fetched for it.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::View`] if the document rejects a mutation.
    pub fn select_utub(&mut self, utub: UtubId) -> Result<RefreshToken, BoardError> {
        self.reset_active_view()?;
        self.active = Some(utub);
        self.mark_active_entry()?;
        let token = self.guard.issue(utub);
        debug!(%token, "UTub selected");
        Ok(token)
    }

    /// Issue a token for refreshing the active UTub.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::NoActiveUtub`] when nothing is selected.
    pub fn begin_refresh(&mut self) -> Result<RefreshToken, BoardError> {
        let utub = self.active.ok_or(BoardError::NoActiveUtub)?;
        Ok(self.guard.issue(utub))
    }

    fn discard_reason(&self, token: RefreshToken) -> Option<DiscardReason> {
        if !self.guard.is_current(token) {
            Some(DiscardReason::Superseded)
        } else if self.active != Some(token.utub) {
            Some(DiscardReason::NotActive)
        } else {
            None
        }
    }

    /// Apply a full snapshot of the active UTub.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::View`] if the document rejects a mutation.
    pub fn apply_snapshot(
        &mut self,
        token: RefreshToken,
        snapshot: &UtubPayload,
        now: Instant,
    ) -> Result<SnapshotOutcome, BoardError> {
        let reason = self.discard_reason(token).or_else(|| {
            (snapshot.id != Some(token.utub.get())).then_some(DiscardReason::NotActive)
        });
        if let Some(reason) = reason {
            debug!(%token, ?reason, "discarding snapshot");
            return Ok(SnapshotOutcome::Discarded { reason });
        }

        self.tag_names = tag_names(&snapshot.tags);
        let known: BTreeSet<TagId> = self.tag_names.keys().copied().collect();
        let dropped_filters = self.filter.retain_known(&known);

        let ctx = context(self.active, &self.tag_names, &self.filter, &self.hooks);
        let tags = self.tags.reconcile(&mut self.doc, &snapshot.tags, &ctx, now)?;
        let urls = self.urls.reconcile(&mut self.doc, &snapshot.urls, &ctx, now)?;
        let regular: Vec<_> = snapshot
            .members
            .iter()
            .filter(|member| !member.is_owner)
            .cloned()
            .collect();
        let members = self.members.reconcile(&mut self.doc, &regular, &ctx, now)?;
        let owner_rendered = self.apply_owner(snapshot)?;

        if let Some(name) = snapshot.name.as_deref() {
            self.doc.set_text(self.name_slot, name)?;
        }
        self.apply_filter_classes()?;
        self.last_failure = None;

        Ok(SnapshotOutcome::Applied(SnapshotReport {
            token,
            urls,
            tags,
            members,
            owner_rendered,
            dropped_filters,
        }))
    }

    /// Render the owner badge the first time a snapshot names an owner. The
    /// owner is fixed for the lifetime of a selection.
    fn apply_owner(&mut self, snapshot: &UtubPayload) -> Result<Option<MemberId>, BoardError> {
        let mut owners = snapshot.members.iter().filter(|member| member.is_owner);
        let Some(payload) = owners.next() else {
            return Ok(None);
        };
        if owners.next().is_some() {
            warn!(utub = ?snapshot.id, "snapshot lists several owners; using the first");
        }
        let owner = match Member::decode(payload) {
            Ok(owner) => owner,
            Err(err) => {
                warn!(%err, "skipping malformed owner");
                return Ok(None);
            }
        };

        match self.owner {
            Some(current) if current == owner.id => Ok(None),
            Some(current) => {
                warn!(current = %current, reported = %owner.id, "owner changed mid-selection; keeping current badge");
                Ok(None)
            }
            None => {
                let badge = render::render_owner_badge(&mut self.doc, &owner)?;
                self.doc.append_child(self.owner_slot, badge)?;
                self.owner = Some(owner.id);
                Ok(Some(owner.id))
            }
        }
    }

    /// Apply a single refetched URL.
    ///
    /// An existing row is rewritten in place; a missing one is appended. A
    /// row that is exiting stays on its way out.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::View`] if the document rejects a mutation.
    pub fn apply_url(
        &mut self,
        token: RefreshToken,
        payload: &UrlPayload,
    ) -> Result<UrlOutcome, BoardError> {
        if let Some(reason) = self.discard_reason(token) {
            debug!(%token, ?reason, "discarding url refetch");
            return Ok(UrlOutcome::Discarded(reason));
        }
        let url = match Url::decode(payload) {
            Ok(url) => url,
            Err(err) => {
                warn!(%err, "skipping malformed url refetch");
                return Ok(UrlOutcome::Malformed);
            }
        };

        let ctx = context(self.active, &self.tag_names, &self.filter, &self.hooks);
        match self.urls.find(&self.doc, url.id)? {
            Some(found) if found.exiting => Ok(UrlOutcome::Deferred),
            Some(found) => {
                let changed = render::update_url_row(&mut self.doc, found.handle, &url, &ctx)?;
                Ok(if changed {
                    UrlOutcome::Updated
                } else {
                    UrlOutcome::Unchanged
                })
            }
            None => {
                self.urls.append(&mut self.doc, &url, &ctx)?;
                Ok(UrlOutcome::Appended)
            }
        }
    }

    /// Remove a URL after the server confirmed its deletion.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::View`] if the document rejects a mutation.
    pub fn confirm_url_deleted(
        &mut self,
        url: UrlId,
        now: Instant,
    ) -> Result<RemoveOutcome, BoardError> {
        Ok(self.urls.remove(&mut self.doc, url, now)?)
    }

    /// Remove a tag after the server confirmed its deletion from the UTub.
    /// The tag is also stripped from every URL row and from the filter.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::View`] if the document rejects a mutation.
    pub fn confirm_tag_deleted(
        &mut self,
        tag: TagId,
        now: Instant,
    ) -> Result<RemoveOutcome, BoardError> {
        let outcome = self.tags.remove(&mut self.doc, tag, now)?;
        self.tag_names.remove(&tag);
        self.strip_tag_from_rows(tag)?;
        if self.filter.selected().contains(&tag) {
            self.filter.toggle(tag);
        }
        self.apply_filter_classes()?;
        Ok(outcome)
    }

    /// Remove a member after the server confirmed the removal.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::View`] if the document rejects a mutation.
    pub fn confirm_member_removed(
        &mut self,
        member: MemberId,
        now: Instant,
    ) -> Result<RemoveOutcome, BoardError> {
        if self.owner == Some(member) {
            warn!(%member, "the owner cannot be removed from a UTub");
            return Ok(RemoveOutcome::AlreadyAbsent);
        }
        Ok(self.members.remove(&mut self.doc, member, now)?)
    }

    /// Toggle `tag` in the URL filter. Returns whether it is now selected.
    /// Tags not shown in the tag deck are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::View`] if the document rejects a mutation.
    pub fn toggle_tag_filter(&mut self, tag: TagId) -> Result<bool, BoardError> {
        if !self.tags.ids(&self.doc)?.contains(&tag) {
            debug!(%tag, "ignoring filter toggle for a tag not on screen");
            return Ok(false);
        }
        let selected = self.filter.toggle(tag);
        self.apply_filter_classes()?;
        Ok(selected)
    }

    /// Record a failed fetch. The document is left as it was. Returns
    /// whether the failure belonged to the current refresh.
    pub fn fetch_failed(
        &mut self,
        token: RefreshToken,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> bool {
        if !self.guard.is_current(token) {
            debug!(%token, "ignoring failure of a superseded refresh");
            return false;
        }
        let message = message.into();
        warn!(%token, code = code.code(), %message, "refresh failed; keeping last view");
        self.last_failure = Some(FetchFailure {
            token,
            code,
            message,
        });
        true
    }

    /// Complete exit transitions due at `now`. Returns how many elements were
    /// detached.
    pub fn tick(&mut self, now: Instant) -> usize {
        self.utubs.tick(&mut self.doc, now)
            + self.urls.tick(&mut self.doc, now)
            + self.tags.tick(&mut self.doc, now)
            + self.members.tick(&mut self.doc, now)
    }

    /// Complete every pending exit transition now.
    pub fn settle(&mut self) -> usize {
        self.utubs.settle(&mut self.doc)
            + self.urls.settle(&mut self.doc)
            + self.tags.settle(&mut self.doc)
            + self.members.settle(&mut self.doc)
    }

    #[must_use]
    pub fn pending_exits(&self) -> usize {
        self.utubs.pending_exits()
            + self.urls.pending_exits()
            + self.tags.pending_exits()
            + self.members.pending_exits()
    }

    fn deselect(&mut self) -> Result<(), BoardError> {
        self.reset_active_view()?;
        self.active = None;
        self.guard.invalidate();
        Ok(())
    }

    fn reset_active_view(&mut self) -> Result<(), BoardError> {
        self.urls.clear(&mut self.doc)?;
        self.tags.clear(&mut self.doc)?;
        self.members.clear(&mut self.doc)?;
        self.doc.clear_children(self.owner_slot)?;
        self.doc.set_text(self.name_slot, "")?;
        self.owner = None;
        self.tag_names.clear();
        self.filter.clear();
        self.last_failure = None;
        Ok(())
    }

    fn mark_active_entry(&mut self) -> Result<(), BoardError> {
        for entry in extract::<Utubs>(&self.doc, self.utubs.container())? {
            self.doc
                .toggle_class(entry.handle, ACTIVE_CLASS, Some(entry.id) == self.active)?;
        }
        Ok(())
    }

    /// Sync `hidden` on URL rows and `selected` on tag badges with the
    /// current filter.
    fn apply_filter_classes(&mut self) -> Result<(), BoardError> {
        for row in extract::<Urls>(&self.doc, self.urls.container())? {
            let tags = render::row_tag_ids(&self.doc, row.handle);
            self.doc
                .toggle_class(row.handle, HIDDEN_CLASS, !self.filter.admits(&tags))?;
        }
        for badge in extract::<Tags>(&self.doc, self.tags.container())? {
            let selected = self.filter.selected().contains(&badge.id);
            self.doc.toggle_class(badge.handle, SELECTED_CLASS, selected)?;
        }
        Ok(())
    }

    fn strip_tag_from_rows(&mut self, tag: TagId) -> Result<(), BoardError> {
        let marker = tag.to_string();
        for row in extract::<Urls>(&self.doc, self.urls.container())? {
            let mut tags = render::row_tag_ids(&self.doc, row.handle);
            if !tags.remove(&tag) {
                continue;
            }
            let encoded = tags
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            self.doc.set_attribute(row.handle, URL_TAG_IDS_ATTR, encoded)?;

            let Some(chips) = render::child_with_class(&self.doc, row.handle, URL_TAGS_CLASS)
            else {
                continue;
            };
            let stale: Vec<ElementHandle> = self
                .doc
                .children(chips)?
                .iter()
                .copied()
                .filter(|chip| {
                    self.doc.has_class(*chip, URL_TAG_CHIP_CLASS).unwrap_or(false)
                        && self.doc.attribute(*chip, Tags::MARKER).ok().flatten()
                            == Some(marker.as_str())
                })
                .collect();
            for chip in stale {
                self.doc.detach(chip)?;
            }
        }
        Ok(())
    }
}

fn slot(
    doc: &mut Document,
    parent: ElementHandle,
    tag: &str,
    id: &str,
) -> Result<ElementHandle, ViewError> {
    let el = doc.create_element(tag);
    doc.set_attribute(el, "id", id)?;
    doc.append_child(parent, el)?;
    Ok(el)
}

/// Names of the valid tags in a snapshot. The first occurrence of an id
/// wins; invalid tags are left out (the tag deck logs them).
fn tag_names(tags: &[crate::model::TagPayload]) -> BTreeMap<TagId, String> {
    let mut names = BTreeMap::new();
    for tag in tags.iter().filter_map(|payload| Tag::decode(payload).ok()) {
        names.entry(tag.id).or_insert(tag.text);
    }
    names
}
