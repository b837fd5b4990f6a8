//! Applying a fresh server list to a live deck container.
//!
//! The reconciler never rebuilds a deck. It reads what is on screen, diffs it
//! against the identities in the new payload, starts exits for what vanished
//! and appends what is new. Elements whose identity survives are not touched
//! at all: same handle, same position, same subscriptions.

use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, warn};

use super::DeckKind;
use super::diff::diff;
use super::extract::{Extracted, extract};
use super::render::{RenderContext, RenderError};
use super::transition::{ExitStart, ExitTransition, PendingExits};
use crate::model::EntityKind;
use crate::timing;
use crate::view::{Document, ElementHandle, ViewError};

/// Class carried by every deck container.
pub const DECK_CLASS: &str = "deck";

/// What one reconcile pass did to a deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeckReport<I> {
    pub kind: EntityKind,
    /// Appended this pass, in payload order.
    pub added: Vec<I>,
    /// Removal started this pass (detached, or exiting until the transition
    /// completes).
    pub removed: Vec<I>,
    pub retained: Vec<I>,
    /// Listed by the server while their element was still exiting. The exit
    /// wins; the next pass after it completes adds them back.
    pub deferred: Vec<I>,
    /// Payload entries skipped because they failed validation.
    pub malformed: usize,
}

impl<I> DeckReport<I> {
    #[must_use]
    pub const fn empty(kind: EntityKind) -> Self {
        Self {
            kind,
            added: Vec::new(),
            removed: Vec::new(),
            retained: Vec::new(),
            deferred: Vec::new(),
            malformed: 0,
        }
    }

    /// Nothing was added or removed.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Result of an explicit removal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveOutcome {
    Removed,
    Exiting,
    AlreadyExiting,
    /// No element carries the identity. The removal is already satisfied.
    AlreadyAbsent,
}

impl From<ExitStart> for RemoveOutcome {
    fn from(start: ExitStart) -> Self {
        match start {
            ExitStart::Detached => Self::Removed,
            ExitStart::Exiting => Self::Exiting,
            ExitStart::AlreadyExiting => Self::AlreadyExiting,
        }
    }
}

/// A mounted container holding the elements of one entity kind.
#[derive(Debug)]
pub struct Deck<K: DeckKind> {
    container: ElementHandle,
    transition: ExitTransition,
    exits: PendingExits,
    kind: PhantomData<fn() -> K>,
}

impl<K: DeckKind> Deck<K> {
    /// Create the deck container under `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if `parent` no longer exists.
    pub fn mount(
        doc: &mut Document,
        parent: ElementHandle,
        transition: ExitTransition,
    ) -> Result<Self, ViewError> {
        let container = doc.create_element("ul");
        doc.set_attribute(container, "id", K::CONTAINER_ID)?;
        doc.add_class(container, DECK_CLASS)?;
        doc.append_child(parent, container)?;
        Ok(Self {
            container,
            transition,
            exits: PendingExits::default(),
            kind: PhantomData,
        })
    }

    #[must_use]
    pub const fn container(&self) -> ElementHandle {
        self.container
    }

    #[must_use]
    pub const fn transition(&self) -> ExitTransition {
        self.transition
    }

    #[must_use]
    pub fn pending_exits(&self) -> usize {
        self.exits.len()
    }

    /// Bring the deck in line with `payloads`.
    ///
    /// Malformed payload entries are logged and skipped, so a bad entry never
    /// blocks the rest of the list. When the bad entry still names an identity
    /// that is on screen, that element is kept as it is.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError`] only if the container itself is gone or the
    /// document rejects a structural mutation.
    pub fn reconcile(
        &mut self,
        doc: &mut Document,
        payloads: &[K::Payload],
        ctx: &RenderContext<'_>,
        now: Instant,
    ) -> Result<DeckReport<K::Id>, ViewError> {
        let name = format!("reconcile.{}", K::KIND);
        timing::timed(&name, || self.reconcile_inner(doc, payloads, ctx, now))
    }

    fn reconcile_inner(
        &mut self,
        doc: &mut Document,
        payloads: &[K::Payload],
        ctx: &RenderContext<'_>,
        now: Instant,
    ) -> Result<DeckReport<K::Id>, ViewError> {
        let mut report = DeckReport::empty(K::KIND);
        let on_screen = self.on_screen(doc)?;
        let Decoded {
            entities,
            malformed,
            held,
        } = decode_all::<K>(payloads);
        report.malformed = malformed;

        // A listed identity whose entry failed validation keeps its element.
        let old: BTreeSet<K::Id> = on_screen.keys().copied().collect();
        let mut new: BTreeSet<K::Id> = entities.iter().map(K::identity).collect();
        new.extend(held);
        let delta = diff(&old, &new);

        for id in &delta.to_remove {
            let Some(found) = on_screen.get(id) else {
                continue;
            };
            match self.exits.begin(doc, found.handle, self.transition, now)? {
                ExitStart::Detached | ExitStart::Exiting => report.removed.push(*id),
                ExitStart::AlreadyExiting => {}
            }
        }

        for id in old.intersection(&new) {
            match on_screen.get(id) {
                Some(found) if found.exiting => report.deferred.push(*id),
                _ => report.retained.push(*id),
            }
        }

        for entity in &entities {
            let id = K::identity(entity);
            if !delta.to_add.contains(&id) {
                continue;
            }
            match K::render(doc, entity, ctx) {
                Ok(element) => {
                    doc.append_child(self.container, element)?;
                    report.added.push(id);
                }
                Err(RenderError::Malformed(err)) => {
                    warn!(kind = %K::KIND, %err, "skipping entity that cannot be rendered");
                    report.malformed += 1;
                }
                Err(RenderError::View(err)) => return Err(err),
            }
        }

        debug!(
            kind = %K::KIND,
            added = report.added.len(),
            removed = report.removed.len(),
            retained = report.retained.len(),
            deferred = report.deferred.len(),
            malformed = report.malformed,
            "deck reconciled"
        );
        Ok(report)
    }

    /// Identities on screen keyed to their element. When the same identity
    /// appears twice the first element wins and later copies are detached.
    fn on_screen(
        &self,
        doc: &mut Document,
    ) -> Result<BTreeMap<K::Id, Extracted<K::Id>>, ViewError> {
        let mut found = BTreeMap::new();
        let mut duplicates = Vec::new();
        for item in extract::<K>(doc, self.container)? {
            if found.contains_key(&item.id) {
                duplicates.push(item);
            } else {
                found.insert(item.id, item);
            }
        }
        for dup in duplicates {
            warn!(kind = %K::KIND, id = %dup.id, element = %dup.handle, "detaching duplicate element");
            doc.detach(dup.handle)?;
        }
        Ok(found)
    }

    /// Live identities in document order, excluding elements mid-exit.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the container is gone.
    pub fn ids(&self, doc: &Document) -> Result<Vec<K::Id>, ViewError> {
        Ok(extract::<K>(doc, self.container)?
            .into_iter()
            .filter(|item| !item.exiting)
            .map(|item| item.id)
            .collect())
    }

    /// The first element carrying `id`, exiting or not.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the container is gone.
    pub fn find(&self, doc: &Document, id: K::Id) -> Result<Option<Extracted<K::Id>>, ViewError> {
        Ok(extract::<K>(doc, self.container)?
            .into_iter()
            .find(|item| item.id == id))
    }

    /// Append a single entity that is not on screen yet.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if the entity cannot be rendered or the
    /// container is gone.
    pub fn append(
        &mut self,
        doc: &mut Document,
        entity: &K::Entity,
        ctx: &RenderContext<'_>,
    ) -> Result<ElementHandle, RenderError> {
        let element = K::render(doc, entity, ctx)?;
        doc.append_child(self.container, element)?;
        Ok(element)
    }

    /// Remove one identity outside a full reconcile, e.g. after the user
    /// confirmed a delete.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the container is gone.
    pub fn remove(
        &mut self,
        doc: &mut Document,
        id: K::Id,
        now: Instant,
    ) -> Result<RemoveOutcome, ViewError> {
        let Some(found) = self.find(doc, id)? else {
            debug!(kind = %K::KIND, %id, "removal target already absent");
            return Ok(RemoveOutcome::AlreadyAbsent);
        };
        let outcome = self.exits.begin(doc, found.handle, self.transition, now)?;
        Ok(outcome.into())
    }

    /// Finish exit transitions whose deadline has passed.
    pub fn tick(&mut self, doc: &mut Document, now: Instant) -> usize {
        self.exits.complete_due(doc, now)
    }

    /// Finish every pending exit now.
    pub fn settle(&mut self, doc: &mut Document) -> usize {
        self.exits.complete_all(doc)
    }

    /// Drop every element at once, exiting or not. Used when the board
    /// switches to another UTub.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the container is gone.
    pub fn clear(&mut self, doc: &mut Document) -> Result<usize, ViewError> {
        let removed = doc.clear_children(self.container)?;
        self.exits.forget();
        Ok(removed)
    }
}

struct Decoded<K: DeckKind> {
    entities: Vec<K::Entity>,
    malformed: usize,
    /// Identities named by entries that failed validation.
    held: BTreeSet<K::Id>,
}

/// Validate payloads, keeping payload order. Entries that fail validation
/// are logged and counted; repeated identities keep their first occurrence.
fn decode_all<K: DeckKind>(payloads: &[K::Payload]) -> Decoded<K> {
    let mut entities = Vec::with_capacity(payloads.len());
    let mut seen = BTreeSet::new();
    let mut held = BTreeSet::new();
    let mut malformed = 0;
    for payload in payloads {
        match K::decode(payload) {
            Ok(entity) => {
                let id = K::identity(&entity);
                if seen.insert(id) {
                    entities.push(entity);
                } else {
                    warn!(kind = %K::KIND, %id, "ignoring repeated identity in payload");
                }
            }
            Err(err) => {
                warn!(kind = %K::KIND, %err, "skipping malformed entity");
                malformed += 1;
                held.extend(err.id.map(K::Id::from));
            }
        }
    }
    held.retain(|id| !seen.contains(id));
    Decoded {
        entities,
        malformed,
        held,
    }
}
