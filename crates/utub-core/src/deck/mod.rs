//! Decks: containers listing one entity kind, kept in sync with the server
//! by set reconciliation.
//!
//! A reconcile pass is built from four pieces:
//!
//! - [`extract`] reads the identities currently on screen,
//! - [`diff`] computes what to remove and what to add,
//! - [`render`] builds elements for new entities,
//! - [`reconcile::Deck`] applies the delta to the live container.
//!
//! Each entity kind plugs in through [`DeckKind`].

pub mod diff;
pub mod extract;
pub mod reconcile;
pub mod render;
pub mod transition;

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::str::FromStr;

use serde::Serialize;

pub use diff::{Delta, diff};
pub use extract::{Extracted, extract};
pub use reconcile::{Deck, DeckReport, RemoveOutcome};
pub use render::{RenderContext, RenderError, RenderHooks};
pub use transition::{EXITING_CLASS, ExitStart, ExitTransition};

use crate::model::{
    EntityKind, MalformedEntity, Member, MemberId, MemberPayload, Tag, TagId, TagPayload, Url,
    UrlId, UrlPayload, UtubId, UtubSummary, UtubSummaryPayload,
};
use crate::view::{Document, ElementHandle};

/// One collection kind a deck can hold.
pub trait DeckKind {
    type Id: Copy + Ord + Hash + Debug + Display + FromStr + From<u64> + Serialize;
    type Payload;
    type Entity;

    const KIND: EntityKind;
    /// Attribute holding the identity on every element of the deck.
    const MARKER: &'static str;
    /// `id` attribute of the deck container.
    const CONTAINER_ID: &'static str;

    /// Validate a wire payload.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedEntity`] when a required field is missing.
    fn decode(payload: &Self::Payload) -> Result<Self::Entity, MalformedEntity>;

    fn identity(entity: &Self::Entity) -> Self::Id;

    /// Build a detached element for `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] when the entity cannot be shown in this deck
    /// or the document rejects a mutation.
    fn render(
        doc: &mut Document,
        entity: &Self::Entity,
        ctx: &RenderContext<'_>,
    ) -> Result<ElementHandle, RenderError>;
}

/// URL rows of the active UTub.
#[derive(Debug, Clone, Copy)]
pub enum Urls {}

/// Tag badges of the active UTub.
#[derive(Debug, Clone, Copy)]
pub enum Tags {}

/// Non-owner members of the active UTub.
#[derive(Debug, Clone, Copy)]
pub enum Members {}

/// The UTub selector.
#[derive(Debug, Clone, Copy)]
pub enum Utubs {}

impl DeckKind for Urls {
    type Id = UrlId;
    type Payload = UrlPayload;
    type Entity = Url;

    const KIND: EntityKind = EntityKind::Url;
    const MARKER: &'static str = "data-url-id";
    const CONTAINER_ID: &'static str = "urls-deck";

    fn decode(payload: &UrlPayload) -> Result<Url, MalformedEntity> {
        Url::decode(payload)
    }

    fn identity(entity: &Url) -> UrlId {
        entity.id
    }

    fn render(
        doc: &mut Document,
        entity: &Url,
        ctx: &RenderContext<'_>,
    ) -> Result<ElementHandle, RenderError> {
        render::render_url_row(doc, entity, ctx)
    }
}

impl DeckKind for Tags {
    type Id = TagId;
    type Payload = TagPayload;
    type Entity = Tag;

    const KIND: EntityKind = EntityKind::Tag;
    const MARKER: &'static str = "data-tag-id";
    const CONTAINER_ID: &'static str = "tags-deck";

    fn decode(payload: &TagPayload) -> Result<Tag, MalformedEntity> {
        Tag::decode(payload)
    }

    fn identity(entity: &Tag) -> TagId {
        entity.id
    }

    fn render(
        doc: &mut Document,
        entity: &Tag,
        ctx: &RenderContext<'_>,
    ) -> Result<ElementHandle, RenderError> {
        render::render_tag_badge(doc, entity, ctx)
    }
}

impl DeckKind for Members {
    type Id = MemberId;
    type Payload = MemberPayload;
    type Entity = Member;

    const KIND: EntityKind = EntityKind::Member;
    const MARKER: &'static str = "data-member-id";
    const CONTAINER_ID: &'static str = "members-deck";

    fn decode(payload: &MemberPayload) -> Result<Member, MalformedEntity> {
        Member::decode(payload)
    }

    fn identity(entity: &Member) -> MemberId {
        entity.id
    }

    fn render(
        doc: &mut Document,
        entity: &Member,
        ctx: &RenderContext<'_>,
    ) -> Result<ElementHandle, RenderError> {
        render::render_member_badge(doc, entity, ctx)
    }
}

impl DeckKind for Utubs {
    type Id = UtubId;
    type Payload = UtubSummaryPayload;
    type Entity = UtubSummary;

    const KIND: EntityKind = EntityKind::Utub;
    const MARKER: &'static str = "data-utub-id";
    const CONTAINER_ID: &'static str = "utubs-deck";

    fn decode(payload: &UtubSummaryPayload) -> Result<UtubSummary, MalformedEntity> {
        UtubSummary::decode(payload)
    }

    fn identity(entity: &UtubSummary) -> UtubId {
        entity.id
    }

    fn render(
        doc: &mut Document,
        entity: &UtubSummary,
        ctx: &RenderContext<'_>,
    ) -> Result<ElementHandle, RenderError> {
        render::render_utub_entry(doc, entity, ctx)
    }
}
