//! Element constructors, one per entity kind.
//!
//! Renderers build a fresh, detached element from a validated entity and the
//! caller's [`RenderContext`]. They never look anything up in the document
//! on their own: the active UTub, the tag names and the interaction hooks all
//! arrive through the context. Hooks are attached as subscriptions owned by
//! the element, so they are released when the element is detached.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use super::{DeckKind, Members, Tags, Urls, Utubs};
use crate::model::{
    EntityKind, MalformedEntity, Member, MemberId, Tag, TagId, Url, UrlId, UtubId, UtubSummary,
};
use crate::view::{Document, ElementHandle, EventKind, ViewError};

pub const URL_ROW_CLASS: &str = "url-row";
pub const URL_TITLE_CLASS: &str = "url-title";
pub const URL_LINK_CLASS: &str = "url-link";
pub const URL_TAGS_CLASS: &str = "url-tags";
pub const URL_TAG_CHIP_CLASS: &str = "url-tag";
pub const URL_DELETE_CLASS: &str = "url-delete";
pub const TAG_BADGE_CLASS: &str = "tag-badge";
pub const MEMBER_BADGE_CLASS: &str = "member-badge";
pub const MEMBER_REMOVE_CLASS: &str = "member-remove";
pub const OWNER_BADGE_CLASS: &str = "owner-badge";
pub const UTUB_ENTRY_CLASS: &str = "utub-entry";
pub const ACTIVE_CLASS: &str = "active";
pub const SELECTED_CLASS: &str = "selected";
pub const HIDDEN_CLASS: &str = "hidden";

/// Attribute on a URL row listing its tag ids, space separated and sorted.
pub const URL_TAG_IDS_ATTR: &str = "data-tag-ids";

pub type Hook<I> = Rc<dyn Fn(I)>;

/// Caller-supplied interaction handlers. A missing hook means the matching
/// control is not rendered (or the element is not interactive).
#[derive(Clone, Default)]
pub struct RenderHooks {
    pub on_url_open: Option<Hook<UrlId>>,
    pub on_url_delete: Option<Hook<UrlId>>,
    pub on_tag_toggle: Option<Hook<TagId>>,
    pub on_member_remove: Option<Hook<MemberId>>,
    pub on_utub_select: Option<Hook<UtubId>>,
}

impl fmt::Debug for RenderHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderHooks")
            .field("on_url_open", &self.on_url_open.is_some())
            .field("on_url_delete", &self.on_url_delete.is_some())
            .field("on_tag_toggle", &self.on_tag_toggle.is_some())
            .field("on_member_remove", &self.on_member_remove.is_some())
            .field("on_utub_select", &self.on_utub_select.is_some())
            .finish()
    }
}

/// Everything a renderer may depend on besides the entity itself.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub active_utub: Option<UtubId>,
    pub tag_names: &'a BTreeMap<TagId, String>,
    pub selected_tags: &'a BTreeSet<TagId>,
    pub hooks: &'a RenderHooks,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Malformed(#[from] MalformedEntity),

    #[error(transparent)]
    View(#[from] ViewError),
}

fn bind<I: Copy + 'static>(
    doc: &mut Document,
    handle: ElementHandle,
    event: EventKind,
    hook: Option<&Hook<I>>,
    id: I,
) -> Result<(), ViewError> {
    if let Some(hook) = hook {
        let hook = Rc::clone(hook);
        doc.listen(handle, event, Rc::new(move |_| hook(id)))?;
    }
    Ok(())
}

fn child(doc: &mut Document, parent: ElementHandle, tag: &str, class: &str) -> Result<ElementHandle, ViewError> {
    let el = doc.create_element(tag);
    doc.add_class(el, class)?;
    doc.append_child(parent, el)?;
    Ok(el)
}

/// First direct child of `parent` carrying `class`.
#[must_use]
pub fn child_with_class(doc: &Document, parent: ElementHandle, class: &str) -> Option<ElementHandle> {
    doc.children(parent)
        .ok()?
        .iter()
        .copied()
        .find(|el| doc.has_class(*el, class).unwrap_or(false))
}

fn encode_tag_ids(tag_ids: &BTreeSet<TagId>) -> String {
    tag_ids
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tag ids recorded on a URL row. Unparseable entries are ignored.
#[must_use]
pub fn row_tag_ids(doc: &Document, row: ElementHandle) -> BTreeSet<TagId> {
    doc.attribute(row, URL_TAG_IDS_ATTR)
        .ok()
        .flatten()
        .map(|raw| {
            raw.split_whitespace()
                .filter_map(|part| part.parse().ok())
                .collect()
        })
        .unwrap_or_default()
}

fn fill_tag_chips(
    doc: &mut Document,
    chips: ElementHandle,
    url: &Url,
    ctx: &RenderContext<'_>,
) -> Result<(), ViewError> {
    for tag_id in &url.tag_ids {
        let Some(name) = ctx.tag_names.get(tag_id) else {
            continue;
        };
        let chip = child(doc, chips, "span", URL_TAG_CHIP_CLASS)?;
        doc.set_attribute(chip, "data-tag-id", tag_id.to_string())?;
        doc.set_text(chip, name.clone())?;
    }
    Ok(())
}

/// Whether the chips under `chips` spell out the current names of `url`'s tags.
fn chips_current(doc: &Document, chips: ElementHandle, url: &Url, ctx: &RenderContext<'_>) -> bool {
    let expected = url.tag_ids.iter().filter_map(|id| ctx.tag_names.get(id).map(String::as_str));
    let Ok(children) = doc.children(chips) else {
        return false;
    };
    let shown = children.iter().map(|chip| doc.text(*chip).unwrap_or_default());
    expected.eq(shown)
}

/// Build a URL row:
///
/// ```text
/// <li class="url-row" data-url-id=".." data-tag-ids="..">
///   <span class="url-title">..</span>
///   <a class="url-link" href="..">..</a>
///   <span class="url-tags"><span class="url-tag" data-tag-id="..">..</span>..</span>
///   <button class="url-delete">Delete</button>
/// </li>
/// ```
///
/// # Errors
///
/// Returns [`RenderError::View`] if the document rejects a mutation.
pub fn render_url_row(
    doc: &mut Document,
    url: &Url,
    ctx: &RenderContext<'_>,
) -> Result<ElementHandle, RenderError> {
    let row = doc.create_element("li");
    doc.add_class(row, URL_ROW_CLASS)?;
    doc.set_attribute(row, Urls::MARKER, url.id.to_string())?;
    doc.set_attribute(row, URL_TAG_IDS_ATTR, encode_tag_ids(&url.tag_ids))?;
    if !url.has_all_tags(ctx.selected_tags) {
        doc.add_class(row, HIDDEN_CLASS)?;
    }

    let title = child(doc, row, "span", URL_TITLE_CLASS)?;
    doc.set_text(title, url.title.clone())?;

    let link = child(doc, row, "a", URL_LINK_CLASS)?;
    doc.set_attribute(link, "href", url.href.clone())?;
    doc.set_text(link, url.href.clone())?;

    let chips = child(doc, row, "span", URL_TAGS_CLASS)?;
    fill_tag_chips(doc, chips, url, ctx)?;

    bind(doc, row, EventKind::Click, ctx.hooks.on_url_open.as_ref(), url.id)?;
    bind(doc, row, EventKind::Focus, ctx.hooks.on_url_open.as_ref(), url.id)?;

    if ctx.hooks.on_url_delete.is_some() {
        let delete = child(doc, row, "button", URL_DELETE_CLASS)?;
        doc.set_text(delete, "Delete")?;
        bind(doc, delete, EventKind::Click, ctx.hooks.on_url_delete.as_ref(), url.id)?;
    }

    Ok(row)
}

/// Update an existing URL row in place after a single-item refetch. The row
/// element and its subscriptions are kept; only changed fields are written.
/// Returns whether anything changed.
///
/// # Errors
///
/// Returns [`RenderError::View`] if `row` is stale, and
/// [`RenderError::Malformed`] if `row` is not a URL row for `url.id`.
pub fn update_url_row(
    doc: &mut Document,
    row: ElementHandle,
    url: &Url,
    ctx: &RenderContext<'_>,
) -> Result<bool, RenderError> {
    let marker = doc.attribute(row, Urls::MARKER)?;
    if marker != Some(url.id.to_string().as_str()) {
        return Err(MalformedEntity::new(
            EntityKind::Url,
            Some(url.id.get()),
            "row being updated belongs to another url",
        )
        .into());
    }
    let before = doc.mutation_count();

    if let Some(title) = child_with_class(doc, row, URL_TITLE_CLASS) {
        doc.set_text(title, url.title.clone())?;
    }
    if let Some(link) = child_with_class(doc, row, URL_LINK_CLASS) {
        doc.set_attribute(link, "href", url.href.clone())?;
        doc.set_text(link, url.href.clone())?;
    }
    if row_tag_ids(doc, row) != url.tag_ids {
        doc.set_attribute(row, URL_TAG_IDS_ATTR, encode_tag_ids(&url.tag_ids))?;
    }
    // Chips also go stale when a tag is renamed without leaving the row.
    if let Some(chips) = child_with_class(doc, row, URL_TAGS_CLASS)
        && !chips_current(doc, chips, url, ctx)
    {
        doc.clear_children(chips)?;
        fill_tag_chips(doc, chips, url, ctx)?;
    }
    doc.toggle_class(row, HIDDEN_CLASS, !url.has_all_tags(ctx.selected_tags))?;

    Ok(doc.mutation_count() != before)
}

/// `<li class="tag-badge" data-tag-id="..">text</li>`, clickable to toggle
/// the tag filter.
///
/// # Errors
///
/// Returns [`RenderError::View`] if the document rejects a mutation.
pub fn render_tag_badge(
    doc: &mut Document,
    tag: &Tag,
    ctx: &RenderContext<'_>,
) -> Result<ElementHandle, RenderError> {
    let badge = doc.create_element("li");
    doc.add_class(badge, TAG_BADGE_CLASS)?;
    doc.set_attribute(badge, Tags::MARKER, tag.id.to_string())?;
    doc.set_text(badge, tag.text.clone())?;
    if ctx.selected_tags.contains(&tag.id) {
        doc.add_class(badge, SELECTED_CLASS)?;
    }
    bind(doc, badge, EventKind::Click, ctx.hooks.on_tag_toggle.as_ref(), tag.id)?;
    Ok(badge)
}

/// Badge for a non-owner member.
///
/// # Errors
///
/// Returns [`RenderError::Malformed`] for the owner, who is rendered by
/// [`render_owner_badge`] instead.
pub fn render_member_badge(
    doc: &mut Document,
    member: &Member,
    ctx: &RenderContext<'_>,
) -> Result<ElementHandle, RenderError> {
    if member.is_owner {
        return Err(MalformedEntity::new(
            EntityKind::Member,
            Some(member.id.get()),
            "owner cannot be rendered as a regular member",
        )
        .into());
    }
    let badge = doc.create_element("li");
    doc.add_class(badge, MEMBER_BADGE_CLASS)?;
    doc.set_attribute(badge, Members::MARKER, member.id.to_string())?;
    doc.set_text(badge, member.username.clone())?;

    if ctx.hooks.on_member_remove.is_some() {
        let remove = child(doc, badge, "button", MEMBER_REMOVE_CLASS)?;
        doc.set_text(remove, "Remove")?;
        bind(doc, remove, EventKind::Click, ctx.hooks.on_member_remove.as_ref(), member.id)?;
    }
    Ok(badge)
}

/// `<span class="owner-badge" data-member-id="..">username</span>`.
///
/// # Errors
///
/// Returns [`RenderError::Malformed`] if `member` is not the owner.
pub fn render_owner_badge(
    doc: &mut Document,
    member: &Member,
) -> Result<ElementHandle, RenderError> {
    if !member.is_owner {
        return Err(MalformedEntity::new(
            EntityKind::Member,
            Some(member.id.get()),
            "member is not the owner",
        )
        .into());
    }
    let badge = doc.create_element("span");
    doc.add_class(badge, OWNER_BADGE_CLASS)?;
    doc.set_attribute(badge, Members::MARKER, member.id.to_string())?;
    doc.set_text(badge, member.username.clone())?;
    Ok(badge)
}

/// Entry of the UTub selector deck.
///
/// # Errors
///
/// Returns [`RenderError::View`] if the document rejects a mutation.
pub fn render_utub_entry(
    doc: &mut Document,
    utub: &UtubSummary,
    ctx: &RenderContext<'_>,
) -> Result<ElementHandle, RenderError> {
    let entry = doc.create_element("li");
    doc.add_class(entry, UTUB_ENTRY_CLASS)?;
    doc.set_attribute(entry, Utubs::MARKER, utub.id.to_string())?;
    doc.set_text(entry, utub.name.clone())?;
    if ctx.active_utub == Some(utub.id) {
        doc.add_class(entry, ACTIVE_CLASS)?;
    }
    bind(doc, entry, EventKind::Click, ctx.hooks.on_utub_select.as_ref(), utub.id)?;
    Ok(entry)
}
