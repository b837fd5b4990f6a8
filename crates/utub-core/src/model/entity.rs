//! Validated entities.
//!
//! Payloads are checked once, when they are turned into one of these types.
//! Everything downstream (rendering, reconciliation, filtering) works on the
//! typed form and never re-parses strings.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use super::ids::{MemberId, TagId, UrlId, UtubId};
use super::payload::{MemberPayload, TagPayload, UrlPayload, UtubSummaryPayload};

/// The collection kinds a deck can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Url,
    Tag,
    Member,
    Utub,
}

impl EntityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Tag => "tag",
            Self::Member => "member",
            Self::Utub => "utub",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An incoming entity lacks a required field or carries an unusable value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed {kind} entity (id {id:?}): {reason}")]
pub struct MalformedEntity {
    pub kind: EntityKind,
    pub id: Option<u64>,
    pub reason: String,
}

impl MalformedEntity {
    #[must_use]
    pub fn new(kind: EntityKind, id: Option<u64>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            reason: reason.into(),
        }
    }

    fn missing(kind: EntityKind, id: Option<u64>, field: &str) -> Self {
        Self::new(kind, id, format!("missing required field `{field}`"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Url {
    pub id: UrlId,
    pub title: String,
    pub href: String,
    pub tag_ids: BTreeSet<TagId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: TagId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub id: MemberId,
    pub username: String,
    pub is_owner: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UtubSummary {
    pub id: UtubId,
    pub name: String,
}

impl Url {
    /// Validate a URL payload.
    ///
    /// `title` may be empty; `href` must be present and non-blank. A missing
    /// `tagIds` list is treated as "no tags".
    ///
    /// # Errors
    ///
    /// Returns [`MalformedEntity`] when `id` or `title` is missing or `href`
    /// is missing or blank.
    pub fn decode(payload: &UrlPayload) -> Result<Self, MalformedEntity> {
        let kind = EntityKind::Url;
        let raw_id = payload.id;
        let id = raw_id.ok_or_else(|| MalformedEntity::missing(kind, None, "id"))?;
        let title = payload
            .title
            .clone()
            .ok_or_else(|| MalformedEntity::missing(kind, raw_id, "title"))?;
        let href = payload
            .href
            .as_deref()
            .map(str::trim)
            .ok_or_else(|| MalformedEntity::missing(kind, raw_id, "href"))?;
        if href.is_empty() {
            return Err(MalformedEntity::new(kind, raw_id, "href is blank"));
        }
        let tag_ids = payload
            .tag_ids
            .iter()
            .flatten()
            .copied()
            .map(TagId)
            .collect();

        Ok(Self {
            id: UrlId(id),
            title,
            href: href.to_string(),
            tag_ids,
        })
    }

    /// Whether this URL carries every tag in `required`.
    #[must_use]
    pub fn has_all_tags(&self, required: &BTreeSet<TagId>) -> bool {
        required.is_subset(&self.tag_ids)
    }
}

impl Tag {
    /// Validate a tag payload.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedEntity`] when `id` is missing or `text` is missing
    /// or blank.
    pub fn decode(payload: &TagPayload) -> Result<Self, MalformedEntity> {
        let kind = EntityKind::Tag;
        let id = payload
            .id
            .ok_or_else(|| MalformedEntity::missing(kind, None, "id"))?;
        let text = payload
            .text
            .as_deref()
            .map(str::trim)
            .ok_or_else(|| MalformedEntity::missing(kind, Some(id), "text"))?;
        if text.is_empty() {
            return Err(MalformedEntity::new(kind, Some(id), "text is blank"));
        }
        Ok(Self {
            id: TagId(id),
            text: text.to_string(),
        })
    }
}

impl Member {
    /// Validate a member payload.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedEntity`] when `id` is missing or `username` is
    /// missing or blank.
    pub fn decode(payload: &MemberPayload) -> Result<Self, MalformedEntity> {
        let kind = EntityKind::Member;
        let id = payload
            .id
            .ok_or_else(|| MalformedEntity::missing(kind, None, "id"))?;
        let username = payload
            .username
            .as_deref()
            .map(str::trim)
            .ok_or_else(|| MalformedEntity::missing(kind, Some(id), "username"))?;
        if username.is_empty() {
            return Err(MalformedEntity::new(kind, Some(id), "username is blank"));
        }
        Ok(Self {
            id: MemberId(id),
            username: username.to_string(),
            is_owner: payload.is_owner,
        })
    }
}

impl UtubSummary {
    /// Validate a selector entry.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedEntity`] when `id` or `name` is missing.
    pub fn decode(payload: &UtubSummaryPayload) -> Result<Self, MalformedEntity> {
        let kind = EntityKind::Utub;
        let id = payload
            .id
            .ok_or_else(|| MalformedEntity::missing(kind, None, "id"))?;
        let name = payload
            .name
            .clone()
            .ok_or_else(|| MalformedEntity::missing(kind, Some(id), "name"))?;
        Ok(Self {
            id: UtubId(id),
            name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_decode_accepts_complete_payload() {
        let url = Url::decode(&UrlPayload::new(1, "Docs", " https://docs.rs ", &[3, 2, 3]))
            .expect("valid url");
        assert_eq!(url.id, UrlId(1));
        assert_eq!(url.href, "https://docs.rs");
        assert_eq!(url.tag_ids, BTreeSet::from([TagId(2), TagId(3)]));
    }

    #[test]
    fn url_decode_rejects_missing_id() {
        let payload = UrlPayload {
            id: None,
            ..UrlPayload::new(0, "x", "https://x.test", &[])
        };
        let err = Url::decode(&payload).expect_err("missing id");
        assert_eq!(err.kind, EntityKind::Url);
        assert_eq!(err.id, None);
        assert!(err.reason.contains("`id`"));
    }

    #[test]
    fn url_decode_rejects_blank_href() {
        let err = Url::decode(&UrlPayload::new(4, "x", "   ", &[])).expect_err("blank href");
        assert_eq!(err.id, Some(4));
    }

    #[test]
    fn url_without_tag_list_has_no_tags() {
        let payload = UrlPayload {
            tag_ids: None,
            ..UrlPayload::new(2, "", "https://a.test", &[])
        };
        let url = Url::decode(&payload).expect("valid url");
        assert!(url.tag_ids.is_empty());
        assert!(url.has_all_tags(&BTreeSet::new()));
        assert!(!url.has_all_tags(&BTreeSet::from([TagId(1)])));
    }

    #[test]
    fn tag_decode_trims_and_rejects_blank() {
        let tag = Tag::decode(&TagPayload::new(1, "  rust ")).expect("valid tag");
        assert_eq!(tag.text, "rust");
        assert!(Tag::decode(&TagPayload::new(2, "  ")).is_err());
        assert!(Tag::decode(&TagPayload::default()).is_err());
    }

    #[test]
    fn member_decode_keeps_owner_flag() {
        let owner = Member::decode(&MemberPayload::new(8, "ada", true)).expect("valid member");
        assert!(owner.is_owner);
        let err = Member::decode(&MemberPayload {
            username: None,
            ..MemberPayload::new(9, "", false)
        })
        .expect_err("missing username");
        assert_eq!(err.to_string(), "malformed member entity (id Some(9)): missing required field `username`");
    }

    #[test]
    fn utub_summary_requires_name() {
        assert!(UtubSummary::decode(&UtubSummaryPayload::new(1, "Home")).is_ok());
        assert!(UtubSummary::decode(&UtubSummaryPayload { id: Some(1), name: None }).is_err());
    }
}
