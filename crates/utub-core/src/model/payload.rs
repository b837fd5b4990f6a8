//! Wire payloads as returned by the UTubs server.
//!
//! Every field is optional here: the server is the only source of these
//! values and a single incomplete record must not fail decoding of the whole
//! snapshot. Entity lists go further and decode entry by entry, so a record
//! with a wrong-typed field degrades to an (invalid) payload holding only its
//! id. Validation into typed entities happens in [`super::entity`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// A list payload that can stand in for an entry it could not read.
pub trait ListEntry: DeserializeOwned {
    /// Placeholder carrying only the id, which fails validation later.
    fn unreadable(id: Option<u64>) -> Self;
}

/// Deserialize a JSON array entry by entry. `null` or a missing field is an
/// empty list; an entry that does not fit `T` becomes [`ListEntry::unreadable`].
///
/// # Errors
///
/// Fails only when the value is neither an array nor `null`.
pub fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: ListEntry,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .map(|value| {
            T::deserialize(&value).unwrap_or_else(|err| {
                let id = value.get("id").and_then(Value::as_u64);
                warn!(?id, %err, "unreadable list entry");
                T::unreadable(id)
            })
        })
        .collect())
}

/// One URL row inside a UTub snapshot, or the body of a single-URL refetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlPayload {
    pub id: Option<u64>,
    pub title: Option<String>,
    pub href: Option<String>,
    pub tag_ids: Option<Vec<u64>>,
}

/// One tag of a UTub.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagPayload {
    pub id: Option<u64>,
    pub text: Option<String>,
}

/// One member of a UTub.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPayload {
    pub id: Option<u64>,
    pub username: Option<String>,
    #[serde(default)]
    pub is_owner: bool,
}

/// Entry of the UTub list endpoint, used for the selector deck.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtubSummaryPayload {
    pub id: Option<u64>,
    pub name: Option<String>,
}

/// Full snapshot of one UTub (`GET /utubs/<id>`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtubPayload {
    pub id: Option<u64>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub members: Vec<MemberPayload>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub urls: Vec<UrlPayload>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub tags: Vec<TagPayload>,
}

/// Body of the UTub list endpoint (`GET /utubs`), a bare JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UtubList(#[serde(deserialize_with = "lenient_list")] pub Vec<UtubSummaryPayload>);

macro_rules! list_entry {
    ($($payload:ident),+) => {$(
        impl ListEntry for $payload {
            fn unreadable(id: Option<u64>) -> Self {
                Self {
                    id,
                    ..Self::default()
                }
            }
        }
    )+};
}

list_entry!(UrlPayload, TagPayload, MemberPayload, UtubSummaryPayload);

impl UrlPayload {
    /// Convenience constructor for a fully-populated row.
    #[must_use]
    pub fn new(id: u64, title: &str, href: &str, tag_ids: &[u64]) -> Self {
        Self {
            id: Some(id),
            title: Some(title.to_string()),
            href: Some(href.to_string()),
            tag_ids: Some(tag_ids.to_vec()),
        }
    }
}

impl TagPayload {
    #[must_use]
    pub fn new(id: u64, text: &str) -> Self {
        Self {
            id: Some(id),
            text: Some(text.to_string()),
        }
    }
}

impl MemberPayload {
    #[must_use]
    pub fn new(id: u64, username: &str, is_owner: bool) -> Self {
        Self {
            id: Some(id),
            username: Some(username.to_string()),
            is_owner,
        }
    }
}

impl UtubSummaryPayload {
    #[must_use]
    pub fn new(id: u64, name: &str) -> Self {
        Self {
            id: Some(id),
            name: Some(name.to_string()),
        }
    }
}
