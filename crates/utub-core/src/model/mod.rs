pub mod entity;
pub mod ids;
pub mod payload;

pub use entity::{EntityKind, MalformedEntity, Member, Tag, Url, UtubSummary};
pub use ids::{MemberId, TagId, UrlId, UtubId};
pub use payload::{
    ListEntry, MemberPayload, TagPayload, UrlPayload, UtubList, UtubPayload, UtubSummaryPayload,
};
