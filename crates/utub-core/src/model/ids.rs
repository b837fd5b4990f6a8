//! Typed identities for the entities shown on the board.
//!
//! Every deck keys its elements by one of these newtypes. They parse from the
//! decimal strings stored in marker attributes and render back to the same
//! form, so an identity read from the view compares equal to the identity
//! decoded from a server payload.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw integer value.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u64>().map(Self)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

entity_id!(
    /// Identity of a URL within a UTub.
    UrlId
);
entity_id!(
    /// Identity of a tag within a UTub.
    TagId
);
entity_id!(
    /// Identity of a member (user) within a UTub.
    MemberId
);
entity_id!(
    /// Identity of a UTub.
    UtubId
);
