//! Ordering of overlapping refreshes.
//!
//! Every fetch is tagged with a [`RefreshToken`] when it starts. A response
//! may only be applied while its token is still the latest one issued, so a
//! slow response can never overwrite the result of a newer one, and a
//! response for a UTub the user has navigated away from is dropped.

use std::fmt;

use serde::Serialize;

use crate::model::UtubId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RefreshToken {
    pub utub: UtubId,
    pub seq: u64,
}

impl fmt::Display for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "utub {}#{}", self.utub, self.seq)
    }
}

/// Issues tokens with a monotonically increasing sequence number.
#[derive(Debug, Default)]
pub struct RefreshGuard {
    seq: u64,
    latest: Option<RefreshToken>,
}

impl RefreshGuard {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            seq: 0,
            latest: None,
        }
    }

    /// Start a refresh for `utub`, superseding every token issued before.
    pub fn issue(&mut self, utub: UtubId) -> RefreshToken {
        self.seq += 1;
        let token = RefreshToken {
            utub,
            seq: self.seq,
        };
        self.latest = Some(token);
        token
    }

    #[must_use]
    pub fn is_current(&self, token: RefreshToken) -> bool {
        self.latest == Some(token)
    }

    #[must_use]
    pub const fn latest(&self) -> Option<RefreshToken> {
        self.latest
    }

    /// Supersede every outstanding token without issuing a new one.
    pub fn invalidate(&mut self) {
        self.latest = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_latest_token_is_current() {
        let mut guard = RefreshGuard::new();
        let first = guard.issue(UtubId(1));
        let second = guard.issue(UtubId(1));

        assert!(second.seq > first.seq);
        assert!(!guard.is_current(first));
        assert!(guard.is_current(second));
    }

    #[test]
    fn switching_utub_supersedes_old_tokens() {
        let mut guard = RefreshGuard::new();
        let old = guard.issue(UtubId(1));
        let new = guard.issue(UtubId(2));

        assert!(!guard.is_current(old));
        assert_eq!(guard.latest(), Some(new));
    }

    #[test]
    fn invalidate_leaves_nothing_current() {
        let mut guard = RefreshGuard::new();
        let token = guard.issue(UtubId(3));
        guard.invalidate();

        assert!(!guard.is_current(token));
        assert_eq!(guard.latest(), None);
        assert_eq!(guard.issue(UtubId(3)).seq, token.seq + 1);
    }
}
