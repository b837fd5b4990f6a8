//! Exit transitions for elements leaving a deck.
//!
//! An element being removed is either detached on the spot or marked with
//! [`EXITING_CLASS`] and detached once its deadline passes. While marked it
//! stays in the container, so the identity extractor still sees it and can
//! tell the reconciler that the identity is mid-removal.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::view::{Document, ElementHandle, ViewError};

/// Class carried by an element while its exit transition runs.
pub const EXITING_CLASS: &str = "exiting";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitTransition {
    /// Detach immediately.
    #[default]
    Instant,
    /// Keep the element, marked as exiting, for this long.
    Fade(Duration),
}

impl ExitTransition {
    /// `0` means instant.
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        if ms == 0 {
            Self::Instant
        } else {
            Self::Fade(Duration::from_millis(ms))
        }
    }

    /// How long an exiting element stays attached.
    #[must_use]
    pub const fn duration(self) -> Duration {
        match self {
            Self::Instant => Duration::ZERO,
            Self::Fade(duration) => duration,
        }
    }
}

/// How a removal request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStart {
    Detached,
    Exiting,
    /// The element was already exiting; the request changed nothing.
    AlreadyExiting,
}

#[derive(Debug, Clone, Copy)]
struct PendingExit {
    handle: ElementHandle,
    deadline: Instant,
}

/// Elements of one deck whose exit transition has not finished.
#[derive(Debug, Default)]
pub struct PendingExits {
    pending: Vec<PendingExit>,
}

impl PendingExits {
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Start removing `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::StaleHandle`] if the element no longer exists.
    pub fn begin(
        &mut self,
        doc: &mut Document,
        handle: ElementHandle,
        transition: ExitTransition,
        now: Instant,
    ) -> Result<ExitStart, ViewError> {
        if doc.has_class(handle, EXITING_CLASS)? {
            return Ok(ExitStart::AlreadyExiting);
        }
        match transition {
            ExitTransition::Instant => {
                doc.detach(handle)?;
                Ok(ExitStart::Detached)
            }
            ExitTransition::Fade(duration) => {
                doc.add_class(handle, EXITING_CLASS)?;
                self.pending.push(PendingExit {
                    handle,
                    deadline: now + duration,
                });
                trace!(element = %handle, ?duration, "exit transition started");
                Ok(ExitStart::Exiting)
            }
        }
    }

    /// Detach every element whose deadline is at or before `now`. Returns
    /// how many elements were detached.
    pub fn complete_due(&mut self, doc: &mut Document, now: Instant) -> usize {
        let (due, waiting): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|exit| exit.deadline <= now);
        self.pending = waiting;
        finish(doc, due)
    }

    /// Detach every pending element regardless of deadline.
    pub fn complete_all(&mut self, doc: &mut Document) -> usize {
        let due: Vec<_> = self.pending.drain(..).collect();
        finish(doc, due)
    }

    /// Forget pending exits without touching the document. Used after the
    /// container has been cleared wholesale.
    pub fn forget(&mut self) {
        self.pending.clear();
    }
}

fn finish(doc: &mut Document, due: Vec<PendingExit>) -> usize {
    let mut detached = 0;
    for exit in due {
        match doc.detach(exit.handle) {
            Ok(()) => detached += 1,
            Err(err) => debug!(element = %exit.handle, %err, "exit target already gone"),
        }
    }
    detached
}
