//! Owned event subscriptions.
//!
//! A [`Subscription`] is created once when a handler is attached to an
//! element and lives inside that element. Detaching the element drops the
//! element's subscriptions, which is the only way a handler is disposed. The
//! shared [`LiveCounter`] lets the document report how many handlers are
//! still attached anywhere.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use super::ElementHandle;

/// Interaction events the board wires up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Primary activation (click / tap / Enter).
    Click,
    /// Element received keyboard focus.
    Focus,
}

/// What a handler sees when it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventContext {
    pub target: ElementHandle,
    pub event: EventKind,
}

pub type Handler = Rc<dyn Fn(&EventContext)>;

/// Count of undisposed subscriptions, shared by all subscriptions of one
/// document.
#[derive(Debug, Clone, Default)]
pub struct LiveCounter(Rc<Cell<usize>>);

impl LiveCounter {
    #[must_use]
    pub fn get(&self) -> usize {
        self.0.get()
    }

    fn increment(&self) {
        self.0.set(self.0.get() + 1);
    }

    fn decrement(&self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

pub struct Subscription {
    event: EventKind,
    handler: Handler,
    live: LiveCounter,
}

impl Subscription {
    pub(crate) fn new(event: EventKind, handler: Handler, live: &LiveCounter) -> Self {
        live.increment();
        Self {
            event,
            handler,
            live: live.clone(),
        }
    }

    #[must_use]
    pub const fn event(&self) -> EventKind {
        self.event
    }

    pub(crate) fn handler(&self) -> Handler {
        Rc::clone(&self.handler)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.live.decrement();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_subscription_disposes_exactly_once() {
        let live = LiveCounter::default();
        let first = Subscription::new(EventKind::Click, Rc::new(|_| {}), &live);
        let second = Subscription::new(EventKind::Focus, Rc::new(|_| {}), &live);
        assert_eq!(live.get(), 2);

        drop(first);
        assert_eq!(live.get(), 1);
        drop(second);
        assert_eq!(live.get(), 0);
    }
}
