//! utub-core library: the UTubs board model and its deck reconciler.
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums per module (`ViewError`, `MalformedEntity`,
//!   `RenderError`, `BoardError`); `anyhow::Result` for config loading.
//! - **Logging**: `tracing` macros. `warn!` for skipped entities, `debug!` for
//!   stale references and pass summaries, `trace!` for single mutations.
//! - **Threading**: the document and its decks are single-threaded (`Rc`).

pub mod board;
pub mod config;
pub mod deck;
pub mod error;
pub mod filter;
pub mod model;
pub mod refresh;
pub mod timing;
pub mod view;

pub use board::{Board, BoardError, SnapshotOutcome, SnapshotReport, UrlOutcome};
pub use deck::{Deck, DeckKind, DeckReport, ExitTransition, RemoveOutcome, RenderContext, RenderHooks};
pub use error::ErrorCode;
pub use refresh::{RefreshGuard, RefreshToken};
pub use view::{Document, ElementHandle, ViewError};
