//! Browser DOM layer for marginalia.
//!
//! Implements the core's document and decoration seams on top of web-sys and
//! the `rough-notation` library. It assumes a `wasm32-unknown-unknown` target.
//!
//! - `document`: `DocumentAdapter` over the live DOM
//! - `decorator`: rough-notation decorations
//! - `settle`: timers for deferred selection reads and decoration drawing
//! - `events`: document-wide click, scroll and resize listeners
//!
//! This crate re-exports `marginalia-core`, so consumers only need to depend
//! on `marginalia-browser`.

pub use marginalia_core;
pub use marginalia_core::*;

pub mod decorator;
pub mod document;
pub mod events;
pub mod settle;

pub use decorator::{RoughDecoration, RoughDecorator};
pub use document::BrowserDocument;
pub use events::{GlobalListeners, listen_pointer_up};
pub use settle::{SettleTimer, defer, schedule_flush};

/// A session wired to the live DOM.
pub type BrowserSession = AnnotationSession<BrowserDocument, RoughDecorator>;
