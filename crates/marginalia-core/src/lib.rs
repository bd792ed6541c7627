//! marginalia-core: text-range annotation without a browser.
//!
//! This crate provides:
//! - `DocumentAdapter` / `Decorator` traits for the tree and drawing seams
//! - `MemoryDocument` - an in-memory tree with deterministic layout
//! - offset mapping between boundary points and flattened UTF-16 offsets
//! - marker injection and release
//! - `AnnotationStore`, `SelectionToolbar` and `AnnotationSession`
//! - `PersistenceBridge` for the annotation HTTP API

pub mod dom;
pub mod error;
pub mod inject;
pub mod offset_map;
pub mod persist;
pub mod platform;
pub mod session;
pub mod store;
pub mod style;
pub mod text;
pub mod toolbar;
pub mod types;

pub use dom::{DecorationState, LayoutMetrics, MemoryDecorator, MemoryDocument, NodeId};
pub use error::AnnotationError;
pub use inject::{inject, release, release_by_annotation};
pub use offset_map::{TextSnapshots, compute_offset, locate_boundary, point_offset, text_nodes};
pub use persist::{
    AnnotationApi, AnnotationPatch, AnnotationRecord, ApiResponse, CreateAnnotationRecord,
    EntityRef, FollowUp, Notifier, PersistenceBridge, TargetRecord, reconcile_created, rehydrate,
};
pub use platform::{
    Boundary, DecorationHandle, Decorator, DocumentAdapter, MarkerSpec, PlatformError,
};
pub use session::AnnotationSession;
pub use smol_str::SmolStr;
pub use store::{AnnotationStore, DecorationStatus, StoreOptions};
pub use style::{
    AnnotationStyle, BracketSide, DecorationConfig, DecorationKind, STYLES, StyleDescriptor,
    available_styles, build_decoration_config, first_multiline_style, style_for_selection,
};
pub use toolbar::{PendingSelection, SelectionToolbar, ToolbarOptions, ToolbarState};
pub use types::{
    Annotation, AnnotationId, AnnotationTarget, OffsetRange, Position, Rect, Region, TextOffset,
    generate_id,
};
