//! Error taxonomy for annotation operations.

use smol_str::SmolStr;

use crate::platform::PlatformError;
use crate::types::AnnotationId;

/// Errors produced by annotation operations.
///
/// DOM and geometry failures are normally caught at the operation boundary and
/// logged. Transport failures reach the user only through a notifier.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AnnotationError {
    #[error("offsets {start}..{end} exceed container text length {len}")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },

    #[error("could not resolve boundary: {0}")]
    BoundaryNotFound(String),

    #[error("stored text {expected:?} does not match container text {found:?}")]
    TextMismatch { expected: String, found: String },

    #[error("failed to wrap range in marker {marker_id}")]
    InjectionFailed { marker_id: SmolStr },

    #[error("annotation request failed: {0}")]
    TransportFailure(String),

    #[error("annotation not found: {0}")]
    NotFound(AnnotationId),

    #[error("no pending selection")]
    NoSelection,

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl AnnotationError {
    pub fn boundary(msg: impl Into<String>) -> Self {
        Self::BoundaryNotFound(msg.into())
    }

    pub fn transport(msg: impl std::fmt::Display) -> Self {
        Self::TransportFailure(msg.to_string())
    }
}
