//! Core annotation types: regions, offset ranges, targets and the annotation record.
//!
//! These types are framework-agnostic. Everything that touches a live tree goes
//! through [`DocumentAdapter`](crate::platform::DocumentAdapter).

use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, format_smolstr};
use web_time::{SystemTime, UNIX_EPOCH};

use crate::style::AnnotationStyle;

/// Identifier of an annotation.
///
/// Client-generated ids look like `annotation-1718000000000-1a`; once the
/// backend confirms a record the id is replaced with the server id.
pub type AnnotationId = SmolStr;

/// One of the containers an annotation can target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// Plain preformatted text.
    Clean,
    /// A second plain-text region (translation).
    Translate,
    /// Arbitrary rendered markup.
    Rendered,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Clean, Region::Translate, Region::Rendered];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Clean => "clean",
            Region::Translate => "translate",
            Region::Rendered => "rendered",
        }
    }

    /// Whether the region holds plain text rather than markup.
    pub fn is_text_mode(&self) -> bool {
        matches!(self, Region::Clean | Region::Translate)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clean" => Ok(Region::Clean),
            "translate" => Ok(Region::Translate),
            "rendered" => Ok(Region::Rendered),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Returned when parsing a region or style name that doesn't exist.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant: {0}")]
pub struct UnknownVariant(pub String);

/// Offset pair into the flattened text of a container.
///
/// Offsets are UTF-16 code units, the unit browsers use for text node offsets.
/// `start <= end` always holds; the constructor orders its arguments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OffsetRange {
    pub start: usize,
    pub end: usize,
}

impl OffsetRange {
    /// Create a range, ordering the bounds.
    pub fn new(a: usize, b: usize) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    /// Create a zero-width range.
    pub fn collapsed(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.is_collapsed()
    }

    /// Check if an offset is within the range (end exclusive).
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }

    pub fn to_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl From<Range<usize>> for OffsetRange {
    fn from(r: Range<usize>) -> Self {
        Self::new(r.start, r.end)
    }
}

/// Durable description of an annotated span.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextOffset {
    pub start: usize,
    pub end: usize,
    /// Text captured at selection time, used to validate stored offsets.
    pub text: String,
}

impl TextOffset {
    pub fn new(range: OffsetRange, text: impl Into<String>) -> Self {
        Self {
            start: range.start,
            end: range.end,
            text: text.into(),
        }
    }

    pub fn range(&self) -> OffsetRange {
        OffsetRange::new(self.start, self.end)
    }
}

/// Where an annotation points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationTarget {
    pub region: Region,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_offset: Option<TextOffset>,
    /// Id of the currently injected marker element. A rendering cache, rewritten
    /// on every (re)decoration and never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<SmolStr>,
}

impl AnnotationTarget {
    /// Target located by text offsets.
    pub fn text(region: Region, text_offset: TextOffset) -> Self {
        Self {
            region,
            text_offset: Some(text_offset),
            span_id: None,
        }
    }

    /// Target that is already wrapped in a marker element and carries no offsets.
    pub fn anchored(region: Region, span_id: impl Into<SmolStr>) -> Self {
        Self {
            region,
            text_offset: None,
            span_id: Some(span_id.into()),
        }
    }
}

/// Pixel offset of an annotation relative to its container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub top: f64,
    pub left: f64,
}

/// Axis-aligned rectangle in viewport coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Zero width and height; what browsers report for detached ranges.
    pub fn is_empty(&self) -> bool {
        self.width == 0.0 && self.height == 0.0
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    /// Bounding box of a set of rects, `None` if the set is empty.
    pub fn bounding(rects: &[Rect]) -> Option<Rect> {
        let (first, rest) = rects.split_first()?;
        Some(rest.iter().fold(*first, |acc, r| acc.union(r)))
    }
}

/// A note attached to a span of text.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: AnnotationId,
    pub content: String,
    pub style: AnnotationStyle,
    pub target: AnnotationTarget,
    pub position: Position,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub meta: serde_json::Map<String, serde_json::Value>,
    /// Whether `id` was assigned by the backend.
    pub persisted: bool,
}

impl Annotation {
    /// Create a fresh, unsaved annotation.
    pub fn new(id: AnnotationId, style: AnnotationStyle, target: AnnotationTarget) -> Self {
        let now = Utc::now();
        Self {
            id,
            content: String::new(),
            style,
            target,
            position: Position::default(),
            created_at: now,
            updated_at: now,
            meta: serde_json::Map::new(),
            persisted: false,
        }
    }

    pub fn region(&self) -> Region {
        self.target.region
    }
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a client-side id with the given prefix.
///
/// Format: `{prefix}-{unix millis}-{base36 counter}`. Unique within a process.
pub fn generate_id(prefix: &str) -> AnnotationId {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let n = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format_smolstr!("{}-{}-{}", prefix, millis, to_base36(n))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_range_orders_bounds() {
        let r = OffsetRange::new(9, 4);
        assert_eq!(r.start, 4);
        assert_eq!(r.end, 9);
        assert_eq!(r.len(), 5);
        assert!(r.contains(4));
        assert!(!r.contains(9)); // end is exclusive
    }

    #[test]
    fn test_offset_range_collapsed() {
        let r = OffsetRange::collapsed(3);
        assert!(r.is_collapsed());
        assert!(r.is_empty());
        assert_eq!(r.to_range(), 3..3);
    }

    #[test]
    fn test_region_round_trip_names() {
        for region in Region::ALL {
            assert_eq!(region.as_str().parse::<Region>(), Ok(region));
        }
        assert!("margin".parse::<Region>().is_err());
        assert!(Region::Clean.is_text_mode());
        assert!(!Region::Rendered.is_text_mode());
    }

    #[test]
    fn test_rect_union_and_empty() {
        let a = Rect::new(0.0, 0.0, 10.0, 16.0);
        let b = Rect::new(5.0, 16.0, 20.0, 16.0);
        assert_eq!(a.union(&b), Rect::new(0.0, 0.0, 25.0, 32.0));
        assert_eq!(Rect::bounding(&[a, b]), Some(Rect::new(0.0, 0.0, 25.0, 32.0)));
        assert_eq!(Rect::bounding(&[]), None);
        assert!(Rect::default().is_empty());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = generate_id("annotation");
        let b = generate_id("annotation");
        assert_ne!(a, b);
        assert!(a.starts_with("annotation-"));
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_target_serializes_without_span_cache() {
        let target = AnnotationTarget::text(
            Region::Clean,
            TextOffset::new(OffsetRange::new(4, 9), "quick"),
        );
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "region": "clean",
                "textOffset": { "start": 4, "end": 9, "text": "quick" }
            })
        );
    }
}
