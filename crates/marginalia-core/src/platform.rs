//! Platform abstraction traits for document access.
//!
//! These traits define the interface between the annotation logic and the
//! document it decorates. The browser implementation wraps the DOM through
//! web-sys; [`MemoryDocument`](crate::dom::MemoryDocument) implements the same
//! contract over an in-memory tree so the engine runs natively and in tests.

use std::fmt::Debug;

use smol_str::SmolStr;

use crate::style::DecorationConfig;
use crate::types::Rect;

/// Error type for platform operations.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformError(pub String);

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for PlatformError {}

impl From<&str> for PlatformError {
    fn from(s: &str) -> Self {
        PlatformError(s.to_string())
    }
}

impl From<String> for PlatformError {
    fn from(s: String) -> Self {
        PlatformError(s)
    }
}

/// A pair of tree points delimiting a range.
///
/// Each point is either `(text node, UTF-16 offset into its data)` or
/// `(element, child index)`, mirroring DOM range boundary points.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary<N> {
    pub start_node: N,
    pub start_offset: usize,
    pub end_node: N,
    pub end_offset: usize,
}

impl<N: PartialEq> Boundary<N> {
    pub fn new(start_node: N, start_offset: usize, end_node: N, end_offset: usize) -> Self {
        Self {
            start_node,
            start_offset,
            end_node,
            end_offset,
        }
    }

    /// Structurally collapsed: both points are the same.
    pub fn is_collapsed(&self) -> bool {
        self.start_node == self.end_node && self.start_offset == self.end_offset
    }
}

/// Attributes of a marker element to create.
///
/// Rendered as `<span id="{id}" class="{class}" {data_attribute}="{annotation_id}">`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSpec {
    pub id: SmolStr,
    pub class: SmolStr,
    pub data_attribute: SmolStr,
    pub annotation_id: SmolStr,
}

/// Access to a document tree.
///
/// Node handles are cheap to clone and compare. Text offsets are UTF-16 code
/// units. Mutating operations are all-or-nothing: on error the tree is left
/// exactly as it was.
pub trait DocumentAdapter {
    type Node: Clone + PartialEq + Debug;

    // === Tree ===

    fn is_text(&self, node: &Self::Node) -> bool;

    /// Character data of a text node, None for elements.
    fn text(&self, node: &Self::Node) -> Option<String>;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// Whether the node is attached to the live document.
    fn is_connected(&self, node: &Self::Node) -> bool;

    // === Attributes ===

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);

    fn has_class(&self, node: &Self::Node, class: &str) -> bool;

    /// Find a connected element by id.
    fn get_element_by_id(&self, id: &str) -> Option<Self::Node>;

    /// Find the first connected element whose attribute `name` equals `value`.
    fn find_by_attribute(&self, name: &str, value: &str) -> Option<Self::Node>;

    // === Mutation ===

    /// Create a detached, empty marker element.
    fn create_marker(&mut self, spec: &MarkerSpec) -> Result<Self::Node, PlatformError>;

    /// Wrap the boundary's contents in `marker`.
    ///
    /// Fails when the range partially selects an element.
    fn surround_contents(
        &mut self,
        boundary: &Boundary<Self::Node>,
        marker: &Self::Node,
    ) -> Result<(), PlatformError>;

    /// Extract the boundary's contents (splitting partially selected elements),
    /// append them to `marker` and insert `marker` where the range started.
    fn extract_into(
        &mut self,
        boundary: &Boundary<Self::Node>,
        marker: &Self::Node,
    ) -> Result<(), PlatformError>;

    /// Insert `node` into `parent` before `reference`, or at the end.
    fn insert_before(
        &mut self,
        parent: &Self::Node,
        node: &Self::Node,
        reference: Option<&Self::Node>,
    ) -> Result<(), PlatformError>;

    /// Detach a node from its parent.
    fn remove(&mut self, node: &Self::Node) -> Result<(), PlatformError>;

    /// Merge adjacent text nodes and drop empty ones below `node`.
    fn normalize(&mut self, node: &Self::Node);

    // === Selection ===

    /// Current live selection, if any.
    fn selection(&self) -> Option<Boundary<Self::Node>>;

    fn clear_selection(&mut self);

    // === Geometry ===

    /// Per-line rectangles covered by a range, in viewport coordinates.
    fn client_rects(&self, boundary: &Boundary<Self::Node>) -> Vec<Rect>;

    /// Bounding box of a node, None when it is not laid out.
    fn bounding_rect(&self, node: &Self::Node) -> Option<Rect>;

    fn scroll_top(&self, node: &Self::Node) -> f64;

    // === Provided ===

    fn element_id(&self, node: &Self::Node) -> Option<String> {
        self.attribute(node, "id").filter(|id| !id.is_empty())
    }

    fn set_element_id(&mut self, node: &Self::Node, id: &str) {
        self.set_attribute(node, "id", id);
    }

    /// Inclusive descendant check.
    fn contains(&self, ancestor: &Self::Node, node: &Self::Node) -> bool {
        let mut current = Some(node.clone());
        while let Some(n) = current {
            if &n == ancestor {
                return true;
            }
            current = self.parent(&n);
        }
        false
    }

    /// Nearest inclusive ancestor element carrying `class`.
    fn closest_with_class(&self, node: &Self::Node, class: &str) -> Option<Self::Node> {
        let mut current = Some(node.clone());
        while let Some(n) = current {
            if !self.is_text(&n) && self.has_class(&n, class) {
                return Some(n);
            }
            current = self.parent(&n);
        }
        None
    }

    /// Concatenated text of all descendant text nodes.
    fn text_content(&self, node: &Self::Node) -> String {
        if let Some(text) = self.text(node) {
            return text;
        }
        let mut out = String::new();
        for child in self.children(node) {
            out.push_str(&self.text_content(&child));
        }
        out
    }

    /// Boundary covering all contents of an element.
    fn contents_boundary(&self, node: &Self::Node) -> Boundary<Self::Node> {
        let end = match self.text(node) {
            Some(text) => crate::text::utf16_len(&text),
            None => self.children(node).len(),
        };
        Boundary::new(node.clone(), 0, node.clone(), end)
    }

    /// Bounding box of a range.
    fn range_rect(&self, boundary: &Boundary<Self::Node>) -> Rect {
        Rect::bounding(&self.client_rects(boundary)).unwrap_or_default()
    }
}

/// A live decoration drawn over a marker element.
pub trait DecorationHandle {
    fn show(&mut self);
    fn hide(&mut self);
    /// Tear the decoration down. The handle is inert afterwards.
    fn remove(&mut self);
}

/// Factory for decorations (the sketch-style overlay library in the browser).
pub trait Decorator<N> {
    type Handle: DecorationHandle;

    fn annotate(&mut self, element: &N, marker_id: &str, config: &DecorationConfig)
    -> Self::Handle;
}
