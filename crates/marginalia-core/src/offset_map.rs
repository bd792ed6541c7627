//! Mapping between flattened container text offsets and tree boundary points.
//!
//! A container's text is the concatenation of its descendant text nodes in
//! document order. Offsets into that text are UTF-16 code units and are what
//! annotations persist; boundaries are what the tree operates on.

use std::collections::HashMap;

use smol_str::{SmolStr, format_smolstr};

use crate::error::AnnotationError;
use crate::platform::{Boundary, DocumentAdapter};
use crate::text::utf16_len;
use crate::types::OffsetRange;

/// Text nodes below `root` in document order.
pub fn text_nodes<A: DocumentAdapter>(adapter: &A, root: &A::Node) -> Vec<A::Node> {
    text_nodes_with_paths(adapter, root)
        .into_iter()
        .map(|(node, _, _)| node)
        .collect()
}

/// Text nodes with their child-index path relative to `root` and their length.
fn text_nodes_with_paths<A: DocumentAdapter>(
    adapter: &A,
    root: &A::Node,
) -> Vec<(A::Node, Vec<usize>, usize)> {
    let mut out = Vec::new();
    let mut stack = vec![(root.clone(), Vec::new())];
    while let Some((node, path)) = stack.pop() {
        if let Some(text) = adapter.text(&node) {
            out.push((node, path, utf16_len(&text)));
            continue;
        }
        for (i, child) in adapter.children(&node).into_iter().enumerate().rev() {
            let mut child_path = path.clone();
            child_path.push(i);
            stack.push((child, child_path));
        }
    }
    out
}

/// Path from `container` down to `node`, None if `node` is outside it.
fn relative_path<A: DocumentAdapter>(
    adapter: &A,
    container: &A::Node,
    node: &A::Node,
) -> Option<Vec<usize>> {
    let mut path = Vec::new();
    let mut current = node.clone();
    while &current != container {
        let parent = adapter.parent(&current)?;
        let idx = adapter.children(&parent).iter().position(|c| c == &current)?;
        path.push(idx);
        current = parent;
    }
    path.reverse();
    Some(path)
}

/// Flattened offset of a single boundary point.
///
/// Element-anchored points `(element, child index)` count every text node
/// whose path sorts before `(element path, child index)`.
pub fn point_offset<A: DocumentAdapter>(
    adapter: &A,
    container: &A::Node,
    node: &A::Node,
    offset: usize,
) -> Result<usize, AnnotationError> {
    let mut path = relative_path(adapter, container, node)
        .ok_or_else(|| AnnotationError::boundary("boundary point is outside the container"))?;

    let key = match adapter.text(node) {
        Some(text) => {
            if offset > utf16_len(&text) {
                return Err(AnnotationError::boundary(format!(
                    "offset {} is past the end of its text node",
                    offset
                )));
            }
            (path, Some(offset))
        }
        None => {
            path.push(offset);
            (path, None)
        }
    };

    let mut total = 0;
    for (text_node, text_path, len) in text_nodes_with_paths(adapter, container) {
        if &text_node == node {
            return Ok(total + offset);
        }
        if (text_path, Some(0)) >= key {
            break;
        }
        total += len;
    }
    Ok(total)
}

/// Compute the flattened offsets of a boundary within `container`.
///
/// A reversed boundary yields an ordered range.
pub fn compute_offset<A: DocumentAdapter>(
    adapter: &A,
    container: &A::Node,
    boundary: &Boundary<A::Node>,
) -> Result<OffsetRange, AnnotationError> {
    let start = point_offset(adapter, container, &boundary.start_node, boundary.start_offset)?;
    let end = point_offset(adapter, container, &boundary.end_node, boundary.end_offset)?;
    tracing::trace!(target: "marginalia::offset", start, end, "computed offsets");
    Ok(OffsetRange::new(start, end))
}

/// Resolve flattened offsets back to a boundary in the live tree.
///
/// The start lands in the first text node whose cumulative span passes
/// `start`; the end in the first whose span reaches `end`.
pub fn locate_boundary<A: DocumentAdapter>(
    adapter: &A,
    container: &A::Node,
    range: OffsetRange,
) -> Result<Boundary<A::Node>, AnnotationError> {
    let texts = text_nodes_with_paths(adapter, container);
    let total: usize = texts.iter().map(|(_, _, len)| len).sum();
    if range.start > range.end || range.end > total {
        return Err(AnnotationError::RangeOutOfBounds {
            start: range.start,
            end: range.end,
            len: total,
        });
    }
    let Some((last, _, last_len)) = texts.last() else {
        return Err(AnnotationError::boundary("container has no text nodes"));
    };

    let mut start = None;
    let mut end = None;
    let mut cumulative = 0;
    for (node, _, len) in &texts {
        if start.is_none() && cumulative + len > range.start {
            start = Some((node.clone(), range.start - cumulative));
        }
        if end.is_none() && cumulative + len >= range.end {
            end = Some((node.clone(), range.end - cumulative));
        }
        if start.is_some() && end.is_some() {
            break;
        }
        cumulative += len;
    }

    let start = start.unwrap_or_else(|| (last.clone(), *last_len));
    let end = if range.is_collapsed() {
        start.clone()
    } else {
        end.unwrap_or_else(|| (last.clone(), *last_len))
    };
    tracing::trace!(target: "marginalia::offset", ?start, ?end, "located boundary");
    Ok(Boundary::new(start.0, start.1, end.0, end.1))
}

/// Frozen copies of container text, keyed by container element id.
///
/// A snapshot is taken the first time a container is seen and never rewritten,
/// so markers injected later do not perturb offset validation.
#[derive(Debug, Clone, Default)]
pub struct TextSnapshots {
    texts: HashMap<SmolStr, String>,
    next_key: u64,
}

impl TextSnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of a container, assigning `text-element-{n}` if it has none.
    pub fn container_key<A: DocumentAdapter>(&mut self, adapter: &mut A, container: &A::Node) -> SmolStr {
        if let Some(id) = adapter.element_id(container) {
            return SmolStr::new(id);
        }
        loop {
            let key = format_smolstr!("text-element-{}", self.next_key);
            self.next_key += 1;
            if adapter.get_element_by_id(&key).is_none() {
                adapter.set_element_id(container, &key);
                return key;
            }
        }
    }

    /// The container's snapshot, capturing it on first use.
    pub fn snapshot<A: DocumentAdapter>(&mut self, adapter: &mut A, container: &A::Node) -> (SmolStr, String) {
        let key = self.container_key(adapter, container);
        let text = self
            .texts
            .entry(key.clone())
            .or_insert_with(|| {
                tracing::debug!(target: "marginalia::offset", container = %key, "captured text snapshot");
                adapter.text_content(container)
            })
            .clone();
        (key, text)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.texts.get(key).map(String::as_str)
    }

    /// Drop a snapshot, e.g. after the container's content was replaced.
    pub fn forget(&mut self, key: &str) -> bool {
        self.texts.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.texts.clear();
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{MemoryDocument, NodeId};

    /// `<div>The <b>quick</b> brown <img> fox</div>`
    fn make_mixed() -> (MemoryDocument, NodeId) {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let div = doc.append_element(root, "div", &[]);
        doc.append_text(div, "The ");
        let b = doc.append_element(div, "b", &[]);
        doc.append_text(b, "quick");
        doc.append_text(div, " brown ");
        doc.append_element(div, "img", &[("src", "fox.png")]);
        doc.append_text(div, " fox");
        (doc, div)
    }

    #[test]
    fn test_round_trip_law() {
        let (doc, div) = make_mixed();
        let len = utf16_len(&doc.text_content(&div));
        assert_eq!(len, 20);
        for start in 0..=len {
            for end in start..=len {
                let range = OffsetRange::new(start, end);
                let boundary = locate_boundary(&doc, &div, range).unwrap();
                assert_eq!(compute_offset(&doc, &div, &boundary).unwrap(), range, "{range:?}");
            }
        }
    }

    #[test]
    fn test_locate_picks_spanning_nodes() {
        let (doc, div) = make_mixed();
        let boundary = locate_boundary(&doc, &div, OffsetRange::new(4, 9)).unwrap();
        assert_eq!(doc.text(&boundary.start_node).as_deref(), Some("quick"));
        assert_eq!(boundary.start_offset, 0);
        assert_eq!(doc.text(&boundary.end_node).as_deref(), Some("quick"));
        assert_eq!(boundary.end_offset, 5);
    }

    #[test]
    fn test_element_anchored_points() {
        let (doc, div) = make_mixed();
        // Before the <b>: after "The "
        assert_eq!(point_offset(&doc, &div, &div, 1).unwrap(), 4);
        // Right after the <img>
        assert_eq!(point_offset(&doc, &div, &div, 4).unwrap(), 16);
        // End of the container
        assert_eq!(point_offset(&doc, &div, &div, 5).unwrap(), 20);
        let b = doc.children(&div)[1];
        assert_eq!(point_offset(&doc, &div, &b, 1).unwrap(), 9);
    }

    #[test]
    fn test_reversed_boundary_is_normalised() {
        let (doc, pre) = MemoryDocument::with_text("abcdef");
        let text = doc.children(&pre)[0];
        let range = compute_offset(&doc, &pre, &Boundary::new(text, 5, text, 2)).unwrap();
        assert_eq!(range, OffsetRange::new(2, 5));
    }

    #[test]
    fn test_point_outside_container() {
        let (mut doc, pre) = MemoryDocument::with_text("abcdef");
        let root = doc.root();
        let other = doc.append_text(root, "elsewhere");
        let err = compute_offset(&doc, &pre, &Boundary::new(other, 0, other, 3)).unwrap_err();
        assert!(matches!(err, AnnotationError::BoundaryNotFound(_)));
    }

    #[test]
    fn test_out_of_bounds_range() {
        let (doc, pre) = MemoryDocument::with_text("The quick brown fox.");
        let err = locate_boundary(&doc, &pre, OffsetRange::new(100, 110)).unwrap_err();
        assert_eq!(
            err,
            AnnotationError::RangeOutOfBounds {
                start: 100,
                end: 110,
                len: 20
            }
        );
    }

    #[test]
    fn test_empty_range_at_end() {
        let (doc, pre) = MemoryDocument::with_text("abc");
        let boundary = locate_boundary(&doc, &pre, OffsetRange::collapsed(3)).unwrap();
        assert!(boundary.is_collapsed());
        assert_eq!(boundary.start_offset, 3);
    }

    #[test]
    fn test_collapsed_range_between_nodes_is_not_reversed() {
        let (doc, div) = make_mixed();
        let boundary = locate_boundary(&doc, &div, OffsetRange::collapsed(4)).unwrap();
        assert!(boundary.is_collapsed());
    }

    #[test]
    fn test_no_text_nodes() {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let div = doc.append_element(root, "div", &[]);
        let err = locate_boundary(&doc, &div, OffsetRange::collapsed(0)).unwrap_err();
        assert!(matches!(err, AnnotationError::BoundaryNotFound(_)));
    }

    #[test]
    fn test_utf16_offsets() {
        let (doc, pre) = MemoryDocument::with_text("🦀 crab");
        let boundary = locate_boundary(&doc, &pre, OffsetRange::new(3, 7)).unwrap();
        assert_eq!(compute_offset(&doc, &pre, &boundary).unwrap(), OffsetRange::new(3, 7));
    }

    #[test]
    fn test_snapshot_assigns_key_once() {
        let (mut doc, pre) = MemoryDocument::with_text("abc");
        let mut snapshots = TextSnapshots::new();
        let (key, text) = snapshots.snapshot(&mut doc, &pre);
        assert!(key.starts_with("text-element-"));
        assert_eq!(text, "abc");
        assert_eq!(doc.element_id(&pre).as_deref(), Some(key.as_str()));

        doc.replace_text_content(pre, "changed");
        let (again, text) = snapshots.snapshot(&mut doc, &pre);
        assert_eq!(again, key);
        assert_eq!(text, "abc");

        assert!(snapshots.forget(&key));
        assert_eq!(snapshots.snapshot(&mut doc, &pre).1, "changed");
    }

    #[test]
    fn test_snapshot_reuses_existing_id() {
        let (mut doc, pre) = MemoryDocument::with_text("abc");
        doc.set_element_id(&pre, "body-text");
        let mut snapshots = TextSnapshots::new();
        assert_eq!(snapshots.container_key(&mut doc, &pre), "body-text");
        snapshots.clear();
        assert!(snapshots.is_empty());
    }
}
