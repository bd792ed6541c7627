//! Marker injection: wrapping a boundary in a `span` and unwrapping it again.

use crate::error::AnnotationError;
use crate::platform::{Boundary, DocumentAdapter, MarkerSpec, PlatformError};

/// Wrap the boundary's contents in a new marker element.
///
/// Tries a clean surround first and falls back to extracting the contents,
/// which splits partially selected elements. Either way the flattened text is
/// unchanged. A collapsed boundary, or a failure of both strategies, yields
/// `InjectionFailed` with the tree untouched.
pub fn inject<A: DocumentAdapter>(
    adapter: &mut A,
    boundary: &Boundary<A::Node>,
    spec: &MarkerSpec,
) -> Result<A::Node, AnnotationError> {
    if boundary.is_collapsed() {
        return Err(AnnotationError::InjectionFailed {
            marker_id: spec.id.clone(),
        });
    }
    let marker = adapter.create_marker(spec).map_err(|e| {
        tracing::warn!(marker = %spec.id, error = %e, "could not create marker");
        AnnotationError::InjectionFailed {
            marker_id: spec.id.clone(),
        }
    })?;
    match adapter.surround_contents(boundary, &marker) {
        Ok(()) => return Ok(marker),
        Err(e) => {
            tracing::debug!(marker = %spec.id, error = %e, "surround failed, extracting instead");
        }
    }
    match adapter.extract_into(boundary, &marker) {
        Ok(()) => Ok(marker),
        Err(e) => {
            tracing::warn!(marker = %spec.id, error = %e, "marker injection failed");
            Err(AnnotationError::InjectionFailed {
                marker_id: spec.id.clone(),
            })
        }
    }
}

/// Unwrap every connected marker with this id. Returns whether any was found.
pub fn release<A: DocumentAdapter>(adapter: &mut A, marker_id: &str) -> bool {
    release_where(adapter, |a| a.get_element_by_id(marker_id))
}

/// Unwrap every connected marker tagged with `annotation_id` in `data_attribute`.
pub fn release_by_annotation<A: DocumentAdapter>(
    adapter: &mut A,
    data_attribute: &str,
    annotation_id: &str,
) -> bool {
    release_where(adapter, |a| a.find_by_attribute(data_attribute, annotation_id))
}

fn release_where<A, F>(adapter: &mut A, find: F) -> bool
where
    A: DocumentAdapter,
    F: Fn(&A) -> Option<A::Node>,
{
    let mut released = false;
    // An extraction can split one marker into several elements sharing the id.
    while let Some(marker) = find(adapter) {
        if let Err(e) = unwrap(adapter, &marker) {
            tracing::warn!(error = %e, "failed to unwrap marker");
            break;
        }
        released = true;
    }
    released
}

/// Move a marker's children to its position and drop it.
fn unwrap<A: DocumentAdapter>(adapter: &mut A, marker: &A::Node) -> Result<(), PlatformError> {
    let parent = adapter
        .parent(marker)
        .ok_or_else(|| PlatformError::from("marker has no parent"))?;
    for child in adapter.children(marker) {
        adapter.insert_before(&parent, &child, Some(marker))?;
    }
    adapter.remove(marker)?;
    adapter.normalize(&parent);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{MemoryDocument, NodeId};
    use crate::offset_map::locate_boundary;
    use crate::types::OffsetRange;
    use smol_str::SmolStr;

    fn spec(id: &str, annotation: &str) -> MarkerSpec {
        MarkerSpec {
            id: SmolStr::new(id),
            class: SmolStr::new("annotation-target"),
            data_attribute: SmolStr::new("data-annotation-id"),
            annotation_id: SmolStr::new(annotation),
        }
    }

    fn make_rendered() -> (MemoryDocument, NodeId) {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let div = doc.append_element(root, "div", &[("class", "annotation-container")]);
        let p = doc.append_element(div, "p", &[]);
        doc.append_text(p, "Some ");
        let em = doc.append_element(p, "em", &[]);
        doc.append_text(em, "emphasised");
        doc.append_text(p, " words.");
        let p2 = doc.append_element(div, "p", &[]);
        doc.append_text(p2, "Second paragraph.");
        (doc, div)
    }

    #[test]
    fn test_inject_release_preserves_text() {
        let (mut doc, div) = make_rendered();
        let original = doc.text_content(&div);
        let len = crate::text::utf16_len(&original);
        for (start, end) in [(0, 4), (2, 9), (5, 15), (8, 30), (0, len)] {
            let boundary = locate_boundary(&doc, &div, OffsetRange::new(start, end)).unwrap();
            inject(&mut doc, &boundary, &spec("m", "a")).unwrap();
            assert_eq!(doc.text_content(&div), original, "{start}..{end}");
            assert!(release(&mut doc, "m"));
            assert_eq!(doc.text_content(&div), original);
        }
        // Clean surrounds restore the markup exactly
        let (mut doc, div) = make_rendered();
        let html = doc.inner_html(div);
        let boundary = locate_boundary(&doc, &div, OffsetRange::new(0, 4)).unwrap();
        inject(&mut doc, &boundary, &spec("m", "a")).unwrap();
        release(&mut doc, "m");
        assert_eq!(doc.inner_html(div), html);
    }

    #[test]
    fn test_inject_across_elements_wraps_selection() {
        let (mut doc, div) = make_rendered();
        let boundary = locate_boundary(&doc, &div, OffsetRange::new(2, 9)).unwrap();
        let marker = inject(&mut doc, &boundary, &spec("m", "a")).unwrap();
        assert_eq!(doc.text_content(&marker), "me emph");
        insta::assert_snapshot!(doc.inner_html(div), @r#"<p>So<span id="m" class="annotation-target" data-annotation-id="a">me <em>emph</em></span><em>asised</em> words.</p><p>Second paragraph.</p>"#);
    }

    #[test]
    fn test_inject_collapsed_fails() {
        let (mut doc, div) = make_rendered();
        let boundary = locate_boundary(&doc, &div, OffsetRange::collapsed(3)).unwrap();
        let err = inject(&mut doc, &boundary, &spec("m", "a")).unwrap_err();
        assert!(matches!(err, AnnotationError::InjectionFailed { .. }));
        assert_eq!(doc.get_element_by_id("m"), None);
    }

    #[test]
    fn test_release_is_idempotent() {
        let (mut doc, pre) = MemoryDocument::with_text("The quick brown fox");
        let boundary = locate_boundary(&doc, &pre, OffsetRange::new(4, 9)).unwrap();
        inject(&mut doc, &boundary, &spec("m", "a")).unwrap();
        assert!(release_by_annotation(&mut doc, "data-annotation-id", "a"));
        assert!(!release_by_annotation(&mut doc, "data-annotation-id", "a"));
        assert!(!release(&mut doc, "m"));
        assert_eq!(doc.children(&pre).len(), 1);
        assert_eq!(doc.inner_html(pre), "The quick brown fox");
    }

    #[test]
    fn test_release_merges_split_markers() {
        let (mut doc, div) = make_rendered();
        // First marker covers "emphasised words"
        let first = locate_boundary(&doc, &div, OffsetRange::new(5, 21)).unwrap();
        inject(&mut doc, &first, &spec("m1", "a1")).unwrap();
        // Second one overlaps the first's start, splitting it
        let second = locate_boundary(&doc, &div, OffsetRange::new(0, 8)).unwrap();
        inject(&mut doc, &second, &spec("m2", "a2")).unwrap();
        let original = "Some emphasised words.Second paragraph.";
        assert_eq!(doc.text_content(&div), original);
        release(&mut doc, "m1");
        release(&mut doc, "m2");
        assert_eq!(doc.get_element_by_id("m1"), None);
        assert_eq!(doc.get_element_by_id("m2"), None);
        assert_eq!(doc.text_content(&div), original);
    }
}
