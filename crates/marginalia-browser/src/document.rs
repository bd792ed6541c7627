//! `DocumentAdapter` over the live DOM.
//!
//! Boundary offsets map one-to-one onto DOM range offsets: UTF-16 code units
//! for text nodes, child indices for elements.

use marginalia_core::{Boundary, DocumentAdapter, MarkerSpec, PlatformError, Rect};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, Node, Range, Window};

fn js_err(context: &'static str) -> impl Fn(JsValue) -> PlatformError {
    move |e| PlatformError(format!("{context} failed: {e:?}"))
}

fn to_rect(rect: &web_sys::DomRect) -> Rect {
    Rect::new(rect.x(), rect.y(), rect.width(), rect.height())
}

/// Quote a value for an attribute selector.
fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// The browser document.
#[derive(Debug, Clone)]
pub struct BrowserDocument {
    window: Window,
    document: Document,
}

impl BrowserDocument {
    pub fn new() -> Result<Self, PlatformError> {
        let window = web_sys::window().ok_or("no window")?;
        let document = window.document().ok_or("no document")?;
        Ok(Self { window, document })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    fn element<'a>(&self, node: &'a Node) -> Option<&'a Element> {
        node.dyn_ref::<Element>()
    }

    /// A DOM range for a boundary.
    pub fn make_range(&self, boundary: &Boundary<Node>) -> Result<Range, PlatformError> {
        let range = self.document.create_range().map_err(js_err("create_range"))?;
        range
            .set_start(&boundary.start_node, boundary.start_offset as u32)
            .map_err(js_err("set_start"))?;
        range
            .set_end(&boundary.end_node, boundary.end_offset as u32)
            .map_err(js_err("set_end"))?;
        Ok(range)
    }

    fn live_selection(&self) -> Option<web_sys::Selection> {
        self.window.get_selection().ok().flatten()
    }
}

impl DocumentAdapter for BrowserDocument {
    type Node = Node;

    fn is_text(&self, node: &Node) -> bool {
        node.node_type() == Node::TEXT_NODE
    }

    fn text(&self, node: &Node) -> Option<String> {
        if self.is_text(node) {
            Some(node.node_value().unwrap_or_default())
        } else {
            None
        }
    }

    fn parent(&self, node: &Node) -> Option<Node> {
        node.parent_node()
    }

    fn children(&self, node: &Node) -> Vec<Node> {
        let list = node.child_nodes();
        (0..list.length()).filter_map(|i| list.item(i)).collect()
    }

    fn is_connected(&self, node: &Node) -> bool {
        node.is_connected()
    }

    fn attribute(&self, node: &Node, name: &str) -> Option<String> {
        self.element(node)?.get_attribute(name)
    }

    fn set_attribute(&mut self, node: &Node, name: &str, value: &str) {
        let Some(element) = self.element(node) else {
            return;
        };
        if let Err(e) = element.set_attribute(name, value) {
            tracing::warn!(name, error = ?e, "set_attribute failed");
        }
    }

    fn has_class(&self, node: &Node, class: &str) -> bool {
        self.element(node)
            .map(|el| el.class_list().contains(class))
            .unwrap_or(false)
    }

    fn get_element_by_id(&self, id: &str) -> Option<Node> {
        self.document.get_element_by_id(id).map(Node::from)
    }

    fn find_by_attribute(&self, name: &str, value: &str) -> Option<Node> {
        let selector = format!("[{}={}]", name, css_string(value));
        match self.document.query_selector(&selector) {
            Ok(found) => found.map(Node::from),
            Err(e) => {
                tracing::debug!(%selector, error = ?e, "invalid selector");
                None
            }
        }
    }

    fn create_marker(&mut self, spec: &MarkerSpec) -> Result<Node, PlatformError> {
        let span = self
            .document
            .create_element("span")
            .map_err(js_err("create_element"))?;
        span.set_id(&spec.id);
        span.set_class_name(&spec.class);
        span.set_attribute(&spec.data_attribute, &spec.annotation_id)
            .map_err(js_err("set_attribute"))?;
        Ok(span.into())
    }

    fn surround_contents(&mut self, boundary: &Boundary<Node>, marker: &Node) -> Result<(), PlatformError> {
        let range = self.make_range(boundary)?;
        range.surround_contents(marker).map_err(js_err("surround_contents"))
    }

    fn extract_into(&mut self, boundary: &Boundary<Node>, marker: &Node) -> Result<(), PlatformError> {
        let range = self.make_range(boundary)?;
        let contents = range.extract_contents().map_err(js_err("extract_contents"))?;
        marker.append_child(&contents).map_err(js_err("append_child"))?;
        range.insert_node(marker).map_err(js_err("insert_node"))
    }

    fn insert_before(&mut self, parent: &Node, node: &Node, reference: Option<&Node>) -> Result<(), PlatformError> {
        parent
            .insert_before(node, reference)
            .map(|_| ())
            .map_err(js_err("insert_before"))
    }

    fn remove(&mut self, node: &Node) -> Result<(), PlatformError> {
        let parent = node.parent_node().ok_or("node has no parent")?;
        parent.remove_child(node).map(|_| ()).map_err(js_err("remove_child"))
    }

    fn normalize(&mut self, node: &Node) {
        node.normalize();
    }

    fn selection(&self) -> Option<Boundary<Node>> {
        let selection = self.live_selection()?;
        if selection.range_count() == 0 {
            return None;
        }
        let range = selection.get_range_at(0).ok()?;
        Some(Boundary::new(
            range.start_container().ok()?,
            range.start_offset().ok()? as usize,
            range.end_container().ok()?,
            range.end_offset().ok()? as usize,
        ))
    }

    fn clear_selection(&mut self) {
        if let Some(selection) = self.live_selection() {
            let _ = selection.remove_all_ranges();
        }
    }

    fn client_rects(&self, boundary: &Boundary<Node>) -> Vec<Rect> {
        let Ok(range) = self.make_range(boundary) else {
            return vec![];
        };
        let Some(rects) = range.get_client_rects() else {
            return vec![];
        };
        (0..rects.length())
            .filter_map(|i| rects.get(i))
            .map(|rect| to_rect(&rect))
            .collect()
    }

    fn bounding_rect(&self, node: &Node) -> Option<Rect> {
        if !node.is_connected() {
            return None;
        }
        if let Some(element) = self.element(node) {
            return Some(to_rect(&element.get_bounding_client_rect()));
        }
        let range = self.document.create_range().ok()?;
        range.select_node_contents(node).ok()?;
        Some(to_rect(&range.get_bounding_client_rect()))
    }

    fn scroll_top(&self, node: &Node) -> f64 {
        self.element(node)
            .map(|el| f64::from(el.scroll_top()))
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_string_escapes_quotes() {
        assert_eq!(css_string("abc"), "\"abc\"");
        assert_eq!(css_string("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }
}
