//! In-memory document tree.
//!
//! `MemoryDocument` implements [`DocumentAdapter`] over an arena of nodes with
//! a deterministic monospace layout: every UTF-16 unit occupies one column,
//! lines wrap at a fixed column count and `\n` starts a new line. It is what
//! the CLI renders with, and what the engine's tests run against.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::rc::Rc;

use smol_str::SmolStr;

use crate::platform::{
    Boundary, DecorationHandle, Decorator, DocumentAdapter, MarkerSpec, PlatformError,
};
use crate::style::DecorationConfig;
use crate::text::{utf16_len, utf16_split, utf16_to_byte};
use crate::types::Rect;

/// Handle to a node in a [`MemoryDocument`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: SmolStr,
        attrs: Vec<(SmolStr, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Fixed-pitch layout parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutMetrics {
    pub char_width: f64,
    pub line_height: f64,
    /// Column at which lines wrap.
    pub columns: usize,
    pub origin_x: f64,
    pub origin_y: f64,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            line_height: 16.0,
            columns: 80,
            origin_x: 0.0,
            origin_y: 0.0,
        }
    }
}

/// Insertion point: before `before` in `parent`, or at the end when None.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Slot {
    parent: NodeId,
    before: Option<NodeId>,
}

/// A laid-out UTF-16 unit.
#[derive(Debug, Clone, Copy)]
struct Glyph {
    node: NodeId,
    line: usize,
    col: usize,
    newline: bool,
}

const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "meta", "link", "wbr"];

/// An arena-backed document with a `body` root.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    nodes: Vec<NodeData>,
    root: NodeId,
    selection: Option<Boundary<NodeId>>,
    scroll: HashMap<NodeId, f64>,
    layout: LayoutMetrics,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            selection: None,
            scroll: HashMap::new(),
            layout: LayoutMetrics::default(),
        };
        doc.root = doc.create_element("body");
        doc
    }

    /// A document holding `text` inside `div.annotation-container > pre`.
    ///
    /// Returns the document and the `pre` element.
    pub fn with_text(text: &str) -> (Self, NodeId) {
        let mut doc = Self::new();
        let root = doc.root;
        let wrapper = doc.append_element(root, "div", &[("class", "annotation-container")]);
        let pre = doc.append_element(wrapper, "pre", &[]);
        doc.append_text(pre, text);
        (doc, pre)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn layout(&self) -> LayoutMetrics {
        self.layout
    }

    pub fn set_layout(&mut self, layout: LayoutMetrics) {
        self.layout = layout;
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeKind::Element {
            tag: SmolStr::new(tag),
            attrs: Vec::new(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(text.to_string()))
    }

    /// Append `child` to `parent`, moving it if already attached.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach_internal(child);
        if let Some(data) = self.nodes.get_mut(parent.0) {
            data.children.push(child);
        }
        if let Some(data) = self.nodes.get_mut(child.0) {
            data.parent = Some(parent);
        }
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let el = self.create_element(tag);
        for (name, value) in attrs {
            self.set_attr(el, name, value);
        }
        self.append_child(parent, el);
        el
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let node = self.create_text(text);
        self.append_child(parent, node);
        node
    }

    /// Remove a node from its parent, disconnecting its subtree.
    pub fn detach(&mut self, node: NodeId) {
        self.detach_internal(node);
    }

    /// Replace all children of `element` with a single text node.
    pub fn replace_text_content(&mut self, element: NodeId, text: &str) -> NodeId {
        let children = self.child_ids(element);
        for child in children {
            self.detach_internal(child);
        }
        self.append_text(element, text)
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(NodeData {
            kind: NodeKind::Text(data),
            ..
        }) = self.nodes.get_mut(node.0)
        {
            *data = text.to_string();
        }
    }

    pub fn set_selection(&mut self, selection: Option<Boundary<NodeId>>) {
        self.selection = selection;
    }

    pub fn set_scroll_top(&mut self, node: NodeId, top: f64) {
        self.scroll.insert(node, top);
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    /// Serialise a node and its subtree.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    /// Serialise a node's children.
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.child_ids(node) {
            self.write_html(child, &mut out);
        }
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let Some(data) = self.nodes.get(node.0) else {
            return;
        };
        match &data.kind {
            NodeKind::Text(text) => escape_into(text, false, out),
            NodeKind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    let _ = write!(out, " {}=\"", name);
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for child in &data.children {
                    self.write_html(*child, out);
                }
                let _ = write!(out, "</{}>", tag);
            }
        }
    }

    // === Arena internals ===

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn child_ids(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node.0)
            .map(|d| d.children.clone())
            .unwrap_or_default()
    }

    fn parent_id(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent
    }

    fn is_element(&self, node: NodeId) -> bool {
        matches!(
            self.nodes.get(node.0).map(|d| &d.kind),
            Some(NodeKind::Element { .. })
        )
    }

    fn text_of(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Text(text) => Some(text.as_str()),
            NodeKind::Element { .. } => None,
        }
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(NodeData {
            kind: NodeKind::Element { attrs, .. },
            ..
        }) = self.nodes.get_mut(node.0)
        {
            match attrs.iter_mut().find(|(n, _)| n == name) {
                Some((_, v)) => *v = value.to_string(),
                None => attrs.push((SmolStr::new(name), value.to_string())),
            }
        }
    }

    fn index_in_parent(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent_id(node)?;
        self.nodes[parent.0].children.iter().position(|c| *c == node)
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent_id(node)?;
        let idx = self.index_in_parent(node)?;
        self.nodes[parent.0].children.get(idx + 1).copied()
    }

    fn detach_internal(&mut self, node: NodeId) {
        let Some(parent) = self.parent_id(node) else {
            return;
        };
        if let Some(data) = self.nodes.get_mut(parent.0) {
            data.children.retain(|c| *c != node);
        }
        if let Some(data) = self.nodes.get_mut(node.0) {
            data.parent = None;
        }
    }

    /// Insert at a slot. The slot's reference must be a child of its parent.
    fn insert_at(&mut self, slot: Slot, node: NodeId) {
        self.detach_internal(node);
        let index = match slot.before {
            Some(before) => self.nodes[slot.parent.0]
                .children
                .iter()
                .position(|c| *c == before)
                .unwrap_or(self.nodes[slot.parent.0].children.len()),
            None => self.nodes[slot.parent.0].children.len(),
        };
        self.nodes[slot.parent.0].children.insert(index, node);
        self.nodes[node.0].parent = Some(slot.parent);
    }

    fn topmost(&self, node: NodeId) -> NodeId {
        let mut current = node;
        while let Some(parent) = self.parent_id(current) {
            current = parent;
        }
        current
    }

    fn ancestors_inclusive(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = vec![node];
        let mut current = node;
        while let Some(parent) = self.parent_id(current) {
            out.push(parent);
            current = parent;
        }
        out
    }

    /// Child-index path from the topmost ancestor.
    fn path(&self, node: NodeId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = node;
        while let Some(idx) = self.index_in_parent(current) {
            path.push(idx);
            current = self.parent_id(current).unwrap_or(current);
        }
        path.reverse();
        path
    }

    /// Total order key of a boundary point.
    fn point_key(&self, node: NodeId, offset: usize) -> (Vec<usize>, Option<usize>) {
        let mut path = self.path(node);
        if self.is_element(node) {
            path.push(offset);
            (path, None)
        } else {
            (path, Some(offset))
        }
    }

    /// Text nodes under `top` in document order, with their paths.
    fn text_nodes_with_paths(&self, top: NodeId) -> Vec<(NodeId, Vec<usize>)> {
        let mut out = Vec::new();
        let mut stack = vec![(top, self.path(top))];
        while let Some((node, path)) = stack.pop() {
            if self.text_of(node).is_some() {
                out.push((node, path));
                continue;
            }
            for (i, child) in self.child_ids(node).into_iter().enumerate().rev() {
                let mut child_path = path.clone();
                child_path.push(i);
                stack.push((child, child_path));
            }
        }
        out
    }

    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            out.push(n);
            for child in self.child_ids(n).into_iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    fn validate_point(&self, node: NodeId, offset: usize) -> Result<(), PlatformError> {
        let data = self
            .nodes
            .get(node.0)
            .ok_or_else(|| PlatformError::from("unknown node"))?;
        match &data.kind {
            NodeKind::Text(text) => {
                if data.parent.is_none() {
                    return Err("boundary text node has no parent".into());
                }
                if utf16_to_byte(text, offset).is_none() {
                    return Err(format!("offset {} is not a valid point in text node", offset).into());
                }
            }
            NodeKind::Element { .. } => {
                if offset > data.children.len() {
                    return Err(format!("offset {} exceeds child count", offset).into());
                }
            }
        }
        Ok(())
    }

    fn validate_boundary(&self, b: &Boundary<NodeId>) -> Result<(), PlatformError> {
        self.validate_point(b.start_node, b.start_offset)?;
        self.validate_point(b.end_node, b.end_offset)?;
        if self.topmost(b.start_node) != self.topmost(b.end_node) {
            return Err("boundary points are in different trees".into());
        }
        if self.point_key(b.start_node, b.start_offset) > self.point_key(b.end_node, b.end_offset) {
            return Err("boundary start is after its end".into());
        }
        Ok(())
    }

    /// Element that directly holds a boundary point.
    fn point_container(&self, node: NodeId) -> Option<NodeId> {
        if self.is_element(node) {
            Some(node)
        } else {
            self.parent_id(node)
        }
    }

    /// Turn a boundary point into a slot, splitting a text node if needed.
    fn split_point(&mut self, node: NodeId, offset: usize) -> Result<Slot, PlatformError> {
        let Some(text) = self.text_of(node).map(str::to_string) else {
            let before = self.nodes[node.0].children.get(offset).copied();
            return Ok(Slot {
                parent: node,
                before,
            });
        };
        let parent = self
            .parent_id(node)
            .ok_or_else(|| PlatformError::from("text node has no parent"))?;
        if offset == 0 {
            return Ok(Slot {
                parent,
                before: Some(node),
            });
        }
        if offset >= utf16_len(&text) {
            return Ok(Slot {
                parent,
                before: self.next_sibling(node),
            });
        }
        let (head, tail) =
            utf16_split(&text, offset).ok_or_else(|| PlatformError::from("split inside surrogate pair"))?;
        let tail_node = self.create_text(tail);
        self.set_text(node, head);
        let after = self.next_sibling(node);
        self.insert_at(
            Slot {
                parent,
                before: after,
            },
            tail_node,
        );
        Ok(Slot {
            parent,
            before: Some(tail_node),
        })
    }

    /// Move a slot up to `ancestor`, splitting each element it crosses.
    fn lift(&mut self, mut slot: Slot, ancestor: NodeId) -> Slot {
        while slot.parent != ancestor {
            let element = slot.parent;
            let Some(grandparent) = self.parent_id(element) else {
                break;
            };
            let first = self.nodes[element.0].children.first().copied();
            slot = match slot.before {
                None => Slot {
                    parent: grandparent,
                    before: self.next_sibling(element),
                },
                Some(before) if Some(before) == first => Slot {
                    parent: grandparent,
                    before: Some(element),
                },
                Some(before) => {
                    let clone = self.shallow_clone(element);
                    let children = self.child_ids(element);
                    let at = children.iter().position(|c| *c == before).unwrap_or(children.len());
                    for child in &children[at..] {
                        self.append_child(clone, *child);
                    }
                    let after = self.next_sibling(element);
                    self.insert_at(
                        Slot {
                            parent: grandparent,
                            before: after,
                        },
                        clone,
                    );
                    Slot {
                        parent: grandparent,
                        before: Some(clone),
                    }
                }
            };
        }
        slot
    }

    fn shallow_clone(&mut self, node: NodeId) -> NodeId {
        let kind = match &self.nodes[node.0].kind {
            NodeKind::Element { tag, attrs } => NodeKind::Element {
                tag: tag.clone(),
                attrs: attrs.clone(),
            },
            NodeKind::Text(text) => NodeKind::Text(text.clone()),
        };
        self.push_node(kind)
    }

    fn wrap_range(&mut self, b: &Boundary<NodeId>, marker: NodeId) -> Result<(), PlatformError> {
        if !self.is_element(marker) {
            return Err("marker must be an element".into());
        }
        if self.ancestors_inclusive(b.start_node).contains(&marker)
            || self.ancestors_inclusive(b.end_node).contains(&marker)
        {
            return Err("marker cannot contain the range it wraps".into());
        }
        self.detach_internal(marker);
        for child in self.child_ids(marker) {
            self.detach_internal(child);
        }

        // End first so the start split cannot shift the end point.
        let end = self.split_point(b.end_node, b.end_offset)?;
        let start = self.split_point(b.start_node, b.start_offset)?;

        let start_chain: HashSet<NodeId> = self.ancestors_inclusive(start.parent).into_iter().collect();
        let common = self
            .ancestors_inclusive(end.parent)
            .into_iter()
            .find(|n| start_chain.contains(n))
            .ok_or_else(|| PlatformError::from("no common ancestor"))?;

        let end = self.lift(end, common);
        let start = self.lift(start, common);

        let children = self.child_ids(common);
        let index_of = |slot: &Slot| {
            slot.before
                .and_then(|b| children.iter().position(|c| *c == b))
                .unwrap_or(children.len())
        };
        let (from, to) = (index_of(&start), index_of(&end));
        for child in &children[from..to.max(from)] {
            self.append_child(marker, *child);
        }
        self.insert_at(
            Slot {
                parent: common,
                before: end.before,
            },
            marker,
        );
        Ok(())
    }

    fn layout_glyphs(&self) -> Vec<Glyph> {
        let mut glyphs = Vec::new();
        let (mut line, mut col) = (0, 0);
        let columns = self.layout.columns.max(1);
        for (node, _) in self.text_nodes_with_paths(self.root) {
            let Some(text) = self.text_of(node) else {
                continue;
            };
            for ch in text.chars() {
                for _ in 0..ch.len_utf16() {
                    if ch == '\n' {
                        glyphs.push(Glyph {
                            node,
                            line,
                            col,
                            newline: true,
                        });
                        line += 1;
                        col = 0;
                        continue;
                    }
                    if col >= columns {
                        line += 1;
                        col = 0;
                    }
                    glyphs.push(Glyph {
                        node,
                        line,
                        col,
                        newline: false,
                    });
                    col += 1;
                }
            }
        }
        glyphs
    }

    /// Flattened offset of a point from the start of the connected document.
    fn document_offset(&self, node: NodeId, offset: usize) -> usize {
        let key = self.point_key(node, offset);
        let mut total = 0;
        for (text_node, path) in self.text_nodes_with_paths(self.root) {
            let len = self.text_of(text_node).map(utf16_len).unwrap_or(0);
            if text_node == node {
                return total + offset.min(len);
            }
            if (path, Some(0)) >= key {
                break;
            }
            total += len;
        }
        total
    }

    fn scroll_above(&self, node: NodeId, unscrolled: Option<NodeId>) -> f64 {
        self.ancestors_inclusive(node)
            .into_iter()
            .skip(1)
            .filter(|n| Some(*n) != unscrolled)
            .map(|n| self.scroll.get(&n).copied().unwrap_or(0.0))
            .sum()
    }

    /// One rect per line for the glyphs in `start..end`.
    fn line_rects(&self, start: usize, end: usize, unscrolled: Option<NodeId>) -> Vec<Rect> {
        let glyphs = self.layout_glyphs();
        let end = end.min(glyphs.len());
        let LayoutMetrics {
            char_width,
            line_height,
            origin_x,
            origin_y,
            ..
        } = self.layout;
        let mut rects: Vec<(usize, Rect)> = Vec::new();
        for glyph in glyphs.get(start..end).unwrap_or_default() {
            if glyph.newline {
                continue;
            }
            let x = origin_x + glyph.col as f64 * char_width;
            let y = origin_y + glyph.line as f64 * line_height - self.scroll_above(glyph.node, unscrolled);
            match rects.last_mut() {
                Some((line, rect)) if *line == glyph.line => {
                    *rect = rect.union(&Rect::new(x, y, char_width, line_height));
                }
                _ => rects.push((glyph.line, Rect::new(x, y, char_width, line_height))),
            }
        }
        rects.into_iter().map(|(_, r)| r).collect()
    }
}

fn escape_into(s: &str, attribute: bool, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

impl DocumentAdapter for MemoryDocument {
    type Node = NodeId;

    fn is_text(&self, node: &NodeId) -> bool {
        self.text_of(*node).is_some()
    }

    fn text(&self, node: &NodeId) -> Option<String> {
        self.text_of(*node).map(str::to_string)
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.parent_id(*node)
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.child_ids(*node)
    }

    fn is_connected(&self, node: &NodeId) -> bool {
        (node.0 < self.nodes.len()) && self.topmost(*node) == self.root
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.attr(*node, name).map(str::to_string)
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) {
        self.set_attr(*node, name, value);
    }

    fn has_class(&self, node: &NodeId, class: &str) -> bool {
        self.attr(*node, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|n| self.attr(*n, "id") == Some(id))
    }

    fn find_by_attribute(&self, name: &str, value: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|n| self.attr(*n, name) == Some(value))
    }

    fn create_marker(&mut self, spec: &MarkerSpec) -> Result<NodeId, PlatformError> {
        let marker = self.create_element("span");
        self.set_attr(marker, "id", &spec.id);
        self.set_attr(marker, "class", &spec.class);
        self.set_attr(marker, &spec.data_attribute, &spec.annotation_id);
        Ok(marker)
    }

    fn surround_contents(&mut self, boundary: &Boundary<NodeId>, marker: &NodeId) -> Result<(), PlatformError> {
        self.validate_boundary(boundary)?;
        if self.point_container(boundary.start_node) != self.point_container(boundary.end_node) {
            return Err("range partially selects a non-text node".into());
        }
        self.wrap_range(boundary, *marker)
    }

    fn extract_into(&mut self, boundary: &Boundary<NodeId>, marker: &NodeId) -> Result<(), PlatformError> {
        self.validate_boundary(boundary)?;
        self.wrap_range(boundary, *marker)
    }

    fn insert_before(
        &mut self,
        parent: &NodeId,
        node: &NodeId,
        reference: Option<&NodeId>,
    ) -> Result<(), PlatformError> {
        if !self.is_element(*parent) {
            return Err("parent is not an element".into());
        }
        if self.ancestors_inclusive(*parent).contains(node) {
            return Err("cannot insert a node into its own subtree".into());
        }
        if let Some(reference) = reference {
            if self.parent_id(*reference) != Some(*parent) {
                return Err("reference node is not a child of parent".into());
            }
        }
        self.insert_at(
            Slot {
                parent: *parent,
                before: reference.copied(),
            },
            *node,
        );
        Ok(())
    }

    fn remove(&mut self, node: &NodeId) -> Result<(), PlatformError> {
        if node.0 >= self.nodes.len() {
            return Err("unknown node".into());
        }
        self.detach_internal(*node);
        Ok(())
    }

    fn normalize(&mut self, node: &NodeId) {
        let children = self.child_ids(*node);
        let mut previous_text: Option<NodeId> = None;
        for child in children {
            match self.text_of(child).map(str::to_string) {
                Some(text) if text.is_empty() => self.detach_internal(child),
                Some(text) => match previous_text {
                    Some(prev) => {
                        let merged = format!("{}{}", self.text_of(prev).unwrap_or_default(), text);
                        self.set_text(prev, &merged);
                        self.detach_internal(child);
                    }
                    None => previous_text = Some(child),
                },
                None => {
                    previous_text = None;
                    self.normalize(&child);
                }
            }
        }
    }

    fn selection(&self) -> Option<Boundary<NodeId>> {
        self.selection.clone()
    }

    fn clear_selection(&mut self) {
        self.selection = None;
    }

    fn client_rects(&self, boundary: &Boundary<NodeId>) -> Vec<Rect> {
        if !self.is_connected(&boundary.start_node) || !self.is_connected(&boundary.end_node) {
            return Vec::new();
        }
        let start = self.document_offset(boundary.start_node, boundary.start_offset);
        let end = self.document_offset(boundary.end_node, boundary.end_offset);
        self.line_rects(start.min(end), start.max(end), None)
    }

    fn bounding_rect(&self, node: &NodeId) -> Option<Rect> {
        if !self.is_connected(node) {
            return None;
        }
        let b = self.contents_boundary(node);
        let start = self.document_offset(b.start_node, b.start_offset);
        let end = self.document_offset(b.end_node, b.end_offset);
        let rects = self.line_rects(start, end, Some(*node));
        Some(Rect::bounding(&rects).unwrap_or(Rect::new(self.layout.origin_x, self.layout.origin_y, 0.0, 0.0)))
    }

    fn scroll_top(&self, node: &NodeId) -> f64 {
        self.scroll.get(node).copied().unwrap_or(0.0)
    }
}

/// State of a decoration drawn by [`MemoryDecorator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecorationState {
    Created,
    Showing,
    Hidden,
    Removed,
}

#[derive(Debug, Clone)]
pub struct DecorationRecord {
    pub marker_id: String,
    pub config: DecorationConfig,
    pub state: DecorationState,
}

/// A decorator that records what it was asked to draw, over any node type.
///
/// Clones share the same log, so a test can keep one and hand the other to a store.
#[derive(Debug, Clone, Default)]
pub struct MemoryDecorator {
    records: Rc<RefCell<Vec<DecorationRecord>>>,
}

impl MemoryDecorator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decorations not yet removed.
    pub fn live_count(&self) -> usize {
        self.records
            .borrow()
            .iter()
            .filter(|r| r.state != DecorationState::Removed)
            .count()
    }

    /// State of the most recent decoration drawn over a marker.
    pub fn state_of(&self, marker_id: &str) -> Option<DecorationState> {
        self.records
            .borrow()
            .iter()
            .rev()
            .find(|r| r.marker_id == marker_id)
            .map(|r| r.state)
    }

    pub fn records(&self) -> Vec<DecorationRecord> {
        self.records.borrow().clone()
    }
}

#[derive(Debug)]
pub struct MemoryDecoration {
    index: usize,
    records: Rc<RefCell<Vec<DecorationRecord>>>,
}

impl MemoryDecoration {
    fn set(&self, state: DecorationState) {
        if let Some(record) = self.records.borrow_mut().get_mut(self.index) {
            if record.state != DecorationState::Removed {
                record.state = state;
            }
        }
    }
}

impl DecorationHandle for MemoryDecoration {
    fn show(&mut self) {
        self.set(DecorationState::Showing);
    }

    fn hide(&mut self) {
        self.set(DecorationState::Hidden);
    }

    fn remove(&mut self) {
        self.set(DecorationState::Removed);
    }
}

impl<N> Decorator<N> for MemoryDecorator {
    type Handle = MemoryDecoration;

    fn annotate(&mut self, _element: &N, marker_id: &str, config: &DecorationConfig) -> MemoryDecoration {
        let mut records = self.records.borrow_mut();
        records.push(DecorationRecord {
            marker_id: marker_id.to_string(),
            config: config.clone(),
            state: DecorationState::Created,
        });
        MemoryDecoration {
            index: records.len() - 1,
            records: self.records.clone(),
        }
    }
}
