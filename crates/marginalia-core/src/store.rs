//! The annotation store: records, their markers and live decorations.
//!
//! Decoration happens in two steps. [`AnnotationStore::decorate`] validates
//! the stored offsets and injects the marker synchronously; drawing the
//! decoration (multiline probe, decorator instance, position) is queued and
//! runs in [`AnnotationStore::flush_pending`], which the host calls once the
//! layout has settled. A marker that vanished in between is skipped.

use std::collections::{HashMap, HashSet};

use smol_str::{SmolStr, format_smolstr};

use crate::error::AnnotationError;
use crate::inject;
use crate::offset_map::{TextSnapshots, locate_boundary};
use crate::platform::{DecorationHandle, Decorator, DocumentAdapter, MarkerSpec};
use crate::style::{AnnotationStyle, build_decoration_config};
use crate::text::{utf16_len, utf16_slice};
use crate::types::{Annotation, AnnotationId, AnnotationTarget, Position, Region, generate_id};

/// Naming used for ids, markers and containers.
///
/// The default is the annotation flavour; [`StoreOptions::marking`] is the
/// lighter-weight marking flavour, which differs only in names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    pub id_prefix: SmolStr,
    pub marker_class: SmolStr,
    pub data_attribute: SmolStr,
    pub container_class: SmolStr,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            id_prefix: SmolStr::new_static("annotation"),
            marker_class: SmolStr::new_static("annotation-target"),
            data_attribute: SmolStr::new_static("data-annotation-id"),
            container_class: SmolStr::new_static("annotation-container"),
        }
    }
}

impl StoreOptions {
    pub fn marking() -> Self {
        Self {
            id_prefix: SmolStr::new_static("marking"),
            marker_class: SmolStr::new_static("marking-target"),
            data_attribute: SmolStr::new_static("data-marking-id"),
            container_class: SmolStr::new_static("marking-container"),
        }
    }

    /// Marker element id for an annotation.
    pub fn marker_id(&self, annotation_id: &str) -> SmolStr {
        format_smolstr!("{}-span-{}", self.id_prefix, annotation_id)
    }

    fn marker_spec(&self, annotation_id: &str) -> MarkerSpec {
        MarkerSpec {
            id: self.marker_id(annotation_id),
            class: self.marker_class.clone(),
            data_attribute: self.data_attribute.clone(),
            annotation_id: SmolStr::new(annotation_id),
        }
    }
}

/// Whether an annotation is currently drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecorationStatus {
    /// No decoration instance.
    Undecorated,
    /// Instance exists and its marker resolves.
    Active,
    /// Instance exists but the marker is not in the live document.
    OffScreen,
}

#[derive(Debug, Clone)]
struct PendingActivation {
    annotation_id: AnnotationId,
    marker_id: SmolStr,
}

/// Owns annotation records, their decoration instances and the text snapshots.
pub struct AnnotationStore<A, D>
where
    A: DocumentAdapter,
    D: Decorator<A::Node>,
{
    adapter: A,
    decorator: D,
    options: StoreOptions,
    annotations: Vec<Annotation>,
    instances: HashMap<AnnotationId, D::Handle>,
    /// Container each record was created in.
    anchors: HashMap<AnnotationId, A::Node>,
    /// Current container of each region.
    containers: HashMap<Region, A::Node>,
    snapshots: TextSnapshots,
    pending: Vec<PendingActivation>,
    /// Unsaved ids the user deleted. Survives `clear`.
    deleted_unsaved: HashSet<AnnotationId>,
}

impl<A, D> AnnotationStore<A, D>
where
    A: DocumentAdapter,
    D: Decorator<A::Node>,
{
    pub fn new(adapter: A, decorator: D) -> Self {
        Self::with_options(adapter, decorator, StoreOptions::default())
    }

    pub fn with_options(adapter: A, decorator: D, options: StoreOptions) -> Self {
        Self {
            adapter,
            decorator,
            options,
            annotations: Vec::new(),
            instances: HashMap::new(),
            anchors: HashMap::new(),
            containers: HashMap::new(),
            snapshots: TextSnapshots::new(),
            pending: Vec::new(),
            deleted_unsaved: HashSet::new(),
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    pub fn decorator(&self) -> &D {
        &self.decorator
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn snapshots(&self) -> &TextSnapshots {
        &self.snapshots
    }

    pub fn snapshots_mut(&mut self) -> &mut TextSnapshots {
        &mut self.snapshots
    }

    /// Split borrow for callers that need the adapter and snapshots together.
    pub fn adapter_and_snapshots(&mut self) -> (&mut A, &mut TextSnapshots) {
        (&mut self.adapter, &mut self.snapshots)
    }

    /// Make `container` the current element for `region`.
    ///
    /// Call again whenever the region is re-rendered.
    pub fn register_container(&mut self, region: Region, container: A::Node) {
        tracing::debug!(%region, "registered container");
        self.containers.insert(region, container);
    }

    pub fn container_for(&self, region: Region) -> Option<&A::Node> {
        self.containers.get(&region)
    }

    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.annotations.iter().position(|a| a.id == id)
    }

    /// Add a new record. No tree changes until [`decorate`](Self::decorate).
    pub fn create(
        &mut self,
        container: &A::Node,
        region: Region,
        mut target: AnnotationTarget,
        style: AnnotationStyle,
    ) -> &Annotation {
        let id = generate_id(&self.options.id_prefix);
        target.region = region;
        tracing::debug!(annotation = %id, %region, %style, "created annotation");
        self.anchors.insert(id.clone(), container.clone());
        self.annotations.push(Annotation::new(id, style, target));
        &self.annotations[self.annotations.len() - 1]
    }

    /// Add a record loaded from the backend.
    pub fn insert_restored(&mut self, annotation: Annotation) {
        if let Some(idx) = self.index_of(&annotation.id) {
            tracing::debug!(annotation = %annotation.id, "replacing restored annotation");
            self.annotations[idx] = annotation;
        } else {
            self.annotations.push(annotation);
        }
    }

    fn container_of(&self, id: &str, region: Region) -> Option<A::Node> {
        self.containers
            .get(&region)
            .filter(|c| self.adapter.is_connected(c))
            .or_else(|| self.anchors.get(id))
            .cloned()
    }

    /// Inject the marker for an annotation and queue its activation.
    pub fn decorate(&mut self, id: &str) -> Result<(), AnnotationError> {
        let idx = self
            .index_of(id)
            .ok_or_else(|| AnnotationError::NotFound(SmolStr::new(id)))?;
        let target = self.annotations[idx].target.clone();

        let Some(offset) = target.text_offset else {
            // Already wrapped: activate the element as-is.
            let span_id = target
                .span_id
                .ok_or_else(|| AnnotationError::boundary("annotation has neither offsets nor marker"))?;
            self.queue_activation(id, span_id);
            return Ok(());
        };

        let container = self.container_of(id, target.region).ok_or_else(|| {
            AnnotationError::boundary(format!("no container for region {}", target.region))
        })?;
        if !self.adapter.is_connected(&container) {
            return Err(AnnotationError::boundary("container is not attached"));
        }

        let (key, snapshot) = self.snapshots.snapshot(&mut self.adapter, &container);
        let len = utf16_len(&snapshot);
        let range = offset.range();
        if offset.start > offset.end || range.end > len {
            tracing::warn!(annotation = %id, container = %key, start = offset.start, end = offset.end, len, "stored offsets out of bounds");
            return Err(AnnotationError::RangeOutOfBounds {
                start: offset.start,
                end: offset.end,
                len,
            });
        }
        let Some(captured) = utf16_slice(&snapshot, range.to_range()) else {
            tracing::warn!(annotation = %id, start = offset.start, end = offset.end, "stored offsets split a surrogate pair");
            return Err(AnnotationError::RangeOutOfBounds {
                start: offset.start,
                end: offset.end,
                len,
            });
        };
        if !offset.text.is_empty() && offset.text.trim() != captured.trim() {
            tracing::warn!(annotation = %id, expected = %offset.text, found = %captured, "stored text does not match");
            return Err(AnnotationError::TextMismatch {
                expected: offset.text.clone(),
                found: captured.to_string(),
            });
        }

        // Unwrapping an old marker renormalises text nodes, so do it before locating.
        self.release_decoration(idx);
        let boundary = locate_boundary(&self.adapter, &container, range)?;
        let spec = self.options.marker_spec(id);
        inject::inject(&mut self.adapter, &boundary, &spec)?;

        self.annotations[idx].target.span_id = Some(spec.id.clone());
        self.anchors.insert(SmolStr::new(id), container);
        self.queue_activation(id, spec.id);
        Ok(())
    }

    fn queue_activation(&mut self, id: &str, marker_id: SmolStr) {
        self.pending.retain(|p| p.annotation_id != id);
        self.pending.push(PendingActivation {
            annotation_id: SmolStr::new(id),
            marker_id,
        });
    }

    /// Drop the decoration instance and unwrap the marker of a record.
    fn release_decoration(&mut self, idx: usize) {
        let id = self.annotations[idx].id.clone();
        if let Some(mut handle) = self.instances.remove(&id) {
            handle.remove();
        }
        let released = match &self.annotations[idx].target.span_id {
            Some(span_id) => inject::release(&mut self.adapter, span_id),
            None => false,
        };
        if !released {
            inject::release_by_annotation(&mut self.adapter, &self.options.data_attribute, &id);
        }
    }

    /// Run queued activations. Returns how many decorations were drawn.
    pub fn flush_pending(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let mut drawn = 0;
        for activation in pending {
            if self.activate(&activation) {
                drawn += 1;
            }
        }
        drawn
    }

    fn activate(&mut self, activation: &PendingActivation) -> bool {
        let Some(idx) = self.index_of(&activation.annotation_id) else {
            return false;
        };
        let Some(marker) = self.adapter.get_element_by_id(&activation.marker_id) else {
            tracing::debug!(marker = %activation.marker_id, "marker gone before activation");
            return false;
        };
        let boundary = self.adapter.contents_boundary(&marker);
        let is_multiline = self.adapter.client_rects(&boundary).len() > 1;
        let style = self.annotations[idx].style;
        let config = build_decoration_config(style, is_multiline);

        if let Some(mut old) = self.instances.remove(&activation.annotation_id) {
            old.remove();
        }
        let mut handle = self
            .decorator
            .annotate(&marker, &activation.marker_id, &config);
        handle.show();
        self.instances.insert(activation.annotation_id.clone(), handle);
        tracing::trace!(target: "marginalia::store", annotation = %activation.annotation_id, is_multiline, "decoration shown");
        self.update_position(&activation.annotation_id);
        true
    }

    pub fn decoration_status(&self, id: &str) -> DecorationStatus {
        if !self.instances.contains_key(id) {
            return DecorationStatus::Undecorated;
        }
        let live = self
            .get(id)
            .and_then(|a| a.target.span_id.as_deref())
            .and_then(|span| self.adapter.get_element_by_id(span))
            .is_some();
        if live {
            DecorationStatus::Active
        } else {
            DecorationStatus::OffScreen
        }
    }

    /// Replace the note text. Returns false if the id is unknown.
    pub fn update_content(&mut self, id: &str, content: &str) -> bool {
        let Some(annotation) = self.annotations.iter_mut().find(|a| a.id == id) else {
            return false;
        };
        annotation.content = content.to_string();
        annotation.updated_at = chrono::Utc::now();
        true
    }

    /// Remove an annotation, its decoration and its marker.
    pub fn delete(&mut self, id: &str) -> Option<Annotation> {
        let idx = self.index_of(id)?;
        self.release_decoration(idx);
        self.pending.retain(|p| p.annotation_id != id);
        self.anchors.remove(id);
        tracing::debug!(annotation = %id, "deleted annotation");
        let annotation = self.annotations.remove(idx);
        if !annotation.persisted {
            self.deleted_unsaved.insert(annotation.id.clone());
        }
        Some(annotation)
    }

    /// Whether `local` was deleted by [`delete`](Self::delete) before its
    /// save completed. Consumes the entry.
    pub fn take_deleted(&mut self, local: &str) -> bool {
        self.deleted_unsaved.remove(local)
    }

    /// Drop every record and decoration. Markers stay in the tree.
    pub fn clear(&mut self) {
        for (_, mut handle) in self.instances.drain() {
            handle.remove();
        }
        self.annotations.clear();
        self.anchors.clear();
        self.pending.clear();
        self.snapshots.clear();
    }

    pub fn list_by_region(&self, region: Region) -> Vec<&Annotation> {
        self.annotations
            .iter()
            .filter(|a| a.region() == region)
            .collect()
    }

    /// Annotations of a region in reading order (stable on equal tops).
    pub fn sorted_by_region(&self, region: Region) -> Vec<&Annotation> {
        let mut list = self.list_by_region(region);
        list.sort_by(|a, b| a.position.top.total_cmp(&b.position.top));
        list
    }

    fn region_ids(&self, region: Region) -> Vec<AnnotationId> {
        self.annotations
            .iter()
            .filter(|a| a.region() == region)
            .map(|a| a.id.clone())
            .collect()
    }

    /// Show a region's decorations, re-decorating any whose marker is gone.
    pub fn show_by_region(&mut self, region: Region) {
        for id in self.region_ids(region) {
            let marker_live = self
                .get(&id)
                .and_then(|a| a.target.span_id.clone())
                .filter(|span| self.adapter.get_element_by_id(span).is_some());
            let has_instance = self.instances.contains_key(&id);
            match marker_live {
                Some(_) if has_instance => {
                    if let Some(handle) = self.instances.get_mut(&id) {
                        handle.show();
                    }
                }
                Some(span) => self.queue_activation(&id, span),
                None => {
                    if let Some(mut stale) = self.instances.remove(&id) {
                        stale.remove();
                    }
                    if let Err(e) = self.decorate(&id) {
                        tracing::debug!(annotation = %id, error = %e, "could not redecorate");
                    }
                }
            }
        }
    }

    pub fn hide_by_region(&mut self, region: Region) {
        for id in self.region_ids(region) {
            if let Some(handle) = self.instances.get_mut(&id) {
                handle.hide();
            }
        }
    }

    /// Replace a local id with the id the backend assigned.
    pub fn confirm_id(&mut self, local: &str, server: &str) -> bool {
        let Some(idx) = self.index_of(local) else {
            tracing::debug!(local, "confirmed id for a record no longer present");
            return false;
        };
        if local != server && self.index_of(server).is_some() {
            tracing::warn!(local, server, "server id already present in store");
        }
        let server_id = SmolStr::new(server);
        let annotation = &mut self.annotations[idx];
        annotation.id = server_id.clone();
        annotation.persisted = true;

        if let Some(handle) = self.instances.remove(local) {
            self.instances.insert(server_id.clone(), handle);
        }
        if let Some(anchor) = self.anchors.remove(local) {
            self.anchors.insert(server_id.clone(), anchor);
        }
        for p in self.pending.iter_mut().filter(|p| p.annotation_id == local) {
            p.annotation_id = server_id.clone();
        }
        let marker = self.annotations[idx]
            .target
            .span_id
            .as_deref()
            .and_then(|span| self.adapter.get_element_by_id(span));
        if let Some(marker) = marker {
            let attribute = self.options.data_attribute.clone();
            self.adapter.set_attribute(&marker, &attribute, server);
        }
        tracing::debug!(local, server, "annotation id confirmed");
        true
    }

    /// Recompute an annotation's offset from its container. Returns whether it changed.
    pub fn update_position(&mut self, id: &str) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let target = self.annotations[idx]
            .target
            .span_id
            .as_deref()
            .and_then(|span| self.adapter.get_element_by_id(span))
            .or_else(|| self.adapter.find_by_attribute(&self.options.data_attribute, id));
        let Some(target) = target else {
            return false;
        };
        let Some(container) = self
            .adapter
            .closest_with_class(&target, &self.options.container_class)
        else {
            return false;
        };
        let (Some(rect), Some(container_rect)) = (
            self.adapter.bounding_rect(&target),
            self.adapter.bounding_rect(&container),
        ) else {
            return false;
        };
        let position = Position {
            top: rect.top() - container_rect.top() + self.adapter.scroll_top(&container),
            left: rect.left() - container_rect.left(),
        };
        let changed = self.annotations[idx].position != position;
        self.annotations[idx].position = position;
        changed
    }

    pub fn update_all_positions(&mut self) {
        let ids: Vec<_> = self.annotations.iter().map(|a| a.id.clone()).collect();
        for id in ids {
            self.update_position(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DecorationState, MemoryDecorator, MemoryDocument, NodeId};
    use crate::types::{OffsetRange, TextOffset};

    type TestStore = AnnotationStore<MemoryDocument, MemoryDecorator>;

    fn make_store(text: &str) -> (TestStore, MemoryDecorator, NodeId) {
        let (doc, pre) = MemoryDocument::with_text(text);
        let decorator = MemoryDecorator::new();
        let mut store = AnnotationStore::new(doc, decorator.clone());
        store.register_container(Region::Clean, pre);
        (store, decorator, pre)
    }

    fn text_target(start: usize, end: usize, text: &str) -> AnnotationTarget {
        AnnotationTarget::text(Region::Clean, TextOffset::new(OffsetRange::new(start, end), text))
    }

    fn add(store: &mut TestStore, pre: NodeId, start: usize, end: usize, text: &str) -> AnnotationId {
        store
            .create(&pre, Region::Clean, text_target(start, end, text), AnnotationStyle::Highlight)
            .id
            .clone()
    }

    #[test]
    fn test_highlight_quick() {
        let (mut store, decorator, pre) = make_store("The quick brown fox");
        let id = add(&mut store, pre, 4, 9, "quick");
        store.decorate(&id).unwrap();

        let marker_id = store.options().marker_id(&id);
        let marker = store.adapter().get_element_by_id(&marker_id).unwrap();
        assert_eq!(store.adapter().text_content(&marker), "quick");
        assert_eq!(
            store.adapter().attribute(&marker, "data-annotation-id").as_deref(),
            Some(id.as_str())
        );
        assert!(store.adapter().has_class(&marker, "annotation-target"));

        // Drawing waits for the settle pass
        assert_eq!(decorator.live_count(), 0);
        assert_eq!(store.flush_pending(), 1);
        assert_eq!(decorator.state_of(&marker_id), Some(DecorationState::Showing));
        let config = &decorator.records()[0].config;
        assert_eq!(config.color, "#fef08a");
        assert!(!config.multiline);
        assert_eq!(store.decoration_status(&id), DecorationStatus::Active);
        // "quick" starts at column 4 of line 0
        assert_eq!(store.get(&id).unwrap().position, Position { top: 0.0, left: 32.0 });
    }

    #[test]
    fn test_restore_after_rerender() {
        let (mut store, _decorator, pre) = make_store("The quick brown fox");
        let restored = Annotation {
            persisted: true,
            ..Annotation::new(SmolStr::new("srv-1"), AnnotationStyle::Box, text_target(10, 15, "brown"))
        };
        store.insert_restored(restored);
        store.decorate("srv-1").unwrap();
        store.flush_pending();
        let marker = store
            .adapter()
            .find_by_attribute("data-annotation-id", "srv-1")
            .unwrap();
        assert_eq!(store.adapter().text_content(&marker), "brown");
        assert_eq!(store.adapter().text_content(&pre), "The quick brown fox");
    }

    #[test]
    fn test_out_of_range_keeps_record() {
        let (mut store, decorator, pre) = make_store("The quick brown fox.");
        let id = add(&mut store, pre, 100, 110, "");
        let err = store.decorate(&id).unwrap_err();
        assert_eq!(
            err,
            AnnotationError::RangeOutOfBounds {
                start: 100,
                end: 110,
                len: 20
            }
        );
        assert!(store.get(&id).is_some());
        assert_eq!(store.flush_pending(), 0);
        assert_eq!(decorator.live_count(), 0);
        assert_eq!(store.decoration_status(&id), DecorationStatus::Undecorated);
    }

    #[test]
    fn test_surrogate_split_is_out_of_bounds() {
        let (mut store, decorator, pre) = make_store("a😀b");
        let id = add(&mut store, pre, 2, 4, "");
        assert_eq!(
            store.decorate(&id).unwrap_err(),
            AnnotationError::RangeOutOfBounds { start: 2, end: 4, len: 4 }
        );
        assert!(store.get(&id).is_some());
        assert_eq!(store.adapter().inner_html(pre), "a😀b");
        assert_eq!(decorator.live_count(), 0);

        // Whole pair is fine
        let whole = add(&mut store, pre, 1, 3, "😀");
        store.decorate(&whole).unwrap();
        assert_eq!(store.flush_pending(), 1);
    }

    #[test]
    fn test_text_mismatch_keeps_record() {
        let (mut store, _decorator, pre) = make_store("The quick brown fox");
        let id = add(&mut store, pre, 4, 9, "slow");
        assert!(matches!(
            store.decorate(&id),
            Err(AnnotationError::TextMismatch { .. })
        ));
        assert_eq!(store.len(), 1);
        assert_eq!(store.adapter().inner_html(pre), "The quick brown fox");
    }

    #[test]
    fn test_create_then_delete_leaves_no_markers() {
        let (mut store, decorator, pre) = make_store("The quick brown fox jumps");
        let before = store.adapter().inner_html(pre);
        let a = add(&mut store, pre, 4, 9, "quick");
        let b = add(&mut store, pre, 10, 19, "brown fox");
        store.decorate(&a).unwrap();
        store.decorate(&b).unwrap();
        store.flush_pending();
        assert_eq!(decorator.live_count(), 2);

        assert!(store.delete(&a).is_some());
        assert!(store.delete(&b).is_some());
        assert!(store.delete(&b).is_none());
        assert!(store.is_empty());
        assert_eq!(decorator.live_count(), 0);
        assert_eq!(store.adapter().find_by_attribute("data-annotation-id", &a), None);
        assert_eq!(store.adapter().inner_html(pre), before);
    }

    #[test]
    fn test_redecorate_replaces_previous_instance() {
        let (mut store, decorator, pre) = make_store("The quick brown fox");
        let id = add(&mut store, pre, 4, 9, "quick");
        store.decorate(&id).unwrap();
        store.flush_pending();
        store.decorate(&id).unwrap();
        store.flush_pending();
        assert_eq!(decorator.live_count(), 1);
        assert_eq!(decorator.records().len(), 2);
        // Only one marker in the tree
        let html = store.adapter().inner_html(pre);
        assert_eq!(html.matches("annotation-target").count(), 1);
    }

    #[test]
    fn test_multiline_probe_sets_highlight_flag() {
        let (mut store, decorator, pre) = make_store("first line\nsecond line");
        let id = add(&mut store, pre, 6, 17, "line\nsecond");
        store.decorate(&id).unwrap();
        store.flush_pending();
        assert!(decorator.records()[0].config.multiline);
    }

    #[test]
    fn test_flush_skips_detached_marker() {
        let (mut store, decorator, pre) = make_store("The quick brown fox");
        let id = add(&mut store, pre, 4, 9, "quick");
        store.decorate(&id).unwrap();
        // The region is torn down before the settle pass
        store.adapter_mut().detach(pre);
        assert_eq!(store.flush_pending(), 0);
        assert_eq!(decorator.live_count(), 0);
        assert!(store.get(&id).is_some());
    }

    #[test]
    fn test_sorted_by_region_is_stable() {
        let (mut store, _decorator, pre) = make_store("aaaa\nbbbb\ncccc");
        let low = add(&mut store, pre, 10, 14, "cccc");
        let first = add(&mut store, pre, 0, 2, "aa");
        let second = add(&mut store, pre, 2, 4, "aa");
        for id in [&low, &first, &second] {
            store.decorate(id).unwrap();
        }
        store.flush_pending();
        let order: Vec<_> = store
            .sorted_by_region(Region::Clean)
            .into_iter()
            .map(|a| a.id.clone())
            .collect();
        assert_eq!(order, vec![first, second, low]);
        assert!(store.sorted_by_region(Region::Translate).is_empty());
    }

    #[test]
    fn test_positions_follow_container_scroll() {
        let (mut store, _decorator, pre) = make_store("a\nb\nc\nd");
        let id = add(&mut store, pre, 6, 7, "d");
        store.decorate(&id).unwrap();
        store.flush_pending();
        assert_eq!(store.get(&id).unwrap().position.top, 48.0);
        let wrapper = store.adapter().parent(&pre).unwrap();
        store.adapter_mut().set_scroll_top(wrapper, 32.0);
        store.update_all_positions();
        assert_eq!(store.get(&id).unwrap().position.top, 48.0);
    }

    #[test]
    fn test_confirm_id_substitutes_everywhere() {
        let (mut store, decorator, pre) = make_store("The quick brown fox");
        let local = add(&mut store, pre, 4, 9, "quick");
        store.decorate(&local).unwrap();
        store.flush_pending();
        assert!(store.confirm_id(&local, "6f1c"));

        let annotation = store.get("6f1c").unwrap();
        assert!(annotation.persisted);
        assert!(store.get(&local).is_none());
        let marker = store.adapter().find_by_attribute("data-annotation-id", "6f1c");
        assert!(marker.is_some());
        assert_eq!(store.decoration_status("6f1c"), DecorationStatus::Active);

        assert!(store.delete("6f1c").is_some());
        assert_eq!(decorator.live_count(), 0);
        assert_eq!(store.adapter().inner_html(pre), "The quick brown fox");
    }

    #[test]
    fn test_region_hide_and_reshow_after_rerender() {
        let (mut store, decorator, pre) = make_store("The quick brown fox");
        let id = add(&mut store, pre, 4, 9, "quick");
        store.decorate(&id).unwrap();
        store.flush_pending();
        let marker_id = store.get(&id).unwrap().target.span_id.clone().unwrap();

        store.hide_by_region(Region::Clean);
        assert_eq!(decorator.state_of(&marker_id), Some(DecorationState::Hidden));
        store.show_by_region(Region::Clean);
        assert_eq!(decorator.state_of(&marker_id), Some(DecorationState::Showing));

        // Re-render the region into a fresh container
        store.hide_by_region(Region::Clean);
        let wrapper = store.adapter().parent(&pre).unwrap();
        store.adapter_mut().detach(pre);
        assert_eq!(store.decoration_status(&id), DecorationStatus::OffScreen);
        let fresh = store.adapter_mut().append_element(wrapper, "pre", &[]);
        store.adapter_mut().append_text(fresh, "The quick brown fox");
        store.register_container(Region::Clean, fresh);

        store.show_by_region(Region::Clean);
        store.flush_pending();
        assert_eq!(decorator.live_count(), 1);
        let marker = store.adapter().get_element_by_id(&marker_id).unwrap();
        assert!(store.adapter().contains(&fresh, &marker));
        assert_eq!(store.decoration_status(&id), DecorationStatus::Active);
    }

    #[test]
    fn test_anchored_target_activates_existing_element() {
        let (mut store, decorator, _pre) = make_store("unused");
        let root = store.adapter().root();
        let div = store
            .adapter_mut()
            .append_element(root, "div", &[("class", "annotation-container")]);
        let span = store
            .adapter_mut()
            .append_element(div, "span", &[("id", "legacy-span")]);
        store.adapter_mut().append_text(span, "wrapped earlier");
        store.insert_restored(Annotation::new(
            SmolStr::new("legacy"),
            AnnotationStyle::Underline,
            AnnotationTarget::anchored(Region::Rendered, "legacy-span"),
        ));
        store.decorate("legacy").unwrap();
        assert_eq!(store.flush_pending(), 1);
        assert_eq!(decorator.state_of("legacy-span"), Some(DecorationState::Showing));
    }

    #[test]
    fn test_clear_releases_everything() {
        let (mut store, decorator, pre) = make_store("The quick brown fox");
        let a = add(&mut store, pre, 4, 9, "quick");
        let b = add(&mut store, pre, 10, 15, "brown");
        store.decorate(&a).unwrap();
        store.flush_pending();
        store.decorate(&b).unwrap();
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.pending_len(), 0);
        assert!(store.snapshots().is_empty());
        assert_eq!(decorator.live_count(), 0);
        assert_eq!(store.flush_pending(), 0);
    }

    #[test]
    fn test_only_explicit_delete_leaves_a_tombstone() {
        let (mut store, _decorator, pre) = make_store("The quick brown fox");
        let deleted = add(&mut store, pre, 4, 9, "quick");
        let cleared = add(&mut store, pre, 10, 15, "brown");
        store.delete(&deleted);
        store.clear();

        assert!(!store.take_deleted(&cleared));
        assert!(store.take_deleted(&deleted));
        assert!(!store.take_deleted(&deleted));
    }

    #[test]
    fn test_deleting_saved_record_leaves_no_tombstone() {
        let (mut store, _decorator, pre) = make_store("The quick brown fox");
        let local = add(&mut store, pre, 4, 9, "quick");
        assert!(store.confirm_id(&local, "srv-1"));
        store.delete("srv-1");
        assert!(!store.take_deleted("srv-1"));
        assert!(!store.take_deleted(&local));
    }

    #[test]
    fn test_update_content_bumps_timestamp() {
        let (mut store, _decorator, pre) = make_store("abc");
        let id = add(&mut store, pre, 0, 3, "abc");
        let created = store.get(&id).unwrap().updated_at;
        assert!(store.update_content(&id, "a note"));
        let annotation = store.get(&id).unwrap();
        assert_eq!(annotation.content, "a note");
        assert!(annotation.updated_at >= created);
        assert!(!store.update_content("missing", "x"));
    }

    #[test]
    fn test_marking_options() {
        let (doc, pre) = MemoryDocument::with_text("The quick brown fox");
        let mut store = AnnotationStore::with_options(doc, MemoryDecorator::new(), StoreOptions::marking());
        let id = store
            .create(&pre, Region::Clean, text_target(4, 9, "quick"), AnnotationStyle::Circle)
            .id
            .clone();
        assert!(id.starts_with("marking-"));
        store.decorate(&id).unwrap();
        let marker = store.adapter().find_by_attribute("data-marking-id", &id).unwrap();
        assert!(store.adapter().has_class(&marker, "marking-target"));
    }
}
