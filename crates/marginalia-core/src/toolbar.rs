//! Selection toolbar: turns a live text selection into a new annotation.
//!
//! `Idle -> Selecting` when a usable selection is tracked, `Selecting ->
//! Visible` once the toolbar is placed, and back to `Idle` on cancel, on a
//! click outside, or after an annotation is created.

use smol_str::SmolStr;

use crate::error::AnnotationError;
use crate::offset_map::compute_offset;
use crate::platform::{Boundary, Decorator, DocumentAdapter};
use crate::store::AnnotationStore;
use crate::style::{AnnotationStyle, StyleDescriptor, available_styles, style_for_selection};
use crate::text::utf16_slice;
use crate::types::{AnnotationId, AnnotationTarget, OffsetRange, Position, Region, TextOffset};

/// A selection waiting for the user to pick a style.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSelection<N> {
    pub container: N,
    pub region: Region,
    pub range: OffsetRange,
    pub text: String,
    pub boundary: Boundary<N>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolbarState<N> {
    Idle,
    Selecting(PendingSelection<N>),
    Visible(PendingSelection<N>),
}

impl<N> Default for ToolbarState<N> {
    fn default() -> Self {
        ToolbarState::Idle
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolbarOptions {
    /// Distance the toolbar sits above the selection.
    pub offset: f64,
    /// Class on the toolbar element; clicks inside it never dismiss it.
    pub toolbar_class: SmolStr,
}

impl Default for ToolbarOptions {
    fn default() -> Self {
        Self {
            offset: 50.0,
            toolbar_class: SmolStr::new_static("annotation-toolbar"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectionToolbar<N> {
    state: ToolbarState<N>,
    style: AnnotationStyle,
    position: Position,
    multiline: bool,
    options: ToolbarOptions,
}

impl<N: Clone + PartialEq + std::fmt::Debug> Default for SelectionToolbar<N> {
    fn default() -> Self {
        Self::new(ToolbarOptions::default())
    }
}

impl<N: Clone + PartialEq + std::fmt::Debug> SelectionToolbar<N> {
    pub fn new(options: ToolbarOptions) -> Self {
        Self {
            state: ToolbarState::Idle,
            style: AnnotationStyle::default(),
            position: Position::default(),
            multiline: false,
            options,
        }
    }

    pub fn state(&self) -> &ToolbarState<N> {
        &self.state
    }

    pub fn pending(&self) -> Option<&PendingSelection<N>> {
        match &self.state {
            ToolbarState::Selecting(p) | ToolbarState::Visible(p) => Some(p),
            ToolbarState::Idle => None,
        }
    }

    pub fn is_visible(&self) -> bool {
        matches!(self.state, ToolbarState::Visible(_))
    }

    pub fn is_multiline(&self) -> bool {
        self.multiline
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn style(&self) -> AnnotationStyle {
        self.style
    }

    pub fn select_style(&mut self, style: AnnotationStyle) {
        self.style = style;
    }

    pub fn options(&self) -> &ToolbarOptions {
        &self.options
    }

    /// Styles offered for the current selection.
    pub fn available_styles(&self) -> Vec<&'static StyleDescriptor> {
        available_styles(self.multiline).collect()
    }

    /// Capture the live selection if it lies inside `container`.
    ///
    /// Collapsed, whitespace-only and out-of-container selections hide the toolbar.
    pub fn track_selection<A, D>(
        &mut self,
        store: &mut AnnotationStore<A, D>,
        container: &N,
        region: Region,
    ) -> bool
    where
        A: DocumentAdapter<Node = N>,
        D: Decorator<N>,
    {
        let Some(boundary) = store.adapter().selection() else {
            self.hide();
            return false;
        };
        let adapter = store.adapter();
        if boundary.is_collapsed()
            || !adapter.contains(container, &boundary.start_node)
            || !adapter.contains(container, &boundary.end_node)
        {
            self.hide();
            return false;
        }
        let range = match compute_offset(adapter, container, &boundary) {
            Ok(range) if !range.is_collapsed() => range,
            Ok(_) => {
                self.hide();
                return false;
            }
            Err(e) => {
                tracing::debug!(error = %e, "selection offsets unavailable");
                self.hide();
                return false;
            }
        };

        // Markers never change the flattened text, so a snapshot that differs
        // from the live text belongs to content that has since been replaced.
        let (adapter, snapshots) = store.adapter_and_snapshots();
        let live = adapter.text_content(container);
        let (key, mut snapshot) = snapshots.snapshot(adapter, container);
        if snapshot != live {
            tracing::debug!(container = %key, "container text changed, recapturing snapshot");
            snapshots.forget(&key);
            snapshot = snapshots.snapshot(adapter, container).1;
        }
        let Some(text) = utf16_slice(&snapshot, range.to_range()) else {
            self.hide();
            return false;
        };
        if text.trim().is_empty() {
            self.hide();
            return false;
        }
        tracing::trace!(target: "marginalia::toolbar", start = range.start, end = range.end, "selection tracked");
        self.state = ToolbarState::Selecting(PendingSelection {
            container: container.clone(),
            region,
            range,
            text: text.to_string(),
            boundary,
        });
        true
    }

    /// Place the toolbar and probe whether the selection spans lines.
    pub fn finalize<A: DocumentAdapter<Node = N>>(&mut self, adapter: &A) -> bool {
        let pending = match std::mem::take(&mut self.state) {
            ToolbarState::Selecting(p) | ToolbarState::Visible(p) => p,
            ToolbarState::Idle => return false,
        };
        self.multiline = adapter.client_rects(&pending.boundary).len() > 1;
        let style = style_for_selection(self.style, self.multiline);
        if style != self.style {
            tracing::debug!(from = %self.style, to = %style, "style cannot span lines, substituting");
            self.style = style;
        }
        self.state = ToolbarState::Visible(pending);
        self.refresh_position(adapter);
        true
    }

    /// Track and finalize in one step, as on pointer release.
    pub fn handle_pointer_up<A, D>(
        &mut self,
        store: &mut AnnotationStore<A, D>,
        container: &N,
        region: Region,
    ) -> bool
    where
        A: DocumentAdapter<Node = N>,
        D: Decorator<N>,
    {
        self.track_selection(store, container, region) && self.finalize(store.adapter())
    }

    /// Reposition over the pending selection, e.g. after scrolling.
    pub fn refresh_position<A: DocumentAdapter<Node = N>>(&mut self, adapter: &A) {
        let Some(pending) = self.pending() else {
            return;
        };
        let rect = adapter.range_rect(&pending.boundary);
        if rect.is_empty() {
            return;
        }
        self.position = Position {
            top: rect.top() - self.options.offset,
            left: rect.left() + rect.width / 2.0,
        };
    }

    /// Return to idle, dropping the pending selection.
    pub fn hide(&mut self) {
        self.state = ToolbarState::Idle;
        self.multiline = false;
    }

    /// Hide and clear the live selection.
    pub fn cancel<A: DocumentAdapter<Node = N>>(&mut self, adapter: &mut A) {
        self.hide();
        adapter.clear_selection();
    }

    /// Dismiss on a click outside the toolbar, markers and containers.
    ///
    /// Returns whether the toolbar was hidden.
    pub fn handle_click<A, D>(&mut self, store: &AnnotationStore<A, D>, target: &N) -> bool
    where
        A: DocumentAdapter<Node = N>,
        D: Decorator<N>,
    {
        let adapter = store.adapter();
        let options = store.options();
        if adapter
            .closest_with_class(target, &self.options.toolbar_class)
            .is_some()
        {
            return false;
        }
        if adapter.selection().is_some_and(|b| !b.is_collapsed()) {
            return false;
        }
        if adapter
            .closest_with_class(target, &options.marker_class)
            .is_some()
            || adapter
                .closest_with_class(target, &options.container_class)
                .is_some()
        {
            return false;
        }
        if matches!(self.state, ToolbarState::Idle) {
            return false;
        }
        self.hide();
        true
    }

    /// Create an annotation from the pending selection with the chosen style.
    ///
    /// The marker is injected immediately. If injection fails the new record
    /// is discarded.
    pub fn confirm<A, D>(&mut self, store: &mut AnnotationStore<A, D>) -> Result<AnnotationId, AnnotationError>
    where
        A: DocumentAdapter<Node = N>,
        D: Decorator<N>,
    {
        let pending = self.pending().cloned().ok_or(AnnotationError::NoSelection)?;
        let target = AnnotationTarget::text(pending.region, TextOffset::new(pending.range, pending.text));
        let id = store
            .create(&pending.container, pending.region, target, self.style)
            .id
            .clone();
        match store.decorate(&id) {
            Ok(()) => {}
            Err(e @ AnnotationError::InjectionFailed { .. }) => {
                store.delete(&id);
                self.hide();
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(annotation = %id, error = %e, "new annotation could not be decorated");
            }
        }
        store.adapter_mut().clear_selection();
        self.hide();
        Ok(id)
    }
}
