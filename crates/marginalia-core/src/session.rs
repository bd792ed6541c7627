//! Event handling for an annotatable view.
//!
//! An `AnnotationSession` owns the store and the selection toolbar and routes
//! host events (pointer release, clicks, scroll, tab changes) to them. Hosts
//! call [`AnnotationSession::flush_pending`] after the settle delay that
//! follows any operation that decorates.

use crate::error::AnnotationError;
use crate::platform::{Decorator, DocumentAdapter};
use crate::store::{AnnotationStore, StoreOptions};
use crate::style::AnnotationStyle;
use crate::toolbar::{SelectionToolbar, ToolbarOptions};
use crate::types::{Annotation, AnnotationId, Region};

pub struct AnnotationSession<A, D>
where
    A: DocumentAdapter,
    D: Decorator<A::Node>,
{
    store: AnnotationStore<A, D>,
    toolbar: SelectionToolbar<A::Node>,
    active_region: Option<Region>,
    hovered: Option<AnnotationId>,
}

impl<A, D> AnnotationSession<A, D>
where
    A: DocumentAdapter,
    D: Decorator<A::Node>,
{
    pub fn new(adapter: A, decorator: D) -> Self {
        Self::with_options(adapter, decorator, StoreOptions::default(), ToolbarOptions::default())
    }

    pub fn with_options(
        adapter: A,
        decorator: D,
        store_options: StoreOptions,
        toolbar_options: ToolbarOptions,
    ) -> Self {
        Self {
            store: AnnotationStore::with_options(adapter, decorator, store_options),
            toolbar: SelectionToolbar::new(toolbar_options),
            active_region: None,
            hovered: None,
        }
    }

    pub fn store(&self) -> &AnnotationStore<A, D> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut AnnotationStore<A, D> {
        &mut self.store
    }

    pub fn toolbar(&self) -> &SelectionToolbar<A::Node> {
        &self.toolbar
    }

    pub fn active_region(&self) -> Option<Region> {
        self.active_region
    }

    pub fn hovered(&self) -> Option<&AnnotationId> {
        self.hovered.as_ref()
    }

    pub fn register_container(&mut self, region: Region, container: A::Node) {
        self.store.register_container(region, container);
    }

    /// Track the selection in the active region's container.
    pub fn handle_pointer_up(&mut self, region: Region) -> bool {
        if self.active_region != Some(region) {
            return false;
        }
        let Some(container) = self.store.container_for(region).cloned() else {
            tracing::debug!(%region, "pointer up without a registered container");
            return false;
        };
        self.toolbar
            .handle_pointer_up(&mut self.store, &container, region)
    }

    pub fn select_style(&mut self, style: AnnotationStyle) {
        self.toolbar.select_style(style);
    }

    pub fn confirm_selection(&mut self) -> Result<AnnotationId, AnnotationError> {
        self.toolbar.confirm(&mut self.store)
    }

    pub fn cancel_selection(&mut self) {
        self.toolbar.cancel(self.store.adapter_mut());
    }

    pub fn update_content(&mut self, id: &str, content: &str) -> bool {
        self.store.update_content(id, content)
    }

    pub fn delete(&mut self, id: &str) -> Option<Annotation> {
        if self.hovered.as_deref() == Some(id) {
            self.hovered = None;
        }
        self.store.delete(id)
    }

    pub fn set_hovered(&mut self, id: &str, hovering: bool) {
        if hovering {
            self.hovered = Some(AnnotationId::new(id));
        } else if self.hovered.as_deref() == Some(id) {
            self.hovered = None;
        }
    }

    /// Route a document click. Returns whether the toolbar was dismissed.
    pub fn handle_click(&mut self, target: &A::Node) -> bool {
        self.toolbar.handle_click(&self.store, target)
    }

    /// Recompute positions after scroll or resize.
    pub fn handle_scroll(&mut self) {
        self.store.update_all_positions();
        if self.toolbar.is_visible() {
            self.toolbar.refresh_position(self.store.adapter());
        }
    }

    /// Make `region` the visible tab.
    ///
    /// Register the region's freshly rendered container before calling.
    pub fn switch_region(&mut self, region: Option<Region>) {
        self.toolbar.hide();
        if let Some(old) = self.active_region.take() {
            self.store.hide_by_region(old);
        }
        self.active_region = region;
        if let Some(new) = region {
            tracing::debug!(region = %new, "switching region");
            self.store.show_by_region(new);
        }
    }

    /// Forget everything, as when navigating to another document.
    pub fn clear(&mut self) {
        self.toolbar.hide();
        self.hovered = None;
        self.store.clear();
    }

    pub fn flush_pending(&mut self) -> usize {
        self.store.flush_pending()
    }
}
