//! JsAnnotator - the annotation session wrapper for JavaScript.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use gloo_events::EventListener;

use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};
use web_sys::HtmlElement;

use marginalia_browser::{
    BrowserDocument, BrowserSession, GlobalListeners, RoughDecorator, SettleTimer, defer,
    listen_pointer_up, schedule_flush,
};
use marginalia_common::{Config, HttpAnnotationApi};
use marginalia_core::{
    AnnotationStyle, CreateAnnotationRecord, EntityRef, PersistenceBridge, Region, STYLES,
    StoreOptions, ToolbarOptions, reconcile_created, rehydrate,
};

use crate::types::{AnnotatorOptions, JsAnnotation, JsStyle, JsToolbar};

fn js_error(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

fn parse_region(region: &str) -> Result<Region, JsError> {
    region.parse::<Region>().map_err(js_error)
}

/// Counts entity switches so a response can tell whether it is stale.
#[derive(Debug, Default)]
struct Epoch(Cell<u64>);

impl Epoch {
    /// Start a new epoch and return it.
    fn bump(&self) -> u64 {
        let next = self.0.get().wrapping_add(1);
        self.0.set(next);
        next
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.0.get() == epoch
    }
}

struct Inner {
    epoch: Epoch,
    session: Rc<RefCell<BrowserSession>>,
    settle: RefCell<SettleTimer>,
    api: HttpAnnotationApi,
    entity: RefCell<Option<EntityRef>>,
    selection_delay_ms: u32,
    on_change: RefCell<Option<js_sys::Function>>,
    on_error: RefCell<Option<js_sys::Function>>,
}

impl Inner {
    /// Tell the host to re-read annotations and toolbar state.
    ///
    /// Never call while the session is borrowed: the callback may call back in.
    fn changed(&self) {
        let callback = self.on_change.borrow().clone();
        if let Some(f) = callback {
            if let Err(e) = f.call0(&JsValue::NULL) {
                tracing::warn!(error = ?e, "change callback threw");
            }
        }
    }

    fn flush_later(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        schedule_flush(&mut self.settle.borrow_mut(), &self.session, move |drawn| {
            if drawn > 0 {
                if let Some(inner) = weak.upgrade() {
                    inner.changed();
                }
            }
        });
    }

    /// Read the selection once the browser has finalized it.
    fn pointer_up(self: &Rc<Self>, region: Region) {
        let weak = Rc::downgrade(self);
        defer(self.selection_delay_ms, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let handled = match inner.session.try_borrow_mut() {
                Ok(mut session) => {
                    session.handle_pointer_up(region);
                    true
                }
                Err(_) => false,
            };
            if handled {
                inner.changed();
            }
        });
    }

    fn bridge(&self) -> Option<PersistenceBridge<HttpAnnotationApi>> {
        let entity = self.entity.borrow().clone()?;
        let on_error = self.on_error.borrow().clone();
        Some(
            PersistenceBridge::new(self.api.clone(), entity).with_notifier(move |message: &str| {
                if let Some(f) = &on_error {
                    let _ = f.call1(&JsValue::NULL, &JsValue::from_str(message));
                }
            }),
        )
    }

    async fn save(
        self: Rc<Self>,
        bridge: PersistenceBridge<HttpAnnotationApi>,
        record: CreateAnnotationRecord,
        local: String,
    ) {
        // Failures are already logged and reported by the bridge.
        let Ok(server) = bridge.persist_created(&record).await else {
            return;
        };
        // Runs even after a reload or navigation: the local id is unique, so
        // a cleared store only yields a follow-up for an explicit delete.
        let follow_up = reconcile_created(
            self.session.borrow_mut().store_mut(),
            &local,
            &server,
            &record.content,
        );
        self.changed();
        let _ = bridge.apply(follow_up).await;
    }
}

/// A text annotator bound to the page's DOM.
#[wasm_bindgen]
pub struct JsAnnotator {
    inner: Rc<Inner>,
    container_listeners: RefCell<HashMap<Region, EventListener>>,
    _listeners: GlobalListeners,
}

#[wasm_bindgen]
impl JsAnnotator {
    /// Create an annotator. `options` may be omitted.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<JsAnnotator, JsError> {
        let options: AnnotatorOptions = if options.is_undefined() || options.is_null() {
            AnnotatorOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options)
                .map_err(|e| JsError::new(&format!("Invalid options: {}", e)))?
        };

        let mut config = Config::default();
        if let Some(url) = options.api_url {
            config.api_url = url;
        }
        if let Some(delay) = options.settle_delay_ms {
            config.settle_delay_ms = delay;
        }
        if let Some(delay) = options.selection_delay_ms {
            config.selection_delay_ms = delay;
        }
        if let Some(offset) = options.toolbar_offset {
            config.toolbar_offset = offset;
        }
        config.validate().map_err(js_error)?;

        let document = BrowserDocument::new().map_err(js_error)?;
        let store_options = if options.marking {
            StoreOptions::marking()
        } else {
            StoreOptions::default()
        };
        let toolbar_options = ToolbarOptions {
            offset: config.toolbar_offset,
            ..Default::default()
        };
        let session = BrowserSession::with_options(
            document.clone(),
            RoughDecorator,
            store_options,
            toolbar_options,
        );

        let inner = Rc::new(Inner {
            epoch: Epoch::default(),
            session: Rc::new(RefCell::new(session)),
            settle: RefCell::new(SettleTimer::new(config.settle_delay_ms)),
            api: HttpAnnotationApi::from_config(&config).map_err(js_error)?,
            entity: RefCell::new(None),
            selection_delay_ms: config.selection_delay_ms,
            on_change: RefCell::new(None),
            on_error: RefCell::new(None),
        });

        let on_click = {
            let weak = Rc::downgrade(&inner);
            move |target: web_sys::Node| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let dismissed = match inner.session.try_borrow_mut() {
                    Ok(mut session) => session.handle_click(&target),
                    Err(_) => false,
                };
                if dismissed {
                    inner.changed();
                }
            }
        };
        let on_scroll = {
            let weak = Rc::downgrade(&inner);
            move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let moved = match inner.session.try_borrow_mut() {
                    Ok(mut session) => {
                        session.handle_scroll();
                        true
                    }
                    Err(_) => false,
                };
                if moved {
                    inner.changed();
                }
            }
        };
        let listeners = GlobalListeners::attach(&document, on_click, on_scroll);
        tracing::debug!(api = %config.api_url, marking = options.marking, "annotator created");

        Ok(Self {
            inner,
            container_listeners: RefCell::new(HashMap::new()),
            _listeners: listeners,
        })
    }

    /// Called with no arguments whenever annotations or the toolbar change.
    #[wasm_bindgen(js_name = setOnChange)]
    pub fn set_on_change(&self, callback: Option<js_sys::Function>) {
        *self.inner.on_change.borrow_mut() = callback;
    }

    /// Called with a message when a request to the backend fails.
    #[wasm_bindgen(js_name = setOnError)]
    pub fn set_on_error(&self, callback: Option<js_sys::Function>) {
        *self.inner.on_error.borrow_mut() = callback;
    }

    /// Register the element holding a region's text.
    ///
    /// Pointer release inside the element starts selection tracking, so
    /// hosts only need `handleMouseUp` for content they route themselves.
    #[wasm_bindgen(js_name = registerContainer)]
    pub fn register_container(&self, region: &str, element: &HtmlElement) -> Result<(), JsError> {
        let region = parse_region(region)?;
        let node: web_sys::Node = element.clone().into();
        self.inner.session.borrow_mut().register_container(region, node);

        let weak = Rc::downgrade(&self.inner);
        let listener = listen_pointer_up(element, move || {
            if let Some(inner) = weak.upgrade() {
                inner.pointer_up(region);
            }
        });
        self.container_listeners.borrow_mut().insert(region, listener);
        Ok(())
    }

    /// Pointer released over a region's content; reads the selection shortly after.
    #[wasm_bindgen(js_name = handleMouseUp)]
    pub fn handle_mouse_up(&self, region: &str) -> Result<(), JsError> {
        let region = parse_region(region)?;
        self.inner.pointer_up(region);
        Ok(())
    }

    #[wasm_bindgen(js_name = selectStyle)]
    pub fn select_style(&self, style: &str) -> Result<(), JsError> {
        let style = style.parse::<AnnotationStyle>().map_err(js_error)?;
        self.inner.session.borrow_mut().select_style(style);
        self.inner.changed();
        Ok(())
    }

    /// Turn the pending selection into an annotation and save it.
    ///
    /// Returns the client id. The id changes once the backend confirms it.
    #[wasm_bindgen(js_name = createFromSelection)]
    pub fn create_from_selection(&self) -> Result<String, JsError> {
        let local = self
            .inner
            .session
            .borrow_mut()
            .confirm_selection()
            .map_err(js_error)?;
        self.inner.flush_later();
        self.inner.changed();

        if let Some(bridge) = self.inner.bridge() {
            let record = {
                let session = self.inner.session.borrow();
                session.store().get(&local).map(|a| bridge.create_record(a))
            };
            match record {
                Some(Ok(record)) => {
                    let inner = self.inner.clone();
                    spawn_local(inner.save(bridge, record, local.to_string()));
                }
                Some(Err(e)) => tracing::warn!(annotation = %local, error = %e, "annotation not saved"),
                None => {}
            }
        }
        Ok(local.to_string())
    }

    pub fn cancel(&self) {
        self.inner.session.borrow_mut().cancel_selection();
        self.inner.changed();
    }

    #[wasm_bindgen(js_name = updateContent)]
    pub fn update_content(&self, id: &str, content: &str) -> bool {
        let persisted = {
            let mut session = self.inner.session.borrow_mut();
            if !session.update_content(id, content) {
                return false;
            }
            session.store().get(id).is_some_and(|a| a.persisted)
        };
        // Unsaved records push their content once the create completes.
        if persisted {
            if let Some(bridge) = self.inner.bridge() {
                let (id, content) = (id.to_string(), content.to_string());
                spawn_local(async move {
                    let _ = bridge.persist_content(&id, &content).await;
                });
            }
        }
        self.inner.changed();
        true
    }

    #[wasm_bindgen(js_name = deleteAnnotation)]
    pub fn delete_annotation(&self, id: &str) -> bool {
        let removed = self.inner.session.borrow_mut().delete(id);
        let Some(removed) = removed else {
            return false;
        };
        if removed.persisted {
            if let Some(bridge) = self.inner.bridge() {
                let id = id.to_string();
                spawn_local(async move {
                    let _ = bridge.persist_delete(&id).await;
                });
            }
        }
        self.inner.changed();
        true
    }

    #[wasm_bindgen(js_name = setHovered)]
    pub fn set_hovered(&self, id: &str, hovering: bool) {
        self.inner.session.borrow_mut().set_hovered(id, hovering);
    }

    /// Show `region`, or nothing when omitted. Register the region's
    /// container first if it was re-rendered.
    #[wasm_bindgen(js_name = switchTab)]
    pub fn switch_tab(&self, region: Option<String>) -> Result<(), JsError> {
        let region = region.as_deref().map(parse_region).transpose()?;
        self.inner.session.borrow_mut().switch_region(region);
        self.inner.flush_later();
        self.inner.changed();
        Ok(())
    }

    /// Annotations of a region in reading order.
    pub fn annotations(&self, region: &str) -> Result<JsValue, JsError> {
        let region = parse_region(region)?;
        let session = self.inner.session.borrow();
        let list: Vec<JsAnnotation> = session
            .store()
            .sorted_by_region(region)
            .into_iter()
            .map(JsAnnotation::from)
            .collect();
        serde_wasm_bindgen::to_value(&list).map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
    }

    pub fn toolbar(&self) -> JsToolbar {
        JsToolbar::from(self.inner.session.borrow().toolbar())
    }

    pub fn styles() -> Result<JsValue, JsError> {
        let styles: Vec<JsStyle> = STYLES.iter().map(JsStyle::from).collect();
        serde_wasm_bindgen::to_value(&styles).map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
    }

    /// Load an entity's annotations. Resolves to the number loaded.
    pub fn load(&self, entity_uuid: String, entity_type: String) -> js_sys::Promise {
        *self.inner.entity.borrow_mut() = Some(EntityRef::new(entity_uuid, entity_type));
        let epoch = self.inner.epoch.bump();
        let inner = self.inner.clone();
        future_to_promise(async move {
            let Some(bridge) = inner.bridge() else {
                return Ok(JsValue::from(0));
            };
            let records = bridge
                .fetch()
                .await
                .map_err(|e| JsValue::from(js_error(e)))?;
            if !inner.epoch.is_current(epoch) {
                tracing::debug!(entity = %bridge.entity().uuid, "discarding annotations of a previous entity");
                return Ok(JsValue::from(0));
            }
            let count = {
                let mut session = inner.session.borrow_mut();
                session.clear();
                rehydrate(session.store_mut(), records)
            };
            inner.flush_later();
            inner.changed();
            Ok(JsValue::from(count as u32))
        })
    }

    /// Forget all annotations, e.g. when navigating away.
    pub fn clear(&self) {
        self.inner.epoch.bump();
        self.inner.settle.borrow_mut().cancel();
        self.inner.session.borrow_mut().clear();
        *self.inner.entity.borrow_mut() = None;
        self.inner.changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_epoch_is_detected() {
        let epoch = Epoch::default();
        let first = epoch.bump();
        assert!(epoch.is_current(first));

        let second = epoch.bump();
        assert!(!epoch.is_current(first));
        assert!(epoch.is_current(second));
    }
}
