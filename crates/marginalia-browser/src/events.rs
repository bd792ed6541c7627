//! Document-wide listeners: outside clicks dismiss the toolbar, scroll and
//! resize reposition annotations.

use std::cell::RefCell;
use std::rc::Rc;

use gloo_events::{EventListener, EventListenerOptions};
use wasm_bindgen::JsCast;
use web_sys::{EventTarget, Node};

use crate::document::BrowserDocument;

/// Listeners that stay attached until this value is dropped.
pub struct GlobalListeners {
    _listeners: Vec<EventListener>,
}

impl GlobalListeners {
    pub fn attach(
        doc: &BrowserDocument,
        mut on_click: impl FnMut(Node) + 'static,
        on_scroll: impl FnMut() + 'static,
    ) -> Self {
        let click = EventListener::new(doc.document(), "click", move |event| {
            if let Some(node) = event.target().and_then(|t| t.dyn_into::<Node>().ok()) {
                on_click(node);
            }
        });

        let on_scroll = Rc::new(RefCell::new(on_scroll));
        let scroll_cb = on_scroll.clone();
        // Capture phase so scrolling inner containers is seen too.
        let scroll = EventListener::new_with_options(
            doc.window(),
            "scroll",
            EventListenerOptions::run_in_capture_phase(),
            move |_| {
                if let Ok(mut f) = scroll_cb.try_borrow_mut() {
                    f();
                }
            },
        );
        let resize = EventListener::new(doc.window(), "resize", move |_| {
            if let Ok(mut f) = on_scroll.try_borrow_mut() {
                f();
            }
        });

        Self {
            _listeners: vec![click, scroll, resize],
        }
    }
}

/// Listen for pointer release on a content container.
pub fn listen_pointer_up(target: &EventTarget, mut f: impl FnMut() + 'static) -> EventListener {
    EventListener::new(target, "mouseup", move |_| f())
}
