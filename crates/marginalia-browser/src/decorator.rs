//! Sketch-style decorations drawn by the `rough-notation` library.

use marginalia_core::{DecorationConfig, DecorationHandle, Decorator};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::Node;

#[wasm_bindgen(module = "rough-notation")]
extern "C" {
    /// A rough-notation annotation instance.
    pub type RoughAnnotation;

    #[wasm_bindgen(js_name = annotate)]
    fn rough_annotate(element: &web_sys::HtmlElement, config: &JsValue) -> RoughAnnotation;

    #[wasm_bindgen(method)]
    fn show(this: &RoughAnnotation);

    #[wasm_bindgen(method)]
    fn hide(this: &RoughAnnotation);

    #[wasm_bindgen(method)]
    fn remove(this: &RoughAnnotation);
}

/// Handle to one drawn decoration. Inert once removed, or when the marker
/// was not an HTML element.
pub struct RoughDecoration {
    inner: Option<RoughAnnotation>,
}

impl DecorationHandle for RoughDecoration {
    fn show(&mut self) {
        if let Some(inner) = &self.inner {
            inner.show();
        }
    }

    fn hide(&mut self) {
        if let Some(inner) = &self.inner {
            inner.hide();
        }
    }

    fn remove(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.remove();
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RoughDecorator;

impl Decorator<Node> for RoughDecorator {
    type Handle = RoughDecoration;

    fn annotate(&mut self, element: &Node, marker_id: &str, config: &DecorationConfig) -> RoughDecoration {
        let Some(element) = element.dyn_ref::<web_sys::HtmlElement>() else {
            tracing::warn!(marker = marker_id, "decoration target is not an HTML element");
            return RoughDecoration { inner: None };
        };
        let config = match serde_wasm_bindgen::to_value(config) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(marker = marker_id, error = %e, "could not convert decoration config");
                return RoughDecoration { inner: None };
            }
        };
        RoughDecoration {
            inner: Some(rough_annotate(element, &config)),
        }
    }
}
