//! Types exposed to JavaScript via wasm-bindgen.

use marginalia_core::{Annotation, SelectionToolbar, StyleDescriptor};
use serde::{Deserialize, Serialize};
use tsify_next::Tsify;
use wasm_bindgen::prelude::*;

/// Constructor options. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase", default)]
pub struct AnnotatorOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settle_delay_ms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection_delay_ms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolbar_offset: Option<f64>,
    /// Use the marking naming (`marking-span-…`, `data-marking-id`).
    pub marking: bool,
}

/// An annotation as the host UI sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct JsAnnotation {
    pub id: String,
    pub content: String,
    pub style: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub top: f64,
    pub left: f64,
    pub persisted: bool,
    pub created_at: String,
}

impl From<&Annotation> for JsAnnotation {
    fn from(a: &Annotation) -> Self {
        let offset = a.target.text_offset.as_ref();
        Self {
            id: a.id.to_string(),
            content: a.content.clone(),
            style: a.style.as_str().to_string(),
            region: a.region().as_str().to_string(),
            start: offset.map(|o| o.start),
            end: offset.map(|o| o.end),
            text: offset.map(|o| o.text.clone()),
            top: a.position.top,
            left: a.position.left,
            persisted: a.persisted,
            created_at: a.created_at.to_rfc3339(),
        }
    }
}

/// One entry of the style picker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct JsStyle {
    pub value: String,
    pub label: String,
    pub icon: String,
    pub color: String,
    pub active_color: String,
    pub supports_multiline: bool,
}

impl From<&StyleDescriptor> for JsStyle {
    fn from(d: &StyleDescriptor) -> Self {
        Self {
            value: d.value.as_str().to_string(),
            label: d.label.to_string(),
            icon: d.icon.to_string(),
            color: d.color.to_string(),
            active_color: d.active_color.to_string(),
            supports_multiline: d.supports_multiline,
        }
    }
}

/// Toolbar snapshot for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct JsToolbar {
    pub visible: bool,
    pub top: f64,
    pub left: f64,
    pub style: String,
    pub multiline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_text: Option<String>,
    pub styles: Vec<JsStyle>,
}

impl<N: Clone + PartialEq + std::fmt::Debug> From<&SelectionToolbar<N>> for JsToolbar {
    fn from(t: &SelectionToolbar<N>) -> Self {
        let position = t.position();
        Self {
            visible: t.is_visible(),
            top: position.top,
            left: position.left,
            style: t.style().as_str().to_string(),
            multiline: t.is_multiline(),
            selected_text: t.pending().map(|p| p.text.clone()),
            styles: t.available_styles().into_iter().map(JsStyle::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marginalia_core::{
        AnnotationStyle, AnnotationTarget, NodeId, OffsetRange, Region, SmolStr, TextOffset,
        ToolbarOptions,
    };

    #[test]
    fn test_annotation_view() {
        let target = AnnotationTarget::text(Region::Translate, TextOffset::new(OffsetRange::new(3, 9), "renard"));
        let mut annotation = Annotation::new(SmolStr::new("a1"), AnnotationStyle::StrikeThrough, target);
        annotation.content = "fox".to_string();
        let view = JsAnnotation::from(&annotation);
        assert_eq!(view.style, "strike-through");
        assert_eq!(view.region, "translate");
        assert_eq!((view.start, view.end), (Some(3), Some(9)));
        assert_eq!(view.text.as_deref(), Some("renard"));
        assert!(!view.persisted);
    }

    #[test]
    fn test_idle_toolbar_offers_every_style() {
        let toolbar: SelectionToolbar<NodeId> = SelectionToolbar::new(ToolbarOptions::default());
        let view = JsToolbar::from(&toolbar);
        assert!(!view.visible);
        assert_eq!(view.style, "highlight");
        assert_eq!(view.styles.len(), marginalia_core::STYLES.len());
        assert_eq!(view.selected_text, None);
    }

    #[test]
    fn test_options_accept_partial_input() {
        let options: AnnotatorOptions = serde_json::from_str(r#"{"apiUrl":"http://x/api","marking":true}"#).unwrap();
        assert_eq!(options.api_url.as_deref(), Some("http://x/api"));
        assert!(options.marking);
        assert_eq!(options.settle_delay_ms, None);
    }
}
