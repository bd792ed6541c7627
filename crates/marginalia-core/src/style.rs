//! Annotation styles and decoration configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::UnknownVariant;

/// Visual treatment of an annotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnnotationStyle {
    Underline,
    #[default]
    Highlight,
    Box,
    Bracket,
    Circle,
    StrikeThrough,
}

impl AnnotationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationStyle::Underline => "underline",
            AnnotationStyle::Highlight => "highlight",
            AnnotationStyle::Box => "box",
            AnnotationStyle::Bracket => "bracket",
            AnnotationStyle::Circle => "circle",
            AnnotationStyle::StrikeThrough => "strike-through",
        }
    }

    pub fn descriptor(&self) -> &'static StyleDescriptor {
        // STYLES is declared in enum order.
        &STYLES[*self as usize]
    }

    pub fn supports_multiline(&self) -> bool {
        self.descriptor().supports_multiline
    }

    pub fn icon(&self) -> &'static str {
        self.descriptor().icon
    }

    /// Stroke colour, darker when `active`.
    pub fn color(&self, active: bool) -> &'static str {
        let d = self.descriptor();
        if active { d.active_color } else { d.color }
    }
}

impl fmt::Display for AnnotationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnnotationStyle {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        STYLES
            .iter()
            .find(|d| d.value.as_str() == s)
            .map(|d| d.value)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

/// Static description of a style for pickers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleDescriptor {
    pub value: AnnotationStyle,
    pub label: &'static str,
    pub icon: &'static str,
    pub supports_multiline: bool,
    pub color: &'static str,
    pub active_color: &'static str,
}

/// All styles in picker order.
pub const STYLES: [StyleDescriptor; 6] = [
    StyleDescriptor {
        value: AnnotationStyle::Underline,
        label: "Underline",
        icon: "mdi:format-underline",
        supports_multiline: false,
        color: "#3b82f6",
        active_color: "#1d4ed8",
    },
    StyleDescriptor {
        value: AnnotationStyle::Highlight,
        label: "Highlight",
        icon: "mdi:format-color-highlight",
        supports_multiline: true,
        color: "#fef08a",
        active_color: "#d97706",
    },
    StyleDescriptor {
        value: AnnotationStyle::Box,
        label: "Box",
        icon: "mdi:border-all",
        supports_multiline: true,
        color: "#10b981",
        active_color: "#047857",
    },
    StyleDescriptor {
        value: AnnotationStyle::Bracket,
        label: "Bracket",
        icon: "mdi:code-brackets",
        supports_multiline: true,
        color: "#8b5cf6",
        active_color: "#6d28d9",
    },
    StyleDescriptor {
        value: AnnotationStyle::Circle,
        label: "Circle",
        icon: "mdi:circle-outline",
        supports_multiline: true,
        color: "#f59e0b",
        active_color: "#c2410c",
    },
    StyleDescriptor {
        value: AnnotationStyle::StrikeThrough,
        label: "Strikethrough",
        icon: "mdi:format-strikethrough",
        supports_multiline: false,
        color: "#ef4444",
        active_color: "#b91c1c",
    },
];

/// Side of a bracket decoration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BracketSide {
    Left,
    Right,
    Top,
    Bottom,
}

/// Options handed to the decorator, serialised in the overlay library's shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecorationConfig {
    #[serde(rename = "type")]
    pub kind: DecorationKind,
    pub color: &'static str,
    pub stroke_width: u32,
    pub animate: bool,
    pub padding: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub multiline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brackets: Option<Vec<BracketSide>>,
}

/// Annotation type names understood by the overlay library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecorationKind {
    Underline,
    Highlight,
    Box,
    Bracket,
    Circle,
    StrikeThrough,
}

impl From<AnnotationStyle> for DecorationKind {
    fn from(style: AnnotationStyle) -> Self {
        match style {
            AnnotationStyle::Underline => DecorationKind::Underline,
            AnnotationStyle::Highlight => DecorationKind::Highlight,
            AnnotationStyle::Box => DecorationKind::Box,
            AnnotationStyle::Bracket => DecorationKind::Bracket,
            AnnotationStyle::Circle => DecorationKind::Circle,
            AnnotationStyle::StrikeThrough => DecorationKind::StrikeThrough,
        }
    }
}

/// Build the decorator config for a style.
///
/// Only highlight receives the multiline flag, and only for multi-line spans.
pub fn build_decoration_config(style: AnnotationStyle, is_multiline: bool) -> DecorationConfig {
    DecorationConfig {
        kind: style.into(),
        color: style.color(false),
        stroke_width: 2,
        animate: true,
        padding: if style == AnnotationStyle::Bracket { 6 } else { 2 },
        multiline: style == AnnotationStyle::Highlight && is_multiline,
        brackets: (style == AnnotationStyle::Bracket)
            .then(|| vec![BracketSide::Left, BracketSide::Right]),
    }
}

/// First style in picker order that can span lines.
pub fn first_multiline_style() -> AnnotationStyle {
    STYLES
        .iter()
        .find(|d| d.supports_multiline)
        .map(|d| d.value)
        .unwrap_or(AnnotationStyle::Highlight)
}

/// Styles usable for a selection.
pub fn available_styles(is_multiline: bool) -> impl Iterator<Item = &'static StyleDescriptor> {
    STYLES
        .iter()
        .filter(move |d| !is_multiline || d.supports_multiline)
}

/// The style to use for a selection, swapping in a multiline-capable one when needed.
pub fn style_for_selection(style: AnnotationStyle, is_multiline: bool) -> AnnotationStyle {
    if is_multiline && !style.supports_multiline() {
        first_multiline_style()
    } else {
        style
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_order_matches_enum() {
        for (i, d) in STYLES.iter().enumerate() {
            assert_eq!(d.value as usize, i);
            assert_eq!(d.value.descriptor().value, d.value);
        }
    }

    #[test]
    fn test_style_names_parse() {
        assert_eq!("strike-through".parse::<AnnotationStyle>(), Ok(AnnotationStyle::StrikeThrough));
        assert_eq!(
            serde_json::to_value(AnnotationStyle::StrikeThrough).unwrap(),
            serde_json::json!("strike-through")
        );
        assert!("wavy".parse::<AnnotationStyle>().is_err());
    }

    #[test]
    fn test_multiline_substitution() {
        assert_eq!(first_multiline_style(), AnnotationStyle::Highlight);
        assert_eq!(
            style_for_selection(AnnotationStyle::Underline, true),
            AnnotationStyle::Highlight
        );
        assert_eq!(
            style_for_selection(AnnotationStyle::Underline, false),
            AnnotationStyle::Underline
        );
        assert_eq!(
            style_for_selection(AnnotationStyle::Circle, true),
            AnnotationStyle::Circle
        );
    }

    #[test]
    fn test_available_styles_filters_multiline() {
        let all: Vec<_> = available_styles(false).map(|d| d.value).collect();
        assert_eq!(all.len(), 6);
        let multi: Vec<_> = available_styles(true).map(|d| d.value).collect();
        assert_eq!(
            multi,
            vec![
                AnnotationStyle::Highlight,
                AnnotationStyle::Box,
                AnnotationStyle::Bracket,
                AnnotationStyle::Circle,
            ]
        );
    }

    #[test]
    fn test_non_multiline_styles_never_get_multiline_config() {
        for d in STYLES {
            let config = build_decoration_config(d.value, true);
            if !d.supports_multiline {
                assert!(!config.multiline);
            }
        }
        assert!(build_decoration_config(AnnotationStyle::Highlight, true).multiline);
        assert!(!build_decoration_config(AnnotationStyle::Highlight, false).multiline);
    }

    #[test]
    fn test_bracket_config_shape() {
        let config = build_decoration_config(AnnotationStyle::Bracket, false);
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            serde_json::json!({
                "type": "bracket",
                "color": "#8b5cf6",
                "strokeWidth": 2,
                "animate": true,
                "padding": 6,
                "brackets": ["left", "right"]
            })
        );
    }

    #[test]
    fn test_colors() {
        assert_eq!(AnnotationStyle::Circle.color(false), "#f59e0b");
        assert_eq!(AnnotationStyle::Circle.color(true), "#c2410c");
        assert_eq!(AnnotationStyle::Box.icon(), "mdi:border-all");
    }
}
