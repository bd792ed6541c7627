//! Error types for marginalia applications

use marginalia_core::AnnotationError;
use miette::{Diagnostic, NamedSource, SourceOffset, SourceSpan};

/// Main error type for marginalia operations
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum MarginaliaError {
    /// Annotation engine error
    #[error(transparent)]
    #[diagnostic(code(marginalia::annotation))]
    Annotation(#[from] AnnotationError),

    /// HTTP transport error
    #[error(transparent)]
    #[diagnostic(code(marginalia::http), help("check that the annotation API is reachable"))]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-zero code
    #[error("annotation API returned code {code}: {message}")]
    #[diagnostic(code(marginalia::api))]
    Api { code: i64, message: String },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    #[diagnostic(code(marginalia::config))]
    Config(String),

    #[error(transparent)]
    #[diagnostic(code(marginalia::url))]
    Url(#[from] url::ParseError),

    /// IO error
    #[error(transparent)]
    #[diagnostic(code(marginalia::io))]
    Io(#[from] std::io::Error),

    /// Parse error with source location
    #[error(transparent)]
    #[diagnostic_source]
    Parse(#[from] ParseError),

    /// Serialization/deserialization error
    #[error(transparent)]
    #[diagnostic_source]
    Serde(#[from] SerDeError),
}

/// Parse error with source code location information
#[derive(thiserror::Error, Debug, Diagnostic)]
#[error("failed to parse {name}: {message}")]
#[diagnostic(code(marginalia::parse))]
pub struct ParseError {
    name: String,
    message: String,
    #[source_code]
    src: NamedSource<String>,
    #[label("here")]
    location: SourceSpan,
    #[help]
    advice: Option<String>,
}

impl ParseError {
    /// Locate a `serde_json` error inside the document it came from.
    pub fn json(name: impl Into<String>, src: impl Into<String>, err: &serde_json::Error) -> Self {
        let name = name.into();
        let src = src.into();
        let offset = if err.line() == 0 {
            SourceOffset::from(0)
        } else {
            SourceOffset::from_location(&src, err.line(), err.column())
        };
        Self {
            message: err.to_string(),
            src: NamedSource::new(name.clone(), src),
            location: SourceSpan::new(offset, 0),
            advice: match err.classify() {
                serde_json::error::Category::Data => {
                    Some("the JSON is well formed but does not match the expected shape".to_string())
                }
                _ => None,
            },
            name,
        }
    }

    /// Locate a `toml` error inside the document it came from.
    pub fn toml(name: impl Into<String>, src: impl Into<String>, err: &toml::de::Error) -> Self {
        let name = name.into();
        let src = src.into();
        let location = err
            .span()
            .map(|span| SourceSpan::from(span.start..span.end))
            .unwrap_or_else(|| SourceSpan::new(SourceOffset::from(0), 0));
        Self {
            message: err.message().to_string(),
            src: NamedSource::new(name.clone(), src),
            location,
            advice: None,
            name,
        }
    }

    pub fn location(&self) -> SourceSpan {
        self.location
    }
}

/// Serialization/deserialization errors
#[derive(thiserror::Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum SerDeError {
    #[error(transparent)]
    #[diagnostic(code(marginalia::serde::json))]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(code(marginalia::serde::toml))]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    #[diagnostic(code(marginalia::serde::toml))]
    TomlSer(#[from] toml::ser::Error),
}

impl From<serde_json::Error> for MarginaliaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(SerDeError::Json(err))
    }
}

impl From<MarginaliaError> for AnnotationError {
    fn from(err: MarginaliaError) -> Self {
        match err {
            MarginaliaError::Annotation(inner) => inner,
            other => AnnotationError::transport(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_parse_error_points_at_failure() {
        let src = "{\n  \"style\": }";
        let err = serde_json::from_str::<serde_json::Value>(src).unwrap_err();
        let parse = ParseError::json("notes.json", src, &err);
        // Second line
        assert!(parse.location().offset() > 2);
        assert!(parse.location().offset() <= src.len());
        assert!(parse.to_string().starts_with("failed to parse notes.json"));
    }

    #[test]
    fn test_api_error_converts_to_transport_failure() {
        let err = MarginaliaError::Api {
            code: 404,
            message: "not found".to_string(),
        };
        assert_eq!(
            AnnotationError::from(err),
            AnnotationError::TransportFailure(
                "annotation API returned code 404: not found".to_string()
            )
        );
        let inner = MarginaliaError::from(AnnotationError::NoSelection);
        assert_eq!(AnnotationError::from(inner), AnnotationError::NoSelection);
    }
}
