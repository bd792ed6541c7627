//! Shared application plumbing for marginalia: configuration, errors, the
//! HTTP annotation client and tracing setup.

pub mod client;
pub mod config;
pub mod error;
#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use crate::client::HttpAnnotationApi;
pub use crate::config::{Config, FileStore, Loader, Saver};
pub use crate::error::{MarginaliaError, ParseError, SerDeError};
