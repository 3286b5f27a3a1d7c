//! Publication locators
//!
//! A `Locator` describes a position inside a publication together with the
//! text surrounding it. The store never interprets locators: it persists
//! them through an injected codec and hands them back to the reader layer
//! untouched. Re-deriving a locator after content reflow is the reader's
//! responsibility.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A position inside a publication's content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Locator {
    /// Resource the locator points into (not interpreted by the store)
    pub href: String,
    /// Position data supplied by the location resolver
    #[serde(default)]
    pub locations: Locations,
    /// Text context around the anchored range, for display only
    #[serde(default)]
    pub text: Text,
}

/// Resolver-supplied position data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Locations {
    /// Progression within the resource, in `[0.0, 1.0]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progression: Option<f64>,
    /// Total progression within the publication, in `[0.0, 1.0]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_progression: Option<f64>,
    /// Position index, when the publication has stable positions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

/// Text immediately surrounding the anchored range
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Text {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

impl Locator {
    /// Create a locator pointing at the given resource
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            locations: Locations::default(),
            text: Text::default(),
        }
    }

    /// Set the total progression within the publication
    pub fn with_total_progression(mut self, total_progression: f64) -> Self {
        self.locations.total_progression = Some(total_progression);
        self
    }

    /// Set the surrounding text context
    pub fn with_text(
        mut self,
        before: Option<&str>,
        highlight: Option<&str>,
        after: Option<&str>,
    ) -> Self {
        self.text = Text {
            before: before.map(String::from),
            highlight: highlight.map(String::from),
            after: after.map(String::from),
        };
        self
    }
}

/// Failure to encode or decode a locator blob
#[derive(Debug, Error)]
#[error("{0}")]
pub struct LocatorCodecError(pub String);

/// Serializes locators to and from their persisted blob form
///
/// The codec is owned by the reader layer; the store only calls it and
/// treats the blob as opaque.
pub trait LocatorCodec: Send + Sync {
    fn encode(&self, locator: &Locator) -> Result<String, LocatorCodecError>;
    fn decode(&self, raw: &str) -> Result<Locator, LocatorCodecError>;
}

/// Default codec storing locators as a single JSON string
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLocatorCodec;

impl LocatorCodec for JsonLocatorCodec {
    fn encode(&self, locator: &Locator) -> Result<String, LocatorCodecError> {
        serde_json::to_string(locator).map_err(|e| LocatorCodecError(e.to_string()))
    }

    fn decode(&self, raw: &str) -> Result<Locator, LocatorCodecError> {
        serde_json::from_str(raw).map_err(|e| LocatorCodecError(e.to_string()))
    }
}
