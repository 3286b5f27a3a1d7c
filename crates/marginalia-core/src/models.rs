//! Data models for Marginalia
//!
//! Defines the persisted annotation record and its two closed enumerations:
//! the highlight color and the annotation kind. Both enumerations are stored
//! as small integer codes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::locator::Locator;

/// Color of an annotation
///
/// The integer codes are the persisted representation and must not change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Green,
    Blue,
    Yellow,
}

impl Color {
    /// Integer code used in storage
    pub fn code(&self) -> i64 {
        match self {
            Color::Red => 1,
            Color::Green => 2,
            Color::Blue => 3,
            Color::Yellow => 4,
        }
    }

    /// Decode a stored integer code
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Color::Red),
            2 => Some(Color::Green),
            3 => Some(Color::Blue),
            4 => Some(Color::Yellow),
            _ => None,
        }
    }
}

/// Kind of an annotation
///
/// The kind is immutable after creation: changing it is modeled as
/// delete + recreate because each kind carries a different style shape.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AnnotationKind {
    /// Background fill over the selected text
    Highlight,
    /// Bottom border under the selected text
    Underline,
    /// Bar struck through the selected text
    StrikeThrough,
    /// Vertical bar in the margin next to the selected block
    SideMark,
    /// Anchored marker that opens a note
    Note,
}

impl AnnotationKind {
    /// Integer code used in storage
    pub fn code(&self) -> i64 {
        match self {
            AnnotationKind::Highlight => 0,
            AnnotationKind::Underline => 1,
            AnnotationKind::StrikeThrough => 2,
            AnnotationKind::SideMark => 3,
            AnnotationKind::Note => 4,
        }
    }

    /// Decode a stored integer code
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(AnnotationKind::Highlight),
            1 => Some(AnnotationKind::Underline),
            2 => Some(AnnotationKind::StrikeThrough),
            3 => Some(AnnotationKind::SideMark),
            4 => Some(AnnotationKind::Note),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AnnotationKind::Highlight => "highlight",
            AnnotationKind::Underline => "underline",
            AnnotationKind::StrikeThrough => "strike-through",
            AnnotationKind::SideMark => "side-mark",
            AnnotationKind::Note => "note",
        };
        write!(f, "{}", name)
    }
}

/// A persisted reading annotation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    /// Unique identifier, generated at creation
    pub id: String,
    /// Foreign key to the publication
    pub publication_id: String,
    /// Location in the publication, opaque to the store
    pub locator: Locator,
    /// Color of the annotation (the only mutable field)
    pub color: Color,
    /// Kind of the annotation, immutable after creation
    pub kind: AnnotationKind,
    /// When this annotation was created
    pub created: DateTime<Utc>,
    /// Total progression in the publication, cached from the locator
    /// at construction so ordering queries never re-derive it
    pub progression: Option<f64>,
}

impl Annotation {
    /// Create a new annotation anchored at the given locator
    pub fn new(
        publication_id: impl Into<String>,
        locator: Locator,
        color: Color,
        kind: AnnotationKind,
    ) -> Self {
        let progression = locator.locations.total_progression;
        Self {
            id: Uuid::new_v4().to_string(),
            publication_id: publication_id.into(),
            locator,
            color,
            kind,
            created: Utc::now(),
            progression,
        }
    }

    /// Create an annotation with a specific id (for loading from storage)
    pub fn with_id(
        id: impl Into<String>,
        publication_id: impl Into<String>,
        locator: Locator,
        color: Color,
        kind: AnnotationKind,
    ) -> Self {
        let progression = locator.locations.total_progression;
        Self {
            id: id.into(),
            publication_id: publication_id.into(),
            locator,
            color,
            kind,
            created: Utc::now(),
            progression,
        }
    }
}
