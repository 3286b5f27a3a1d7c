//! Decoration projection
//!
//! Maps a stored annotation to a renderer-facing decoration: a layout
//! strategy, an HTML fragment, a stylesheet, and the style parameters the
//! renderer needs to restyle or reactivate it. Projection is pure and
//! deterministic; it never touches storage and is safe to call concurrently.
//!
//! Each annotation kind has a fixed template, collected once at startup in
//! a `TemplateRegistry`. Markup generation is plain string substitution
//! keyed by the resolved tint and per-kind geometry constants.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::locator::Locator;
use crate::models::{Annotation, AnnotationKind, Color};
use crate::storage::{StoreError, StoreResult};

/// How a decoration is laid out over the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecorationLayout {
    /// One element wrapping the full selection bounding box
    Bounds,
    /// One element per visual line box of the selection
    Boxes,
}

/// An RGB tint rendered into CSS color expressions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tint {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Tint {
    /// Fallback tint for styles built without a record color
    pub const RED: Tint = Tint { r: 255, g: 0, b: 0 };

    /// CSS `rgba()` expression with the given alpha
    pub fn css_value(&self, alpha: f64) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, alpha)
    }
}

impl From<Color> for Tint {
    fn from(color: Color) -> Self {
        match color {
            Color::Red => Tint { r: 255, g: 0, b: 0 },
            Color::Green => Tint { r: 0, g: 255, b: 0 },
            Color::Blue => Tint { r: 0, g: 0, b: 255 },
            Color::Yellow => Tint {
                r: 255,
                g: 255,
                b: 0,
            },
        }
    }
}

/// Style parameters for one decoration, tagged by annotation kind
///
/// Only the note style repeats the owning locator, so the renderer can
/// reopen the note editor without a second store round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum DecorationStyle {
    Highlight { tint: Tint },
    Underline { tint: Tint },
    StrikeThrough { tint: Tint },
    SideMark { tint: Tint, is_active: bool },
    Note { tint: Tint, is_active: bool, locator: Locator },
}

impl DecorationStyle {
    /// The annotation kind this style belongs to
    pub fn kind(&self) -> AnnotationKind {
        match self {
            DecorationStyle::Highlight { .. } => AnnotationKind::Highlight,
            DecorationStyle::Underline { .. } => AnnotationKind::Underline,
            DecorationStyle::StrikeThrough { .. } => AnnotationKind::StrikeThrough,
            DecorationStyle::SideMark { .. } => AnnotationKind::SideMark,
            DecorationStyle::Note { .. } => AnnotationKind::Note,
        }
    }

    /// The resolved tint of this style
    pub fn tint(&self) -> Tint {
        match self {
            DecorationStyle::Highlight { tint }
            | DecorationStyle::Underline { tint }
            | DecorationStyle::StrikeThrough { tint }
            | DecorationStyle::SideMark { tint, .. }
            | DecorationStyle::Note { tint, .. } => *tint,
        }
    }
}

/// Rendering template for one annotation kind
pub struct DecorationTemplate {
    kind: AnnotationKind,
    layout: DecorationLayout,
    stylesheet: &'static str,
    element: fn(&DecorationStyle) -> String,
}

impl DecorationTemplate {
    pub fn new(
        kind: AnnotationKind,
        layout: DecorationLayout,
        stylesheet: &'static str,
        element: fn(&DecorationStyle) -> String,
    ) -> Self {
        Self {
            kind,
            layout,
            stylesheet,
            element,
        }
    }

    pub fn kind(&self) -> AnnotationKind {
        self.kind
    }

    pub fn layout(&self) -> DecorationLayout {
        self.layout
    }

    pub fn stylesheet(&self) -> &'static str {
        self.stylesheet
    }

    /// Render the markup fragment for a style of this template's kind
    ///
    /// A style tagged for a different kind is a programming error or data
    /// corruption; it fails loudly instead of rendering default styling.
    pub fn render(&self, style: &DecorationStyle) -> StoreResult<String> {
        if style.kind() != self.kind {
            return Err(StoreError::InvalidConfigKind {
                expected: self.kind,
                actual: style.kind(),
            });
        }
        Ok((self.element)(style))
    }
}

/// Immutable kind-to-template table, built once at startup
pub struct TemplateRegistry {
    templates: HashMap<AnnotationKind, DecorationTemplate>,
}

impl TemplateRegistry {
    /// Build the registry with the default template for every kind
    pub fn new() -> Self {
        let mut templates = HashMap::new();
        for template in [
            highlight_template(),
            underline_template(),
            strike_through_template(),
            side_mark_template(),
            note_template(),
        ] {
            templates.insert(template.kind, template);
        }
        Self { templates }
    }

    /// Replace the template for a single kind, keeping the rest
    pub fn with_template(mut self, template: DecorationTemplate) -> Self {
        self.templates.insert(template.kind, template);
        self
    }

    pub fn get(&self, kind: AnnotationKind) -> &DecorationTemplate {
        // every kind is populated at construction and replacement keeps the key
        &self.templates[&kind]
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Renderer-facing description of one annotation
#[derive(Debug, Clone)]
pub struct Decoration {
    pub layout: DecorationLayout,
    pub element: String,
    pub stylesheet: &'static str,
    pub style: DecorationStyle,
}

/// Project an annotation into its renderable decoration
///
/// The tint is derived from the annotation's color. The same annotation
/// and registry always produce the same decoration.
pub fn project(annotation: &Annotation, registry: &TemplateRegistry) -> StoreResult<Decoration> {
    let style = style_for(annotation);
    let template = registry.get(annotation.kind);
    let element = template.render(&style)?;
    Ok(Decoration {
        layout: template.layout(),
        element,
        stylesheet: template.stylesheet(),
        style,
    })
}

fn style_for(annotation: &Annotation) -> DecorationStyle {
    let tint = Tint::from(annotation.color);
    match annotation.kind {
        AnnotationKind::Highlight => DecorationStyle::Highlight { tint },
        AnnotationKind::Underline => DecorationStyle::Underline { tint },
        AnnotationKind::StrikeThrough => DecorationStyle::StrikeThrough { tint },
        AnnotationKind::SideMark => DecorationStyle::SideMark {
            tint,
            is_active: false,
        },
        AnnotationKind::Note => DecorationStyle::Note {
            tint,
            is_active: false,
            locator: annotation.locator.clone(),
        },
    }
}

// ==================== Default templates ====================

const HIGHLIGHT_STYLESHEET: &str = r#"
.highlight {
    border-radius: 3px;
}
"#;

fn highlight_template() -> DecorationTemplate {
    DecorationTemplate::new(
        AnnotationKind::Highlight,
        DecorationLayout::Boxes,
        HIGHLIGHT_STYLESHEET,
        |style| {
            format!(
                r#"<div class="highlight" style="background-color: {}"/>"#,
                style.tint().css_value(0.3)
            )
        },
    )
}

const UNDERLINE_STYLESHEET: &str = r#"
.underline {
    border-bottom: 2px solid var(--tint);
}
"#;

fn underline_template() -> DecorationTemplate {
    DecorationTemplate::new(
        AnnotationKind::Underline,
        DecorationLayout::Boxes,
        UNDERLINE_STYLESHEET,
        |style| {
            format!(
                r#"<div class="underline" style="--tint: {}"/>"#,
                style.tint().css_value(1.0)
            )
        },
    )
}

// Strike bar geometry: 1px side inset folded back as padding so the bar
// covers the glyphs it crosses, rounded ends, pulled up to mid-line.
const STRIKE_THROUGH_STYLESHEET: &str = r#"
.strikethrough {
    margin-left: -1px;
    padding-right: 2px;
    margin-top: 0px;
    padding-bottom: 0px;
    border-radius: 3px;
    transform: translateY(-45%);
}
"#;

fn strike_through_template() -> DecorationTemplate {
    DecorationTemplate::new(
        AnnotationKind::StrikeThrough,
        DecorationLayout::Boxes,
        STRIKE_THROUGH_STYLESHEET,
        |style| {
            format!(
                r#"<div class="strikethrough" style="border-bottom: 2px {} solid;"/>"#,
                style.tint().css_value(1.0)
            )
        },
    )
}

// Fixed-width bar on the block's reading edge, mirrored for RTL content.
const SIDE_MARK_STYLESHEET: &str = r#"
.sidemark {
    float: left;
    width: 5px;
    height: 100%;
    background-color: var(--tint);
    margin-left: 20px;
    border-radius: 3px;
}
[dir=rtl] .sidemark {
    float: right;
    margin-left: 0px;
    margin-right: 20px;
}
"#;

fn side_mark_template() -> DecorationTemplate {
    DecorationTemplate::new(
        AnnotationKind::SideMark,
        DecorationLayout::Bounds,
        SIDE_MARK_STYLESHEET,
        |style| {
            format!(
                r#"<div><div class="sidemark" style="--tint: {}"/></div>"#,
                style.tint().css_value(0.5)
            )
        },
    )
}

const NOTE_STYLESHEET: &str = r#"
.note {
    width: 40px;
    height: 40px;
    position: relative;
    transform: translateY(-45%);
}
.note svg {
    display: inline-block;
    width: 100%;
    height: 100%;
    fill: var(--tint);
}
"#;

fn note_template() -> DecorationTemplate {
    DecorationTemplate::new(
        AnnotationKind::Note,
        DecorationLayout::Bounds,
        NOTE_STYLESHEET,
        |style| {
            format!(
                concat!(
                    r#"<div><div class="note" style="--tint: {}">"#,
                    r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24">"#,
                    r#"<path d="M4 2h16a2 2 0 0 1 2 2v12a2 2 0 0 1-2 2H8l-4 4V4a2 2 0 0 1 2-2z"/>"#,
                    r#"</svg></div></div>"#
                ),
                style.tint().css_value(1.0)
            )
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::Locator;
    use crate::models::Annotation;

    fn annotation(kind: AnnotationKind, color: Color) -> Annotation {
        let locator = Locator::new("/chapter-1.xhtml").with_total_progression(0.5);
        Annotation::new("pub-1", locator, color, kind)
    }

    #[test]
    fn test_layouts_match_per_kind_table() {
        let registry = TemplateRegistry::new();

        let boxes = [
            AnnotationKind::Highlight,
            AnnotationKind::Underline,
            AnnotationKind::StrikeThrough,
        ];
        for kind in boxes {
            let decoration = project(&annotation(kind, Color::Red), &registry).unwrap();
            assert_eq!(decoration.layout, DecorationLayout::Boxes, "{}", kind);
        }

        for kind in [AnnotationKind::SideMark, AnnotationKind::Note] {
            let decoration = project(&annotation(kind, Color::Red), &registry).unwrap();
            assert_eq!(decoration.layout, DecorationLayout::Bounds, "{}", kind);
        }
    }

    #[test]
    fn test_style_kind_always_matches_record_kind() {
        let registry = TemplateRegistry::new();
        for kind in [
            AnnotationKind::Highlight,
            AnnotationKind::Underline,
            AnnotationKind::StrikeThrough,
            AnnotationKind::SideMark,
            AnnotationKind::Note,
        ] {
            let decoration = project(&annotation(kind, Color::Blue), &registry).unwrap();
            assert_eq!(decoration.style.kind(), kind);
        }
    }

    #[test]
    fn test_side_mark_style_has_no_locator() {
        let registry = TemplateRegistry::new();
        let decoration =
            project(&annotation(AnnotationKind::SideMark, Color::Red), &registry).unwrap();

        match decoration.style {
            DecorationStyle::SideMark { tint, is_active } => {
                assert_eq!(tint, Tint::RED);
                assert!(!is_active);
            }
            other => panic!("expected a side-mark style, got {:?}", other),
        }
    }

    #[test]
    fn test_note_style_repeats_own_locator() {
        let registry = TemplateRegistry::new();
        let record = annotation(AnnotationKind::Note, Color::Yellow);
        let decoration = project(&record, &registry).unwrap();

        match decoration.style {
            DecorationStyle::Note { locator, .. } => assert_eq!(locator, record.locator),
            other => panic!("expected a note style, got {:?}", other),
        }
    }

    #[test]
    fn test_tint_derives_from_record_color() {
        let registry = TemplateRegistry::new();

        let green = project(
            &annotation(AnnotationKind::Highlight, Color::Green),
            &registry,
        )
        .unwrap();
        assert!(green.element.contains("rgba(0, 255, 0, 0.3)"));

        let yellow = project(
            &annotation(AnnotationKind::Underline, Color::Yellow),
            &registry,
        )
        .unwrap();
        assert!(yellow.element.contains("rgba(255, 255, 0, 1)"));
    }

    #[test]
    fn test_projection_is_deterministic() {
        let registry = TemplateRegistry::new();
        let record = annotation(AnnotationKind::StrikeThrough, Color::Blue);

        let a = project(&record, &registry).unwrap();
        let b = project(&record, &registry).unwrap();
        assert_eq!(a.element, b.element);
        assert_eq!(a.stylesheet, b.stylesheet);
        assert_eq!(a.style, b.style);
    }

    #[test]
    fn test_mismatched_style_fails_loudly() {
        let registry = TemplateRegistry::new();
        let template = registry.get(AnnotationKind::Note);

        let result = template.render(&DecorationStyle::SideMark {
            tint: Tint::RED,
            is_active: false,
        });
        assert!(matches!(
            result,
            Err(StoreError::InvalidConfigKind {
                expected: AnnotationKind::Note,
                actual: AnnotationKind::SideMark,
            })
        ));
    }

    #[test]
    fn test_side_mark_stylesheet_mirrors_for_rtl() {
        let registry = TemplateRegistry::new();
        let stylesheet = registry.get(AnnotationKind::SideMark).stylesheet();
        assert!(stylesheet.contains("[dir=rtl]"));
        assert!(stylesheet.contains("float: right;"));
    }

    #[test]
    fn test_with_template_overrides_single_kind() {
        let registry = TemplateRegistry::new().with_template(DecorationTemplate::new(
            AnnotationKind::Highlight,
            DecorationLayout::Boxes,
            ".highlight { opacity: 0.5; }",
            |_| "<div class=\"highlight\"/>".to_string(),
        ));

        let custom = project(
            &annotation(AnnotationKind::Highlight, Color::Red),
            &registry,
        )
        .unwrap();
        assert_eq!(custom.element, "<div class=\"highlight\"/>");

        // Other kinds keep their defaults
        let side_mark =
            project(&annotation(AnnotationKind::SideMark, Color::Red), &registry).unwrap();
        assert!(side_mark.element.contains("sidemark"));
    }

    #[test]
    fn test_css_value() {
        assert_eq!(Tint::RED.css_value(0.5), "rgba(255, 0, 0, 0.5)");
        assert_eq!(
            Tint::from(Color::Blue).css_value(1.0),
            "rgba(0, 0, 255, 1)"
        );
    }
}
