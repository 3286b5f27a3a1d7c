//! Marginalia Core Library
//!
//! This crate provides the core functionality for Marginalia, a local-first
//! store of reading annotations (highlights, underlines, strike-throughs,
//! side-marks, notes) anchored inside a publication, plus the projection
//! that turns each stored annotation into a renderable decoration.
//!
//! # Architecture
//!
//! - **SQLite**: single table of annotation records, ordered by reading
//!   progression, observed reactively through watch channels
//! - **Projection**: pure mapping from a record to layout + markup +
//!   stylesheet + style parameters, driven by an immutable template registry
//!
//! The content renderer, the annotation list UI, and the locator resolver
//! are external collaborators; this crate never interprets publication
//! content itself.
//!
//! # Quick Start
//!
//! ```text
//! let store = AnnotationStore::open(&Config::load()?)?;
//!
//! // Persist an annotation
//! let annotation = Annotation::new(publication_id, locator, Color::Yellow, AnnotationKind::Highlight);
//! store.add(&annotation).await?;
//!
//! // Observe a publication's annotations in reading order
//! let mut sub = store.observe_all(publication_id);
//! let registry = TemplateRegistry::new();
//! while let Some(snapshot) = sub.next().await {
//!     for annotation in snapshot? {
//!         renderer.apply(project(&annotation, &registry)?);
//!     }
//! }
//! ```
//!
//! # Modules
//!
//! - `store`: annotation persistence and reactive observation (main entry point)
//! - `models`: annotation record, color, and kind
//! - `locator`: publication position value types and the locator codec
//! - `decoration`: projection from records to renderable decorations
//! - `storage`: SQLite schema and the error taxonomy
//! - `config`: library configuration

pub mod config;
pub mod decoration;
pub mod locator;
pub mod models;
pub mod storage;
pub mod store;

pub use config::Config;
pub use decoration::{
    project, Decoration, DecorationLayout, DecorationStyle, DecorationTemplate, TemplateRegistry,
    Tint,
};
pub use locator::{JsonLocatorCodec, Locations, Locator, LocatorCodec, LocatorCodecError, Text};
pub use models::{Annotation, AnnotationKind, Color};
pub use storage::{StoreError, StoreResult};
pub use store::{AnnotationStore, Subscription};
