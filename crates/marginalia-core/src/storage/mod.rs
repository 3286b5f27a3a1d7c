//! Storage layer
//!
//! SQLite-backed persistence for annotations: the schema, the typed error
//! taxonomy, and the version bookkeeping used when opening a database.
//! The store in `crate::store` is the only component that talks to this
//! layer's connection.

pub mod error;
pub mod schema;

pub use error::{StoreError, StoreResult};
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
