//! Annotation store
//!
//! Durable, query-able, reactively observable persistence for annotations.
//!
//! ## Concurrency
//!
//! All reads and writes serialize through a single SQLite connection behind
//! a `tokio::sync::Mutex`; a writer holds it only for its own statement, so
//! no reader waits indefinitely. Every committed write bumps a generation
//! counter on a watch channel; each subscription runs a pump task that
//! re-queries a full snapshot per notification.
//!
//! ## Observation
//!
//! Snapshots are delivered with latest-value-wins semantics: a slow
//! subscriber sees the newest snapshot on its next poll, never a queue of
//! intermediate states. A snapshot that cannot be served (storage failure,
//! undecodable locator, deleted record for `observe_one`) fails the stream
//! with the error as its final item.
//!
//! ## Usage
//!
//! ```ignore
//! let store = AnnotationStore::open(&config)?;
//!
//! let id = store.add(&annotation).await?;
//! store.update(&id, Color::Green).await?;
//!
//! let mut sub = store.observe_all("publication-1");
//! while let Some(snapshot) = sub.next().await {
//!     render(snapshot?);
//! }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::config::Config;
use crate::locator::{JsonLocatorCodec, LocatorCodec};
use crate::models::{Annotation, AnnotationKind, Color};
use crate::storage::{init_schema, needs_init, StoreError, StoreResult};

/// Reactive, SQLite-backed repository of annotations
///
/// Cheap to clone; all clones share the same connection and change feed.
#[derive(Clone)]
pub struct AnnotationStore {
    inner: Arc<Inner>,
}

struct Inner {
    conn: Mutex<Connection>,
    codec: Box<dyn LocatorCodec>,
    changes: watch::Sender<u64>,
}

impl AnnotationStore {
    /// Open the store at the configured database path
    pub fn open(config: &Config) -> StoreResult<Self> {
        Self::open_with_codec(config, Box::new(JsonLocatorCodec))
    }

    /// Open the store with a reader-supplied locator codec
    pub fn open_with_codec(config: &Config, codec: Box<dyn LocatorCodec>) -> StoreResult<Self> {
        let path = config.db_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Config {
                details: format!("failed to create directory {:?}: {}", parent, e),
            })?;
        }
        let conn = Connection::open(&path)?;
        Self::from_connection(conn, codec)
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, Box::new(JsonLocatorCodec))
    }

    fn from_connection(conn: Connection, codec: Box<dyn LocatorCodec>) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        if needs_init(&conn) {
            init_schema(&conn)?;
        }
        let (changes, _) = watch::channel(0);
        Ok(Self {
            inner: Arc::new(Inner {
                conn: Mutex::new(conn),
                codec,
                changes,
            }),
        })
    }

    // ==================== Write operations ====================

    /// Insert a new annotation, returning its id
    ///
    /// Fails with `ConstraintViolation` if the id already exists; the
    /// existing record is left untouched.
    pub async fn add(&self, annotation: &Annotation) -> StoreResult<String> {
        let locator = self.inner.encode_locator(annotation)?;
        {
            let conn = self.inner.conn.lock().await;
            let result = conn.execute(
                "INSERT INTO annotations (id, publication_id, locator, color, kind, created, progression)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    annotation.id,
                    annotation.publication_id,
                    locator,
                    annotation.color.code(),
                    annotation.kind.code(),
                    annotation.created.timestamp_millis(),
                    annotation.progression,
                ],
            );
            match result {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    return Err(StoreError::ConstraintViolation {
                        id: annotation.id.clone(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
        debug!(id = %annotation.id, kind = %annotation.kind, "added annotation");
        self.inner.notify();
        Ok(annotation.id.clone())
    }

    /// Update the color of an existing annotation
    ///
    /// Color is the only mutable field; everything else is left untouched.
    pub async fn update(&self, id: &str, color: Color) -> StoreResult<()> {
        let changed = {
            let conn = self.inner.conn.lock().await;
            conn.execute(
                "UPDATE annotations SET color = ? WHERE id = ?",
                params![color.code(), id],
            )?
        };
        if changed == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        debug!(id, ?color, "updated annotation color");
        self.inner.notify();
        Ok(())
    }

    /// Remove an annotation
    pub async fn remove(&self, id: &str) -> StoreResult<()> {
        let removed = {
            let conn = self.inner.conn.lock().await;
            conn.execute("DELETE FROM annotations WHERE id = ?", params![id])?
        };
        if removed == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        debug!(id, "removed annotation");
        self.inner.notify();
        Ok(())
    }

    /// Remove every annotation of a publication, atomically
    ///
    /// Called when the owning publication is deleted. Returns the number of
    /// annotations removed; removing from an unknown publication is not an
    /// error.
    pub async fn remove_publication(&self, publication_id: &str) -> StoreResult<usize> {
        let removed = {
            let conn = self.inner.conn.lock().await;
            conn.execute(
                "DELETE FROM annotations WHERE publication_id = ?",
                params![publication_id],
            )?
        };
        debug!(publication_id, removed, "removed publication annotations");
        if removed > 0 {
            self.inner.notify();
        }
        Ok(removed)
    }

    // ==================== Query operations ====================

    /// Get an annotation by id
    pub async fn get(&self, id: &str) -> StoreResult<Annotation> {
        let conn = self.inner.conn.lock().await;
        self.inner.fetch_one(&conn, id)
    }

    /// Get all annotations of a publication, in reading order
    ///
    /// Ordered by progression ascending; annotations without progression
    /// sort last, ties broken by creation time ascending.
    pub async fn all(&self, publication_id: &str) -> StoreResult<Vec<Annotation>> {
        let conn = self.inner.conn.lock().await;
        self.inner.fetch_all(&conn, publication_id)
    }

    /// Count the annotations of a publication
    pub async fn count(&self, publication_id: &str) -> StoreResult<i64> {
        let conn = self.inner.conn.lock().await;
        conn.query_row(
            "SELECT COUNT(*) FROM annotations WHERE publication_id = ?",
            params![publication_id],
            |row| row.get(0),
        )
        .map_err(Into::into)
    }

    // ==================== Observation ====================

    /// Observe the ordered annotations of a publication
    ///
    /// Emits the current snapshot as the first item, then the newest
    /// snapshot after every change, for as long as the subscription is held.
    /// Must be called from within a Tokio runtime.
    pub fn observe_all(&self, publication_id: &str) -> Subscription<Vec<Annotation>> {
        let publication_id = publication_id.to_string();
        self.spawn_pump(Ok(Vec::new()), move |inner, conn| {
            inner.fetch_all(conn, &publication_id)
        })
    }

    /// Observe a single annotation
    ///
    /// Emits the current record as the first item, then again after every
    /// change. Fails the stream with `NotFound` if the record does not
    /// exist at subscription time or is deleted later.
    /// Must be called from within a Tokio runtime.
    pub fn observe_one(&self, id: &str) -> Subscription<Annotation> {
        let id = id.to_string();
        let placeholder = Err(StoreError::NotFound { id: id.clone() });
        self.spawn_pump(placeholder, move |inner, conn| inner.fetch_one(conn, &id))
    }

    /// Spawn the pump task feeding one subscription
    ///
    /// The placeholder seeds the watch channel and is already marked seen;
    /// the first delivered item is always a freshly queried snapshot. The
    /// pump exits when the subscriber is dropped, and after delivering the
    /// error when a snapshot fails.
    fn spawn_pump<T, F>(&self, placeholder: StoreResult<T>, query: F) -> Subscription<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&Inner, &Connection) -> StoreResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let (tx, rx) = watch::channel(placeholder);
        tokio::spawn(async move {
            let mut changes = inner.changes.subscribe();
            loop {
                let snapshot = {
                    let conn = inner.conn.lock().await;
                    query(&inner, &conn)
                };
                let failed = snapshot.is_err();
                if let Err(err) = &snapshot {
                    warn!(%err, "subscription snapshot failed");
                }
                if tx.send(snapshot).is_err() || failed {
                    break;
                }
                tokio::select! {
                    _ = tx.closed() => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Subscription { rx }
    }
}

impl Inner {
    /// Bump the change generation, waking every subscription pump
    fn notify(&self) {
        self.changes.send_modify(|generation| *generation += 1);
    }

    fn encode_locator(&self, annotation: &Annotation) -> StoreResult<String> {
        self.codec
            .encode(&annotation.locator)
            .map_err(|e| StoreError::LocatorDecode {
                id: annotation.id.clone(),
                details: e.to_string(),
            })
    }

    fn fetch_all(&self, conn: &Connection, publication_id: &str) -> StoreResult<Vec<Annotation>> {
        let mut stmt = conn.prepare(
            "SELECT id, publication_id, locator, color, kind, created, progression
             FROM annotations WHERE publication_id = ?
             ORDER BY progression IS NULL, progression, created",
        )?;

        let rows = stmt.query_map(params![publication_id], row_to_raw)?;

        let mut annotations = Vec::new();
        for row in rows {
            annotations.push(self.hydrate(row?)?);
        }
        Ok(annotations)
    }

    fn fetch_one(&self, conn: &Connection, id: &str) -> StoreResult<Annotation> {
        let row = conn
            .query_row(
                "SELECT id, publication_id, locator, color, kind, created, progression
                 FROM annotations WHERE id = ?",
                params![id],
                row_to_raw,
            )
            .optional()?;

        match row {
            Some(row) => self.hydrate(row),
            None => Err(StoreError::NotFound { id: id.to_string() }),
        }
    }

    /// Turn a raw row into an annotation, decoding the locator blob
    fn hydrate(&self, row: AnnotationRow) -> StoreResult<Annotation> {
        let locator = self
            .codec
            .decode(&row.locator)
            .map_err(|e| StoreError::LocatorDecode {
                id: row.id.clone(),
                details: e.to_string(),
            })?;
        let color = Color::from_code(row.color).ok_or_else(|| StoreError::InvalidCode {
            id: row.id.clone(),
            field: "color",
            code: row.color,
        })?;
        let kind = AnnotationKind::from_code(row.kind).ok_or_else(|| StoreError::InvalidCode {
            id: row.id.clone(),
            field: "kind",
            code: row.kind,
        })?;
        let created = DateTime::from_timestamp_millis(row.created).unwrap_or_else(Utc::now);

        Ok(Annotation {
            id: row.id,
            publication_id: row.publication_id,
            locator,
            color,
            kind,
            created,
            progression: row.progression,
        })
    }
}

struct AnnotationRow {
    id: String,
    publication_id: String,
    locator: String,
    color: i64,
    kind: i64,
    created: i64,
    progression: Option<f64>,
}

fn row_to_raw(row: &rusqlite::Row) -> rusqlite::Result<AnnotationRow> {
    Ok(AnnotationRow {
        id: row.get(0)?,
        publication_id: row.get(1)?,
        locator: row.get(2)?,
        color: row.get(3)?,
        kind: row.get(4)?,
        created: row.get(5)?,
        progression: row.get(6)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// A live subscription to store state
///
/// Yields the newest full snapshot after every committed write. Dropping
/// the subscription cancels it and releases its resources without
/// affecting other subscribers or pending writes.
pub struct Subscription<T> {
    rx: watch::Receiver<StoreResult<T>>,
}

impl<T: Clone> Subscription<T> {
    /// Wait for the next snapshot
    ///
    /// The initial snapshot is delivered on the first call. Returns `None`
    /// once the stream has terminated; an `Err` snapshot is always the
    /// final item before that.
    pub async fn next(&mut self) -> Option<StoreResult<T>> {
        if self.rx.changed().await.is_err() {
            return None;
        }
        Some(self.rx.borrow_and_update().clone())
    }

    /// The most recent snapshot, without waiting
    pub fn latest(&self) -> StoreResult<T> {
        self.rx.borrow().clone()
    }
}
