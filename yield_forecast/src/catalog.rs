//! Relational catalog of observations and artifact metadata
//!
//! The engine talks to the catalog through the async [`Catalog`] trait.
//! [`SqliteCatalog`] is the bundled implementation: blocking SQLite calls run
//! on the tokio blocking pool, and every statement is parameterized.

use crate::data::ObservationRow;
use crate::error::{ForecastError, Result};
use crate::models::Algorithm;
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS dataset (
    uid          INTEGER PRIMARY KEY AUTOINCREMENT,
    date         TEXT    NOT NULL,
    crop_type    TEXT    NOT NULL,
    yield_values REAL    NOT NULL
);
CREATE INDEX IF NOT EXISTS dataset_crop_type ON dataset (crop_type);

CREATE TABLE IF NOT EXISTS algorithm (
    uid       TEXT PRIMARY KEY,
    algorithm TEXT NOT NULL,
    crop_type TEXT NOT NULL,
    last_date TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS algorithm_key ON algorithm (algorithm, crop_type);
"#;

/// Metadata row of a persisted model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Generated identifier, also the object key
    pub id: String,
    pub algorithm: Algorithm,
    pub category: String,
    /// Last month of the series the model was trained on
    pub last_period: NaiveDate,
}

/// Store for raw observations and artifact metadata
#[async_trait]
pub trait Catalog: Send + Sync + Debug {
    /// Persist rows, returning the identifier assigned to each
    async fn insert_observations(&self, rows: &[ObservationRow]) -> Result<Vec<i64>>;

    /// Rows whose category starts with `category_prefix`, or all rows
    async fn observations(&self, category_prefix: Option<&str>) -> Result<Vec<ObservationRow>>;

    /// Artifacts for an exact (algorithm, category) pair, newest first
    async fn find_artifacts(
        &self,
        algorithm: Algorithm,
        category: &str,
    ) -> Result<Vec<ArtifactMetadata>>;

    async fn insert_artifact(&self, metadata: &ArtifactMetadata) -> Result<()>;

    /// Delete a metadata row; `Ok(false)` when no row had that id
    async fn delete_artifact(&self, id: &str) -> Result<bool>;

    /// Release the underlying connection; later calls fail
    async fn close(&self) -> Result<()>;
}

/// SQLite-backed catalog
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteCatalog {
    /// Open (or create) a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "catalog opened");
        Self::init(conn)
    }

    /// Private in-memory database
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            let conn = guard
                .as_mut()
                .ok_or_else(|| ForecastError::Catalog("Catalog is closed".to_string()))?;
            f(conn)
        })
        .await?
    }
}

/// Escape LIKE wildcards so a prefix matches literally
fn like_prefix(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn observation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ObservationRow> {
    Ok(ObservationRow {
        uid: Some(row.get(0)?),
        date: row.get(1)?,
        category: row.get(2)?,
        value: row.get(3)?,
    })
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn insert_observations(&self, rows: &[ObservationRow]) -> Result<Vec<i64>> {
        let rows = rows.to_vec();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let mut ids = Vec::with_capacity(rows.len());
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO dataset (date, crop_type, yield_values) VALUES (?1, ?2, ?3)",
                )?;
                for row in &rows {
                    stmt.execute(params![row.date, row.category, row.value])?;
                    ids.push(tx.last_insert_rowid());
                }
            }
            tx.commit()?;
            debug!(rows = ids.len(), "observations inserted");
            Ok(ids)
        })
        .await
    }

    async fn observations(&self, category_prefix: Option<&str>) -> Result<Vec<ObservationRow>> {
        let prefix = category_prefix.map(like_prefix);
        self.run(move |conn| {
            let rows = match prefix {
                Some(prefix) => {
                    let mut stmt = conn.prepare(
                        "SELECT uid, date, crop_type, yield_values FROM dataset \
                         WHERE crop_type LIKE ?1 || '%' ESCAPE '\\' ORDER BY date, uid",
                    )?;
                    let rows = stmt
                        .query_map(params![prefix], observation_from_row)?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    rows
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT uid, date, crop_type, yield_values FROM dataset ORDER BY date, uid",
                    )?;
                    let rows = stmt
                        .query_map([], observation_from_row)?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    rows
                }
            };
            Ok(rows)
        })
        .await
    }

    async fn find_artifacts(
        &self,
        algorithm: Algorithm,
        category: &str,
    ) -> Result<Vec<ArtifactMetadata>> {
        let category = category.to_string();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT uid, algorithm, crop_type, last_date FROM algorithm \
                 WHERE algorithm = ?1 AND crop_type = ?2 \
                 ORDER BY last_date DESC, rowid DESC",
            )?;
            let raw = stmt
                .query_map(params![algorithm.as_str(), category], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, NaiveDate>(3)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            raw.into_iter()
                .map(|(id, algorithm, category, last_period)| {
                    Ok(ArtifactMetadata {
                        id,
                        algorithm: algorithm.parse()?,
                        category,
                        last_period,
                    })
                })
                .collect()
        })
        .await
    }

    async fn insert_artifact(&self, metadata: &ArtifactMetadata) -> Result<()> {
        let metadata = metadata.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO algorithm (uid, algorithm, crop_type, last_date) VALUES (?1, ?2, ?3, ?4)",
                params![
                    metadata.id,
                    metadata.algorithm.as_str(),
                    metadata.category,
                    metadata.last_period
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_artifact(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.run(move |conn| {
            let deleted = conn.execute("DELETE FROM algorithm WHERE uid = ?1", params![id])?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            if let Some(conn) = conn.lock().take() {
                conn.close().map_err(|(_, err)| ForecastError::from(err))?;
                info!("catalog closed");
            }
            Ok(())
        })
        .await?
    }
}
