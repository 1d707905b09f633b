use std::path::Path;

use eyecap_core::EyeSelection;
use serde::Serialize;
use thiserror::Error;
use tokio_rusqlite::Connection;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] tokio_rusqlite::Error),
    #[error("rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// SQLite-backed index of captured eye images.
///
/// Only metadata lives here; the PNG files themselves sit in the save
/// directory under the recorded filename.
#[derive(Clone)]
pub struct CaptureStore {
    conn: Connection,
}

impl CaptureStore {
    /// Open (or create) the database at the given path and run migrations.
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        if db_path != Path::new(":memory:") {
            if let Some(parent) = db_path.parent() {
                std::fs::create_dir_all(parent).ok();
            }
        }

        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 CREATE TABLE IF NOT EXISTS images (
                     id TEXT PRIMARY KEY,
                     user TEXT NOT NULL,
                     filename TEXT NOT NULL UNIQUE,
                     eye_side TEXT NOT NULL,
                     iris_radius REAL,
                     pupil_diameter REAL,
                     created_at TEXT NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS idx_images_user ON images(user);",
            )?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Record a saved image. Returns the generated UUID.
    pub async fn insert(&self, image: NewImage) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = image.created_at.to_rfc3339();
        let eye_side = image.eye.to_string();

        let id_clone = id.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO images (id, user, filename, eye_side, iris_radius, pupil_diameter, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![
                        id_clone,
                        image.user,
                        image.filename,
                        eye_side,
                        image.iris_radius,
                        image.pupil_diameter,
                        created_at
                    ],
                )?;
                Ok(())
            })
            .await?;

        Ok(id)
    }

    /// List a user's images, newest first.
    pub async fn list_by_user(&self, user: &str) -> Result<Vec<ImageInfo>, StoreError> {
        let user = user.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, filename, eye_side, iris_radius, pupil_diameter, created_at
                     FROM images WHERE user = ?1 ORDER BY created_at DESC, rowid DESC",
                )?;
                let rows = stmt.query_map([&user], image_info_from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(StoreError::from)
    }

    /// Look up one image, scoped to its owner.
    pub async fn find(&self, user: &str, filename: &str) -> Result<Option<ImageInfo>, StoreError> {
        let user = user.to_string();
        let filename = filename.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, filename, eye_side, iris_radius, pupil_diameter, created_at
                     FROM images WHERE user = ?1 AND filename = ?2",
                )?;
                let mut rows = stmt.query_map([&user, &filename], image_info_from_row)?;
                Ok(rows.next().transpose()?)
            })
            .await
            .map_err(StoreError::from)
    }

    /// Count stored images across all users.
    pub async fn count_all(&self) -> Result<u64, StoreError> {
        self.conn
            .call(|conn| {
                let count: u64 =
                    conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
            .map_err(StoreError::from)
    }

    /// Per-eye and per-day capture counts for a user.
    pub async fn analytics(&self, user: &str) -> Result<Analytics, StoreError> {
        let user = user.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT eye_side, COUNT(*) FROM images WHERE user = ?1
                     GROUP BY eye_side ORDER BY eye_side",
                )?;
                let by_eye = stmt
                    .query_map([&user], |row| {
                        Ok(LabelCount {
                            label: row.get(0)?,
                            count: row.get(1)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                let mut stmt = conn.prepare(
                    "SELECT substr(created_at, 1, 10) AS day, COUNT(*) FROM images
                     WHERE user = ?1 GROUP BY day ORDER BY day",
                )?;
                let by_day = stmt
                    .query_map([&user], |row| {
                        Ok(LabelCount {
                            label: row.get(0)?,
                            count: row.get(1)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Analytics { by_eye, by_day })
            })
            .await
            .map_err(StoreError::from)
    }
}

fn image_info_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImageInfo> {
    Ok(ImageInfo {
        id: row.get(0)?,
        filename: row.get(1)?,
        eye_side: row.get(2)?,
        iris_radius: row.get(3)?,
        pupil_diameter: row.get(4)?,
        created_at: row.get(5)?,
    })
}

// ── Public types ──────────────────────────────────────────────────────────────

/// A saved image about to be recorded.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub user: String,
    pub filename: String,
    pub eye: EyeSelection,
    pub iris_radius: Option<f64>,
    pub pupil_diameter: Option<f64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Metadata about a stored image.
#[derive(Debug, Clone, Serialize)]
pub struct ImageInfo {
    pub id: String,
    pub filename: String,
    pub eye_side: String,
    pub iris_radius: Option<f64>,
    pub pupil_diameter: Option<f64>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Analytics {
    pub by_eye: Vec<LabelCount>,
    pub by_day: Vec<LabelCount>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
