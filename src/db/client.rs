use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::db::models::{DbAlbum, DbMarker, DbPhoto};

/// One row-level operation inside a commit batch
///
/// The cache store lowers its pending change sets to these before handing
/// them to [`Database::apply_ops`], which persists a whole batch in a single
/// transaction.
#[derive(Debug, Clone)]
pub enum RowOp {
    InsertMarker(DbMarker),
    InsertAlbum(DbAlbum),
    InsertPhoto(DbPhoto),
    UpdateAlbumName { id: String, name: String },
    UpdateAlbumRemoteTotal { id: String, remote_total_count: f64 },
    UpdatePhotoName { id: String, name: String },
    UpdatePhotoRemoteTotal { id: String, remote_total_count: f64 },
    DeleteMarker { id: String },
    DeleteAlbum { id: String },
    DeletePhoto { id: String },
}

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Initialize database connection and create tables
    pub async fn new(database_path: &str) -> Result<Self, sqlx::Error> {
        // Use sqlite:// with ?mode=rwc to create if it doesn't exist
        let database_url = format!("sqlite://{}?mode=rwc", database_path);
        info!("Connecting to {}", database_url);
        let pool = SqlitePool::connect(&database_url).await?;

        let db = Database { pool };
        db.create_tables().await?;
        Ok(db)
    }

    /// In-memory database for tests
    ///
    /// Pinned to a single pooled connection: every connection to
    /// `sqlite::memory:` is its own database, so the pool must never open a
    /// second one or let the first expire.
    pub async fn new_in_memory() -> Result<Self, sqlx::Error> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let db = Database { pool };
        db.create_tables().await?;
        Ok(db)
    }

    /// Create all necessary tables
    async fn create_tables(&self) -> Result<(), sqlx::Error> {
        // Markers table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS markers (
                id TEXT PRIMARY KEY,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Albums table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS albums (
                id TEXT PRIMARY KEY,
                marker_id TEXT NOT NULL,
                name TEXT NOT NULL,
                remote_total_count REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY (marker_id) REFERENCES markers (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Photos table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS photos (
                id TEXT PRIMARY KEY,
                album_id TEXT NOT NULL,
                name TEXT NOT NULL,
                image_bytes BLOB NOT NULL,
                remote_total_count REAL NOT NULL DEFAULT 0,
                FOREIGN KEY (album_id) REFERENCES albums (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Create indexes for performance
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_albums_marker_id ON albums (marker_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_photos_album_id ON photos (album_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Load all markers (warm start)
    pub async fn load_markers(&self) -> Result<Vec<DbMarker>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM markers")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(map_marker_row).collect())
    }

    /// Load all albums (warm start)
    pub async fn load_albums(&self) -> Result<Vec<DbAlbum>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM albums")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(map_album_row).collect())
    }

    /// Load all photos (warm start)
    pub async fn load_photos(&self) -> Result<Vec<DbPhoto>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM photos")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(map_photo_row).collect())
    }

    /// Get a single marker by ID
    pub async fn get_marker(&self, marker_id: &str) -> Result<Option<DbMarker>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM markers WHERE id = ?")
            .bind(marker_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(map_marker_row))
    }

    /// Get a single album by ID
    pub async fn get_album(&self, album_id: &str) -> Result<Option<DbAlbum>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM albums WHERE id = ?")
            .bind(album_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(map_album_row))
    }

    /// Get a single photo by ID
    pub async fn get_photo(&self, photo_id: &str) -> Result<Option<DbPhoto>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM photos WHERE id = ?")
            .bind(photo_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(map_photo_row))
    }

    /// Apply a commit batch in a single transaction
    ///
    /// Either every operation lands or none do; a failed batch leaves the
    /// durable state untouched so the caller can retry with the same pending
    /// changes.
    pub async fn apply_ops(&self, ops: &[RowOp]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for op in ops {
            match op {
                RowOp::InsertMarker(marker) => {
                    sqlx::query(
                        r#"
                        INSERT INTO markers (id, latitude, longitude, created_at)
                        VALUES (?, ?, ?, ?)
                        "#,
                    )
                    .bind(&marker.id)
                    .bind(marker.latitude)
                    .bind(marker.longitude)
                    .bind(marker.created_at.to_rfc3339())
                    .execute(&mut *tx)
                    .await?;
                }
                RowOp::InsertAlbum(album) => {
                    sqlx::query(
                        r#"
                        INSERT INTO albums (id, marker_id, name, remote_total_count, created_at)
                        VALUES (?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(&album.id)
                    .bind(&album.marker_id)
                    .bind(&album.name)
                    .bind(album.remote_total_count)
                    .bind(album.created_at.to_rfc3339())
                    .execute(&mut *tx)
                    .await?;
                }
                RowOp::InsertPhoto(photo) => {
                    sqlx::query(
                        r#"
                        INSERT INTO photos (id, album_id, name, image_bytes, remote_total_count)
                        VALUES (?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(&photo.id)
                    .bind(&photo.album_id)
                    .bind(&photo.name)
                    .bind(&photo.image_bytes)
                    .bind(photo.remote_total_count)
                    .execute(&mut *tx)
                    .await?;
                }
                RowOp::UpdateAlbumName { id, name } => {
                    sqlx::query("UPDATE albums SET name = ? WHERE id = ?")
                        .bind(name)
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
                RowOp::UpdateAlbumRemoteTotal {
                    id,
                    remote_total_count,
                } => {
                    sqlx::query("UPDATE albums SET remote_total_count = ? WHERE id = ?")
                        .bind(remote_total_count)
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
                RowOp::UpdatePhotoName { id, name } => {
                    sqlx::query("UPDATE photos SET name = ? WHERE id = ?")
                        .bind(name)
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
                RowOp::UpdatePhotoRemoteTotal {
                    id,
                    remote_total_count,
                } => {
                    sqlx::query("UPDATE photos SET remote_total_count = ? WHERE id = ?")
                        .bind(remote_total_count)
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
                RowOp::DeleteMarker { id } => {
                    // Albums and photos go with it via ON DELETE CASCADE
                    sqlx::query("DELETE FROM markers WHERE id = ?")
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
                RowOp::DeleteAlbum { id } => {
                    sqlx::query("DELETE FROM albums WHERE id = ?")
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
                RowOp::DeletePhoto { id } => {
                    sqlx::query("DELETE FROM photos WHERE id = ?")
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

fn map_marker_row(row: &sqlx::sqlite::SqliteRow) -> DbMarker {
    DbMarker {
        id: row.get("id"),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        created_at: DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at"))
            .unwrap()
            .with_timezone(&Utc),
    }
}

fn map_album_row(row: &sqlx::sqlite::SqliteRow) -> DbAlbum {
    DbAlbum {
        id: row.get("id"),
        marker_id: row.get("marker_id"),
        name: row.get("name"),
        remote_total_count: row.get("remote_total_count"),
        created_at: DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at"))
            .unwrap()
            .with_timezone(&Utc),
    }
}

fn map_photo_row(row: &sqlx::sqlite::SqliteRow) -> DbPhoto {
    DbPhoto {
        id: row.get("id"),
        album_id: row.get("album_id"),
        name: row.get("name"),
        image_bytes: row.get("image_bytes"),
        remote_total_count: row.get("remote_total_count"),
    }
}
