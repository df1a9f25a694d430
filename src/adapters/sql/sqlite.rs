use crate::domain::video::{VideoRecord, VideoStatus};
use crate::ports::metadata::{MetadataError, MetadataStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;

/// Embedded metadata backend for single-host deployments.
pub struct SqliteMetadata {
    pool: SqlitePool,
}

impl SqliteMetadata {
    pub async fn open(path: &Path) -> Result<Self, MetadataError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        Self::init(pool).await
    }

    /// A single-connection pool: every connection to `:memory:` is its own
    /// database, so more than one would see different tables.
    pub async fn open_in_memory() -> Result<Self, MetadataError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self, MetadataError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS video_metadata (
                video_id    TEXT PRIMARY KEY,
                uploaded_at TEXT NOT NULL,
                status      TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }
}

fn record_from_row(row: &SqliteRow) -> Result<VideoRecord, MetadataError> {
    let status: String = row.try_get("status")?;
    Ok(VideoRecord {
        id: row.try_get("video_id")?,
        uploaded_at: row.try_get("uploaded_at")?,
        status: VideoStatus::from_str(&status).map_err(|e| MetadataError::Backend(e.into()))?,
    })
}

#[async_trait]
impl MetadataStore for SqliteMetadata {
    async fn create_with_status(
        &self,
        id: &str,
        uploaded_at: DateTime<Utc>,
        status: VideoStatus,
    ) -> Result<(), MetadataError> {
        let result = sqlx::query(
            "INSERT INTO video_metadata (video_id, uploaded_at, status) VALUES (?, ?, ?)",
        )
        .bind(id)
        .bind(uploaded_at)
        .bind(status.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(MetadataError::Conflict(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_status(&self, id: &str, status: VideoStatus) -> Result<(), MetadataError> {
        let result = sqlx::query("UPDATE video_metadata SET status = ? WHERE video_id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn read(&self, id: &str) -> Result<Option<VideoRecord>, MetadataError> {
        let row = sqlx::query(
            "SELECT video_id, uploaded_at, status FROM video_metadata WHERE video_id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<VideoRecord>, MetadataError> {
        let rows = sqlx::query(
            "SELECT video_id, uploaded_at, status FROM video_metadata ORDER BY uploaded_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn delete(&self, id: &str) -> Result<(), MetadataError> {
        let result = sqlx::query("DELETE FROM video_metadata WHERE video_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn create_read_round_trips() {
        let store = SqliteMetadata::open_in_memory().await.unwrap();
        store
            .create_with_status("demo", at(1_700_000_000), VideoStatus::Processing)
            .await
            .unwrap();

        let record = store.read("demo").await.unwrap().unwrap();
        assert_eq!(record.id, "demo");
        assert_eq!(record.uploaded_at, at(1_700_000_000));
        assert_eq!(record.status, VideoStatus::Processing);
    }

    #[tokio::test]
    async fn create_on_existing_id_is_conflict() {
        let store = SqliteMetadata::open_in_memory().await.unwrap();
        store.create("demo", at(1)).await.unwrap();

        let err = store
            .create_with_status("demo", at(2), VideoStatus::Processing)
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::Conflict(id) if id == "demo"));
    }

    #[tokio::test]
    async fn read_of_absent_id_is_none() {
        let store = SqliteMetadata::open_in_memory().await.unwrap();
        assert!(store.read("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_status_is_idempotent() {
        let store = SqliteMetadata::open_in_memory().await.unwrap();
        store
            .create_with_status("demo", at(1), VideoStatus::Processing)
            .await
            .unwrap();

        store
            .update_status("demo", VideoStatus::Ready)
            .await
            .unwrap();
        store
            .update_status("demo", VideoStatus::Ready)
            .await
            .unwrap();
        let record = store.read("demo").await.unwrap().unwrap();
        assert_eq!(record.status, VideoStatus::Ready);
    }

    #[tokio::test]
    async fn update_status_of_absent_id_is_not_found() {
        let store = SqliteMetadata::open_in_memory().await.unwrap();
        let err = store
            .update_status("nope", VideoStatus::Ready)
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = SqliteMetadata::open_in_memory().await.unwrap();
        store.create("older", at(100)).await.unwrap();
        store.create("newer", at(200)).await.unwrap();

        let ids: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["newer", "older"]);
    }

    #[tokio::test]
    async fn delete_removes_and_reports_absence() {
        let store = SqliteMetadata::open_in_memory().await.unwrap();
        store.create("demo", at(1)).await.unwrap();

        store.delete("demo").await.unwrap();
        assert!(store.read("demo").await.unwrap().is_none());
        let err = store.delete("demo").await.unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)));
    }
}
