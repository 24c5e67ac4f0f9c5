use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::Database;

impl Database {
    /// Read the blob stored under `key`, if any.
    pub async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| "failed to read kv slot")
        })
        .await
    }

    /// Write `value` under `key`, replacing any previous blob.
    pub async fn set_value(&self, key: &str, value: String) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO kv (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .with_context(|| "failed to write kv slot")?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_database(dir: &TempDir) -> Database {
        Database::new(dir.path().join("test.sqlite3")).unwrap()
    }

    #[tokio::test]
    async fn missing_key_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let db = open_database(&dir);

        assert_eq!(db.get_value("subscriptions").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get_returns_latest_value() {
        let dir = TempDir::new().unwrap();
        let db = open_database(&dir);

        db.set_value("subscriptions", "[]".into()).await.unwrap();
        db.set_value("subscriptions", r#"[{"id":"a"}]"#.into())
            .await
            .unwrap();

        assert_eq!(
            db.get_value("subscriptions").await.unwrap().as_deref(),
            Some(r#"[{"id":"a"}]"#)
        );
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let db = open_database(&dir);
            db.set_value("subscriptions", "[1,2,3]".into())
                .await
                .unwrap();
        }

        let db = open_database(&dir);
        assert_eq!(
            db.get_value("subscriptions").await.unwrap().as_deref(),
            Some("[1,2,3]")
        );
    }
}
