use anyhow::Result;
use sqlx::{migrate::MigrateDatabase, Row, Sqlite, SqlitePool};
use std::sync::Arc;

// The database URL for the production store
const DATABASE_URL: &str = "sqlite:frontdesk.db";

/// DbConnection manages the SQLite-backed key-value store. Every dashboard
/// collection is one JSON document stored under a well-known key.
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Create a new store connection
    pub async fn new(url: &str) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?
        }

        let pool = SqlitePool::connect(url).await?;

        Self::setup_schema(&pool).await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Initialize the standard store
    pub async fn init() -> Result<Self> {
        Self::new(DATABASE_URL).await
    }

    /// Initialize a test store with a unique in-memory database
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        let test_id = uuid::Uuid::new_v4().to_string();
        let db_url = format!("sqlite:file:memdb_{}?mode=memory&cache=shared", test_id);

        Self::new(&db_url).await
    }

    /// Set up the required schema
    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS key_values (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Store a key-value pair, overwriting any existing value for the key.
    pub async fn put_value(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO key_values (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    /// Store several key-value pairs in one transaction. Either every key is
    /// written or none are; used for multi-collection commits such as a staff
    /// rename cascading into the rota entries.
    pub async fn put_values(&self, pairs: &[(&str, String)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in pairs {
            sqlx::query("INSERT OR REPLACE INTO key_values (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Retrieve a value by its key
    pub async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM key_values WHERE key = ?")
            .bind(key)
            .fetch_optional(&*self.pool)
            .await?;

        match row {
            Some(r) => {
                let value: String = r.get("value");
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test() -> DbConnection {
        DbConnection::init_test().await.expect("Failed to create test store")
    }

    #[tokio::test]
    async fn test_put_and_get_value() {
        let db = setup_test().await;

        db.put_value("test_key", "test_value").await.expect("Failed to put value");

        let result = db.get_value("test_key").await.expect("Failed to get value");
        assert_eq!(result.as_deref(), Some("test_value"));
    }

    #[tokio::test]
    async fn test_get_nonexistent_value() {
        let db = setup_test().await;

        let result = db.get_value("nonexistent_key").await.expect("Query failed");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_put_replace_value() {
        let db = setup_test().await;

        db.put_value("same_key", "initial_value").await.expect("Failed to put initial value");
        db.put_value("same_key", "updated_value").await.expect("Failed to update value");

        let result = db.get_value("same_key").await.expect("Failed to get value");
        assert_eq!(result.as_deref(), Some("updated_value"));
    }

    #[tokio::test]
    async fn test_put_values_writes_all_keys() {
        let db = setup_test().await;

        db.put_values(&[
            ("first", "1".to_string()),
            ("second", "2".to_string()),
        ])
        .await
        .expect("Failed to put values");

        assert_eq!(db.get_value("first").await.unwrap().as_deref(), Some("1"));
        assert_eq!(db.get_value("second").await.unwrap().as_deref(), Some("2"));
    }
}
