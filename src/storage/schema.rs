use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::{is_lock_message, DatabaseError};

// ============================================================================
// Database
// ============================================================================

/// Local record service: articles, tags, favorites, likes, comments, view
/// counts and the user preference table.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InstanceLocked` if another instance of kbrowse
    /// has the database locked (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN).
    /// Returns `DatabaseError::Other` for other database errors.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // Pre-create the file user-only so there is no window with umask permissions
        #[cfg(unix)]
        if path != ":memory:" {
            use std::os::unix::fs::OpenOptionsExt;
            let db_path = std::path::Path::new(path);
            if !db_path.exists() {
                if let Some(parent) = db_path.parent().filter(|p| p.exists()) {
                    tracing::debug!(dir = %parent.display(), "Creating database file");
                    // If creation fails, SQLite reports the error at connect_with.
                    let _file = std::fs::OpenOptions::new()
                        .write(true)
                        .create_new(true)
                        .mode(0o600)
                        .open(db_path)
                        .ok();
                }
            }
        }

        // busy_timeout=5000: wait up to 5 seconds for locks before SQLITE_BUSY.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000")
            .foreign_keys(true);

        // An in-memory database lives per connection, so tests need exactly one.
        let max_connections = if path == ":memory:" { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        let db = Self { pool };
        db.migrate().await.map_err(|e| {
            if is_lock_message(&e.to_string()) {
                DatabaseError::InstanceLocked
            } else {
                DatabaseError::Migration(e.to_string())
            }
        })?;
        Ok(db)
    }

    /// Close the pool. Further queries fail with `PoolClosed`.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All statements use `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                is_admin INTEGER NOT NULL DEFAULT 0
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // parent_id is a weak reference: no FK, a dangling parent is rendered as a root
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                parent_id INTEGER,
                content TEXT NOT NULL DEFAULT '',
                active INTEGER NOT NULL DEFAULT 1,
                is_published INTEGER NOT NULL DEFAULT 1,
                views_count INTEGER NOT NULL DEFAULT 0,
                create_date INTEGER,
                write_date INTEGER,
                create_uid INTEGER,
                write_uid INTEGER
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_parent ON articles(parent_id)")
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_articles_published ON articles(is_published, name)",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS article_tags (
                article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
                tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (article_id, tag_id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS article_likes (
                article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL,
                PRIMARY KEY (article_id, user_id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Favorites are per-user follow markers
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS favorites (
                article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL,
                PRIMARY KEY (article_id, user_id)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY,
                article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
                parent_id INTEGER,
                author_id INTEGER,
                body TEXT NOT NULL,
                date INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_article ON messages(article_id, date)",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS view_log (
                id INTEGER PRIMARY KEY,
                article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL,
                viewed_at INTEGER NOT NULL
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Keys use dotted convention: filter.sort_order, sidebar.width, etc.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_preferences (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory_runs_migrations() {
        let db = Database::open(":memory:").await.unwrap();
        let tables: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(&db.pool)
                .await
                .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        for expected in [
            "article_likes",
            "article_tags",
            "articles",
            "favorites",
            "messages",
            "tags",
            "user_preferences",
            "users",
            "view_log",
        ] {
            assert!(names.contains(&expected), "missing table {expected}");
        }
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_database_rejects_queries() {
        let db = Database::open(":memory:").await.unwrap();
        db.close().await;
        assert!(db.tags().await.is_err());
    }

    #[test]
    fn test_lock_message_detection() {
        assert!(is_lock_message("error returned from database: database is locked"));
        assert!(is_lock_message("SQLITE_BUSY"));
        assert!(!is_lock_message("no such table: articles"));
    }
}
