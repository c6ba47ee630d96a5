use anyhow::Result;

use super::schema::Database;

impl Database {
    // ========================================================================
    // UI Preference Table
    // ========================================================================

    /// Every stored `(key, value)` pair, ordered by key.
    ///
    /// The UI reads the whole table once at startup; unknown keys are left
    /// for the caller to ignore.
    pub async fn preferences(&self) -> Result<Vec<(String, String)>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM user_preferences ORDER BY key")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    /// Upsert a group of pairs in one transaction.
    ///
    /// Either every pair lands or none does.
    pub async fn set_preferences(&self, pairs: &[(String, String)]) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for (key, value) in pairs {
            sqlx::query(
                r#"
                INSERT INTO user_preferences (key, value, updated_at)
                VALUES (?, ?, datetime('now'))
                ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;
    use pretty_assertions::assert_eq;

    fn pair(key: &str, value: &str) -> (String, String) {
        (key.to_string(), value.to_string())
    }

    #[tokio::test]
    async fn test_empty_table() {
        let db = Database::open(":memory:").await.unwrap();
        assert!(db.preferences().await.unwrap().is_empty());
        db.set_preferences(&[]).await.unwrap();
        assert!(db.preferences().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_preferences_upserts_in_key_order() {
        let db = Database::open(":memory:").await.unwrap();
        db.set_preferences(&[pair("sidebar.width", "280"), pair("filter.sort_order", "name")])
            .await
            .unwrap();
        db.set_preferences(&[pair("filter.sort_order", "likes_desc")])
            .await
            .unwrap();

        assert_eq!(
            db.preferences().await.unwrap(),
            vec![
                pair("filter.sort_order", "likes_desc"),
                pair("sidebar.width", "280"),
            ]
        );
    }

    #[tokio::test]
    async fn test_later_write_of_same_key_wins() {
        let db = Database::open(":memory:").await.unwrap();
        db.set_preferences(&[pair("sidebar.width", "300"), pair("sidebar.width", "320")])
            .await
            .unwrap();
        assert_eq!(db.preferences().await.unwrap(), vec![pair("sidebar.width", "320")]);
    }
}
