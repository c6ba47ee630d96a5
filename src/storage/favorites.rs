use anyhow::Result;

use super::schema::Database;

impl Database {
    // ========================================================================
    // Favorites
    // ========================================================================

    /// Ids of the articles the user follows.
    pub async fn favorite_article_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT article_id FROM favorites WHERE user_id = ? ORDER BY article_id")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Atomically toggle the favorite marker, returning the new value.
    pub async fn toggle_favorite(&self, article_id: i64, user_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM favorites WHERE article_id = ? AND user_id = ?")
            .bind(article_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            sqlx::query("INSERT INTO favorites (article_id, user_id) VALUES (?, ?)")
                .bind(article_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(removed == 0)
    }
}
