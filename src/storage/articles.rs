use anyhow::Result;
use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{ArticleDbRow, ArticleRecord, LikeState, NewArticle};

// ============================================================================
// Query Limit Constants
// ============================================================================

/// Maximum number of ids bound into a single `IN (...)` clause.
///
/// Keeps us well under SQLite's 999 parameter limit.
const ID_CHUNK_SIZE: usize = 200;

/// Shared projection for article rows. Tag and liker ids are aggregated with
/// correlated subqueries so one article is always one row.
const ARTICLE_SELECT: &str = r#"
    SELECT a.id, a.name, a.parent_id, a.active, a.views_count,
           a.create_date, a.write_date,
           a.create_uid, cu.name AS create_name,
           a.write_uid, wu.name AS write_name,
           (SELECT GROUP_CONCAT(tag_id) FROM article_tags WHERE article_id = a.id) AS tag_ids,
           (SELECT GROUP_CONCAT(user_id) FROM article_likes WHERE article_id = a.id) AS liked_by_ids
    FROM articles a
    LEFT JOIN users cu ON cu.id = a.create_uid
    LEFT JOIN users wu ON wu.id = a.write_uid
"#;

impl Database {
    // ========================================================================
    // Article Queries
    // ========================================================================

    /// Every published article, archived ones included, ordered by name.
    ///
    /// Callers decide what to hide; the archive flag is carried on each record.
    pub async fn published_articles(&self) -> Result<Vec<ArticleRecord>> {
        let sql = format!(
            "{ARTICLE_SELECT} WHERE a.is_published = 1 ORDER BY a.name COLLATE NOCASE, a.id"
        );
        let rows = sqlx::query_as::<_, ArticleDbRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(count = rows.len(), "Loaded published articles");
        Ok(rows.into_iter().map(ArticleDbRow::into_record).collect())
    }

    /// Get a single article by its ID.
    pub async fn article(&self, article_id: i64) -> Result<Option<ArticleRecord>> {
        let sql = format!("{ARTICLE_SELECT} WHERE a.id = ?");
        let row = sqlx::query_as::<_, ArticleDbRow>(&sql)
            .bind(article_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(ArticleDbRow::into_record))
    }

    /// Creator of an article, read fresh for permission checks.
    ///
    /// Returns `None` when the article does not exist or has no recorded creator.
    pub async fn article_owner(&self, article_id: i64) -> Result<Option<i64>> {
        let row: Option<(Option<i64>,)> =
            sqlx::query_as("SELECT create_uid FROM articles WHERE id = ?")
                .bind(article_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.and_then(|(uid,)| uid))
    }

    // ========================================================================
    // Content
    // ========================================================================

    /// Markup body of one article, `None` if the article does not exist.
    pub async fn article_content(&self, article_id: i64) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT content FROM articles WHERE id = ?")
            .bind(article_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(content,)| content))
    }

    /// Markup bodies for a batch of articles.
    ///
    /// Ids that do not exist are silently absent from the result.
    pub async fn article_contents(&self, article_ids: &[i64]) -> Result<Vec<(i64, String)>> {
        let mut out = Vec::with_capacity(article_ids.len());
        for chunk in article_ids.chunks(ID_CHUNK_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new("SELECT id, content FROM articles WHERE id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            let rows: Vec<(i64, String)> = builder.build_query_as().fetch_all(&self.pool).await?;
            out.extend(rows);
        }
        Ok(out)
    }

    // ========================================================================
    // Article Mutations
    // ========================================================================

    /// Insert a new published, active article and return its id.
    pub async fn create_article(&self, user_id: i64, article: &NewArticle) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO articles (name, parent_id, content, create_date, write_date, create_uid, write_uid)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(&article.name)
        .bind(article.parent_id)
        .bind(&article.content)
        .bind(now)
        .bind(now)
        .bind(user_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        for tag_id in &article.tag_ids {
            sqlx::query("INSERT OR IGNORE INTO article_tags (article_id, tag_id) VALUES (?, ?)")
                .bind(id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::info!(article_id = id, parent_id = ?article.parent_id, "Created article");
        Ok(id)
    }

    /// Duplicate an article under a new name, keeping parent, tags and body.
    ///
    /// Returns the new article's id, or `None` if the source does not exist.
    pub async fn copy_article(
        &self,
        article_id: i64,
        user_id: i64,
        name: &str,
    ) -> Result<Option<i64>> {
        let source: Option<(Option<i64>, String)> =
            sqlx::query_as("SELECT parent_id, content FROM articles WHERE id = ?")
                .bind(article_id)
                .fetch_optional(&self.pool)
                .await?;
        let Some((parent_id, content)) = source else {
            return Ok(None);
        };
        let tag_ids: Vec<(i64,)> =
            sqlx::query_as("SELECT tag_id FROM article_tags WHERE article_id = ? ORDER BY tag_id")
                .bind(article_id)
                .fetch_all(&self.pool)
                .await?;

        let new_article = NewArticle {
            name: name.to_string(),
            parent_id,
            content,
            tag_ids: tag_ids.into_iter().map(|(id,)| id).collect(),
        };
        self.create_article(user_id, &new_article).await.map(Some)
    }

    /// Rename an article, returns whether a row was changed.
    pub async fn rename_article(&self, article_id: i64, user_id: i64, name: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE articles SET name = ?, write_date = ?, write_uid = ? WHERE id = ?",
        )
        .bind(name)
        .bind(chrono::Utc::now().timestamp())
        .bind(user_id)
        .bind(article_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Re-parent an article. `None` moves it to the top level.
    pub async fn move_article(
        &self,
        article_id: i64,
        user_id: i64,
        parent_id: Option<i64>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE articles SET parent_id = ?, write_date = ?, write_uid = ? WHERE id = ?",
        )
        .bind(parent_id)
        .bind(chrono::Utc::now().timestamp())
        .bind(user_id)
        .bind(article_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace the tag set of an article.
    pub async fn set_article_tags(
        &self,
        article_id: i64,
        user_id: i64,
        tag_ids: &[i64],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM article_tags WHERE article_id = ?")
            .bind(article_id)
            .execute(&mut *tx)
            .await?;

        if !tag_ids.is_empty() {
            let mut builder: QueryBuilder<sqlx::Sqlite> =
                QueryBuilder::new("INSERT OR IGNORE INTO article_tags (article_id, tag_id) ");
            builder.push_values(tag_ids, |mut b, tag_id| {
                b.push_bind(article_id).push_bind(*tag_id);
            });
            builder.build().execute(&mut *tx).await?;
        }

        sqlx::query("UPDATE articles SET write_date = ?, write_uid = ? WHERE id = ?")
            .bind(chrono::Utc::now().timestamp())
            .bind(user_id)
            .bind(article_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Archive (`active = false`) or restore an article.
    pub async fn set_article_active(
        &self,
        article_id: i64,
        user_id: i64,
        active: bool,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE articles SET active = ?, write_date = ?, write_uid = ? WHERE id = ?",
        )
        .bind(active)
        .bind(chrono::Utc::now().timestamp())
        .bind(user_id)
        .bind(article_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Engagement
    // ========================================================================

    /// Record one view and return the new view count.
    ///
    /// Does not touch `write_date`: viewing is not an edit.
    pub async fn increment_view(&self, article_id: i64, user_id: i64) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let (count,): (i64,) = sqlx::query_as(
            "UPDATE articles SET views_count = views_count + 1 WHERE id = ? RETURNING views_count",
        )
        .bind(article_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO view_log (article_id, user_id, viewed_at) VALUES (?, ?, ?)")
            .bind(article_id)
            .bind(user_id)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(count)
    }

    /// Toggle the user's like on an article and return the resulting like state.
    pub async fn toggle_like(&self, article_id: i64, user_id: i64) -> Result<LikeState> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM article_likes WHERE article_id = ? AND user_id = ?")
            .bind(article_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            sqlx::query("INSERT INTO article_likes (article_id, user_id) VALUES (?, ?)")
                .bind(article_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT user_id FROM article_likes WHERE article_id = ? ORDER BY user_id",
        )
        .bind(article_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let liked_by_ids: Vec<i64> = rows.into_iter().map(|(id,)| id).collect();
        Ok(LikeState {
            like_count: liked_by_ids.len() as i64,
            liked_by_ids,
        })
    }
}
