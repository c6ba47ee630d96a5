use anyhow::Result;

use super::schema::Database;
use super::types::Message;

impl Database {
    // ========================================================================
    // Comments
    // ========================================================================

    /// Comments on an article in chronological order.
    ///
    /// A reply whose parent is missing or belongs to another article comes
    /// back with `parent_id = None`.
    pub async fn article_messages(&self, article_id: i64) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT m.id,
                   CASE WHEN p.id IS NOT NULL THEN m.parent_id END AS parent_id,
                   COALESCE(u.name, '') AS author,
                   m.body,
                   m.date
            FROM messages m
            LEFT JOIN messages p ON p.id = m.parent_id AND p.article_id = m.article_id
            LEFT JOIN users u ON u.id = m.author_id
            WHERE m.article_id = ?
            ORDER BY m.date, m.id
        "#,
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    /// Post a comment (top-level or reply) and return it as stored.
    pub async fn post_message(
        &self,
        article_id: i64,
        author_id: i64,
        parent_id: Option<i64>,
        body: &str,
    ) -> Result<Message> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO messages (article_id, parent_id, author_id, body, date)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
        "#,
        )
        .bind(article_id)
        .bind(parent_id)
        .bind(author_id)
        .bind(body)
        .bind(chrono::Utc::now().timestamp())
        .fetch_one(&self.pool)
        .await?;

        let messages = self.article_messages(article_id).await?;
        messages
            .into_iter()
            .find(|m| m.id == id)
            .ok_or_else(|| anyhow::anyhow!("posted message {id} not found"))
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, NewArticle};
    use pretty_assertions::assert_eq;

    async fn seeded() -> (Database, i64, i64) {
        let db = Database::open(":memory:").await.unwrap();
        sqlx::query("INSERT INTO users (id, name) VALUES (1, 'Ada')")
            .execute(&db.pool)
            .await
            .unwrap();
        let a = db
            .create_article(1, &NewArticle { name: "A".into(), ..Default::default() })
            .await
            .unwrap();
        let b = db
            .create_article(1, &NewArticle { name: "B".into(), ..Default::default() })
            .await
            .unwrap();
        (db, a, b)
    }

    #[tokio::test]
    async fn test_post_and_list_messages() {
        let (db, a, _) = seeded().await;
        let top = db.post_message(a, 1, None, "First").await.unwrap();
        assert_eq!(top.author, "Ada");
        assert_eq!(top.parent_id, None);

        let reply = db.post_message(a, 1, Some(top.id), "Reply").await.unwrap();
        assert_eq!(reply.parent_id, Some(top.id));

        let bodies: Vec<String> = db
            .article_messages(a)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.body)
            .collect();
        assert_eq!(bodies, vec!["First", "Reply"]);
    }

    #[tokio::test]
    async fn test_cross_article_parent_is_dropped() {
        let (db, a, b) = seeded().await;
        let on_b = db.post_message(b, 1, None, "On B").await.unwrap();
        let stray = db.post_message(a, 1, Some(on_b.id), "Stray").await.unwrap();
        assert_eq!(stray.parent_id, None);
    }

    #[tokio::test]
    async fn test_unknown_author_has_empty_name() {
        let (db, a, _) = seeded().await;
        let msg = db.post_message(a, 99, None, "Ghost").await.unwrap();
        assert_eq!(msg.author, "");
    }
}
