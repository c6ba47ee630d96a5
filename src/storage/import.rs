use anyhow::Result;

use super::schema::Database;
use super::types::{ImportSummary, SeedFile};

impl Database {
    // ========================================================================
    // Seed Import
    // ========================================================================

    /// Load a knowledge-base dump in one transaction.
    ///
    /// Rows are upserted by id, so importing the same file twice is a no-op.
    /// Tag links, favorites and comments that point at unknown records are
    /// skipped rather than failing the whole import.
    pub async fn import_seed(&self, seed: &SeedFile) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        let mut tx = self.pool.begin().await?;

        for user in &seed.users {
            sqlx::query(
                r#"
                INSERT INTO users (id, name, is_admin) VALUES (?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET name = excluded.name, is_admin = excluded.is_admin
            "#,
            )
            .bind(user.id)
            .bind(&user.name)
            .bind(user.is_admin)
            .execute(&mut *tx)
            .await?;
            summary.users += 1;
        }

        for tag in &seed.tags {
            sqlx::query(
                "INSERT INTO tags (id, name) VALUES (?, ?) ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            )
            .bind(tag.id)
            .bind(&tag.name)
            .execute(&mut *tx)
            .await?;
            summary.tags += 1;
        }

        for article in &seed.articles {
            sqlx::query(
                r#"
                INSERT INTO articles (id, name, parent_id, content, active, is_published,
                                      views_count, create_date, write_date, create_uid, write_uid)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    parent_id = excluded.parent_id,
                    content = excluded.content,
                    active = excluded.active,
                    is_published = excluded.is_published,
                    views_count = excluded.views_count,
                    create_date = excluded.create_date,
                    write_date = excluded.write_date,
                    create_uid = excluded.create_uid,
                    write_uid = excluded.write_uid
            "#,
            )
            .bind(article.id)
            .bind(&article.name)
            .bind(article.parent_id)
            .bind(&article.content)
            .bind(article.active)
            .bind(article.is_published)
            .bind(article.views_count)
            .bind(article.create_date)
            .bind(article.write_date)
            .bind(article.create_uid)
            .bind(article.write_uid)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM article_tags WHERE article_id = ?")
                .bind(article.id)
                .execute(&mut *tx)
                .await?;
            for tag_id in &article.tag_ids {
                let linked = sqlx::query(
                    r#"
                    INSERT OR IGNORE INTO article_tags (article_id, tag_id)
                    SELECT ?, ? WHERE EXISTS (SELECT 1 FROM tags WHERE id = ?)
                "#,
                )
                .bind(article.id)
                .bind(tag_id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
                if linked == 0 {
                    tracing::warn!(article_id = article.id, tag_id, "Skipping unknown tag");
                }
            }

            sqlx::query("DELETE FROM article_likes WHERE article_id = ?")
                .bind(article.id)
                .execute(&mut *tx)
                .await?;
            for user_id in &article.liked_by_ids {
                sqlx::query("INSERT OR IGNORE INTO article_likes (article_id, user_id) VALUES (?, ?)")
                    .bind(article.id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
            }
            summary.articles += 1;
        }

        for favorite in &seed.favorites {
            let inserted = sqlx::query(
                r#"
                INSERT OR IGNORE INTO favorites (article_id, user_id)
                SELECT ?, ? WHERE EXISTS (SELECT 1 FROM articles WHERE id = ?)
            "#,
            )
            .bind(favorite.article_id)
            .bind(favorite.user_id)
            .bind(favorite.article_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            summary.favorites += inserted as usize;
        }

        for comment in &seed.comments {
            let inserted = sqlx::query(
                r#"
                INSERT INTO messages (id, article_id, parent_id, author_id, body, date)
                SELECT ?, ?, ?, ?, ?, ? WHERE EXISTS (SELECT 1 FROM articles WHERE id = ?)
                ON CONFLICT(id) DO UPDATE SET
                    article_id = excluded.article_id,
                    parent_id = excluded.parent_id,
                    author_id = excluded.author_id,
                    body = excluded.body,
                    date = excluded.date
            "#,
            )
            .bind(comment.id)
            .bind(comment.article_id)
            .bind(comment.parent_id)
            .bind(comment.author_id)
            .bind(&comment.body)
            .bind(comment.date)
            .bind(comment.article_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if inserted == 0 {
                tracing::warn!(
                    comment_id = comment.id,
                    article_id = comment.article_id,
                    "Skipping comment on unknown article"
                );
            }
            summary.comments += inserted as usize;
        }

        tx.commit().await?;
        tracing::info!(
            users = summary.users,
            tags = summary.tags,
            articles = summary.articles,
            favorites = summary.favorites,
            comments = summary.comments,
            "Seed import complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, SeedFile};
    use pretty_assertions::assert_eq;

    const SEED: &str = r#"{
        "users": [{"id": 1, "name": "Ada", "is_admin": true}, {"id": 2, "name": "Bob"}],
        "tags": [{"id": 10, "name": "rust"}],
        "articles": [
            {"id": 1, "name": "Root", "content": "<p>root</p>", "tag_ids": [10, 99], "create_uid": 2},
            {"id": 2, "name": "Child", "parent_id": 1, "liked_by_ids": [1, 2], "active": false}
        ],
        "favorites": [{"user_id": 1, "article_id": 2}, {"user_id": 1, "article_id": 404}],
        "comments": [
            {"id": 5, "article_id": 1, "author_id": 2, "body": "hello", "date": 100},
            {"id": 6, "article_id": 404, "author_id": 2, "body": "lost", "date": 101}
        ]
    }"#;

    #[tokio::test]
    async fn test_import_seed_counts_and_skips_dangling() {
        let db = Database::open(":memory:").await.unwrap();
        let seed: SeedFile = serde_json::from_str(SEED).unwrap();

        let summary = db.import_seed(&seed).await.unwrap();
        assert_eq!(summary.users, 2);
        assert_eq!(summary.tags, 1);
        assert_eq!(summary.articles, 2);
        assert_eq!(summary.favorites, 1);
        assert_eq!(summary.comments, 1);

        let root = db.article(1).await.unwrap().unwrap();
        assert_eq!(root.tag_ids, vec![10]);
        assert_eq!(root.created_by.map(|u| u.name), Some("Bob".to_string()));

        let child = db.article(2).await.unwrap().unwrap();
        assert!(!child.active);
        assert_eq!(child.like_count, 2);
        assert_eq!(db.favorite_article_ids(1).await.unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_import_seed_is_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        let seed: SeedFile = serde_json::from_str(SEED).unwrap();

        db.import_seed(&seed).await.unwrap();
        db.import_seed(&seed).await.unwrap();

        assert_eq!(db.published_articles().await.unwrap().len(), 2);
        assert_eq!(db.article_messages(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_partial_seed_loads() {
        let db = Database::open(":memory:").await.unwrap();
        let seed: SeedFile =
            serde_json::from_str(r#"{"articles": [{"id": 3, "name": "Solo"}]}"#).unwrap();
        let summary = db.import_seed(&seed).await.unwrap();
        assert_eq!(summary.articles, 1);
        assert_eq!(summary.users, 0);
    }
}
