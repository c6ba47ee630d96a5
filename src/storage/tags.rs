use anyhow::Result;

use super::schema::Database;
use super::types::{Tag, User};

impl Database {
    // ========================================================================
    // Tag Catalog
    // ========================================================================

    /// The full tag catalog, ordered by name.
    pub async fn tags(&self) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags ORDER BY name COLLATE NOCASE")
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// Look up a user, `None` if unknown.
    pub async fn user(&self, user_id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT id, name, is_admin FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, Tag};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_tags_sorted_by_name() {
        let db = test_db().await;
        for (id, name) in [(1, "zeta"), (2, "Alpha"), (3, "beta")] {
            sqlx::query("INSERT INTO tags (id, name) VALUES (?, ?)")
                .bind(id)
                .bind(name)
                .execute(&db.pool)
                .await
                .unwrap();
        }

        let tags = db.tags().await.unwrap();
        assert_eq!(
            tags,
            vec![
                Tag { id: 2, name: "Alpha".into() },
                Tag { id: 3, name: "beta".into() },
                Tag { id: 1, name: "zeta".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_user_lookup() {
        let db = test_db().await;
        sqlx::query("INSERT INTO users (id, name, is_admin) VALUES (1, 'Ada', 1), (2, 'Bob', 0)")
            .execute(&db.pool)
            .await
            .unwrap();

        let ada = db.user(1).await.unwrap().unwrap();
        assert!(ada.is_admin);
        let bob = db.user(2).await.unwrap().unwrap();
        assert_eq!(bob.name, "Bob");
        assert!(!bob.is_admin);
        assert!(db.user(3).await.unwrap().is_none());
    }
}
