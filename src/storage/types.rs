use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of kbrowse appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) all surface as
/// one of these messages.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("database is locked")
        || lower.contains("database table is locked")
        || lower.contains("sqlite_busy")
        || lower.contains("sqlite_locked")
        || lower.contains("unable to open database file")
}

// ============================================================================
// Helper Types
// ============================================================================

/// Row type for the published-article query.
///
/// Tag ids and liker ids arrive as comma-joined strings from GROUP_CONCAT.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArticleDbRow {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub active: bool,
    pub views_count: i64,
    pub create_date: Option<i64>,
    pub write_date: Option<i64>,
    pub create_uid: Option<i64>,
    pub create_name: Option<String>,
    pub write_uid: Option<i64>,
    pub write_name: Option<String>,
    pub tag_ids: Option<String>,
    pub liked_by_ids: Option<String>,
}

impl ArticleDbRow {
    pub(crate) fn into_record(self) -> ArticleRecord {
        let liked_by_ids = parse_id_list(self.liked_by_ids.as_deref());
        ArticleRecord {
            id: self.id,
            name: self.name,
            parent_id: self.parent_id,
            tag_ids: parse_id_list(self.tag_ids.as_deref()),
            active: self.active,
            view_count: self.views_count,
            like_count: liked_by_ids.len() as i64,
            liked_by_ids,
            created_at: self.create_date,
            created_by: user_ref(self.create_uid, self.create_name),
            modified_at: self.write_date,
            modified_by: user_ref(self.write_uid, self.write_name),
        }
    }
}

fn user_ref(id: Option<i64>, name: Option<String>) -> Option<UserRef> {
    id.map(|id| UserRef {
        id,
        name: name.unwrap_or_default(),
    })
}

/// Parse a GROUP_CONCAT id list ("3,1,2"), skipping anything non-numeric.
pub(crate) fn parse_id_list(raw: Option<&str>) -> Vec<i64> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let mut ids: Vec<i64> = raw
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

// ============================================================================
// Data Structures
// ============================================================================

/// A user reference as mirrored on article metadata (`create_uid`, `write_uid`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: i64,
    pub name: String,
}

/// A user of the knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub is_admin: bool,
}

/// Tag catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Article as returned by the record service, without derived fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRecord {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub tag_ids: Vec<i64>,
    pub active: bool,
    pub view_count: i64,
    pub like_count: i64,
    pub liked_by_ids: Vec<i64>,
    pub created_at: Option<i64>,
    pub created_by: Option<UserRef>,
    pub modified_at: Option<i64>,
    pub modified_by: Option<UserRef>,
}

/// Input for creating an article.
#[derive(Debug, Clone, Default)]
pub struct NewArticle {
    pub name: String,
    pub parent_id: Option<i64>,
    pub content: String,
    pub tag_ids: Vec<i64>,
}

/// Like state returned after toggling a like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeState {
    pub liked_by_ids: Vec<i64>,
    pub like_count: i64,
}

/// A comment posted on an article.
///
/// `parent_id` is only set when the parent is a comment on the same article.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub author: String,
    pub body: String,
    pub date: i64,
}

// ============================================================================
// Seed Import
// ============================================================================

/// JSON knowledge-base dump accepted by `--import`.
///
/// Every section is optional so partial dumps (e.g. only articles) load.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedFile {
    pub users: Vec<SeedUser>,
    pub tags: Vec<Tag>,
    pub articles: Vec<SeedArticle>,
    pub favorites: Vec<SeedFavorite>,
    pub comments: Vec<SeedComment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedArticle {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_true")]
    pub is_published: bool,
    #[serde(default)]
    pub views_count: i64,
    #[serde(default)]
    pub liked_by_ids: Vec<i64>,
    #[serde(default)]
    pub create_date: Option<i64>,
    #[serde(default)]
    pub write_date: Option<i64>,
    #[serde(default)]
    pub create_uid: Option<i64>,
    #[serde(default)]
    pub write_uid: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedFavorite {
    pub user_id: i64,
    pub article_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedComment {
    pub id: i64,
    pub article_id: i64,
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub author_id: i64,
    pub body: String,
    pub date: i64,
}

fn default_true() -> bool {
    true
}

/// Counts reported after a seed import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub users: usize,
    pub tags: usize,
    pub articles: usize,
    pub favorites: usize,
    pub comments: usize,
}
