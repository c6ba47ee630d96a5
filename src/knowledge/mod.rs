//! Client-held projection of the knowledge base.
//!
//! Data flows one way: the record service fills an [`ArticleStore`], the
//! filter pass derives the visible list, and the tree and selection views are
//! computed from that list. Nothing in here touches the terminal.

pub mod actions;
pub mod comments;
pub mod deep_link;
pub mod filter;
pub mod prefs;
pub mod selection;
pub mod sort;
pub mod store;
pub mod text;
pub mod tree;

use std::collections::HashSet;

use thiserror::Error;

use crate::storage::{ArticleRecord, UserRef};

pub use filter::FilterState;
pub use selection::{SelectionController, SelectionOutcome, Unavailable};
pub use sort::SortOrder;
pub use store::{ArticleStore, ContentEntry, CONTENT_BATCH_LIMIT};

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by knowledge-base actions.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Article {0} not found")]
    NotFound(i64),

    #[error("Title cannot be empty")]
    EmptyTitle,

    #[error("Comment cannot be empty")]
    EmptyComment,

    #[error("Only the owner or an administrator can archive or restore this article")]
    NotPermitted,

    #[error("An article cannot be moved under itself or its descendants")]
    InvalidMove,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

// ============================================================================
// Data Structures
// ============================================================================

/// Canonical article record as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: i64,
    pub name: String,
    /// Weak reference: may point at an article that is not loaded.
    pub parent_id: Option<i64>,
    pub tag_ids: Vec<i64>,
    /// Parallel to `tag_ids`; an unknown tag id yields an empty name.
    pub tag_names: Vec<String>,
    pub active: bool,
    pub created_at: Option<i64>,
    pub created_by: Option<UserRef>,
    pub modified_at: Option<i64>,
    pub modified_by: Option<UserRef>,
    pub view_count: i64,
    pub like_count: i64,
    pub liked_by_ids: Vec<i64>,
}

impl Article {
    pub(crate) fn from_record(record: ArticleRecord, tag_names: Vec<String>) -> Self {
        Self {
            id: record.id,
            name: record.name,
            parent_id: record.parent_id,
            tag_ids: record.tag_ids,
            tag_names,
            active: record.active,
            created_at: record.created_at,
            created_by: record.created_by,
            modified_at: record.modified_at,
            modified_by: record.modified_by,
            view_count: record.view_count,
            like_count: record.like_count,
            liked_by_ids: record.liked_by_ids,
        }
    }
}

/// UI-only state kept beside the articles instead of on them.
///
/// `expanded` is persisted; `tag_matches` is rebuilt on every filter pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub expanded: HashSet<i64>,
    pub tag_matches: HashSet<i64>,
}

/// Search term normalized the way every matcher expects it: trimmed and
/// lower-cased. Empty means "no text filter".
pub fn normalize_query(raw: &str) -> String {
    raw.trim().to_lowercase()
}
