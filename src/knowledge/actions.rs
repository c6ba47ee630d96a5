//! User-initiated writes: validation and permission checks first, then one
//! call to the record service.
//!
//! Every function here is run from a spawned task; results are applied to the
//! [`ArticleStore`] on the UI task.

use super::comments::validate_body;
use super::store::ArticleStore;
use super::{Article, KnowledgeError};
use crate::storage::{ArticleRecord, Database, Message, NewArticle};

/// Trimmed title, rejecting blank input before any write.
pub fn validate_title(raw: &str) -> Result<String, KnowledgeError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(KnowledgeError::EmptyTitle);
    }
    Ok(title.to_string())
}

/// Prefilled name for the copy dialog.
pub fn copy_name(name: &str) -> String {
    format!("{name} (copy)")
}

async fn fetch_record(db: &Database, id: i64) -> Result<ArticleRecord, KnowledgeError> {
    db.article(id).await?.ok_or(KnowledgeError::NotFound(id))
}

/// Create an empty article, as a child of `parent_id` when given.
pub async fn create_article(
    db: &Database,
    user_id: i64,
    raw_title: &str,
    parent_id: Option<i64>,
) -> Result<ArticleRecord, KnowledgeError> {
    let name = validate_title(raw_title)?;
    let id = db
        .create_article(
            user_id,
            &NewArticle {
                name,
                parent_id,
                ..Default::default()
            },
        )
        .await?;
    fetch_record(db, id).await
}

/// Rename an article. Returns `None` when the title is unchanged, so no
/// write happens.
pub async fn rename_article(
    db: &Database,
    user_id: i64,
    article_id: i64,
    current_name: &str,
    raw_title: &str,
) -> Result<Option<String>, KnowledgeError> {
    let name = validate_title(raw_title)?;
    if name == current_name {
        return Ok(None);
    }
    if !db.rename_article(article_id, user_id, &name).await? {
        return Err(KnowledgeError::NotFound(article_id));
    }
    Ok(Some(name))
}

/// Duplicate an article under a new title.
pub async fn copy_article(
    db: &Database,
    user_id: i64,
    article_id: i64,
    raw_title: &str,
) -> Result<ArticleRecord, KnowledgeError> {
    let name = validate_title(raw_title)?;
    let id = db
        .copy_article(article_id, user_id, &name)
        .await?
        .ok_or(KnowledgeError::NotFound(article_id))?;
    fetch_record(db, id).await
}

/// Candidate parents for a move: everything except the article itself and
/// its descendants, archived articles excluded, by name.
pub fn move_targets(store: &ArticleStore, article_id: i64) -> Vec<&Article> {
    let excluded = store.descendants(article_id);
    let mut targets: Vec<&Article> = store
        .articles()
        .iter()
        .filter(|a| a.active && !excluded.contains(&a.id))
        .collect();
    targets.sort_by_key(|a| a.name.to_lowercase());
    targets
}

/// Reject a move under the article itself or one of its descendants.
pub fn validate_move(
    store: &ArticleStore,
    article_id: i64,
    parent_id: Option<i64>,
) -> Result<(), KnowledgeError> {
    match parent_id {
        Some(target) if store.descendants(article_id).contains(&target) => {
            Err(KnowledgeError::InvalidMove)
        }
        _ => Ok(()),
    }
}

/// Re-parent an article. `None` moves it to the top level. Run
/// [`validate_move`] first; the record service does not check for cycles.
pub async fn move_article(
    db: &Database,
    user_id: i64,
    article_id: i64,
    parent_id: Option<i64>,
) -> Result<(), KnowledgeError> {
    if !db.move_article(article_id, user_id, parent_id).await? {
        return Err(KnowledgeError::NotFound(article_id));
    }
    Ok(())
}

pub async fn set_tags(
    db: &Database,
    user_id: i64,
    article_id: i64,
    tag_ids: &[i64],
) -> Result<(), KnowledgeError> {
    db.set_article_tags(article_id, user_id, tag_ids).await?;
    Ok(())
}

/// Owner-or-admin check for archive and restore, read fresh from the
/// record service.
pub async fn check_archive_permission(
    db: &Database,
    user_id: i64,
    article_id: i64,
) -> Result<(), KnowledgeError> {
    if db.article(article_id).await?.is_none() {
        return Err(KnowledgeError::NotFound(article_id));
    }
    let owner = db.article_owner(article_id).await?;
    let is_admin = db.user(user_id).await?.is_some_and(|u| u.is_admin);
    if owner == Some(user_id) || is_admin {
        Ok(())
    } else {
        tracing::warn!(article_id, user_id, ?owner, "Archive permission denied");
        Err(KnowledgeError::NotPermitted)
    }
}

/// Archive (`active = false`) or restore an article. The permission check
/// runs again right before the write.
pub async fn set_archived(
    db: &Database,
    user_id: i64,
    article_id: i64,
    archived: bool,
) -> Result<(), KnowledgeError> {
    check_archive_permission(db, user_id, article_id).await?;
    if !db.set_article_active(article_id, user_id, !archived).await? {
        return Err(KnowledgeError::NotFound(article_id));
    }
    tracing::info!(article_id, archived, "Archive state changed");
    Ok(())
}

/// Post a top-level comment or a reply.
pub async fn post_comment(
    db: &Database,
    user_id: i64,
    article_id: i64,
    parent_id: Option<i64>,
    raw_body: &str,
) -> Result<Message, KnowledgeError> {
    let body = validate_body(raw_body)?;
    Ok(db.post_message(article_id, user_id, parent_id, &body).await?)
}
