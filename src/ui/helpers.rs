//! Background task spawning shared across the UI layer.
//!
//! Every task reports back through the `AppEvent` channel; all state changes
//! happen on the UI task when the event is handled.

use crate::app::{ActionOutcome, App, AppEvent, ReaderState};
use crate::knowledge::prefs::PrefKey;
use crate::knowledge::text::{html_to_text, search_text};
use crate::knowledge::{ArticleStore, KnowledgeError, SelectionOutcome};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Wraps a future to catch panics and convert them to errors.
///
/// Instead of the task silently disappearing, panics are converted to
/// `Err(String)` containing the panic message.
pub(super) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                format!("Unknown panic: {:?}", (*panic).type_id())
            }
        })
}

/// Spawn `future` with panic capture; its output is forwarded as one event.
fn spawn_reporting<F>(task: &'static str, tx: &mpsc::Sender<AppEvent>, future: F) -> tokio::task::JoinHandle<()>
where
    F: Future<Output = AppEvent> + Send + 'static,
{
    let tx = tx.clone();
    tokio::spawn(async move {
        let event = match catch_task_panic(future).await {
            Ok(event) => event,
            Err(panic_msg) => {
                tracing::error!(task, error = %panic_msg, "Background task panicked");
                AppEvent::TaskPanicked {
                    task,
                    error: panic_msg,
                }
            }
        };
        if let Err(e) = tx.send(event).await {
            tracing::warn!(task, error = %e, "Channel send failed (receiver dropped)");
        }
    })
}

// ============================================================================
// Selection Effects
// ============================================================================

/// Start the loads a selection change needs: body, comments and, for a first
/// view, the settle timer.
pub fn after_selection(
    app: &mut App,
    outcome: &SelectionOutcome,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    let SelectionOutcome::Selected {
        id,
        generation,
        record_view,
    } = *outcome
    else {
        if let Some(handle) = app.content_load_handle.take() {
            handle.abort();
        }
        return;
    };

    spawn_content_load(app, id, generation, event_tx);
    spawn_comments_load(app, id, generation, event_tx);
    if record_view {
        spawn_view_settle(app, id, generation, event_tx);
    }
    save_preferences(app, &[PrefKey::LastArticleId]);
}

/// Show the body of `article_id`, from cache when present.
///
/// A cached body skips the record service; only the display text is
/// extracted again.
pub(super) fn spawn_content_load(
    app: &mut App,
    article_id: i64,
    generation: u64,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    if let Some(handle) = app.content_load_handle.take() {
        handle.abort();
        tracing::debug!("Aborted previous content load task");
    }

    if let Some(entry) = app.store.content(article_id) {
        tracing::debug!(article_id, generation, "Content cache hit");
        spawn_text_extraction(article_id, generation, Arc::clone(&entry.html), event_tx);
        return;
    }

    let db = app.db.clone();
    app.content_load_handle = Some(spawn_reporting("content_load", event_tx, async move {
        let result = ArticleStore::fetch_content(&db, article_id)
            .await
            .map_err(|e| e.to_string());
        AppEvent::ContentLoaded {
            article_id,
            generation,
            result,
        }
    }));
}

/// Extract search and display text on the blocking pool.
pub(super) fn spawn_text_extraction(
    article_id: i64,
    generation: u64,
    html: Arc<str>,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    spawn_reporting("text_extraction", event_tx, async move {
        let extracted =
            tokio::task::spawn_blocking(move || (search_text(&html), html_to_text(&html))).await;
        match extracted {
            Ok((search_text, display_text)) => AppEvent::TextExtracted {
                article_id,
                generation,
                search_text,
                display_text,
            },
            Err(e) => AppEvent::TaskPanicked {
                task: "text_extraction",
                error: e.to_string(),
            },
        }
    });
}

fn spawn_comments_load(
    app: &App,
    article_id: i64,
    generation: u64,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    let db = app.db.clone();
    spawn_reporting("comments_load", event_tx, async move {
        AppEvent::CommentsLoaded {
            article_id,
            generation,
            result: db.article_messages(article_id).await.map_err(|e| e.to_string()),
        }
    });
}

fn spawn_view_settle(app: &App, article_id: i64, generation: u64, event_tx: &mpsc::Sender<AppEvent>) {
    let settle = app.config.view_settle();
    spawn_reporting("view_settle", event_tx, async move {
        tokio::time::sleep(settle).await;
        AppEvent::ViewSettled {
            article_id,
            generation,
        }
    });
}

/// Increment the view count. Best-effort: failures become a notice.
pub(super) fn spawn_view_increment(app: &App, article_id: i64, event_tx: &mpsc::Sender<AppEvent>) {
    let db = app.db.clone();
    let user_id = app.user_id();
    spawn_reporting("view_increment", event_tx, async move {
        AppEvent::ViewRecorded {
            article_id,
            result: db
                .increment_view(article_id, user_id)
                .await
                .map_err(|e| e.to_string()),
        }
    });
}

// ============================================================================
// Search
// ============================================================================

/// Run a filter pass for the current query, fetching missing bodies first
/// when searching in content.
///
/// With bodies missing, one batch is requested and the pass runs once it
/// arrives; the next batch, if any, is requested from there.
pub(super) fn run_search(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    let missing = app.pending_content_ids();
    if missing.is_empty() {
        if let Some(outcome) = app.refilter() {
            after_selection(app, &outcome, event_tx);
        }
        return;
    }
    if app.prefetch_in_flight {
        return;
    }

    if let Some(handle) = app.prefetch_handle.take() {
        handle.abort();
        tracing::debug!("Aborted previous prefetch task");
    }
    app.prefetch_in_flight = true;
    app.set_status("Searching article bodies...");

    let db = app.db.clone();
    let search_generation = app.search_generation;
    tracing::debug!(count = missing.len(), search_generation, "Fetching bodies for search");

    app.prefetch_handle = Some(spawn_reporting("prefetch", event_tx, async move {
        let result = ArticleStore::fetch_batch(&db, &missing)
            .await
            .map_err(|e| e.to_string());
        AppEvent::ContentPrefetched {
            search_generation,
            result,
        }
    }));
}

// ============================================================================
// Writes
// ============================================================================

/// Spawn a user-initiated write; the outcome is applied on the UI task.
pub(super) fn spawn_action<F>(action: &'static str, event_tx: &mpsc::Sender<AppEvent>, future: F)
where
    F: Future<Output = Result<ActionOutcome, KnowledgeError>> + Send + 'static,
{
    tracing::debug!(action, "Spawning action");
    spawn_reporting(action, event_tx, async move {
        match future.await {
            Ok(outcome) => AppEvent::ActionCompleted(outcome),
            Err(error) => AppEvent::ActionFailed { action, error },
        }
    });
}

/// Queue a write of `keys` with their current values.
///
/// Writes land in call order: each task waits for the one queued before it.
/// Failures are logged only.
pub(super) fn save_preferences(app: &mut App, keys: &'static [PrefKey]) {
    let pairs = app.prefs.pairs_for(keys);
    let db = app.db.clone();
    let previous = app.pref_write.take();
    app.pref_write = Some(tokio::spawn(async move {
        if let Some(previous) = previous {
            if let Err(e) = previous.await {
                tracing::warn!(error = %e, "Earlier preference write did not finish");
            }
        }
        if let Err(e) = db.set_preferences(&pairs).await {
            tracing::warn!(error = %e, ?keys, "Failed to save preferences");
        }
    }));
}

/// Wait for every queued preference write.
pub(super) async fn flush_preferences(app: &mut App) {
    if let Some(handle) = app.pref_write.take() {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Preference write did not finish");
        }
    }
}

/// Mark the reader as failed for the current article.
pub(super) fn show_content_error(app: &mut App, article_id: i64, error: String) {
    if matches!(app.reader, ReaderState::Loading { article_id: id } if id == article_id) {
        app.reader = ReaderState::Failed { article_id, error };
    }
}
