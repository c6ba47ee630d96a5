//! Application event handling.
//!
//! This module applies background task results: content loads, text
//! extraction, search prefetch batches, view counts and write outcomes.

use crate::app::{App, AppEvent, ReaderState};
use crate::knowledge::KnowledgeError;
use crate::util::strip_control_chars;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::helpers::{
    after_selection, run_search, show_content_error, spawn_text_extraction, spawn_view_increment,
};

/// Handle application events from background tasks.
pub(super) async fn handle_app_event(
    app: &mut App,
    event: AppEvent,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    match event {
        AppEvent::ContentLoaded {
            article_id,
            generation,
            result,
        } => match result {
            Ok(html) => {
                // Cache and extract regardless of staleness so the body stays
                // searchable; only the reader update checks the generation
                let entry = app.store.cache_html(article_id, &html);
                if !app.selection.is_current(generation) {
                    tracing::debug!(article_id, generation, "Stale content load, caching only");
                }
                spawn_text_extraction(article_id, generation, entry.html, event_tx);
            }
            Err(error) => {
                tracing::warn!(article_id, error = %error, "Content load failed");
                if app.selection.is_current(generation) {
                    show_content_error(app, article_id, error);
                }
            }
        },
        AppEvent::TextExtracted {
            article_id,
            generation,
            search_text,
            display_text,
        } => {
            app.store.complete_text(article_id, search_text);
            if app.selection.is_current(generation) {
                let lines: Vec<String> = display_text
                    .lines()
                    .map(|l| strip_control_chars(l).into_owned())
                    .collect();
                app.reader = ReaderState::Loaded {
                    article_id,
                    lines: Arc::from(lines),
                };
            }
            // Body text became searchable
            if app.filter.search_in_content && !app.filter.search_query.trim().is_empty() {
                app.rebuild_tree();
            }
        }
        AppEvent::ContentPrefetched {
            search_generation,
            result,
        } => {
            if search_generation != app.search_generation {
                tracing::debug!(search_generation, "Discarding stale prefetch batch");
                return;
            }
            app.prefetch_in_flight = false;
            app.prefetch_handle = None;
            match result {
                Ok(entries) => {
                    let added = app.store.insert_extracted(entries);
                    tracing::debug!(added, "Search bodies cached");
                    run_search(app, event_tx);
                }
                Err(error) => {
                    // Search with what is cached; no retry
                    tracing::warn!(error = %error, "Content batch read failed");
                    app.set_status("Could not load all article bodies for search");
                    if let Some(outcome) = app.refilter() {
                        after_selection(app, &outcome, event_tx);
                    }
                }
            }
        }
        AppEvent::CommentsLoaded {
            article_id,
            generation,
            result,
        } => {
            if !app.selection.is_current(generation) {
                return;
            }
            match result {
                Ok(messages) => app.set_comments(messages),
                Err(error) => {
                    tracing::warn!(article_id, error = %error, "Failed to load comments");
                    app.set_status("Failed to load comments");
                }
            }
        }
        AppEvent::ViewSettled {
            article_id,
            generation,
        } => {
            if app.selection.is_current(generation) {
                spawn_view_increment(app, article_id, event_tx);
            } else {
                tracing::debug!(article_id, "Selection moved on before the view settled");
            }
        }
        AppEvent::ViewRecorded { article_id, result } => match result {
            Ok(count) => app.store.set_view_count(article_id, count),
            Err(error) => {
                tracing::warn!(article_id, error = %error, "Failed to record view");
                app.set_status("Could not record article view");
            }
        },
        AppEvent::ActionCompleted(outcome) => {
            if let Some(changed) = app.apply_outcome(outcome) {
                after_selection(app, &changed, event_tx);
            }
        }
        AppEvent::ActionFailed { action, error } => {
            match &error {
                KnowledgeError::Storage(e) => {
                    tracing::warn!(action, error = %e, "Action failed");
                }
                other => {
                    tracing::debug!(action, error = %other, "Action rejected");
                }
            }
            app.set_status(error.to_string());
        }
        AppEvent::TaskPanicked { task, error } => {
            tracing::error!(task, error, "Background task panicked");
            app.set_status(format!("Internal error in {} task", task));
        }
    }
}
