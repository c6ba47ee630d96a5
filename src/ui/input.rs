//! Input handling for the TUI.
//!
//! This module processes keyboard input and dispatches to the appropriate
//! handler based on the open overlay, search mode and focused pane.

use crate::app::{ActionOutcome, App, AppEvent, Focus, Modal, SIDEBAR_STEP_PX};
use crate::knowledge::actions;
use crate::knowledge::comments::validate_body;
use crate::knowledge::prefs::PrefKey;
use crate::util::MAX_SEARCH_QUERY_LENGTH;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyModifiers};
use tokio::sync::mpsc;

use super::helpers::{after_selection, run_search, save_preferences, spawn_action};
use super::Action;

/// Lines scrolled by PageUp/PageDown in the reader.
const PAGE_LINES: usize = 10;

/// Main input dispatch function.
pub(super) async fn handle_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Result<Action> {
    if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
        return Ok(Action::Quit);
    }

    // Help overlay captures all keys when visible
    if app.show_help {
        return Ok(handle_help_input(app, code));
    }

    if let Some(modal) = app.modal.take() {
        handle_modal_input(app, modal, code, event_tx);
        return Ok(Action::Continue);
    }

    if app.search_mode {
        handle_search_input(app, code, event_tx);
        return Ok(Action::Continue);
    }

    match code {
        KeyCode::Char('q') => return Ok(Action::Quit),
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Tab => {
            app.focus = match app.focus {
                Focus::Tree => Focus::Reader,
                Focus::Reader if !app.prefs.sidebar_collapsed => Focus::Tree,
                Focus::Reader => Focus::Reader,
            };
        }
        _ => {
            let handled = match app.focus {
                Focus::Tree => handle_tree_input(app, code, event_tx),
                Focus::Reader => handle_reader_input(app, code, modifiers),
            };
            if !handled {
                handle_global_input(app, code, event_tx);
            }
        }
    }
    Ok(Action::Continue)
}

/// Handle input while the help overlay is visible.
fn handle_help_input(app: &mut App, code: KeyCode) -> Action {
    match code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?') => {
            app.show_help = false;
            app.help_scroll_offset = 0;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.help_scroll_offset = app.help_scroll_offset.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.help_scroll_offset = app.help_scroll_offset.saturating_sub(1);
        }
        _ => {}
    }
    Action::Continue
}

// ============================================================================
// Search
// ============================================================================

fn handle_search_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) {
    match code {
        KeyCode::Esc => {
            app.search_mode = false;
            app.search_input.clear();
            if app.apply_search_now() {
                run_search(app, event_tx);
            }
        }
        KeyCode::Enter => {
            app.search_mode = false;
            if app.apply_search_now() {
                run_search(app, event_tx);
            }
        }
        KeyCode::Backspace => {
            app.search_input.pop();
            app.search_changed();
        }
        KeyCode::Char(c) if !c.is_control() => {
            if app.search_input.len() + c.len_utf8() > MAX_SEARCH_QUERY_LENGTH {
                app.set_status(format!(
                    "Search query too long (max {} chars)",
                    MAX_SEARCH_QUERY_LENGTH
                ));
            } else {
                app.search_input.push(c);
                app.search_changed();
            }
        }
        _ => {}
    }
}

// ============================================================================
// Tree Pane
// ============================================================================

/// Returns false when the key is not a tree key.
fn handle_tree_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) -> bool {
    match code {
        KeyCode::Char('j') | KeyCode::Down => app.nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.nav_up(),
        KeyCode::Enter => {
            if let Some(id) = app.cursor {
                let outcome = app.select(Some(id));
                after_selection(app, &outcome, event_tx);
            }
        }
        KeyCode::Char('l') | KeyCode::Right => {
            if let Some(id) = app.cursor {
                if app.set_expanded(id, true) {
                    save_preferences(app, &[PrefKey::ExpandedNodes]);
                }
            }
        }
        KeyCode::Char('h') | KeyCode::Left => {
            let Some(id) = app.cursor else {
                return true;
            };
            if app.cursor_row_expanded() && app.set_expanded(id, false) {
                save_preferences(app, &[PrefKey::ExpandedNodes]);
            } else {
                app.cursor_to_parent();
            }
        }
        KeyCode::Char(' ') => {
            if let Some(id) = app.cursor {
                if app.toggle_expanded(id) {
                    save_preferences(app, &[PrefKey::ExpandedNodes]);
                }
            }
        }
        KeyCode::Char('E') => {
            app.expand_all();
            save_preferences(app, &[PrefKey::ExpandedNodes]);
        }
        KeyCode::Char('C') => {
            app.collapse_all();
            save_preferences(app, &[PrefKey::ExpandedNodes]);
        }
        _ => return false,
    }
    true
}

// ============================================================================
// Reader Pane
// ============================================================================

fn handle_reader_input(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> bool {
    match code {
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::PageDown => app.scroll_down(PAGE_LINES),
        KeyCode::PageUp => app.scroll_up(PAGE_LINES),
        KeyCode::Char('d') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down(PAGE_LINES)
        }
        KeyCode::Char('u') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up(PAGE_LINES)
        }
        KeyCode::Char('J') => app.comment_cursor_down(),
        KeyCode::Char('K') => app.comment_cursor_up(),
        KeyCode::Esc if app.comment_cursor.is_some() => app.comment_cursor = None,
        _ => return false,
    }
    true
}

// ============================================================================
// Filters and Article Commands
// ============================================================================

/// Keys available from either pane.
fn handle_global_input(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) {
    match code {
        KeyCode::Char('/') => {
            app.search_mode = true;
            app.search_input = app.filter.search_query.clone();
        }
        KeyCode::Char('f') => filter_changed(app, App::toggle_only_favorites, event_tx),
        KeyCode::Char('a') => filter_changed(app, App::toggle_show_archived, event_tx),
        KeyCode::Char('c') => filter_changed(app, App::toggle_search_in_content, event_tx),
        KeyCode::Char('s') => {
            filter_changed(app, App::cycle_sort, event_tx);
            app.set_status(format!("Sort: {}", app.filter.sort_order.label()));
        }
        KeyCode::Char('x') => {
            if app.filter.has_active_filters() {
                filter_changed(app, App::clear_filters, event_tx);
                app.set_status("All filters cleared.");
            } else {
                app.set_status("No filters active");
            }
        }
        KeyCode::Char('t') => {
            if app.store.tags().is_empty() {
                app.set_status("No tags defined");
            } else {
                app.modal = Some(Modal::TagFilter { cursor: 0 });
            }
        }
        KeyCode::Char('b') => {
            app.toggle_sidebar();
            save_preferences(app, &[PrefKey::SidebarCollapsed]);
        }
        KeyCode::Char('<') => {
            app.resize_sidebar(-SIDEBAR_STEP_PX);
            save_preferences(app, &[PrefKey::SidebarWidth]);
        }
        KeyCode::Char('>') => {
            app.resize_sidebar(SIDEBAR_STEP_PX);
            save_preferences(app, &[PrefKey::SidebarWidth]);
        }
        KeyCode::Char('N') => {
            app.modal = Some(Modal::NewArticle {
                parent_id: None,
                input: String::new(),
            });
        }
        _ => handle_article_command(app, code, event_tx),
    }
}

fn filter_changed(
    app: &mut App,
    mutate: fn(&mut App) -> &'static [PrefKey],
    event_tx: &mpsc::Sender<AppEvent>,
) {
    let keys = mutate(app);
    save_preferences(app, keys);
    run_search(app, event_tx);
}

/// Commands on the current article.
fn handle_article_command(app: &mut App, code: KeyCode, event_tx: &mpsc::Sender<AppEvent>) {
    let Some(article) = app.current_article() else {
        if matches!(
            code,
            KeyCode::Char('n' | 'r' | 'y' | 'm' | 'T' | 'A' | 'L' | 'F' | 'R')
        ) {
            app.set_status("No article selected");
        }
        return;
    };
    let article_id = article.id;
    let name = article.name.clone();
    let active = article.active;
    let tag_ids = article.tag_ids.clone();
    let db = app.db.clone();
    let user_id = app.user_id();

    match code {
        KeyCode::Char('n') => {
            app.modal = Some(Modal::NewArticle {
                parent_id: Some(article_id),
                input: String::new(),
            });
        }
        KeyCode::Char('r') => {
            app.modal = Some(Modal::Rename {
                article_id,
                input: name,
            });
        }
        KeyCode::Char('y') => {
            app.modal = Some(Modal::Copy {
                article_id,
                input: actions::copy_name(&name),
            });
        }
        KeyCode::Char('m') => {
            let mut targets = vec![(None, "(top level)".to_string())];
            targets.extend(
                actions::move_targets(&app.store, article_id)
                    .into_iter()
                    .map(|a| (Some(a.id), a.name.clone())),
            );
            app.modal = Some(Modal::Move {
                article_id,
                targets,
                cursor: 0,
            });
        }
        KeyCode::Char('T') => {
            if app.store.tags().is_empty() {
                app.set_status("No tags defined");
            } else {
                app.modal = Some(Modal::Tags {
                    article_id,
                    selected: tag_ids.into_iter().collect(),
                    cursor: 0,
                });
            }
        }
        KeyCode::Char('A') => {
            let archive = active;
            spawn_action("archive", event_tx, async move {
                actions::check_archive_permission(&db, user_id, article_id).await?;
                Ok(ActionOutcome::ArchivePermitted {
                    article_id,
                    archive,
                })
            });
        }
        KeyCode::Char('L') => {
            spawn_action("like", event_tx, async move {
                let likes = db.toggle_like(article_id, user_id).await?;
                Ok(ActionOutcome::LikeToggled { article_id, likes })
            });
        }
        KeyCode::Char('F') => {
            spawn_action("favorite", event_tx, async move {
                let favorite = db.toggle_favorite(article_id, user_id).await?;
                Ok(ActionOutcome::FavoriteToggled {
                    article_id,
                    favorite,
                })
            });
        }
        KeyCode::Char('R') => {
            let parent_id = match app.focus {
                Focus::Reader => app.highlighted_comment().map(|m| m.id),
                Focus::Tree => None,
            };
            app.modal = Some(Modal::Comment {
                article_id,
                parent_id,
                input: String::new(),
            });
        }
        _ => {}
    }
}

// ============================================================================
// Modal Dialogs
// ============================================================================

/// Handle a key for the open dialog. The dialog was taken out of `app` and
/// is put back unless the key closed it.
fn handle_modal_input(
    app: &mut App,
    mut modal: Modal,
    code: KeyCode,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    if code == KeyCode::Esc {
        return;
    }

    if let Some(input) = modal.input_mut() {
        match code {
            KeyCode::Char(c) if !c.is_control() => input.push(c),
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Enter => {
                if !submit_text_modal(app, &modal, event_tx) {
                    app.modal = Some(modal);
                }
                return;
            }
            _ => {}
        }
        app.modal = Some(modal);
        return;
    }

    let keep_open = match &mut modal {
        Modal::Move {
            article_id,
            targets,
            cursor,
        } => match code {
            KeyCode::Char('j') | KeyCode::Down => {
                *cursor = (*cursor + 1).min(targets.len().saturating_sub(1));
                true
            }
            KeyCode::Char('k') | KeyCode::Up => {
                *cursor = cursor.saturating_sub(1);
                true
            }
            KeyCode::Enter => {
                let parent_id = targets.get(*cursor).and_then(|(id, _)| *id);
                submit_move(app, *article_id, parent_id, event_tx)
            }
            _ => true,
        },
        Modal::Tags {
            article_id,
            selected,
            cursor,
        } => {
            let tags = app.store.tags();
            match code {
                KeyCode::Char('j') | KeyCode::Down => {
                    *cursor = (*cursor + 1).min(tags.len().saturating_sub(1));
                    true
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    *cursor = cursor.saturating_sub(1);
                    true
                }
                KeyCode::Char(' ') => {
                    if let Some(tag) = tags.get(*cursor) {
                        if !selected.remove(&tag.id) {
                            selected.insert(tag.id);
                        }
                    }
                    true
                }
                KeyCode::Enter => {
                    let tag_ids: Vec<i64> = selected.iter().copied().collect();
                    let article_id = *article_id;
                    let db = app.db.clone();
                    let user_id = app.user_id();
                    spawn_action("set_tags", event_tx, async move {
                        actions::set_tags(&db, user_id, article_id, &tag_ids).await?;
                        Ok(ActionOutcome::TagsSet {
                            article_id,
                            tag_ids,
                        })
                    });
                    false
                }
                _ => true,
            }
        }
        Modal::TagFilter { cursor } => {
            let count = app.store.tags().len();
            match code {
                KeyCode::Char('j') | KeyCode::Down => {
                    *cursor = (*cursor + 1).min(count.saturating_sub(1));
                    true
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    *cursor = cursor.saturating_sub(1);
                    true
                }
                KeyCode::Char(' ') | KeyCode::Enter => {
                    if let Some(tag_id) = app.store.tags().get(*cursor).map(|t| t.id) {
                        let keys = app.toggle_filter_tag(tag_id);
                        save_preferences(app, keys);
                        run_search(app, event_tx);
                    }
                    true
                }
                _ => true,
            }
        }
        Modal::ConfirmArchive {
            article_id,
            archive,
            ..
        } => match code {
            KeyCode::Char('y') | KeyCode::Enter => {
                let (article_id, archived) = (*article_id, *archive);
                let db = app.db.clone();
                let user_id = app.user_id();
                spawn_action("archive", event_tx, async move {
                    actions::set_archived(&db, user_id, article_id, archived).await?;
                    Ok(ActionOutcome::ArchiveChanged {
                        article_id,
                        archived,
                    })
                });
                false
            }
            KeyCode::Char('n') => false,
            _ => true,
        },
        // Text dialogs were handled above
        _ => true,
    };

    if keep_open {
        app.modal = Some(modal);
    }
}

/// Validate and submit a text dialog. Returns false to keep it open.
fn submit_text_modal(app: &mut App, modal: &Modal, event_tx: &mpsc::Sender<AppEvent>) -> bool {
    let db = app.db.clone();
    let user_id = app.user_id();

    match modal {
        Modal::Rename { article_id, input } => {
            if let Err(e) = actions::validate_title(input) {
                app.set_status(e.to_string());
                return false;
            }
            let article_id = *article_id;
            let current = app
                .store
                .get(article_id)
                .map(|a| a.name.clone())
                .unwrap_or_default();
            let input = input.clone();
            spawn_action("rename", event_tx, async move {
                let name =
                    actions::rename_article(&db, user_id, article_id, &current, &input).await?;
                Ok(ActionOutcome::Renamed { article_id, name })
            });
        }
        Modal::Copy { article_id, input } => {
            if let Err(e) = actions::validate_title(input) {
                app.set_status(e.to_string());
                return false;
            }
            let (article_id, input) = (*article_id, input.clone());
            spawn_action("copy", event_tx, async move {
                let record = actions::copy_article(&db, user_id, article_id, &input).await?;
                Ok(ActionOutcome::Copied(record))
            });
        }
        Modal::NewArticle { parent_id, input } => {
            if let Err(e) = actions::validate_title(input) {
                app.set_status(e.to_string());
                return false;
            }
            let (parent_id, input) = (*parent_id, input.clone());
            spawn_action("create", event_tx, async move {
                let record = actions::create_article(&db, user_id, &input, parent_id).await?;
                Ok(ActionOutcome::Created(record))
            });
        }
        Modal::Comment {
            article_id,
            parent_id,
            input,
        } => {
            if let Err(e) = validate_body(input) {
                app.set_status(e.to_string());
                return false;
            }
            let (article_id, parent_id, input) = (*article_id, *parent_id, input.clone());
            spawn_action("comment", event_tx, async move {
                let message =
                    actions::post_comment(&db, user_id, article_id, parent_id, &input).await?;
                Ok(ActionOutcome::CommentPosted {
                    article_id,
                    message,
                })
            });
        }
        _ => {}
    }
    true
}

/// Returns true to keep the picker open (invalid target).
fn submit_move(
    app: &mut App,
    article_id: i64,
    parent_id: Option<i64>,
    event_tx: &mpsc::Sender<AppEvent>,
) -> bool {
    if let Err(e) = actions::validate_move(&app.store, article_id, parent_id) {
        app.set_status(e.to_string());
        return true;
    }
    let db = app.db.clone();
    let user_id = app.user_id();
    spawn_action("move", event_tx, async move {
        actions::move_article(&db, user_id, article_id, parent_id).await?;
        Ok(ActionOutcome::Moved {
            article_id,
            parent_id,
        })
    });
    false
}
