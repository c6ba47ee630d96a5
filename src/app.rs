use crate::config::Config;
use crate::knowledge::comments::{self, CommentThread};
use crate::knowledge::deep_link::DeepLink;
use crate::knowledge::prefs::{PrefKey, UiPreferences};
use crate::knowledge::tree::{self, TreeNode, TreeRow};
use crate::knowledge::{
    filter, Article, ArticleStore, ContentEntry, FilterState, KnowledgeError, Projection,
    SelectionController, SelectionOutcome, Unavailable,
};
use crate::storage::{ArticleRecord, Database, LikeState, Message};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::time::Instant;

/// Maximum scroll offset for the reader view (ratatui u16 limit).
pub const MAX_SCROLL: usize = u16::MAX as usize;

/// Approximate pixel width of one terminal cell, for the persisted sidebar width.
pub const CELL_WIDTH_PX: u16 = 8;

/// Sidebar resize step in pixels.
pub const SIDEBAR_STEP_PX: i64 = 20;

// ============================================================================
// View State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Tree,
    Reader,
}

/// Reader pane content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderState {
    Placeholder(Unavailable),
    /// Waiting for the body or its extracted text.
    Loading { article_id: i64 },
    Loaded { article_id: i64, lines: Arc<[String]> },
    Failed { article_id: i64, error: String },
}

// ============================================================================
// Modal Dialogs
// ============================================================================

/// Overlay that captures all input while open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    Rename { article_id: i64, input: String },
    Copy { article_id: i64, input: String },
    NewArticle { parent_id: Option<i64>, input: String },
    Comment {
        article_id: i64,
        parent_id: Option<i64>,
        input: String,
    },
    /// Parent picker. The first entry is the top level.
    Move {
        article_id: i64,
        targets: Vec<(Option<i64>, String)>,
        cursor: usize,
    },
    /// Tag assignment for one article.
    Tags {
        article_id: i64,
        selected: BTreeSet<i64>,
        cursor: usize,
    },
    /// Tag filter picker; toggles apply immediately.
    TagFilter { cursor: usize },
    ConfirmArchive {
        article_id: i64,
        name: String,
        archive: bool,
    },
}

impl Modal {
    /// Text input of the dialog, if it has one.
    pub fn input_mut(&mut self) -> Option<&mut String> {
        match self {
            Modal::Rename { input, .. }
            | Modal::Copy { input, .. }
            | Modal::NewArticle { input, .. }
            | Modal::Comment { input, .. } => Some(input),
            _ => None,
        }
    }
}

// ============================================================================
// Background Events
// ============================================================================

/// Successful result of a user-initiated write.
#[derive(Debug, Clone)]
pub enum ActionOutcome {
    Created(ArticleRecord),
    Copied(ArticleRecord),
    /// `name` is `None` when the title was unchanged.
    Renamed { article_id: i64, name: Option<String> },
    Moved { article_id: i64, parent_id: Option<i64> },
    TagsSet { article_id: i64, tag_ids: Vec<i64> },
    /// Permission check passed; ask for confirmation.
    ArchivePermitted { article_id: i64, archive: bool },
    ArchiveChanged { article_id: i64, archived: bool },
    LikeToggled { article_id: i64, likes: LikeState },
    FavoriteToggled { article_id: i64, favorite: bool },
    CommentPosted { article_id: i64, message: Message },
}

/// Events from background tasks
pub enum AppEvent {
    /// Raw body fetched for the reader.
    ContentLoaded {
        article_id: i64,
        generation: u64,
        result: Result<String, String>,
    },
    /// Text extraction finished off the render path.
    TextExtracted {
        article_id: i64,
        generation: u64,
        search_text: String,
        display_text: String,
    },
    /// Batch of bodies for a content search, text already extracted.
    ContentPrefetched {
        search_generation: u64,
        result: Result<Vec<(i64, ContentEntry)>, String>,
    },
    CommentsLoaded {
        article_id: i64,
        generation: u64,
        result: Result<Vec<Message>, String>,
    },
    /// The settle delay elapsed for a first view.
    ViewSettled { article_id: i64, generation: u64 },
    ViewRecorded {
        article_id: i64,
        result: Result<i64, String>,
    },
    ActionCompleted(ActionOutcome),
    ActionFailed {
        action: &'static str,
        error: KnowledgeError,
    },
    /// A background task panicked.
    TaskPanicked { task: &'static str, error: String },
}

// ============================================================================
// Application State
// ============================================================================

/// Central application state
pub struct App {
    pub db: Database,
    pub config: Config,

    // Data
    pub store: ArticleStore,
    pub filter: FilterState,
    pub projection: Projection,
    pub selection: SelectionController,
    pub prefs: UiPreferences,

    /// Ids of the last filter pass, in display order.
    pub visible: Vec<i64>,
    /// Tree for `visible`, rebuilt after every pass and expand change.
    pub tree: Vec<TreeNode>,

    // UI State
    pub focus: Focus,
    /// Highlighted tree row, by article id.
    pub cursor: Option<i64>,
    pub reader: ReaderState,
    pub reader_scroll: usize,
    pub messages: Vec<Message>,
    pub comment_threads: Vec<CommentThread>,
    /// Highlighted comment for replies, index into the flattened threads.
    pub comment_cursor: Option<usize>,

    // Search
    pub search_mode: bool,
    pub search_input: String,
    /// Last keystroke; the pass runs once the debounce window has elapsed.
    pub search_debounce: Option<Instant>,
    /// Bumped per applied query; stale prefetch results are dropped.
    pub search_generation: u64,
    /// True while a body batch for the current query is in flight.
    pub prefetch_in_flight: bool,

    pub status_message: Option<(Cow<'static, str>, Instant)>,
    pub modal: Option<Modal>,
    pub show_help: bool,
    pub help_scroll_offset: usize,

    /// Dirty flag to skip unnecessary frame renders
    pub needs_redraw: bool,

    /// Handle to the current content load task for cancellation.
    pub content_load_handle: Option<tokio::task::JoinHandle<()>>,
    /// Handle to the current body prefetch for cancellation.
    pub prefetch_handle: Option<tokio::task::JoinHandle<()>>,
    /// Last queued preference write; the next one waits for it.
    pub pref_write: Option<tokio::task::JoinHandle<()>>,
}

impl App {
    pub fn new(db: Database, config: Config, link: DeepLink) -> Self {
        Self {
            db,
            config,
            store: ArticleStore::new(),
            filter: FilterState::default(),
            projection: Projection::default(),
            selection: SelectionController::new(link),
            prefs: UiPreferences::default(),
            visible: Vec::new(),
            tree: Vec::new(),
            focus: Focus::Tree,
            cursor: None,
            reader: ReaderState::Placeholder(Unavailable::NoSelection),
            reader_scroll: 0,
            messages: Vec::new(),
            comment_threads: Vec::new(),
            comment_cursor: None,
            search_mode: false,
            search_input: String::new(),
            search_debounce: None,
            search_generation: 0,
            prefetch_in_flight: false,
            status_message: None,
            modal: None,
            show_help: false,
            help_scroll_offset: 0,
            needs_redraw: true,
            content_load_handle: None,
            prefetch_handle: None,
            pref_write: None,
        }
    }

    pub fn user_id(&self) -> i64 {
        self.config.user_id
    }

    // ========================================================================
    // Startup
    // ========================================================================

    /// Hydrate filters from stored preferences. The expanded set is restored
    /// by [`mount`](Self::mount), ahead of the first pass.
    pub fn apply_preferences(&mut self, prefs: UiPreferences) {
        self.filter = prefs.filter_state();
        self.prefs = prefs;
    }

    /// Saved expansion, first filter pass, then the initial selection: the
    /// deep-linked article, else the last one viewed, else the first visible.
    ///
    /// The pass runs on top of the saved set, so ancestors of every result
    /// end up expanded even when the saved set is empty.
    pub fn mount(&mut self) -> SelectionOutcome {
        if let Some(saved) = &self.prefs.expanded_nodes {
            self.projection.expanded = saved.clone();
        }
        self.run_filter_pass();

        let preferred = self
            .selection
            .link()
            .article_id()
            .or(self.prefs.last_article_id)
            .filter(|id| self.store.contains(*id));
        let target = preferred.or_else(|| self.visible.first().copied());
        self.select(target)
    }

    // ========================================================================
    // Filter Pass
    // ========================================================================

    /// Run the filter, rebuild the tree and keep the selection consistent.
    ///
    /// Returns the selection change, if any, so the caller can start loads.
    pub fn refilter(&mut self) -> Option<SelectionOutcome> {
        self.run_filter_pass();
        let visible: Vec<&Article> = self
            .visible
            .iter()
            .filter_map(|id| self.store.get(*id))
            .collect();
        let outcome =
            self.selection
                .reconcile(&self.store, &visible, self.filter.show_archived);
        match outcome {
            Some(outcome) => Some(self.after_select(outcome)),
            None => {
                self.expand_breadcrumb();
                None
            }
        }
    }

    fn run_filter_pass(&mut self) {
        let visible = filter::apply(&self.store, &self.filter, &mut self.projection);
        self.visible = visible.iter().map(|a| a.id).collect();
        self.rebuild_tree();
    }

    pub fn rebuild_tree(&mut self) {
        let visible: Vec<&Article> = self
            .visible
            .iter()
            .filter_map(|id| self.store.get(*id))
            .collect();
        let content = self
            .filter
            .search_in_content
            .then(|| self.store.content_cache());
        self.tree = tree::build(&visible, &self.projection, &self.filter.search_query, content);
        self.clamp_cursor();
    }

    /// Ids still needing a body fetch before a content search is exact.
    pub fn pending_content_ids(&self) -> Vec<i64> {
        filter::missing_content_ids(&self.store, &self.filter, self.config.content_batch_limit)
    }

    /// Record a search keystroke; the pass runs after the debounce window.
    pub fn search_changed(&mut self) {
        self.search_debounce = Some(Instant::now());
    }

    /// Apply the typed query once the debounce window has elapsed.
    ///
    /// Returns true when a new query took effect.
    pub fn take_due_search(&mut self) -> bool {
        let Some(last_keystroke) = self.search_debounce else {
            return false;
        };
        if last_keystroke.elapsed() < self.config.search_debounce() {
            return false;
        }
        self.search_debounce = None;
        self.apply_search_now()
    }

    /// Apply the typed query immediately. Returns true when it changed.
    pub fn apply_search_now(&mut self) -> bool {
        self.search_debounce = None;
        if self.filter.search_query == self.search_input {
            return false;
        }
        self.filter.search_query = self.search_input.clone();
        self.search_generation = self.search_generation.wrapping_add(1);
        self.prefetch_in_flight = false;
        true
    }

    // ========================================================================
    // Filter Mutations
    // ========================================================================
    //
    // Each returns the preference keys to write back.

    fn filter_changed(&mut self) -> &'static [PrefKey] {
        self.prefs.update_filter(&self.filter);
        &PrefKey::FILTER
    }

    pub fn toggle_filter_tag(&mut self, tag_id: i64) -> &'static [PrefKey] {
        self.filter.toggle_tag(tag_id);
        self.filter_changed()
    }

    pub fn toggle_only_favorites(&mut self) -> &'static [PrefKey] {
        self.filter.only_favorites = !self.filter.only_favorites;
        self.filter_changed()
    }

    pub fn toggle_show_archived(&mut self) -> &'static [PrefKey] {
        self.filter.show_archived = !self.filter.show_archived;
        self.filter_changed()
    }

    pub fn toggle_search_in_content(&mut self) -> &'static [PrefKey] {
        self.filter.search_in_content = !self.filter.search_in_content;
        self.search_generation = self.search_generation.wrapping_add(1);
        self.prefetch_in_flight = false;
        self.filter_changed()
    }

    pub fn cycle_sort(&mut self) -> &'static [PrefKey] {
        self.filter.sort_order = self.filter.sort_order.next();
        self.filter_changed()
    }

    pub fn clear_filters(&mut self) -> &'static [PrefKey] {
        self.filter.clear();
        self.filter_changed()
    }

    // ========================================================================
    // Tree Interaction
    // ========================================================================

    pub fn rows(&self) -> Vec<TreeRow<'_>> {
        tree::flatten(&self.tree)
    }

    fn cursor_index(&self, rows: &[TreeRow<'_>]) -> Option<usize> {
        let cursor = self.cursor?;
        rows.iter().position(|r| r.node.id == cursor)
    }

    /// Keep the cursor on a visible row: current article, else first row.
    fn clamp_cursor(&mut self) {
        let rows = tree::flatten(&self.tree);
        if self.cursor_index(&rows).is_some() {
            return;
        }
        let current = self
            .selection
            .current()
            .filter(|id| rows.iter().any(|r| r.node.id == *id));
        self.cursor = current.or_else(|| rows.first().map(|r| r.node.id));
    }

    pub fn nav_up(&mut self) {
        let rows = self.rows();
        let next = match self.cursor_index(&rows) {
            Some(i) => rows.get(i.saturating_sub(1)),
            None => rows.first(),
        }
        .map(|r| r.node.id);
        self.cursor = next;
    }

    pub fn nav_down(&mut self) {
        let rows = self.rows();
        let next = match self.cursor_index(&rows) {
            Some(i) => rows.get((i + 1).min(rows.len().saturating_sub(1))),
            None => rows.first(),
        }
        .map(|r| r.node.id);
        self.cursor = next;
    }

    /// Expand or collapse one node. Returns true when the expanded set changed.
    pub fn set_expanded(&mut self, id: i64, expanded: bool) -> bool {
        let changed = if expanded {
            self.projection.expanded.insert(id)
        } else {
            self.projection.expanded.remove(&id)
        };
        if changed {
            self.expanded_changed();
        }
        changed
    }

    pub fn toggle_expanded(&mut self, id: i64) -> bool {
        let expanded = self.projection.expanded.contains(&id);
        self.set_expanded(id, !expanded)
    }

    /// Whether the row under the cursor is drawn expanded.
    pub fn cursor_row_expanded(&self) -> bool {
        let rows = tree::flatten(&self.tree);
        self.cursor_index(&rows)
            .is_some_and(|i| rows[i].node.expanded)
    }

    /// Move the cursor to the parent row, if the parent is shown.
    pub fn cursor_to_parent(&mut self) {
        let parent = self
            .cursor
            .and_then(|id| self.store.get(id))
            .and_then(|a| a.parent_id)
            .filter(|p| self.visible.contains(p));
        if parent.is_some() {
            self.cursor = parent;
        }
    }

    /// Expand every node that has children.
    pub fn expand_all(&mut self) {
        let parents = tree::parent_ids(&self.tree);
        self.projection.expanded.extend(parents);
        self.expanded_changed();
    }

    pub fn collapse_all(&mut self) {
        self.projection.expanded.clear();
        self.expanded_changed();
    }

    fn expanded_changed(&mut self) {
        self.prefs.expanded_nodes = Some(self.projection.expanded.clone());
        self.rebuild_tree();
    }

    fn expand_breadcrumb(&mut self) {
        let crumb = self.selection.breadcrumb();
        let ancestors = &crumb[..crumb.len().saturating_sub(1)];
        let mut changed = false;
        for id in ancestors {
            changed |= self.projection.expanded.insert(*id);
        }
        if changed {
            self.rebuild_tree();
        }
    }

    // ========================================================================
    // Selection
    // ========================================================================

    pub fn current_article(&self) -> Option<&Article> {
        self.selection.current().and_then(|id| self.store.get(id))
    }

    /// Select an article (or clear with `None`) and reset the reader.
    pub fn select(&mut self, id: Option<i64>) -> SelectionOutcome {
        let outcome = self.selection.select(&self.store, id, self.filter.show_archived);
        self.after_select(outcome)
    }

    fn after_select(&mut self, outcome: SelectionOutcome) -> SelectionOutcome {
        self.reader_scroll = 0;
        self.messages.clear();
        self.comment_threads.clear();
        self.comment_cursor = None;
        match &outcome {
            SelectionOutcome::Selected { id, .. } => {
                self.prefs.last_article_id = Some(*id);
                self.reader = ReaderState::Loading { article_id: *id };
                self.expand_breadcrumb();
                self.cursor = Some(*id);
                self.clamp_cursor();
            }
            SelectionOutcome::Unavailable(reason) => {
                self.reader = ReaderState::Placeholder(*reason);
            }
        }
        outcome
    }

    pub fn set_comments(&mut self, messages: Vec<Message>) {
        self.comment_threads = comments::thread(messages.clone());
        self.messages = messages;
        self.comment_cursor = None;
    }

    pub fn comment_count(&self) -> usize {
        self.messages.len()
    }

    pub fn highlighted_comment(&self) -> Option<&Message> {
        let index = self.comment_cursor?;
        comments::flatten(&self.comment_threads)
            .get(index)
            .map(|(_, m)| *m)
    }

    pub fn comment_cursor_down(&mut self) {
        let count = self.comment_count();
        if count == 0 {
            return;
        }
        self.comment_cursor = Some(match self.comment_cursor {
            Some(i) => (i + 1).min(count - 1),
            None => 0,
        });
    }

    pub fn comment_cursor_up(&mut self) {
        self.comment_cursor = match self.comment_cursor {
            Some(0) | None => None,
            Some(i) => Some(i - 1),
        };
    }

    // ========================================================================
    // Applying Results
    // ========================================================================

    /// Mirror a successful write into the store and re-derive the views.
    ///
    /// Returns a selection change for the caller to load.
    pub fn apply_outcome(&mut self, outcome: ActionOutcome) -> Option<SelectionOutcome> {
        match outcome {
            ActionOutcome::Created(record) | ActionOutcome::Copied(record) => {
                let id = record.id;
                let name = record.name.clone();
                self.store.insert(record);
                self.refilter();
                self.set_status(format!("Created \"{name}\""));
                Some(self.select(Some(id)))
            }
            ActionOutcome::Renamed { article_id, name } => {
                let name = name?;
                self.store.rename(article_id, &name);
                self.set_status("Article renamed");
                self.refilter()
            }
            ActionOutcome::Moved {
                article_id,
                parent_id,
            } => {
                self.store.set_parent(article_id, parent_id);
                self.set_status("Article moved");
                self.refilter()
            }
            ActionOutcome::TagsSet {
                article_id,
                tag_ids,
            } => {
                self.store.set_tags(article_id, tag_ids);
                self.set_status("Tags updated");
                self.refilter()
            }
            ActionOutcome::ArchivePermitted {
                article_id,
                archive,
            } => {
                let name = self.store.get(article_id)?.name.clone();
                self.modal = Some(Modal::ConfirmArchive {
                    article_id,
                    name,
                    archive,
                });
                None
            }
            ActionOutcome::ArchiveChanged {
                article_id,
                archived,
            } => {
                self.store.set_active(article_id, !archived);
                if archived {
                    self.store.invalidate_content(article_id);
                }
                self.set_status(if archived {
                    "Article archived"
                } else {
                    "Article restored"
                });
                self.refilter()
            }
            ActionOutcome::LikeToggled { article_id, likes } => {
                self.store.set_likes(article_id, likes);
                None
            }
            ActionOutcome::FavoriteToggled {
                article_id,
                favorite,
            } => {
                self.store.set_favorite(article_id, favorite);
                self.set_status(if favorite {
                    "Added to favorites"
                } else {
                    "Removed from favorites"
                });
                if self.filter.only_favorites {
                    self.refilter()
                } else {
                    self.rebuild_tree();
                    None
                }
            }
            ActionOutcome::CommentPosted {
                article_id,
                message,
            } => {
                if self.selection.current() == Some(article_id) {
                    let mut messages = std::mem::take(&mut self.messages);
                    messages.push(message);
                    self.set_comments(messages);
                }
                self.set_status("Comment posted");
                None
            }
        }
    }

    // ========================================================================
    // Sidebar
    // ========================================================================

    pub fn sidebar_columns(&self) -> u16 {
        self.prefs.sidebar_width / CELL_WIDTH_PX
    }

    pub fn resize_sidebar(&mut self, delta_px: i64) {
        let width = i64::from(self.prefs.sidebar_width) + delta_px;
        self.prefs.set_sidebar_width(width);
    }

    pub fn toggle_sidebar(&mut self) {
        self.prefs.sidebar_collapsed = !self.prefs.sidebar_collapsed;
        if self.prefs.sidebar_collapsed {
            self.focus = Focus::Reader;
        }
    }

    // ========================================================================
    // Reader
    // ========================================================================

    pub fn scroll_up(&mut self, lines: usize) {
        self.reader_scroll = self.reader_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.reader_scroll = self.reader_scroll.saturating_add(lines).min(MAX_SCROLL);
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Set status message (expires after `status_timeout_secs`)
    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// Clear status message if expired. Returns true if a message was cleared.
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() >= self.config.status_timeout() {
                self.status_message = None;
                return true;
            }
        }
        false
    }
}

// ============================================================================
// Resource Cleanup
// ============================================================================

impl Drop for App {
    fn drop(&mut self) {
        if let Some(handle) = self.content_load_handle.take() {
            handle.abort();
            tracing::debug!("Aborted content load task on App drop");
        }
        if let Some(handle) = self.prefetch_handle.take() {
            handle.abort();
            tracing::debug!("Aborted prefetch task on App drop");
        }
    }
}
