use std::collections::HashSet;

use super::deep_link::DeepLink;
use super::store::ArticleStore;
use super::Article;

/// Why the reader shows a placeholder instead of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    /// Nothing selected, or nothing matches the filters.
    NoSelection,
    /// The article is archived and the archive view is off.
    Archived,
}

impl Unavailable {
    pub fn message(self) -> &'static str {
        match self {
            Unavailable::NoSelection => "No article selected or matching current filters.",
            Unavailable::Archived => "This article is archived.",
        }
    }
}

/// Result of a selection change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    Selected {
        id: i64,
        /// Generation to tag async work with; see [`SelectionController::is_current`].
        generation: u64,
        /// True the first time this article is shown in the session; the
        /// caller increments the view count after a settle delay.
        record_view: bool,
    },
    Unavailable(Unavailable),
}

/// Current article, breadcrumb and deep link.
#[derive(Debug, Default)]
pub struct SelectionController {
    current: Option<i64>,
    /// Root first, current article last.
    breadcrumb: Vec<i64>,
    generation: u64,
    viewed: HashSet<i64>,
    link: DeepLink,
    placeholder: Option<Unavailable>,
}

impl SelectionController {
    pub fn new(link: DeepLink) -> Self {
        Self {
            link,
            placeholder: Some(Unavailable::NoSelection),
            ..Default::default()
        }
    }

    pub fn current(&self) -> Option<i64> {
        self.current
    }

    pub fn breadcrumb(&self) -> &[i64] {
        &self.breadcrumb
    }

    pub fn link(&self) -> &DeepLink {
        &self.link
    }

    pub fn placeholder(&self) -> Option<Unavailable> {
        self.placeholder
    }

    /// Guard for async completions: false once another selection happened.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Select an article, or clear with `None`.
    pub fn select(
        &mut self,
        store: &ArticleStore,
        id: Option<i64>,
        show_archived: bool,
    ) -> SelectionOutcome {
        self.generation = self.generation.wrapping_add(1);

        let Some(article) = id.and_then(|id| store.get(id)) else {
            if let Some(id) = id {
                tracing::debug!(article_id = id, "Selected article is not loaded");
            }
            return self.clear(Unavailable::NoSelection);
        };
        if !article.active && !show_archived {
            return self.clear(Unavailable::Archived);
        }

        self.current = Some(article.id);
        self.placeholder = None;
        self.breadcrumb = breadcrumb(store, article);
        self.link.set_article_id(article.id);
        let record_view = self.viewed.insert(article.id);

        tracing::debug!(
            article_id = article.id,
            generation = self.generation,
            record_view,
            "Selection changed"
        );
        SelectionOutcome::Selected {
            id: article.id,
            generation: self.generation,
            record_view,
        }
    }

    fn clear(&mut self, reason: Unavailable) -> SelectionOutcome {
        self.current = None;
        self.breadcrumb.clear();
        self.placeholder = Some(reason);
        SelectionOutcome::Unavailable(reason)
    }

    /// After a filter pass: keep the selection when still visible, else fall
    /// back to the first visible article, else clear.
    ///
    /// Returns `None` when the selection did not change.
    pub fn reconcile(
        &mut self,
        store: &ArticleStore,
        visible: &[&Article],
        show_archived: bool,
    ) -> Option<SelectionOutcome> {
        if let Some(current) = self.current {
            if visible.iter().any(|a| a.id == current) {
                // Parent chain may have changed under us
                if let Some(article) = store.get(current) {
                    self.breadcrumb = breadcrumb(store, article);
                }
                return None;
            }
        }
        match visible.first() {
            Some(first) => Some(self.select(store, Some(first.id), show_archived)),
            None if self.current.is_none() && self.placeholder == Some(Unavailable::NoSelection) => None,
            None => Some(self.select(store, None, show_archived)),
        }
    }
}

/// Root-to-article id trail. The walk is cycle-guarded and stops at a
/// missing parent.
pub fn breadcrumb(store: &ArticleStore, article: &Article) -> Vec<i64> {
    let mut trail = store.ancestors(article.id);
    trail.reverse();
    trail.push(article.id);
    trail
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ArticleRecord;
    use pretty_assertions::assert_eq;

    fn rec(id: i64, parent_id: Option<i64>, active: bool) -> ArticleRecord {
        ArticleRecord {
            id,
            name: format!("a{id}"),
            parent_id,
            tag_ids: Vec::new(),
            active,
            view_count: 0,
            like_count: 0,
            liked_by_ids: Vec::new(),
            created_at: None,
            created_by: None,
            modified_at: None,
            modified_by: None,
        }
    }

    fn store() -> ArticleStore {
        ArticleStore::from_parts(
            vec![
                rec(1, None, true),
                rec(2, Some(1), true),
                rec(3, Some(2), true),
                rec(4, None, false),
            ],
            vec![],
            vec![],
        )
    }

    #[test]
    fn test_select_sets_breadcrumb_and_link() {
        let store = store();
        let mut sel = SelectionController::new(DeepLink::default());
        let outcome = sel.select(&store, Some(3), false);

        assert!(matches!(
            outcome,
            SelectionOutcome::Selected { id: 3, record_view: true, .. }
        ));
        assert_eq!(sel.current(), Some(3));
        assert_eq!(sel.breadcrumb(), &[1, 2, 3]);
        assert_eq!(sel.link().article_id(), Some(3));
        assert_eq!(sel.placeholder(), None);
    }

    #[test]
    fn test_view_recorded_once_per_session() {
        let store = store();
        let mut sel = SelectionController::default();
        sel.select(&store, Some(1), false);
        sel.select(&store, Some(2), false);
        let again = sel.select(&store, Some(1), false);
        assert!(matches!(
            again,
            SelectionOutcome::Selected { record_view: false, .. }
        ));
    }

    #[test]
    fn test_none_and_archived_show_placeholders() {
        let store = store();
        let mut sel = SelectionController::default();
        sel.select(&store, Some(1), false);

        assert_eq!(
            sel.select(&store, Some(4), false),
            SelectionOutcome::Unavailable(Unavailable::Archived)
        );
        assert_eq!(sel.current(), None);
        assert!(sel.breadcrumb().is_empty());

        assert_eq!(
            sel.select(&store, None, false),
            SelectionOutcome::Unavailable(Unavailable::NoSelection)
        );

        // Archive view on: archived articles are selectable
        assert!(matches!(
            sel.select(&store, Some(4), true),
            SelectionOutcome::Selected { id: 4, .. }
        ));
    }

    #[test]
    fn test_generation_guards_stale_results() {
        let store = store();
        let mut sel = SelectionController::default();
        let SelectionOutcome::Selected { generation, .. } = sel.select(&store, Some(1), false) else {
            panic!("expected selection");
        };
        assert!(sel.is_current(generation));
        sel.select(&store, Some(2), false);
        assert!(!sel.is_current(generation));
    }

    #[test]
    fn test_breadcrumb_cycle_guarded() {
        let store = ArticleStore::from_parts(
            vec![rec(1, Some(2), true), rec(2, Some(1), true)],
            vec![],
            vec![],
        );
        let trail = breadcrumb(&store, store.get(1).unwrap());
        assert_eq!(trail, vec![2, 1]);
    }

    #[test]
    fn test_reconcile_keeps_visible_selection() {
        let store = store();
        let mut sel = SelectionController::default();
        sel.select(&store, Some(2), false);
        let visible: Vec<&Article> = [1, 2].iter().filter_map(|id| store.get(*id)).collect();
        assert_eq!(sel.reconcile(&store, &visible, false), None);
        assert_eq!(sel.current(), Some(2));
    }

    #[test]
    fn test_reconcile_falls_back_to_first_then_clears() {
        let store = store();
        let mut sel = SelectionController::default();
        sel.select(&store, Some(3), false);

        let visible: Vec<&Article> = [1].iter().filter_map(|id| store.get(*id)).collect();
        assert!(matches!(
            sel.reconcile(&store, &visible, false),
            Some(SelectionOutcome::Selected { id: 1, .. })
        ));

        assert_eq!(
            sel.reconcile(&store, &[], false),
            Some(SelectionOutcome::Unavailable(Unavailable::NoSelection))
        );
        // Already cleared: nothing to do
        assert_eq!(sel.reconcile(&store, &[], false), None);
    }
}
