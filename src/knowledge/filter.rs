use std::collections::{BTreeSet, HashSet};

use super::sort::{sort_articles, SortOrder};
use super::store::ArticleStore;
use super::text::find_ignore_case;
use super::{normalize_query, Article, Projection};

/// Active filter predicates plus the sort key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub selected_tag_ids: BTreeSet<i64>,
    pub only_favorites: bool,
    pub show_archived: bool,
    /// Raw input; never persisted.
    pub search_query: String,
    pub search_in_content: bool,
    pub sort_order: SortOrder,
}

impl FilterState {
    /// Reset tag, favorite and archive filters. Search and sort are kept.
    pub fn clear(&mut self) {
        self.selected_tag_ids.clear();
        self.only_favorites = false;
        self.show_archived = false;
    }

    pub fn has_active_filters(&self) -> bool {
        !self.selected_tag_ids.is_empty() || self.only_favorites || self.show_archived
    }

    pub fn toggle_tag(&mut self, tag_id: i64) {
        if !self.selected_tag_ids.remove(&tag_id) {
            self.selected_tag_ids.insert(tag_id);
        }
    }

    fn admits_tags(&self, article: &Article) -> bool {
        self.selected_tag_ids.is_empty() || self.has_tag_match(article)
    }

    fn has_tag_match(&self, article: &Article) -> bool {
        article
            .tag_ids
            .iter()
            .any(|t| self.selected_tag_ids.contains(t))
    }
}

// ============================================================================
// Filter Pass
// ============================================================================

/// Ids that belong to the base set: every article when archived ones are
/// shown, otherwise only active articles.
fn base_set(store: &ArticleStore, show_archived: bool) -> HashSet<i64> {
    let mut base: HashSet<i64> = store
        .articles()
        .iter()
        .filter(|a| show_archived || a.active)
        .map(|a| a.id)
        .collect();

    // Keep archived items reachable through their parents
    if show_archived {
        for archived in store.articles().iter().filter(|a| !a.active) {
            base.extend(store.ancestors(archived.id));
        }
    }
    base
}

/// Does `article` match the normalized `query`?
///
/// The name always counts. With `in_content`, the cached search text counts
/// too; an entry whose text is not extracted yet never matches on body.
pub fn matches_query(store: &ArticleStore, article: &Article, query: &str, in_content: bool) -> bool {
    if query.is_empty() {
        return true;
    }
    if find_ignore_case(&article.name, query).is_some() {
        return true;
    }
    in_content
        && store
            .content(article.id)
            .and_then(|c| c.text.as_deref())
            .is_some_and(|text| text.contains(query))
}

/// Compute the visible, sorted article list.
///
/// 1. Base set (active only, or everything plus archived ancestors).
/// 2. Matches: tag intersection, favorites, text query.
/// 3. `tag_matches` rebuilt from matches admitted by a tag filter.
/// 4. Ancestor closure of the matches, walking only through the base set.
/// 5. Every ancestor of a result member is marked expanded.
/// 6. Stable sort.
pub fn apply<'a>(
    store: &'a ArticleStore,
    state: &FilterState,
    projection: &mut Projection,
) -> Vec<&'a Article> {
    let base = base_set(store, state.show_archived);
    let query = normalize_query(&state.search_query);

    let matches: Vec<&Article> = store
        .articles()
        .iter()
        .filter(|a| base.contains(&a.id))
        .filter(|a| state.admits_tags(a))
        .filter(|a| !state.only_favorites || store.is_favorite(a.id))
        .filter(|a| matches_query(store, a, &query, state.search_in_content))
        .collect();

    projection.tag_matches.clear();
    if !state.selected_tag_ids.is_empty() {
        projection
            .tag_matches
            .extend(matches.iter().filter(|a| state.has_tag_match(a)).map(|a| a.id));
    }

    let mut result: HashSet<i64> = matches.iter().map(|a| a.id).collect();
    for article in &matches {
        for ancestor in store.ancestors(article.id) {
            if !base.contains(&ancestor) {
                break;
            }
            if !result.insert(ancestor) {
                // Already walked from here
                break;
            }
        }
    }

    for &id in &result {
        for ancestor in store.ancestors(id) {
            if !result.contains(&ancestor) {
                break;
            }
            projection.expanded.insert(ancestor);
        }
    }

    let mut visible: Vec<&Article> = store
        .articles()
        .iter()
        .filter(|a| result.contains(&a.id))
        .collect();
    sort_articles(&mut visible, state.sort_order);

    tracing::debug!(
        base = base.len(),
        matches = matches.len(),
        visible = visible.len(),
        "Filter pass"
    );
    visible
}

/// Bodies that must be fetched before a content search can be exact:
/// base-set articles whose name does not match and that have no cache entry.
///
/// Empty unless the query is non-empty and body search is on.
pub fn missing_content_ids(store: &ArticleStore, state: &FilterState, limit: usize) -> Vec<i64> {
    let query = normalize_query(&state.search_query);
    if query.is_empty() || !state.search_in_content {
        return Vec::new();
    }
    let base = base_set(store, state.show_archived);
    let candidates = store
        .articles()
        .iter()
        .filter(|a| base.contains(&a.id))
        .filter(|a| find_ignore_case(&a.name, &query).is_none())
        .map(|a| a.id);
    store.uncached(candidates, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::store::ContentEntry;
    use crate::storage::{ArticleRecord, Tag};
    use pretty_assertions::assert_eq;

    fn rec(id: i64, name: &str, parent_id: Option<i64>, tags: &[i64], active: bool) -> ArticleRecord {
        ArticleRecord {
            id,
            name: name.to_string(),
            parent_id,
            tag_ids: tags.to_vec(),
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

    fn ids(list: &[&Article]) -> Vec<i64> {
        list.iter().map(|a| a.id).collect()
    }

    /// 1 Root -> 2 Child -> 3 Grandchild, plus 4 Other.
    fn sample() -> ArticleStore {
        ArticleStore::from_parts(
            vec![
                rec(1, "Root", None, &[], true),
                rec(2, "Child", Some(1), &[], true),
                rec(3, "Grandchild", Some(2), &[10], true),
                rec(4, "Other", None, &[20], true),
            ],
            vec![
                Tag { id: 10, name: "ops".into() },
                Tag { id: 20, name: "docs".into() },
            ],
            vec![],
        )
    }

    #[test]
    fn test_no_filters_shows_active_sorted_by_name() {
        let store = sample();
        let mut p = Projection::default();
        let visible = apply(&store, &FilterState::default(), &mut p);
        assert_eq!(ids(&visible), vec![2, 3, 4, 1]);
    }

    #[test]
    fn test_tag_filter_pulls_in_ancestors_and_expands_them() {
        let store = sample();
        let mut p = Projection::default();
        let state = FilterState {
            selected_tag_ids: BTreeSet::from([10]),
            ..Default::default()
        };
        let visible = apply(&store, &state, &mut p);

        assert_eq!(ids(&visible), vec![2, 3, 1]);
        assert_eq!(p.tag_matches, HashSet::from([3]));
        assert!(p.expanded.contains(&1));
        assert!(p.expanded.contains(&2));
        assert!(!p.expanded.contains(&3));
    }

    #[test]
    fn test_tag_matches_reset_each_pass() {
        let store = sample();
        let mut p = Projection::default();
        let state = FilterState {
            selected_tag_ids: BTreeSet::from([20]),
            ..Default::default()
        };
        apply(&store, &state, &mut p);
        assert_eq!(p.tag_matches, HashSet::from([4]));

        apply(&store, &FilterState::default(), &mut p);
        assert!(p.tag_matches.is_empty());
    }

    #[test]
    fn test_favorites_only_keeps_ancestors_drops_other_roots() {
        let store = ArticleStore::from_parts(
            vec![
                rec(1, "Root", None, &[], true),
                rec(2, "Fav", Some(1), &[], true),
                rec(3, "Other root", None, &[], true),
            ],
            vec![],
            vec![2],
        );
        let mut p = Projection::default();
        let state = FilterState {
            only_favorites: true,
            ..Default::default()
        };
        let visible = ids(&apply(&store, &state, &mut p));
        assert_eq!(visible, vec![2, 1]);
        assert!(!visible.contains(&3));
        // Root is present only as an ancestor of the favorite
        assert!(p.expanded.contains(&1));
        assert!(p.tag_matches.is_empty());
    }

    #[test]
    fn test_archived_hidden_and_children_become_roots() {
        let store = ArticleStore::from_parts(
            vec![
                rec(5, "Archived", None, &[], false),
                rec(6, "Orphan", Some(5), &[], true),
            ],
            vec![],
            vec![],
        );
        let mut p = Projection::default();
        let visible = apply(&store, &FilterState::default(), &mut p);
        assert_eq!(ids(&visible), vec![6]);
        assert!(!p.expanded.contains(&5));
    }

    #[test]
    fn test_show_archived_includes_everything() {
        let store = ArticleStore::from_parts(
            vec![
                rec(5, "Archived", None, &[], false),
                rec(6, "Child", Some(5), &[], true),
            ],
            vec![],
            vec![],
        );
        let mut p = Projection::default();
        let state = FilterState {
            show_archived: true,
            ..Default::default()
        };
        let visible = apply(&store, &state, &mut p);
        assert_eq!(ids(&visible), vec![5, 6]);
        assert!(p.expanded.contains(&5));
    }

    #[test]
    fn test_name_query_is_trimmed_and_case_insensitive() {
        let store = sample();
        let mut p = Projection::default();
        let state = FilterState {
            search_query: "  GRAND ".into(),
            ..Default::default()
        };
        assert_eq!(ids(&apply(&store, &state, &mut p)), vec![2, 3, 1]);
    }

    #[test]
    fn test_body_query_needs_extracted_text() {
        let mut store = sample();
        let mut p = Projection::default();
        let state = FilterState {
            search_query: "kubernetes".into(),
            search_in_content: true,
            ..Default::default()
        };

        store.cache_html(4, "<p>Kubernetes notes</p>");
        assert!(apply(&store, &state, &mut p).is_empty());

        store.complete_text(4, "kubernetes notes".into());
        assert_eq!(ids(&apply(&store, &state, &mut p)), vec![4]);

        // Body matches are ignored when content search is off
        let names_only = FilterState {
            search_in_content: false,
            ..state
        };
        assert!(apply(&store, &names_only, &mut p).is_empty());
    }

    #[test]
    fn test_empty_store_gives_empty_result() {
        let store = ArticleStore::new();
        let mut p = Projection::default();
        assert!(apply(&store, &FilterState::default(), &mut p).is_empty());
    }

    #[test]
    fn test_apply_is_idempotent() {
        let store = sample();
        let mut p = Projection::default();
        let state = FilterState {
            selected_tag_ids: BTreeSet::from([10, 20]),
            ..Default::default()
        };
        let first = ids(&apply(&store, &state, &mut p));
        let snapshot = p.clone();
        let second = ids(&apply(&store, &state, &mut p));
        assert_eq!(first, second);
        assert_eq!(p, snapshot);
    }

    #[test]
    fn test_missing_content_ids_skips_name_matches_and_cached() {
        let mut store = sample();
        store.insert_extracted([(2, ContentEntry::extracted("<p>child</p>"))]);
        let state = FilterState {
            search_query: "root".into(),
            search_in_content: true,
            ..Default::default()
        };
        assert_eq!(missing_content_ids(&store, &state, 10), vec![3, 4]);
        assert_eq!(missing_content_ids(&store, &state, 1), vec![3]);

        let off = FilterState {
            search_in_content: false,
            ..state
        };
        assert!(missing_content_ids(&store, &off, 10).is_empty());
    }

    #[test]
    fn test_clear_keeps_search_and_sort() {
        let mut state = FilterState {
            selected_tag_ids: BTreeSet::from([1]),
            only_favorites: true,
            show_archived: true,
            search_query: "q".into(),
            search_in_content: true,
            sort_order: SortOrder::ViewsDesc,
        };
        assert!(state.has_active_filters());
        state.clear();
        assert!(!state.has_active_filters());
        assert_eq!(state.search_query, "q");
        assert_eq!(state.sort_order, SortOrder::ViewsDesc);
    }
}
