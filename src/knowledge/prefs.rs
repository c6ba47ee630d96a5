//! Durable UI preferences.
//!
//! Pure mapping between [`UiPreferences`] and the dotted key/value pairs of
//! the `user_preferences` table, plus async load/save. Missing or malformed
//! values fall back to defaults and never raise.

use std::collections::{BTreeSet, HashMap, HashSet};

use anyhow::Result;

use super::filter::FilterState;
use super::sort::SortOrder;
use crate::storage::Database;

pub const SIDEBAR_MIN_WIDTH: u16 = 150;
pub const SIDEBAR_MAX_WIDTH: u16 = 600;
pub const SIDEBAR_DEFAULT_WIDTH: u16 = 280;

/// Preference keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefKey {
    SelectedTags,
    OnlyFavorites,
    ShowArchived,
    SortOrder,
    ExpandedNodes,
    LastArticleId,
    SidebarCollapsed,
    SidebarWidth,
    SearchInContent,
}

impl PrefKey {
    pub const ALL: [PrefKey; 9] = [
        PrefKey::SelectedTags,
        PrefKey::OnlyFavorites,
        PrefKey::ShowArchived,
        PrefKey::SortOrder,
        PrefKey::ExpandedNodes,
        PrefKey::LastArticleId,
        PrefKey::SidebarCollapsed,
        PrefKey::SidebarWidth,
        PrefKey::SearchInContent,
    ];

    /// Keys touched by a filter change.
    pub const FILTER: [PrefKey; 5] = [
        PrefKey::SelectedTags,
        PrefKey::OnlyFavorites,
        PrefKey::ShowArchived,
        PrefKey::SortOrder,
        PrefKey::SearchInContent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PrefKey::SelectedTags => "filter.selected_tags",
            PrefKey::OnlyFavorites => "filter.only_favorites",
            PrefKey::ShowArchived => "filter.show_archived",
            PrefKey::SortOrder => "filter.sort_order",
            PrefKey::ExpandedNodes => "tree.expanded_nodes",
            PrefKey::LastArticleId => "selection.last_article_id",
            PrefKey::SidebarCollapsed => "sidebar.collapsed",
            PrefKey::SidebarWidth => "sidebar.width",
            PrefKey::SearchInContent => "search.in_content",
        }
    }
}

// ============================================================================
// UiPreferences
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiPreferences {
    pub selected_tag_ids: BTreeSet<i64>,
    pub only_favorites: bool,
    pub show_archived: bool,
    pub sort_order: SortOrder,
    /// `None` when never saved; the initial filter pass then decides.
    pub expanded_nodes: Option<HashSet<i64>>,
    pub last_article_id: Option<i64>,
    pub sidebar_collapsed: bool,
    /// Pixels, within `SIDEBAR_MIN_WIDTH..=SIDEBAR_MAX_WIDTH`.
    pub sidebar_width: u16,
    pub search_in_content: bool,
}

impl Default for UiPreferences {
    fn default() -> Self {
        Self {
            selected_tag_ids: BTreeSet::new(),
            only_favorites: false,
            show_archived: false,
            sort_order: SortOrder::Name,
            expanded_nodes: None,
            last_article_id: None,
            sidebar_collapsed: false,
            sidebar_width: SIDEBAR_DEFAULT_WIDTH,
            search_in_content: false,
        }
    }
}

impl UiPreferences {
    /// Decode from stored pairs. Unknown keys are ignored.
    pub fn from_pairs(pairs: &HashMap<String, String>) -> Self {
        let get = |key: PrefKey| pairs.get(key.as_str()).map(String::as_str);
        let defaults = Self::default();

        Self {
            selected_tag_ids: get(PrefKey::SelectedTags)
                .and_then(parse_id_list)
                .map(|ids| ids.into_iter().collect())
                .unwrap_or_default(),
            only_favorites: get(PrefKey::OnlyFavorites)
                .and_then(parse_flag)
                .unwrap_or(defaults.only_favorites),
            show_archived: get(PrefKey::ShowArchived)
                .and_then(parse_flag)
                .unwrap_or(defaults.show_archived),
            sort_order: get(PrefKey::SortOrder)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sort_order),
            expanded_nodes: get(PrefKey::ExpandedNodes)
                .and_then(parse_id_list)
                .map(|ids| ids.into_iter().collect()),
            last_article_id: get(PrefKey::LastArticleId).and_then(|v| v.trim().parse().ok()),
            sidebar_collapsed: get(PrefKey::SidebarCollapsed)
                .and_then(parse_flag)
                .unwrap_or(defaults.sidebar_collapsed),
            sidebar_width: get(PrefKey::SidebarWidth)
                .and_then(|v| v.trim().parse::<i64>().ok())
                .map(clamp_width)
                .unwrap_or(defaults.sidebar_width),
            search_in_content: get(PrefKey::SearchInContent)
                .and_then(parse_flag)
                .unwrap_or(defaults.search_in_content),
        }
    }

    /// Encoded value for one key. `None` means "leave unset".
    pub fn value(&self, key: PrefKey) -> Option<String> {
        let flag = |b: bool| (if b { "1" } else { "0" }).to_string();
        match key {
            PrefKey::SelectedTags => Some(encode_ids(self.selected_tag_ids.iter().copied())),
            PrefKey::OnlyFavorites => Some(flag(self.only_favorites)),
            PrefKey::ShowArchived => Some(flag(self.show_archived)),
            PrefKey::SortOrder => Some(self.sort_order.as_str().to_string()),
            PrefKey::ExpandedNodes => self.expanded_nodes.as_ref().map(|set| {
                let mut ids: Vec<i64> = set.iter().copied().collect();
                ids.sort_unstable();
                encode_ids(ids)
            }),
            PrefKey::LastArticleId => self.last_article_id.map(|id| id.to_string()),
            PrefKey::SidebarCollapsed => Some(flag(self.sidebar_collapsed)),
            PrefKey::SidebarWidth => Some(self.sidebar_width.to_string()),
            PrefKey::SearchInContent => Some(flag(self.search_in_content)),
        }
    }

    /// All set keys as stored pairs.
    pub fn to_pairs(&self) -> HashMap<String, String> {
        PrefKey::ALL
            .into_iter()
            .filter_map(|k| self.value(k).map(|v| (k.as_str().to_string(), v)))
            .collect()
    }

    /// Initial filter state. The search query itself is never persisted.
    pub fn filter_state(&self) -> FilterState {
        FilterState {
            selected_tag_ids: self.selected_tag_ids.clone(),
            only_favorites: self.only_favorites,
            show_archived: self.show_archived,
            search_query: String::new(),
            search_in_content: self.search_in_content,
            sort_order: self.sort_order,
        }
    }

    pub fn update_filter(&mut self, state: &FilterState) {
        self.selected_tag_ids = state.selected_tag_ids.clone();
        self.only_favorites = state.only_favorites;
        self.show_archived = state.show_archived;
        self.sort_order = state.sort_order;
        self.search_in_content = state.search_in_content;
    }

    pub fn set_sidebar_width(&mut self, px: i64) {
        self.sidebar_width = clamp_width(px);
    }

    // ========================================================================
    // Storage
    // ========================================================================

    /// Encoded pairs for `keys`, skipping unset values.
    pub fn pairs_for(&self, keys: &[PrefKey]) -> Vec<(String, String)> {
        keys.iter()
            .filter_map(|&k| self.value(k).map(|v| (k.as_str().to_string(), v)))
            .collect()
    }

    /// Read every key once.
    pub async fn load(db: &Database) -> Result<Self> {
        let pairs: HashMap<String, String> = db.preferences().await?.into_iter().collect();
        Ok(Self::from_pairs(&pairs))
    }

    /// Write the given keys in one transaction. Unset values are skipped.
    pub async fn save(&self, db: &Database, keys: &[PrefKey]) -> Result<()> {
        db.set_preferences(&self.pairs_for(keys)).await
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

fn parse_id_list(raw: &str) -> Option<Vec<i64>> {
    serde_json::from_str(raw).ok()
}

fn encode_ids(ids: impl IntoIterator<Item = i64>) -> String {
    let ids: Vec<i64> = ids.into_iter().collect();
    serde_json::to_string(&ids).unwrap_or_else(|_| "[]".to_string())
}

fn clamp_width(px: i64) -> u16 {
    px.clamp(i64::from(SIDEBAR_MIN_WIDTH), i64::from(SIDEBAR_MAX_WIDTH)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pairs(items: &[(&str, &str)]) -> HashMap<String, String> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_empty() {
        let prefs = UiPreferences::from_pairs(&HashMap::new());
        assert_eq!(prefs, UiPreferences::default());
        assert_eq!(prefs.sidebar_width, 280);
        assert_eq!(prefs.sort_order, SortOrder::Name);
        assert_eq!(prefs.expanded_nodes, None);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let prefs = UiPreferences::from_pairs(&pairs(&[
            ("filter.selected_tags", "[1, \"x\"]"),
            ("filter.only_favorites", "yes"),
            ("filter.sort_order", "random"),
            ("tree.expanded_nodes", "{not json"),
            ("selection.last_article_id", "abc"),
            ("sidebar.width", "wide"),
        ]));
        assert_eq!(prefs, UiPreferences::default());
    }

    #[test]
    fn test_sidebar_width_clamped() {
        let narrow = UiPreferences::from_pairs(&pairs(&[("sidebar.width", "20")]));
        assert_eq!(narrow.sidebar_width, SIDEBAR_MIN_WIDTH);
        let wide = UiPreferences::from_pairs(&pairs(&[("sidebar.width", "9000")]));
        assert_eq!(wide.sidebar_width, SIDEBAR_MAX_WIDTH);
        let ok = UiPreferences::from_pairs(&pairs(&[("sidebar.width", "320")]));
        assert_eq!(ok.sidebar_width, 320);
    }

    #[test]
    fn test_pairs_round_trip() {
        let prefs = UiPreferences {
            selected_tag_ids: BTreeSet::from([3, 1]),
            only_favorites: true,
            show_archived: true,
            sort_order: SortOrder::LikesDesc,
            expanded_nodes: Some(HashSet::from([5, 2])),
            last_article_id: Some(42),
            sidebar_collapsed: true,
            sidebar_width: 400,
            search_in_content: true,
        };
        let stored = prefs.to_pairs();
        assert_eq!(stored["filter.selected_tags"], "[1,3]");
        assert_eq!(stored["tree.expanded_nodes"], "[2,5]");
        assert_eq!(stored["filter.only_favorites"], "1");
        assert_eq!(UiPreferences::from_pairs(&stored), prefs);
    }

    #[test]
    fn test_unset_values_not_encoded() {
        let stored = UiPreferences::default().to_pairs();
        assert!(!stored.contains_key("tree.expanded_nodes"));
        assert!(!stored.contains_key("selection.last_article_id"));
        assert_eq!(stored["sidebar.width"], "280");
    }

    #[test]
    fn test_filter_state_excludes_query() {
        let mut prefs = UiPreferences::default();
        let mut state = prefs.filter_state();
        state.search_query = "draft".into();
        state.only_favorites = true;
        prefs.update_filter(&state);
        assert!(prefs.only_favorites);
        assert_eq!(prefs.filter_state().search_query, "");
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let db = Database::open(":memory:").await.unwrap();
        let mut prefs = UiPreferences::default();
        prefs.sort_order = SortOrder::ViewsDesc;
        prefs.set_sidebar_width(1000);
        prefs.last_article_id = Some(9);
        prefs.save(&db, &PrefKey::ALL).await.unwrap();

        let loaded = UiPreferences::load(&db).await.unwrap();
        assert_eq!(loaded, prefs);
        assert_eq!(loaded.sidebar_width, 600);
    }
}
