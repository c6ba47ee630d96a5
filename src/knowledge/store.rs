use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;

use super::text::search_text;
use super::Article;
use crate::storage::{ArticleRecord, Database, LikeState, Tag};

/// Upper bound on bodies fetched in one search prefetch.
pub const CONTENT_BATCH_LIMIT: usize = 200;

/// Cached article body.
///
/// `text` is the lower-cased search text; `None` until extraction finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEntry {
    pub html: Arc<str>,
    pub text: Option<Arc<str>>,
}

impl ContentEntry {
    /// Entry with text extracted up front.
    pub fn extracted(html: &str) -> Self {
        Self {
            html: Arc::from(html),
            text: Some(Arc::from(search_text(html))),
        }
    }
}

pub type ContentCache = HashMap<i64, ContentEntry>;

// ============================================================================
// ArticleStore
// ============================================================================

/// Snapshot of the knowledge base plus the body cache.
///
/// The id index is rebuilt once per [`load`](Self::load) and reused by every
/// ancestor walk.
#[derive(Debug, Default)]
pub struct ArticleStore {
    articles: Vec<Article>,
    index: HashMap<i64, usize>,
    tags: Vec<Tag>,
    tag_names: HashMap<i64, String>,
    favorites: HashSet<i64>,
    content: ContentCache,
}

impl ArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from already-fetched parts.
    pub fn from_parts(records: Vec<ArticleRecord>, tags: Vec<Tag>, favorites: Vec<i64>) -> Self {
        let mut store = Self::new();
        store.replace(records, tags, favorites);
        store
    }

    /// Fetch tags, published articles and the user's favorites, then replace
    /// the snapshot wholesale.
    ///
    /// On error the previous snapshot is untouched.
    pub async fn load(&mut self, db: &Database, user_id: i64) -> Result<()> {
        let (tags, records, favorites) = futures::try_join!(
            db.tags(),
            db.published_articles(),
            db.favorite_article_ids(user_id)
        )?;
        tracing::info!(
            articles = records.len(),
            tags = tags.len(),
            favorites = favorites.len(),
            "Knowledge base loaded"
        );
        self.replace(records, tags, favorites);
        Ok(())
    }

    /// Swap in a new snapshot. The body cache survives; callers invalidate
    /// individual entries when they know a body changed.
    pub fn replace(&mut self, records: Vec<ArticleRecord>, tags: Vec<Tag>, favorites: Vec<i64>) {
        self.tag_names = tags.iter().map(|t| (t.id, t.name.clone())).collect();
        self.tags = tags;
        self.articles = records
            .into_iter()
            .map(|r| {
                let names = self.names_for(&r.tag_ids);
                Article::from_record(r, names)
            })
            .collect();
        self.favorites = favorites.into_iter().collect();
        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .articles
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id, i))
            .collect();
    }

    fn names_for(&self, tag_ids: &[i64]) -> Vec<String> {
        tag_ids
            .iter()
            .map(|id| self.tag_names.get(id).cloned().unwrap_or_default())
            .collect()
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn get(&self, id: i64) -> Option<&Article> {
        self.index.get(&id).map(|&i| &self.articles[i])
    }

    pub fn contains(&self, id: i64) -> bool {
        self.index.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn tag_name(&self, id: i64) -> Option<&str> {
        self.tag_names.get(&id).map(String::as_str)
    }

    pub fn favorites(&self) -> &HashSet<i64> {
        &self.favorites
    }

    pub fn is_favorite(&self, id: i64) -> bool {
        self.favorites.contains(&id)
    }

    /// Ancestor ids of `id`, nearest first.
    ///
    /// The walk stops at a missing parent or when an id repeats, so corrupt
    /// parent chains cannot loop.
    pub fn ancestors(&self, id: i64) -> Vec<i64> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut next = self.get(id).and_then(|a| a.parent_id);
        while let Some(parent_id) = next {
            let Some(parent) = self.get(parent_id) else {
                break;
            };
            if !seen.insert(parent_id) {
                tracing::warn!(article_id = id, parent_id, "Parent cycle detected");
                break;
            }
            chain.push(parent_id);
            next = parent.parent_id;
        }
        chain
    }

    /// `id` and everything below it.
    pub fn descendants(&self, id: i64) -> HashSet<i64> {
        let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
        for a in &self.articles {
            if let Some(p) = a.parent_id {
                children.entry(p).or_default().push(a.id);
            }
        }
        let mut out = HashSet::from([id]);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            for &child in children.get(&current).into_iter().flatten() {
                if out.insert(child) {
                    stack.push(child);
                }
            }
        }
        out
    }

    // ========================================================================
    // Content Cache
    // ========================================================================

    pub fn content_cache(&self) -> &ContentCache {
        &self.content
    }

    pub fn content(&self, id: i64) -> Option<&ContentEntry> {
        self.content.get(&id)
    }

    /// Cached body, or fetch and cache `{html, text: None}`.
    ///
    /// The caller extracts text off the render path and hands it back with
    /// [`complete_text`](Self::complete_text).
    pub async fn get_content(&mut self, db: &Database, id: i64) -> Result<ContentEntry> {
        if let Some(entry) = self.content.get(&id) {
            return Ok(entry.clone());
        }
        let html = Self::fetch_content(db, id).await?;
        Ok(self.cache_html(id, &html))
    }

    /// Read one body from the record service. A missing body is empty.
    ///
    /// Split from [`get_content`](Self::get_content) so a background task
    /// can fetch without holding the store.
    pub async fn fetch_content(db: &Database, id: i64) -> Result<String> {
        Ok(db.article_content(id).await?.unwrap_or_default())
    }

    /// Store a freshly fetched body without search text.
    pub fn cache_html(&mut self, id: i64, html: &str) -> ContentEntry {
        let entry = ContentEntry {
            html: Arc::from(html),
            text: None,
        };
        self.content.insert(id, entry.clone());
        entry
    }

    /// Fill in the search text of an existing entry. Ignored when the entry
    /// was invalidated in the meantime.
    pub fn complete_text(&mut self, id: i64, text: String) {
        if let Some(entry) = self.content.get_mut(&id) {
            entry.text = Some(Arc::from(text));
        }
    }

    /// Up to `limit` ids from `ids` that have no cache entry.
    pub fn uncached(&self, ids: impl IntoIterator<Item = i64>, limit: usize) -> Vec<i64> {
        ids.into_iter()
            .filter(|id| !self.content.contains_key(id))
            .take(limit)
            .collect()
    }

    /// Fetch bodies for up to [`CONTENT_BATCH_LIMIT`] uncached ids in one
    /// batch, with text extracted. Returns how many entries were added.
    ///
    /// A failed batch is logged and leaves the cache as is.
    pub async fn prefetch_for_search(&mut self, db: &Database, ids: &[i64]) -> usize {
        let missing = self.uncached(ids.iter().copied(), CONTENT_BATCH_LIMIT);
        if missing.is_empty() {
            return 0;
        }
        match Self::fetch_batch(db, &missing).await {
            Ok(entries) => self.insert_extracted(entries),
            Err(e) => {
                tracing::warn!(error = %e, count = missing.len(), "Content batch read failed");
                0
            }
        }
    }

    /// Read a batch of bodies and extract their search text on the blocking
    /// pool. The result goes back in through
    /// [`insert_extracted`](Self::insert_extracted).
    pub async fn fetch_batch(db: &Database, ids: &[i64]) -> Result<Vec<(i64, ContentEntry)>> {
        let rows = db.article_contents(ids).await?;
        let entries: Vec<(i64, ContentEntry)> = tokio::task::spawn_blocking(move || {
            rows.into_iter()
                .map(|(id, html)| (id, ContentEntry::extracted(&html)))
                .collect()
        })
        .await?;
        Ok(entries)
    }

    /// Insert entries that already carry search text.
    pub fn insert_extracted(&mut self, entries: impl IntoIterator<Item = (i64, ContentEntry)>) -> usize {
        let mut added = 0;
        for (id, entry) in entries {
            self.content.insert(id, entry);
            added += 1;
        }
        added
    }

    pub fn invalidate_content(&mut self, id: i64) {
        self.content.remove(&id);
    }

    // ========================================================================
    // In-place Updates
    // ========================================================================
    //
    // Each mirrors a successful write so the snapshot stays current without a
    // full reload. Unknown ids are ignored.

    fn get_mut(&mut self, id: i64) -> Option<&mut Article> {
        let i = *self.index.get(&id)?;
        self.articles.get_mut(i)
    }

    pub fn rename(&mut self, id: i64, name: &str) {
        if let Some(a) = self.get_mut(id) {
            a.name = name.to_string();
        }
    }

    pub fn set_parent(&mut self, id: i64, parent_id: Option<i64>) {
        if let Some(a) = self.get_mut(id) {
            a.parent_id = parent_id;
        }
    }

    pub fn set_tags(&mut self, id: i64, tag_ids: Vec<i64>) {
        let names = self.names_for(&tag_ids);
        if let Some(a) = self.get_mut(id) {
            a.tag_ids = tag_ids;
            a.tag_names = names;
        }
    }

    pub fn set_active(&mut self, id: i64, active: bool) {
        if let Some(a) = self.get_mut(id) {
            a.active = active;
        }
    }

    pub fn set_likes(&mut self, id: i64, likes: LikeState) {
        if let Some(a) = self.get_mut(id) {
            a.like_count = likes.like_count;
            a.liked_by_ids = likes.liked_by_ids;
        }
    }

    pub fn set_view_count(&mut self, id: i64, count: i64) {
        if let Some(a) = self.get_mut(id) {
            a.view_count = count;
        }
    }

    pub fn set_favorite(&mut self, id: i64, favorite: bool) {
        if favorite {
            self.favorites.insert(id);
        } else {
            self.favorites.remove(&id);
        }
    }

    /// Add a newly created article, or replace the record with the same id.
    pub fn insert(&mut self, record: ArticleRecord) {
        let names = self.names_for(&record.tag_ids);
        let article = Article::from_record(record, names);
        match self.index.get(&article.id) {
            Some(&i) => self.articles[i] = article,
            None => {
                self.index.insert(article.id, self.articles.len());
                self.articles.push(article);
            }
        }
    }
}
