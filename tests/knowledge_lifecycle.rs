//! Integration tests for the knowledge base lifecycle: import, filter, edit,
//! archive and preference persistence.
//!
//! Each test creates its own in-memory SQLite database for isolation.

use kbrowse::app::{ActionOutcome, App};
use kbrowse::config::Config;
use kbrowse::knowledge::deep_link::DeepLink;
use kbrowse::knowledge::prefs::{PrefKey, UiPreferences};
use kbrowse::knowledge::{
    actions, comments, filter, ArticleStore, FilterState, KnowledgeError,
    Projection, SelectionOutcome, SortOrder, Unavailable,
};
use kbrowse::storage::{Database, SeedFile};
use pretty_assertions::assert_eq;

const SEED: &str = r#"{
    "users": [
        {"id": 1, "name": "Ada"},
        {"id": 2, "name": "Grace", "is_admin": true},
        {"id": 3, "name": "Linus"}
    ],
    "tags": [{"id": 1, "name": "ops"}, {"id": 2, "name": "howto"}],
    "articles": [
        {"id": 1, "name": "Engineering", "create_uid": 1, "create_date": 100},
        {"id": 2, "name": "Deployments", "parent_id": 1, "tag_ids": [1],
         "content": "<p>We deploy with <b>Kubernetes</b> &amp; Helm.</p>",
         "create_uid": 1, "create_date": 200},
        {"id": 3, "name": "Rollback", "parent_id": 2, "tag_ids": [1, 2],
         "content": "<p>Revert the release.</p>", "create_uid": 3, "create_date": 300},
        {"id": 4, "name": "Legacy", "active": false, "create_uid": 1},
        {"id": 5, "name": "Legacy child", "parent_id": 4, "create_uid": 1},
        {"id": 6, "name": "Draft", "is_published": false, "create_uid": 1}
    ],
    "favorites": [{"user_id": 1, "article_id": 3}],
    "comments": [
        {"id": 1, "article_id": 2, "author_id": 1, "body": "Looks good", "date": 10},
        {"id": 2, "article_id": 2, "parent_id": 1, "author_id": 3, "body": "Agreed", "date": 20},
        {"id": 3, "article_id": 2, "parent_id": 99, "author_id": 3, "body": "Orphan", "date": 30}
    ]
}"#;

async fn seeded_db() -> Database {
    let db = Database::open(":memory:").await.unwrap();
    let seed: SeedFile = serde_json::from_str(SEED).unwrap();
    let summary = db.import_seed(&seed).await.unwrap();
    assert_eq!(summary.articles, 6);
    db
}

async fn loaded_store(db: &Database, user_id: i64) -> ArticleStore {
    let mut store = ArticleStore::new();
    store.load(db, user_id).await.unwrap();
    store
}

fn visible_ids(store: &ArticleStore, state: &FilterState) -> Vec<i64> {
    let mut projection = Projection::default();
    filter::apply(store, state, &mut projection)
        .iter()
        .map(|a| a.id)
        .collect()
}

// ============================================================================
// Load and Filter
// ============================================================================

#[tokio::test]
async fn test_load_skips_unpublished_and_marks_favorites() {
    let db = seeded_db().await;
    let store = loaded_store(&db, 1).await;
    assert!(!store.contains(6));
    assert!(store.contains(4));
    assert!(store.is_favorite(3));
    assert_eq!(store.get(3).unwrap().tag_names, vec!["ops", "howto"]);
}

#[tokio::test]
async fn test_tag_filter_keeps_ancestors() {
    let db = seeded_db().await;
    let store = loaded_store(&db, 1).await;
    let mut state = FilterState::default();
    state.toggle_tag(2);
    // Rollback matches; its ancestors come along
    assert_eq!(visible_ids(&store, &state), vec![2, 1, 3]);
}

#[tokio::test]
async fn test_archived_parent_hidden_child_becomes_root() {
    let db = seeded_db().await;
    let store = loaded_store(&db, 1).await;
    let state = FilterState::default();
    let visible = visible_ids(&store, &state);
    assert!(visible.contains(&5));
    assert!(!visible.contains(&4));

    let state = FilterState {
        show_archived: true,
        ..FilterState::default()
    };
    assert!(visible_ids(&store, &state).contains(&4));
}

#[tokio::test]
async fn test_content_search_after_batch_fetch() {
    let db = seeded_db().await;
    let mut store = loaded_store(&db, 1).await;
    let state = FilterState {
        search_query: "helm".into(),
        search_in_content: true,
        ..FilterState::default()
    };

    // Nothing cached yet: every non-matching title needs its body
    let missing = filter::missing_content_ids(&store, &state, 200);
    assert_eq!(missing.len(), 4);
    assert!(visible_ids(&store, &state).is_empty());

    assert_eq!(store.prefetch_for_search(&db, &missing).await, 4);
    assert!(store
        .content(2)
        .and_then(|c| c.text.as_deref())
        .is_some_and(|t| t.contains("kubernetes & helm")));
    assert!(filter::missing_content_ids(&store, &state, 200).is_empty());
    assert_eq!(visible_ids(&store, &state), vec![2, 1]);
}

#[tokio::test]
async fn test_sort_by_creation_date() {
    let db = seeded_db().await;
    let store = loaded_store(&db, 1).await;
    let state = FilterState {
        sort_order: SortOrder::CreatedDesc,
        ..FilterState::default()
    };
    let visible = visible_ids(&store, &state);
    assert_eq!(&visible[..3], &[3, 2, 1]);
}

// ============================================================================
// Actions
// ============================================================================

#[tokio::test]
async fn test_create_rename_copy_move() {
    let db = seeded_db().await;
    let mut store = loaded_store(&db, 1).await;

    let created = actions::create_article(&db, 1, "  Runbooks ", Some(1)).await.unwrap();
    assert_eq!(created.name, "Runbooks");
    assert_eq!(created.parent_id, Some(1));
    store.insert(created.clone());

    let renamed = actions::rename_article(&db, 1, created.id, "Runbooks", "On-call runbooks")
        .await
        .unwrap();
    assert_eq!(renamed.as_deref(), Some("On-call runbooks"));
    let unchanged = actions::rename_article(&db, 1, created.id, "On-call runbooks", "On-call runbooks")
        .await
        .unwrap();
    assert_eq!(unchanged, None);

    let copy = actions::copy_article(&db, 1, 3, &actions::copy_name("Rollback")).await.unwrap();
    assert_eq!(copy.name, "Rollback (copy)");
    assert_eq!(copy.parent_id, Some(2));
    assert_eq!(copy.tag_ids, vec![1, 2]);
    assert_eq!(
        db.article_content(copy.id).await.unwrap().as_deref(),
        Some("<p>Revert the release.</p>")
    );

    assert!(matches!(
        actions::validate_move(&store, 1, Some(3)),
        Err(KnowledgeError::InvalidMove)
    ));
    actions::validate_move(&store, 3, None).unwrap();
    actions::move_article(&db, 1, 3, None).await.unwrap();
    assert_eq!(db.article(3).await.unwrap().unwrap().parent_id, None);
}

#[tokio::test]
async fn test_empty_titles_rejected_without_write() {
    let db = seeded_db().await;
    let before = db.published_articles().await.unwrap().len();
    assert!(matches!(
        actions::create_article(&db, 1, "   ", None).await,
        Err(KnowledgeError::EmptyTitle)
    ));
    assert!(matches!(
        actions::post_comment(&db, 1, 2, None, "\n ").await,
        Err(KnowledgeError::EmptyComment)
    ));
    assert_eq!(db.published_articles().await.unwrap().len(), before);
}

#[tokio::test]
async fn test_archive_permission_owner_admin_other() {
    let db = seeded_db().await;
    // Owner
    actions::check_archive_permission(&db, 1, 2).await.unwrap();
    // Admin
    actions::check_archive_permission(&db, 2, 2).await.unwrap();
    // Neither
    assert!(matches!(
        actions::check_archive_permission(&db, 3, 2).await,
        Err(KnowledgeError::NotPermitted)
    ));
    assert!(matches!(
        actions::set_archived(&db, 3, 2, true).await,
        Err(KnowledgeError::NotPermitted)
    ));
    assert!(db.article(2).await.unwrap().unwrap().active);

    actions::set_archived(&db, 1, 2, true).await.unwrap();
    assert!(!db.article(2).await.unwrap().unwrap().active);
    actions::set_archived(&db, 2, 2, false).await.unwrap();
    assert!(db.article(2).await.unwrap().unwrap().active);
}

#[tokio::test]
async fn test_comment_threads_promote_orphans() {
    let db = seeded_db().await;
    let posted = actions::post_comment(&db, 3, 2, Some(2), "Me too").await.unwrap();
    assert_eq!(posted.parent_id, Some(2));

    let messages = db.article_messages(2).await.unwrap();
    let threads = comments::thread(messages);
    let flat: Vec<(usize, &str)> = comments::flatten(&threads)
        .into_iter()
        .map(|(depth, m)| (depth, m.body.as_str()))
        .collect();
    assert_eq!(
        flat,
        vec![(0, "Looks good"), (1, "Agreed"), (2, "Me too"), (0, "Orphan")]
    );
}

#[tokio::test]
async fn test_like_and_favorite_toggle() {
    let db = seeded_db().await;
    let liked = db.toggle_like(2, 3).await.unwrap();
    assert_eq!(liked.like_count, 1);
    assert_eq!(liked.liked_by_ids, vec![3]);
    let unliked = db.toggle_like(2, 3).await.unwrap();
    assert_eq!(unliked.like_count, 0);

    assert!(db.toggle_favorite(2, 1).await.unwrap());
    let store = loaded_store(&db, 1).await;
    assert!(store.is_favorite(2));
    assert!(!db.toggle_favorite(2, 1).await.unwrap());
}

// ============================================================================
// Application State
// ============================================================================

#[tokio::test]
async fn test_preferences_survive_restart() {
    let db = seeded_db().await;
    let mut app = App::new(db.clone(), Config::default(), DeepLink::default());
    app.store.load(&db, 1).await.unwrap();
    app.mount();

    let keys = app.toggle_filter_tag(1);
    app.refilter();
    app.prefs.save(&db, keys).await.unwrap();
    app.collapse_all();
    app.prefs.save(&db, &[PrefKey::ExpandedNodes]).await.unwrap();
    let selected = app.selection.current();
    app.prefs.save(&db, &[PrefKey::LastArticleId]).await.unwrap();

    let prefs = UiPreferences::load(&db).await.unwrap();
    assert_eq!(prefs.selected_tag_ids.iter().copied().collect::<Vec<_>>(), vec![1]);
    assert_eq!(prefs.last_article_id, selected);

    let mut restarted = App::new(db.clone(), Config::default(), DeepLink::default());
    restarted.apply_preferences(prefs);
    restarted.store.load(&db, 1).await.unwrap();
    let outcome = restarted.mount();
    assert_eq!(restarted.filter.selected_tag_ids, app.filter.selected_tag_ids);
    assert!(matches!(outcome, SelectionOutcome::Selected { id, .. } if Some(id) == selected));
}

#[tokio::test]
async fn test_deep_link_to_archived_article() {
    let db = seeded_db().await;
    let mut app = App::new(
        db.clone(),
        Config::default(),
        DeepLink::parse("#action=knowledge?article_id=4"),
    );
    app.store.load(&db, 1).await.unwrap();
    assert_eq!(
        app.mount(),
        SelectionOutcome::Unavailable(Unavailable::Archived)
    );
}

#[tokio::test]
async fn test_selection_rewrites_deep_link() {
    let db = seeded_db().await;
    let mut app = App::new(db.clone(), Config::default(), DeepLink::default());
    app.store.load(&db, 1).await.unwrap();
    app.mount();
    app.select(Some(3));
    assert_eq!(app.selection.link().as_str(), "#action=knowledge?article_id=3");
    assert_eq!(app.selection.breadcrumb(), &[1, 2, 3]);

    let changed = app.apply_outcome(ActionOutcome::ArchiveChanged {
        article_id: 3,
        archived: true,
    });
    assert!(matches!(changed, Some(SelectionOutcome::Selected { .. })));
    assert_ne!(app.selection.current(), Some(3));
}
