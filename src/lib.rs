//! Terminal browser for a hierarchical knowledge base.
//!
//! - [`storage`]: SQLite record service (articles, tags, favorites, likes,
//!   comments, view counts, preferences, seed import)
//! - [`knowledge`]: client-held article store, filter pass, tree and
//!   selection views, preference mapping and article actions
//! - [`app`] and [`ui`]: terminal state machine and ratatui rendering

pub mod app;
pub mod config;
pub mod knowledge;
pub mod storage;
pub mod ui;
pub mod util;
