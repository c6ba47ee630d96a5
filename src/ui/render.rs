//! Render functions for the TUI.
//!
//! This module lays out the sidebar, reader and status bar, then draws any
//! overlay on top.

use crate::app::App;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    widgets::Paragraph,
    Frame,
};

use super::{dialogs, help, reader, sidebar, status};

/// Minimum terminal dimensions required for normal operation.
pub(super) const MIN_WIDTH: u16 = 60;
pub(super) const MIN_HEIGHT: u16 = 10;

/// Columns always left to the reader when the sidebar is wide.
const MIN_READER_WIDTH: u16 = 30;

/// Main render dispatch function.
pub(super) fn render(f: &mut Frame, app: &App) {
    let area = f.area();

    // Guard against zero-width/height to prevent panics
    if area.width < 1 || area.height < 1 {
        return;
    }

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = if area.height < 3 || area.width < 20 {
            Paragraph::new("Too small")
        } else {
            Paragraph::new(format!(
                "Terminal too small\n\nMinimum: {}x{}\nCurrent: {}x{}",
                MIN_WIDTH, MIN_HEIGHT, area.width, area.height
            ))
            .alignment(Alignment::Center)
        };
        f.render_widget(msg, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    render_main_panels(f, app, chunks[0]);
    status::render(f, app, chunks[1]);

    if let Some(modal) = &app.modal {
        dialogs::render(f, app, modal);
    }

    if app.show_help {
        help::render(f, app);
    }
}

/// Sidebar at its persisted width, reader taking the rest.
fn render_main_panels(f: &mut Frame, app: &App, area: Rect) {
    if app.prefs.sidebar_collapsed {
        reader::render(f, app, area);
        return;
    }

    let sidebar_width = app
        .sidebar_columns()
        .min(area.width.saturating_sub(MIN_READER_WIDTH));
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(sidebar_width), Constraint::Min(0)])
        .split(area);

    sidebar::render(f, app, chunks[0]);
    reader::render(f, app, chunks[1]);
}

/// Rectangle of at most `width` x `height` centered in `area`.
pub(super) fn centered(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::knowledge::deep_link::DeepLink;
    use crate::storage::{Database, SeedFile};
    use ratatui::{backend::TestBackend, Terminal};

    const SEED: &str = r#"{
        "users": [{"id": 1, "name": "Ada"}],
        "tags": [{"id": 1, "name": "ops"}],
        "articles": [
            {"id": 1, "name": "Handbook", "create_uid": 1},
            {"id": 2, "name": "Deploy guide", "parent_id": 1, "tag_ids": [1], "create_uid": 1}
        ]
    }"#;

    async fn mounted_app() -> App {
        let db = Database::open(":memory:").await.unwrap();
        let seed: SeedFile = serde_json::from_str(SEED).unwrap();
        db.import_seed(&seed).await.unwrap();
        let mut app = App::new(db, Config::default(), DeepLink::default());
        app.store.load(&app.db, 1).await.unwrap();
        app.mount();
        app
    }

    fn draw(app: &App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| render(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[tokio::test]
    async fn test_render_tree_and_breadcrumb() {
        let app = mounted_app().await;
        let screen = draw(&app, 100, 20);
        assert!(screen.contains("Handbook"));
        assert!(screen.contains("Deploy guide"));
        assert!(screen.contains("Handbook / Deploy guide"));
    }

    #[tokio::test]
    async fn test_render_too_small() {
        let app = mounted_app().await;
        let screen = draw(&app, 40, 8);
        assert!(screen.contains("Terminal too small"));
    }

    #[tokio::test]
    async fn test_render_collapsed_sidebar_and_dialog() {
        let mut app = mounted_app().await;
        app.toggle_sidebar();
        app.modal = Some(crate::app::Modal::Rename {
            article_id: 2,
            input: "Deploy".into(),
        });
        let screen = draw(&app, 100, 20);
        assert!(screen.contains("Rename Article"));
        assert!(screen.contains("> Deploy_"));
    }

    #[tokio::test]
    async fn test_render_help_overlay() {
        let mut app = mounted_app().await;
        app.show_help = true;
        let screen = draw(&app, 100, 40);
        assert!(screen.contains("Expand all"));
    }
}
