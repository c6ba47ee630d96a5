//! Help overlay: scrollable keybinding table grouped by pane.

use crate::app::App;
use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table},
    Frame,
};

const SECTIONS: &[(&str, &[(&str, &str)])] = &[
    (
        "General",
        &[
            ("?", "Toggle help"),
            ("q / Ctrl+c", "Quit"),
            ("Tab", "Switch between tree and reader"),
            ("b", "Collapse or show sidebar"),
            ("< / >", "Narrow or widen sidebar"),
        ],
    ),
    (
        "Filters",
        &[
            ("/", "Search titles (or bodies)"),
            ("c", "Toggle search in article bodies"),
            ("t", "Filter by tags"),
            ("f", "Only favorites"),
            ("a", "Show archived articles"),
            ("s", "Cycle sort order"),
            ("x", "Clear tag, favorite and archive filters"),
        ],
    ),
    (
        "Tree",
        &[
            ("j/k", "Move cursor"),
            ("Enter", "Open article"),
            ("l / Right", "Expand"),
            ("h / Left", "Collapse or go to parent"),
            ("Space", "Toggle expand"),
            ("E", "Expand all"),
            ("C", "Collapse all"),
        ],
    ),
    (
        "Articles",
        &[
            ("n", "New child article"),
            ("N", "New top-level article"),
            ("r", "Rename"),
            ("y", "Copy"),
            ("m", "Move under another article"),
            ("T", "Edit tags"),
            ("A", "Archive or restore"),
            ("L", "Like or unlike"),
            ("F", "Favorite or unfavorite"),
            ("R", "Comment (reply to highlighted)"),
        ],
    ),
    (
        "Reader",
        &[
            ("j/k", "Scroll"),
            ("PgUp/PgDn", "Scroll a page"),
            ("J/K", "Highlight next or previous comment"),
        ],
    ),
];

/// Render the help overlay on top of the current view.
pub fn render(f: &mut Frame, app: &App) {
    let overlay = centered_rect(80, 80, f.area());
    if overlay.width < 20 || overlay.height < 6 {
        return;
    }

    f.render_widget(Clear, overlay);

    let mut rows: Vec<Row> = Vec::new();
    for (label, bindings) in SECTIONS {
        rows.push(
            Row::new(vec![
                Line::from(Span::styled(
                    format!("-- {} --", label),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
            ])
            .style(Style::default().fg(Color::Cyan)),
        );
        for (key, description) in *bindings {
            rows.push(Row::new(vec![format!("  {}", key), description.to_string()]));
        }
        rows.push(Row::new(vec![String::new(), String::new()]));
    }
    rows.pop();

    let total_rows = rows.len();
    let visible_height = overlay.height.saturating_sub(3) as usize; // -2 border -1 header
    let max_scroll = total_rows.saturating_sub(visible_height);
    let scroll = app.help_scroll_offset.min(max_scroll);
    let visible_rows: Vec<Row> = rows.into_iter().skip(scroll).take(visible_height).collect();

    let title = if max_scroll > 0 {
        format!(
            " Help ({}/{}) ",
            scroll.saturating_add(1),
            max_scroll.saturating_add(1)
        )
    } else {
        " Help (? to close) ".to_string()
    };

    let widths = [Constraint::Length(16), Constraint::Min(20)];
    let table = Table::new(visible_rows, widths)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(title),
        )
        .header(
            Row::new(vec!["Key", "Action"])
                .style(
                    Style::default()
                        .add_modifier(Modifier::BOLD)
                        .add_modifier(Modifier::UNDERLINED),
                )
                .bottom_margin(1),
        );

    f.render_widget(table, overlay);

    if max_scroll > 0 && scroll < max_scroll {
        let hint = Line::from(Span::styled(
            " j/k to scroll, ? or Esc to close ",
            Style::default().fg(Color::DarkGray),
        ));
        let hint_area = Rect {
            x: overlay.x + 1,
            y: overlay.y + overlay.height.saturating_sub(1),
            width: overlay.width.saturating_sub(2),
            height: 1,
        };
        f.render_widget(Paragraph::new(hint), hint_area);
    }
}

/// Create a centered rectangle with the given percentage of the parent area.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let width = area.width * percent_x / 100;
    let height = area.height * percent_y / 100;
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}
