use crate::app::{App, Focus};
use crate::knowledge::tree::Highlight;
use crate::util::{display_width, truncate_to_width};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

const MATCH_STYLE: Style = Style::new().fg(Color::Yellow).add_modifier(Modifier::BOLD);

/// Render the article tree panel
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }

    let is_focused = app.focus == Focus::Tree;
    let inner_width = area.width.saturating_sub(2) as usize;
    let current = app.selection.current();
    let rows = app.rows();

    let items: Vec<ListItem> = if rows.is_empty() {
        vec![ListItem::new(Line::from(Span::styled(
            "No matching articles",
            Style::default().fg(Color::DarkGray),
        )))]
    } else {
        rows.iter()
            .map(|row| {
                let node = row.node;
                let marker = match (node.has_children, node.expanded) {
                    (true, true) => "▾ ",
                    (true, false) => "▸ ",
                    (false, _) => "  ",
                };
                let indent = "  ".repeat(row.depth);

                let mut base = Style::default();
                if !node.active {
                    base = base.fg(Color::DarkGray).add_modifier(Modifier::ITALIC);
                } else if node.tag_match {
                    base = base.fg(Color::Green);
                }
                if Some(node.id) == current {
                    base = base.add_modifier(Modifier::BOLD);
                }

                let mut spans = vec![Span::raw(format!("{indent}{marker}"))];
                if app.store.is_favorite(node.id) {
                    spans.push(Span::styled("★ ", Style::default().fg(Color::Yellow)));
                }
                let used = indent.len() + 4;
                let name_width = inner_width.saturating_sub(used);
                match &node.name_match {
                    Some(h) if highlight_width(h) <= name_width => {
                        spans.extend(highlight_spans(h, base));
                    }
                    _ => spans.push(Span::styled(
                        truncate_to_width(&node.name, name_width).into_owned(),
                        base,
                    )),
                }

                let mut lines = vec![Line::from(spans)];
                if let Some(snippet) = &node.snippet {
                    let mut snippet_spans = vec![Span::raw(format!("{indent}    "))];
                    snippet_spans.extend(snippet_line(snippet, name_width));
                    lines.push(Line::from(snippet_spans));
                }
                ListItem::new(Text::from(lines))
            })
            .collect()
    };

    let border_style = if is_focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(title(app)),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));

    let mut state = ListState::default();
    let cursor_index = app
        .cursor
        .and_then(|id| rows.iter().position(|r| r.node.id == id));
    state.select(cursor_index);

    f.render_stateful_widget(list, area, &mut state);
}

/// Panel title with the active filters.
fn title(app: &App) -> String {
    let filter = &app.filter;
    let mut parts = vec![format!("Articles ({})", app.visible.len())];
    if !filter.selected_tag_ids.is_empty() {
        let names: Vec<&str> = filter
            .selected_tag_ids
            .iter()
            .filter_map(|id| app.store.tag_name(*id))
            .collect();
        parts.push(format!("#{}", names.join(",#")));
    }
    if filter.only_favorites {
        parts.push("★".to_string());
    }
    if filter.show_archived {
        parts.push("+archived".to_string());
    }
    if !filter.search_query.trim().is_empty() {
        let scope = if filter.search_in_content { "body" } else { "title" };
        parts.push(format!("{scope}:\"{}\"", filter.search_query.trim()));
    }
    parts.push(filter.sort_order.label().to_string());
    parts.join(" ")
}

fn highlight_spans(h: &Highlight, base: Style) -> Vec<Span<'static>> {
    vec![
        Span::styled(h.before.clone(), base),
        Span::styled(h.matched.clone(), base.patch(MATCH_STYLE)),
        Span::styled(h.after.clone(), base),
    ]
}

/// Dimmed "...context [match] context..." line, trimmed to `width`.
fn snippet_line(h: &Highlight, width: usize) -> Vec<Span<'static>> {
    let dim = Style::default().fg(Color::DarkGray);
    let before = format!("...{}", h.before);
    if highlight_width(h) + 6 <= width {
        return vec![
            Span::styled(before, dim),
            Span::styled(h.matched.clone(), MATCH_STYLE),
            Span::styled(format!("{}...", h.after), dim),
        ];
    }
    vec![Span::styled(
        truncate_to_width(&h.to_marked_string(), width).into_owned(),
        dim,
    )]
}

fn highlight_width(h: &Highlight) -> usize {
    display_width(&h.before) + display_width(&h.matched) + display_width(&h.after)
}
