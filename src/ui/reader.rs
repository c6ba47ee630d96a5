use crate::app::{App, Focus, ReaderState};
use crate::knowledge::comments;
use crate::knowledge::Article;
use crate::util::relative_time;
use chrono::Utc;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

/// Render the article reader: breadcrumb, metadata, body and comments.
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    // Layout may produce zero-sized rects during extreme terminal resizes
    if area.width < 3 || area.height < 3 {
        return;
    }

    let border_style = if app.focus == Focus::Reader {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title("Reader");

    let article = match &app.reader {
        ReaderState::Placeholder(reason) => {
            let paragraph = Paragraph::new(reason.message())
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            f.render_widget(paragraph, area);
            return;
        }
        ReaderState::Loading { article_id }
        | ReaderState::Loaded { article_id, .. }
        | ReaderState::Failed { article_id, .. } => app.store.get(*article_id),
    };
    let Some(article) = article else {
        f.render_widget(Paragraph::new("Article not found").block(block), area);
        return;
    };

    let mut lines = header_lines(app, article);

    match &app.reader {
        ReaderState::Loading { .. } => lines.push(Line::from(Span::styled(
            "Loading...",
            Style::default().fg(Color::DarkGray),
        ))),
        ReaderState::Failed { error, .. } => lines.push(Line::from(Span::styled(
            format!("Failed to load content: {}", error),
            Style::default().fg(Color::Red),
        ))),
        ReaderState::Loaded { lines: body, .. } => {
            if body.iter().all(|l| l.trim().is_empty()) {
                lines.push(Line::from(Span::styled(
                    "This article has no content.",
                    Style::default().fg(Color::DarkGray),
                )));
            } else {
                lines.extend(body.iter().map(|l| Line::from(l.clone())));
            }
        }
        ReaderState::Placeholder(_) => {}
    }

    lines.extend(comment_lines(app));

    let scroll = app.reader_scroll.min(u16::MAX as usize) as u16;
    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    f.render_widget(paragraph, area);
}

/// Breadcrumb, title, metadata and tags, followed by a blank line.
fn header_lines(app: &App, article: &Article) -> Vec<Line<'static>> {
    let dim = Style::default().fg(Color::DarkGray);
    let now = Utc::now().timestamp();

    let crumb: Vec<&str> = app
        .selection
        .breadcrumb()
        .iter()
        .filter_map(|id| app.store.get(*id))
        .map(|a| a.name.as_str())
        .collect();

    let mut title_style = Style::default().add_modifier(Modifier::BOLD);
    if !article.active {
        title_style = title_style.fg(Color::DarkGray);
    }
    let mut title = vec![Span::styled(article.name.clone(), title_style)];
    if !article.active {
        title.push(Span::styled("  (archived)", dim));
    }
    if app.store.is_favorite(article.id) {
        title.push(Span::styled("  ★", Style::default().fg(Color::Yellow)));
    }

    let mut meta = Vec::new();
    if let (Some(by), Some(at)) = (&article.created_by, article.created_at) {
        meta.push(format!("Created by {} {}", by.name, relative_time(at, now)));
    }
    if let (Some(by), Some(at)) = (&article.modified_by, article.modified_at) {
        meta.push(format!("updated by {} {}", by.name, relative_time(at, now)));
    }
    let liked = article.liked_by_ids.contains(&app.user_id());
    meta.push(format!(
        "{} views, {} likes{}",
        article.view_count,
        article.like_count,
        if liked { " (liked)" } else { "" }
    ));

    let mut lines = vec![
        Line::from(Span::styled(crumb.join(" / "), dim)),
        Line::from(title),
        Line::from(Span::styled(meta.join(" · "), dim)),
    ];
    if !article.tag_names.is_empty() {
        let tags: Vec<Span> = article
            .tag_names
            .iter()
            .filter(|n| !n.is_empty())
            .map(|n| Span::styled(format!("#{} ", n), Style::default().fg(Color::Green)))
            .collect();
        lines.push(Line::from(tags));
    }
    lines.push(Line::from(""));
    lines
}

fn comment_lines(app: &App) -> Vec<Line<'static>> {
    let heading = Style::default().add_modifier(Modifier::BOLD);
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("Comments ({})", app.comment_count()),
            heading,
        )),
    ];
    if app.comment_threads.is_empty() {
        lines.push(Line::from(Span::styled(
            "No comments yet. Press R to add one.",
            Style::default().fg(Color::DarkGray),
        )));
        return lines;
    }

    let now = Utc::now().timestamp();
    for (i, (depth, message)) in comments::flatten(&app.comment_threads)
        .into_iter()
        .enumerate()
    {
        let indent = "  ".repeat(depth);
        let mut author_style = Style::default().fg(Color::Cyan);
        if app.comment_cursor == Some(i) {
            author_style = author_style.add_modifier(Modifier::REVERSED);
        }
        lines.push(Line::from(vec![
            Span::raw(indent.clone()),
            Span::styled(message.author.clone(), author_style),
            Span::styled(
                format!("  {}", relative_time(message.date, now)),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
        for body_line in message.body.lines() {
            lines.push(Line::from(format!("{indent}  {body_line}")));
        }
    }
    lines
}
