//! Modal dialog overlays.

use crate::app::{App, Modal};
use crate::util::pad_to_width;
use ratatui::{
    layout::Alignment,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use super::render::centered;

const DIALOG_WIDTH: u16 = 60;
/// Picker rows are padded so the cursor bar spans the dialog.
const PICKER_WIDTH: usize = DIALOG_WIDTH as usize - 2;

/// Render `modal` centered over the current view.
pub fn render(f: &mut Frame, app: &App, modal: &Modal) {
    let (title, lines) = match modal {
        Modal::Rename { input, .. } => (" Rename Article ", text_prompt("New title:", input)),
        Modal::Copy { input, .. } => (" Copy Article ", text_prompt("Title of the copy:", input)),
        Modal::NewArticle { parent_id, input } => {
            let label = match parent_id.and_then(|id| app.store.get(id)) {
                Some(parent) => format!("Title (under \"{}\"):", parent.name),
                None => "Title (top level):".to_string(),
            };
            (" New Article ", text_prompt(&label, input))
        }
        Modal::Comment {
            parent_id, input, ..
        } => {
            let label = match parent_id {
                Some(_) => "Reply:",
                None => "Comment:",
            };
            (" Comment ", text_prompt(label, input))
        }
        Modal::Move {
            targets, cursor, ..
        } => (
            " Move Under ",
            picker(
                targets.iter().map(|(_, name)| (false, name.as_str())),
                *cursor,
                false,
            ),
        ),
        Modal::Tags {
            selected, cursor, ..
        } => (
            " Tags ",
            picker(
                app.store
                    .tags()
                    .iter()
                    .map(|t| (selected.contains(&t.id), t.name.as_str())),
                *cursor,
                true,
            ),
        ),
        Modal::TagFilter { cursor } => (
            " Filter by Tag ",
            picker(
                app.store
                    .tags()
                    .iter()
                    .map(|t| (app.filter.selected_tag_ids.contains(&t.id), t.name.as_str())),
                *cursor,
                true,
            ),
        ),
        Modal::ConfirmArchive { name, archive, .. } => {
            let verb = if *archive { "Archive" } else { "Restore" };
            (
                " Confirm ",
                vec![
                    Line::from(format!("{} \"{}\"?", verb, name)),
                    Line::from(""),
                    Line::from("(y) Confirm  (n/Esc) Cancel"),
                ],
            )
        }
    };

    let height = (lines.len() as u16).saturating_add(2);
    let overlay = centered(DIALOG_WIDTH, height, f.area());
    if overlay.width < 10 || overlay.height < 3 {
        return;
    }

    f.render_widget(Clear, overlay);
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(title),
        )
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, overlay);
}

fn text_prompt(label: &str, input: &str) -> Vec<Line<'static>> {
    vec![
        Line::from(label.to_string()),
        Line::from(""),
        Line::from(format!("> {}_", input)),
        Line::from(""),
        Line::from(Span::styled(
            "(Enter) Save  (Esc) Cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ]
}

/// One line per entry with the cursor row highlighted.
fn picker<'a>(
    entries: impl Iterator<Item = (bool, &'a str)>,
    cursor: usize,
    checkable: bool,
) -> Vec<Line<'static>> {
    let mut lines: Vec<Line> = entries
        .enumerate()
        .map(|(i, (checked, name))| {
            let mark = match (checkable, checked) {
                (false, _) => "",
                (true, true) => "[x] ",
                (true, false) => "[ ] ",
            };
            let text = pad_to_width(&format!(" {}{}", mark, name), PICKER_WIDTH);
            if i == cursor {
                Line::from(Span::styled(
                    text,
                    Style::default().bg(Color::DarkGray).fg(Color::White),
                ))
            } else {
                Line::from(text)
            }
        })
        .collect();
    lines.push(Line::from(""));
    let hint = if checkable {
        "(Space) Toggle  (Enter) Apply  (Esc) Close"
    } else {
        "(Enter) Select  (Esc) Cancel"
    };
    lines.push(Line::from(Span::styled(
        hint,
        Style::default().fg(Color::DarkGray),
    )));
    lines
}
