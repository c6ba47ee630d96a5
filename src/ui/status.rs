use crate::app::{App, Focus};
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};
use std::borrow::Cow;

/// Render the status bar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    // Use Cow to avoid allocations for static strings and borrowed status messages
    let text: Cow<'_, str> = if app.search_mode {
        Cow::Owned(format!(
            "Search{}: {}_  | ESC clear | ENTER apply",
            if app.filter.search_in_content { " (body)" } else { "" },
            app.search_input
        ))
    } else if let Some((msg, _)) = &app.status_message {
        Cow::Borrowed(msg.as_ref())
    } else if app.modal.is_some() {
        Cow::Borrowed("[Enter]confirm [Esc]cancel")
    } else {
        match app.focus {
            Focus::Tree => Cow::Borrowed(
                "[/]search [t]ags [f]avorites [a]rchived [s]ort [n]ew [r]ename [m]ove [?]help [q]uit",
            ),
            Focus::Reader => {
                Cow::Borrowed("[j/k]scroll [J/K]comment [R]eply [L]ike [F]avorite [Tab]tree [q]uit")
            }
        }
    };

    let style = Style::default().bg(Color::DarkGray).fg(Color::White);

    let paragraph = Paragraph::new(text).style(style);
    f.render_widget(paragraph, area);
}
