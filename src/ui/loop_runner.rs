//! Main event loop for the TUI.
//!
//! This module contains the core event loop that multiplexes terminal input,
//! background task events, and periodic ticks.

use crate::app::{App, AppEvent};
use anyhow::Result;
use crossterm::{
    event::{Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::time::Duration;
use tokio::sync::mpsc;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use super::events::handle_app_event;
use super::helpers::{flush_preferences, run_search};
use super::input::handle_input;
use super::render::render;

/// Result of handling a key press event.
///
/// Returned by input handlers to signal whether the application should
/// continue running or terminate gracefully.
pub enum Action {
    /// Continue the event loop and process more events.
    Continue,
    /// Exit the application and restore the terminal.
    Quit,
}

/// Runs the TUI application event loop.
///
/// Uses `tokio::select!` to multiplex three event sources:
/// - **Terminal input**: Key presses from crossterm's async event stream
/// - **Background tasks**: content loads, search batches and writes via `AppEvent`
/// - **Periodic tick**: 250ms timer for status expiry and debounced search
///
/// # Panic Safety
///
/// Installs a panic hook that restores terminal state before unwinding,
/// ensuring the terminal is not left in raw mode on panic.
pub async fn run(
    app: &mut App,
    event_tx: mpsc::Sender<AppEvent>,
    mut event_rx: mpsc::Receiver<AppEvent>,
) -> Result<()> {
    // Install panic hook BEFORE setting up terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let mut session = TerminalSession::acquire()?;
    let mut event_stream = crossterm::event::EventStream::new();
    let mut tick_interval = tokio::time::interval(Duration::from_millis(250));

    // On non-Unix platforms these become pending futures that never complete
    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate())?;
    #[cfg(unix)]
    let mut sigint = signal(SignalKind::interrupt())?;

    loop {
        // Only render when state has changed
        if app.needs_redraw {
            session.terminal.draw(|f| render(f, app))?;
            app.needs_redraw = false;
        }

        if app.clear_expired_status() {
            app.needs_redraw = true;
        }

        // Drain pending task results before handling more input so typing
        // does not starve content display
        while let Ok(event) = event_rx.try_recv() {
            app.needs_redraw = true;
            handle_app_event(app, event, &event_tx).await;
        }

        #[cfg(unix)]
        let sigterm_fut = sigterm.recv();
        #[cfg(not(unix))]
        let sigterm_fut = std::future::pending::<Option<()>>();

        #[cfg(unix)]
        let sigint_fut = sigint.recv();
        #[cfg(not(unix))]
        let sigint_fut = std::future::pending::<Option<()>>();

        tokio::select! {
            biased;

            _ = sigterm_fut => {
                tracing::info!("Received SIGTERM, shutting down gracefully");
                break;
            }

            _ = sigint_fut => {
                tracing::info!("Received SIGINT, shutting down gracefully");
                break;
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        app.needs_redraw = true;
                        match handle_input(app, key.code, key.modifiers, &event_tx).await {
                            Ok(Action::Quit) => break,
                            Ok(Action::Continue) => {}
                            Err(e) => app.set_status(format!("Error: {}", e)),
                        }
                    }
                    Some(Ok(Event::Resize(_, _))) => app.needs_redraw = true,
                    Some(Err(e)) => tracing::warn!(error = %e, "Terminal event error"),
                    None => break,
                    _ => {}
                }
            }

            Some(event) = event_rx.recv() => {
                app.needs_redraw = true;
                handle_app_event(app, event, &event_tx).await;
            }

            _ = tick_interval.tick() => {
                handle_tick(app, &event_tx);
            }
        }
    }

    drop(session);
    flush_preferences(app).await;
    Ok(())
}

/// Run the search once the debounce window has passed.
fn handle_tick(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    if app.take_due_search() {
        tracing::debug!(query = %app.filter.search_query, "Debounced search due");
        app.needs_redraw = true;
        run_search(app, event_tx);
    }
}

/// Raw mode and the alternate screen, held for the life of the loop.
///
/// Dropping the session restores the terminal, including on early `?` returns.
struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalSession {
    fn acquire() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            tracing::warn!(error = %e, "Failed to disable raw mode");
        }
        if let Err(e) = execute!(self.terminal.backend_mut(), LeaveAlternateScreen) {
            tracing::warn!(error = %e, "Failed to leave alternate screen");
        }
        let _ = self.terminal.show_cursor();
    }
}
