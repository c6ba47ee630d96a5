//! Terminal User Interface module.
//!
//! This module provides the TUI for the knowledge browser, including:
//! - Main event loop (`run`)
//! - Input handling for the tree, reader, search and dialogs
//! - Rendering for the sidebar tree, reader and overlays
//! - Background task event processing
//!
//! # Module Structure
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard input handling
//! - `events` - Background task event processing
//! - `helpers` - Task spawning shared by input and events
//! - `render` - Layout and overlay dispatch
//! - `sidebar` - Article tree widget
//! - `reader` - Article reader widget
//! - `dialogs` - Modal dialogs
//! - `status` - Status bar widget
//! - `help` - Keybinding overlay

mod dialogs;
mod events;
mod help;
mod helpers;
mod input;
mod loop_runner;
mod reader;
mod render;
mod sidebar;
mod status;

// Re-export the public API
pub use helpers::after_selection;
pub use loop_runner::{run, Action};
