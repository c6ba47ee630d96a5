//! Utility functions shared by the knowledge model and the terminal UI.
//!
//! - **Text**: Unicode-aware width, truncation, padding and control-char stripping
//! - **Time**: "3 hours ago" style relative timestamps
//!
//! # Examples
//!
//! ```
//! use kbrowse::util::{display_width, truncate_to_width};
//!
//! assert_eq!(display_width("Hello 世界"), 10);
//! assert_eq!(truncate_to_width("Onboarding checklist", 10), "Onboard...");
//! ```

mod text;
mod time;

pub use text::{display_width, pad_to_width, strip_control_chars, truncate_to_width};
pub use time::relative_time;

/// Maximum accepted search query length, in characters.
pub const MAX_SEARCH_QUERY_LENGTH: usize = 256;
