use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Display width of a string in terminal columns.
///
/// CJK characters and most emoji take two columns, combining marks zero.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

fn char_width(c: char) -> usize {
    UnicodeWidthChar::width(c).unwrap_or(0)
}

/// Byte index of the longest prefix of `s` that fits in `budget` columns.
fn fit_prefix(s: &str, budget: usize) -> usize {
    let mut used = 0;
    for (idx, c) in s.char_indices() {
        let w = char_width(c);
        if used + w > budget {
            return idx;
        }
        used += w;
    }
    s.len()
}

/// Truncates a string to fit within `max_width` columns, appending "..." when
/// text is cut.
///
/// Widths of three columns or less have no room for an ellipsis, so the
/// string is clipped without one. Returns `Cow::Borrowed` when nothing is cut.
///
/// ```
/// use kbrowse::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Short", 10), "Short");
/// assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }
    if max_width <= ELLIPSIS_WIDTH {
        return Cow::Owned(s[..fit_prefix(s, max_width)].to_string());
    }
    let cut = fit_prefix(s, max_width - ELLIPSIS_WIDTH);
    Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS))
}

/// Truncate, then right-pad with spaces to exactly `width` columns.
///
/// A wide character that would straddle the edge is replaced by padding.
pub fn pad_to_width(s: &str, width: usize) -> String {
    let clipped = truncate_to_width(s, width);
    let used = display_width(&clipped);
    let mut out = String::with_capacity(clipped.len() + width.saturating_sub(used));
    out.push_str(&clipped);
    out.extend(std::iter::repeat(' ').take(width.saturating_sub(used)));
    out
}

fn is_stripped_control(c: char) -> bool {
    (c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r')) || c == '\u{7f}'
}

/// SEC-001: Strip terminal control characters and ANSI escape sequences.
///
/// Article names, bodies and comments are user-authored and rendered straight
/// into the terminal. CSI sequences (`ESC [` ... final byte), OSC sequences
/// (`ESC ]` ... BEL or `ESC \`), bare ESC and C0 controls other than tab,
/// newline and carriage return are removed.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            match chars.peek() {
                Some('[') => {
                    chars.next();
                    for n in chars.by_ref() {
                        if ('\u{40}'..='\u{7e}').contains(&n) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    chars.next();
                    while let Some(n) = chars.next() {
                        if n == '\u{07}' {
                            break;
                        }
                        if n == '\u{1b}' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            }
        } else if !is_stripped_control(c) {
            out.push(c);
        }
    }
    Cow::Owned(out)
}
