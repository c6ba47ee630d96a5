//! Markup-to-text extraction for article bodies.
//!
//! Bodies are stored as HTML. The reader shows them as plain text and search
//! matches against a lower-cased, whitespace-collapsed copy. This is not a
//! sanitizer: tags are dropped, entities decoded, block boundaries become
//! line breaks.

use std::borrow::Cow;
use std::ops::Range;

use quick_xml::escape::resolve_html5_entity;

/// Elements whose whole content is dropped.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "template", "head"];

/// Elements that start on a fresh line.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "tr", "ul",
];

/// Longest entity name considered (`&CounterClockwiseContourIntegral;` is 31).
const MAX_ENTITY_LEN: usize = 32;

/// Extract readable text from an HTML body.
///
/// Each block element starts a new line and list items are prefixed
/// with "- ". Runs of empty blocks collapse to a single blank line.
pub fn html_to_text(html: &str) -> String {
    let mut raw = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(lt) = rest.find('<') {
        push_text(&mut raw, &rest[..lt]);
        rest = &rest[lt..];

        if let Some(after) = rest.strip_prefix("<!--") {
            rest = after.find("-->").map_or("", |end| &after[end + 3..]);
            continue;
        }

        let Some(gt) = rest.find('>') else {
            // Unterminated tag: treat the remainder as text
            push_text(&mut raw, rest);
            rest = "";
            break;
        };
        let tag = &rest[1..gt];
        rest = &rest[gt + 1..];

        let closing = tag.starts_with('/');
        let name = tag_name(tag);

        if !closing && SKIPPED_ELEMENTS.contains(&name.as_str()) {
            let close = format!("</{name}");
            rest = find_ignore_case(rest, &close)
                .and_then(|r| rest[r.end..].find('>').map(|gt| &rest[r.end + gt + 1..]))
                .unwrap_or("");
            continue;
        }

        if BLOCK_ELEMENTS.contains(&name.as_str()) {
            raw.push('\n');
            if name == "li" && !closing {
                raw.push_str("- ");
            }
        }
    }
    push_text(&mut raw, rest);

    tidy_lines(&raw)
}

/// Lower-cased, whitespace-collapsed text used for body search.
pub fn search_text(html: &str) -> String {
    html_to_text(html)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Locate `needle_lower` in `haystack`, ignoring case.
///
/// `needle_lower` must already be lower-cased. The returned byte range
/// indexes into `haystack` itself, so it is safe for slicing even when
/// lower-casing changes byte lengths.
pub fn find_ignore_case(haystack: &str, needle_lower: &str) -> Option<Range<usize>> {
    if needle_lower.is_empty() {
        return None;
    }
    for (start, _) in haystack.char_indices() {
        let mut needle = needle_lower.chars();
        let mut pending = needle.next();
        let mut end = start;
        for (idx, c) in haystack[start..].char_indices() {
            let mut lowered = c.to_lowercase();
            let matched = lowered.all(|lc| match pending {
                Some(n) if n == lc => {
                    pending = needle.next();
                    true
                }
                _ => false,
            });
            if !matched {
                break;
            }
            end = start + idx + c.len_utf8();
            if pending.is_none() {
                return Some(start..end);
            }
        }
    }
    None
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches(['/', '!'])
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn push_text(out: &mut String, segment: &str) {
    if !segment.is_empty() {
        out.push_str(&decode_entities(segment));
    }
}

/// Decode named and numeric character references. Anything that does not
/// resolve is kept literally.
fn decode_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let resolved = rest[1..]
            .find(';')
            .filter(|&semi| semi > 0 && semi <= MAX_ENTITY_LEN)
            .and_then(|semi| resolve_entity(&rest[1..=semi]).map(|r| (r, semi + 2)));

        match resolved {
            Some((text, consumed)) => {
                out.push_str(&text);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn resolve_entity(entity: &str) -> Option<Cow<'static, str>> {
    if let Some(num) = entity.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code)
            .filter(|c| *c != '\0')
            .map(|c| Cow::Owned(c.to_string()));
    }
    resolve_html5_entity(entity).map(Cow::Borrowed)
}

/// Collapse intra-line whitespace, trim lines, and keep at most one blank
/// line between blocks.
fn tidy_lines(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;
    for line in raw.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if blank_run > 1 {
                out.push('\n');
            }
        }
        out.push_str(&collapsed);
        blank_run = 0;
    }
    out
}
