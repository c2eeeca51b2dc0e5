//! Whitespace normalization and the search primitives shared by strategies.
//!
//! All offsets are byte offsets into the projected text.

use std::ops::Range;

use regex::Regex;

/// Collapse whitespace runs into single spaces and trim.
pub fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Regex matching `find` with any run of whitespace between its tokens.
///
/// Returns `None` when `find` has no tokens.
pub fn flexible_pattern(find: &str) -> Option<Regex> {
    let words: Vec<&str> = find.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }
    let pattern = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join(r"\s+");
    Regex::new(&pattern).ok()
}

/// All non-overlapping exact occurrences of `needle` inside `text[window]`.
pub fn find_exact(text: &str, window: Range<usize>, needle: &str) -> Vec<Range<usize>> {
    if needle.is_empty() {
        return Vec::new();
    }
    let Some(haystack) = text.get(window.clone()) else {
        return Vec::new();
    };
    haystack
        .match_indices(needle)
        .map(|(idx, m)| window.start + idx..window.start + idx + m.len())
        .collect()
}

/// All whitespace-flexible occurrences of `needle` inside `text[window]`.
pub fn find_flexible(text: &str, window: Range<usize>, needle: &str) -> Vec<Range<usize>> {
    let Some(re) = flexible_pattern(needle) else {
        return Vec::new();
    };
    let Some(haystack) = text.get(window.clone()) else {
        return Vec::new();
    };
    re.find_iter(haystack)
        .map(|m| window.start + m.start()..window.start + m.end())
        .collect()
}

/// Largest char boundary `<= idx`.
pub fn floor_boundary(text: &str, idx: usize) -> usize {
    let mut idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Smallest char boundary `>= idx`.
pub fn ceil_boundary(text: &str, idx: usize) -> usize {
    let mut idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// Byte offset of the start of every line (always contains `0`).
pub fn line_starts(text: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(text.match_indices('\n').map(|(idx, _)| idx + 1))
        .collect()
}

/// The last `chars` characters of `text[..end]`.
pub fn tail_chars(text: &str, end: usize, chars: usize) -> &str {
    let head = &text[..floor_boundary(text, end)];
    let start = head
        .char_indices()
        .rev()
        .nth(chars.saturating_sub(1))
        .map_or(0, |(idx, _)| idx);
    if chars == 0 { "" } else { &head[start..] }
}

/// The first `chars` characters of `text[start..]`.
pub fn head_chars(text: &str, start: usize, chars: usize) -> &str {
    let rest = &text[ceil_boundary(text, start)..];
    let end = rest.char_indices().nth(chars).map_or(rest.len(), |(idx, _)| idx);
    &rest[..end]
}
