//! Derive locatable hunks from a full rewrite of the document text.
//!
//! A proposer that only returns the new text of the whole document still
//! needs its change expressed as hunks. This module diffs the two texts by
//! character, attaches line hints and surrounding context, and merges nearby
//! changes so the preview stays readable.

use std::ops::Range;

use similar::{DiffTag, TextDiff};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DiffError, DiffResult};
use crate::hunk::{ElementType, HunkDescriptor, HunkKind};

/// Largest input accepted for diffing (bytes).
pub const MAX_INPUT_BYTES: usize = 10 * 1024 * 1024;
/// Characters of context captured on each side of a change.
const CONTEXT_CHARS: usize = 100;
/// Changes whose lines are at most this far apart become one hunk.
const MERGE_LINE_GAP: usize = 3;

/// A changed region as character ranges in both texts.
#[derive(Debug, Clone)]
struct Change {
    old: Range<usize>,
    new: Range<usize>,
}

/// Diff `old_text` against `new_text` and describe the result as hunks.
pub fn derive_hunks(old_text: &str, new_text: &str) -> DiffResult<Vec<HunkDescriptor>> {
    for len in [old_text.len(), new_text.len()] {
        if len > MAX_INPUT_BYTES {
            return Err(DiffError::InputTooLarge {
                len,
                limit: MAX_INPUT_BYTES,
            });
        }
    }

    let old_chars: Vec<char> = old_text.chars().collect();
    let new_chars: Vec<char> = new_text.chars().collect();
    let diff = TextDiff::from_chars(old_text, new_text);
    let changes: Vec<Change> = diff
        .ops()
        .iter()
        .filter(|op| op.tag() != DiffTag::Equal)
        .map(|op| Change {
            old: op.old_range(),
            new: op.new_range(),
        })
        .collect();

    let lines = LineIndex::new(&old_chars);
    let merged = merge_nearby(changes, &lines);
    debug!(changes = merged.len(), "derived changes");

    if let [only] = merged.as_slice() {
        let covers_half = only.old.len() * 2 > old_chars.len() || only.new.len() * 2 > new_chars.len();
        if covers_half && !only.old.is_empty() && !only.new.is_empty() {
            return Ok(vec![whole_document(old_text, new_text, lines.count())]);
        }
    }

    Ok(merged
        .into_iter()
        .map(|change| describe(&change, &old_chars, &new_chars, &lines))
        .collect())
}

fn new_id() -> String {
    format!("diff_{}", Uuid::new_v4())
}

fn whole_document(old_text: &str, new_text: &str, line_count: usize) -> HunkDescriptor {
    HunkDescriptor {
        diff_id: new_id(),
        diff_type: HunkKind::Edit,
        element_type: Some(ElementType::WholeDocumentReplace),
        original_code: old_text.to_owned(),
        new_code: new_text.to_owned(),
        context_before: None,
        context_after: None,
        original_start_line: Some(1),
        original_end_line: Some(line_count),
        element_identifier: None,
    }
}

fn describe(change: &Change, old: &[char], new: &[char], lines: &LineIndex) -> HunkDescriptor {
    let original_code: String = old[change.old.clone()].iter().collect();
    let new_code: String = new[change.new.clone()].iter().collect();
    let diff_type = match (original_code.is_empty(), new_code.is_empty()) {
        (true, _) => HunkKind::Insertion,
        (false, true) => HunkKind::Deletion,
        (false, false) => HunkKind::Edit,
    };

    let before_start = change.old.start.saturating_sub(CONTEXT_CHARS);
    let after_end = (change.old.end + CONTEXT_CHARS).min(old.len());
    let context = |range: Range<usize>| {
        let raw: String = old[range].iter().collect();
        let stripped = strip_markup(&raw);
        (!stripped.is_empty()).then_some(stripped)
    };

    let start_line = lines.line_of(change.old.start);
    let end_line = lines.line_of(change.old.end.saturating_sub(1).max(change.old.start));
    HunkDescriptor {
        diff_id: new_id(),
        diff_type,
        element_type: None,
        original_code,
        new_code,
        context_before: context(before_start..change.old.start),
        context_after: context(change.old.end..after_end),
        original_start_line: Some(start_line),
        original_end_line: Some(end_line),
        element_identifier: None,
    }
}

/// Merge changes on the same or nearby lines. The unchanged text between
/// them becomes part of both sides of the merged change.
fn merge_nearby(changes: Vec<Change>, lines: &LineIndex) -> Vec<Change> {
    let mut merged: Vec<Change> = Vec::with_capacity(changes.len());
    for change in changes {
        if let Some(last) = merged.last_mut() {
            let last_line = lines.line_of(last.old.end.saturating_sub(1).max(last.old.start));
            if lines.line_of(change.old.start) <= last_line + MERGE_LINE_GAP {
                last.old.end = change.old.end;
                last.new.end = change.new.end;
                continue;
            }
        }
        merged.push(change);
    }
    merged
}

/// Maps character offsets to 1-based line numbers.
struct LineIndex {
    newlines: Vec<usize>,
}

impl LineIndex {
    fn new(chars: &[char]) -> Self {
        Self {
            newlines: chars
                .iter()
                .enumerate()
                .filter(|&(_, &c)| c == '\n')
                .map(|(idx, _)| idx)
                .collect(),
        }
    }

    fn line_of(&self, idx: usize) -> usize {
        self.newlines.partition_point(|&nl| nl < idx) + 1
    }

    fn count(&self) -> usize {
        self.newlines.len() + 1
    }
}

/// Remove markup tags and decode the common entities.
///
/// A `<` only opens a tag when followed by a letter, `/` or `!`; quoted
/// attribute values may contain `>`.
pub fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        let opens_tag = ch == '<'
            && chars
                .peek()
                .is_some_and(|next| next.is_ascii_alphabetic() || matches!(next, '/' | '!'));
        if !opens_tag {
            out.push(ch);
            continue;
        }
        let mut quote = None;
        for inner in chars.by_ref() {
            match (quote, inner) {
                (None, '"' | '\'') => quote = Some(inner),
                (Some(q), c) if c == q => quote = None,
                (None, '>') => break,
                _ => {}
            }
        }
    }
    out.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
