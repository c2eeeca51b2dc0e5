//! Diff hunks: the wire descriptor a proposer sends and the tracked form the
//! session keeps.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::locate::{LocatedMatch, Strategy};

/// What a hunk does to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HunkKind {
    Insertion,
    Deletion,
    Edit,
}

/// Which kind of document element a hunk targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementType {
    #[default]
    Text,
    Table,
    Image,
    #[serde(alias = "code_block")]
    CodeBlock,
    #[serde(alias = "replace_whole", alias = "whole_document_replace")]
    WholeDocumentReplace,
}

/// 1-based inclusive line hint from the proposer's view of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

/// A raw occurrence kept for diagnostics when a hunk could not be located.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub range: Range<usize>,
    pub confidence: f64,
    pub surrounding_context: String,
}

/// Hunk descriptor as produced by the AI backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HunkDescriptor {
    pub diff_id: String,
    pub diff_type: HunkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<ElementType>,
    #[serde(default)]
    pub original_code: String,
    #[serde(default)]
    pub new_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_start_line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_end_line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_identifier: Option<String>,
}

/// One proposed change and, once located, where it sits in the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffHunk {
    pub id: String,
    pub kind: HunkKind,
    pub element_type: ElementType,
    pub original_snippet: String,
    pub new_snippet: String,
    pub context_before: Option<String>,
    pub context_after: Option<String>,
    pub original_line_range: Option<LineRange>,
    pub element_identifier: Option<String>,
    located_range: Option<Range<usize>>,
    confidence: Option<f64>,
    strategy: Option<Strategy>,
    candidates: Vec<Candidate>,
}

impl DiffHunk {
    /// A text edit with no anchors.
    pub fn edit(id: &str, original: &str, new: &str) -> Self {
        Self::from(HunkDescriptor {
            diff_id: id.to_owned(),
            diff_type: HunkKind::Edit,
            element_type: None,
            original_code: original.to_owned(),
            new_code: new.to_owned(),
            context_before: None,
            context_after: None,
            original_start_line: None,
            original_end_line: None,
            element_identifier: None,
        })
    }

    #[must_use]
    pub fn with_context(mut self, before: Option<&str>, after: Option<&str>) -> Self {
        self.context_before = before.map(str::to_owned);
        self.context_after = after.map(str::to_owned);
        self
    }

    #[must_use]
    pub const fn with_lines(mut self, start: usize, end: usize) -> Self {
        self.original_line_range = Some(LineRange { start, end });
        self
    }

    #[must_use]
    pub const fn with_kind(mut self, kind: HunkKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub const fn with_element(mut self, element_type: ElementType) -> Self {
        self.element_type = element_type;
        self
    }

    pub fn located_range(&self) -> Option<Range<usize>> {
        self.located_range.clone()
    }

    pub const fn confidence(&self) -> Option<f64> {
        self.confidence
    }

    pub const fn strategy(&self) -> Option<Strategy> {
        self.strategy
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub const fn is_located(&self) -> bool {
        self.located_range.is_some()
    }

    /// Whether this hunk only inserts text at a point.
    pub fn is_pure_insertion(&self) -> bool {
        self.kind == HunkKind::Insertion || self.original_snippet.is_empty()
    }

    /// Record the result of a successful locate pass.
    pub(crate) fn set_location(&mut self, located: &LocatedMatch) {
        self.located_range = Some(located.range.clone());
        self.confidence = Some(located.confidence);
        self.strategy = Some(located.strategy);
        self.candidates.clear();
    }

    /// Forget the location (failed locate, or a mutation made it untrustworthy).
    pub(crate) fn clear_location(&mut self, candidates: Vec<Candidate>) {
        self.located_range = None;
        self.confidence = None;
        self.strategy = None;
        self.candidates = candidates;
    }

    /// Move the located range after a clean remap.
    pub(crate) fn relocate(&mut self, range: Range<usize>) {
        if self.located_range.is_some() {
            self.located_range = Some(range);
        }
    }

    /// Whether two hunks describe the same proposed change.
    pub fn same_proposal(&self, other: &Self) -> bool {
        self.id == other.id
            && self.kind == other.kind
            && self.element_type == other.element_type
            && self.original_snippet == other.original_snippet
            && self.new_snippet == other.new_snippet
            && self.context_before == other.context_before
            && self.context_after == other.context_after
            && self.original_line_range == other.original_line_range
            && self.element_identifier == other.element_identifier
    }
}

impl From<HunkDescriptor> for DiffHunk {
    fn from(descriptor: HunkDescriptor) -> Self {
        let original_line_range = match (descriptor.original_start_line, descriptor.original_end_line) {
            (Some(start), Some(end)) => Some(LineRange {
                start,
                end: end.max(start),
            }),
            (Some(start), None) => Some(LineRange { start, end: start }),
            (None, Some(end)) => Some(LineRange { start: end, end }),
            (None, None) => None,
        };
        Self {
            id: descriptor.diff_id,
            kind: descriptor.diff_type,
            element_type: descriptor.element_type.unwrap_or_default(),
            original_snippet: descriptor.original_code,
            new_snippet: descriptor.new_code,
            context_before: descriptor.context_before.filter(|c| !c.is_empty()),
            context_after: descriptor.context_after.filter(|c| !c.is_empty()),
            original_line_range,
            element_identifier: descriptor.element_identifier,
            located_range: None,
            confidence: None,
            strategy: None,
            candidates: Vec::new(),
        }
    }
}
