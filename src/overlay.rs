//! Overlay renderer.
//!
//! Turns located hunks into presentation-only decorations. Rendering never
//! touches the document, and a hunk that cannot be drawn is reported and
//! skipped without affecting the others.

use std::ops::Range;

use serde::Serialize;
use tracing::warn;

use crate::config::EngineConfig;
use crate::document::Projection;
use crate::error::{DiffError, DiffResult};
use crate::hunk::{DiffHunk, ElementType};

pub const CLASS_DELETE: &str = "docdiff-delete";
pub const CLASS_INSERT: &str = "docdiff-insert";
pub const CLASS_ELEMENT: &str = "docdiff-element";
pub const CLASS_CODE: &str = "docdiff-code";
/// Added to every class of a hunk below the low-confidence threshold.
pub const CLASS_LOW_CONFIDENCE: &str = "docdiff-low-confidence";

/// How an insertion preview sits in the text flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Placement {
    Inline,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LineChange {
    Unchanged,
    Added,
    Removed,
    Modified,
}

/// One line of a code block diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeLine {
    pub change: LineChange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<String>,
}

/// A single decoration. Ranges and positions are document coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Overlay {
    Strike {
        hunk_id: String,
        range: Range<usize>,
        class: String,
    },
    Insertion {
        hunk_id: String,
        at: usize,
        text: String,
        placement: Placement,
        class: String,
    },
    ElementHighlight {
        hunk_id: String,
        range: Range<usize>,
        element: ElementType,
        class: String,
    },
    CodeLines {
        hunk_id: String,
        range: Range<usize>,
        lines: Vec<CodeLine>,
        class: String,
    },
    WholeDocumentNotice {
        hunk_id: String,
        chars: usize,
        message: String,
    },
    Warning {
        low_confidence: usize,
        message: String,
    },
}

impl Overlay {
    pub fn hunk_id(&self) -> Option<&str> {
        match self {
            Self::Strike { hunk_id, .. }
            | Self::Insertion { hunk_id, .. }
            | Self::ElementHighlight { hunk_id, .. }
            | Self::CodeLines { hunk_id, .. }
            | Self::WholeDocumentNotice { hunk_id, .. } => Some(hunk_id),
            Self::Warning { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedHunk {
    pub hunk_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOutput {
    pub overlays: Vec<Overlay>,
    pub failures: Vec<FailedHunk>,
    /// Tracked hunks that could not be located and are not drawn.
    pub unlocated: usize,
}

/// Render overlays for located hunks.
pub fn render(hunks: &[&DiffHunk], projection: &Projection, config: &EngineConfig) -> RenderOutput {
    let mut output = RenderOutput::default();
    let mut low_confidence = 0;
    for hunk in hunks {
        match render_hunk(hunk, projection, config) {
            Ok(overlays) => {
                if is_low_confidence(hunk, config) {
                    low_confidence += 1;
                }
                output.overlays.extend(overlays);
            }
            Err(err) => {
                warn!("{err}");
                output.failures.push(FailedHunk {
                    hunk_id: hunk.id.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    if low_confidence > 0 {
        output.overlays.push(Overlay::Warning {
            low_confidence,
            message: format!(
                "{low_confidence} proposed change(s) matched with low confidence; review before applying"
            ),
        });
    }
    output
}

fn is_low_confidence(hunk: &DiffHunk, config: &EngineConfig) -> bool {
    hunk.confidence()
        .is_some_and(|c| c < config.low_confidence_threshold)
}

fn render_hunk(
    hunk: &DiffHunk,
    projection: &Projection,
    config: &EngineConfig,
) -> DiffResult<Vec<Overlay>> {
    let fail = |reason: &str| DiffError::RenderFailure {
        hunk_id: hunk.id.clone(),
        reason: reason.to_owned(),
    };
    let range = hunk.located_range().ok_or_else(|| fail("hunk is not located"))?;
    if range.start > range.end || range.end > projection.content_size() {
        return Err(fail("located range lies outside the document"));
    }

    let low = is_low_confidence(hunk, config);
    let class = |base: &str| {
        if low {
            format!("{base} {CLASS_LOW_CONFIDENCE}")
        } else {
            base.to_owned()
        }
    };
    let hunk_id = hunk.id.clone();

    match hunk.element_type {
        ElementType::WholeDocumentReplace => {
            let chars = projection.char_len();
            Ok(vec![Overlay::WholeDocumentNotice {
                hunk_id,
                chars,
                message: format!("The entire document will be replaced ({chars} characters)"),
            }])
        }
        ElementType::Table | ElementType::Image => {
            if !projection.elements().iter().any(|e| e.doc == range) {
                return Err(fail("no element at the located range"));
            }
            Ok(vec![Overlay::ElementHighlight {
                hunk_id,
                range,
                element: hunk.element_type,
                class: class(CLASS_ELEMENT),
            }])
        }
        ElementType::CodeBlock if !hunk.is_pure_insertion() => Ok(vec![Overlay::CodeLines {
            hunk_id,
            range,
            lines: classify_lines(&hunk.original_snippet, &hunk.new_snippet),
            class: class(CLASS_CODE),
        }]),
        ElementType::Text | ElementType::CodeBlock => {
            let mut overlays = Vec::with_capacity(2);
            if range.start < range.end {
                overlays.push(Overlay::Strike {
                    hunk_id: hunk_id.clone(),
                    range: range.clone(),
                    class: class(CLASS_DELETE),
                });
            }
            if !hunk.new_snippet.is_empty() {
                overlays.push(Overlay::Insertion {
                    hunk_id,
                    at: range.end,
                    text: hunk.new_snippet.clone(),
                    placement: placement(projection, range.end, &hunk.new_snippet),
                    class: class(CLASS_INSERT),
                });
            }
            Ok(overlays)
        }
    }
}

/// Block placement when the preview itself spans lines or a line break
/// borders the insertion point.
fn placement(projection: &Projection, at: usize, text: &str) -> Placement {
    let offset = projection.to_projection_offset(at);
    let projected = projection.text();
    let before = projected.get(..offset).and_then(|s| s.chars().next_back());
    let after = projected.get(offset..).and_then(|s| s.chars().next());
    if text.contains('\n') || before == Some('\n') || after == Some('\n') {
        Placement::Block
    } else {
        Placement::Inline
    }
}

/// Compare code lines by position.
pub fn classify_lines(old: &str, new: &str) -> Vec<CodeLine> {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    (0..old_lines.len().max(new_lines.len()))
        .filter_map(|idx| {
            let (old, new) = (old_lines.get(idx).copied(), new_lines.get(idx).copied());
            let change = match (old, new) {
                (Some(o), Some(n)) if o == n => LineChange::Unchanged,
                (Some(_), Some(_)) => LineChange::Modified,
                (Some(_), None) => LineChange::Removed,
                (None, Some(_)) => LineChange::Added,
                (None, None) => return None,
            };
            Some(CodeLine {
                change,
                old: old.map(str::to_owned),
                new: new.map(str::to_owned),
            })
        })
        .collect()
}
