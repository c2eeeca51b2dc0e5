//! Text locator: finds where a hunk's original snippet sits in the projected
//! document.
//!
//! Strategies are tried in order; the first one whose match clears the
//! confidence floor wins. Guardrails run before any strategy, and a failed
//! locate still reports raw occurrences as low-confidence candidates.

pub mod element;
pub mod levenshtein;
pub mod normalize;
pub mod strategies;

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::document::{Projection, utf16_len};
use crate::hunk::{Candidate, DiffHunk, ElementType, HunkKind, LineRange};
use crate::score;

use normalize::{find_exact, find_flexible, head_chars, tail_chars};

/// Which strategy produced a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    ContextAnchored,
    ExactSubstring,
    WhitespaceNormalized,
    Fuzzy,
    Structural,
    LineHinted,
    ElementSignature,
    WholeDocument,
    InsertionPoint,
    Candidate,
}

impl Strategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ContextAnchored => "context_anchored",
            Self::ExactSubstring => "exact_substring",
            Self::WhitespaceNormalized => "whitespace_normalized",
            Self::Fuzzy => "fuzzy",
            Self::Structural => "structural",
            Self::LineHinted => "line_hinted",
            Self::ElementSignature => "element_signature",
            Self::WholeDocument => "whole_document",
            Self::InsertionPoint => "insertion_point",
            Self::Candidate => "candidate",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a locate call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    pub message: String,
}

/// Ordered record of what a single `locate` call tried.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocateTrace {
    events: Vec<TraceEvent>,
}

impl LocateTrace {
    pub fn note(&mut self, strategy: Strategy, message: impl Into<String>) {
        self.push(Some(strategy), message.into());
    }

    fn note_general(&mut self, message: impl Into<String>) {
        self.push(None, message.into());
    }

    fn push(&mut self, strategy: Option<Strategy>, message: String) {
        debug!(strategy = strategy.map_or("locate", Strategy::as_str), "{message}");
        self.events.push(TraceEvent { strategy, message });
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }
}

/// Everything a strategy needs to search.
pub struct Query<'a> {
    pub snippet: &'a str,
    pub context_before: Option<&'a str>,
    pub context_after: Option<&'a str>,
    pub line_range: Option<LineRange>,
    pub text: &'a str,
    pub projection: &'a Projection,
    pub config: &'a EngineConfig,
}

impl<'a> Query<'a> {
    fn new(hunk: &'a DiffHunk, projection: &'a Projection, config: &'a EngineConfig) -> Self {
        let declared = |c: &'a Option<String>| c.as_deref().filter(|c| !c.trim().is_empty());
        Self {
            snippet: &hunk.original_snippet,
            context_before: declared(&hunk.context_before),
            context_after: declared(&hunk.context_after),
            line_range: hunk.original_line_range,
            text: projection.text(),
            projection,
            config,
        }
    }

    const fn has_context(&self) -> bool {
        self.context_before.is_some() || self.context_after.is_some()
    }
}

/// A strategy's unscored answer: a byte range in the projected text.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMatch {
    pub bytes: Range<usize>,
    pub strategy: Strategy,
    /// Subtracted from the strategy's base confidence before blending.
    pub penalty: f64,
}

/// An accepted location in document coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatedMatch {
    pub range: Range<usize>,
    pub confidence: f64,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocateOutcome {
    Found(LocatedMatch),
    NotFound {
        reason: String,
        candidates: Vec<Candidate>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocateResult {
    pub outcome: LocateOutcome,
    pub trace: LocateTrace,
}

impl LocateResult {
    pub const fn found(&self) -> Option<&LocatedMatch> {
        match &self.outcome {
            LocateOutcome::Found(located) => Some(located),
            LocateOutcome::NotFound { .. } => None,
        }
    }
}

type StrategyFn = fn(&Query<'_>, &mut LocateTrace) -> Option<RawMatch>;

/// Text strategies in priority order.
const STRATEGY_CHAIN: &[StrategyFn] = &[
    strategies::context_anchored,
    strategies::direct_substring,
    strategies::fuzzy,
    strategies::structural,
    strategies::line_hinted,
];

/// Characters of surrounding text attached to each candidate.
const CANDIDATE_CONTEXT_CHARS: usize = 40;

/// Locate `hunk` in `projection`.
pub fn locate(hunk: &DiffHunk, projection: &Projection, config: &EngineConfig) -> LocateResult {
    let mut trace = LocateTrace::default();
    let outcome = if hunk.element_type == ElementType::WholeDocumentReplace {
        trace.note(Strategy::WholeDocument, "whole-document replacement");
        LocateOutcome::Found(LocatedMatch {
            range: 0..projection.content_size(),
            confidence: score::base_confidence(Strategy::WholeDocument),
            strategy: Strategy::WholeDocument,
        })
    } else if hunk.kind != HunkKind::Insertion
        && matches!(hunk.element_type, ElementType::Table | ElementType::Image)
    {
        // Elements are found by signature, so an empty snippet is not an insertion.
        match element::locate_element(hunk, projection, &mut trace) {
            Some((range, confidence)) => LocateOutcome::Found(LocatedMatch {
                range,
                confidence,
                strategy: Strategy::ElementSignature,
            }),
            None => not_found("no matching element", Vec::new()),
        }
    } else if hunk.is_pure_insertion() {
        locate_insertion(&Query::new(hunk, projection, config), &mut trace)
    } else {
        locate_text(&Query::new(hunk, projection, config), &mut trace)
    };

    match &outcome {
        LocateOutcome::Found(located) => debug!(
            hunk = %hunk.id,
            strategy = %located.strategy,
            confidence = located.confidence,
            "located"
        ),
        LocateOutcome::NotFound { reason, candidates } => debug!(
            hunk = %hunk.id,
            candidates = candidates.len(),
            "not located: {reason}"
        ),
    }
    LocateResult { outcome, trace }
}

fn not_found(reason: impl Into<String>, candidates: Vec<Candidate>) -> LocateOutcome {
    LocateOutcome::NotFound {
        reason: reason.into(),
        candidates,
    }
}

/// Reasons a snippet is refused before any strategy runs.
fn guardrail(query: &Query<'_>) -> Option<String> {
    let snippet_chars = query.snippet.chars().count();
    let text_chars = query.projection.char_len();
    if snippet_chars as f64 > query.config.max_snippet_ratio * text_chars as f64 {
        return Some(format!(
            "snippet of {snippet_chars} chars exceeds {:.0}% of the {text_chars}-char document",
            query.config.max_snippet_ratio * 100.0
        ));
    }
    if snippet_chars < query.config.min_snippet_chars && !query.has_context() {
        return Some(format!(
            "snippet of {snippet_chars} chars is too short to match without context"
        ));
    }
    None
}

fn locate_text(query: &Query<'_>, trace: &mut LocateTrace) -> LocateOutcome {
    if let Some(reason) = guardrail(query) {
        trace.note_general(format!("guardrail: {reason}"));
        return not_found(reason, Vec::new());
    }

    for strategy in STRATEGY_CHAIN {
        let Some(raw) = strategy(query, trace) else {
            continue;
        };
        if let Some(located) = accept(query, &raw, trace) {
            return LocateOutcome::Found(located);
        }
    }

    let candidates = find_candidates(query);
    trace.note_general(format!("no strategy matched; {} candidates", candidates.len()));
    not_found("no strategy matched", candidates)
}

fn locate_insertion(query: &Query<'_>, trace: &mut LocateTrace) -> LocateOutcome {
    let Some(raw) = strategies::insertion_point(query, trace) else {
        return not_found("no anchor for insertion", Vec::new());
    };
    match accept(query, &raw, trace) {
        Some(located) => LocateOutcome::Found(located),
        None => not_found("insertion point below confidence floor", Vec::new()),
    }
}

/// Score a raw match and map it to document coordinates if it clears the floor.
fn accept(query: &Query<'_>, raw: &RawMatch, trace: &mut LocateTrace) -> Option<LocatedMatch> {
    let confidence = score::score_match(
        raw.strategy,
        raw.penalty,
        query.text,
        raw.bytes.clone(),
        query.context_before,
        query.context_after,
        query.config,
    );
    if confidence < query.config.accept_floor {
        trace.note(
            raw.strategy,
            format!("rejected: confidence {confidence:.2} below floor"),
        );
        return None;
    }
    let range = cover_matched_text(query.projection, raw.bytes.clone());
    trace.note(
        raw.strategy,
        format!("accepted {}..{} at confidence {confidence:.2}", range.start, range.end),
    );
    Some(LocatedMatch {
        range,
        confidence,
        strategy: raw.strategy,
    })
}

/// Map a byte range to document coordinates, extending the end when the
/// mapped range spans fewer UTF-16 units than the matched text.
fn cover_matched_text(projection: &Projection, bytes: Range<usize>) -> Range<usize> {
    let range = projection.to_document_range(bytes.clone());
    let needed = projection.text().get(bytes).map_or(0, utf16_len);
    if range.end - range.start >= needed {
        return range;
    }
    let limit = projection
        .blocks()
        .iter()
        .find(|b| b.doc.start <= range.start && range.start < b.doc.end)
        .map_or(projection.content_size(), |b| b.doc.end - 1);
    range.start..(range.start + needed).min(limit).max(range.end)
}

/// Every raw occurrence of the snippet, scored no higher than the candidate
/// ceiling.
fn find_candidates(query: &Query<'_>) -> Vec<Candidate> {
    if guardrail(query).is_some() {
        return Vec::new();
    }
    let whole = 0..query.text.len();
    let mut occurrences = find_exact(query.text, whole.clone(), query.snippet);
    for m in find_flexible(query.text, whole, query.snippet) {
        if !occurrences.iter().any(|o| o.start == m.start) {
            occurrences.push(m);
        }
    }

    let ceiling = score::base_confidence(Strategy::Candidate);
    let mut candidates: Vec<Candidate> = occurrences
        .into_iter()
        .map(|bytes| {
            let context = score::context_similarity(
                query.text,
                bytes.clone(),
                query.context_before,
                query.context_after,
            );
            let confidence = score::blend(ceiling, context, query.config).min(ceiling);
            let surrounding_context = format!(
                "{}[{}]{}",
                tail_chars(query.text, bytes.start, CANDIDATE_CONTEXT_CHARS),
                &query.text[bytes.clone()],
                head_chars(query.text, bytes.end, CANDIDATE_CONTEXT_CHARS),
            );
            Candidate {
                range: query.projection.to_document_range(bytes),
                confidence,
                surrounding_context,
            }
        })
        .collect();
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    candidates.truncate(query.config.max_candidates);
    candidates
}
