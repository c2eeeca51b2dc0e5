//! Matching strategies, tried in order by [`super::locate`].
//!
//! Every strategy has the same signature: it receives the query and the
//! per-call trace, and returns at most one raw match as a byte range in the
//! projected text. Scoring and acceptance happen in the orchestrator.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use super::normalize::{
    ceil_boundary, find_exact, find_flexible, floor_boundary, line_starts,
};
use super::{LocateTrace, Query, RawMatch, Strategy, levenshtein};
use crate::document::NodeKind;
use crate::score;

/// Penalty when only the whitespace-normalized form matched.
const NORMALIZED_PENALTY: f64 = 0.05;
/// Penalty when the snippet occurs more than once and context cannot tell them apart.
const AMBIGUITY_PENALTY: f64 = 0.3;
/// Penalty when `context_after` does not follow the match.
const CONTEXT_AFTER_PENALTY: f64 = 0.1;
/// Penalty when the context was found but the snippet was not near it.
const DETACHED_CONTEXT_PENALTY: f64 = 0.2;
/// Minimum gap between best and runner-up context similarity to call an
/// ambiguous match disambiguated.
const DISAMBIGUATION_MARGIN: f64 = 0.2;

// ---------------------------------------------------------------------------
// Strategy 1: context-anchored
// ---------------------------------------------------------------------------

/// Find `context_before`, then the snippet in a bounded window after it.
///
/// Falls back to anchoring on `context_after` (searching backwards) when
/// `context_before` is not declared or does not occur in the text.
pub fn context_anchored(query: &Query<'_>, trace: &mut LocateTrace) -> Option<RawMatch> {
    let Some(before) = query.context_before else {
        return query.context_after.and_then(|after| anchored_on_after(query, after, trace));
    };

    let anchors = find_context(query.text, before);
    if anchors.is_empty() {
        trace.note(Strategy::ContextAnchored, "context_before not found");
        return query.context_after.and_then(|after| anchored_on_after(query, after, trace));
    }

    let window_len = window_len(query);
    let mut best: Option<(usize, RawMatch)> = None;
    for anchor in &anchors {
        let window = anchor.end..ceil_boundary(query.text, anchor.end + window_len);

        let (found, penalty) = match find_exact(query.text, window.clone(), query.snippet).first() {
            Some(m) => (Some(m.clone()), 0.0),
            None => (
                find_flexible(query.text, window, query.snippet).first().cloned(),
                NORMALIZED_PENALTY,
            ),
        };
        let Some(bytes) = found else {
            continue;
        };
        let gap = bytes.start - anchor.end;
        if best.as_ref().is_none_or(|(best_gap, _)| gap < *best_gap) {
            best = Some((
                gap,
                RawMatch {
                    bytes,
                    strategy: Strategy::ContextAnchored,
                    penalty,
                },
            ));
        }
    }

    let mut raw = match best {
        Some((gap, raw)) => {
            trace.note(
                Strategy::ContextAnchored,
                format!("snippet found {gap} bytes after context_before"),
            );
            raw
        }
        None => {
            // Context exists but the snippet is not near it: direct search,
            // preferring the occurrence closest to the first anchor.
            let anchor_end = anchors[0].end;
            let Some(bytes) = find_exact(query.text, 0..query.text.len(), query.snippet)
                .into_iter()
                .min_by_key(|m| m.start.abs_diff(anchor_end))
            else {
                trace.note(Strategy::ContextAnchored, "snippet not found near context_before");
                return None;
            };
            trace.note(
                Strategy::ContextAnchored,
                "snippet found by direct search away from context_before",
            );
            RawMatch {
                bytes,
                strategy: Strategy::ContextAnchored,
                penalty: DETACHED_CONTEXT_PENALTY,
            }
        }
    };

    // A different tail is expected after an edit, so a mismatch only lowers confidence.
    if let Some(after) = query.context_after {
        if !follows(query.text, raw.bytes.end, after) {
            trace.note(
                Strategy::ContextAnchored,
                "context_after does not follow the match; keeping it with reduced confidence",
            );
            raw.penalty += CONTEXT_AFTER_PENALTY;
        }
    }
    Some(raw)
}

fn anchored_on_after(query: &Query<'_>, after: &str, trace: &mut LocateTrace) -> Option<RawMatch> {
    let anchors = find_context(query.text, after);
    if anchors.is_empty() {
        trace.note(Strategy::ContextAnchored, "context_after not found");
        return None;
    }
    let window_len = window_len(query);
    for anchor in &anchors {
        let window = floor_boundary(query.text, anchor.start.saturating_sub(window_len))..anchor.start;
        if let Some(bytes) = find_exact(query.text, window.clone(), query.snippet).pop() {
            trace.note(Strategy::ContextAnchored, "snippet found before context_after");
            return Some(RawMatch {
                bytes,
                strategy: Strategy::ContextAnchored,
                penalty: 0.0,
            });
        }
        if let Some(bytes) = find_flexible(query.text, window, query.snippet).pop() {
            trace.note(
                Strategy::ContextAnchored,
                "normalized snippet found before context_after",
            );
            return Some(RawMatch {
                bytes,
                strategy: Strategy::ContextAnchored,
                penalty: NORMALIZED_PENALTY,
            });
        }
    }
    trace.note(Strategy::ContextAnchored, "snippet not found near context_after");
    None
}

fn window_len(query: &Query<'_>) -> usize {
    query.snippet.len() * query.config.context_window_factor + query.config.context_window_padding
}

/// Occurrences of a context string, exact first, then whitespace-flexible.
pub(crate) fn find_context(text: &str, context: &str) -> Vec<Range<usize>> {
    let exact = find_exact(text, 0..text.len(), context);
    if !exact.is_empty() {
        return exact;
    }
    find_flexible(text, 0..text.len(), context)
}

/// Whether the text at `at` continues with `context` (whitespace-insensitive).
pub(crate) fn follows(text: &str, at: usize, context: &str) -> bool {
    let expected = super::normalize::collapse_ws(context);
    if expected.is_empty() {
        return true;
    }
    let actual = super::normalize::collapse_ws(super::normalize::head_chars(
        text,
        at,
        context.chars().count() + 1,
    ));
    actual.starts_with(&expected)
        || levenshtein::similarity(&actual, &expected) >= 0.8
}

// ---------------------------------------------------------------------------
// Strategy 2: direct substring (exact, then whitespace-normalized)
// ---------------------------------------------------------------------------

/// Search the whole projection for the snippet.
pub fn direct_substring(query: &Query<'_>, trace: &mut LocateTrace) -> Option<RawMatch> {
    let whole = 0..query.text.len();
    let exact = find_exact(query.text, whole.clone(), query.snippet);
    if !exact.is_empty() {
        return Some(pick_occurrence(query, exact, Strategy::ExactSubstring, 0.0, trace));
    }
    let flexible = find_flexible(query.text, whole, query.snippet);
    if !flexible.is_empty() {
        return Some(pick_occurrence(
            query,
            flexible,
            Strategy::WhitespaceNormalized,
            0.0,
            trace,
        ));
    }
    trace.note(Strategy::ExactSubstring, "snippet not found");
    None
}

/// Choose among occurrences; more than one without distinguishing context is penalized.
fn pick_occurrence(
    query: &Query<'_>,
    occurrences: Vec<Range<usize>>,
    strategy: Strategy,
    penalty: f64,
    trace: &mut LocateTrace,
) -> RawMatch {
    let count = occurrences.len();
    if count == 1 {
        let bytes = occurrences.into_iter().next().unwrap_or_default();
        trace.note(strategy, "unique occurrence");
        return RawMatch {
            bytes,
            strategy,
            penalty,
        };
    }

    let mut scored: Vec<(f64, Range<usize>)> = occurrences
        .into_iter()
        .map(|bytes| {
            let similarity = score::context_similarity(
                query.text,
                bytes.clone(),
                query.context_before,
                query.context_after,
            )
            .unwrap_or(0.0);
            (similarity, bytes)
        })
        .collect();
    // Stable sort keeps document order among equal scores.
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let top = scored[0].0;
    if top - scored[1].0 >= DISAMBIGUATION_MARGIN {
        trace.note(strategy, format!("{count} occurrences, context picked one"));
        return RawMatch {
            bytes: scored.swap_remove(0).1,
            strategy,
            penalty,
        };
    }

    let tied: Vec<Range<usize>> = scored
        .iter()
        .filter(|(similarity, _)| top - similarity < DISAMBIGUATION_MARGIN)
        .map(|(_, bytes)| bytes.clone())
        .collect();
    if let Some(raw) = hinted_occurrence(query, &tied, strategy, penalty, trace) {
        return raw;
    }

    trace.note(strategy, format!("{count} occurrences, ambiguous"));
    RawMatch {
        bytes: scored.swap_remove(0).1,
        strategy,
        penalty: penalty + AMBIGUITY_PENALTY,
    }
}

/// Break a tie between occurrences with the hunk's positional or line hint.
///
/// An occurrence that is alone inside the hinted block or the hinted lines is
/// taken without an ambiguity penalty. Several occurrences inside the hinted
/// lines resolve to the one nearest the hinted line, still penalized.
fn hinted_occurrence(
    query: &Query<'_>,
    tied: &[Range<usize>],
    strategy: Strategy,
    penalty: f64,
    trace: &mut LocateTrace,
) -> Option<RawMatch> {
    let within = |window: &Range<usize>| -> Vec<&Range<usize>> {
        tied.iter()
            .filter(|b| window.start <= b.start && b.end <= window.end)
            .collect()
    };

    if let Some((n, Some(block))) = hinted_block(query) {
        if let [only] = within(&block).as_slice() {
            trace.note(
                Strategy::Structural,
                format!("{} occurrences, block {n} picked one", tied.len()),
            );
            return Some(RawMatch {
                bytes: (*only).clone(),
                strategy: Strategy::Structural,
                penalty,
            });
        }
    }

    let window = hinted_window(query)?;
    let hinted_start = hinted_line_start(query).unwrap_or(window.start);
    let mut inside = within(&window);
    inside.sort_by_key(|b| b.start.abs_diff(hinted_start));
    match inside.as_slice() {
        [] => None,
        [only] => {
            trace.note(
                Strategy::LineHinted,
                format!("{} occurrences, line hint picked one", tied.len()),
            );
            Some(RawMatch {
                bytes: (*only).clone(),
                strategy: Strategy::LineHinted,
                penalty,
            })
        }
        [nearest, ..] => {
            trace.note(
                strategy,
                format!(
                    "{} occurrences in the hinted lines, ambiguous; using the nearest",
                    inside.len()
                ),
            );
            Some(RawMatch {
                bytes: (*nearest).clone(),
                strategy,
                penalty: penalty + AMBIGUITY_PENALTY,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy 3: fuzzy similarity
// ---------------------------------------------------------------------------

/// Products of text and snippet length up to which every window start is
/// verified. Larger inputs verify only the starts ranked best by q-grams.
const FUZZY_DENSE_BUDGET: usize = 50_000_000;
/// Character q-gram length used to rank window starts.
const QGRAM: usize = 3;
/// Window starts verified by edit distance on large inputs.
const FUZZY_VERIFY_STARTS: usize = 8;
/// Characters either side of the best ranked start re-checked for alignment.
const FUZZY_REFINE_RADIUS: usize = 8;
/// Edit-distance cells a single fuzzy search may fill.
const FUZZY_CELL_BUDGET: usize = 200_000_000;

/// Slide windows of comparable size over the text and keep the most similar.
pub fn fuzzy(query: &Query<'_>, trace: &mut LocateTrace) -> Option<RawMatch> {
    let text_chars: Vec<(usize, char)> = query.text.char_indices().collect();
    let n = text_chars.len();
    if n > query.config.fuzzy_max_text_chars {
        trace.note(Strategy::Fuzzy, format!("skipped: projection has {n} chars"));
        return None;
    }
    let snippet: Vec<char> = query.snippet.chars().collect();
    let m = snippet.len();
    if m == 0 || m > n {
        return None;
    }

    let threshold = query.config.fuzzy_threshold;
    let delta = (m / 10).max(1);
    let lengths = [m, m.saturating_sub(delta).max(1), m + delta];
    let chars: Vec<char> = text_chars.iter().map(|&(_, c)| c).collect();
    let dense = n.saturating_mul(m).saturating_mul(m) <= FUZZY_DENSE_BUDGET;
    let starts: Vec<usize> = if dense {
        (0..n).collect()
    } else {
        ranked_starts(&chars, &snippet, threshold)
    };

    let mut cells = 0usize;
    let mut exhausted = false;
    let mut similarity_at = |start: usize, len: usize| -> Option<f64> {
        if exhausted || start + len > n {
            return None;
        }
        let longest = len.max(m);
        let max_edits = allowed_edits(threshold, longest);
        cells += len * (2 * max_edits + 1);
        if cells > FUZZY_CELL_BUDGET {
            exhausted = true;
            return None;
        }
        let distance = levenshtein::distance_within(&chars[start..start + len], &snippet, max_edits)?;
        Some(1.0 - distance as f64 / longest as f64)
    };

    let mut best: Option<(f64, usize, usize)> = None; // (similarity, start, len)
    for start in starts {
        for &len in &lengths {
            let Some(sim) = similarity_at(start, len) else {
                continue;
            };
            if best.is_none_or(|(best_sim, _, _)| sim > best_sim) {
                best = Some((sim, start, len));
            }
        }
    }
    // Ranked starts are only near the best alignment; settle it locally.
    if let Some((_, found, len)) = best.filter(|_| !dense) {
        for start in found.saturating_sub(FUZZY_REFINE_RADIUS)..=found + FUZZY_REFINE_RADIUS {
            let Some(sim) = similarity_at(start, len) else {
                continue;
            };
            if best.is_none_or(|(best_sim, _, _)| sim > best_sim) {
                best = Some((sim, start, len));
            }
        }
    }
    if exhausted {
        trace.note(Strategy::Fuzzy, "work budget exhausted; keeping the best window so far");
    }

    let Some((sim, start, len)) = best else {
        trace.note(
            Strategy::Fuzzy,
            format!("no window reaches similarity {threshold:.2}"),
        );
        return None;
    };
    if sim < threshold {
        trace.note(
            Strategy::Fuzzy,
            format!("best window similarity {sim:.2} below threshold"),
        );
        return None;
    }

    let byte_start = text_chars[start].0;
    let byte_end = text_chars.get(start + len).map_or(query.text.len(), |&(idx, _)| idx);
    let bytes = byte_start..byte_end;

    if let Some(context) =
        score::context_similarity(query.text, bytes.clone(), query.context_before, query.context_after)
    {
        if context < query.config.fuzzy_context_floor {
            trace.note(
                Strategy::Fuzzy,
                format!("window similarity {sim:.2} but context similarity {context:.2} too low"),
            );
            return None;
        }
    }

    trace.note(Strategy::Fuzzy, format!("best window similarity {sim:.2}"));
    Some(RawMatch {
        bytes,
        strategy: Strategy::Fuzzy,
        penalty: (1.0 - sim) * 0.5,
    })
}

/// Most edits a window of `longest` chars may need and still reach `threshold`.
fn allowed_edits(threshold: f64, longest: usize) -> usize {
    ((1.0 - threshold).clamp(0.0, 1.0) * longest as f64 + 1e-9).floor() as usize
}

/// Window starts ordered by how many character q-grams the window of snippet
/// length shares with the snippet, best first.
///
/// Starts that cannot reach the threshold by the q-gram bound (each edit
/// destroys at most `QGRAM` q-grams) are dropped, and a kept start suppresses
/// its neighbours within half a snippet.
fn ranked_starts(chars: &[char], snippet: &[char], threshold: f64) -> Vec<usize> {
    let m = snippet.len();
    if m < QGRAM {
        return (0..=chars.len() - m).collect();
    }

    let mut wanted: HashMap<&[char], usize> = HashMap::new();
    for gram in snippet.windows(QGRAM) {
        *wanted.entry(gram).or_default() += 1;
    }
    let grams = m - QGRAM + 1;
    let min_shared = grams
        .saturating_sub(allowed_edits(threshold, m) * QGRAM)
        .max(1);

    let mut seen: HashMap<&[char], usize> = HashMap::new();
    let mut shared = 0usize;
    let mut scored: Vec<(usize, usize)> = Vec::new(); // (shared, start)
    for (i, gram) in chars.windows(QGRAM).enumerate() {
        let count = seen.entry(gram).or_default();
        *count += 1;
        if *count <= wanted.get(gram).copied().unwrap_or(0) {
            shared += 1;
        }
        if i + 1 < grams {
            continue;
        }
        let start = i + 1 - grams;
        if shared >= min_shared {
            scored.push((shared, start));
        }
        let leaving = &chars[start..start + QGRAM];
        if let Some(count) = seen.get_mut(leaving) {
            if *count <= wanted.get(leaving).copied().unwrap_or(0) {
                shared -= 1;
            }
            *count -= 1;
        }
    }

    // Stable sort keeps the earliest start among equal counts.
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    let spacing = (m / 2).max(1);
    let mut chosen: Vec<usize> = Vec::with_capacity(FUZZY_VERIFY_STARTS);
    for (_, start) in scored {
        if chosen.iter().all(|&c| c.abs_diff(start) >= spacing) {
            chosen.push(start);
            if chosen.len() == FUZZY_VERIFY_STARTS {
                break;
            }
        }
    }
    chosen
}

// ---------------------------------------------------------------------------
// Strategy 4: structural (positional hint in the context)
// ---------------------------------------------------------------------------

/// Which blocks a positional hint counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFilter {
    Paragraph,
    Heading,
    Any,
}

static HINT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(?P<kind>paragraph|para|heading|block)\s*(?:#|no\.?|number)?\s*(?P<n>\d+)\b",
        r"(?i)\b(?P<n>\d+)(?:st|nd|rd|th)?\s+(?P<kind>paragraph|heading|block)\b",
        r"第\s*(?P<n>\d+)\s*(?P<kind>段|个段落|个标题|个块)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Parse a positional hint such as "paragraph 3", "2nd heading" or "第3段".
pub fn parse_position_hint(context: &str) -> Option<(BlockFilter, usize)> {
    for re in HINT_PATTERNS.iter() {
        let Some(caps) = re.captures(context) else {
            continue;
        };
        let n: usize = caps.name("n")?.as_str().parse().ok()?;
        if n == 0 {
            continue;
        }
        let kind = caps.name("kind").map_or("", |k| k.as_str()).to_lowercase();
        let filter = match kind.as_str() {
            "paragraph" | "para" | "段" | "个段落" => BlockFilter::Paragraph,
            "heading" | "个标题" => BlockFilter::Heading,
            _ => BlockFilter::Any,
        };
        return Some((filter, n));
    }
    None
}

/// The block number a positional hint in the context names, and that block's
/// byte range if the document has it.
fn hinted_block(query: &Query<'_>) -> Option<(usize, Option<Range<usize>>)> {
    let (filter, n) = [query.context_before, query.context_after]
        .into_iter()
        .flatten()
        .find_map(parse_position_hint)?;

    let block = query
        .projection
        .blocks()
        .iter()
        .filter(|b| match filter {
            BlockFilter::Paragraph => b.kind == NodeKind::Paragraph,
            BlockFilter::Heading => b.kind == NodeKind::Heading,
            BlockFilter::Any => true,
        })
        .nth(n - 1)
        .map(|b| b.bytes.clone());
    Some((n, block))
}

/// Resolve an "Nth block" hint and search only inside that block.
pub fn structural(query: &Query<'_>, trace: &mut LocateTrace) -> Option<RawMatch> {
    let (n, block) = hinted_block(query)?;
    let Some(window) = block else {
        trace.note(Strategy::Structural, format!("hinted block {n} does not exist"));
        return None;
    };

    if let Some(bytes) = find_exact(query.text, window.clone(), query.snippet).into_iter().next() {
        trace.note(Strategy::Structural, format!("snippet found in block {n}"));
        return Some(RawMatch {
            bytes,
            strategy: Strategy::Structural,
            penalty: 0.0,
        });
    }
    if let Some(bytes) = find_flexible(query.text, window, query.snippet).into_iter().next() {
        trace.note(Strategy::Structural, format!("normalized snippet found in block {n}"));
        return Some(RawMatch {
            bytes,
            strategy: Strategy::Structural,
            penalty: NORMALIZED_PENALTY,
        });
    }
    trace.note(Strategy::Structural, format!("snippet not in block {n}"));
    None
}

// ---------------------------------------------------------------------------
// Strategy 5: line-hinted
// ---------------------------------------------------------------------------

/// Byte window covering the hinted lines plus slack on each side.
pub fn hinted_window(query: &Query<'_>) -> Option<Range<usize>> {
    let range = query.line_range?;
    let starts = line_starts(query.text);
    let first = range.start.max(1) - 1;
    if first >= starts.len() {
        return None;
    }
    let from_line = first.saturating_sub(query.config.line_slack);
    let to_line = (range.end.max(range.start) + query.config.line_slack).min(starts.len());
    let end = starts.get(to_line).map_or(query.text.len(), |&s| s);
    Some(starts[from_line]..end)
}

/// Byte offset where the first hinted line starts.
fn hinted_line_start(query: &Query<'_>) -> Option<usize> {
    let range = query.line_range?;
    line_starts(query.text).get(range.start.max(1) - 1).copied()
}

/// Search only the hinted lines (± slack).
pub fn line_hinted(query: &Query<'_>, trace: &mut LocateTrace) -> Option<RawMatch> {
    let window = hinted_window(query)?;
    let hinted_start = hinted_line_start(query).unwrap_or(window.start);

    let nearest = |found: Vec<Range<usize>>| {
        found
            .into_iter()
            .min_by_key(|m| m.start.abs_diff(hinted_start))
    };

    if let Some(bytes) = nearest(find_exact(query.text, window.clone(), query.snippet)) {
        trace.note(Strategy::LineHinted, "snippet found in hinted lines");
        return Some(RawMatch {
            bytes,
            strategy: Strategy::LineHinted,
            penalty: 0.0,
        });
    }
    if let Some(bytes) = nearest(find_flexible(query.text, window, query.snippet)) {
        trace.note(Strategy::LineHinted, "normalized snippet found in hinted lines");
        return Some(RawMatch {
            bytes,
            strategy: Strategy::LineHinted,
            penalty: NORMALIZED_PENALTY,
        });
    }
    trace.note(Strategy::LineHinted, "snippet not in hinted lines");
    None
}

// ---------------------------------------------------------------------------
// Insertion point (pure insertions)
// ---------------------------------------------------------------------------

/// Find where a pure insertion goes: after `context_before`, else before
/// `context_after`, else at the start of the hinted line. Returns an empty
/// byte range at the insertion point.
pub fn insertion_point(query: &Query<'_>, trace: &mut LocateTrace) -> Option<RawMatch> {
    if let Some(before) = query.context_before {
        let anchors = find_context(query.text, before);
        let confirmed = query
            .context_after
            .and_then(|after| anchors.iter().find(|a| follows(query.text, a.end, after)));
        let (anchor, penalty) = match (confirmed, anchors.len()) {
            (Some(anchor), _) => (anchor.clone(), 0.0),
            (None, 0) => {
                trace.note(Strategy::InsertionPoint, "context_before not found");
                return None;
            }
            (None, 1) => (anchors[0].clone(), 0.0),
            (None, count) => {
                trace.note(
                    Strategy::InsertionPoint,
                    format!("context_before occurs {count} times; using the first"),
                );
                (anchors[0].clone(), AMBIGUITY_PENALTY)
            }
        };
        trace.note(Strategy::InsertionPoint, "insertion point after context_before");
        return Some(RawMatch {
            bytes: anchor.end..anchor.end,
            strategy: Strategy::InsertionPoint,
            penalty,
        });
    }

    if let Some(after) = query.context_after {
        let anchors = find_context(query.text, after);
        let anchor = anchors.first()?;
        let penalty = if anchors.len() > 1 { AMBIGUITY_PENALTY } else { 0.0 };
        trace.note(Strategy::InsertionPoint, "insertion point before context_after");
        return Some(RawMatch {
            bytes: anchor.start..anchor.start,
            strategy: Strategy::InsertionPoint,
            penalty,
        });
    }

    let range = query.line_range?;
    let starts = line_starts(query.text);
    let line = range.start.max(1) - 1;
    let at = match starts.get(line) {
        Some(&at) => at,
        // One past the last line appends at the end.
        None if line == starts.len() => query.text.len(),
        None => {
            trace.note(Strategy::LineHinted, "hinted insertion line does not exist");
            return None;
        }
    };
    trace.note(Strategy::LineHinted, format!("insertion point at line {}", line + 1));
    Some(RawMatch {
        bytes: at..at,
        strategy: Strategy::LineHinted,
        penalty: 0.0,
    })
}

// ===========================================================================
// Tests
// ===========================================================================
