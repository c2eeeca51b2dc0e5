//! Structural matching for non-text elements (tables, images).
//!
//! An element is identified by a composite signature: a hash of its content,
//! a shape signature, and a hash of the text around it. Each part contributes
//! a weighted score so an element still matches when only its neighbourhood
//! or only its content drifted.

use crate::document::{ElementSpan, Node, NodeKind, Projection};
use crate::hunk::{DiffHunk, ElementType};

use super::normalize::{collapse_ws, head_chars, tail_chars};
use super::{LocateTrace, Strategy, levenshtein};
use crate::score;

const CONTENT_WEIGHT: f64 = 0.5;
const SHAPE_WEIGHT: f64 = 0.3;
const CONTEXT_WEIGHT: f64 = 0.2;
/// Characters of surrounding text hashed on each side.
const CONTEXT_CHARS: usize = 50;
/// Minimum score for an element to be accepted.
pub const ELEMENT_ACCEPT: f64 = 0.5;
/// Scale applied to plain-content similarity when no identifier is supplied.
const UNSIGNED_SCALE: f64 = 0.85;

/// Scores closer than this count as a tie.
const TIE_EPSILON: f64 = 1e-9;
/// Score reported when several elements match equally and context cannot
/// separate them.
const TIED_SCORE: f64 = ELEMENT_ACCEPT;
/// Context similarity lead needed to pick one of several tied elements.
const CONTEXT_MARGIN: f64 = 0.2;

const HASH_HEX_LEN: usize = 16;

fn hash_text(text: &str) -> String {
    let full_hex = blake3::hash(text.as_bytes()).to_hex().to_string();
    full_hex[..HASH_HEX_LEN.min(full_hex.len())].to_owned()
}

/// Composite identity of a table or image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSignature {
    pub content: String,
    pub shape: String,
    pub context: String,
}

impl ElementSignature {
    /// Signature of an element as it sits in `projection`.
    pub fn of(span: &ElementSpan, projection: &Projection) -> Self {
        let text = projection.text();
        let before = tail_chars(text, span.bytes.start, CONTEXT_CHARS);
        let after = head_chars(text, span.bytes.end, CONTEXT_CHARS);
        Self {
            content: hash_text(&collapse_ws(&span.node.plain_text())),
            shape: shape_of(&span.node),
            context: hash_text(&format!("{}|{}", collapse_ws(before), collapse_ws(after))),
        }
    }

    /// Parse an identifier of the form `content:<hash>|shape:<sig>|ctx:<hash>`.
    ///
    /// Parts may appear in any order; unknown parts are ignored. Returns
    /// `None` if no known part is present.
    pub fn parse(identifier: &str) -> Option<Self> {
        let mut signature = Self {
            content: String::new(),
            shape: String::new(),
            context: String::new(),
        };
        for part in identifier.split('|') {
            match part.trim().split_once(':') {
                Some(("content", v)) => v.clone_into(&mut signature.content),
                Some(("shape", v)) => v.clone_into(&mut signature.shape),
                Some(("ctx", v)) => v.clone_into(&mut signature.context),
                _ => {}
            }
        }
        let empty =
            signature.content.is_empty() && signature.shape.is_empty() && signature.context.is_empty();
        (!empty).then_some(signature)
    }

    pub fn to_identifier(&self) -> String {
        format!("content:{}|shape:{}|ctx:{}", self.content, self.shape, self.context)
    }

    /// Weighted agreement with another signature, in `[0, 1]`.
    pub fn score(&self, other: &Self) -> f64 {
        let part = |a: &str, b: &str, weight: f64| {
            if !a.is_empty() && a == b { weight } else { 0.0 }
        };
        part(&self.content, &other.content, CONTENT_WEIGHT)
            + part(&self.shape, &other.shape, SHAPE_WEIGHT)
            + part(&self.context, &other.context, CONTEXT_WEIGHT)
    }
}

fn shape_of(node: &Node) -> String {
    match node {
        Node::Table { rows } => {
            let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
            format!("table:{}x{cols}", rows.len())
        }
        Node::Image { src, .. } => {
            let ext = src
                .rsplit_once('.')
                .map_or("", |(_, ext)| ext)
                .to_ascii_lowercase();
            format!("image:{ext}")
        }
        Node::CodeBlock { language, code } => {
            format!("code:{}:{}", language.as_deref().unwrap_or(""), code.lines().count())
        }
        other => format!("{:?}", other.kind()).to_lowercase(),
    }
}

/// Locate the table or image a hunk targets. Returns the element's document
/// range and its match score.
pub fn locate_element(
    hunk: &DiffHunk,
    projection: &Projection,
    trace: &mut LocateTrace,
) -> Option<(std::ops::Range<usize>, f64)> {
    let wanted = match hunk.element_type {
        ElementType::Table => NodeKind::Table,
        ElementType::Image => NodeKind::Image,
        _ => return None,
    };
    let target = hunk
        .element_identifier
        .as_deref()
        .and_then(ElementSignature::parse);

    let scored: Vec<(f64, &ElementSpan)> = projection
        .elements()
        .iter()
        .filter(|e| e.kind == wanted)
        .map(|span| {
            let score = match &target {
                Some(target) => target.score(&ElementSignature::of(span, projection)),
                None => {
                    levenshtein::normalized_similarity(&span.node.plain_text(), &hunk.original_snippet)
                        * UNSIGNED_SCALE
                }
            };
            (score, span)
        })
        .collect();

    let Some(score) = scored.iter().map(|(score, _)| *score).max_by(f64::total_cmp) else {
        trace.note(Strategy::ElementSignature, format!("no {wanted:?} elements in document"));
        return None;
    };
    if score < ELEMENT_ACCEPT {
        trace.note(
            Strategy::ElementSignature,
            format!("best element score {score:.2} below threshold"),
        );
        return None;
    }

    let tied: Vec<&ElementSpan> = scored
        .iter()
        .filter(|(s, _)| score - s < TIE_EPSILON)
        .map(|(_, span)| *span)
        .collect();
    if let [span] = tied.as_slice() {
        trace.note(Strategy::ElementSignature, format!("element matched with score {score:.2}"));
        return Some((span.doc.clone(), score));
    }

    if let Some(span) = pick_by_context(hunk, projection, &tied) {
        trace.note(
            Strategy::ElementSignature,
            format!("{} elements tie at {score:.2}; context picked one", tied.len()),
        );
        return Some((span.doc.clone(), score));
    }
    trace.note(
        Strategy::ElementSignature,
        format!(
            "{} elements tie at {score:.2}; using the first at reduced confidence",
            tied.len()
        ),
    );
    Some((tied[0].doc.clone(), TIED_SCORE.min(score)))
}

/// The tied element whose surroundings clearly best match the hunk's context.
fn pick_by_context<'a>(
    hunk: &DiffHunk,
    projection: &Projection,
    tied: &[&'a ElementSpan],
) -> Option<&'a ElementSpan> {
    let mut by_context: Vec<(f64, &ElementSpan)> = tied
        .iter()
        .map(|span| {
            let similarity = score::context_similarity(
                projection.text(),
                span.bytes.clone(),
                hunk.context_before.as_deref(),
                hunk.context_after.as_deref(),
            )?;
            Some((similarity, *span))
        })
        .collect::<Option<_>>()?;
    by_context.sort_by(|a, b| b.0.total_cmp(&a.0));
    (by_context[0].0 - by_context[1].0 >= CONTEXT_MARGIN).then_some(by_context[0].1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn doc() -> Document {
        Document::new(vec![
            Node::paragraph("Quarterly numbers"),
            Node::table(&[&["q1", "10"], &["q2", "20"]]),
            Node::paragraph("Between"),
            Node::table(&[&["q1", "10"], &["q2", "20"]]),
            Node::paragraph("Closing remarks"),
            Node::image("chart.PNG", Some("chart")),
        ])
    }

    #[test]
    fn test_identifier_roundtrip() {
        let projection = Projection::new(&doc());
        let signature = ElementSignature::of(&projection.elements()[0], &projection);
        let parsed = ElementSignature::parse(&signature.to_identifier()).expect("parse");
        assert_eq!(parsed, signature);
        assert!((signature.score(&parsed) - 1.0).abs() < 1e-9);
        assert_eq!(signature.shape, "table:2x2");
    }

    #[test]
    fn test_context_hash_separates_identical_tables() {
        let projection = Projection::new(&doc());
        let second = ElementSignature::of(&projection.elements()[1], &projection);
        let mut hunk = DiffHunk::edit("t", "", "").with_element(ElementType::Table);
        hunk.element_identifier = Some(second.to_identifier());
        let (range, score) =
            locate_element(&hunk, &projection, &mut LocateTrace::default()).expect("located");
        assert_eq!(range, projection.elements()[1].doc);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_tied_tables_without_context_score_low() {
        let projection = Projection::new(&doc());
        let snippet = projection.elements()[0].node.plain_text();
        let hunk = DiffHunk::edit("t", &snippet, "").with_element(ElementType::Table);
        let mut trace = LocateTrace::default();
        let (range, score) = locate_element(&hunk, &projection, &mut trace).expect("located");
        assert_eq!(range, projection.elements()[0].doc);
        assert!((score - TIED_SCORE).abs() < 1e-9);
        assert!(trace.events().iter().any(|e| e.message.contains("reduced confidence")));
    }

    #[test]
    fn test_context_breaks_table_tie() {
        let projection = Projection::new(&doc());
        let snippet = projection.elements()[0].node.plain_text();
        let hunk = DiffHunk::edit("t", &snippet, "")
            .with_element(ElementType::Table)
            .with_context(Some("Between"), None);
        let (range, score) =
            locate_element(&hunk, &projection, &mut LocateTrace::default()).expect("located");
        assert_eq!(range, projection.elements()[1].doc);
        assert!((score - UNSIGNED_SCALE).abs() < 1e-9);
    }

    #[test]
    fn test_image_without_identifier_uses_content() {
        let projection = Projection::new(&doc());
        let hunk = DiffHunk::edit("i", "chart chart.PNG", "").with_element(ElementType::Image);
        let (range, _) =
            locate_element(&hunk, &projection, &mut LocateTrace::default()).expect("located");
        assert_eq!(range, projection.elements()[2].doc);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ElementSignature::parse("nothing useful").is_none());
        let partial = ElementSignature::parse("shape:image:png").expect("partial");
        assert_eq!(partial.shape, "image:png");
    }
}
