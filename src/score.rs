//! Confidence scoring.
//!
//! A located range's confidence blends the strategy's intrinsic confidence
//! with an independent check of how well the text around the range matches
//! the hunk's declared context.

use std::ops::Range;

use crate::config::EngineConfig;
use crate::locate::Strategy;
use crate::locate::levenshtein;
use crate::locate::normalize::{head_chars, tail_chars};

/// Intrinsic confidence of each strategy.
pub const fn base_confidence(strategy: Strategy) -> f64 {
    match strategy {
        Strategy::WholeDocument => 1.0,
        Strategy::ExactSubstring => 0.95,
        Strategy::ContextAnchored | Strategy::WhitespaceNormalized | Strategy::InsertionPoint => 0.9,
        Strategy::Structural | Strategy::ElementSignature => 0.85,
        Strategy::Fuzzy => 0.75,
        Strategy::LineHinted => 0.7,
        Strategy::Candidate => 0.5,
    }
}

/// Similarity between the text around `bytes` and the declared context.
///
/// Returns `None` when the hunk declares no context, so the blend falls back
/// to the strategy's own confidence.
pub fn context_similarity(
    text: &str,
    bytes: Range<usize>,
    context_before: Option<&str>,
    context_after: Option<&str>,
) -> Option<f64> {
    let mut scores = Vec::with_capacity(2);
    if let Some(before) = context_before.filter(|c| !c.trim().is_empty()) {
        let actual = tail_chars(text, bytes.start, before.chars().count());
        scores.push(levenshtein::normalized_similarity(actual, before));
    }
    if let Some(after) = context_after.filter(|c| !c.trim().is_empty()) {
        let actual = head_chars(text, bytes.end, after.chars().count());
        scores.push(levenshtein::normalized_similarity(actual, after));
    }
    if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}

/// Blend a strategy's intrinsic confidence with context similarity, clamped to `[0, 1]`.
pub fn blend(base: f64, context: Option<f64>, config: &EngineConfig) -> f64 {
    let score = match context {
        Some(similarity) => {
            (1.0 - config.context_weight).mul_add(base, config.context_weight * similarity)
        }
        None => base,
    };
    score.clamp(0.0, 1.0)
}

/// Score a raw match produced by `strategy`, after any strategy-specific penalty.
pub fn score_match(
    strategy: Strategy,
    penalty: f64,
    text: &str,
    bytes: Range<usize>,
    context_before: Option<&str>,
    context_after: Option<&str>,
    config: &EngineConfig,
) -> f64 {
    let base = base_confidence(strategy) - penalty;
    blend(
        base,
        context_similarity(text, bytes, context_before, context_after),
        config,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_context_keeps_base() {
        let config = EngineConfig::default();
        let score = score_match(Strategy::ExactSubstring, 0.0, "abc", 0..3, None, None, &config);
        assert!(score >= 0.95);
    }

    #[test]
    fn test_matching_context_raises_score() {
        let config = EngineConfig::default();
        let text = "The cat sat on the mat.";
        let score = score_match(
            Strategy::ContextAnchored,
            0.0,
            text,
            4..7,
            Some("The "),
            None,
            &config,
        );
        assert!((score - 0.93).abs() < 1e-9);
    }

    #[test]
    fn test_mismatched_context_lowers_score() {
        let config = EngineConfig::default();
        let text = "The cat sat on the mat.";
        let good = context_similarity(text, 4..7, None, Some(" sat on")).expect("context");
        let bad = context_similarity(text, 4..7, None, Some(" ran off")).expect("context");
        assert!(good > bad);
        assert!((good - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_blend_clamps() {
        let config = EngineConfig::default();
        assert!((blend(1.4, None, &config) - 1.0).abs() < f64::EPSILON);
        assert!(blend(-0.2, Some(0.0), &config).abs() < f64::EPSILON);
    }
}
