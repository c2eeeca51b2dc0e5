//! Engine configuration.
//!
//! Every threshold used by the locator, scorer, session and renderer lives
//! here so a host can tune them without recompiling. Missing fields fall back
//! to [`EngineConfig::default`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DiffError, DiffResult};

/// Tunable thresholds for locating, scoring and rendering hunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Minimum normalized edit-distance similarity for a fuzzy window.
    pub fuzzy_threshold: f64,
    /// Minimum similarity between declared and actual context for a fuzzy match.
    pub fuzzy_context_floor: f64,
    /// Fuzzy scanning is skipped for projections longer than this (chars).
    pub fuzzy_max_text_chars: usize,
    /// Snippets shorter than this (chars) need context to be matched.
    pub min_snippet_chars: usize,
    /// Snippets longer than this fraction of the projection are rejected.
    pub max_snippet_ratio: f64,
    /// Matches scoring below this are never accepted.
    pub accept_floor: f64,
    /// Matches scoring below this are flagged as low confidence.
    pub low_confidence_threshold: f64,
    /// Weight of context similarity when blending confidence.
    pub context_weight: f64,
    /// Projections longer than this (chars) render only the visible viewport.
    pub large_document_chars: usize,
    /// Live text must be at least this similar to `original_code` to apply.
    pub validation_floor: f64,
    /// Extra lines searched on each side of a line hint.
    pub line_slack: usize,
    /// Context-anchored search window, as a multiple of the snippet length.
    pub context_window_factor: usize,
    /// Constant added to the context-anchored search window (bytes).
    pub context_window_padding: usize,
    /// Maximum number of fallback candidates kept for a failed hunk.
    pub max_candidates: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.7,
            fuzzy_context_floor: 0.3,
            fuzzy_max_text_chars: 200_000,
            min_snippet_chars: 5,
            max_snippet_ratio: 0.5,
            accept_floor: 0.5,
            low_confidence_threshold: 0.7,
            context_weight: 0.3,
            large_document_chars: 10_000,
            validation_floor: 0.8,
            line_slack: 2,
            context_window_factor: 10,
            context_window_padding: 512,
            max_candidates: 20,
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file(path: &Path) -> DiffResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| DiffError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"fuzzyThreshold": 0.8}"#).expect("parse");
        assert!((config.fuzzy_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.min_snippet_chars, 5);
        assert_eq!(config.large_document_chars, 10_000);
    }
}
