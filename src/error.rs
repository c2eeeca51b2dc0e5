//! Error types for the docdiff crate.

/// Engine error types.
///
/// The first four variants mirror the per-hunk failure taxonomy: they are
/// reported against a single hunk and never abort work on the others.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// No strategy produced an accepted match for the hunk.
    #[error("could not locate hunk {hunk_id}: {reason}")]
    LocationFailure { hunk_id: String, reason: String },

    /// The hunk was located but below the low-confidence threshold.
    #[error("low-confidence match for hunk {hunk_id} ({confidence:.2})")]
    LowConfidenceMatch { hunk_id: String, confidence: f64 },

    /// Live document content at the located range no longer resembles the original.
    #[error("hunk {hunk_id} no longer matches the document (similarity {similarity:.2})")]
    ValidationFailure { hunk_id: String, similarity: f64 },

    /// Building the overlay for one hunk failed.
    #[error("failed to render overlay for hunk {hunk_id}: {reason}")]
    RenderFailure { hunk_id: String, reason: String },

    /// A position or range falls outside the document.
    #[error("invalid range {from}..{to} (document content size {size})")]
    InvalidRange { from: usize, to: usize, size: usize },

    /// The in-memory document cannot perform this mutation.
    #[error("unsupported mutation: {0}")]
    UnsupportedMutation(String),

    /// An input exceeded a size limit.
    #[error("input too large: {len} bytes (limit {limit})")]
    InputTooLarge { len: usize, limit: usize },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error with context.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience result type for docdiff operations.
pub type DiffResult<T> = Result<T, DiffError>;

impl DiffError {
    /// The hunk a per-hunk failure refers to.
    pub fn hunk_id(&self) -> Option<&str> {
        match self {
            Self::LocationFailure { hunk_id, .. }
            | Self::LowConfidenceMatch { hunk_id, .. }
            | Self::ValidationFailure { hunk_id, .. }
            | Self::RenderFailure { hunk_id, .. } => Some(hunk_id),
            _ => None,
        }
    }
}
