//! Hunk set manager.
//!
//! A [`Session`] owns the hunks of one overlay generation. It locates new
//! hunks, keeps located ranges valid across document mutations, and hands
//! the visible subset to the overlay renderer. Nothing outside this module
//! and the apply controller changes hunk state.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::document::{DocumentSource, Mutation, Projection};
use crate::error::DiffError;
use crate::hunk::{Candidate, DiffHunk, ElementType};
use crate::locate::{self, LocateOutcome, LocateTrace, levenshtein};
use crate::overlay::{self, RenderOutput};

/// Identifies one batch of proposed hunks. Later batches supersede earlier ones.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Generation(pub u64);

/// Lifecycle of a tracked hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HunkState {
    Proposed,
    Located,
    Applied,
    Rejected,
    Invalidated,
}

impl HunkState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Applied | Self::Rejected | Self::Invalidated)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedHunk {
    #[serde(flatten)]
    hunk: DiffHunk,
    state: HunkState,
}

impl TrackedHunk {
    pub const fn hunk(&self) -> &DiffHunk {
        &self.hunk
    }

    pub const fn state(&self) -> HunkState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: HunkState) {
        if state != HunkState::Located {
            self.hunk.clear_location(Vec::new());
        }
        self.state = state;
    }
}

/// A hunk that no strategy could place.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Unlocated {
    pub hunk_id: String,
    pub reason: String,
    pub candidates: Vec<Candidate>,
    pub trace: LocateTrace,
}

/// Outcome of [`Session::ingest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub generation: Generation,
    /// Hunks located by this call.
    pub located: usize,
    /// Hunks whose existing location was kept.
    pub reused: usize,
    pub unlocated: Vec<Unlocated>,
    /// Located hunks below the low-confidence threshold.
    pub low_confidence: usize,
    /// The batch belonged to an old generation and was discarded.
    pub stale: bool,
}

/// Outcome of [`Session::on_document_mutation`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationReport {
    pub remapped: usize,
    pub invalidated: Vec<String>,
    /// Notifications arrived out of order and every hunk was dropped.
    pub cleared: bool,
}

/// Map `range` through `mutations`, applied left to right.
///
/// Returns `None` when any mutation touches the inside of the range.
/// Mutations ending at or before the start shift the range; mutations
/// starting at or after the end leave it alone.
pub fn remap(range: Range<usize>, mutations: &[Mutation]) -> Option<Range<usize>> {
    let (mut start, mut end) = (range.start, range.end);
    for m in mutations {
        if m.from == m.to && m.inserted == 0 {
            continue;
        }
        if m.to <= start {
            start = start.checked_add_signed(m.delta())?;
            end = end.checked_add_signed(m.delta())?;
        } else if m.from < end {
            return None;
        }
    }
    Some(start..end)
}

/// Similarity between the live text at a hunk's range and what it expects.
/// `None` means the hunk has nothing to compare.
pub(crate) fn live_similarity(hunk: &DiffHunk, projection: &Projection) -> Option<f64> {
    let range = hunk.located_range()?;
    if range.end > projection.content_size() {
        return Some(0.0);
    }
    match hunk.element_type {
        ElementType::WholeDocumentReplace => {
            Some(if range.end == projection.content_size() { 1.0 } else { 0.0 })
        }
        ElementType::Table | ElementType::Image => Some(
            if projection.elements().iter().any(|e| e.doc == range) { 1.0 } else { 0.0 },
        ),
        ElementType::Text | ElementType::CodeBlock if hunk.is_pure_insertion() => None,
        ElementType::Text | ElementType::CodeBlock => Some(levenshtein::normalized_similarity(
            projection.text_for_doc_range(range),
            &hunk.original_snippet,
        )),
    }
}

/// The active hunk set for one document.
#[derive(Debug, Clone, Default)]
pub struct Session {
    config: EngineConfig,
    generation: Option<Generation>,
    /// The current generation was applied or rejected.
    sealed: bool,
    hunks: Vec<TrackedHunk>,
    /// Document version the located ranges refer to.
    doc_version: Option<u64>,
    viewport: Option<Range<usize>>,
}

impl Session {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    pub const fn generation(&self) -> Option<Generation> {
        self.generation
    }

    pub fn hunks(&self) -> &[TrackedHunk] {
        &self.hunks
    }

    pub fn get(&self, id: &str) -> Option<&TrackedHunk> {
        self.hunks.iter().find(|t| t.hunk.id == id)
    }

    pub(crate) fn hunks_mut(&mut self) -> &mut [TrackedHunk] {
        &mut self.hunks
    }

    /// Locate a batch of hunks against `doc`.
    ///
    /// An older generation is discarded, a newer one replaces the current
    /// set, and the current one merges: hunks already located keep their
    /// location, unlocated ones are retried.
    pub fn ingest(
        &mut self,
        generation: Generation,
        hunks: Vec<DiffHunk>,
        doc: &(impl DocumentSource + ?Sized),
    ) -> IngestReport {
        let mut report = IngestReport {
            generation,
            ..IngestReport::default()
        };
        match self.generation {
            Some(current) if generation < current || (generation == current && self.sealed) => {
                info!(generation = generation.0, current = current.0, "discarding stale hunk batch");
                report.stale = true;
                return report;
            }
            Some(current) if generation == current => {}
            _ => {
                if !self.hunks.is_empty() {
                    info!(
                        generation = generation.0,
                        superseded = self.hunks.len(),
                        "new generation supersedes active hunks"
                    );
                }
                self.hunks.clear();
                self.generation = Some(generation);
                self.sealed = false;
            }
        }

        if self.doc_version != Some(doc.version()) {
            // Locations computed against an unseen version cannot be trusted.
            for tracked in self.hunks.iter_mut().filter(|t| t.state == HunkState::Located) {
                tracked.hunk.clear_location(Vec::new());
                tracked.state = HunkState::Proposed;
            }
            self.doc_version = Some(doc.version());
        }

        let projection = Projection::new(doc);
        for hunk in hunks {
            let existing = self.hunks.iter().position(|t| t.hunk.id == hunk.id);
            if let Some(idx) = existing {
                let tracked = &self.hunks[idx];
                if tracked.hunk.same_proposal(&hunk) {
                    match tracked.state {
                        HunkState::Located => {
                            report.reused += 1;
                            continue;
                        }
                        HunkState::Proposed => {}
                        _ => continue,
                    }
                }
            }
            let tracked = locate_one(&self.config, hunk, &projection, &mut report);
            match existing {
                Some(idx) => self.hunks[idx] = tracked,
                None => self.hunks.push(tracked),
            }
        }

        info!(
            generation = generation.0,
            located = report.located,
            reused = report.reused,
            unlocated = report.unlocated.len(),
            "ingested hunk batch"
        );
        report
    }

    /// Keep located ranges valid after the host mutated the document.
    ///
    /// `version` is the document version after the mutation. Notifications
    /// must arrive in order; a gap drops every hunk.
    pub fn on_document_mutation(&mut self, version: u64, mutations: &[Mutation]) -> MutationReport {
        let mut report = MutationReport::default();
        let expected = self.doc_version.map(|v| v + 1);
        self.doc_version = Some(version);
        if self.hunks.is_empty() {
            return report;
        }
        if expected != Some(version) {
            warn!(
                expected = ?expected,
                got = version,
                "document version gap; dropping all hunks"
            );
            self.hunks.clear();
            report.cleared = true;
            return report;
        }

        for tracked in &mut self.hunks {
            if tracked.state != HunkState::Located {
                continue;
            }
            let Some(range) = tracked.hunk.located_range() else {
                continue;
            };
            if let Some(mapped) = remap(range.clone(), mutations) {
                if mapped != range {
                    debug!(hunk = %tracked.hunk.id, ?range, ?mapped, "remapped");
                }
                tracked.hunk.relocate(mapped);
                report.remapped += 1;
            } else {
                warn!(hunk = %tracked.hunk.id, ?range, "mutation overlaps hunk; invalidated");
                tracked.set_state(HunkState::Invalidated);
                report.invalidated.push(tracked.hunk.id.clone());
            }
        }
        report
    }

    /// Drop every hunk. The generation stays so late batches are still recognized.
    pub fn clear(&mut self) {
        if !self.hunks.is_empty() {
            info!(dropped = self.hunks.len(), "cleared hunks");
        }
        self.hunks.clear();
    }

    /// Visible document range, used when the document is large.
    pub fn set_viewport(&mut self, viewport: Option<Range<usize>>) {
        self.viewport = viewport;
    }

    /// Invalidate located hunks whose live text no longer resembles their original.
    pub fn revalidate(&mut self, doc: &(impl DocumentSource + ?Sized)) -> Vec<DiffError> {
        let projection = Projection::new(doc);
        let in_sync = self.doc_version == Some(doc.version());
        if !in_sync {
            warn!(
                tracked = ?self.doc_version,
                live = doc.version(),
                "document changed without notification; invalidating located hunks"
            );
        }
        let floor = self.config.validation_floor;
        let mut failures = Vec::new();
        for tracked in &mut self.hunks {
            if tracked.state != HunkState::Located {
                continue;
            }
            let similarity = if in_sync {
                live_similarity(&tracked.hunk, &projection)
            } else {
                Some(0.0)
            };
            let Some(similarity) = similarity else {
                continue;
            };
            if similarity < floor {
                let error = DiffError::ValidationFailure {
                    hunk_id: tracked.hunk.id.clone(),
                    similarity,
                };
                warn!("{error}");
                tracked.set_state(HunkState::Invalidated);
                failures.push(error);
            }
        }
        failures
    }

    /// Located hunks that should be drawn. In large documents only those
    /// touching the viewport are returned.
    pub fn visible_hunks(&self, projection: &Projection) -> Vec<&DiffHunk> {
        let large = projection.char_len() > self.config.large_document_chars;
        self.hunks
            .iter()
            .filter(|t| t.state == HunkState::Located)
            .map(|t| &t.hunk)
            .filter(|h| !large || self.in_viewport(h))
            .collect()
    }

    fn in_viewport(&self, hunk: &DiffHunk) -> bool {
        let (Some(viewport), Some(range)) = (&self.viewport, hunk.located_range()) else {
            return true;
        };
        hunk.element_type == ElementType::WholeDocumentReplace
            || (range.start <= viewport.end && viewport.start <= range.end)
    }

    /// Build overlays for the visible hunks.
    pub fn render(&self, doc: &(impl DocumentSource + ?Sized)) -> RenderOutput {
        let unlocated = self
            .hunks
            .iter()
            .filter(|t| t.state == HunkState::Proposed)
            .count();
        if self.doc_version.is_some_and(|v| v != doc.version()) {
            warn!(
                tracked = ?self.doc_version,
                live = doc.version(),
                "document changed without notification; rendering nothing"
            );
            return RenderOutput {
                unlocated,
                ..RenderOutput::default()
            };
        }
        let projection = Projection::new(doc);
        let mut output = overlay::render(&self.visible_hunks(&projection), &projection, &self.config);
        output.unlocated = unlocated;
        output
    }

    /// Close the current generation.
    pub(crate) fn seal(&mut self, doc_version: Option<u64>) {
        self.hunks.clear();
        self.sealed = true;
        if doc_version.is_some() {
            self.doc_version = doc_version;
        }
    }
}

fn locate_one(
    config: &EngineConfig,
    mut hunk: DiffHunk,
    projection: &Projection,
    report: &mut IngestReport,
) -> TrackedHunk {
    let result = locate::locate(&hunk, projection, config);
    match result.outcome {
        LocateOutcome::Found(located) => {
            if located.confidence < config.low_confidence_threshold {
                let notice = DiffError::LowConfidenceMatch {
                    hunk_id: hunk.id.clone(),
                    confidence: located.confidence,
                };
                info!("{notice}");
                report.low_confidence += 1;
            }
            hunk.set_location(&located);
            report.located += 1;
            TrackedHunk {
                hunk,
                state: HunkState::Located,
            }
        }
        LocateOutcome::NotFound { reason, candidates } => {
            let error = DiffError::LocationFailure {
                hunk_id: hunk.id.clone(),
                reason: reason.clone(),
            };
            warn!("{error}");
            hunk.clear_location(candidates.clone());
            report.unlocated.push(Unlocated {
                hunk_id: hunk.id.clone(),
                reason,
                candidates,
                trace: result.trace,
            });
            TrackedHunk {
                hunk,
                state: HunkState::Proposed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, DocumentHost};

    fn cat_doc() -> Document {
        Document::from_text("The cat sat on the mat.")
    }

    fn cat_hunk() -> DiffHunk {
        DiffHunk::edit("h1", "cat", "dog").with_context(Some("The "), None)
    }

    #[test]
    fn test_remap_shifts_and_invalidates() {
        assert_eq!(remap(10..15, &[Mutation::insertion(3, 4)]), Some(14..19));
        assert_eq!(remap(10..15, &[Mutation::insertion(10, 2)]), Some(12..17));
        assert_eq!(remap(10..15, &[Mutation::insertion(15, 2)]), Some(10..15));
        assert_eq!(remap(10..15, &[Mutation::deletion(2, 5)]), Some(7..12));
        assert_eq!(remap(10..15, &[Mutation::insertion(12, 1)]), None);
        assert_eq!(remap(10..15, &[Mutation::deletion(8, 11)]), None);
        assert_eq!(
            remap(10..15, &[Mutation::insertion(0, 5), Mutation::deletion(0, 2)]),
            Some(13..18)
        );
    }

    #[test]
    fn test_ingest_is_idempotent() {
        let doc = cat_doc();
        let mut session = Session::new(EngineConfig::default());
        let first = session.ingest(Generation(1), vec![cat_hunk()], &doc);
        assert_eq!(first.located, 1);
        let before = session.hunks().to_vec();

        let second = session.ingest(Generation(1), vec![cat_hunk()], &doc);
        assert_eq!(second.reused, 1);
        assert_eq!(second.located, 0);
        assert_eq!(session.hunks(), before.as_slice());
    }

    #[test]
    fn test_unlocated_hunk_stays_proposed() {
        let doc = cat_doc();
        let mut session = Session::new(EngineConfig::default());
        let report = session.ingest(
            Generation(1),
            vec![DiffHunk::edit("h2", "elephant", "mouse")],
            &doc,
        );
        assert_eq!(report.unlocated.len(), 1);
        assert_eq!(report.unlocated[0].hunk_id, "h2");
        let tracked = session.get("h2").expect("tracked");
        assert_eq!(tracked.state(), HunkState::Proposed);
        assert!(tracked.hunk().located_range().is_none());
    }

    #[test]
    fn test_generations_supersede_and_go_stale() {
        let doc = cat_doc();
        let mut session = Session::new(EngineConfig::default());
        session.ingest(Generation(2), vec![cat_hunk()], &doc);

        let stale = session.ingest(
            Generation(1),
            vec![DiffHunk::edit("old", "sat on", "stood on")],
            &doc,
        );
        assert!(stale.stale);
        assert!(session.get("old").is_none());

        session.ingest(
            Generation(3),
            vec![DiffHunk::edit("new", "sat on", "stood on")],
            &doc,
        );
        assert!(session.get("h1").is_none());
        assert!(session.get("new").is_some());
    }

    #[test]
    fn test_mutation_before_hunk_shifts_it() {
        let mut doc = cat_doc();
        let mut session = Session::new(EngineConfig::default());
        session.ingest(Generation(1), vec![cat_hunk()], &doc);

        let mutation = doc.replace_range(1, 1, "Oh! ").expect("insert");
        let report = session.on_document_mutation(doc.version(), &[mutation]);
        assert_eq!(report.remapped, 1);
        let range = session.get("h1").and_then(|t| t.hunk().located_range()).expect("range");
        assert_eq!(range, 9..12);
        assert!(session.revalidate(&doc).is_empty());
    }

    #[test]
    fn test_mutation_inside_hunk_invalidates_it() {
        let mut doc = cat_doc();
        let mut session = Session::new(EngineConfig::default());
        session.ingest(Generation(1), vec![cat_hunk()], &doc);

        let mutation = doc.replace_range(6, 7, "u").expect("edit");
        let report = session.on_document_mutation(doc.version(), &[mutation]);
        assert_eq!(report.invalidated, vec!["h1".to_owned()]);
        assert_eq!(session.get("h1").map(TrackedHunk::state), Some(HunkState::Invalidated));
        assert!(session.render(&doc).overlays.is_empty());
    }

    #[test]
    fn test_version_gap_clears() {
        let doc = cat_doc();
        let mut session = Session::new(EngineConfig::default());
        session.ingest(Generation(1), vec![cat_hunk()], &doc);
        let report = session.on_document_mutation(doc.version() + 2, &[]);
        assert!(report.cleared);
        assert!(session.hunks().is_empty());
    }

    #[test]
    fn test_revalidate_catches_silent_edits() {
        let mut doc = cat_doc();
        let mut session = Session::new(EngineConfig::default());
        session.ingest(Generation(1), vec![cat_hunk()], &doc);
        doc.replace_range(5, 8, "cow").expect("edit");
        let failures = session.revalidate(&doc);
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], DiffError::ValidationFailure { .. }));
    }

    #[test]
    fn test_viewport_filters_large_documents() {
        let filler = "lorem ipsum dolor sit amet ".repeat(400);
        let doc = Document::from_text(&format!("needle one\n{filler}\nneedle two"));
        let config = EngineConfig::default();
        let mut session = Session::new(config);
        session.ingest(
            Generation(1),
            vec![
                DiffHunk::edit("top", "needle one", "pin one"),
                DiffHunk::edit("bottom", "needle two", "pin two"),
            ],
            &doc,
        );
        let projection = Projection::new(&doc);
        assert_eq!(session.visible_hunks(&projection).len(), 2);

        session.set_viewport(Some(0..50));
        let visible = session.visible_hunks(&projection);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "top");
        // Still tracked while scrolled away.
        assert!(session.get("bottom").is_some_and(|t| t.state() == HunkState::Located));
    }
}
