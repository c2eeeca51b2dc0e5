//! Apply/reject controller.
//!
//! Both actions end the current overlay generation. Applying revalidates
//! every located hunk first, then mutates the document from the highest
//! range start down so earlier replacements never shift later ones.

use std::ops::Range;

use serde::Serialize;
use tracing::{info, warn};

use crate::document::{DocumentHost, Mutation};
use crate::session::{HunkState, Session};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedHunk {
    pub hunk_id: String,
    pub reason: String,
}

/// Outcome of [`apply_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    /// Ids in the order their mutations were issued.
    pub applied: Vec<String>,
    /// Applied hunks that were located with low confidence.
    pub low_confidence: Vec<String>,
    pub skipped: Vec<SkippedHunk>,
    /// Mutations as issued, each relative to the document after the previous one.
    pub mutations: Vec<Mutation>,
}

/// Apply every located hunk to `doc` and close the generation.
pub fn apply_all<D: DocumentHost + ?Sized>(session: &mut Session, doc: &mut D) -> ApplyReport {
    let mut report = ApplyReport::default();
    for failure in session.revalidate(&*doc) {
        report.skipped.push(SkippedHunk {
            hunk_id: failure.hunk_id().unwrap_or_default().to_owned(),
            reason: failure.to_string(),
        });
    }

    let low_threshold = session.config().low_confidence_threshold;
    let mut order: Vec<(usize, Range<usize>)> = session
        .hunks()
        .iter()
        .enumerate()
        .filter(|(_, t)| t.state() == HunkState::Located)
        .filter_map(|(idx, t)| t.hunk().located_range().map(|range| (idx, range)))
        .collect();
    order.sort_by(|a, b| b.1.start.cmp(&a.1.start).then(b.1.end.cmp(&a.1.end)));

    // Start of the lowest range applied so far; later ranges must end at or before it.
    let mut floor = usize::MAX;
    for (idx, range) in order {
        let tracked = &mut session.hunks_mut()[idx];
        let id = tracked.hunk().id.clone();
        if range.end > floor {
            warn!(hunk = %id, ?range, "overlaps an applied hunk; skipped");
            tracked.set_state(HunkState::Invalidated);
            report.skipped.push(SkippedHunk {
                hunk_id: id,
                reason: "overlaps another applied hunk".to_owned(),
            });
            continue;
        }
        let low = tracked
            .hunk()
            .confidence()
            .is_some_and(|c| c < low_threshold);
        match doc.replace_range(range.start, range.end, &tracked.hunk().new_snippet) {
            Ok(mutation) => {
                tracked.set_state(HunkState::Applied);
                report.mutations.push(mutation);
                if low {
                    report.low_confidence.push(id.clone());
                }
                report.applied.push(id);
                floor = range.start;
            }
            Err(err) => {
                warn!(hunk = %id, "apply failed: {err}");
                tracked.set_state(HunkState::Invalidated);
                report.skipped.push(SkippedHunk {
                    hunk_id: id,
                    reason: err.to_string(),
                });
            }
        }
    }

    session.seal(Some(doc.version()));
    info!(
        applied = report.applied.len(),
        skipped = report.skipped.len(),
        "applied hunk batch"
    );
    report
}

/// Discard every hunk without touching the document. Returns the rejected ids.
pub fn reject_all(session: &mut Session) -> Vec<String> {
    let mut rejected = Vec::new();
    for tracked in session.hunks_mut() {
        if !tracked.state().is_terminal() {
            tracked.set_state(HunkState::Rejected);
            rejected.push(tracked.hunk().id.clone());
        }
    }
    session.seal(None);
    info!(rejected = rejected.len(), "rejected hunk batch");
    rejected
}
