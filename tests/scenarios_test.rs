//! End-to-end scenarios through the library API: locate, preview, apply.

use docdiff::hunk::HunkKind;
use docdiff::locate::LocateOutcome;
use docdiff::overlay::Placement;
use docdiff::{
    DiffHunk, Document, DocumentSource, EngineConfig, Generation, Overlay, Projection, Session,
    apply_all, derive_hunks, locate, reject_all,
};

const CAT: &str = "The cat sat on the mat.";

fn cat_hunk() -> DiffHunk {
    DiffHunk::edit("h1", "cat", "dog").with_context(Some("The "), None)
}

#[test]
fn test_cat_located_and_previewed_inline() {
    let doc = Document::from_text(CAT);
    let projection = Projection::new(&doc);
    let result = locate(&cat_hunk(), &projection, &EngineConfig::default());
    let located = result.found().cloned().expect("cat is located");
    // Byte offsets 4..7 in the flat text are positions 5..8 in the tree: the
    // paragraph's opening token shifts every position by one.
    assert_eq!(projection.to_projection_range(located.range.clone()), 4..7);
    assert_eq!(located.range, 5..8);
    assert!(located.confidence >= 0.9);

    let mut session = Session::new(EngineConfig::default());
    session.ingest(Generation(1), vec![cat_hunk()], &doc);
    let output = session.render(&doc);
    assert!(output.failures.is_empty());
    let [
        Overlay::Strike { range, .. },
        Overlay::Insertion {
            at,
            text,
            placement,
            ..
        },
    ] = output.overlays.as_slice()
    else {
        panic!("expected strike + insertion, got {:?}", output.overlays);
    };
    assert_eq!(*range, 5..8);
    assert_eq!(*at, 8);
    assert_eq!(text, "dog");
    assert_eq!(*placement, Placement::Inline);
}

#[test]
fn test_absent_snippet_never_drawn() {
    let doc = Document::from_text(CAT);
    let hunk = DiffHunk::edit("e", "elephant", "mouse");
    let result = locate(&hunk, &Projection::new(&doc), &EngineConfig::default());
    assert!(matches!(result.outcome, LocateOutcome::NotFound { .. }));

    let mut session = Session::new(EngineConfig::default());
    let report = session.ingest(Generation(1), vec![hunk], &doc);
    assert_eq!(report.unlocated.len(), 1);
    let output = session.render(&doc);
    assert!(output.overlays.is_empty());
    assert_eq!(output.unlocated, 1);
}

#[test]
fn test_context_picks_intended_occurrence() {
    let doc = Document::from_text("the cat sat here. the cat ran there.");
    let projection = Projection::new(&doc);
    let hunk = DiffHunk::edit("h", "cat", "dog").with_context(Some("here. the "), None);
    let located = locate(&hunk, &projection, &EngineConfig::default())
        .found()
        .cloned()
        .expect("located");
    assert_eq!(projection.to_projection_range(located.range), 22..25);
}

#[test]
fn test_line_hint_edits_intended_duplicate() {
    let text = "Total revenue grew\nother\nother\nother\nother\nother\nTotal revenue grew";
    let mut doc = Document::from_text(text);
    let mut session = Session::new(EngineConfig::default());
    let hunk = DiffHunk::edit("r", "Total revenue grew", "Total revenue fell").with_lines(7, 7);
    let report = session.ingest(Generation(1), vec![hunk], &doc);
    assert_eq!(report.located, 1);

    let applied = apply_all(&mut session, &mut doc);
    assert_eq!(applied.applied.len(), 1);
    assert_eq!(
        doc.text(),
        "Total revenue grew\nother\nother\nother\nother\nother\nTotal revenue fell"
    );
}

#[test]
fn test_reject_is_pure_and_apply_runs_once() {
    let mut doc = Document::from_text(CAT);
    let mut session = Session::new(EngineConfig::default());

    session.ingest(Generation(1), vec![cat_hunk()], &doc);
    reject_all(&mut session);
    assert_eq!(doc.version(), 0);
    assert_eq!(doc.text(), CAT);

    let report = session.ingest(
        Generation(2),
        vec![
            cat_hunk(),
            DiffHunk::edit("h2", "mat", "rug").with_context(Some("on the "), None),
        ],
        &doc,
    );
    assert_eq!(report.located, 2);
    let applied = apply_all(&mut session, &mut doc);
    assert_eq!(applied.applied.len(), 2);
    assert_eq!(doc.version(), 2);
    assert_eq!(doc.text(), "The dog sat on the rug.");

    let again = apply_all(&mut session, &mut doc);
    assert!(again.applied.is_empty());
    assert_eq!(doc.version(), 2);
}

#[test]
fn test_proposed_rewrite_applies_cleanly() {
    let filler: Vec<String> = (1..=8).map(|n| format!("filler line {n}")).collect();
    let old = format!(
        "Alpha introduction paragraph here.\n{}\nOmega conclusion paragraph there.",
        filler.join("\n")
    );
    let new = old
        .replace("introduction", "say")
        .replace("conclusion", "wrap");

    let mut doc = Document::from_text(&old);
    assert_eq!(doc.text(), old);
    let descriptors = derive_hunks(&old, &new).expect("diff");
    assert_eq!(descriptors.len(), 2);

    let mut session = Session::new(EngineConfig::default());
    let hunks = descriptors.into_iter().map(DiffHunk::from).collect();
    let report = session.ingest(Generation(1), hunks, &doc);
    assert_eq!(report.located, 2, "{report:?}");

    let applied = apply_all(&mut session, &mut doc);
    assert_eq!(applied.applied.len(), 2);
    assert_eq!(doc.text(), new);
}

#[test]
fn test_pure_insertion_previews_at_point() {
    let doc = Document::from_text("first line\nsecond line");
    let mut session = Session::new(EngineConfig::default());
    session.ingest(
        Generation(1),
        vec![
            DiffHunk::edit("i", "", "inserted ")
                .with_kind(HunkKind::Insertion)
                .with_context(Some("first line\n"), Some("second")),
        ],
        &doc,
    );
    let output = session.render(&doc);
    assert!(
        output
            .overlays
            .iter()
            .any(|o| matches!(o, Overlay::Insertion { at: 13, .. }))
    );
    assert!(
        !output
            .overlays
            .iter()
            .any(|o| matches!(o, Overlay::Strike { .. }))
    );
}
