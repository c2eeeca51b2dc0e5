//! Property tests for locating, remapping and ingesting hunks.

use docdiff::session::remap;
use docdiff::{DiffHunk, Document, EngineConfig, Generation, Mutation, Projection, Session, locate};
use proptest::prelude::*;

/// Lowercase words drawn from `a..=m`, so a marker built from other letters is unique.
fn filler() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-m]{3,8}", 4..12)
}

/// Marker that cannot occur in [`filler`] text.
fn marker() -> impl Strategy<Value = String> {
    "QZX[0-9]{2,5}"
}

proptest! {
    #[test]
    fn unique_substring_round_trips(words in filler(), mark in marker(), split in 0usize..12) {
        let split = split.min(words.len());
        let mut parts = words.clone();
        parts.insert(split, mark.clone());
        let text = parts.join(" ");
        let doc = Document::from_text(&text);
        let projection = Projection::new(&doc);

        let hunk = DiffHunk::edit("p", &mark, "replacement");
        let result = locate(&hunk, &projection, &EngineConfig::default());
        let Some(located) = result.found().cloned() else {
            return Err(TestCaseError::fail(format!("not located: {:?}", result.trace)));
        };
        prop_assert_eq!(projection.text_for_doc_range(located.range.clone()), mark.as_str());
        prop_assert!(located.confidence >= 0.95);
    }

    #[test]
    fn oversized_snippet_never_located(words in filler(), cut in 0usize..3) {
        let text = words.join(" ");
        // Anything longer than half the document is refused, even when present.
        let keep = text.len() - cut.min(text.len() / 4);
        let snippet = &text[..keep];
        prop_assume!(snippet.chars().count() * 2 > text.chars().count());

        let doc = Document::from_text(&text);
        let hunk = DiffHunk::edit("g", snippet, "x");
        let result = locate(&hunk, &Projection::new(&doc), &EngineConfig::default());
        prop_assert!(result.found().is_none());
    }

    #[test]
    fn insertion_before_range_shifts_it(
        start in 0usize..1000,
        len in 1usize..100,
        at in 0usize..1000,
        inserted in 1usize..50,
    ) {
        let at = at.min(start);
        let mapped = remap(start..start + len, &[Mutation::insertion(at, inserted)]);
        prop_assert_eq!(mapped, Some(start + inserted..start + len + inserted));
    }

    #[test]
    fn deletion_before_range_shifts_it(start in 10usize..1000, len in 1usize..100, width in 1usize..10) {
        let from = start - width;
        let mapped = remap(start..start + len, &[Mutation::deletion(from, start)]);
        prop_assert_eq!(mapped, Some(from..from + len));
    }

    #[test]
    fn edit_inside_range_invalidates(start in 0usize..1000, len in 2usize..100, offset in 1usize..100) {
        let at = start + offset.min(len - 1);
        prop_assert_eq!(remap(start..start + len, &[Mutation::insertion(at, 3)]), None);
        prop_assert_eq!(remap(start..start + len, &[Mutation::deletion(at - 1, at)]), None);
    }

    #[test]
    fn edit_after_range_leaves_it(start in 0usize..1000, len in 1usize..100, gap in 0usize..50) {
        let at = start + len + gap;
        prop_assert_eq!(
            remap(start..start + len, &[Mutation::insertion(at, 4)]),
            Some(start..start + len)
        );
    }

    #[test]
    fn ingest_twice_is_idempotent(words in filler(), mark in marker()) {
        let text = format!("{} {mark} {}", words.join(" "), words.join(" "));
        let doc = Document::from_text(&text);
        let batch = vec![
            DiffHunk::edit("m", &mark, "changed"),
            DiffHunk::edit("w", &words[0], "first"),
        ];

        let mut session = Session::new(EngineConfig::default());
        let first = session.ingest(Generation(1), batch.clone(), &doc);
        let snapshot = session.hunks().to_vec();
        let second = session.ingest(Generation(1), batch, &doc);

        prop_assert_eq!(second.located + second.reused, first.located);
        prop_assert_eq!(session.hunks(), snapshot.as_slice());
    }
}
