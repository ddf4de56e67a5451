use patchwork_core::{
    DecorationKind, DocumentBuffer, EditId, EditOrigin, OverlayOptions, PendingEdit,
    PendingEditOverlay, ReconcileError, SourceMetadata,
};
use pretty_assertions::assert_eq;

fn pending(buffer: &DocumentBuffer, id: &str, start: usize, end: usize, new_text: &str) -> PendingEdit {
    PendingEdit {
        id: EditId::from(id),
        file_path: buffer.path().to_string(),
        range_start: start,
        range_end: end,
        original_snippet: buffer.slice(start, end).unwrap(),
        new_text: new_text.to_string(),
        source: SourceMetadata {
            origin: EditOrigin::AgentStream,
            correlation_id: "task".to_string(),
            paragraph_id: None,
        },
        stale: false,
    }
}

fn ranges(overlay: &PendingEditOverlay, path: &str) -> Vec<(usize, usize)> {
    overlay
        .edits_for(path)
        .iter()
        .map(|e| (e.range_start, e.range_end))
        .collect()
}

#[test]
fn test_accept_shifts_following_edits() {
    let mut buffer = DocumentBuffer::new("f", "aaaaabbbbbcccccddddd");
    let mut overlay = PendingEditOverlay::default();
    overlay.add("f", pending(&buffer, "task-1", 0, 5, "12345678"));
    overlay.add("f", pending(&buffer, "task-2", 10, 15, "C"));

    let accepted = overlay
        .accept_one("f", &EditId::from("task-1"), &mut buffer)
        .unwrap();
    assert!(accepted.newly_stale.is_empty());
    assert_eq!(accepted.delta.before_char_count, 20);
    assert_eq!(accepted.delta.after_char_count, 23);
    assert_eq!(ranges(&overlay, "f"), vec![(13, 18)]);
    assert_eq!(buffer.slice(13, 18).unwrap(), "ccccc");

    overlay
        .accept_one("f", &EditId::from("task-2"), &mut buffer)
        .unwrap();
    assert_eq!(buffer.text(), "12345678bbbbbCddddd");
    assert_eq!(overlay.pending_count("f"), 0);
}

#[test]
fn test_accept_all_matches_sequential_accepts() {
    let mut buffer = DocumentBuffer::new("f", "aaaaabbbbbcccccddddd");
    let mut overlay = PendingEditOverlay::default();
    overlay.add("f", pending(&buffer, "task-2", 10, 15, "C"));
    overlay.add("f", pending(&buffer, "task-1", 0, 5, "12345678"));
    overlay.add("f", pending(&buffer, "task-3", 20, 20, "!"));

    let report = overlay.accept_all("f", &mut buffer);
    assert_eq!(buffer.text(), "12345678bbbbbCddddd!");
    assert_eq!(report.applied.len(), 3);
    assert!(report.skipped.is_empty());
    let starts: Vec<_> = report.delta.edits.iter().map(|e| e.start).collect();
    assert_eq!(starts, vec![0, 13, 19]);
    assert_eq!(
        report.delta.apply_to("aaaaabbbbbcccccddddd").as_deref(),
        Some("12345678bbbbbCddddd!")
    );
    assert!(overlay.is_empty());
}

#[test]
fn test_accept_all_skips_overlapping_sibling() {
    let mut buffer = DocumentBuffer::new("f", "0123456789abcdef");
    let mut overlay = PendingEditOverlay::default();
    overlay.add("f", pending(&buffer, "a", 0, 10, "X"));
    overlay.add("f", pending(&buffer, "b", 5, 12, "Y"));

    let report = overlay.accept_all("f", &mut buffer);
    assert_eq!(buffer.text(), "Xabcdef");
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].edit.id, EditId::from("b"));
    assert!(matches!(
        report.skipped[0].reason,
        ReconcileError::StaleEdit { .. }
    ));
    assert_eq!(overlay.pending_count("f"), 0);
}

#[test]
fn test_insertion_point_shifts_after_deletion() {
    let mut buffer = DocumentBuffer::new("f", "hello world");
    let mut overlay = PendingEditOverlay::default();
    overlay.add("f", pending(&buffer, "del", 0, 6, ""));
    overlay.add("f", pending(&buffer, "ins", 11, 11, "!"));

    overlay.accept_one("f", &EditId::from("del"), &mut buffer).unwrap();
    assert_eq!(ranges(&overlay, "f"), vec![(5, 5)]);
    overlay.accept_one("f", &EditId::from("ins"), &mut buffer).unwrap();
    assert_eq!(buffer.text(), "world!");
}

#[test]
fn test_inverted_range_is_refused() {
    let mut buffer = DocumentBuffer::new("f", "aaaaabbbbb");
    let mut overlay = PendingEditOverlay::default();
    let mut inverted = pending(&buffer, "task-0", 2, 2, "X");
    inverted.range_start = 6;
    assert!(!overlay.add("f", inverted));
    assert_eq!(overlay.pending_count("f"), 0);

    overlay.add("f", pending(&buffer, "task-1", 0, 5, ""));
    overlay.add("f", pending(&buffer, "task-2", 6, 8, "Z"));
    overlay
        .accept_one("f", &EditId::from("task-1"), &mut buffer)
        .unwrap();
    assert_eq!(ranges(&overlay, "f"), vec![(1, 3)]);

    let report = overlay.accept_all("f", &mut buffer);
    assert!(report.skipped.is_empty());
    assert_eq!(buffer.text(), "bZbb");
}

#[test]
fn test_baseline_released_only_when_no_edits_remain() {
    let mut buffer = DocumentBuffer::new("f", "one two");
    buffer.ensure_baseline();
    let mut overlay = PendingEditOverlay::default();
    overlay.add("f", pending(&buffer, "a", 0, 3, "1"));
    overlay.add("f", pending(&buffer, "b", 4, 7, "2"));

    overlay.accept_one("f", &EditId::from("a"), &mut buffer).unwrap();
    assert_eq!(buffer.baseline(), Some("one two"));
    overlay.accept_one("f", &EditId::from("b"), &mut buffer).unwrap();
    assert_eq!(buffer.baseline(), None);
    assert_eq!(buffer.text(), "1 2");
}

#[test]
fn test_lenient_accept_uses_resolved_range_after_typing() {
    let mut buffer = DocumentBuffer::new("f", "hello world");
    let mut overlay = PendingEditOverlay::default();
    overlay.add("f", pending(&buffer, "w", 6, 11, "WORLD"));

    // Typing does not move pending edits; the range now covers different text.
    buffer.splice(0, 0, "XX").unwrap();
    overlay.accept_one("f", &EditId::from("w"), &mut buffer).unwrap();
    assert_eq!(buffer.text(), "XXhellWORLDld");
}

#[test]
fn test_strict_accept_discards_invalidated_edit() {
    let mut buffer = DocumentBuffer::new("f", "hello world");
    let mut overlay = PendingEditOverlay::new(OverlayOptions {
        verify_snippet_on_accept: true,
    });
    overlay.add("f", pending(&buffer, "w", 6, 11, "WORLD"));

    buffer.splice(0, 0, "XX").unwrap();
    let err = overlay
        .accept_one("f", &EditId::from("w"), &mut buffer)
        .unwrap_err();
    assert_eq!(err, ReconcileError::StaleEdit { id: EditId::from("w") });
    assert_eq!(overlay.pending_count("f"), 0);
    assert_eq!(buffer.text(), "XXhello world");
}

#[test]
fn test_remove_clear_and_unknown_ids() {
    let buffer = DocumentBuffer::new("f", "abcdef");
    let mut overlay = PendingEditOverlay::default();
    overlay.add("f", pending(&buffer, "a", 0, 1, "A"));
    overlay.add("f", pending(&buffer, "b", 2, 3, "B"));
    overlay.add("f", pending(&buffer, "c", 4, 5, "C"));

    assert_eq!(overlay.remove("f", &EditId::from("b")).map(|e| e.new_text), Some("B".to_string()));
    assert_eq!(overlay.remove("f", &EditId::from("b")), None);
    assert_eq!(overlay.clear_all("f").len(), 2);
    assert_eq!(overlay.pending_count("f"), 0);

    let mut buffer = buffer;
    assert!(matches!(
        overlay.accept_one("f", &EditId::from("a"), &mut buffer),
        Err(ReconcileError::EditNotFound { .. })
    ));
}

#[test]
fn test_decorations_describe_each_edit() {
    let buffer = DocumentBuffer::new("f", "keep drop swap");
    let mut overlay = PendingEditOverlay::default();
    overlay.add("f", pending(&buffer, "ins", 4, 4, "!"));
    overlay.add("f", pending(&buffer, "del", 5, 10, ""));
    overlay.add("f", pending(&buffer, "rep", 10, 14, "SWAP"));

    let kinds: Vec<_> = overlay
        .decorations("f")
        .into_iter()
        .map(|d| (d.id.to_string(), d.range_start, d.range_end, d.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("ins".to_string(), 4, 4, DecorationKind::Insertion),
            ("del".to_string(), 5, 10, DecorationKind::Deletion),
            ("rep".to_string(), 10, 14, DecorationKind::Replacement),
        ]
    );
}
