use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use patchwork_core::{
    AnchorResolver, CommandKind, DocumentBuffer, EditId, EditInstruction, EditOrigin, LineIndex,
    PendingEdit, PendingEditOverlay, ResolveOptions, SourceMetadata,
};

fn large_text(line_count: usize) -> String {
    let mut out = String::with_capacity(line_count * 64);
    for i in 0..line_count {
        out.push_str(&format!(
            "{i:06} the quick brown fox jumps over the lazy dog (patchwork benchmark line)\n"
        ));
    }
    out
}

fn bench_content_match_near_end(c: &mut Criterion) {
    let text = large_text(50_000);
    let index = LineIndex::from_text(&text);
    let resolver = AnchorResolver::default();
    let mut instruction = EditInstruction::new(CommandKind::Replace, "replaced\n");
    instruction.match_text = Some("049990 the quick brown fox".to_string());

    c.bench_function("resolve/content_match_50k_lines", |b| {
        b.iter(|| black_box(resolver.resolve(black_box(&instruction), &index)))
    });
}

fn bench_whitespace_fallback(c: &mut Criterion) {
    let text = large_text(50_000);
    let index = LineIndex::from_text(&text);
    let resolver = AnchorResolver::new(ResolveOptions::default());
    let mut instruction = EditInstruction::new(CommandKind::Replace, "x");
    instruction.match_text = Some("025000   the  quick\tbrown".to_string());

    c.bench_function("resolve/whitespace_fallback_50k_lines", |b| {
        b.iter(|| black_box(resolver.resolve(black_box(&instruction), &index)))
    });
}

fn bench_accept_all_many_edits(c: &mut Criterion) {
    let text = large_text(10_000);
    let line_len = text.find('\n').map_or(0, |i| i + 1);

    c.bench_function("overlay/accept_all_1k_edits", |b| {
        b.iter_batched(
            || {
                let buffer = DocumentBuffer::new("bench.txt", &text);
                let mut overlay = PendingEditOverlay::default();
                for n in 0..1_000usize {
                    let start = n * 10 * line_len;
                    overlay.add(
                        "bench.txt",
                        PendingEdit {
                            id: EditId::new("bench", n as u64),
                            file_path: "bench.txt".to_string(),
                            range_start: start,
                            range_end: start + 6,
                            original_snippet: String::new(),
                            new_text: "edited".to_string(),
                            source: SourceMetadata {
                                origin: EditOrigin::AgentStream,
                                correlation_id: "bench".to_string(),
                                paragraph_id: None,
                            },
                            stale: false,
                        },
                    );
                }
                (buffer, overlay)
            },
            |(mut buffer, mut overlay)| {
                let report = overlay.accept_all("bench.txt", &mut buffer);
                black_box(report.applied.len());
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    bench_content_match_near_end,
    bench_whitespace_fallback,
    bench_accept_all_many_edits
);
criterion_main!(benches);
