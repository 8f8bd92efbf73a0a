use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use docqa::models::{DocumentMetadata, Passage};
use docqa::services::{VectorIndex, chunk};

const DIMENSION: usize = 384;

fn sample_text(paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| {
            format!(
                "Paragraph {i} talks about retrieval. Passages overlap so context survives a cut! \
                 Does the boundary snap back? It should, within a hundred characters.\n"
            )
        })
        .collect()
}

/// Deterministic pseudo-random vectors so runs are comparable.
fn vectors(count: usize) -> Vec<Vec<f32>> {
    let mut state: u32 = 0x9e37_79b9;
    (0..count)
        .map(|_| {
            (0..DIMENSION)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 17;
                    state ^= state << 5;
                    (state as f32 / u32::MAX as f32) - 0.5
                })
                .collect()
        })
        .collect()
}

fn bench_chunk(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk");
    for paragraphs in [10, 100, 1000] {
        let text = sample_text(paragraphs);
        group.bench_with_input(BenchmarkId::from_parameter(paragraphs), &text, |b, text| {
            b.iter(|| chunk(black_box(text), 1000, 200));
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let metadata = DocumentMetadata::new("bench.txt", ".txt", 0);
    let mut group = c.benchmark_group("search");

    for size in [100, 1_000, 10_000] {
        let entries: Vec<(Vec<f32>, Passage)> = vectors(size)
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                let passage = Passage::new(
                    "bench",
                    format!("passage {i}"),
                    i as u32,
                    size as u32,
                    metadata.clone(),
                );
                (v, passage)
            })
            .collect();

        let mut index = VectorIndex::new(DIMENSION);
        if index.build(entries).is_err() {
            continue;
        }
        let query = vectors(1).remove(0);

        group.bench_with_input(BenchmarkId::from_parameter(size), &query, |b, query| {
            b.iter(|| index.search(black_box(query), 3));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_chunk, bench_search);
criterion_main!(benches);
