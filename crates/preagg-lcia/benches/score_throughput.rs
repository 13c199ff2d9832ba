use criterion::{black_box, criterion_group, criterion_main, Criterion};
use preagg_core::array::{Precision, ResultArray};
use preagg_lcia::{score_arrays, ScoreMode, Selection};

fn score_bench(c: &mut Criterion) {
    let rows: Vec<Vec<f64>> = (0..2_000)
        .map(|row| (0..1_000).map(|col| (row * col % 97) as f64).collect())
        .collect();
    let raw = ResultArray::from_rows(&rows).unwrap();
    let selection = Selection {
        row_indices: (0..2_000).step_by(7).collect(),
        weights: (0..2_000).step_by(7).map(|row| 1.0 + row as f64 / 1e3).collect(),
    };

    c.bench_function("score_totals_2k_x_1k", |b| {
        b.iter(|| {
            let scores = score_arrays(&raw, &selection, Precision::F32, ScoreMode::Total).unwrap();
            black_box(scores);
        });
    });
    c.bench_function("score_per_row_2k_x_1k", |b| {
        b.iter(|| {
            let scores = score_arrays(
                &raw,
                &selection,
                Precision::F64,
                ScoreMode::PerRow { expand: false },
            )
            .unwrap();
            black_box(scores);
        });
    });
}

criterion_group!(benches, score_bench);
criterion_main!(benches);
