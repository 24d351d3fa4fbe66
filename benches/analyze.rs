//! Criterion benchmarks for direction field analysis.
//!
//! Run with:
//!   cargo bench
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use mazewalk::generate;
use mazewalk::{analyze, FieldGrid};

fn braided(size: usize, seed: u64) -> FieldGrid {
    let mut grid = generate::carve(size, size, seed);
    generate::braid(&mut grid, size, seed);
    grid
}

/// Benchmark analyze() on generated mazes of growing size.
fn bench_analyze_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze_size");

    for size in [15, 31, 63, 127, 255].iter() {
        let perfect = generate::carve(*size, *size, 42);
        let looped = braided(*size, 42);
        group.throughput(Throughput::Elements((size * size) as u64));

        group.bench_with_input(BenchmarkId::new("perfect", size), &perfect, |b, grid| {
            b.iter(|| black_box(analyze(grid)));
        });
        group.bench_with_input(BenchmarkId::new("braided", size), &looped, |b, grid| {
            b.iter(|| black_box(analyze(grid)));
        });
    }

    group.finish();
}

/// Benchmark path() from every reachable cell of one field.
fn bench_paths(c: &mut Criterion) {
    let field = analyze(&braided(63, 7));
    let cells: Vec<_> = field.reachable_cells().collect();

    c.bench_function("path_all_cells_63", |b| {
        b.iter(|| {
            let mut total = 0usize;
            for &(r, c) in &cells {
                total += field.path(r, c).map(|p| p.len()).unwrap_or(0);
            }
            black_box(total)
        });
    });
}

criterion_group!(benches, bench_analyze_sizes, bench_paths);
criterion_main!(benches);
