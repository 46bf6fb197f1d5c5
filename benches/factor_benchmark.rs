use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::{Array1, Array2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use svd_factor::FactorSvd;

// Seeded so every run benchmarks the same matrices.
fn generate_data(nrows: usize, ncols: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array2::random_using((nrows, ncols), Uniform::new(-1.0, 1.0), &mut rng)
}

// Capture plus the first rank query, which runs the decomposition.
fn bench_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("FactorSvd_rank");

    for &(nrows, ncols) in [(50, 50), (200, 100), (100, 400)].iter() {
        let data = generate_data(nrows, ncols, 42);
        group.throughput(Throughput::Elements((nrows * ncols) as u64));
        group.bench_with_input(
            BenchmarkId::new("rank", format!("{}x{}", nrows, ncols)),
            &data,
            |b, matrix| {
                b.iter(|| {
                    let mut svd = FactorSvd::from_matrix(matrix).unwrap();
                    svd.rank().unwrap()
                });
            },
        );
    }
    group.finish();
}

// Least-squares solve on an already captured matrix.
fn bench_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("FactorSvd_solve");

    for &(nrows, ncols) in [(100, 50), (300, 300), (50, 200)].iter() {
        let data = generate_data(nrows, ncols, 7);
        let rhs: Array1<f64> = Array1::from_shape_fn(nrows, |i| (i % 5) as f64);
        let svd = FactorSvd::from_matrix(&data).unwrap();

        group.throughput(Throughput::Elements((nrows * ncols) as u64));
        group.bench_with_input(
            BenchmarkId::new("solve", format!("{}x{}", nrows, ncols)),
            &rhs,
            |b, rhs| {
                b.iter_with_setup(|| svd.clone(), |mut handle| handle.solve(rhs).unwrap());
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_rank, bench_solve);
criterion_main!(benches);
