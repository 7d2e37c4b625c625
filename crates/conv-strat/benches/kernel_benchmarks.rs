//! Benchmarks for the kernel sweeps and the full partition.
//!
//! Run with: cargo bench --package conv-strat --bench kernel_benchmarks

use conv_strat::background::{compute_background, compute_column_max};
use conv_strat::echo_type::{compute_convectivity, compute_echo_type_3d, HeightThresholds};
use conv_strat::partition::{expand_convective, Category};
use conv_strat::texture::TextureComputer;
use conv_strat::{CircularKernel, ConvStratFinder, EchoTypeConfig, Grid, GridGeometry, MISSING_VALUE};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use test_utils::fixtures::{grid, levels};
use test_utils::{noise_volume, with_missing_columns, z_levels, TEST_MISSING};

/// Seeded reflectivity with a sprinkling of missing columns.
fn generate_noisy_volume(nx: usize, ny: usize, nz: usize) -> Vec<f32> {
    let data = noise_volume(nx, ny, nz, -10.0, 60.0, 17);
    let gaps: Vec<(usize, usize)> = (0..nx * ny).step_by(20).map(|i| (i % nx, i / nx)).collect();
    with_missing_columns(data, nx, ny, &gaps)
}

// =============================================================================
// KERNEL SWEEP BENCHMARKS
// =============================================================================

fn bench_background(c: &mut Criterion) {
    let mut group = c.benchmark_group("background");

    for size in [100usize, 250, 500] {
        let col_max = Grid::from_vec(generate_noisy_volume(size, size, 1), size, size, 1).unwrap();
        let kernel = CircularKernel::new(11.0, 1.0, 1.0);
        group.throughput(Throughput::Elements((size * size) as u64));

        for parallel in [false, true] {
            let label = if parallel { "parallel" } else { "serial" };
            group.bench_with_input(BenchmarkId::new(label, size), &col_max, |b, col_max| {
                b.iter(|| compute_background(black_box(col_max), &kernel, parallel))
            });
        }
    }

    group.finish();
}

fn bench_texture(c: &mut Criterion) {
    let mut group = c.benchmark_group("texture_plane");

    for radius_km in [3.0f64, 7.0, 12.0] {
        let size = 200;
        let plane = generate_noisy_volume(size, size, 1);
        let kernel = CircularKernel::new(radius_km, 1.0, 1.0);
        let tc = TextureComputer::new(&kernel, 0.25, true);
        group.throughput(Throughput::Elements((size * size) as u64));

        group.bench_with_input(
            BenchmarkId::new("radius_km", radius_km as u32),
            &plane,
            |b, plane| b.iter(|| tc.compute_plane(black_box(plane), size, size)),
        );
    }

    group.finish();
}

fn bench_expansion(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand_convective");
    let size = 300;
    let geometry = GridGeometry::cartesian(size, size, 1.0, 1.0, vec![1.0]).unwrap();
    let mut rng = rand::thread_rng();

    for conv_fraction in [0.01f64, 0.1] {
        let cats: Vec<Category> = (0..size * size)
            .map(|_| {
                if rng.gen_bool(conv_fraction) {
                    Category::Convective
                } else {
                    Category::Stratiform
                }
            })
            .collect();
        let unexpanded = Grid::from_vec(cats, size, size, 1).unwrap();
        let radius = Grid::plane(size, size, 5.0f32);

        group.bench_with_input(
            BenchmarkId::new("conv_fraction", format!("{:.2}", conv_fraction)),
            &unexpanded,
            |b, unexpanded| b.iter(|| expand_convective(black_box(unexpanded), &radius, &geometry, true)),
        );
    }

    group.finish();
}

// =============================================================================
// FULL PARTITION BENCHMARKS
// =============================================================================

fn bench_column_max(c: &mut Criterion) {
    let (size, nz) = (300, 20);
    let dbz = Grid::from_vec(generate_noisy_volume(size, size, nz), size, size, nz).unwrap();
    let levels: Vec<usize> = (0..nz).collect();

    c.bench_function("column_max_300x300x20", |b| {
        b.iter(|| compute_column_max(black_box(&dbz), &levels))
    });
}

fn bench_echo_type(c: &mut Criterion) {
    let (size, nz) = (150, 20);
    let cfg = EchoTypeConfig::default();
    let geometry = GridGeometry::cartesian(size, size, 1.0, 1.0, levels::twenty_half_km()).unwrap();
    let texture = Grid::from_vec(noise_volume(size, size, nz, 0.0, 30.0, 5), size, size, nz).unwrap();
    let fraction = Grid::plane(size, size, 1.0f32);
    let convectivity = compute_convectivity(&texture, &fraction, 0.25, &cfg);
    let thresholds = HeightThresholds::constant(size, size, cfg.shallow_ht_km, cfg.deep_ht_km);

    c.bench_function("echo_type_3d_150x150x20", |b| {
        b.iter(|| compute_echo_type_3d(black_box(&convectivity), &geometry, &thresholds, &cfg))
    });
}

fn bench_full_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_partition");
    group.sample_size(10);

    for (size, nz) in [(100usize, 10usize), (250, 20)] {
        let data = generate_noisy_volume(size, size, nz);
        let mut finder = ConvStratFinder::new();
        finder
            .set_grid(size, size, 1.0, 1.0, 0.0, 0.0, z_levels(nz, 0.5, 0.5), false)
            .unwrap();

        group.bench_with_input(
            BenchmarkId::new("volume", format!("{}x{}x{}", size, size, nz)),
            &data,
            |b, data| b.iter(|| finder.compute_partition(black_box(data), TEST_MISSING).unwrap()),
        );
    }

    group.finish();
}

fn bench_mosaic_tile(c: &mut Criterion) {
    let spec = grid::MOSAIC_TILE_KM;
    let z_km = levels::twenty_half_km();
    let data = generate_noisy_volume(spec.nx, spec.ny, z_km.len());
    let mut finder = ConvStratFinder::new();
    finder
        .set_grid(spec.nx, spec.ny, spec.dx, spec.dy, spec.minx, spec.miny, z_km, spec.is_lat_lon)
        .unwrap();

    let mut group = c.benchmark_group("mosaic_tile");
    group.sample_size(10);
    group.bench_function("compute_partition", |b| {
        b.iter(|| finder.compute_partition(black_box(&data), MISSING_VALUE).unwrap())
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_background,
    bench_texture,
    bench_expansion,
    bench_column_max,
    bench_echo_type,
    bench_full_partition,
    bench_mosaic_tile,
);
criterion_main!(benches);
