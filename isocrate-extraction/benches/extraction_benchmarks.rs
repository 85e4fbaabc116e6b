//! Benchmarks for the extraction strategies
//!
//! Compares classic per-cell work items, fused blocks, per-triangle work
//! items and slice-by-slice sweeps on sphere fields of increasing resolution.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use isocrate_core::{GridDims, Point3f, ScalarField};
use isocrate_extraction::{
    create_sphere_field, Backend, MarchingCubes, MarchingCubesConfig, Strategy,
};

fn sphere_for(resolution: usize) -> ScalarField {
    let dims = GridDims::new(resolution, resolution, resolution);
    let c = (resolution - 1) as f32 / 2.0;
    create_sphere_field(dims, Point3f::new(c, c, c)).unwrap()
}

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("extraction");

    for resolution in [32, 64, 128] {
        let field = sphere_for(resolution);
        let isovalue = resolution as f32 / 3.0;
        group.throughput(Throughput::Elements(field.dims().cell_count() as u64));

        // one slice per eight z-layers of cells
        let cells_per_slice = 8 * field.dims().cells_per_layer();
        let variants = [
            ("classic", Strategy::CellFused, 1),
            ("fused16", Strategy::CellFused, 16),
            ("per_triangle", Strategy::PerTriangle, 1),
            ("sliding_window", Strategy::SlidingWindow { cells_per_slice }, 16),
        ];

        for backend in [Backend::Serial, Backend::Parallel] {
            for (name, strategy, factor) in variants {
                let mc = MarchingCubes::new(
                    MarchingCubesConfig::default()
                        .with_isovalue(isovalue)
                        .with_strategy(strategy)
                        .with_fusion_factor(factor)
                        .with_backend(backend),
                );
                group.bench_with_input(
                    BenchmarkId::new(format!("{}_{}", name, backend.name()), resolution),
                    &field,
                    |b, field| {
                        b.iter(|| {
                            let mesh = mc.extract(black_box(field), None).unwrap();
                            black_box(mesh);
                        });
                    },
                );
            }
        }
    }

    group.finish();
}

fn bench_fusion_factors(c: &mut Criterion) {
    let mut group = c.benchmark_group("fusion_factor");
    let field = sphere_for(96);

    for factor in [1, 2, 4, 8, 16, 32, 64] {
        let mc = MarchingCubes::new(
            MarchingCubesConfig::default()
                .with_isovalue(30.0)
                .with_fusion_factor(factor),
        );
        group.bench_with_input(BenchmarkId::from_parameter(factor), &field, |b, field| {
            b.iter(|| black_box(mc.extract(black_box(field), None).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_strategies, bench_fusion_factors);
criterion_main!(benches);
