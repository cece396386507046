//! Topology construction and profiling latency.
//!
//! The reducer rebuilds and profiles one topology per trial, so these two
//! stages bound the cost of reducing a session.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use burn::backend::NdArray;
use burn::tensor::Tensor;

use resnet_lab::{build, profile, NetworkConfig};

type B = NdArray;

fn configs() -> [(&'static str, NetworkConfig); 3] {
    [
        ("tiny", NetworkConfig::tiny()),
        ("one_stack", NetworkConfig::new().with_filters([16, 0, 0])),
        ("full", NetworkConfig::new()),
    ]
}

/// Benchmark: NetworkConfig -> TopologyGraph.
fn bench_graph_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_build");
    for (name, config) in configs() {
        group.bench_function(name, |b| b.iter(|| build(black_box(&config))));
    }
    group.finish();
}

/// Benchmark: TopologyGraph -> per-layer FLOP profile.
fn bench_profile(c: &mut Criterion) {
    let mut group = c.benchmark_group("profile");
    for (name, config) in configs() {
        let Ok(graph) = build(&config) else {
            continue;
        };
        group.bench_function(name, |b| b.iter(|| profile(black_box(&graph))));
    }
    group.finish();
}

/// Benchmark: one CPU forward pass of the full and quantized networks.
fn bench_forward(c: &mut Criterion) {
    let device = Default::default();
    let mut group = c.benchmark_group("forward");
    group.sample_size(10);
    for (name, config) in [
        ("full", NetworkConfig::new()),
        ("full_quantized", NetworkConfig::new().quantized()),
    ] {
        let Ok(model) = config.init::<B>(&device) else {
            continue;
        };
        let images = Tensor::<B, 4>::ones([1, 3, 32, 32], &device);
        group.bench_function(name, |b| {
            b.iter(|| model.forward(black_box(images.clone())))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_graph_build, bench_profile, bench_forward);
criterion_main!(benches);
