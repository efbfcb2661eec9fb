//! Benchmarks for the spatial substrate: interpolation, adaptive pooling and
//! pointwise convolution on decode-head sized feature maps.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tenseg_core::{ConvPadding, DenseND, InterpolationMode};

/// Upsample a 1/8 resolution map back to full resolution
fn bench_interpolate_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpolate_modes");
    let input = DenseND::<f32>::random_uniform(&[1, 64, 32, 32], 0.0, 1.0);
    group.throughput(Throughput::Elements((64 * 256 * 256) as u64));

    for mode in [
        InterpolationMode::Nearest,
        InterpolationMode::Bilinear,
        InterpolationMode::Bicubic,
    ] {
        group.bench_with_input(BenchmarkId::new("x8", mode), &mode, |b, &mode| {
            b.iter(|| {
                let output = input
                    .interpolate(Some((256, 256)), None, mode, false)
                    .unwrap();
                std::hint::black_box(output);
            });
        });
    }

    group.finish();
}

/// Pool to the usual pyramid grid sizes
fn bench_adaptive_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("adaptive_avg_pool2d");
    let input = DenseND::<f32>::random_uniform(&[2, 256, 64, 64], 0.0, 1.0);

    for scale in [1usize, 2, 3, 6] {
        group.bench_with_input(BenchmarkId::new("grid", scale), &scale, |b, &scale| {
            b.iter(|| {
                let output = input.adaptive_avg_pool2d((scale, scale)).unwrap();
                std::hint::black_box(output);
            });
        });
    }

    group.finish();
}

/// 1x1 channel reduction as used by every pyramid branch
fn bench_pointwise_conv(c: &mut Criterion) {
    let mut group = c.benchmark_group("conv2d_pointwise");

    for spatial in [6usize, 32, 64] {
        let input = DenseND::<f32>::random_uniform(&[1, 256, spatial, spatial], 0.0, 1.0);
        let weight = DenseND::<f32>::random_normal(&[64, 256, 1, 1], 0.0, 0.05);

        group.bench_with_input(
            BenchmarkId::new("256to64", format!("{}x{}", spatial, spatial)),
            &(&input, &weight),
            |b, (input, weight)| {
                b.iter(|| {
                    let output = input
                        .conv2d_nchw(weight, None, 1, ConvPadding::Valid, 1)
                        .unwrap();
                    std::hint::black_box(output);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_interpolate_modes,
    bench_adaptive_pool,
    bench_pointwise_conv
);
criterion_main!(benches);
