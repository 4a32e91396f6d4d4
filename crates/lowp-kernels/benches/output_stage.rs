// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for the quantize-down output stage and element-wise kernels.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use lowp_kernels::fixed_point::rescale_in_place;
use lowp_kernels::{
    quantize_slice, requantize_slice, GemmOffsets, OffsetVectors,
    OutputStageConfig, OutputStagePipeline, RequantizationInfo, StageDescriptors,
};
use tensor_core::{ChannelMultiplier, DType, Shape, TensorInfo, UniformQuantizationInfo};

fn accumulators(n: usize) -> Vec<i32> {
    (0..n as i64)
        .map(|i| ((i * 2_654_435_761) % 2_000_000 - 1_000_000) as i32)
        .collect()
}

fn bench_output_stage(c: &mut Criterion) {
    let mut group = c.benchmark_group("output_stage");

    for (rows, cols) in [(64, 64), (256, 256), (1024, 512)] {
        let mm = TensorInfo::new(Shape::matrix(rows, cols), DType::S32);
        let out = TensorInfo::new(Shape::matrix(rows, cols), DType::QAsymm8);
        let col_info = TensorInfo::new(Shape::vector(cols), DType::S32);
        let row_info = TensorInfo::new(Shape::vector(rows), DType::S32);
        let bias_info = TensorInfo::new(Shape::vector(cols), DType::S32);
        let desc = StageDescriptors::new(&mm, &out)
            .with_offsets(GemmOffsets::new(-128, -3, 256), Some(&col_info), Some(&row_info))
            .with_bias(&bias_info);
        let config = OutputStageConfig::fixed_point(1_518_500_250, 12, 128, DType::QAsymm8)
            .with_activation_bounds(128, 255);
        let stage = OutputStagePipeline::<u8>::configure(&desc, &config).unwrap();

        let acc = accumulators(rows * cols);
        let col_sum: Vec<i32> = (0..cols as i32).map(|c| 30_000 + c).collect();
        let row_sum: Vec<i32> = (0..rows as i32).map(|r| 31_000 - r).collect();
        let bias: Vec<i32> = (0..cols as i32).map(|c| c * 100).collect();
        let sums = OffsetVectors::new(Some(&col_sum), Some(&row_sum));
        let mut output = vec![0u8; rows * cols];

        let label = format!("{rows}x{cols}");
        group.bench_with_input(BenchmarkId::new("serial", &label), &label, |b, _| {
            b.iter(|| stage.run(black_box(&acc), &sums, Some(&bias), black_box(&mut output)))
        });
        group.bench_with_input(BenchmarkId::new("parallel", &label), &label, |b, _| {
            b.iter(|| stage.run_parallel(black_box(&acc), &sums, Some(&bias), black_box(&mut output)))
        });
    }

    group.finish();
}

fn bench_per_channel(c: &mut Criterion) {
    let (rows, cols) = (256, 256);
    let mm = TensorInfo::new(Shape::matrix(rows, cols), DType::S32);
    let out = TensorInfo::new(Shape::matrix(rows, cols), DType::QAsymm8Signed);
    let channels = (0..cols as i32)
        .map(|c| ChannelMultiplier::new((1 << 30) + c * 1_000_000, 10 + c % 4))
        .collect();
    let config = OutputStageConfig::per_channel(channels);
    let stage =
        OutputStagePipeline::<i8>::configure(&StageDescriptors::new(&mm, &out), &config).unwrap();
    let acc = accumulators(rows * cols);
    let mut output = vec![0i8; rows * cols];

    c.bench_function("output_stage/per_channel_256x256", |b| {
        b.iter(|| stage.run(black_box(&acc), &OffsetVectors::none(), None, black_box(&mut output)))
    });
}

fn bench_elementwise(c: &mut Criterion) {
    let mut group = c.benchmark_group("elementwise");
    let n = 1 << 16;

    let reals: Vec<f32> = (0..n).map(|i| (i as f32) * 0.001 - 30.0).collect();
    let q = UniformQuantizationInfo::new(0.25, 3);
    let mut codes = vec![0i8; n];
    group.bench_function("quantize_slice", |b| {
        b.iter(|| quantize_slice(black_box(&reals), &q, black_box(&mut codes)))
    });

    let r = RequantizationInfo::new(&q, &UniformQuantizationInfo::new(0.1, 128));
    let mut shifted = vec![0u8; n];
    group.bench_function("requantize_slice", |b| {
        b.iter(|| requantize_slice(black_box(&codes), &r, black_box(&mut shifted)))
    });

    let acc = accumulators(n);
    let mut scratch = acc.clone();
    group.bench_function("rescale_in_place", |b| {
        b.iter(|| {
            scratch.copy_from_slice(&acc);
            rescale_in_place(black_box(&mut scratch), 1_518_500_250, 7);
        })
    });

    group.finish();
}

criterion_group!(benches, bench_output_stage, bench_per_channel, bench_elementwise);
criterion_main!(benches);
