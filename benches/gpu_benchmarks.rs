// benches/gpu_benchmarks.rs — GPU band edges vs the CPU reference.
//
//   cargo bench --bench gpu_benchmarks
//
// CRITERION + GPU CAVEATS
// ────────────────────────
// Criterion measures wall time including CPU overhead (write_buffer,
// submit, poll, readback). That is the number that matters here: the tick
// blocks on the mask before Hough can run.
//
// The first iterations pay shader compilation and the one-off buffer
// allocation, so warm-up is set explicitly.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

use cone_compass::config::TrackerConfig;
use cone_compass::edges::band_edges;
use cone_compass::gpu::{GpuDevice, GpuEdgeExtractor};
use cone_compass::{AzimuthTracker, CpuEdgeExtractor, EdgeExtractor, Frame};

fn make_minimap(size: usize, from: f32) -> Frame {
    let mut f = Frame::filled(size, size, [0, 0, 0, 255]);
    let c = size as f32 / 2.0;
    for y in 0..size {
        for x in 0..size {
            let base = ((x * 7 + y * 13) % 40) as u8;
            let (dx, dy) = (x as f32 - c, y as f32 - c);
            let az = (dy.atan2(dx).to_degrees() + 360.0) % 360.0;
            let inside = (az - from + 360.0) % 360.0 <= 120.0;
            let b = if inside { base + 190 } else { base };
            f.set_pixel(x, y, [b, base, base, 255]);
        }
    }
    f
}

// ============================================================
// Edge kernel: CPU vs GPU
// ============================================================

fn bench_band_edges(c: &mut Criterion) {
    let mut gpu = GpuEdgeExtractor::new(GpuDevice::new().expect("no GPU adapter"));

    let mut group = c.benchmark_group("band_edges");
    group.warm_up_time(Duration::from_secs(2));

    for size in [256usize, 400, 1024] {
        let frame = make_minimap(size, 20.0);
        group.bench_with_input(BenchmarkId::new("cpu", size), &frame, |b, f| b.iter(|| band_edges(f)));
        group.bench_with_input(BenchmarkId::new("gpu", size), &frame, |b, f| {
            b.iter(|| gpu.extract(f).expect("gpu extract"))
        });
    }
    group.finish();
}

// ============================================================
// Buffer reallocation cost (alternating sizes)
// ============================================================

fn bench_realloc(c: &mut Criterion) {
    let mut gpu = GpuEdgeExtractor::new(GpuDevice::new().expect("no GPU adapter"));
    let frames = [make_minimap(256, 20.0), make_minimap(264, 20.0)];

    let mut group = c.benchmark_group("band_edges_realloc");
    group.warm_up_time(Duration::from_secs(2));
    group.sample_size(20);

    let mut i = 0;
    group.bench_function("gpu_alternating_256_264", |b| {
        b.iter(|| {
            i ^= 1;
            gpu.extract(&frames[i]).expect("gpu extract")
        })
    });
    group.finish();
}

// ============================================================
// Full tick: CPU vs GPU edges
// ============================================================

fn bench_tick(c: &mut Criterion) {
    let frames: Vec<Frame> = (0..8).map(|i| make_minimap(256, 20.0 + i as f32 * 5.0)).collect();
    let mut gpu = GpuEdgeExtractor::new(GpuDevice::new().expect("no GPU adapter"));

    let mut group = c.benchmark_group("tick");
    group.warm_up_time(Duration::from_secs(3));

    let mut tracker = AzimuthTracker::new(TrackerConfig::default());
    let mut i = 0;
    group.bench_function("cpu_256", |b| {
        b.iter(|| {
            i = (i + 1) % frames.len();
            tracker.process_frame(&mut CpuEdgeExtractor, &frames[i])
        })
    });

    let mut tracker = AzimuthTracker::new(TrackerConfig::default());
    group.bench_function("gpu_256", |b| {
        b.iter(|| {
            i = (i + 1) % frames.len();
            tracker.process_frame(&mut gpu, &frames[i])
        })
    });
    group.finish();
}

criterion_group!(benches, bench_band_edges, bench_realloc, bench_tick);
criterion_main!(benches);
