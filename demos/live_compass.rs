// demos/live_compass.rs — Live view-cone tracking from the screen.
//
//   ┌───────────────────────────┬───────────────────────────┐
//   │ capture (blue channel)    │ compass                   │
//   │ + band edges (green)      │ needle (orange)           │
//   │ + selected pair (yellow)  │                           │
//   └───────────────────────────┴───────────────────────────┘
//
// MODES
// ─────
//   cargo run --example live_compass --features screen -- [config.json]
//       Runs the tick loop on the UI thread so the edge mask can be shown.
//       Space pauses, R resets the tracker, Esc quits.
//
//   cargo run --example live_compass --features screen -- --headless [config.json]
//       Runs the background worker and prints every new azimuth.
//
// Set RUST_LOG=debug to see per-tick pair selection.

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};
use minifb::{Key, KeyRepeat, Window, WindowOptions};

use cone_compass::angle::needle_target;
use cone_compass::capture::ScreenCapture;
use cone_compass::gpu::GpuEdgeExtractor;
use cone_compass::{
    load_config, AzimuthTracker, CpuEdgeExtractor, EdgeExtractor, EdgeMask, Frame, FrameSource, LatestAzimuth,
    TickOutcome, TrackerConfig,
};

/// Display scale: window pixels per captured pixel.
const SCALE: usize = 2;

/// Needle easing per UI frame.
const NEEDLE_EASE: f32 = 0.3;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let headless = args.iter().any(|a| a == "--headless");
    let config = match args.iter().find(|a| !a.starts_with("--")) {
        Some(path) => load_config(Path::new(path)).expect("config"),
        None => TrackerConfig::default(),
    };
    info!("capture rectangle {:?}", config.capture);

    let source = ScreenCapture::new(config.capture).expect("screen capture");
    let extractor: Box<dyn EdgeExtractor + Send> = match GpuEdgeExtractor::from_choice(config.adapter) {
        Ok(gpu) => {
            info!("edges on {}", gpu.device().adapter_info);
            Box::new(gpu)
        }
        Err(e) => {
            warn!("{e}; falling back to CPU edges");
            Box::new(CpuEdgeExtractor)
        }
    };

    if headless {
        run_headless(source, extractor, config);
    } else {
        run_window(source, extractor, config);
    }
}

// ---------------------------------------------------------------------------
// Headless: background worker
// ---------------------------------------------------------------------------

fn run_headless(source: ScreenCapture, extractor: Box<dyn EdgeExtractor + Send>, config: TrackerConfig) {
    let latest = LatestAzimuth::new();
    let handle = cone_compass::spawn(source, extractor, config, latest.clone()).expect("spawn worker");

    let mut last = None;
    while !handle.is_finished() {
        if let Some(az) = latest.get() {
            if last != Some(az) {
                println!("{az:3}°");
                last = Some(az);
            }
        }
        thread::sleep(Duration::from_millis(16));
    }
    if let Err(e) = handle.stop() {
        eprintln!("worker failed: {e}");
    }
}

// ---------------------------------------------------------------------------
// Windowed: tick loop on the UI thread
// ---------------------------------------------------------------------------

fn run_window(mut source: ScreenCapture, mut extractor: Box<dyn EdgeExtractor + Send>, config: TrackerConfig) {
    let w = config.capture.width() as usize;
    let h = config.capture.height() as usize;
    let (sw, sh) = (w * SCALE, h * SCALE);
    let panel_gap = 4usize;
    let (win_w, win_h) = (sw * 2 + panel_gap, sh);

    let mut window = Window::new(
        "cone-compass — Space pause, R reset, Esc quit",
        win_w,
        win_h,
        WindowOptions { resize: false, ..Default::default() },
    )
    .expect("window creation failed");
    let interval = Duration::from_millis(config.tick_interval_ms);
    window.limit_update_rate(Some(interval));

    let mut tracker = AzimuthTracker::new(config);
    let mut fb = vec![0u32; win_w * win_h];
    let mut paused = false;
    let mut needle = 0.0f32;
    let mut last_frame: Option<(Frame, EdgeMask)> = None;

    while window.is_open() && !window.is_key_down(Key::Escape) {
        if window.is_key_pressed(Key::Space, KeyRepeat::No) {
            paused = !paused;
            info!("{}", if paused { "paused" } else { "resumed" });
        }
        if window.is_key_pressed(Key::R, KeyRepeat::No) {
            tracker.reset();
            info!("tracker reset");
        }

        if !paused {
            let t0 = Instant::now();
            match source.capture() {
                Ok(frame) => match extractor.extract(&frame) {
                    Ok(mask) => {
                        let (outcome, stats) = tracker.process_edges(&mask);
                        if let TickOutcome::Resolved(az) = outcome {
                            info!(
                                "{az:3}°  ({} segs, {} clusters, {:.1} ms)",
                                stats.segments,
                                stats.clusters,
                                t0.elapsed().as_secs_f64() * 1e3
                            );
                        }
                        last_frame = Some((frame, mask));
                    }
                    Err(e) => {
                        eprintln!("edge extraction failed: {e}");
                        break;
                    }
                },
                Err(e) => warn!("capture failed: {e}"),
            }
        }

        if let Some(az) = tracker.smoothed() {
            let target = needle_target(needle, az);
            needle += (target - needle) * NEEDLE_EASE;
        }

        fb.fill(0xFF1A1A2E);
        if let Some((frame, mask)) = &last_frame {
            render_capture(&mut fb, win_w, frame, mask, tracker.prev_pair().map(|p| (p.a, p.b)));
        }
        render_compass(&mut fb, win_w, sw + panel_gap, sw.min(sh), needle, tracker.smoothed().is_some());

        window.update_with_buffer(&fb, win_w, win_h).expect("framebuffer update");
    }
}

// ---------------------------------------------------------------------------
// Framebuffer rendering (minifb, ARGB u32)
// ---------------------------------------------------------------------------

fn render_capture(fb: &mut [u32], win_w: usize, frame: &Frame, mask: &EdgeMask, pair: Option<(f32, f32)>) {
    let (w, h) = frame.dims();
    for y in 0..h.min(mask.height()) {
        for x in 0..w.min(mask.width()) {
            let colour = if mask.is_edge(x, y) { 0xFF00E060 } else { grey(frame.channel(x, y, 0) / 2) };
            for dy in 0..SCALE {
                for dx in 0..SCALE {
                    set_pixel(fb, win_w, x * SCALE + dx, y * SCALE + dy, colour);
                }
            }
        }
    }

    // Selected pair as rays from the centre, image-axis azimuths.
    if let Some((a, b)) = pair {
        let (cx, cy) = ((w * SCALE / 2) as f32, (h * SCALE / 2) as f32);
        let len = (w.min(h) * SCALE / 2) as f32;
        for az in [a, b] {
            let (s, c) = az.to_radians().sin_cos();
            draw_line(fb, win_w, (cx, cy), (cx + c * len, cy + s * len), 0xFFFFE000);
        }
    }
}

fn render_compass(fb: &mut [u32], win_w: usize, x_off: usize, size: usize, needle: f32, locked: bool) {
    let r = (size / 2).saturating_sub(8) as f32;
    let (cx, cy) = ((x_off + size / 2) as f32, (size / 2) as f32);

    // Dial.
    for i in 0..360 {
        let (s, c) = (i as f32).to_radians().sin_cos();
        set_pixel(fb, win_w, (cx + c * r) as usize, (cy + s * r) as usize, 0xFF808080);
    }

    // Compass azimuth: 0° up, clockwise. Screen direction = (sin A, -cos A).
    let (s, c) = needle.to_radians().sin_cos();
    let tip = (cx + s * r * 0.9, cy - c * r * 0.9);
    let colour = if locked { 0xFFFF8000 } else { 0xFF505050 };
    draw_line(fb, win_w, (cx, cy), tip, colour);
}

fn draw_line(fb: &mut [u32], win_w: usize, from: (f32, f32), to: (f32, f32), colour: u32) {
    let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs()).ceil().max(1.0) as usize;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let x = from.0 + (to.0 - from.0) * t;
        let y = from.1 + (to.1 - from.1) * t;
        if x >= 0.0 && y >= 0.0 {
            set_pixel(fb, win_w, x as usize, y as usize, colour);
        }
    }
}

#[inline]
fn set_pixel(fb: &mut [u32], win_w: usize, x: usize, y: usize, colour: u32) {
    if x < win_w {
        if let Some(p) = fb.get_mut(y * win_w + x) {
            *p = colour;
        }
    }
}

#[inline]
fn grey(v: u8) -> u32 {
    let v = v as u32;
    0xFF000000 | (v << 16) | (v << 8) | v
}
