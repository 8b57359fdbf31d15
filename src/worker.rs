// worker.rs — Background tick loop.
//
// One dedicated thread owns the frame source, the edge extractor (and with
// it every GPU object) and the tracker. Each iteration:
//
//   capture → extract → track → publish (Resolved only) → wait out interval
//
// The interval is measured from tick start; an overrunning tick is followed
// immediately by the next one. Capture errors are logged and the tick is
// skipped. Any other error ends the loop and is handed back by `stop()`.
//
// Control from other threads goes through atomics only:
//   running  cleared by stop(); checked once per iteration and while waiting
//   active   pause/resume; the thread stays alive but skips capture
//   reset    one-shot request to forget the previous pair and EMA

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::capture::FrameSource;
use crate::config::TrackerConfig;
use crate::edges::EdgeExtractor;
use crate::error::{Error, Result};
use crate::publish::AzimuthSink;
use crate::tracker::{AzimuthTracker, TickOutcome};

/// Tick counters, readable while the worker runs.
#[derive(Debug, Default)]
pub struct WorkerStats {
    ticks: AtomicU64,
    resolved: AtomicU64,
    no_signal: AtomicU64,
    no_pair: AtomicU64,
    capture_errors: AtomicU64,
}

impl WorkerStats {
    /// Ticks that ran the pipeline (paused iterations are not counted).
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn resolved(&self) -> u64 {
        self.resolved.load(Ordering::Relaxed)
    }

    pub fn no_signal(&self) -> u64 {
        self.no_signal.load(Ordering::Relaxed)
    }

    pub fn no_pair(&self) -> u64 {
        self.no_pair.load(Ordering::Relaxed)
    }

    pub fn capture_errors(&self) -> u64 {
        self.capture_errors.load(Ordering::Relaxed)
    }

    fn record(&self, outcome: TickOutcome) {
        let counter = match outcome {
            TickOutcome::Resolved(_) => &self.resolved,
            TickOutcome::NoSignal => &self.no_signal,
            TickOutcome::NoPair => &self.no_pair,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
struct Control {
    running: AtomicBool,
    active: AtomicBool,
    reset: AtomicBool,
}

/// Handle to the running worker.
///
/// Dropping the handle stops and joins the worker, discarding its result;
/// call [`stop`](WorkerHandle::stop) to observe it.
pub struct WorkerHandle {
    control: Arc<Control>,
    stats: Arc<WorkerStats>,
    thread: Option<JoinHandle<Result<()>>>,
}

/// Validate `config` and start the tick loop on a new thread.
///
/// The source, extractor and sink move into the thread.
pub fn spawn<S, E, P>(source: S, extractor: E, config: TrackerConfig, sink: P) -> Result<WorkerHandle>
where
    S: FrameSource + Send + 'static,
    E: EdgeExtractor + Send + 'static,
    P: AzimuthSink + 'static,
{
    config.validate()?;

    let control = Arc::new(Control {
        running: AtomicBool::new(true),
        active: AtomicBool::new(true),
        reset: AtomicBool::new(false),
    });
    let stats = Arc::new(WorkerStats::default());

    let thread = {
        let control = Arc::clone(&control);
        let stats = Arc::clone(&stats);
        thread::Builder::new()
            .name("cone-compass".into())
            .spawn(move || run(source, extractor, config, sink, &control, &stats))
            .map_err(Error::Spawn)?
    };

    Ok(WorkerHandle { control, stats, thread: Some(thread) })
}

fn run<S, E, P>(
    mut source: S,
    mut extractor: E,
    config: TrackerConfig,
    sink: P,
    control: &Control,
    stats: &WorkerStats,
) -> Result<()>
where
    S: FrameSource,
    E: EdgeExtractor,
    P: AzimuthSink,
{
    let interval = Duration::from_millis(config.tick_interval_ms);
    let mut tracker = AzimuthTracker::new(config);
    info!("worker started, tick interval {interval:?}");

    while control.running.load(Ordering::Acquire) {
        let start = Instant::now();

        if control.reset.swap(false, Ordering::AcqRel) {
            debug!("tracker reset requested");
            tracker.reset();
        }

        if control.active.load(Ordering::Acquire) {
            match source.capture() {
                Ok(frame) => {
                    let (outcome, tick) = tracker.process_frame(&mut extractor, &frame).map_err(|e| {
                        error!("worker stopping: {e}");
                        control.running.store(false, Ordering::Release);
                        e
                    })?;
                    stats.ticks.fetch_add(1, Ordering::Relaxed);
                    stats.record(outcome);
                    if let TickOutcome::Resolved(azimuth) = outcome {
                        sink.publish(azimuth);
                    }
                    if start.elapsed() > interval {
                        debug!("tick overran interval: {:?} ({} edge pixels)", start.elapsed(), tick.edge_pixels);
                    }
                }
                Err(e) => {
                    stats.capture_errors.fetch_add(1, Ordering::Relaxed);
                    warn!("capture failed, skipping tick: {e}");
                }
            }
        }

        // Wait out the rest of the interval; stop() unparks us early.
        let deadline = start + interval;
        loop {
            let now = Instant::now();
            if now >= deadline || !control.running.load(Ordering::Acquire) {
                break;
            }
            thread::park_timeout(deadline - now);
        }
    }

    info!("worker stopped");
    Ok(())
}

impl WorkerHandle {
    /// Stop the loop and join the thread. When this returns no further GPU
    /// work is in flight. Yields the worker's final result.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        self.control.running.store(false, Ordering::Release);
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        thread.thread().unpark();
        thread.join().map_err(|_| Error::WorkerPanicked)?
    }

    /// Pause (`false`) or resume (`true`) processing.
    pub fn set_active(&self, active: bool) {
        self.control.active.store(active, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.control.active.load(Ordering::Acquire)
    }

    /// Ask the worker to forget its previous pair and smoothed value before
    /// the next tick.
    pub fn request_reset(&self) {
        self.control.reset.store(true, Ordering::Release);
    }

    /// Whether the thread has exited (normally after a fatal error).
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("worker ended with error: {e}");
        }
    }
}
