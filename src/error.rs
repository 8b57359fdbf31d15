// error.rs — Crate-level error taxonomy.
//
//   ConfigError / GpuError  fatal at construction, never retried
//   ResourceError           fatal at runtime, ends the worker
//   CaptureError            transient, the worker logs it and skips the tick
//
// "No signal" and "no pair" are not errors; they are `TickOutcome` variants.

use thiserror::Error;

pub use crate::capture::CaptureError;
pub use crate::config::ConfigError;
pub use crate::gpu::device::GpuError;

/// GPU buffer lifecycle failures.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("{label} buffer of {requested} bytes exceeds device limit of {limit} bytes")]
    BufferTooLarge { label: &'static str, requested: u64, limit: u64 },
    #[error("failed to allocate buffers for {width}x{height} frame: {reason}")]
    Allocation { width: usize, height: usize, reason: String },
    #[error("edge mask readback failed: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),
    #[error("edge mask readback channel closed before the map callback fired")]
    ReadbackDisconnected,
    #[error("cannot size device buffers for an empty {width}x{height} frame")]
    EmptyFrame { width: usize, height: usize },
}

/// Any error surfaced by the tracker.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("GPU initialisation failed: {0}")]
    Gpu(#[from] GpuError),
    #[error("GPU resource error: {0}")]
    Resource(#[from] ResourceError),
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("worker thread panicked")]
    WorkerPanicked,
}

impl Error {
    /// Whether this error must stop the pipeline. Only capture failures are
    /// recoverable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Capture(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
