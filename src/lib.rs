// cone-compass: minimap view-cone heading tracker
//
// capture → band edges (GPU) → probabilistic Hough → scoring/clustering
//         → 120° pair selection → bisector → circular EMA → publish
//
// The CPU modules are the reference implementation; `gpu` accelerates the
// edge kernel and is validated against `edges`.

pub mod frame;
pub mod error;
pub mod config;
pub mod capture;
pub mod edges;
pub mod hough;
pub mod candidates;
pub mod pair;
pub mod angle;
pub mod tracker;
pub mod publish;
pub mod worker;

pub mod gpu;

pub use capture::FrameSource;
pub use config::{load_config, TrackerConfig};
pub use edges::{CpuEdgeExtractor, EdgeExtractor};
pub use error::{Error, Result};
pub use frame::{EdgeMask, Frame};
pub use publish::{AzimuthSink, LatestAzimuth};
pub use tracker::{AzimuthTracker, TickOutcome, TickStats};
pub use worker::{spawn, WorkerHandle};
