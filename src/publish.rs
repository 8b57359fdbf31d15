// publish.rs — Non-blocking hand-off of resolved azimuths.
//
// The worker calls `publish` once per Resolved tick. Implementations must
// return immediately: a slow consumer loses intermediate values, it never
// stalls the tick loop.
//
//   LatestAzimuth   single atomic slot, readers see the newest value
//   SyncSender<u16> bounded queue, try_send, dropped when full
//   FnSink          any `Fn(u16)` setter (e.g. a UI widget's)

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::Arc;

use log::trace;

/// Receives integer azimuths in [0, 360) from the worker thread.
pub trait AzimuthSink: Send {
    fn publish(&self, azimuth: u16);
}

/// Sentinel for "nothing published yet"; real values are < 360.
const EMPTY: u32 = u32::MAX;

/// Latest-value cell shared between the worker and any number of readers.
///
/// Clones share the same slot.
#[derive(Debug, Clone)]
pub struct LatestAzimuth {
    slot: Arc<AtomicU32>,
}

impl LatestAzimuth {
    pub fn new() -> Self {
        LatestAzimuth { slot: Arc::new(AtomicU32::new(EMPTY)) }
    }

    /// Newest published azimuth, `None` before the first one.
    pub fn get(&self) -> Option<u16> {
        match self.slot.load(Ordering::Acquire) {
            EMPTY => None,
            v => Some(v as u16),
        }
    }

    /// Take the newest value and clear the slot, so each value is observed
    /// at most once.
    pub fn take(&self) -> Option<u16> {
        match self.slot.swap(EMPTY, Ordering::AcqRel) {
            EMPTY => None,
            v => Some(v as u16),
        }
    }
}

impl Default for LatestAzimuth {
    fn default() -> Self {
        Self::new()
    }
}

impl AzimuthSink for LatestAzimuth {
    fn publish(&self, azimuth: u16) {
        self.slot.store(azimuth as u32, Ordering::Release);
    }
}

impl AzimuthSink for SyncSender<u16> {
    fn publish(&self, azimuth: u16) {
        match self.try_send(azimuth) {
            Ok(()) => {}
            Err(TrySendError::Full(v)) => trace!("consumer queue full, dropping {v}"),
            Err(TrySendError::Disconnected(v)) => trace!("consumer gone, dropping {v}"),
        }
    }
}

impl<S: AzimuthSink + Sync + ?Sized> AzimuthSink for Arc<S> {
    fn publish(&self, azimuth: u16) {
        (**self).publish(azimuth)
    }
}

/// Adapts a setter closure. The closure runs on the worker thread and must
/// not block.
pub struct FnSink<F>(pub F);

impl<F: Fn(u16) + Send> AzimuthSink for FnSink<F> {
    fn publish(&self, azimuth: u16) {
        (self.0)(azimuth)
    }
}
