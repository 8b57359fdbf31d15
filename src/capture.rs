// capture.rs — Frame sources.
//
// A `FrameSource` yields one BGRA frame per call. Failures are transient
// by contract: the worker logs them and tries again on the next tick.
//
// `ScreenCapture` (feature "screen") grabs the monitor containing the
// rectangle's top-left corner with xcap and crops to the rectangle. xcap
// hands back RGBA; frames are always BGRA downstream, so the crop swaps
// red and blue on the way out.
//
// Closures returning `Result<Frame, CaptureError>` are sources too, which
// is how tests and replays feed the pipeline.

use thiserror::Error;

use crate::config::CaptureRect;
use crate::frame::{Frame, FRAME_CHANNELS};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture rectangle {0:?} is empty")]
    EmptyRect(CaptureRect),
    #[error("capture rectangle {rect:?} is outside the {width}x{height} screen image")]
    OutOfBounds { rect: CaptureRect, width: u32, height: u32 },
    #[error("capture backend error: {0}")]
    Backend(String),
}

/// Produces one frame per tick.
pub trait FrameSource {
    fn capture(&mut self) -> Result<Frame, CaptureError>;
}

impl<F> FrameSource for F
where
    F: FnMut() -> Result<Frame, CaptureError>,
{
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        self()
    }
}

/// Crop `rect` out of a full RGBA screen image whose top-left pixel sits at
/// `origin` in screen coordinates, returning a BGRA frame.
pub fn crop_rgba(
    raw: &[u8],
    image_w: u32,
    image_h: u32,
    origin: (i32, i32),
    rect: CaptureRect,
) -> Result<Frame, CaptureError> {
    if rect.is_empty() {
        return Err(CaptureError::EmptyRect(rect));
    }
    let left = rect.x1 - origin.0;
    let top = rect.y1 - origin.1;
    let out_of_bounds = || CaptureError::OutOfBounds { rect, width: image_w, height: image_h };
    if left < 0 || top < 0 {
        return Err(out_of_bounds());
    }
    let (left, top) = (left as usize, top as usize);
    let (w, h) = (rect.width() as usize, rect.height() as usize);
    if left + w > image_w as usize || top + h > image_h as usize {
        return Err(out_of_bounds());
    }
    if raw.len() < image_w as usize * image_h as usize * FRAME_CHANNELS {
        return Err(CaptureError::Backend(format!(
            "screen image buffer holds {} bytes, expected {}x{}x4",
            raw.len(),
            image_w,
            image_h
        )));
    }

    let stride = image_w as usize * FRAME_CHANNELS;
    let mut data = Vec::with_capacity(w * h * FRAME_CHANNELS);
    for row in top..top + h {
        let start = row * stride + left * FRAME_CHANNELS;
        data.extend_from_slice(&raw[start..start + w * FRAME_CHANNELS]);
    }
    Ok(Frame::from_rgba(w, h, data))
}

#[cfg(feature = "screen")]
pub use screen::ScreenCapture;

#[cfg(feature = "screen")]
mod screen {
    use log::debug;
    use xcap::Monitor;

    use super::{crop_rgba, CaptureError, FrameSource};
    use crate::config::CaptureRect;
    use crate::frame::Frame;

    /// Captures a fixed screen rectangle with xcap.
    ///
    /// The monitor is looked up again on every capture, so the source keeps
    /// working across display reconfiguration and holds no platform handles.
    pub struct ScreenCapture {
        rect: CaptureRect,
    }

    impl ScreenCapture {
        pub fn new(rect: CaptureRect) -> Result<Self, CaptureError> {
            if rect.is_empty() {
                return Err(CaptureError::EmptyRect(rect));
            }
            let monitor = Monitor::from_point(rect.x1, rect.y1).map_err(backend)?;
            debug!(
                "capturing {:?} from monitor {} at ({}, {})",
                rect,
                monitor.name(),
                monitor.x(),
                monitor.y()
            );
            Ok(ScreenCapture { rect })
        }

        pub fn rect(&self) -> CaptureRect {
            self.rect
        }
    }

    impl FrameSource for ScreenCapture {
        fn capture(&mut self) -> Result<Frame, CaptureError> {
            let monitor = Monitor::from_point(self.rect.x1, self.rect.y1).map_err(backend)?;
            let image = monitor.capture_image().map_err(backend)?;
            crop_rgba(image.as_raw(), image.width(), image.height(), (monitor.x(), monitor.y()), self.rect)
        }
    }

    fn backend(e: xcap::XCapError) -> CaptureError {
        CaptureError::Backend(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 4×3 RGBA image where pixel (x, y) = [x, y, 100 + x, 255].
    fn screen() -> Vec<u8> {
        let mut raw = Vec::new();
        for y in 0..3u8 {
            for x in 0..4u8 {
                raw.extend_from_slice(&[x, y, 100 + x, 255]);
            }
        }
        raw
    }

    #[test]
    fn crop_converts_to_bgra() {
        let f = crop_rgba(&screen(), 4, 3, (0, 0), CaptureRect::new(1, 1, 3, 3)).unwrap();
        assert_eq!(f.dims(), (2, 2));
        // Blue (byte 0) comes from the RGBA byte 2.
        assert_eq!(f.channel(0, 0, 0), 101);
        assert_eq!(f.channel(0, 0, 2), 1);
        assert_eq!(f.channel(1, 1, 1), 2);
    }

    #[test]
    fn crop_respects_monitor_origin() {
        // Monitor placed at (1920, 0): screen x 1922 is image column 2.
        let f = crop_rgba(&screen(), 4, 3, (1920, 0), CaptureRect::new(1922, 0, 1924, 1)).unwrap();
        assert_eq!(f.channel(0, 0, 2), 2);
        assert_eq!(f.channel(1, 0, 2), 3);
    }

    #[test]
    fn crop_rejects_out_of_bounds_and_empty() {
        let raw = screen();
        assert!(matches!(
            crop_rgba(&raw, 4, 3, (0, 0), CaptureRect::new(2, 0, 6, 2)),
            Err(CaptureError::OutOfBounds { .. })
        ));
        assert!(matches!(
            crop_rgba(&raw, 4, 3, (10, 10), CaptureRect::new(0, 0, 2, 2)),
            Err(CaptureError::OutOfBounds { .. })
        ));
        assert!(matches!(
            crop_rgba(&raw, 4, 3, (0, 0), CaptureRect::new(1, 1, 1, 3)),
            Err(CaptureError::EmptyRect(_))
        ));
        assert!(matches!(
            crop_rgba(&raw[..8], 4, 3, (0, 0), CaptureRect::new(0, 0, 1, 1)),
            Err(CaptureError::Backend(_))
        ));
    }

    #[test]
    fn closures_are_frame_sources() {
        let mut n = 0;
        let mut source = || {
            n += 1;
            if n % 2 == 0 {
                Err(CaptureError::Backend("flaky".into()))
            } else {
                Ok(Frame::filled(2, 2, [0, 0, 0, 255]))
            }
        };
        assert!(source.capture().is_ok());
        assert!(source.capture().is_err());
        assert!(source.capture().is_ok());
    }
}
