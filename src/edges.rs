// edges.rs — Banded gradient-magnitude edge mask (CPU reference).
//
// For every interior pixel the kernel takes one byte of the BGRA pixel at
// the 4-neighbourhood and forms central differences:
//
//   gx = I(x-1, y) - I(x+1, y)
//   gy = I(x, y-1) - I(x, y+1)
//   magnitude = sqrt(gx² + gy²)
//
// and marks the pixel 255 iff 180 ≤ magnitude ≤ 275. This is a BAND, not a
// threshold: the view-cone strokes on the minimap produce gradients inside
// the band while terrain texture (weak) and the minimap frame (saturated)
// fall outside it.
//
// The interior test is `x > 1 && y > 1 && x < w-1 && y < h-1`, so the
// top/left border is two pixels wide and the bottom/right border one.
//
// This module is the authoritative reference; `gpu::edges` runs the same
// arithmetic in WGSL and is validated against it pixel-for-pixel.

use crate::error::Result;
use crate::frame::{EdgeMask, Frame, EDGE_ON};

/// Byte of the BGRA pixel the gradients are taken from (blue).
pub const GRADIENT_CHANNEL: usize = 0;

/// Lower bound of the accepted gradient magnitude (inclusive).
pub const BAND_LOW: f32 = 180.0;

/// Upper bound of the accepted gradient magnitude (inclusive).
pub const BAND_HIGH: f32 = 275.0;

/// Anything that turns a frame into an edge mask.
///
/// `&mut self` because the GPU implementation owns buffers it resizes.
pub trait EdgeExtractor {
    fn extract(&mut self, frame: &Frame) -> Result<EdgeMask>;
}

impl<E: EdgeExtractor + ?Sized> EdgeExtractor for Box<E> {
    fn extract(&mut self, frame: &Frame) -> Result<EdgeMask> {
        (**self).extract(frame)
    }
}

/// Whether a pixel at (x, y) is evaluated by the kernel.
#[inline]
pub fn is_interior(x: usize, y: usize, width: usize, height: usize) -> bool {
    x > 1 && y > 1 && x + 1 < width && y + 1 < height
}

/// The band test on a raw gradient pair.
#[inline]
pub fn in_band(gx: i32, gy: i32) -> bool {
    let magnitude = ((gx * gx + gy * gy) as f32).sqrt();
    (BAND_LOW..=BAND_HIGH).contains(&magnitude)
}

/// Compute the band edge mask on the CPU.
pub fn band_edges(frame: &Frame) -> EdgeMask {
    let (w, h) = frame.dims();
    let mut mask = EdgeMask::new(w, h);
    if w < 4 || h < 4 {
        return mask;
    }

    let c = GRADIENT_CHANNEL;
    for y in 2..h - 1 {
        for x in 2..w - 1 {
            let gx = frame.channel(x - 1, y, c) as i32 - frame.channel(x + 1, y, c) as i32;
            let gy = frame.channel(x, y - 1, c) as i32 - frame.channel(x, y + 1, c) as i32;
            if in_band(gx, gy) {
                mask.set(x, y, EDGE_ON);
            }
        }
    }
    mask
}

/// CPU implementation of [`EdgeExtractor`].
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuEdgeExtractor;

impl EdgeExtractor for CpuEdgeExtractor {
    fn extract(&mut self, frame: &Frame) -> Result<EdgeMask> {
        Ok(band_edges(frame))
    }
}
