// frame.rs — Captured frame and binary edge mask.
//
// A `Frame` is the raw capture of the minimap rectangle: 4 bytes per pixel,
// row-major, no row padding. Every capture backend normalises to BGRA before
// handing a frame to the pipeline, so byte 0 of each pixel is always blue.
// The edge kernel reads exactly that byte (see `edges::GRADIENT_CHANNEL`).
//
// An `EdgeMask` is the single-channel output of the edge extractor, one
// byte per pixel, values in {0, 255}.
//
// Both types are created and dropped within a single tick; neither has
// identity beyond its buffer.

use std::fmt;

/// Bytes per pixel in a `Frame`.
pub const FRAME_CHANNELS: usize = 4;

/// Value written to the mask for an accepted edge pixel.
pub const EDGE_ON: u8 = 255;

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// A BGRA frame of the capture rectangle.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    /// Length = width * height * 4.
    data: Vec<u8>,
}

impl Frame {
    /// Wrap an existing BGRA buffer.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height * 4`.
    pub fn from_bgra(width: usize, height: usize, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            width * height * FRAME_CHANNELS,
            "BGRA buffer length does not match {width}x{height}"
        );
        Frame { width, height, data }
    }

    /// Convert an RGBA buffer (the layout most screen grabbers return) into
    /// a BGRA frame.
    pub fn from_rgba(width: usize, height: usize, mut data: Vec<u8>) -> Self {
        for px in data.chunks_exact_mut(FRAME_CHANNELS) {
            px.swap(0, 2);
        }
        Self::from_bgra(width, height, data)
    }

    /// A frame filled with one BGRA colour.
    pub fn filled(width: usize, height: usize, bgra: [u8; 4]) -> Self {
        let data = bgra.iter().copied().cycle().take(width * height * FRAME_CHANNELS).collect();
        Frame { width, height, data }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// (width, height) — the key the GPU extractor sizes its buffers by.
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Raw BGRA bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// One channel of the pixel at (x, y).
    #[inline]
    pub fn channel(&self, x: usize, y: usize, c: usize) -> u8 {
        debug_assert!(x < self.width && y < self.height && c < FRAME_CHANNELS);
        self.data[(y * self.width + x) * FRAME_CHANNELS + c]
    }

    /// Overwrite the pixel at (x, y).
    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, bgra: [u8; 4]) {
        let i = (y * self.width + x) * FRAME_CHANNELS;
        self.data[i..i + FRAME_CHANNELS].copy_from_slice(&bgra);
    }

    /// Frame centre in image coordinates, `(width/2, height/2)`.
    pub fn center(&self) -> (f32, f32) {
        (self.width as f32 / 2.0, self.height as f32 / 2.0)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({}x{} BGRA)", self.width, self.height)
    }
}

// ---------------------------------------------------------------------------
// EdgeMask
// ---------------------------------------------------------------------------

/// Binary edge image produced by the band-gradient kernel.
#[derive(Clone, PartialEq, Eq)]
pub struct EdgeMask {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl EdgeMask {
    /// All-zero mask.
    pub fn new(width: usize, height: usize) -> Self {
        EdgeMask { width, height, data: vec![0u8; width * height] }
    }

    /// Wrap a single-channel buffer.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<u8>) -> Self {
        assert_eq!(data.len(), width * height, "mask buffer length does not match {width}x{height}");
        EdgeMask { width, height, data }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: u8) {
        self.data[y * self.width + x] = v;
    }

    #[inline]
    pub fn is_edge(&self, x: usize, y: usize) -> bool {
        self.get(x, y) != 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Number of edge pixels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    /// Iterate `(x, y)` of every edge pixel in row-major order.
    pub fn edge_points(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let w = self.width;
        self.data
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0)
            .map(move |(i, _)| (i % w, i / w))
    }
}

impl fmt::Debug for EdgeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeMask({}x{}, {} edges)", self.width, self.height, self.count())
    }
}
