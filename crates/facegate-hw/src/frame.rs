//! RGB frames plus YUYV conversion, luma and dark-frame detection.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// A captured RGB8 camera frame.
///
/// Pixel data lives behind an `Arc`, so handing a frame from the capture
/// thread to the UI (or on to the recognition worker) never copies pixels.
#[derive(Clone)]
pub struct Frame {
    data: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
    /// Position of this frame within its capture session, starting at 1.
    pub sequence: u32,
}

impl Frame {
    /// Wrap packed RGB8 pixel data (`width * height * 3` bytes).
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u32) -> Result<Self, FrameError> {
        let expected = (width as usize) * (height as usize) * 3;
        if data.len() != expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data: data.into(),
            width,
            height,
            timestamp: Instant::now(),
            sequence,
        })
    }

    /// Packed RGB8 pixels, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Average pixel brightness (0 to 255) over the luma channel.
    pub fn avg_brightness(&self) -> f32 {
        let luma = self.to_luma();
        if luma.is_empty() {
            return 0.0;
        }
        luma.iter().map(|&b| b as f32).sum::<f32>() / luma.len() as f32
    }

    /// BT.601 luma plane (one byte per pixel).
    pub fn to_luma(&self) -> Vec<u8> {
        self.data
            .chunks_exact(3)
            .map(|px| {
                let y = 299 * px[0] as u32 + 587 * px[1] as u32 + 114 * px[2] as u32;
                (y / 1000) as u8
            })
            .collect()
    }

    /// True when the frame is too dark to contain a usable face.
    pub fn is_dark(&self) -> bool {
        is_dark_frame(&self.to_luma(), 0.95)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Convert packed YUYV (4:2:2) to RGB8.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share
/// the chroma pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for quad in yuyv[..expected].chunks_exact(4) {
        let u = quad[1] as f32 - 128.0;
        let v = quad[3] as f32 - 128.0;
        for y in [quad[0], quad[2]] {
            let y = y as f32;
            rgb.push((y + 1.402 * v).round().clamp(0.0, 255.0) as u8);
            rgb.push((y - 0.344_136 * u - 0.714_136 * v).round().clamp(0.0, 255.0) as u8);
            rgb.push((y + 1.772 * u).round().clamp(0.0, 255.0) as u8);
        }
    }
    Ok(rgb)
}

/// Check if a luma plane is dark.
///
/// Returns true if more than `threshold_pct` of pixels fall in the darkest
/// bucket (below 32).
pub fn is_dark_frame(gray: &[u8], threshold_pct: f32) -> bool {
    if gray.is_empty() {
        return true;
    }
    let dark_count = gray.iter().filter(|&&p| p < 32).count();
    (dark_count as f32 / gray.len() as f32) > threshold_pct
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid pixel buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
