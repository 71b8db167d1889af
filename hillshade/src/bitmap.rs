//! Rendered shade bitmaps and neighbour-border merging.

use crate::shading::RawShadingResult;
use std::sync::{Arc, Mutex, MutexGuard};

/// Edge of a bitmap, named from the sink's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Border {
    North,
    South,
    East,
    West,
}

/// A square greyscale shade tile, `width = height = axis_len + 2·padding`.
///
/// Pixels are guarded by a mutex because a neighbour tile's border stripe
/// may be merged into this bitmap's padding while a renderer is reading
/// it; only one merge runs against a given sink at a time.
pub struct ShadeBitmap {
    width: usize,
    height: usize,
    padding: usize,
    size_bytes: u64,
    pixels: Mutex<Vec<u8>>,
}

impl ShadeBitmap {
    /// Wrap raw shade bytes. `bytes.len()` must equal `width * height`.
    pub fn new(width: usize, height: usize, padding: usize, bytes: Vec<u8>) -> Self {
        assert_eq!(bytes.len(), width * height, "pixel buffer size mismatch");
        Self {
            width,
            height,
            padding,
            size_bytes: bytes.len() as u64,
            pixels: Mutex::new(bytes),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    /// In-memory footprint, used for cache accounting.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Lock and access the pixel buffer.
    pub fn pixels(&self) -> MutexGuard<'_, Vec<u8>> {
        self.pixels.lock().unwrap()
    }

    /// Copy of the pixel buffer.
    pub fn to_vec(&self) -> Vec<u8> {
        self.pixels().clone()
    }

    /// Copy one edge stripe of a same-sized neighbour into this bitmap's
    /// padding.
    ///
    /// `border` names the edge of `self` being filled; `source` is the
    /// neighbour on that side. The stripe read from the neighbour is its
    /// opposite interior edge. The source stripe is copied out before the
    /// sink lock is taken, so two tiles merging into each other cannot
    /// deadlock.
    pub fn merge_same_sized(&self, source: &ShadeBitmap, border: Border) {
        let padding = self.padding;
        if padding == 0 || self.width != source.width || self.height != source.height {
            return;
        }

        let width = self.width;
        let height = self.height;

        // Clip rect on the sink and the source offset, per border.
        let (clip_x, clip_y, clip_w, clip_h, offset_x, offset_y): (
            usize,
            usize,
            usize,
            usize,
            isize,
            isize,
        ) = match border {
            Border::West => (
                0,
                padding,
                padding,
                height - 2 * padding,
                -(width as isize) + 2 * padding as isize,
                0,
            ),
            Border::East => (
                width - padding,
                padding,
                padding,
                height - 2 * padding,
                width as isize - 2 * padding as isize,
                0,
            ),
            Border::North => (
                padding,
                0,
                width - 2 * padding,
                padding,
                0,
                -(height as isize) + 2 * padding as isize,
            ),
            Border::South => (
                padding,
                height - padding,
                width - 2 * padding,
                padding,
                0,
                height as isize - 2 * padding as isize,
            ),
        };

        let mut stripe = vec![0u8; clip_w * clip_h];
        {
            let source_pixels = source.pixels();
            for row in 0..clip_h {
                for col in 0..clip_w {
                    let src_x = (clip_x + col) as isize - offset_x;
                    let src_y = (clip_y + row) as isize - offset_y;
                    stripe[row * clip_w + col] =
                        source_pixels[src_y as usize * width + src_x as usize];
                }
            }
        }

        let mut sink_pixels = self.pixels();
        for row in 0..clip_h {
            for col in 0..clip_w {
                sink_pixels[(clip_y + row) * width + clip_x + col] = stripe[row * clip_w + col];
            }
        }
    }
}

/// Materialises raw shade bytes into a bitmap.
///
/// The seam exists so platforms with native bitmap types can substitute
/// their own representation; the engine only relies on size accounting
/// and the merge operation.
pub trait BitmapFactory: Send + Sync {
    /// Build a bitmap, or `None` when the raw result cannot be
    /// materialised (the tile is then treated as absent).
    fn create_mono_bitmap(&self, raw: RawShadingResult) -> Option<Arc<ShadeBitmap>>;
}

/// Default factory keeping pixels in plain memory.
pub struct MonoBitmapFactory;

impl BitmapFactory for MonoBitmapFactory {
    fn create_mono_bitmap(&self, raw: RawShadingResult) -> Option<Arc<ShadeBitmap>> {
        if raw.bytes.len() != raw.width * raw.height {
            return None;
        }
        Some(Arc::new(ShadeBitmap::new(
            raw.width,
            raw.height,
            raw.padding,
            raw.bytes,
        )))
    }
}
