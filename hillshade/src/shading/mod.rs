//! Shading algorithm contracts.
//!
//! A [`ShadingAlgorithm`] is the cache-facing half of a kernel: it sizes
//! outputs, fingerprints render parameters for cache identity, and runs
//! the raster. The per-element shade computation itself is the
//! pipeline-facing [`crate::pipeline::UnitKernel`], built per render by
//! the algorithm.

mod adaptive;
mod kernel;

pub use adaptive::{AdaptiveShading, HGT_WIDTH_BASE, ZOOM_MAX_BASE};
pub use kernel::LinearShadeKernel;

use crate::cache::HgtFileInfo;
use crate::error::Result;

/// Raw output of one render before bitmap materialisation.
pub struct RawShadingResult {
    pub bytes: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub padding: usize,
}

/// Cache-facing contract of a shading kernel.
pub trait ShadingAlgorithm: Send + Sync {
    /// Length of a side of the square input grid minus one, accounting
    /// for the one-sample overlap HGT tiles share with their neighbours.
    fn input_axis_len(&self, info: &HgtFileInfo) -> usize {
        let samples = info.size_bytes() / 2;
        ((samples as f64).sqrt() as usize).saturating_sub(1)
    }

    /// Side length of the square output, excluding padding.
    fn output_axis_len(
        &self,
        info: &HgtFileInfo,
        zoom: i32,
        px_per_lat: f64,
        px_per_lon: f64,
    ) -> usize;

    /// Side length of the square output, including padding.
    fn output_width(
        &self,
        info: &HgtFileInfo,
        padding: usize,
        zoom: i32,
        px_per_lat: f64,
        px_per_lon: f64,
    ) -> usize {
        self.output_axis_len(info, zoom, px_per_lat, px_per_lon) + 2 * padding
    }

    /// Upper bound on the output size in bytes, used for admission
    /// control before the render runs.
    fn output_size_bytes(
        &self,
        info: &HgtFileInfo,
        padding: usize,
        zoom: i32,
        px_per_lat: f64,
        px_per_lon: f64,
    ) -> u64 {
        let width = self.output_width(info, padding, zoom, px_per_lat, px_per_lon) as u64;
        width * width
    }

    /// Fingerprint of everything that determines whether an existing
    /// render can be reused. Equal tags mean a reusable render.
    fn cache_tag(
        &self,
        info: &HgtFileInfo,
        padding: usize,
        zoom: i32,
        px_per_lat: f64,
        px_per_lon: f64,
    ) -> u64 {
        let mut tag = info.identity_hash();
        tag = tag.wrapping_mul(31).wrapping_add(padding as u64);
        tag.wrapping_mul(31)
            .wrapping_add(self.cache_tag_bin(info, zoom, px_per_lat, px_per_lon) as u64)
    }

    /// Display parameters reduced to a number; folded into
    /// [`ShadingAlgorithm::cache_tag`]. Fixed-output algorithms leave
    /// this at zero.
    fn cache_tag_bin(&self, _info: &HgtFileInfo, _zoom: i32, _px_per_lat: f64, _px_per_lon: f64) -> i64 {
        0
    }

    /// Minimum supported zoom level.
    fn zoom_min(&self, _info: &HgtFileInfo) -> i32 {
        0
    }

    /// Maximum supported zoom level.
    fn zoom_max(&self, _info: &HgtFileInfo) -> i32 {
        i32::MAX
    }

    /// Run the raster and produce the output byte grid.
    fn raster(
        &self,
        info: &HgtFileInfo,
        padding: usize,
        zoom: i32,
        px_per_lat: f64,
        px_per_lon: f64,
    ) -> Result<RawShadingResult>;
}
