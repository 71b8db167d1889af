//! Adaptive quality selection.
//!
//! Picks an output resolution from the display parameters: zoomed-out
//! views are rendered sub-sampled to save memory and CPU, zoomed-in
//! views switch to super-sampling for detail. The chosen factor also
//! participates in cache identity, so a zoom change that crosses a
//! quality boundary invalidates the cached render.

use super::kernel::LinearShadeKernel;
use super::{RawShadingResult, ShadingAlgorithm};
use crate::cache::HgtFileInfo;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::pipeline::RasterPipeline;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Samples along one axis of a 1" HGT tile; the reference point of the
/// zoom envelope.
pub const HGT_WIDTH_BASE: usize = 3600;

/// Maximum zoom level for a 1" tile with high quality enabled.
pub const ZOOM_MAX_BASE: i32 = 17;

/// Lowest pixel density the selector plans for; guards against absurd
/// strides when a tile is barely visible.
const EFFECTIVE_PX_FLOOR: f64 = 4.0;

/// Adaptive shading algorithm over the parallel raster pipeline.
pub struct AdaptiveShading {
    pipeline: RasterPipeline,
    hq_enabled: bool,
    custom_quality_scale: f64,
    /// `(input axis, effective px bits) → factor`, so repeated requests
    /// for the same tile skip the divisor search.
    factor_cache: Mutex<HashMap<(usize, u64), i32>>,
}

impl AdaptiveShading {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            pipeline: RasterPipeline::new(config.reader_threads, config.compute_threads),
            hq_enabled: config.hq_enabled,
            custom_quality_scale: config.custom_quality_scale.clamp(f64::MIN_POSITIVE, 1.0),
            factor_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_hq_enabled(&self) -> bool {
        self.hq_enabled
    }

    /// Ask in-flight renders to wind down.
    pub fn stop_signal(&self) {
        self.pipeline.stop_signal();
    }

    /// Allow new work after a stop.
    pub fn continue_signal(&self) {
        self.pipeline.continue_signal();
    }

    /// Scale an axis length by a signed quality factor: positive factors
    /// multiply, negative factors divide by the absolute value.
    pub fn scale_by(value: usize, factor: i32) -> usize {
        if factor >= 0 {
            value * factor as usize
        } else {
            value / (-factor) as usize
        }
    }

    /// Signed quality factor for a tile of `input_axis_len` samples
    /// displayed at `px_per_lat` pixels per degree of latitude.
    ///
    /// Factors below `-1` are strides that evenly divide the input axis,
    /// which keeps sub-sampled rows aligned downstream; `1` is identity
    /// and `2` the high-quality super-sample.
    pub fn quality_factor(&self, input_axis_len: usize, px_per_lat: f64) -> i32 {
        if input_axis_len == 0 {
            return 1;
        }
        let effective_px = (px_per_lat * self.custom_quality_scale).max(EFFECTIVE_PX_FLOOR);
        let key = (input_axis_len, effective_px.to_bits());
        if let Some(&factor) = self.factor_cache.lock().unwrap().get(&key) {
            return factor;
        }

        let factor = self.select_factor(input_axis_len, effective_px);
        self.factor_cache.lock().unwrap().insert(key, factor);
        factor
    }

    fn select_factor(&self, input_axis_len: usize, effective_px: f64) -> i32 {
        let axis = input_axis_len as f64;
        let scale = axis / effective_px;

        if scale >= 2.0 {
            let divisor = ((axis / scale).round() as usize).max(1);
            let mut stride = (input_axis_len / divisor).max(1);
            // Largest stride at or below the target that tiles the axis
            // exactly.
            while stride > 1 && input_axis_len % stride != 0 {
                stride -= 1;
            }
            if stride > 1 {
                -(stride as i32)
            } else {
                1
            }
        } else if scale > 1.0 / 1.25 || !self.hq_enabled {
            1
        } else {
            2
        }
    }
}

impl ShadingAlgorithm for AdaptiveShading {
    fn output_axis_len(
        &self,
        info: &HgtFileInfo,
        _zoom: i32,
        px_per_lat: f64,
        _px_per_lon: f64,
    ) -> usize {
        let input_axis_len = self.input_axis_len(info);
        Self::scale_by(input_axis_len, self.quality_factor(input_axis_len, px_per_lat))
    }

    fn cache_tag_bin(&self, info: &HgtFileInfo, _zoom: i32, px_per_lat: f64, _px_per_lon: f64) -> i64 {
        i64::from(self.quality_factor(self.input_axis_len(info), px_per_lat))
    }

    fn zoom_max(&self, info: &HgtFileInfo) -> i32 {
        let mut zoom_max = ZOOM_MAX_BASE;
        if !self.hq_enabled {
            zoom_max -= 1;
        }

        let input_axis_len = self.input_axis_len(info);
        if input_axis_len < HGT_WIDTH_BASE {
            let mut len = HGT_WIDTH_BASE;
            while input_axis_len < len {
                zoom_max -= 1;
                len /= 2;
            }
        } else if input_axis_len > HGT_WIDTH_BASE {
            let mut len = HGT_WIDTH_BASE;
            while input_axis_len > len {
                zoom_max += 1;
                len *= 2;
            }
        }

        zoom_max
    }

    fn raster(
        &self,
        info: &HgtFileInfo,
        padding: usize,
        _zoom: i32,
        px_per_lat: f64,
        _px_per_lon: f64,
    ) -> Result<RawShadingResult> {
        let input_axis_len = self.input_axis_len(info);
        let factor = self.quality_factor(input_axis_len, px_per_lat);
        let output_axis_len = Self::scale_by(input_axis_len, factor);
        let kernel = Arc::new(LinearShadeKernel::new(factor));

        let bytes = self
            .pipeline
            .run(info, input_axis_len, output_axis_len, padding, factor, kernel);
        let width = output_axis_len + 2 * padding;

        Ok(RawShadingResult {
            bytes,
            width,
            height: width,
            padding,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adaptive(hq_enabled: bool) -> AdaptiveShading {
        let config = EngineConfig::default().with_hq_enabled(hq_enabled);
        AdaptiveShading::new(&config)
    }

    #[test]
    fn test_factor_divisor_at_double_density() {
        // scale = 3600 / 1800 = 2.0 → stride 2.
        assert_eq!(adaptive(true).quality_factor(3600, 1800.0), -2);
    }

    #[test]
    fn test_factor_supersample_when_zoomed_in() {
        // scale = 0.5 ≤ 1/1.25 with HQ on.
        assert_eq!(adaptive(true).quality_factor(3600, 7200.0), 2);
    }

    #[test]
    fn test_factor_identity_at_native_density() {
        assert_eq!(adaptive(true).quality_factor(3600, 3600.0), 1);
    }

    #[test]
    fn test_factor_identity_when_hq_disabled() {
        assert_eq!(adaptive(false).quality_factor(3600, 7200.0), 1);
    }

    #[test]
    fn test_factor_divides_axis_evenly() {
        let shading = adaptive(true);
        for px_per_lat in [10.0, 57.0, 100.0, 333.0, 1000.0, 1700.0] {
            let factor = shading.quality_factor(3600, px_per_lat);
            assert!(factor != 0);
            if factor < 0 {
                assert_eq!(
                    3600 % (-factor) as usize,
                    0,
                    "stride {factor} at px {px_per_lat} must divide the axis"
                );
            }
        }
    }

    #[test]
    fn test_factor_descends_to_even_divisor() {
        // L = 1000, px = 7: effective px 7, scale ≈ 142.9, target stride
        // 142; 1000 is not divisible by 142, the descent lands on 125.
        assert_eq!(adaptive(true).quality_factor(1000, 7.0), -125);
    }

    #[test]
    fn test_effective_px_floor_bounds_stride() {
        // px = 0.01 floors at 4 effective px → stride 900 for a 1" tile.
        let factor = adaptive(true).quality_factor(3600, 0.01);
        assert_eq!(factor, -900);
    }

    #[test]
    fn test_factor_is_memoised() {
        let shading = adaptive(true);
        assert_eq!(shading.quality_factor(3600, 100.0), shading.quality_factor(3600, 100.0));
        assert_eq!(shading.factor_cache.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_scale_by_sign_convention() {
        assert_eq!(AdaptiveShading::scale_by(3600, 2), 7200);
        assert_eq!(AdaptiveShading::scale_by(3600, 1), 3600);
        assert_eq!(AdaptiveShading::scale_by(3600, -30), 120);
    }
}
