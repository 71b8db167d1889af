//! Engine configuration.

use crate::pipeline::{COMPUTE_THREADS_DEFAULT, READER_THREADS_DEFAULT};

/// Process-wide memory allowance the byte budget derives from, in MB.
pub const MAX_MEMORY_MB_DEFAULT: u64 = 128;

/// Bytes of shade cache granted per configured MB: one eighth of the
/// allowance goes to a single cache.
pub const CACHE_BYTES_PER_MB: u64 = 125_000;

/// Never evict below this many entries, so high-quality renders that
/// individually blow the byte budget cannot starve the cache.
pub const CACHE_MIN_COUNT_DEFAULT: usize = 2;

/// A typical DEM distribution bundles a few dozen tiles; 100 entries
/// comfortably covers a rendered viewport plus prefetch.
pub const CACHE_MAX_COUNT_DEFAULT: usize = 100;

/// Output padding when interpolation overlap is enabled. Bitmap
/// filtering uses at most bicubic interpolation, so one pixel suffices.
pub const PADDING_DEFAULT: usize = 1;

/// Tunables for a hillshade engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Memory allowance feeding the cache byte budget, in MB
    pub max_memory_mb: u64,
    /// Eviction floor of the render LRU
    pub cache_min_count: usize,
    /// Entry cap of the render LRU
    pub cache_max_count: usize,
    /// Additional reader threads per caller (0 = caller reads alone)
    pub reader_threads: usize,
    /// Additional compute threads per caller (0 = readers compute)
    pub compute_threads: usize,
    /// Pad output tiles by one pixel for seam-free interpolation
    pub interpolation_overlap: bool,
    /// Allow the high-quality super-sampled mode at high zoom
    pub hq_enabled: bool,
    /// Extra output-density scale in `(0, 1]`; lower trades quality for
    /// speed
    pub custom_quality_scale: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: MAX_MEMORY_MB_DEFAULT,
            cache_min_count: CACHE_MIN_COUNT_DEFAULT,
            cache_max_count: CACHE_MAX_COUNT_DEFAULT,
            reader_threads: READER_THREADS_DEFAULT,
            compute_threads: COMPUTE_THREADS_DEFAULT,
            interpolation_overlap: true,
            hq_enabled: true,
            custom_quality_scale: 1.0,
        }
    }
}

impl EngineConfig {
    pub fn with_max_memory_mb(mut self, max_memory_mb: u64) -> Self {
        self.max_memory_mb = max_memory_mb;
        self
    }

    pub fn with_cache_counts(mut self, min_count: usize, max_count: usize) -> Self {
        self.cache_min_count = min_count;
        self.cache_max_count = max_count;
        self
    }

    pub fn with_threads(mut self, reader_threads: usize, compute_threads: usize) -> Self {
        self.reader_threads = reader_threads;
        self.compute_threads = compute_threads;
        self
    }

    pub fn with_interpolation_overlap(mut self, interpolation_overlap: bool) -> Self {
        self.interpolation_overlap = interpolation_overlap;
        self
    }

    pub fn with_hq_enabled(mut self, hq_enabled: bool) -> Self {
        self.hq_enabled = hq_enabled;
        self
    }

    pub fn with_custom_quality_scale(mut self, custom_quality_scale: f64) -> Self {
        self.custom_quality_scale = custom_quality_scale;
        self
    }

    /// Byte budget of one cache.
    pub fn cache_max_bytes(&self) -> u64 {
        self.max_memory_mb * CACHE_BYTES_PER_MB
    }

    /// Output padding implied by the interpolation-overlap setting.
    pub fn padding(&self) -> usize {
        if self.interpolation_overlap {
            PADDING_DEFAULT
        } else {
            0
        }
    }
}
