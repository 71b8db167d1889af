//! High-level engine facade.

use crate::bitmap::{MonoBitmapFactory, ShadeBitmap};
use crate::cache::{DemIndex, MemoryCachingTileSource};
use crate::config::EngineConfig;
use crate::coord::TileKey;
use crate::dem::FsDemFolder;
use crate::shading::AdaptiveShading;
use std::path::PathBuf;
use std::sync::Arc;

/// Longitudes beyond this magnitude get the antimeridian retry; there is
/// not much height data out there, so the exact border does not matter.
const ANTIMERIDIAN_LON: i32 = 178;

/// Stable facade over the caching tile source.
///
/// Owns the adaptive algorithm and the default bitmap factory, and
/// papers over boundary-tile absences near the antimeridian by retrying
/// with the longitude wrapped by ±180.
pub struct HillshadeService {
    source: MemoryCachingTileSource,
    algorithm: Arc<AdaptiveShading>,
}

impl HillshadeService {
    /// Engine over the DEM catalog rooted at `dem_dir`.
    pub fn new(config: EngineConfig, dem_dir: impl Into<PathBuf>) -> Self {
        let algorithm = Arc::new(AdaptiveShading::new(&config));
        let source = MemoryCachingTileSource::new(
            &config,
            Arc::new(FsDemFolder::new(dem_dir)),
            Arc::clone(&algorithm) as Arc<dyn crate::shading::ShadingAlgorithm>,
            Arc::new(MonoBitmapFactory),
        );
        Self { source, algorithm }
    }

    /// Render or fetch the shade tile for the 1°×1° cell whose southwest
    /// corner is `(latitude, longitude)`.
    pub fn shading_tile(
        &self,
        latitude: i32,
        longitude: i32,
        zoom: i32,
        px_per_lat: f64,
        px_per_lon: f64,
    ) -> Option<Arc<ShadeBitmap>> {
        let tile = self
            .source
            .shading_tile(TileKey::new(latitude, longitude), zoom, px_per_lat, px_per_lon);

        if tile.is_none() && longitude.abs() > ANTIMERIDIAN_LON {
            let wrapped = if longitude > 0 {
                longitude - 180
            } else {
                longitude + 180
            };
            return self
                .source
                .shading_tile(TileKey::new(latitude, wrapped), zoom, px_per_lat, px_per_lon);
        }

        tile
    }

    /// Apply pending configuration; optionally index in the background.
    pub fn apply_configuration(&self, allow_background: bool) {
        self.source.apply_configuration(allow_background);
    }

    /// Start indexing on a dedicated thread, e.g. during setup.
    pub fn index_on_thread(&self) {
        if let Some(cache) = self.source.latest_cache() {
            cache.index_on_thread();
        }
    }

    /// The DEM index of the current cache, building it if needed.
    pub fn index(&self) -> Option<DemIndex> {
        self.source.latest_cache().map(|cache| cache.index())
    }

    /// Ask in-flight renders to wind down; rendered output is partial
    /// and discarded by callers.
    pub fn stop_signal(&self) {
        self.algorithm.stop_signal();
    }

    /// Allow new renders after a stop.
    pub fn continue_signal(&self) {
        self.algorithm.continue_signal();
    }

    pub fn source(&self) -> &MemoryCachingTileSource {
        &self.source
    }
}
