//! Mutable configuration frontend over [`HgtCache`].
//!
//! The underlying cache is immutable; changing the DEM folder or the
//! algorithm atomically swaps in a freshly built cache (index and all)
//! instead of mutating the current one in place.

use super::HgtCache;
use crate::bitmap::{BitmapFactory, ShadeBitmap};
use crate::config::EngineConfig;
use crate::coord::TileKey;
use crate::dem::DemFolder;
use crate::shading::ShadingAlgorithm;
use std::sync::{Arc, Mutex};

struct SourceState {
    folder: Option<Arc<dyn DemFolder>>,
    algorithm: Option<Arc<dyn ShadingAlgorithm>>,
    current: Option<Arc<HgtCache>>,
}

/// Memory-caching tile source with rebuild-on-change semantics.
pub struct MemoryCachingTileSource {
    factory: Arc<dyn BitmapFactory>,
    padding: usize,
    cache_min_count: usize,
    cache_max_count: usize,
    cache_max_bytes: u64,
    state: Mutex<SourceState>,
}

impl MemoryCachingTileSource {
    pub fn new(
        config: &EngineConfig,
        folder: Arc<dyn DemFolder>,
        algorithm: Arc<dyn ShadingAlgorithm>,
        factory: Arc<dyn BitmapFactory>,
    ) -> Self {
        Self {
            factory,
            padding: config.padding(),
            cache_min_count: config.cache_min_count,
            cache_max_count: config.cache_max_count,
            cache_max_bytes: config.cache_max_bytes(),
            state: Mutex::new(SourceState {
                folder: Some(folder),
                algorithm: Some(algorithm),
                current: None,
            }),
        }
    }

    /// Swap the DEM folder; takes effect on the next request.
    pub fn set_dem_folder(&self, folder: Arc<dyn DemFolder>) {
        self.state.lock().unwrap().folder = Some(folder);
    }

    /// Swap the algorithm; takes effect on the next request.
    pub fn set_algorithm(&self, algorithm: Arc<dyn ShadingAlgorithm>) {
        self.state.lock().unwrap().algorithm = Some(algorithm);
    }

    /// Apply pending configuration. When a new cache was built and
    /// `allow_background` is set, indexing starts on a dedicated thread
    /// rather than on the first request.
    pub fn apply_configuration(&self, allow_background: bool) {
        let before = self.current_cache();
        let latest = self.latest_cache();
        if allow_background {
            if let Some(latest) = latest {
                let is_new = before
                    .map(|before| !Arc::ptr_eq(&before, &latest))
                    .unwrap_or(true);
                if is_new {
                    latest.index_on_thread();
                }
            }
        }
    }

    /// The current cache without rebuilding.
    pub fn current_cache(&self) -> Option<Arc<HgtCache>> {
        self.state.lock().unwrap().current.clone()
    }

    /// The cache matching the present configuration, rebuilding when the
    /// folder or algorithm changed.
    pub fn latest_cache(&self) -> Option<Arc<HgtCache>> {
        let mut state = self.state.lock().unwrap();

        let (Some(folder), Some(algorithm)) = (state.folder.clone(), state.algorithm.clone())
        else {
            state.current = None;
            return None;
        };

        let needs_rebuild = match &state.current {
            None => true,
            Some(cache) => {
                cache.folder().identity() != folder.identity()
                    || !Arc::ptr_eq(cache.algorithm(), &algorithm)
            }
        };

        if needs_rebuild {
            tracing::info!(folder = %folder.identity(), "building new shade tile cache");
            state.current = Some(Arc::new(HgtCache::new(
                folder,
                algorithm,
                Arc::clone(&self.factory),
                self.padding,
                self.cache_min_count,
                self.cache_max_count,
                self.cache_max_bytes,
            )));
        }

        state.current.clone()
    }

    /// Render or fetch one shade tile through the current cache.
    pub fn shading_tile(
        &self,
        key: TileKey,
        zoom: i32,
        px_per_lat: f64,
        px_per_lon: f64,
    ) -> Option<Arc<ShadeBitmap>> {
        self.latest_cache()?
            .shading_tile(key, zoom, px_per_lat, px_per_lon)
    }
}
