//! Tile cache and request orchestration.
//!
//! [`HgtCache`] is the immutably configured engine core: it owns the
//! lazily built DEM index, the completed-render LRU, and the admission
//! limiter, and routes every tile request through them. The mutable
//! configuration frontend that rebuilds caches on change lives in
//! [`MemoryCachingTileSource`].

mod future;
mod index;
mod info;
mod limiter;
mod lru;
mod source;

pub use future::{LazyFuture, RenderFuture};
pub use index::{build_index, parse_tile_key, DemIndex};
pub use info::HgtFileInfo;
pub use limiter::BlockingSumLimiter;
pub use lru::Lru;
pub use source::MemoryCachingTileSource;

use crate::bitmap::{BitmapFactory, ShadeBitmap};
use crate::coord::TileKey;
use crate::dem::DemFolder;
use crate::shading::ShadingAlgorithm;
use std::sync::Arc;

/// Immutably configured cache over one DEM folder and one algorithm.
pub struct HgtCache {
    folder: Arc<dyn DemFolder>,
    algorithm: Arc<dyn ShadingAlgorithm>,
    factory: Arc<dyn BitmapFactory>,
    padding: usize,
    lru: Lru,
    limiter: BlockingSumLimiter,
    index: Arc<LazyFuture<DemIndex>>,
}

impl HgtCache {
    pub fn new(
        folder: Arc<dyn DemFolder>,
        algorithm: Arc<dyn ShadingAlgorithm>,
        factory: Arc<dyn BitmapFactory>,
        padding: usize,
        cache_min_count: usize,
        cache_max_count: usize,
        cache_max_bytes: u64,
    ) -> Self {
        let index_folder = Arc::clone(&folder);
        Self {
            folder,
            algorithm,
            factory,
            padding,
            lru: Lru::new(cache_min_count, cache_max_count, cache_max_bytes),
            limiter: BlockingSumLimiter::new(),
            index: Arc::new(LazyFuture::new(move || build_index(index_folder.as_ref()))),
        }
    }

    pub fn folder(&self) -> &Arc<dyn DemFolder> {
        &self.folder
    }

    pub fn algorithm(&self) -> &Arc<dyn ShadingAlgorithm> {
        &self.algorithm
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    /// The DEM index, building it on first use.
    pub fn index(&self) -> DemIndex {
        self.index.get()
    }

    /// Kick off indexing on a dedicated thread.
    pub fn index_on_thread(&self) {
        self.index.start_on_background("hillshade-index");
    }

    /// Render or fetch the shade tile identified by `key`.
    ///
    /// Returns `None` when the tile is not in the catalog or its render
    /// produced nothing. Concurrent requests for the same tile, zoom and
    /// display parameters coalesce onto one render.
    pub fn shading_tile(
        &self,
        key: TileKey,
        zoom: i32,
        px_per_lat: f64,
        px_per_lon: f64,
    ) -> Option<Arc<ShadeBitmap>> {
        let info = Arc::clone(self.index.get().tiles.get(&key)?);

        let estimate =
            self.algorithm
                .output_size_bytes(&info, self.padding, zoom, px_per_lat, px_per_lon);

        // Admission bounds aggregate in-flight output bytes across
        // concurrent requests, ahead of any allocation.
        self.limiter.add(estimate, self.lru.max_bytes());
        let _admission = AdmissionGuard {
            limiter: &self.limiter,
            amount: estimate,
        };

        let future = info.bitmap_future(
            &self.algorithm,
            &self.factory,
            self.padding,
            zoom,
            px_per_lat,
            px_per_lon,
        );

        if !future.is_done() {
            // Evict before the new bytes materialise.
            self.lru.ensure_enough_space(estimate);
        }

        // The await must precede mark_used so the future's size is
        // final when the LRU accounts it.
        let bitmap = future.get();
        self.lru.mark_used(&future);

        bitmap
    }

    pub fn lru(&self) -> &Lru {
        &self.lru
    }

    pub fn limiter(&self) -> &BlockingSumLimiter {
        &self.limiter
    }
}

/// Releases admitted bytes on every exit path.
struct AdmissionGuard<'a> {
    limiter: &'a BlockingSumLimiter,
    amount: u64,
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        self.limiter.subtract(self.amount);
    }
}
