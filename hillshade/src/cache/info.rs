//! Per-tile metadata and the per-zoom future table.

use super::future::RenderFuture;
use crate::bitmap::BitmapFactory;
use crate::coord::{BoundingBox, TileKey};
use crate::dem::DemFile;
use crate::shading::ShadingAlgorithm;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, Weak};

/// One indexed DEM tile: its source file, bounding box, and the current
/// load future per zoom level.
///
/// Futures are held weakly: the LRU owns completed renders, and this
/// table is only a coalescing point. Once the LRU lets go, the weak slot
/// comes up empty and the next request creates a fresh future. At most
/// one live future exists per `(tile, zoom)`; a cache-tag mismatch
/// replaces it.
pub struct HgtFileInfo {
    file: Arc<dyn DemFile>,
    key: TileKey,
    bounds: BoundingBox,
    size_bytes: u64,
    futures: Mutex<HashMap<i32, Weak<RenderFuture>>>,
}

impl HgtFileInfo {
    pub fn new(file: Arc<dyn DemFile>, key: TileKey, size_bytes: u64) -> Self {
        Self {
            file,
            key,
            bounds: BoundingBox::for_tile(key),
            size_bytes,
            futures: Mutex::new(HashMap::new()),
        }
    }

    pub fn file(&self) -> &dyn DemFile {
        self.file.as_ref()
    }

    pub fn key(&self) -> TileKey {
        self.key
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Stable fingerprint of this tile's identity, folded into cache
    /// tags.
    pub fn identity_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.file.name().hash(&mut hasher);
        self.key.hash(&mut hasher);
        self.size_bytes.hash(&mut hasher);
        hasher.finish()
    }

    /// The current load future for `zoom`, creating and registering a
    /// new one when the slot is empty, reclaimed, or carries a stale
    /// cache tag.
    ///
    /// Two overlapping requests with matching tags always receive the
    /// same future; the whole lookup runs under the table's lock.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn bitmap_future(
        self: &Arc<Self>,
        algorithm: &Arc<dyn ShadingAlgorithm>,
        factory: &Arc<dyn BitmapFactory>,
        padding: usize,
        zoom: i32,
        px_per_lat: f64,
        px_per_lon: f64,
    ) -> Arc<RenderFuture> {
        let mut futures = self.futures.lock().unwrap();

        let tag = algorithm.cache_tag(self, padding, zoom, px_per_lat, px_per_lon);
        if let Some(existing) = futures.get(&zoom).and_then(Weak::upgrade) {
            if existing.cache_tag() == tag {
                return existing;
            }
        }

        let fresh = Arc::new(RenderFuture::new(
            Arc::clone(self),
            Arc::clone(algorithm),
            Arc::clone(factory),
            padding,
            zoom,
            px_per_lat,
            px_per_lon,
        ));
        futures.insert(zoom, Arc::downgrade(&fresh));
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::MonoBitmapFactory;
    use crate::error::Result;
    use crate::shading::RawShadingResult;
    use std::io;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct FakeFile;

    impl DemFile for FakeFile {
        fn name(&self) -> &str {
            "N10E020.hgt"
        }

        fn size_bytes(&self) -> u64 {
            50
        }

        fn open_stream(&self) -> io::Result<Box<dyn crate::dem::DemStream>> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "metadata only"))
        }
    }

    /// Fixed-size algorithm whose cache tag is externally adjustable.
    struct TaggedAlgorithm {
        bin: AtomicI64,
    }

    impl ShadingAlgorithm for TaggedAlgorithm {
        fn output_axis_len(&self, _: &HgtFileInfo, _: i32, _: f64, _: f64) -> usize {
            4
        }

        fn cache_tag_bin(&self, _: &HgtFileInfo, _: i32, _: f64, _: f64) -> i64 {
            self.bin.load(Ordering::SeqCst)
        }

        fn raster(
            &self,
            _: &HgtFileInfo,
            padding: usize,
            _: i32,
            _: f64,
            _: f64,
        ) -> Result<RawShadingResult> {
            let width = 4 + 2 * padding;
            Ok(RawShadingResult {
                bytes: vec![0; width * width],
                width,
                height: width,
                padding,
            })
        }
    }

    fn fixture() -> (
        Arc<HgtFileInfo>,
        Arc<dyn ShadingAlgorithm>,
        Arc<dyn BitmapFactory>,
    ) {
        let info = Arc::new(HgtFileInfo::new(
            Arc::new(FakeFile),
            TileKey::new(10, 20),
            50,
        ));
        let algorithm: Arc<dyn ShadingAlgorithm> = Arc::new(TaggedAlgorithm {
            bin: AtomicI64::new(1),
        });
        let factory: Arc<dyn BitmapFactory> = Arc::new(MonoBitmapFactory);
        (info, algorithm, factory)
    }

    #[test]
    fn test_same_parameters_coalesce_to_one_future() {
        let (info, algorithm, factory) = fixture();
        let first = info.bitmap_future(&algorithm, &factory, 1, 12, 256.0, 256.0);
        let second = info.bitmap_future(&algorithm, &factory, 1, 12, 256.0, 256.0);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_zoom_levels_get_distinct_futures() {
        let (info, algorithm, factory) = fixture();
        let at_12 = info.bitmap_future(&algorithm, &factory, 1, 12, 256.0, 256.0);
        let at_13 = info.bitmap_future(&algorithm, &factory, 1, 13, 512.0, 512.0);
        assert!(!Arc::ptr_eq(&at_12, &at_13));
    }

    #[test]
    fn test_stale_tag_replaces_future() {
        let (info, algorithm, factory) = fixture();
        let first = info.bitmap_future(&algorithm, &factory, 1, 12, 256.0, 256.0);

        // Display parameters shifted enough to change the quality bin.
        let tagged = Arc::new(TaggedAlgorithm {
            bin: AtomicI64::new(2),
        });
        let retagged: Arc<dyn ShadingAlgorithm> = tagged;
        let second = info.bitmap_future(&retagged, &factory, 1, 12, 256.0, 256.0);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_reclaimed_future_is_recreated() {
        let (info, algorithm, factory) = fixture();
        let tag = {
            let future = info.bitmap_future(&algorithm, &factory, 1, 12, 256.0, 256.0);
            future.cache_tag()
            // Only the weak slot remains after this scope.
        };
        let fresh = info.bitmap_future(&algorithm, &factory, 1, 12, 256.0, 256.0);
        assert_eq!(fresh.cache_tag(), tag);
        assert!(!fresh.is_done());
    }

    #[test]
    fn test_identity_hash_is_stable() {
        let (info, _, _) = fixture();
        assert_eq!(info.identity_hash(), info.identity_hash());
    }
}
