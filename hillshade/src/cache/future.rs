//! One-shot memoised computations.

use crate::bitmap::{BitmapFactory, ShadeBitmap};
use crate::cache::HgtFileInfo;
use crate::shading::ShadingAlgorithm;
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;

/// A thread-safe, one-shot memoised computation.
///
/// The first caller of [`LazyFuture::get`] runs the computation under the
/// future's lock; concurrent callers block on that lock and return the
/// memoised value once it is released. This is what guarantees a single
/// computation no matter how many requesters coalesce onto one future.
pub struct LazyFuture<T> {
    compute: Mutex<Option<Box<dyn FnOnce() -> T + Send>>>,
    value: OnceLock<T>,
}

impl<T: Clone + Send + Sync + 'static> LazyFuture<T> {
    pub fn new(compute: impl FnOnce() -> T + Send + 'static) -> Self {
        Self {
            compute: Mutex::new(Some(Box::new(compute))),
            value: OnceLock::new(),
        }
    }

    /// Drive the computation if needed and return the memoised value.
    pub fn get(&self) -> T {
        if let Some(value) = self.value.get() {
            return value.clone();
        }
        let mut compute = self.compute.lock().unwrap();
        if let Some(compute) = compute.take() {
            let value = compute();
            let _ = self.value.set(value);
        }
        drop(compute);
        self.value
            .get()
            .cloned()
            .expect("lazy future computed without storing a value")
    }

    /// Whether the computation has completed.
    pub fn is_done(&self) -> bool {
        self.value.get().is_some()
    }

    /// The memoised value, without driving the computation.
    pub fn peek(&self) -> Option<T> {
        self.value.get().cloned()
    }

    /// Drive the computation on a background thread, discarding the
    /// value; a later [`LazyFuture::get`] returns it memoised.
    pub fn start_on_background(self: &Arc<Self>, thread_name: &str) {
        if self.is_done() {
            return;
        }
        let this = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || {
                let _ = this.get();
            });
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "cannot spawn background computation");
        }
    }
}

/// Parameters identifying one render.
struct RenderRequest {
    info: Arc<HgtFileInfo>,
    algorithm: Arc<dyn ShadingAlgorithm>,
    factory: Arc<dyn BitmapFactory>,
    padding: usize,
    zoom: i32,
    px_per_lat: f64,
    px_per_lon: f64,
}

/// The load future for one `(tile, zoom)` slot: a memoised render plus
/// the cache tag it was created under.
///
/// Completes with `None` when the render fails or the factory declines
/// the raw result; callers treat that as an absent tile.
pub struct RenderFuture {
    future: LazyFuture<Option<Arc<ShadeBitmap>>>,
    cache_tag: u64,
}

impl RenderFuture {
    pub(crate) fn new(
        info: Arc<HgtFileInfo>,
        algorithm: Arc<dyn ShadingAlgorithm>,
        factory: Arc<dyn BitmapFactory>,
        padding: usize,
        zoom: i32,
        px_per_lat: f64,
        px_per_lon: f64,
    ) -> Self {
        let cache_tag = algorithm.cache_tag(&info, padding, zoom, px_per_lat, px_per_lon);
        let request = RenderRequest {
            info,
            algorithm,
            factory,
            padding,
            zoom,
            px_per_lat,
            px_per_lon,
        };
        Self {
            future: LazyFuture::new(move || compute_bitmap(request)),
            cache_tag,
        }
    }

    /// Already-completed future around `bitmap`, bypassing the render
    /// path; for cache tests.
    #[cfg(test)]
    pub(crate) fn completed_for_tests(bitmap: Option<Arc<ShadeBitmap>>) -> Self {
        let future = Self {
            future: LazyFuture::new(move || bitmap),
            cache_tag: 0,
        };
        future.get();
        future
    }

    /// Await the bitmap; the first awaiter drives the render.
    pub fn get(&self) -> Option<Arc<ShadeBitmap>> {
        self.future.get()
    }

    pub fn is_done(&self) -> bool {
        self.future.is_done()
    }

    pub fn cache_tag(&self) -> u64 {
        self.cache_tag
    }

    /// In-memory footprint of the completed bitmap; zero while pending
    /// or when the render produced nothing. Callers account sizes only
    /// after awaiting, so the completed-path value is the one that
    /// matters.
    pub fn size_bytes(&self) -> u64 {
        self.future
            .peek()
            .flatten()
            .map(|bitmap| bitmap.size_bytes())
            .unwrap_or(0)
    }
}

fn compute_bitmap(request: RenderRequest) -> Option<Arc<ShadeBitmap>> {
    let raw = request.algorithm.raster(
        &request.info,
        request.padding,
        request.zoom,
        request.px_per_lat,
        request.px_per_lon,
    );
    match raw {
        Ok(raw) => request.factory.create_mono_bitmap(raw),
        Err(e) => {
            tracing::error!(
                file = request.info.file().name(),
                error = %e,
                "shade tile computation failed"
            );
            None
        }
    }
}
