//! Hillshade - on-demand hillshading tile engine
//!
//! Turns a catalog of on-disk DEM tiles (`.hgt` files, plain or inside
//! ZIP archives) into per-tile greyscale shade bitmaps under tight
//! memory and concurrency budgets: a content-addressed DEM index,
//! coalescing per-tile load futures, a dual-budget LRU with blocking
//! admission, and a parallel producer/consumer raster pipeline.
//!
//! # High-Level API
//!
//! ```ignore
//! use hillshade::config::EngineConfig;
//! use hillshade::service::HillshadeService;
//!
//! let service = HillshadeService::new(EngineConfig::default(), "/srv/dem");
//! service.apply_configuration(true); // index in the background
//!
//! if let Some(tile) = service.shading_tile(46, 7, 13, 1024.0, 724.0) {
//!     // width = height = output axis + 2·padding, greyscale bytes
//!     let pixels = tile.to_vec();
//! }
//! ```

pub mod bitmap;
pub mod cache;
pub mod config;
pub mod coord;
pub mod dem;
pub mod error;
pub mod pipeline;
pub mod service;
pub mod shading;

/// Version of the hillshade library and CLI.
///
/// Synchronized across all workspace members; defined in `Cargo.toml`
/// and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
