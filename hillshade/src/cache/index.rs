//! DEM catalog indexing.
//!
//! Walks a DEM folder recursively and maps every parseable tile file to
//! its [`TileKey`]. Indexing is forgiving: a file that fails validation
//! is recorded as a problem and skipped, never aborting the walk.

use crate::coord::TileKey;
use crate::dem::{DemFile, DemFolder};
use crate::cache::HgtFileInfo;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Case-insensitive tile-file pattern: hemisphere letters carry the
/// sign, the numeric groups the absolute degrees.
const FILE_NAME_PATTERN: &str = r"(?i)^.*([ns])(\d{1,2})([ew])(\d{1,3})\.(hgt|zip)$";

fn file_name_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(FILE_NAME_PATTERN).expect("tile file pattern is valid"))
}

/// Result of indexing one DEM folder tree.
#[derive(Clone, Default)]
pub struct DemIndex {
    pub tiles: HashMap<TileKey, Arc<HgtFileInfo>>,
    pub problems: Vec<String>,
}

/// Index a folder tree into `TileKey → HgtFileInfo`.
pub fn build_index(folder: &dyn DemFolder) -> DemIndex {
    let mut index = DemIndex::default();
    index_folder(folder, &mut index);
    tracing::info!(
        tiles = index.tiles.len(),
        problems = index.problems.len(),
        "DEM index built"
    );
    index
}

fn index_folder(folder: &dyn DemFolder, index: &mut DemIndex) {
    for file in folder.files() {
        index_file(file, index);
    }
    for sub in folder.folders() {
        index_folder(sub.as_ref(), index);
    }
}

fn index_file(file: Arc<dyn DemFile>, index: &mut DemIndex) {
    let Some(key) = parse_tile_key(file.name()) else {
        return;
    };

    let size_bytes = file.size_bytes();
    let samples = size_bytes / 2;
    let side = (samples as f64).sqrt() as u64;
    if samples == 0 || side * side != samples {
        index.problems.push(format!(
            "{} length in shorts ({samples}) is not a square number",
            file.name()
        ));
        return;
    }

    // On duplicate keys the larger (higher resolution) file wins.
    match index.tiles.get(&key) {
        Some(existing) if existing.size_bytes() >= size_bytes => {}
        _ => {
            index
                .tiles
                .insert(key, Arc::new(HgtFileInfo::new(file, key, size_bytes)));
        }
    }
}

/// Parse `(north, east)` out of a tile file name, or `None` when the
/// name does not follow the tile pattern.
pub fn parse_tile_key(name: &str) -> Option<TileKey> {
    let captures = file_name_regex().captures(name)?;

    let north_abs: i32 = captures[2].parse().ok()?;
    let east_abs: i32 = captures[4].parse().ok()?;

    let north = if captures[1].eq_ignore_ascii_case("n") {
        north_abs
    } else {
        -north_abs
    };
    let east = if captures[3].eq_ignore_ascii_case("e") {
        east_abs
    } else {
        -east_abs
    };

    Some(TileKey::new(north, east))
}
