//! `hillshade index` - inspect a DEM catalog.

use crate::error::CliError;
use hillshade::config::EngineConfig;
use hillshade::service::HillshadeService;
use std::path::PathBuf;

/// Index the DEM folder and print what the engine would serve.
pub fn run(dem_dir: PathBuf) -> Result<(), CliError> {
    if !dem_dir.is_dir() {
        return Err(CliError::Config(format!(
            "{} is not a directory",
            dem_dir.display()
        )));
    }

    let service = HillshadeService::new(EngineConfig::default(), &dem_dir);
    let index = service
        .index()
        .ok_or_else(|| CliError::Config("no DEM catalog configured".to_string()))?;

    println!("DEM catalog: {}", dem_dir.display());
    println!("  Tiles: {}", index.tiles.len());

    let mut keys: Vec<_> = index.tiles.keys().copied().collect();
    keys.sort_by_key(|key| (key.north, key.east));
    for key in keys {
        let info = &index.tiles[&key];
        let samples = info.size_bytes() / 2;
        let side = (samples as f64).sqrt() as u64;
        println!(
            "  {:>10}  {}  {}x{} samples",
            key.to_string(),
            info.file().name(),
            side,
            side
        );
    }

    if !index.problems.is_empty() {
        println!("  Problems: {}", index.problems.len());
        for problem in &index.problems {
            println!("    {problem}");
        }
    }

    Ok(())
}
