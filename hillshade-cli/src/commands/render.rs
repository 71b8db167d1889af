//! `hillshade render` - render one shade tile to a PNG.

use crate::error::CliError;
use hillshade::config::EngineConfig;
use hillshade::service::HillshadeService;
use std::path::PathBuf;

pub struct RenderArgs {
    pub dem_dir: PathBuf,
    pub north: i32,
    pub east: i32,
    pub zoom: i32,
    pub px_per_lat: f64,
    pub px_per_lon: Option<f64>,
    pub output: PathBuf,
    pub no_hq: bool,
    pub quality_scale: f64,
    pub reader_threads: usize,
    pub compute_threads: usize,
}

/// Render the requested tile and write it as a grayscale PNG.
pub fn run(args: RenderArgs) -> Result<(), CliError> {
    if !(0.0..=1.0).contains(&args.quality_scale) || args.quality_scale == 0.0 {
        return Err(CliError::Config(
            "--quality-scale must be in (0, 1]".to_string(),
        ));
    }

    let config = EngineConfig::default()
        .with_hq_enabled(!args.no_hq)
        .with_custom_quality_scale(args.quality_scale)
        .with_threads(args.reader_threads, args.compute_threads);

    let service = HillshadeService::new(config, &args.dem_dir);
    let px_per_lon = args.px_per_lon.unwrap_or(args.px_per_lat);

    let bitmap = service
        .shading_tile(args.north, args.east, args.zoom, args.px_per_lat, px_per_lon)
        .ok_or_else(|| {
            CliError::Render(format!(
                "no DEM tile for ({}, {}) under {}",
                args.north,
                args.east,
                args.dem_dir.display()
            ))
        })?;

    let width = bitmap.width() as u32;
    let height = bitmap.height() as u32;
    let image = image::GrayImage::from_raw(width, height, bitmap.to_vec())
        .ok_or_else(|| CliError::Render("bitmap dimensions inconsistent".to_string()))?;
    image
        .save(&args.output)
        .map_err(|e| CliError::Render(e.to_string()))?;

    println!(
        "Rendered ({}, {}) at zoom {} -> {} ({}x{}, padding {})",
        args.north,
        args.east,
        args.zoom,
        args.output.display(),
        width,
        height,
        bitmap.padding()
    );

    Ok(())
}
