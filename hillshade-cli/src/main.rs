//! Hillshade CLI - command-line interface
//!
//! This binary provides a command-line interface to the hillshade
//! library: inspect a DEM catalog and render individual shade tiles.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hillshade")]
#[command(version = hillshade::VERSION)]
#[command(about = "On-demand hillshading over HGT elevation catalogs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a DEM folder and list the tiles the engine would serve
    Index {
        /// DEM catalog directory (.hgt files, plain or zipped)
        dem_dir: PathBuf,
    },

    /// Render one shade tile to a grayscale PNG
    Render {
        /// DEM catalog directory (.hgt files, plain or zipped)
        dem_dir: PathBuf,

        /// Tile latitude (southwest corner, degrees)
        #[arg(long, allow_hyphen_values = true)]
        north: i32,

        /// Tile longitude (southwest corner, degrees)
        #[arg(long, allow_hyphen_values = true)]
        east: i32,

        /// Zoom level the tile is rendered for
        #[arg(long, default_value_t = 13)]
        zoom: i32,

        /// Display pixels per degree of latitude
        #[arg(long, default_value_t = 1024.0)]
        px_per_lat: f64,

        /// Display pixels per degree of longitude (default: same as latitude)
        #[arg(long)]
        px_per_lon: Option<f64>,

        /// Output PNG path
        #[arg(long, short, default_value = "shade.png")]
        output: PathBuf,

        /// Disable the high-quality super-sampled mode
        #[arg(long)]
        no_hq: bool,

        /// Extra output-density scale in (0, 1]
        #[arg(long, default_value_t = 1.0)]
        quality_scale: f64,

        /// Additional reader threads
        #[arg(long, default_value_t = 1)]
        reader_threads: usize,

        /// Additional compute threads
        #[arg(long, default_value_t = 1)]
        compute_threads: usize,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Index { dem_dir } => commands::index::run(dem_dir),
        Commands::Render {
            dem_dir,
            north,
            east,
            zoom,
            px_per_lat,
            px_per_lon,
            output,
            no_hq,
            quality_scale,
            reader_threads,
            compute_threads,
        } => commands::render::run(commands::render::RenderArgs {
            dem_dir,
            north,
            east,
            zoom,
            px_per_lat,
            px_per_lon,
            output,
            no_hq,
            quality_scale,
            reader_threads,
            compute_threads,
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
