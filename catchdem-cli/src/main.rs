use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

/// Catchment DEM preparation pipeline
#[derive(Parser)]
#[command(name = "catchdem")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export station and catchment geometries to GeoPackage
    Export {
        /// Station metadata CSV (camels_id, gauge_elevation, lon, lat)
        #[arg(short, long, env = "CATCHDEM_METADATA")]
        metadata: PathBuf,

        /// Root directory of per-station catchment GeoJSON files
        #[arg(short, long, env = "CATCHDEM_CATCHMENT_DIR")]
        catchment_dir: PathBuf,

        /// Catchment source dataset to export
        #[arg(short, long, default_value = "merit_hydro")]
        source: String,

        /// Directory for stations.gpkg and catchments.gpkg
        #[arg(short, long, default_value = "output_data")]
        out_dir: PathBuf,
    },

    /// Download and merge the DEM tiles covering a catchment set
    Dem {
        /// Catchment polygons GeoPackage (EPSG:4326)
        catchments: PathBuf,

        /// Working directory for DEM tiles and the merged raster
        #[arg(short, long, default_value = "dem")]
        dem_dir: PathBuf,

        /// Tile index URL
        #[arg(long, default_value = catchdem::index::DEFAULT_INDEX_URL)]
        index_url: String,

        /// Request timeout in seconds
        #[arg(long, default_value = "300")]
        timeout: u64,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            metadata,
            catchment_dir,
            source,
            out_dir,
        } => commands::export::run(metadata, catchment_dir, source, out_dir),
        Commands::Dem {
            catchments,
            dem_dir,
            index_url,
            timeout,
        } => commands::dem::run(catchments, dem_dir, index_url, timeout),
    }
}
