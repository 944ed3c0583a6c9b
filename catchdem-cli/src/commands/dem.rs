use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;

use catchdem::acquire::{self, DemConfig, Downloader, Plan};
use catchdem::{gpkg, index, mosaic, BoundingBox};

pub fn run(catchments: PathBuf, dem_dir: PathBuf, index_url: String, timeout: u64) -> Result<()> {
    let polygons = gpkg::read_catchment_geometries(&catchments)
        .with_context(|| format!("failed to read catchments from {}", catchments.display()))?;
    let bbox = BoundingBox::of_all(&polygons).context("catchment set has no geometries")?;

    let grid = match acquire::plan(&bbox, &dem_dir)? {
        Plan::Covered => {
            println!("DEM already exists and covers the input catchments.");
            return Ok(());
        }
        Plan::Fetch(grid) => grid,
    };

    fs::create_dir_all(&dem_dir)
        .with_context(|| format!("failed to create {}", dem_dir.display()))?;

    let downloader = Downloader::new(DemConfig {
        index_url,
        timeout_secs: timeout,
    })?;
    let tiles = downloader
        .fetch_index()
        .context("failed to fetch the DEM tile index")?;
    let selected = index::select_tiles(&tiles, grid);

    let pb = ProgressBar::new(selected.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );
    for tile in &selected {
        downloader
            .fetch_tile(tile, &dem_dir)
            .with_context(|| format!("failed to download {}", tile.url))?;
        pb.inc(1);
    }
    pb.finish_and_clear();
    println!(
        "Downloaded {} DEM tiles covering the input catchments.",
        selected.len()
    );

    let merged = mosaic::merge_tiles(&dem_dir).context("failed to merge DEM tiles")?;
    println!("Merged DEM written to {}", merged.display());

    Ok(())
}
