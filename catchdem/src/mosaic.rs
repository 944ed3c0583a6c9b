//! Mosaicking per-tile rasters into one merged DEM.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::raster::{self, Raster, NODATA};

/// File name of the merged raster inside the DEM directory.
pub const MERGED_FILE: &str = "dem_merged.tif";

/// The per-tile rasters in a DEM directory: every `.tif` except the merged
/// output, in sorted order.
pub fn tile_paths(dem_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dem_dir)? {
        let path = entry?.path();
        let is_tif = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("tif"))
            .unwrap_or(false);
        let is_merged = path.file_name().and_then(|name| name.to_str()) == Some(MERGED_FILE);
        if is_tif && !is_merged {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Merge every tile raster in `dem_dir` into `dem_merged.tif`.
///
/// A no-op if the merged raster already exists. Overlapping cells keep the
/// first tile's value; tiles are deleted after a successful write. An
/// empty tile directory is an error, never an empty raster.
pub fn merge_tiles(dem_dir: &Path) -> Result<PathBuf> {
    let merged_path = dem_dir.join(MERGED_FILE);
    if merged_path.exists() {
        log::info!("{} already exists, skipping merge", merged_path.display());
        return Ok(merged_path);
    }

    let paths = tile_paths(dem_dir)?;
    let mut tiles = Vec::with_capacity(paths.len());
    for path in &paths {
        tiles.push(raster::read(path)?);
    }

    let merged = merge(&tiles).ok_or_else(|| Error::NoTiles {
        dir: dem_dir.to_path_buf(),
    })?;
    raster::write(&merged_path, &merged)?;

    for path in &paths {
        fs::remove_file(path)?;
    }
    log::info!(
        "merged {} tiles into {}",
        paths.len(),
        merged_path.display()
    );
    Ok(merged_path)
}

/// First-tile-wins mosaic on the grid of the first tile's resolution.
///
/// Tiles are placed by rounding their offset to the nearest output pixel;
/// there is no resampling and no contiguity check. Returns `None` for an
/// empty tile list.
pub fn merge(tiles: &[Raster]) -> Option<Raster> {
    let first = tiles.first()?;
    let (scale_x, scale_y) = first.resolution();
    let bounds = tiles
        .iter()
        .map(|tile| tile.bounds)
        .reduce(|a, b| a.union(&b))?;

    let width = ((bounds.max_lon - bounds.min_lon) / scale_x).round() as u32;
    let height = ((bounds.max_lat - bounds.min_lat) / scale_y).round() as u32;
    let mut data = vec![NODATA; width as usize * height as usize];

    for tile in tiles {
        let col0 = ((tile.bounds.min_lon - bounds.min_lon) / scale_x).round() as i64;
        let row0 = ((bounds.max_lat - tile.bounds.max_lat) / scale_y).round() as i64;
        for row in 0..tile.height as i64 {
            let out_row = row0 + row;
            if out_row < 0 || out_row >= height as i64 {
                continue;
            }
            for col in 0..tile.width as i64 {
                let out_col = col0 + col;
                if out_col < 0 || out_col >= width as i64 {
                    continue;
                }
                let dst = (out_row * width as i64 + out_col) as usize;
                if data[dst] == NODATA {
                    data[dst] = tile.data[(row * tile.width as i64 + col) as usize];
                }
            }
        }
    }

    Some(Raster {
        data,
        width,
        height,
        bounds,
    })
}
