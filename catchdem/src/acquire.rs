//! DEM acquisition: coverage check, tile download, archive extraction.
//!
//! The merged raster acts as a cache. When it already covers the requested
//! bounding box the whole stage is a no-op; when it does not, it is
//! deleted and the covering tiles are fetched from the remote index.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use geo::MultiPolygon;
use reqwest::blocking::Client;
use tar::Archive;

use crate::bbox::{BoundingBox, GridBounds};
use crate::error::{Error, Result};
use crate::index::{self, TileRef, DEFAULT_INDEX_URL};
use crate::mosaic::MERGED_FILE;
use crate::raster;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// What the acquisition stage has to do for a requested bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// The existing merged raster already covers the request; nothing to
    /// fetch.
    Covered,
    /// Tiles within these whole-degree bounds must be fetched.
    Fetch(GridBounds),
}

/// Decide whether tiles must be fetched for `bbox`.
///
/// An existing merged raster whose bounds fully contain the box makes the
/// stage a no-op. Otherwise the stale raster is deleted unconditionally;
/// there is no incremental extension.
pub fn plan(bbox: &BoundingBox, dem_dir: &Path) -> Result<Plan> {
    let merged = dem_dir.join(MERGED_FILE);
    if merged.exists() {
        let dem_bounds = raster::read_bounds(&merged)?;
        if dem_bounds.contains(bbox) {
            log::info!("merged DEM already covers the requested bounding box");
            return Ok(Plan::Covered);
        }
        fs::remove_file(&merged)?;
        log::info!("removed stale merged DEM not covering the requested bounding box");
    }
    Ok(Plan::Fetch(bbox.expand_to_grid()))
}

/// Configuration for the tile downloader.
#[derive(Debug, Clone)]
pub struct DemConfig {
    /// URL of the newline-delimited tile index.
    pub index_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for DemConfig {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Sequential, blocking DEM tile downloader.
///
/// No retries: a failed download aborts the run.
pub struct Downloader {
    client: Client,
    config: DemConfig,
}

impl Downloader {
    /// Create a downloader with the given configuration.
    pub fn new(config: DemConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Fetch and parse the remote tile index.
    pub fn fetch_index(&self) -> Result<Vec<TileRef>> {
        let text = index::fetch_index(&self.client, &self.config.index_url)?;
        Ok(index::parse_index(&text))
    }

    /// Download one tile archive and place its elevation raster flat in
    /// `dem_dir`.
    ///
    /// The tar archive is unpacked in memory; only the `*_DEM.tif` entry
    /// ever reaches disk.
    pub fn fetch_tile(&self, tile: &TileRef, dem_dir: &Path) -> Result<PathBuf> {
        let response = self.client.get(&tile.url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::TileDownload {
                url: tile.url.clone(),
                reason: format!("HTTP {status}"),
            });
        }
        let bytes = response.bytes()?;
        extract_dem_tif(&bytes, &tile.url, dem_dir)
    }

    /// Run the full acquisition for a set of catchment polygons.
    ///
    /// Returns the number of tiles downloaded: zero when the merged raster
    /// already covers the request (no network traffic at all) or when no
    /// tile intersects the bounding box.
    pub fn acquire(&self, catchments: &[MultiPolygon<f64>], dem_dir: &Path) -> Result<usize> {
        let bbox = BoundingBox::of_all(catchments)?;
        let grid = match plan(&bbox, dem_dir)? {
            Plan::Covered => return Ok(0),
            Plan::Fetch(grid) => grid,
        };

        fs::create_dir_all(dem_dir)?;
        let tiles = self.fetch_index()?;
        let selected = index::select_tiles(&tiles, grid);
        for tile in &selected {
            let path = self.fetch_tile(tile, dem_dir)?;
            log::info!("downloaded {}", path.display());
        }
        Ok(selected.len())
    }
}

/// Pull the single `*_DEM.tif` entry out of a tar archive and write it
/// into `dem_dir` under its own file name.
fn extract_dem_tif(data: &[u8], url: &str, dem_dir: &Path) -> Result<PathBuf> {
    let mut archive = Archive::new(data);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry
            .path()?
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string);
        if let Some(name) = name {
            if name.ends_with("_DEM.tif") {
                let dest = dem_dir.join(name);
                entry.unpack(&dest)?;
                return Ok(dest);
            }
        }
    }
    Err(Error::TileDownload {
        url: url.to_string(),
        reason: "no *_DEM.tif entry in archive".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Raster;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_merged(dem_dir: &Path, bounds: BoundingBox) {
        let raster = Raster {
            data: vec![0.0; 16],
            width: 4,
            height: 4,
            bounds,
        };
        raster::write(dem_dir.join(MERGED_FILE), &raster).unwrap();
    }

    #[test]
    fn test_plan_without_merged_raster() {
        let temp_dir = TempDir::new().unwrap();
        let bbox = BoundingBox::new(9.3, 47.8, 10.1, 48.2);

        let plan = plan(&bbox, temp_dir.path()).unwrap();
        assert_eq!(
            plan,
            Plan::Fetch(GridBounds {
                min_lon: 9,
                min_lat: 47,
                max_lon: 11,
                max_lat: 49,
            })
        );
    }

    #[test]
    fn test_plan_covered_skips() {
        let temp_dir = TempDir::new().unwrap();
        write_merged(temp_dir.path(), BoundingBox::new(8.0, 47.0, 12.0, 50.0));

        let bbox = BoundingBox::new(9.3, 47.8, 10.1, 48.2);
        let result = plan(&bbox, temp_dir.path()).unwrap();
        assert_eq!(result, Plan::Covered);
        // The covering raster stays in place
        assert!(temp_dir.path().join(MERGED_FILE).exists());
    }

    #[test]
    fn test_plan_stale_raster_is_deleted() {
        let temp_dir = TempDir::new().unwrap();
        write_merged(temp_dir.path(), BoundingBox::new(8.0, 47.0, 9.5, 48.0));

        let bbox = BoundingBox::new(9.3, 47.8, 10.1, 48.2);
        let result = plan(&bbox, temp_dir.path()).unwrap();
        assert!(matches!(result, Plan::Fetch(_)));
        assert!(!temp_dir.path().join(MERGED_FILE).exists());
    }

    #[test]
    fn test_plan_exact_cover_counts_as_covered() {
        let temp_dir = TempDir::new().unwrap();
        let bounds = BoundingBox::new(9.0, 48.0, 10.0, 49.0);
        write_merged(temp_dir.path(), bounds);

        let result = plan(&bounds, temp_dir.path()).unwrap();
        assert_eq!(result, Plan::Covered);
    }

    #[test]
    fn test_extract_dem_tif() {
        let temp_dir = TempDir::new().unwrap();
        let name = "Copernicus_DSM_10_N48_00_E009_00";
        let payload = b"fake tiff bytes";

        let mut builder = tar::Builder::new(Vec::new());
        let mut add = |path: String, data: &[u8]| {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_cksum();
            builder.append_data(&mut header, path, data).unwrap();
        };
        add(format!("{name}/README.txt"), b"docs");
        add(format!("{name}/DEM/{name}_DEM.tif"), payload);
        let bytes = builder.into_inner().unwrap();

        let dest = extract_dem_tif(&bytes, "https://example.com/tile.tar", temp_dir.path())
            .unwrap();
        assert_eq!(dest, temp_dir.path().join(format!("{name}_DEM.tif")));
        assert_eq!(std::fs::read(&dest).unwrap(), payload);
    }

    #[test]
    fn test_extract_dem_tif_missing_entry() {
        let temp_dir = TempDir::new().unwrap();

        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(4);
        header.set_cksum();
        builder
            .append_data(&mut header, "tile/README.txt", &b"docs"[..])
            .unwrap();
        let bytes = builder.into_inner().unwrap();

        let result = extract_dem_tif(&bytes, "https://example.com/tile.tar", temp_dir.path());
        assert!(matches!(result, Err(Error::TileDownload { .. })));
    }

    #[test]
    fn test_extract_dem_tif_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let mut garbage = Vec::new();
        garbage.write_all(&[0xFFu8; 100]).unwrap();
        assert!(
            extract_dem_tif(&garbage, "https://example.com/tile.tar", temp_dir.path()).is_err()
        );
    }
}
