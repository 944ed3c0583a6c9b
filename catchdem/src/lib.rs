//! # catchdem
//!
//! Data preparation for hydrological catchment datasets: exports station
//! and catchment geometries to GeoPackage and assembles a merged
//! Copernicus GLO-30 DEM covering the catchments.
//!
//! The pipeline is three sequential stages with the filesystem as the only
//! shared state:
//!
//! 1. read station metadata (identifier, elevation, longitude, latitude),
//! 2. write `stations.gpkg` and `catchments.gpkg`,
//! 3. download the DEM tiles intersecting the catchments' bounding box and
//!    mosaic them into `dem_merged.tif`.
//!
//! The merged raster is treated as a cache: when it already covers the
//! requested bounding box, acquisition performs no network requests; when
//! it does not, it is deleted and rebuilt from freshly downloaded tiles.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::path::Path;
//! use catchdem::acquire::{DemConfig, Downloader};
//! use catchdem::{gpkg, mosaic};
//!
//! let catchments = gpkg::read_catchment_geometries("catchments.gpkg")?;
//! let downloader = Downloader::new(DemConfig::default())?;
//! let count = downloader.acquire(&catchments, Path::new("dem"))?;
//! println!("downloaded {count} tiles");
//! mosaic::merge_tiles(Path::new("dem"))?;
//! ```
//!
//! All paths are explicit parameters; the library reads no fixed locations
//! and no environment variables.

pub mod acquire;
pub mod bbox;
pub mod catchments;
pub mod error;
pub mod export;
pub mod gpkg;
pub mod index;
pub mod mosaic;
pub mod raster;
pub mod stations;

// Re-export main types at crate root for convenience
pub use bbox::{BoundingBox, GridBounds};
pub use catchments::CatchmentDir;
pub use error::{Error, Result};
pub use stations::StationRecord;
