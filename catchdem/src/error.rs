//! Error types for the catchdem library.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while preparing catchment data.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error when reading or writing files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The tile index request returned a non-success status.
    #[error("tile index request to {url} failed with HTTP {status}")]
    IndexRequest { url: String, status: u16 },

    /// A tile archive could not be downloaded or unpacked.
    #[error("tile download from {url} failed: {reason}")]
    TileDownload { url: String, reason: String },

    /// Malformed station metadata.
    #[error("metadata error: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed GeoJSON input.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// A catchment file exists but does not hold a usable polygon.
    #[error("invalid catchment geometry in {path}: {reason}")]
    InvalidCatchment { path: PathBuf, reason: String },

    /// SQLite error from the GeoPackage container.
    #[error("GeoPackage error: {0}")]
    Gpkg(#[from] rusqlite::Error),

    /// A GeoPackage geometry blob could not be decoded.
    #[error("malformed GeoPackage geometry: {0}")]
    MalformedGeometry(String),

    /// Input vector data is not in geographic coordinates.
    #[error("layer {layer} is in SRS {srs_id}, expected EPSG:4326")]
    CrsMismatch { layer: String, srs_id: i32 },

    /// No station has a catchment for the requested source dataset.
    #[error("no catchment geometries to export")]
    EmptyCatchments,

    /// TIFF decoding failed.
    #[error("TIFF error: {0}")]
    TiffDecode(#[from] tiff::TiffError),

    /// The file is a TIFF but lacks usable georeferencing.
    #[error("invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    /// The DEM directory holds no tile rasters to merge.
    #[error("no DEM tiles found in {dir}")]
    NoTiles { dir: PathBuf },

    /// A bounding box was requested for an empty geometry collection.
    #[error("cannot compute the bounding box of an empty geometry collection")]
    EmptyBounds,
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
