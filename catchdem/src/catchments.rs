//! Per-station catchment polygons.
//!
//! Pre-computed catchment geometries live in a directory tree keyed by
//! station and source dataset:
//!
//! ```text
//! <root>/<camels_id>/<source>.geojson
//! ```
//!
//! A station may have catchments from several source datasets (or none for
//! a given source); absence is an expected condition, not an error.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use geo::{Geometry, MultiPolygon};
use geojson::GeoJson;

use crate::error::{Error, Result};

/// Directory-backed accessor for pre-computed catchment polygons.
pub struct CatchmentDir {
    root: PathBuf,
}

impl CatchmentDir {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Retrieve the catchment polygon of a station for a source dataset.
    ///
    /// Returns `Ok(None)` when the station has no catchment for this
    /// source. A file that exists but does not hold a polygon geometry is
    /// an error.
    pub fn catchment(&self, camels_id: &str, source: &str) -> Result<Option<MultiPolygon<f64>>> {
        let path = self
            .root
            .join(camels_id)
            .join(format!("{source}.geojson"));
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        let geojson = GeoJson::from_reader(BufReader::new(file)).map_err(geojson::Error::from)?;
        let geometry = first_geometry(geojson).ok_or_else(|| Error::InvalidCatchment {
            path: path.clone(),
            reason: "no geometry found".to_string(),
        })?;

        let geometry =
            Geometry::<f64>::try_from(geometry.value).map_err(|e| Error::InvalidCatchment {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        match geometry {
            Geometry::Polygon(polygon) => Ok(Some(MultiPolygon(vec![polygon]))),
            Geometry::MultiPolygon(multipolygon) => Ok(Some(multipolygon)),
            _ => Err(Error::InvalidCatchment {
                path,
                reason: "not a polygon geometry".to_string(),
            }),
        }
    }
}

/// The first geometry of a GeoJSON document, whatever its top-level shape.
fn first_geometry(geojson: GeoJson) -> Option<geojson::Geometry> {
    match geojson {
        GeoJson::Geometry(geometry) => Some(geometry),
        GeoJson::Feature(feature) => feature.geometry,
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .find_map(|feature| feature.geometry),
    }
}
