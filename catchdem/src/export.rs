//! The two vector export operations.
//!
//! `export_stations` writes the station metadata as a point layer;
//! `export_catchments` collects the catchment polygon of every station for
//! one source dataset and writes them as a single layer. Stations without
//! a catchment for that source are skipped.

use std::path::Path;

use crate::catchments::CatchmentDir;
use crate::error::Result;
use crate::gpkg::{self, CatchmentFeature};
use crate::stations::StationRecord;

/// Write the station metadata to a GeoPackage point layer.
///
/// One feature per station with attributes `{camels_id, gauge_elevation}`
/// and geometry `(lon, lat)`.
pub fn export_stations(metadata: &[StationRecord], out_path: &Path) -> Result<()> {
    gpkg::write_stations(out_path, metadata)?;
    log::info!(
        "wrote {} stations to {}",
        metadata.len(),
        out_path.display()
    );
    Ok(())
}

/// Collect every station's catchment for `source` and write them to a
/// GeoPackage.
///
/// Stations without a catchment for this source are filtered out before
/// aggregation; an entirely empty result is an error, as is any individual
/// lookup failure. Returns the number of catchments written.
pub fn export_catchments(
    metadata: &[StationRecord],
    store: &CatchmentDir,
    source: &str,
    out_path: &Path,
) -> Result<usize> {
    let features = metadata
        .iter()
        .map(|station| {
            let feature = store.catchment(&station.camels_id, source)?.map(|geometry| {
                CatchmentFeature {
                    camels_id: station.camels_id.clone(),
                    source: source.to_string(),
                    geometry,
                }
            });
            Ok(feature)
        })
        .filter_map(|result: Result<Option<CatchmentFeature>>| result.transpose())
        .collect::<Result<Vec<_>>>()?;

    gpkg::write_catchments(out_path, &features)?;
    log::info!(
        "wrote {} {} catchments to {}",
        features.len(),
        source,
        out_path.display()
    );
    Ok(features.len())
}
