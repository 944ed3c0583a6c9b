use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use catchdem::{export, stations, CatchmentDir};

pub fn run(
    metadata: PathBuf,
    catchment_dir: PathBuf,
    source: String,
    out_dir: PathBuf,
) -> Result<()> {
    let records = stations::read_metadata(&metadata).with_context(|| {
        format!(
            "failed to read station metadata from {}",
            metadata.display()
        )
    })?;

    fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let stations_path = out_dir.join("stations.gpkg");
    export::export_stations(&records, &stations_path)
        .context("failed to write the stations layer")?;
    println!(
        "Wrote {} stations to {}",
        records.len(),
        stations_path.display()
    );

    let store = CatchmentDir::new(catchment_dir);
    let catchments_path = out_dir.join("catchments.gpkg");
    let count = export::export_catchments(&records, &store, &source, &catchments_path)
        .context("failed to write the catchments layer")?;
    println!(
        "Wrote {count} {source} catchments to {}",
        catchments_path.display()
    );

    Ok(())
}
