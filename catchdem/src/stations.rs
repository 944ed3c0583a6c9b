//! Station metadata.
//!
//! The metadata table is a CSV file with one row per gauging station and at
//! least the columns `camels_id`, `gauge_elevation`, `lon` and `lat`.
//! Additional columns are ignored.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;

/// One gauging station from the metadata table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StationRecord {
    /// Station identifier.
    pub camels_id: String,
    /// Gauge elevation in meters.
    pub gauge_elevation: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// Latitude in decimal degrees.
    pub lat: f64,
}

/// Read the station metadata table.
///
/// Malformed rows are errors; the pipeline has no use for a partial
/// station list.
pub fn read_metadata<P: AsRef<Path>>(path: P) -> Result<Vec<StationRecord>> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_read_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metadata.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "camels_id,gauge_elevation,lon,lat,provider").unwrap();
        writeln!(file, "DE1,350.0,9.5,48.5,bw").unwrap();
        writeln!(file, "DE2,120.25,10.1,51.0,sn").unwrap();

        let records = read_metadata(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            StationRecord {
                camels_id: "DE1".to_string(),
                gauge_elevation: 350.0,
                lon: 9.5,
                lat: 48.5,
            }
        );
        assert_eq!(records[1].camels_id, "DE2");
        assert_eq!(records[1].gauge_elevation, 120.25);
    }

    #[test]
    fn test_read_metadata_malformed_row() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metadata.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "camels_id,gauge_elevation,lon,lat").unwrap();
        writeln!(file, "DE1,not-a-number,9.5,48.5").unwrap();

        assert!(read_metadata(&path).is_err());
    }

    #[test]
    fn test_read_metadata_missing_file() {
        assert!(read_metadata("/nonexistent/metadata.csv").is_err());
    }
}
