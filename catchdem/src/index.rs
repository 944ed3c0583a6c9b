//! Remote DEM tile index.
//!
//! The Copernicus GLO-30 index is a newline-delimited list of tile archive
//! URLs. Each file name encodes the southwest corner of a 1° × 1° grid
//! cell with hemisphere prefixes, e.g.
//! `Copernicus_DSM_10_N48_00_E009_00.tar` is the cell at (lat 48, lon 9)
//! and `..._S02_00_W010_00.tar` the cell at (lat −2, lon −10).

use reqwest::blocking::Client;

use crate::bbox::GridBounds;
use crate::error::{Error, Result};

/// Default Copernicus GLO-30 DGED public tile index.
pub const DEFAULT_INDEX_URL: &str =
    "https://prism-dem-open.copernicus.eu/pd-desk-open-access/publicDemURLs/COP-DEM_GLO-30-DGED__2023_1";

/// A remote tile and the southwest corner of its grid cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRef {
    /// Archive URL.
    pub url: String,
    /// Longitude of the southwest corner, whole degrees.
    pub lon: i32,
    /// Latitude of the southwest corner, whole degrees.
    pub lat: i32,
}

/// Fetch the raw tile listing.
///
/// A non-success status is an explicit error; the listing is never carried
/// over from a previous request.
pub fn fetch_index(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).header("accept", "csv").send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::IndexRequest {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response.text()?)
}

/// Parse a newline-delimited tile listing.
///
/// Rows that do not carry both grid coordinates are dropped.
pub fn parse_index(text: &str) -> Vec<TileRef> {
    text.lines().filter_map(parse_tile_url).collect()
}

/// Parse the grid coordinates encoded in one tile URL.
///
/// Hemisphere is encoded by token prefix: `N`/`S` for latitude, `E`/`W`
/// for longitude, with south and west negative. A URL missing either axis
/// is rejected; coordinates are never back-filled from a previous row.
pub fn parse_tile_url(line: &str) -> Option<TileRef> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let name = line.rsplit('/').next().unwrap_or(line);
    let name = name.strip_suffix(".tar").unwrap_or(name);

    let mut lat = None;
    let mut lon = None;
    for token in name.split('_') {
        let mut chars = token.chars();
        match chars.next() {
            Some('N') => lat = lat.or_else(|| parse_degrees(chars.as_str(), 1)),
            Some('S') => lat = lat.or_else(|| parse_degrees(chars.as_str(), -1)),
            Some('E') => lon = lon.or_else(|| parse_degrees(chars.as_str(), 1)),
            Some('W') => lon = lon.or_else(|| parse_degrees(chars.as_str(), -1)),
            _ => {}
        }
    }

    Some(TileRef {
        url: line.to_string(),
        lon: lon?,
        lat: lat?,
    })
}

fn parse_degrees(digits: &str, sign: i32) -> Option<i32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<i32>().ok().map(|value| sign * value)
}

/// Tiles whose southwest grid corner lies within the expanded bounding
/// box, inclusive on all sides.
pub fn select_tiles<'a>(tiles: &'a [TileRef], grid: GridBounds) -> Vec<&'a TileRef> {
    tiles
        .iter()
        .filter(|tile| grid.contains_cell(tile.lon, tile.lat))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_northeast_tile() {
        let tile = parse_tile_url(
            "https://example.com/pd/Copernicus_DSM_10_N48_00_E009_00.tar",
        )
        .unwrap();
        assert_eq!(tile.lat, 48);
        assert_eq!(tile.lon, 9);
    }

    #[test]
    fn test_parse_southwest_tile() {
        let tile = parse_tile_url(
            "https://example.com/pd/Copernicus_DSM_10_S02_00_W010_00.tar",
        )
        .unwrap();
        assert_eq!(tile.lat, -2);
        assert_eq!(tile.lon, -10);
    }

    #[test]
    fn test_parse_bare_name() {
        let tile = parse_tile_url("N48_00_E009_00.tar").unwrap();
        assert_eq!(tile.lat, 48);
        assert_eq!(tile.lon, 9);
    }

    #[test]
    fn test_parse_rejects_missing_axis() {
        // A row missing one hemisphere marker is dropped, never completed
        // from context
        assert!(parse_tile_url("Copernicus_DSM_10_N48_00.tar").is_none());
        assert!(parse_tile_url("Copernicus_DSM_10_E009_00.tar").is_none());
        assert!(parse_tile_url("").is_none());
        assert!(parse_tile_url("https://example.com/readme.txt").is_none());
    }

    #[test]
    fn test_parse_index_skips_bad_rows() {
        let listing = "\
https://example.com/Copernicus_DSM_10_N48_00_E009_00.tar
not a tile url
https://example.com/Copernicus_DSM_10_S02_00_W010_00.tar

https://example.com/Copernicus_DSM_10_N49_00.tar
";
        let tiles = parse_index(listing);
        assert_eq!(tiles.len(), 2);
        assert_eq!((tiles[0].lat, tiles[0].lon), (48, 9));
        assert_eq!((tiles[1].lat, tiles[1].lon), (-2, -10));
    }

    #[test]
    fn test_select_tiles_inclusive_bounds() {
        let tiles: Vec<TileRef> = [
            (8, 47),
            (9, 47),
            (11, 49),
            (12, 49),
            (10, 46),
            (10, 48),
        ]
        .iter()
        .map(|&(lon, lat)| TileRef {
            url: format!("tile_{lon}_{lat}"),
            lon,
            lat,
        })
        .collect();

        let grid = GridBounds {
            min_lon: 9,
            min_lat: 47,
            max_lon: 11,
            max_lat: 49,
        };
        let selected = select_tiles(&tiles, grid);
        let corners: Vec<(i32, i32)> = selected.iter().map(|t| (t.lon, t.lat)).collect();
        assert_eq!(corners, vec![(9, 47), (11, 49), (10, 48)]);
    }

    #[test]
    fn test_select_tiles_disjoint_box_selects_nothing() {
        let tiles = vec![TileRef {
            url: "tile".to_string(),
            lon: 9,
            lat: 48,
        }];
        let grid = GridBounds {
            min_lon: -120,
            min_lat: 30,
            max_lon: -110,
            max_lat: 40,
        };
        assert!(select_tiles(&tiles, grid).is_empty());
    }
}
