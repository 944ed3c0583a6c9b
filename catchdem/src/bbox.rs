//! Geographic bounding boxes and the whole-degree tile grid.
//!
//! The DEM tile grid is indexed by the southwest corner of each 1° × 1°
//! cell, so a fractional bounding box has to be expanded outward to whole
//! degrees before tiles can be selected.

use geo::{BoundingRect, MultiPolygon};

use crate::error::{Error, Result};

/// An axis-aligned bounding box in geographic coordinates (degrees, WGS84).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum longitude (western boundary).
    pub min_lon: f64,
    /// Minimum latitude (southern boundary).
    pub min_lat: f64,
    /// Maximum longitude (eastern boundary).
    pub max_lon: f64,
    /// Maximum latitude (northern boundary).
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Bounding box of a single multipolygon, `None` if it has no coordinates.
    pub fn of(geometry: &MultiPolygon<f64>) -> Option<Self> {
        geometry.bounding_rect().map(|rect| {
            Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
        })
    }

    /// Smallest box containing every geometry in the collection.
    ///
    /// An empty collection has no bounds and is an error.
    pub fn of_all(geometries: &[MultiPolygon<f64>]) -> Result<Self> {
        geometries
            .iter()
            .filter_map(Self::of)
            .reduce(|a, b| a.union(&b))
            .ok_or(Error::EmptyBounds)
    }

    /// The smallest box containing both `self` and `other`.
    pub fn union(&self, other: &Self) -> Self {
        Self::new(
            self.min_lon.min(other.min_lon),
            self.min_lat.min(other.min_lat),
            self.max_lon.max(other.max_lon),
            self.max_lat.max(other.max_lat),
        )
    }

    /// Whether `other` lies fully inside this box.
    ///
    /// Exact numeric comparison on all four sides, no tolerance.
    pub fn contains(&self, other: &Self) -> bool {
        other.min_lon >= self.min_lon
            && other.min_lat >= self.min_lat
            && other.max_lon <= self.max_lon
            && other.max_lat <= self.max_lat
    }

    /// Expand outward to whole-degree boundaries matching the tile grid.
    pub fn expand_to_grid(&self) -> GridBounds {
        GridBounds {
            min_lon: self.min_lon.floor() as i32,
            min_lat: self.min_lat.floor() as i32,
            max_lon: self.max_lon.ceil() as i32,
            max_lat: self.max_lat.ceil() as i32,
        }
    }
}

/// Whole-degree bounds on the tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridBounds {
    pub min_lon: i32,
    pub min_lat: i32,
    pub max_lon: i32,
    pub max_lat: i32,
}

impl GridBounds {
    /// Whether the grid cell with southwest corner (`lon`, `lat`) is inside
    /// these bounds. Inclusive on all sides.
    pub fn contains_cell(&self, lon: i32, lat: i32) -> bool {
        self.min_lon <= lon && lon <= self.max_lon && self.min_lat <= lat && lat <= self.max_lat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Rect;

    fn square(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![
            Rect::new((min_lon, min_lat), (max_lon, max_lat)).to_polygon(),
        ])
    }

    #[test]
    fn test_of_all_unions_geometries() {
        let geometries = vec![square(9.0, 48.0, 9.5, 48.5), square(10.2, 47.1, 10.9, 47.9)];
        let bbox = BoundingBox::of_all(&geometries).unwrap();
        assert_eq!(bbox, BoundingBox::new(9.0, 47.1, 10.9, 48.5));
    }

    #[test]
    fn test_of_all_empty_is_error() {
        let result = BoundingBox::of_all(&[]);
        assert!(matches!(result, Err(Error::EmptyBounds)));
    }

    #[test]
    fn test_contains_is_exact() {
        let outer = BoundingBox::new(8.0, 47.0, 11.0, 50.0);
        assert!(outer.contains(&BoundingBox::new(8.0, 47.0, 11.0, 50.0)));
        assert!(outer.contains(&BoundingBox::new(9.0, 48.0, 10.0, 49.0)));
        // Off by any amount on any side fails
        assert!(!outer.contains(&BoundingBox::new(7.999, 47.0, 11.0, 50.0)));
        assert!(!outer.contains(&BoundingBox::new(8.0, 46.999, 11.0, 50.0)));
        assert!(!outer.contains(&BoundingBox::new(8.0, 47.0, 11.001, 50.0)));
        assert!(!outer.contains(&BoundingBox::new(8.0, 47.0, 11.0, 50.001)));
    }

    #[test]
    fn test_expand_to_grid() {
        let bbox = BoundingBox::new(9.3, 47.8, 10.1, 48.2);
        let grid = bbox.expand_to_grid();
        assert_eq!(grid.min_lon, 9);
        assert_eq!(grid.min_lat, 47);
        assert_eq!(grid.max_lon, 11);
        assert_eq!(grid.max_lat, 49);
    }

    #[test]
    fn test_expand_to_grid_negative() {
        // floor(-10.5) = -11, ceil(-2.1) = -2
        let bbox = BoundingBox::new(-10.5, -2.1, -9.2, -1.4);
        let grid = bbox.expand_to_grid();
        assert_eq!(grid.min_lon, -11);
        assert_eq!(grid.min_lat, -3);
        assert_eq!(grid.max_lon, -9);
        assert_eq!(grid.max_lat, -1);
    }

    #[test]
    fn test_expand_to_grid_whole_degrees() {
        // Already on the grid: floor and ceil are identity
        let bbox = BoundingBox::new(9.0, 48.0, 10.0, 49.0);
        let grid = bbox.expand_to_grid();
        assert_eq!(
            grid,
            GridBounds {
                min_lon: 9,
                min_lat: 48,
                max_lon: 10,
                max_lat: 49
            }
        );
    }

    #[test]
    fn test_contains_cell_inclusive() {
        let grid = GridBounds {
            min_lon: 9,
            min_lat: 47,
            max_lon: 11,
            max_lat: 49,
        };
        assert!(grid.contains_cell(9, 47));
        assert!(grid.contains_cell(11, 49));
        assert!(grid.contains_cell(10, 48));
        assert!(!grid.contains_cell(8, 48));
        assert!(!grid.contains_cell(12, 48));
        assert!(!grid.contains_cell(10, 46));
        assert!(!grid.contains_cell(10, 50));
    }
}
