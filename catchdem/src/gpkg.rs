//! Minimal GeoPackage I/O.
//!
//! Covers exactly what the pipeline needs: point and multipolygon feature
//! tables in EPSG:4326, written through `rusqlite` with the GeoPackage
//! binary geometry encoding (header + WKB) done in-crate. No other
//! geometry types, no Z/M coordinates, no spatial index.

use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use rusqlite::{params, Connection};

use crate::bbox::BoundingBox;
use crate::error::{Error, Result};
use crate::stations::StationRecord;

const GPKG_APPLICATION_ID: u32 = 0x4750_4B47; // "GPKG"
const GPKG_USER_VERSION: u32 = 10300;
const SRS_WGS84: i32 = 4326;

const WKB_POINT: u32 = 1;
const WKB_POLYGON: u32 = 3;
const WKB_MULTIPOLYGON: u32 = 6;

/// A catchment polygon tagged with its station and source dataset.
#[derive(Debug, Clone)]
pub struct CatchmentFeature {
    pub camels_id: String,
    pub source: String,
    pub geometry: MultiPolygon<f64>,
}

/// Write station metadata as a point layer, one feature per station.
///
/// Replaces any existing file at `path`.
pub fn write_stations<P: AsRef<Path>>(path: P, stations: &[StationRecord]) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        fs::remove_file(path)?;
    }
    let conn = Connection::open(path)?;
    create_container(&conn)?;
    conn.execute_batch(
        "CREATE TABLE stations (
            fid INTEGER PRIMARY KEY AUTOINCREMENT,
            geom BLOB,
            camels_id TEXT NOT NULL,
            gauge_elevation DOUBLE
        );",
    )?;

    let bounds = stations
        .iter()
        .map(|s| BoundingBox::new(s.lon, s.lat, s.lon, s.lat))
        .reduce(|a, b| a.union(&b));
    register_layer(&conn, "stations", "POINT", bounds)?;

    let mut stmt =
        conn.prepare("INSERT INTO stations (geom, camels_id, gauge_elevation) VALUES (?1, ?2, ?3)")?;
    for station in stations {
        let blob = encode_point(station.lon, station.lat)?;
        stmt.execute(params![blob, station.camels_id, station.gauge_elevation])?;
    }
    Ok(())
}

/// Read a station point layer back into records.
pub fn read_stations<P: AsRef<Path>>(path: P) -> Result<Vec<StationRecord>> {
    let conn = Connection::open(path)?;
    check_srs(&conn, "stations")?;

    let mut stmt =
        conn.prepare("SELECT geom, camels_id, gauge_elevation FROM stations ORDER BY fid")?;
    let mut rows = stmt.query([])?;
    let mut stations = Vec::new();
    while let Some(row) = rows.next()? {
        let blob: Vec<u8> = row.get(0)?;
        let (lon, lat) = match decode_geometry(&blob)? {
            Decoded::Point(lon, lat) => (lon, lat),
            Decoded::MultiPolygon(_) => {
                return Err(Error::MalformedGeometry(
                    "expected a point geometry in the stations layer".to_string(),
                ))
            }
        };
        stations.push(StationRecord {
            camels_id: row.get(1)?,
            gauge_elevation: row.get(2)?,
            lon,
            lat,
        });
    }
    Ok(stations)
}

/// Write catchment polygons as a single multipolygon layer.
///
/// An empty collection is an error: concatenating zero polygons is the
/// failure mode of a source dataset nobody has catchments for.
pub fn write_catchments<P: AsRef<Path>>(path: P, features: &[CatchmentFeature]) -> Result<()> {
    if features.is_empty() {
        return Err(Error::EmptyCatchments);
    }

    let path = path.as_ref();
    if path.exists() {
        fs::remove_file(path)?;
    }
    let conn = Connection::open(path)?;
    create_container(&conn)?;
    conn.execute_batch(
        "CREATE TABLE catchments (
            fid INTEGER PRIMARY KEY AUTOINCREMENT,
            geom BLOB,
            camels_id TEXT NOT NULL,
            source TEXT NOT NULL
        );",
    )?;

    let bounds = features
        .iter()
        .filter_map(|f| BoundingBox::of(&f.geometry))
        .reduce(|a, b| a.union(&b));
    register_layer(&conn, "catchments", "MULTIPOLYGON", bounds)?;

    let mut stmt =
        conn.prepare("INSERT INTO catchments (geom, camels_id, source) VALUES (?1, ?2, ?3)")?;
    for feature in features {
        let blob = encode_multipolygon(&feature.geometry)?;
        stmt.execute(params![blob, feature.camels_id, feature.source])?;
    }
    Ok(())
}

/// Read every polygon geometry from the (single) feature layer of a
/// GeoPackage.
///
/// The layer must be declared in EPSG:4326; the DEM stage works on
/// geographic coordinates only and reprojection is out of scope.
pub fn read_catchment_geometries<P: AsRef<Path>>(path: P) -> Result<Vec<MultiPolygon<f64>>> {
    let conn = Connection::open(path)?;
    let table = feature_table(&conn)?;
    check_srs(&conn, &table)?;

    let mut stmt = conn.prepare(&format!("SELECT geom FROM \"{table}\" ORDER BY fid"))?;
    let mut rows = stmt.query([])?;
    let mut geometries = Vec::new();
    while let Some(row) = rows.next()? {
        let blob: Vec<u8> = row.get(0)?;
        match decode_geometry(&blob)? {
            Decoded::MultiPolygon(multipolygon) => geometries.push(multipolygon),
            Decoded::Point(..) => {
                return Err(Error::MalformedGeometry(
                    "expected polygon geometries in the catchment layer".to_string(),
                ))
            }
        }
    }
    Ok(geometries)
}

/// Create the GeoPackage metadata tables in a fresh database.
fn create_container(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "application_id", GPKG_APPLICATION_ID)?;
    conn.pragma_update(None, "user_version", GPKG_USER_VERSION)?;
    conn.execute_batch(
        "CREATE TABLE gpkg_spatial_ref_sys (
            srs_name TEXT NOT NULL,
            srs_id INTEGER PRIMARY KEY,
            organization TEXT NOT NULL,
            organization_coordsys_id INTEGER NOT NULL,
            definition TEXT NOT NULL,
            description TEXT
        );
        INSERT INTO gpkg_spatial_ref_sys VALUES
            ('Undefined cartesian SRS', -1, 'NONE', -1, 'undefined', NULL),
            ('Undefined geographic SRS', 0, 'NONE', 0, 'undefined', NULL),
            ('WGS 84 geodetic', 4326, 'EPSG', 4326,
             'GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563]],PRIMEM[\"Greenwich\",0],UNIT[\"degree\",0.0174532925199433]]',
             'longitude/latitude coordinates in decimal degrees');
        CREATE TABLE gpkg_contents (
            table_name TEXT NOT NULL PRIMARY KEY,
            data_type TEXT NOT NULL,
            identifier TEXT UNIQUE,
            description TEXT DEFAULT '',
            last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
            min_x DOUBLE,
            min_y DOUBLE,
            max_x DOUBLE,
            max_y DOUBLE,
            srs_id INTEGER
        );
        CREATE TABLE gpkg_geometry_columns (
            table_name TEXT NOT NULL,
            column_name TEXT NOT NULL,
            geometry_type_name TEXT NOT NULL,
            srs_id INTEGER NOT NULL,
            z TINYINT NOT NULL,
            m TINYINT NOT NULL,
            PRIMARY KEY (table_name, column_name)
        );",
    )?;
    Ok(())
}

/// Register a feature table in the GeoPackage metadata.
fn register_layer(
    conn: &Connection,
    table: &str,
    geometry_type: &str,
    bounds: Option<BoundingBox>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO gpkg_contents
            (table_name, data_type, identifier, min_x, min_y, max_x, max_y, srs_id)
         VALUES (?1, 'features', ?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            table,
            bounds.map(|b| b.min_lon),
            bounds.map(|b| b.min_lat),
            bounds.map(|b| b.max_lon),
            bounds.map(|b| b.max_lat),
            SRS_WGS84
        ],
    )?;
    conn.execute(
        "INSERT INTO gpkg_geometry_columns VALUES (?1, 'geom', ?2, ?3, 0, 0)",
        params![table, geometry_type, SRS_WGS84],
    )?;
    Ok(())
}

/// The single feature table declared in `gpkg_contents`.
fn feature_table(conn: &Connection) -> Result<String> {
    let table = conn.query_row(
        "SELECT table_name FROM gpkg_contents WHERE data_type = 'features' LIMIT 1",
        [],
        |row| row.get(0),
    )?;
    Ok(table)
}

/// Verify that a layer is declared in EPSG:4326.
fn check_srs(conn: &Connection, table: &str) -> Result<()> {
    let srs_id: i32 = conn.query_row(
        "SELECT srs_id FROM gpkg_geometry_columns WHERE table_name = ?1",
        params![table],
        |row| row.get(0),
    )?;
    if srs_id != SRS_WGS84 {
        return Err(Error::CrsMismatch {
            layer: table.to_string(),
            srs_id,
        });
    }
    Ok(())
}

/// GeoPackage binary header: magic, version, flags, SRS id, XY envelope.
fn write_header(out: &mut Vec<u8>, bounds: &BoundingBox) -> Result<()> {
    out.extend_from_slice(b"GP");
    out.push(0); // version
    out.push(0x03); // little-endian, XY envelope
    out.write_i32::<LittleEndian>(SRS_WGS84)?;
    out.write_f64::<LittleEndian>(bounds.min_lon)?;
    out.write_f64::<LittleEndian>(bounds.max_lon)?;
    out.write_f64::<LittleEndian>(bounds.min_lat)?;
    out.write_f64::<LittleEndian>(bounds.max_lat)?;
    Ok(())
}

fn encode_point(lon: f64, lat: f64) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(61);
    write_header(&mut out, &BoundingBox::new(lon, lat, lon, lat))?;
    out.push(1); // WKB little-endian
    out.write_u32::<LittleEndian>(WKB_POINT)?;
    out.write_f64::<LittleEndian>(lon)?;
    out.write_f64::<LittleEndian>(lat)?;
    Ok(out)
}

fn write_ring(out: &mut Vec<u8>, ring: &LineString<f64>) -> Result<()> {
    out.write_u32::<LittleEndian>(ring.0.len() as u32)?;
    for coord in &ring.0 {
        out.write_f64::<LittleEndian>(coord.x)?;
        out.write_f64::<LittleEndian>(coord.y)?;
    }
    Ok(())
}

fn encode_multipolygon(multipolygon: &MultiPolygon<f64>) -> Result<Vec<u8>> {
    let bounds = BoundingBox::of(multipolygon).ok_or(Error::EmptyBounds)?;
    let mut out = Vec::new();
    write_header(&mut out, &bounds)?;
    out.push(1);
    out.write_u32::<LittleEndian>(WKB_MULTIPOLYGON)?;
    out.write_u32::<LittleEndian>(multipolygon.0.len() as u32)?;
    for polygon in &multipolygon.0 {
        out.push(1);
        out.write_u32::<LittleEndian>(WKB_POLYGON)?;
        out.write_u32::<LittleEndian>((1 + polygon.interiors().len()) as u32)?;
        write_ring(&mut out, polygon.exterior())?;
        for ring in polygon.interiors() {
            write_ring(&mut out, ring)?;
        }
    }
    Ok(out)
}

/// A decoded GeoPackage geometry blob.
enum Decoded {
    Point(f64, f64),
    MultiPolygon(MultiPolygon<f64>),
}

fn malformed(reason: &str) -> Error {
    Error::MalformedGeometry(reason.to_string())
}

fn decode_geometry(blob: &[u8]) -> Result<Decoded> {
    let mut cursor = Cursor::new(blob);

    let mut magic = [0u8; 2];
    cursor.read_exact(&mut magic)?;
    if &magic != b"GP" {
        return Err(malformed("missing GP magic"));
    }
    let _version = cursor.read_u8()?;
    let flags = cursor.read_u8()?;
    let header_le = flags & 0x01 == 1;
    let _srs_id = if header_le {
        cursor.read_i32::<LittleEndian>()?
    } else {
        cursor.read_i32::<BigEndian>()?
    };
    // Envelope indicator selects the envelope size; the contents are
    // redundant with the WKB, skip them.
    let envelope_bytes = match (flags >> 1) & 0x07 {
        0 => 0,
        1 => 32,
        2 | 3 => 48,
        4 => 64,
        _ => return Err(malformed("invalid envelope indicator")),
    };
    cursor.set_position(cursor.position() + envelope_bytes);

    decode_wkb(&mut cursor)
}

fn decode_wkb(cursor: &mut Cursor<&[u8]>) -> Result<Decoded> {
    let le = read_byte_order(cursor)?;
    match read_u32(cursor, le)? {
        WKB_POINT => {
            let lon = read_f64(cursor, le)?;
            let lat = read_f64(cursor, le)?;
            Ok(Decoded::Point(lon, lat))
        }
        WKB_POLYGON => {
            let polygon = read_polygon_body(cursor, le)?;
            Ok(Decoded::MultiPolygon(MultiPolygon(vec![polygon])))
        }
        WKB_MULTIPOLYGON => {
            let count = read_u32(cursor, le)?;
            let mut polygons = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let le = read_byte_order(cursor)?;
                if read_u32(cursor, le)? != WKB_POLYGON {
                    return Err(malformed("multipolygon member is not a polygon"));
                }
                polygons.push(read_polygon_body(cursor, le)?);
            }
            Ok(Decoded::MultiPolygon(MultiPolygon(polygons)))
        }
        other => Err(malformed(&format!("unsupported WKB geometry type {other}"))),
    }
}

fn read_polygon_body(cursor: &mut Cursor<&[u8]>, le: bool) -> Result<Polygon<f64>> {
    let ring_count = read_u32(cursor, le)?;
    if ring_count == 0 {
        return Err(malformed("polygon with zero rings"));
    }
    let mut rings = Vec::with_capacity(ring_count as usize);
    for _ in 0..ring_count {
        let point_count = read_u32(cursor, le)?;
        let mut coords = Vec::with_capacity(point_count as usize);
        for _ in 0..point_count {
            let x = read_f64(cursor, le)?;
            let y = read_f64(cursor, le)?;
            coords.push(Coord { x, y });
        }
        rings.push(LineString(coords));
    }
    let exterior = rings.remove(0);
    Ok(Polygon::new(exterior, rings))
}

fn read_byte_order(cursor: &mut Cursor<&[u8]>) -> Result<bool> {
    match cursor.read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(malformed("invalid WKB byte order")),
    }
}

fn read_u32(cursor: &mut Cursor<&[u8]>, le: bool) -> Result<u32> {
    Ok(if le {
        cursor.read_u32::<LittleEndian>()?
    } else {
        cursor.read_u32::<BigEndian>()?
    })
}

fn read_f64(cursor: &mut Cursor<&[u8]>, le: bool) -> Result<f64> {
    Ok(if le {
        cursor.read_f64::<LittleEndian>()?
    } else {
        cursor.read_f64::<BigEndian>()?
    })
}
