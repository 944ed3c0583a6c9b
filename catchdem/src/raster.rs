//! Single-band GeoTIFF reading and writing.
//!
//! Tiles carry their georeferencing in the ModelTiepoint and
//! ModelPixelScale tags; written rasters additionally get a
//! GeoKeyDirectory declaring EPSG:4326 and a GDAL_NODATA tag.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

use crate::bbox::BoundingBox;
use crate::error::{Error, Result};

/// Value written for cells no tile covers, tagged as GDAL_NODATA.
pub const NODATA: f32 = -9999.0;

/// GeoKeyDirectory declaring a geographic CRS, WGS 84, pixel-is-area.
const GEO_KEYS_WGS84: [u16; 16] = [
    1, 1, 0, 3, // version, revision, minor, key count
    1024, 0, 1, 2, // GTModelType: geographic
    1025, 0, 1, 1, // GTRasterType: pixel is area
    2048, 0, 1, 4326, // GeographicType: WGS 84
];

/// A single-band elevation raster in geographic coordinates.
#[derive(Debug, Clone)]
pub struct Raster {
    /// Elevation values in row-major order (north to south, west to east).
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
    pub bounds: BoundingBox,
}

impl Raster {
    /// Degrees per pixel, (x, y).
    pub fn resolution(&self) -> (f64, f64) {
        (
            (self.bounds.max_lon - self.bounds.min_lon) / self.width as f64,
            (self.bounds.max_lat - self.bounds.min_lat) / self.height as f64,
        )
    }
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>> {
    let file = File::open(path)?;
    let decoder = Decoder::new(BufReader::new(file))?;

    // GLO-30 tiles are 3600 x 3600 f32 samples; a merged raster over a
    // country-sized catchment set can be far larger than the default limits
    let mut limits = Limits::default();
    limits.decoding_buffer_size = 1024 * 1024 * 1024;
    limits.intermediate_buffer_size = 1024 * 1024 * 1024;
    limits.ifd_value_size = 1024 * 1024 * 1024;
    Ok(decoder.with_limits(limits))
}

fn invalid(path: &Path, reason: &str) -> Error {
    Error::InvalidGeoTiff(format!("{}: {}", path.display(), reason))
}

fn bounds_from_tags<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
) -> Result<BoundingBox> {
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::ModelTiepointTag)
        .map_err(|_| invalid(path, "missing ModelTiepoint tag"))?;
    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .map_err(|_| invalid(path, "missing ModelPixelScale tag"))?;
    if tiepoint.len() < 6 || scale.len() < 2 {
        return Err(invalid(path, "truncated georeferencing tags"));
    }

    let (width, height) = decoder.dimensions()?;

    // The tie point is the top-left corner; rows advance southward
    let min_lon = tiepoint[3];
    let max_lat = tiepoint[4];
    Ok(BoundingBox::new(
        min_lon,
        max_lat - height as f64 * scale[1],
        min_lon + width as f64 * scale[0],
        max_lat,
    ))
}

/// Read only the geographic bounds of a raster, without decoding pixels.
pub fn read_bounds<P: AsRef<Path>>(path: P) -> Result<BoundingBox> {
    let path = path.as_ref();
    let mut decoder = open_decoder(path)?;
    bounds_from_tags(&mut decoder, path)
}

/// Read a full raster, converting any sample type to f32.
pub fn read<P: AsRef<Path>>(path: P) -> Result<Raster> {
    let path = path.as_ref();
    let mut decoder = open_decoder(path)?;
    let bounds = bounds_from_tags(&mut decoder, path)?;
    let (width, height) = decoder.dimensions()?;

    let data = match decoder.read_image()? {
        DecodingResult::F32(data) => data,
        DecodingResult::F64(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I16(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I64(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U8(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U16(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U64(data) => data.into_iter().map(|v| v as f32).collect(),
    };

    Ok(Raster {
        data,
        width,
        height,
        bounds,
    })
}

/// Write a single-band Gray32Float GeoTIFF tagged EPSG:4326.
pub fn write<P: AsRef<Path>>(path: P, raster: &Raster) -> Result<()> {
    let (scale_x, scale_y) = raster.resolution();
    let tiepoint = [
        0.0,
        0.0,
        0.0,
        raster.bounds.min_lon,
        raster.bounds.max_lat,
        0.0,
    ];

    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    let mut image = encoder.new_image::<colortype::Gray32Float>(raster.width, raster.height)?;
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &[scale_x, scale_y, 0.0][..])?;
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, &GEO_KEYS_WGS84[..])?;
    image
        .encoder()
        .write_tag(Tag::GdalNodata, format!("{NODATA}").as_str())?;
    image.write_data(&raster.data)?;
    Ok(())
}
