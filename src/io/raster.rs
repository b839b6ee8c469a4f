//! GeoTIFF reading and writing
//!
//! Georeferencing comes from the ModelTiepoint / ModelPixelScale pair and the
//! reference system from the GeoKey directory. Only north-up rasters are handled.

use crate::io::error::{CamtrapError, Result, WithPath, invalid_data, invalid_parameter};
use crate::spatial::crs::Crs;
use crate::spatial::raster::{GeoTransform, LayerKind, Raster};
use num_traits::ToPrimitive;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{TiffEncoder, colortype};
use tiff::tags::Tag;

const KEY_MODEL_TYPE: u16 = 1024;
const KEY_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const RASTER_PIXEL_IS_POINT: u16 = 2;

/// Value written for missing cells
pub const NODATA_VALUE: f32 = -9999.0;

/// Read one band of a GeoTIFF
///
/// `band` is 1-based. Bands are taken from interleaved samples when the image
/// has several, otherwise from successive images (pages) of the file.
///
/// # Errors
///
/// Returns an error if the file can't be decoded, lacks georeferencing, uses an
/// unsupported reference system, or has fewer than `band` bands
pub fn read_geotiff(path: &Path, band: usize, kind: LayerKind) -> Result<Raster> {
    if band == 0 {
        return Err(invalid_parameter("band", &band, &"bands are 1-based"));
    }
    let file = File::open(path).map_err(|e| CamtrapError::FileSystem {
        path: path.to_path_buf(),
        operation: "open raster",
        source: e,
    })?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .with_path(path)?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions().with_path(path)?;
    let (transform, raster_crs) = read_georeference(&mut decoder, width, height).with_path(path)?;
    let nodata = read_nodata(&mut decoder);

    let cells = width as usize * height as usize;
    let mut values = decode_samples(decoder.read_image().with_path(path)?);
    let samples = if cells == 0 { 0 } else { values.len() / cells };

    if samples > 1 {
        if band > samples {
            return Err(missing_band(path, band, samples));
        }
        values = values
            .chunks_exact(samples)
            .filter_map(|pixel| pixel.get(band - 1).copied())
            .collect();
    } else {
        for page in 1..band {
            if !decoder.more_images() {
                return Err(missing_band(path, band, page));
            }
            decoder.next_image().with_path(path)?;
            if decoder.dimensions().with_path(path)? != (width, height) {
                return Err(invalid_data(&format!(
                    "band {} of '{}' has different dimensions",
                    page + 1,
                    path.display()
                )));
            }
            values = decode_samples(decoder.read_image().with_path(path)?);
        }
    }

    if let Some(nodata) = nodata {
        for v in &mut values {
            if (*v - nodata).abs() <= f64::EPSILON * nodata.abs().max(1.0) {
                *v = f64::NAN;
            }
        }
    }

    Raster::from_vec(
        values,
        height as usize,
        width as usize,
        transform,
        raster_crs,
        kind,
    )
}

/// Write a raster as a single-band float32 GeoTIFF
///
/// # Errors
///
/// Returns an error if the file can't be created or encoded
pub fn write_geotiff(path: &Path, raster: &Raster) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CamtrapError::FileSystem {
            path: parent.to_path_buf(),
            operation: "create directory",
            source: e,
        })?;
    }
    let file = File::create(path).map_err(|e| CamtrapError::FileSystem {
        path: path.to_path_buf(),
        operation: "create raster",
        source: e,
    })?;

    let t = raster.transform;
    let scale = [t.pixel_width, t.pixel_height, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, t.origin_x, t.origin_y, 0.0];
    let geo_keys = geo_key_directory(&raster.crs);
    let nodata = NODATA_VALUE.to_string();
    let data: Vec<f32> = raster
        .data
        .iter()
        .map(|v| if v.is_nan() { NODATA_VALUE } else { *v as f32 })
        .collect();

    let mut encoder = TiffEncoder::new(BufWriter::new(file)).with_path(path)?;
    let mut image = encoder
        .new_image::<colortype::Gray32Float>(raster.cols() as u32, raster.rows() as u32)
        .with_path(path)?;
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])
        .with_path(path)?;
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .with_path(path)?;
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, &geo_keys[..])
        .with_path(path)?;
    image
        .encoder()
        .write_tag(Tag::GdalNodata, nodata.as_str())
        .with_path(path)?;
    image.write_data(&data).with_path(path)?;
    Ok(())
}

#[rustfmt::skip]
fn geo_key_directory(crs: &Crs) -> Vec<u16> {
    let (model_type, crs_key) = if crs.is_projected() {
        (MODEL_TYPE_PROJECTED, KEY_PROJECTED_CS_TYPE)
    } else {
        (MODEL_TYPE_GEOGRAPHIC, KEY_GEOGRAPHIC_TYPE)
    };
    vec![
        1, 1, 0, 3, // header: version, revision, minor, key count
        KEY_MODEL_TYPE, 0, 1, model_type,
        KEY_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA,
        crs_key, 0, 1, crs.epsg() as u16,
    ]
}

fn read_georeference<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    width: u32,
    height: u32,
) -> Result<(GeoTransform, Crs)> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag)?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag)?;
    let (Some(&scale_x), Some(&scale_y)) = (scale.first(), scale.get(1)) else {
        return Err(invalid_data(&"ModelPixelScale needs two values"));
    };
    let (Some(&i), Some(&j), Some(&x), Some(&y)) =
        (tiepoint.first(), tiepoint.get(1), tiepoint.get(3), tiepoint.get(4))
    else {
        return Err(invalid_data(&"ModelTiepoint needs six values"));
    };
    if width == 0 || height == 0 || scale_x <= 0.0 || scale_y <= 0.0 {
        return Err(invalid_data(&"raster has an empty or flipped grid"));
    }

    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag)?;
    let key = |id: u16| -> Option<u16> {
        keys.get(4..)?
            .chunks_exact(4)
            .find(|entry| entry.first() == Some(&id) && entry.get(1) == Some(&0))
            .and_then(|entry| entry.get(3).copied())
    };

    let crs = match (key(KEY_PROJECTED_CS_TYPE), key(KEY_GEOGRAPHIC_TYPE)) {
        (Some(code), _) => Crs::from_epsg(u32::from(code))?,
        (None, Some(code)) => Crs::from_epsg(u32::from(code))?,
        (None, None) => return Err(invalid_data(&"GeoKey directory names no reference system")),
    };

    let mut origin_x = x - i * scale_x;
    let mut origin_y = y + j * scale_y;
    if key(KEY_RASTER_TYPE) == Some(RASTER_PIXEL_IS_POINT) {
        origin_x -= scale_x / 2.0;
        origin_y += scale_y / 2.0;
    }

    Ok((GeoTransform::new(origin_x, origin_y, scale_x, scale_y), crs))
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse().ok())
}

fn decode_samples(result: DecodingResult) -> Vec<f64> {
    match result {
        DecodingResult::U8(data) => to_f64(data),
        DecodingResult::U16(data) => to_f64(data),
        DecodingResult::U32(data) => to_f64(data),
        DecodingResult::U64(data) => to_f64(data),
        DecodingResult::I8(data) => to_f64(data),
        DecodingResult::I16(data) => to_f64(data),
        DecodingResult::I32(data) => to_f64(data),
        DecodingResult::I64(data) => to_f64(data),
        DecodingResult::F32(data) => to_f64(data),
        DecodingResult::F64(data) => data,
    }
}

fn to_f64<T: ToPrimitive>(values: Vec<T>) -> Vec<f64> {
    values
        .into_iter()
        .map(|v| v.to_f64().unwrap_or(f64::NAN))
        .collect()
}

fn missing_band(path: &Path, band: usize, available: usize) -> CamtrapError {
    invalid_parameter(
        "band",
        &band,
        &format!("'{}' has only {available} band(s)", path.display()),
    )
}
