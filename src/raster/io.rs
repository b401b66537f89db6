//! GeoTIFF reading and writing.
//!
//! Placement is taken from ModelPixelScale + ModelTiepoint, or from
//! ModelTransformation. The GeoKey tags are carried through as an opaque
//! [`Projection`].

use std::{
    fs::File,
    io::{BufReader, ErrorKind, Read, Seek},
    path::{Path, PathBuf},
};

use ndarray::Array2;
use tiff::{
    decoder::{Decoder, DecodingResult},
    encoder::{
        colortype::{self, ColorType},
        Compression, TiffEncoder, TiffValue,
    },
    tags::Tag,
};
use tracing::debug;

use super::{GeoReference, Projection, RasterGrid};
use crate::error::RasterError;

#[derive(Debug, Clone)]
/// Band-separated samples of a multiband raster.
pub struct MultibandRaster {
    pub bands: Vec<Array2<u16>>,
    pub georef: GeoReference,
    pub projection: Projection,
}

/// Reads a single-band 8-bit GeoTIFF.
pub fn read_grid(path: &Path) -> Result<RasterGrid, RasterError> {
    let mut decoder = open_decoder(path)?;
    let (width, height) = dimensions_of(&mut decoder)?;
    let georef = read_georeference(&mut decoder, path, height, width)?;
    let projection = read_projection(&mut decoder)?;

    let data = match decoder.read_image()? {
        DecodingResult::U8(buf) if buf.len() == width * height => {
            Array2::from_shape_vec((height, width), buf)?
        }
        _ => return Err(RasterError::UnsupportedPixelFormat(path.to_path_buf())),
    };

    debug!(
        "Read {} ({}x{}, {})",
        path.display(),
        height,
        width,
        projection
    );

    Ok(RasterGrid {
        data,
        georef,
        projection,
    })
}

/// Reads only the placement of a GeoTIFF.
pub fn read_georef(path: &Path) -> Result<GeoReference, RasterError> {
    let mut decoder = open_decoder(path)?;
    let (width, height) = dimensions_of(&mut decoder)?;

    read_georeference(&mut decoder, path, height, width)
}

/// `(width, height)` in pixels.
pub fn dimensions(path: &Path) -> Result<(usize, usize), RasterError> {
    let mut decoder = open_decoder(path)?;
    dimensions_of(&mut decoder)
}

/// Reads a pixel-interleaved 16-bit raster and splits it into bands.
pub fn read_bands_u16(path: &Path) -> Result<MultibandRaster, RasterError> {
    let mut decoder = open_decoder(path)?;
    let (width, height) = dimensions_of(&mut decoder)?;
    let georef = read_georeference(&mut decoder, path, height, width)?;
    let projection = read_projection(&mut decoder)?;

    let buf = match decoder.read_image()? {
        DecodingResult::U16(buf) => buf,
        _ => return Err(RasterError::UnsupportedPixelFormat(path.to_path_buf())),
    };

    let pixels = width * height;
    let samples = buf.len() / pixels;
    if samples == 0 || buf.len() != pixels * samples {
        return Err(RasterError::UnsupportedPixelFormat(path.to_path_buf()));
    }

    let bands = (0..samples)
        .map(|band| {
            Array2::from_shape_fn((height, width), |(r, c)| buf[(r * width + c) * samples + band])
        })
        .collect();

    Ok(MultibandRaster {
        bands,
        georef,
        projection,
    })
}

/// Writes an LZW-compressed 8-bit GeoTIFF. Never overwrites.
pub fn write_grid(path: &Path, grid: &RasterGrid, nodata: Option<u8>) -> Result<(), RasterError> {
    let samples: Vec<u8> = grid.data.iter().copied().collect();
    let nodata = nodata.map(|v| v.to_string());

    debug!(
        "Writing grid to file: {} (shape {:?}, transform {:?}, {})",
        path.display(),
        grid.dim(),
        grid.georef.geo_transform(),
        grid.projection
    );

    write_geotiff::<colortype::Gray8>(
        path,
        &samples,
        &grid.georef,
        &grid.projection,
        nodata.as_deref(),
    )
}

/// Writes an LZW-compressed 32-bit float GeoTIFF. Never overwrites.
pub fn write_float_grid(
    path: &Path,
    data: &Array2<f32>,
    georef: &GeoReference,
    projection: &Projection,
    nodata: f32,
) -> Result<(), RasterError> {
    let samples: Vec<f32> = data.iter().copied().collect();
    let nodata = nodata.to_string();

    write_geotiff::<colortype::Gray32Float>(path, &samples, georef, projection, Some(&nodata))
}

fn write_geotiff<C>(
    path: &Path,
    samples: &[C::Inner],
    georef: &GeoReference,
    projection: &Projection,
    nodata: Option<&str>,
) -> Result<(), RasterError>
where
    C: ColorType,
    [C::Inner]: TiffValue,
{
    let mut file = match File::create_new(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(RasterError::AlreadyExists(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    let mut encoder = TiffEncoder::new(&mut file)?.with_compression(Compression::Lzw);
    let mut image = encoder.new_image::<C>(georef.cols() as u32, georef.rows() as u32)?;

    let res = georef.resolution();
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &[res, res, 0.0][..])?;
    image.encoder().write_tag(
        Tag::ModelTiepointTag,
        &[0.0, 0.0, 0.0, georef.origin_x(), georef.origin_y(), 0.0][..],
    )?;

    if let Some(keys) = &projection.geo_keys {
        image.encoder().write_tag(Tag::GeoKeyDirectoryTag, &keys[..])?;
    }
    if let Some(doubles) = &projection.geo_doubles {
        image.encoder().write_tag(Tag::GeoDoubleParamsTag, &doubles[..])?;
    }
    if let Some(ascii) = &projection.geo_ascii {
        image.encoder().write_tag(Tag::GeoAsciiParamsTag, ascii.as_str())?;
    }
    if let Some(nodata) = nodata {
        image.encoder().write_tag(Tag::GdalNodata, nodata)?;
    }

    image.write_data(samples)?;

    Ok(())
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>, RasterError> {
    let file = File::open(path)?;
    Ok(Decoder::new(BufReader::new(file))?)
}

fn dimensions_of<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<(usize, usize), RasterError> {
    let (width, height) = decoder.dimensions()?;
    Ok((width as usize, height as usize))
}

fn find_f64s<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    tag: Tag,
) -> Result<Option<Vec<f64>>, RasterError> {
    Ok(decoder.find_tag(tag)?.map(|v| v.into_f64_vec()).transpose()?)
}

fn read_georeference<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
    rows: usize,
    cols: usize,
) -> Result<GeoReference, RasterError> {
    let scale = find_f64s(decoder, Tag::ModelPixelScaleTag)?;
    let tiepoint = find_f64s(decoder, Tag::ModelTiepointTag)?;

    if let (Some(scale), Some(tiepoint)) = (&scale, &tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            let res = square_resolution(scale[0], scale[1])?;
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];

            return Ok(GeoReference::new(origin_x, origin_y, res, rows, cols)?);
        }
    }

    // 4x4 row-major model transformation
    if let Some(t) = find_f64s(decoder, Tag::ModelTransformationTag)? {
        if t.len() >= 16 {
            if t[1] != 0.0 || t[4] != 0.0 {
                return Err(RasterError::Rotated(path.to_path_buf()));
            }
            let res = square_resolution(t[0], -t[5])?;

            return Ok(GeoReference::new(t[3], t[7], res, rows, cols)?);
        }
    }

    Err(RasterError::MissingGeoreference(PathBuf::from(path)))
}

fn read_projection<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Projection, RasterError> {
    let geo_keys = decoder
        .find_tag(Tag::GeoKeyDirectoryTag)?
        .map(|v| v.into_u16_vec())
        .transpose()?;
    let geo_doubles = find_f64s(decoder, Tag::GeoDoubleParamsTag)?;
    let geo_ascii = decoder
        .find_tag(Tag::GeoAsciiParamsTag)?
        .map(|v| v.into_string())
        .transpose()?;

    Ok(Projection {
        geo_keys,
        geo_doubles,
        geo_ascii,
    })
}

fn square_resolution(x: f64, y: f64) -> Result<f64, RasterError> {
    let tolerance = 1e-9 * x.abs().max(1.0);
    if (x - y).abs() > tolerance {
        return Err(RasterError::NonSquarePixels(x, y));
    }

    Ok(x)
}

// -- Tests -------------------------------------------------------------------
