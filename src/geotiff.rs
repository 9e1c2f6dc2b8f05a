//! Single-band Float32 GeoTIFF output in geographic coordinates (EPSG:4326).

use std::{fs::File, io::BufWriter, path::Path};

use tiff::{
    encoder::{colortype::Gray32Float, TiffEncoder},
    tags::Tag,
};

use crate::{error::BackendError, raster::Raster};

/// Value written for no-data pixels, declared in the GDAL no-data tag.
pub const NODATA: f32 = -9999.0;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

// Header (version 1.1.0, 3 keys), then GTModelType = geographic,
// GTRasterType = pixel is area, GeographicType = WGS 84.
const GEO_KEYS: [u16; 16] = [
    1, 1, 0, 3, //
    1024, 0, 1, 2, //
    1025, 0, 1, 1, //
    2048, 0, 1, 4326,
];

pub fn write(path: &Path, raster: &Raster) -> Result<(), BackendError> {
    let grid = raster.grid;
    let file = BufWriter::new(File::create(path)?);
    let mut encoder = TiffEncoder::new(file)?;
    let mut image = encoder.new_image::<Gray32Float>(grid.width as u32, grid.height as u32)?;

    // Tie the top-left corner of the top-left pixel to its lon/lat.
    let half = grid.cell / 2.0;
    let pixel_scale = [grid.cell, grid.cell, 0.0];
    let tiepoint = [
        0.0,
        0.0,
        0.0,
        grid.origin_lon - half,
        grid.origin_lat + half,
        0.0,
    ];

    let directory = image.encoder();
    directory.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &pixel_scale[..])?;
    directory.write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])?;
    directory.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), &GEO_KEYS[..])?;
    directory.write_tag(Tag::Unknown(GDAL_NODATA), NODATA.to_string().as_str())?;

    let data: Vec<f32> = raster.values.iter().map(|v| v.unwrap_or(NODATA)).collect();
    image.write_data(&data)?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------
