// src/io/writer.rs
use anyhow::{ensure, Result};
use gdal::raster::{Buffer, GdalType, RasterCreationOptions};
use gdal::{DriverManager, Metadata};
use std::path::Path;

use crate::raster::{GeoInfo, Raster};
use crate::utils::fixed_point::to_fixed_point;

// below the clamped value range, so no valid pixel encodes to it
const NODATA_VALUE_INT: i16 = i16::MIN;
const NODATA_VALUE_FLOAT: f32 = -999.0;

/// Write an NDVI raster (baseline or anomaly) to a compressed, tiled GeoTIFF.
///
/// With `use_fixed_point` the values are stored as int16 multiplied by
/// `scale_factor`, and the band carries SCALE/OFFSET metadata so GDAL readers
/// recover the float values. Otherwise the band is float32. Masked pixels are
/// written as the band's nodata value in both cases.
pub fn write_raster(
    raster: &Raster,
    output_path: &Path,
    description: &str,
    use_fixed_point: bool,
    scale_factor: i32,
) -> Result<()> {
    if use_fixed_point {
        ensure!(scale_factor > 0, "scale factor must be positive, got {scale_factor}");
        let data = to_fixed_point(raster.data(), scale_factor, NODATA_VALUE_INT);
        let scale = format!("{}", 1.0 / f64::from(scale_factor));
        write_band(
            raster.geo(),
            data,
            output_path,
            &BandMeta {
                nodata: f64::from(NODATA_VALUE_INT),
                description: &format!("{description} (scaled by {scale_factor})"),
                scale: Some(&scale),
            },
        )
    } else {
        let data = raster
            .data()
            .iter()
            .map(|&v| if v.is_nan() { NODATA_VALUE_FLOAT } else { v })
            .collect();
        write_band(
            raster.geo(),
            data,
            output_path,
            &BandMeta {
                nodata: f64::from(NODATA_VALUE_FLOAT),
                description,
                scale: None,
            },
        )
    }
}

struct BandMeta<'a> {
    nodata: f64,
    description: &'a str,
    scale: Option<&'a str>,
}

fn write_band<T: GdalType + Copy>(
    geo: &GeoInfo,
    data: Vec<T>,
    output_path: &Path,
    meta: &BandMeta<'_>,
) -> Result<()> {
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let options =
        RasterCreationOptions::from_iter(["COMPRESS=DEFLATE", "TILED=YES", "NUM_THREADS=ALL_CPUS"]);
    let mut dataset = driver.create_with_band_type_with_options::<T, _>(
        output_path,
        geo.width,
        geo.height,
        1,
        &options,
    )?;

    // local test grids carry no CRS
    if !geo.projection.is_empty() {
        dataset.set_projection(&geo.projection)?;
    }
    dataset.set_geo_transform(&geo.geo_transform)?;

    let mut band = dataset.rasterband(1)?;
    band.set_no_data_value(Some(meta.nodata))?;
    band.set_description(meta.description)?;
    if let Some(scale) = meta.scale {
        band.set_metadata_item("SCALE", scale, "")?;
        band.set_metadata_item("OFFSET", "0", "")?;
    }

    let shape = (geo.width, geo.height);
    let mut buffer = Buffer::new(shape, data);
    band.write((0, 0), shape, &mut buffer)?;

    dataset.flush_cache()?;
    Ok(())
}
