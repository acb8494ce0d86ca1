use crate::types::{CloudGridError, CloudGridResult, FractionGrid, GRID_COLS, GRID_ROWS};
use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::{s, Array2};
use std::path::Path;

/// North-up 1-degree global geotransform
pub const GLOBAL_GEO_TRANSFORM: [f64; 6] = [-180.0, 1.0, 0.0, 90.0, 0.0, -1.0];

/// GDAL driver used for an output path, chosen by extension
pub fn driver_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("tif") | Some("tiff") => "GTiff",
        _ => "netCDF",
    }
}

/// Persist the cloud fraction grid as a georeferenced raster.
///
/// Grid row 0 is the southernmost band, so rows are written flipped to give
/// a north-up image. Unobserved cells keep their NaN, which is also the
/// declared no-data value.
pub fn write_fraction_grid<P: AsRef<Path>>(
    fraction: &FractionGrid,
    output_path: P,
) -> CloudGridResult<()> {
    let path = output_path.as_ref();
    let (height, width) = fraction.dim();
    if (height, width) != (GRID_ROWS, GRID_COLS) {
        return Err(CloudGridError::ShapeMismatch {
            what: "cloud fraction grid".to_string(),
            expected: (GRID_ROWS, GRID_COLS),
            found: (height, width),
        });
    }

    let driver_name = driver_for_path(path);
    log::info!("Saving cloud fraction grid ({}): {}", driver_name, path.display());

    let driver = DriverManager::get_driver_by_name(driver_name)?;
    let mut dataset =
        driver.create_with_band_type::<f64, _>(path, width as isize, height as isize, 1)?;

    dataset.set_geo_transform(&GLOBAL_GEO_TRANSFORM)?;
    dataset.set_spatial_ref(&SpatialRef::from_epsg(4326)?)?;
    dataset.set_metadata_item(
        "title",
        "Level 3 cloud fraction aggregated from MODIS Cloud_Mask_1km",
        "",
    )?;
    dataset.set_metadata_item("grid_resolution", "1 degree", "")?;

    let flat_data: Vec<f64> = fraction.slice(s![..;-1, ..]).iter().copied().collect();
    let buffer = Buffer::new((width, height), flat_data);

    let mut rasterband = dataset.rasterband(1)?;
    rasterband.write((0, 0), (width, height), &buffer)?;
    rasterband.set_no_data_value(Some(f64::NAN))?;
    rasterband.set_metadata_item("long_name", "cloud_fraction", "")?;
    rasterband.set_metadata_item("units", "1", "")?;

    log::info!("Cloud fraction grid saved");
    Ok(())
}

/// Read a grid written by `write_fraction_grid` back into grid orientation
pub fn read_fraction_grid<P: AsRef<Path>>(path: P) -> CloudGridResult<FractionGrid> {
    let dataset = Dataset::open(path.as_ref())?;
    let (width, height) = dataset.raster_size();
    if (height, width) != (GRID_ROWS, GRID_COLS) {
        return Err(CloudGridError::ShapeMismatch {
            what: format!("raster {}", path.as_ref().display()),
            expected: (GRID_ROWS, GRID_COLS),
            found: (height, width),
        });
    }

    let band = dataset.rasterband(1)?;
    let north_up: Array2<f64> =
        band.read_as_array::<f64>((0, 0), (width, height), (width, height), None)?;
    Ok(north_up.slice(s![..;-1, ..]).to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_selection() {
        assert_eq!(driver_for_path(Path::new("out/cf.tif")), "GTiff");
        assert_eq!(driver_for_path(Path::new("out/cf.TIFF")), "GTiff");
        assert_eq!(driver_for_path(Path::new("out/cf.nc")), "netCDF");
        assert_eq!(driver_for_path(Path::new("out/cf.hdf")), "netCDF");
        assert_eq!(driver_for_path(Path::new("out/cf")), "netCDF");
    }

    #[test]
    fn test_rejects_wrong_shape() {
        let grid = FractionGrid::zeros((10, 10));
        let err = write_fraction_grid(&grid, "/nonexistent/cf.tif").unwrap_err();
        assert!(matches!(err, CloudGridError::ShapeMismatch { .. }));
    }
}
