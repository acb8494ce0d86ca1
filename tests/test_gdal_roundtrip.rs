use approx::assert_relative_eq;
use cloudgrid::core::{cloud_fraction, AggregationParams, Aggregator, SwathSource};
use cloudgrid::io::{read_fraction_grid, write_fraction_grid, GdalSwathReader};
use cloudgrid::SwathPair;
use gdal::raster::{Buffer, GdalType};
use gdal::{Dataset, DriverManager};
use ndarray::{array, Array2};
use std::path::Path;
use tempfile::TempDir;

fn write_tiff<T: GdalType + Copy>(path: &Path, bands: &[Array2<T>]) {
    let driver = DriverManager::get_driver_by_name("GTiff").expect("GTiff driver missing");
    let (height, width) = bands[0].dim();
    let dataset = driver
        .create_with_band_type::<T, _>(path, width as isize, height as isize, bands.len() as isize)
        .expect("Failed to create test raster");

    for (i, data) in bands.iter().enumerate() {
        let mut band = dataset.rasterband(i as isize + 1).unwrap();
        let buffer = Buffer::new((width, height), data.iter().copied().collect());
        band.write((0, 0), (width, height), &buffer).unwrap();
    }
}

/// 2x3 swath written as plain GeoTIFFs: geolocation (lat, lon bands) and int16 mask
fn write_test_swath(dir: &Path) -> SwathPair {
    let latitude = array![[10.6, 10.9, -45.5], [90.0, -90.0, 0.0]];
    let longitude = array![[20.6, 20.9, 100.0], [-180.0, 180.0, 0.0]];
    // Signed bytes as stored in HDF4: -7 = 0b1111_1001 (cloudy), -1 = 0xFF (clear)
    let mask: Array2<i16> = array![[0, -7, 6], [2, 4, -1]];

    let geo_path = dir.join("MYD03.A2008001.0000.061.tif");
    let mask_path = dir.join("MYD06_L2.A2008001.0000.061.tif");
    write_tiff(&geo_path, &[latitude, longitude]);
    write_tiff(&mask_path, &[mask]);

    SwathPair::new(geo_path, mask_path)
}

#[test]
fn test_reader_decodes_plain_rasters() {
    let dir = TempDir::new().unwrap();
    let pair = write_test_swath(dir.path());

    let swath = GdalSwathReader::new().read_swath(&pair).unwrap();
    assert_eq!(swath.dim(), (2, 3));
    assert_relative_eq!(swath.latitude[[0, 2]], -45.5);
    assert_relative_eq!(swath.longitude[[1, 1]], 180.0);
    assert_eq!(swath.cloud_mask[[0, 1]], 0b1111_1001);
    assert_eq!(swath.cloud_mask[[1, 2]], 0xFF);
}

#[test]
fn test_aggregate_and_write_geotiff() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().unwrap();
    let pair = write_test_swath(dir.path());

    let aggregator = Aggregator::new(AggregationParams::default());
    let outcome = aggregator.run(&GdalSwathReader::new(), &[pair]).unwrap();
    let grids = &outcome.grids;

    assert_eq!(grids.total_pixels()[[100, 200]], 2);
    assert_eq!(grids.cloud_pixels()[[100, 200]], 2);
    assert_eq!(grids.total_pixels()[[44, 279]], 1);
    assert_eq!(grids.total_pixels()[[179, 0]], 1);
    assert_eq!(grids.total_pixels()[[0, 359]], 1);
    assert_eq!(grids.total_pixels()[[89, 179]], 1);
    // Only the -90 / -180 edges fall below the grid and clamp onto it
    assert_eq!(outcome.report.clamped_pixels, 2);
    assert_eq!(grids.cloud_observations(), 2);

    let fraction = cloud_fraction(grids);
    let out_path = dir.path().join("cloud_fraction.tif");
    write_fraction_grid(&fraction, &out_path).unwrap();

    let restored = read_fraction_grid(&out_path).unwrap();
    assert_eq!(restored.dim(), (180, 360));
    assert_relative_eq!(restored[[100, 200]], 1.0);
    assert_relative_eq!(restored[[44, 279]], 0.0);
    assert!(restored[[5, 5]].is_nan());

    // On disk the raster is north-up: grid row 100 is image line 79
    let dataset = Dataset::open(&out_path).unwrap();
    assert_eq!(dataset.geo_transform().unwrap(), [-180.0, 1.0, 0.0, 90.0, 0.0, -1.0]);
    let band = dataset.rasterband(1).unwrap();
    let north_up = band
        .read_as_array::<f64>((0, 0), (360, 180), (360, 180), None)
        .unwrap();
    assert_relative_eq!(north_up[[79, 200]], 1.0);
}

#[test]
fn test_netcdf_output_when_driver_available() {
    if DriverManager::get_driver_by_name("netCDF").is_err() {
        println!("netCDF driver not available, skipping test");
        return;
    }

    let dir = TempDir::new().unwrap();
    let mut fraction = Array2::from_elem((180, 360), f64::NAN);
    fraction[[120, 30]] = 0.25;

    let out_path = dir.path().join("cloud_fraction.nc");
    write_fraction_grid(&fraction, &out_path).unwrap();
    assert!(out_path.exists());

    let restored = read_fraction_grid(&out_path).unwrap();
    assert_relative_eq!(restored[[120, 30]], 0.25);
    assert!(restored[[0, 0]].is_nan());
}

#[test]
fn test_missing_file_is_gdal_error() {
    let pair = SwathPair::new("/nonexistent/MYD03.hdf", "/nonexistent/MYD06_L2.hdf");
    assert!(GdalSwathReader::new().read_swath(&pair).is_err());
}
