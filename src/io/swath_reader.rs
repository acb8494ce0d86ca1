use crate::core::aggregate::SwathSource;
use crate::core::cloud_mask::raw_byte_from_signed;
use crate::types::{CloudGridError, CloudGridResult, GeoPlane, MaskPlane, SwathData, SwathPair};
use gdal::{Dataset, Metadata};
use ndarray::{Array2, Zip};
use std::collections::BTreeMap;
use std::path::Path;

/// Reads MODIS geolocation and cloud-mask fields through GDAL
#[derive(Debug, Clone)]
pub struct GdalSwathReader {
    /// Latitude field in the geolocation product
    pub latitude_field: String,
    /// Longitude field in the geolocation product
    pub longitude_field: String,
    /// Cloud-mask field in the cloud product
    pub mask_field: String,
    /// 1-based band of the mask field holding the confidence byte.
    /// Cloud_Mask_1km is (along, across, byte); its first byte is band 1.
    pub mask_band: usize,
}

impl Default for GdalSwathReader {
    fn default() -> Self {
        Self {
            latitude_field: "Latitude".to_string(),
            longitude_field: "Longitude".to_string(),
            mask_field: "Cloud_Mask_1km".to_string(),
            mask_band: 1,
        }
    }
}

impl GdalSwathReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read latitude and longitude from a geolocation product
    pub fn read_geolocation<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> CloudGridResult<(GeoPlane, GeoPlane)> {
        let path = path.as_ref();
        let lat_name = resolve_field(path, &self.latitude_field)?;
        let lon_name = resolve_field(path, &self.longitude_field)?;

        // A plain raster (no subdatasets) carries latitude in band 1, longitude in band 2
        let lon_band = if lat_name == lon_name { 2 } else { 1 };
        let latitude = read_plane::<f64>(&lat_name, 1)?;
        let longitude = read_plane::<f64>(&lon_name, lon_band)?;

        if latitude.dim() != longitude.dim() {
            return Err(CloudGridError::ShapeMismatch {
                what: format!("longitude in {}", path.display()),
                expected: latitude.dim(),
                found: longitude.dim(),
            });
        }

        Ok((latitude, longitude))
    }

    /// Read the raw cloud-mask byte plane from a cloud product
    pub fn read_cloud_mask<P: AsRef<Path>>(&self, path: P) -> CloudGridResult<MaskPlane> {
        let name = resolve_field(path.as_ref(), &self.mask_field)?;
        // Stored as signed int8; widen losslessly, then keep the bit pattern
        let raw = read_plane::<i16>(&name, self.mask_band)?;

        #[cfg(feature = "parallel")]
        let mask = Zip::from(&raw).par_map_collect(|&v| raw_byte_from_signed(v));

        #[cfg(not(feature = "parallel"))]
        let mask = Zip::from(&raw).map_collect(|&v| raw_byte_from_signed(v));

        Ok(mask)
    }
}

impl SwathSource for GdalSwathReader {
    fn read_swath(&self, pair: &SwathPair) -> CloudGridResult<SwathData> {
        let start_time = std::time::Instant::now();
        let (latitude, longitude) = self.read_geolocation(&pair.geolocation)?;
        let cloud_mask = self.read_cloud_mask(&pair.cloud_mask)?;

        let (rows, cols) = latitude.dim();
        log::debug!(
            "Read {}x{} swath from {} in {:?}",
            rows,
            cols,
            pair.geolocation.display(),
            start_time.elapsed()
        );

        Ok(SwathData::new(latitude, longitude, cloud_mask))
    }
}

/// Pick the GDAL subdataset name carrying `field` from SUBDATASETS metadata.
///
/// HDF4-EOS names end in `:<field>`; plain HDF4 SDS names do not, so the
/// description (`[2030x1354] Latitude (32-bit floating-point)`) is checked
/// as a fallback.
pub fn find_subdataset(entries: &[String], field: &str) -> Option<String> {
    let mut names: BTreeMap<usize, String> = BTreeMap::new();
    let mut descs: BTreeMap<usize, String> = BTreeMap::new();

    for entry in entries {
        let Some((key, value)) = entry.split_once('=') else {
            continue;
        };
        let Some(rest) = key.strip_prefix("SUBDATASET_") else {
            continue;
        };
        if let Some(idx) = rest.strip_suffix("_NAME").and_then(|i| i.parse().ok()) {
            names.insert(idx, value.to_string());
        } else if let Some(idx) = rest.strip_suffix("_DESC").and_then(|i| i.parse().ok()) {
            descs.insert(idx, value.to_string());
        }
    }

    let suffix = format!(":{}", field);
    if let Some(name) = names.values().find(|n| n.ends_with(&suffix)) {
        return Some(name.clone());
    }

    descs
        .iter()
        .find(|(_, desc)| desc.split_whitespace().any(|word| word == field))
        .and_then(|(idx, _)| names.get(idx).cloned())
}

/// GDAL dataset name for `field` inside `path`
fn resolve_field(path: &Path, field: &str) -> CloudGridResult<String> {
    let dataset = Dataset::open(path)?;

    match dataset.metadata_domain("SUBDATASETS") {
        Some(entries) if !entries.is_empty() => find_subdataset(&entries, field).ok_or_else(|| {
            CloudGridError::InvalidFormat(format!(
                "field '{}' not found in {}",
                field,
                path.display()
            ))
        }),
        // Not a container: the file itself is the field
        _ => Ok(path.to_string_lossy().into_owned()),
    }
}

fn read_plane<T: Copy + gdal::raster::GdalType>(
    name: &str,
    band_index: usize,
) -> CloudGridResult<Array2<T>> {
    let dataset = Dataset::open(name)?;
    let band_count = dataset.raster_count();
    if band_index == 0 || band_index as isize > band_count {
        return Err(CloudGridError::InvalidFormat(format!(
            "band {} requested but {} has {} bands",
            band_index, name, band_count
        )));
    }

    let (width, height) = dataset.raster_size();
    let band = dataset.rasterband(band_index as isize)?;
    let data = band.read_as_array::<T>((0, 0), (width, height), (width, height), None)?;

    log::debug!("Read {} band {}: {}x{}", name, band_index, height, width);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_find_eos_swath_field() {
        let md = entries(&[
            r#"SUBDATASET_1_NAME=HDF4_EOS:EOS_SWATH:"MYD03.hdf":MODIS_Swath_Type_GEO:Latitude"#,
            "SUBDATASET_1_DESC=[2030x1354] Latitude MODIS_Swath_Type_GEO (32-bit floating-point)",
            r#"SUBDATASET_2_NAME=HDF4_EOS:EOS_SWATH:"MYD03.hdf":MODIS_Swath_Type_GEO:Longitude"#,
            "SUBDATASET_2_DESC=[2030x1354] Longitude MODIS_Swath_Type_GEO (32-bit floating-point)",
        ]);

        assert_eq!(
            find_subdataset(&md, "Longitude").unwrap(),
            r#"HDF4_EOS:EOS_SWATH:"MYD03.hdf":MODIS_Swath_Type_GEO:Longitude"#
        );
    }

    #[test]
    fn test_find_sds_field_by_description() {
        let md = entries(&[
            r#"SUBDATASET_1_NAME=HDF4_SDS:UNKNOWN:"MYD06_L2.hdf":0"#,
            "SUBDATASET_1_DESC=[406x270] Latitude (32-bit floating-point)",
            r#"SUBDATASET_11_NAME=HDF4_SDS:UNKNOWN:"MYD06_L2.hdf":10"#,
            "SUBDATASET_11_DESC=[2030x1354x2] Cloud_Mask_1km (8-bit integer)",
        ]);

        assert_eq!(
            find_subdataset(&md, "Cloud_Mask_1km").unwrap(),
            r#"HDF4_SDS:UNKNOWN:"MYD06_L2.hdf":10"#
        );
    }

    #[test]
    fn test_missing_field() {
        let md = entries(&[
            r#"SUBDATASET_1_NAME=HDF4_SDS:UNKNOWN:"x.hdf":0"#,
            "SUBDATASET_1_DESC=[10x10] Latitude_Extra (32-bit floating-point)",
        ]);
        assert!(find_subdataset(&md, "Latitude").is_none());
    }

    #[test]
    fn test_default_fields() {
        let reader = GdalSwathReader::new();
        assert_eq!(reader.latitude_field, "Latitude");
        assert_eq!(reader.mask_field, "Cloud_Mask_1km");
        assert_eq!(reader.mask_band, 1);
    }
}
