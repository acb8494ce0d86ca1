use crate::types::{CloudGridError, CloudGridResult, GranuleId, SwathPair};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default geolocation product (Aqua MODIS)
pub const DEFAULT_GEOLOCATION_PRODUCT: &str = "MYD03";

/// Default cloud product (Aqua MODIS)
pub const DEFAULT_CLOUD_MASK_PRODUCT: &str = "MYD06_L2";

/// Filename filter `<product>.<date_token>*.<extension>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPattern {
    /// Product short name, e.g. `MYD03`
    pub product: String,
    /// Leading part of the acquisition token, e.g. `A2008` or `A2008032`
    pub date_token: String,
    pub extension: String,
}

impl ProductPattern {
    pub fn new(product: &str, date_token: &str) -> Self {
        Self {
            product: product.to_string(),
            date_token: date_token.to_string(),
            extension: "hdf".to_string(),
        }
    }

    /// Geolocation files for a date token
    pub fn geolocation(date_token: &str) -> Self {
        Self::new(DEFAULT_GEOLOCATION_PRODUCT, date_token)
    }

    /// Cloud-mask files for a date token
    pub fn cloud_mask(date_token: &str) -> Self {
        Self::new(DEFAULT_CLOUD_MASK_PRODUCT, date_token)
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Anchored regex for this pattern; all parts match literally
    pub fn to_regex(&self) -> CloudGridResult<Regex> {
        let pattern = format!(
            r"^{}\.{}.*\.{}$",
            regex::escape(&self.product),
            regex::escape(&self.date_token),
            regex::escape(&self.extension)
        );
        Regex::new(&pattern).map_err(|e| CloudGridError::Processing(format!("Regex error: {}", e)))
    }
}

impl std::fmt::Display for ProductPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}*.{}", self.product, self.date_token, self.extension)
    }
}

/// Parse the `AYYYYDDD.HHMM` acquisition token out of a MODIS filename
pub fn parse_granule_id(file_name: &str) -> Option<GranuleId> {
    let re = Regex::new(r"\.A(\d{4})(\d{3})\.(\d{2})(\d{2})\.").ok()?;
    let caps = re.captures(file_name)?;

    Some(GranuleId {
        year: caps[1].parse().ok()?,
        day_of_year: caps[2].parse().ok()?,
        hour: caps[3].parse().ok()?,
        minute: caps[4].parse().ok()?,
    })
}

/// List files in `dir` matching `pattern`, sorted lexicographically
pub fn discover_files<P: AsRef<Path>>(
    dir: P,
    pattern: &ProductPattern,
) -> CloudGridResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let re = pattern.to_regex()?;

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if name.to_str().map_or(false, |n| re.is_match(n)) {
            files.push(entry.path());
        }
    }
    files.sort();

    log::info!("Found {} files matching {} in {}", files.len(), pattern, dir.display());
    Ok(files)
}

/// Pair geolocation and cloud-mask lists index by index.
///
/// Both lists must be non-empty and of equal length. When both names of a
/// pair carry an acquisition token, the tokens must agree.
pub fn pair_files(
    geolocation: Vec<PathBuf>,
    cloud_mask: Vec<PathBuf>,
) -> CloudGridResult<Vec<SwathPair>> {
    if geolocation.is_empty() || cloud_mask.is_empty() {
        return Err(CloudGridError::InputPairing(format!(
            "empty input list ({} geolocation files, {} cloud-mask files)",
            geolocation.len(),
            cloud_mask.len()
        )));
    }
    if geolocation.len() != cloud_mask.len() {
        return Err(CloudGridError::InputPairing(format!(
            "file lists differ in length: {} geolocation vs {} cloud-mask files",
            geolocation.len(),
            cloud_mask.len()
        )));
    }

    let granule = |p: &Path| p.file_name().and_then(|n| n.to_str()).and_then(parse_granule_id);

    let mut pairs = Vec::with_capacity(geolocation.len());
    for (index, (geo, mask)) in geolocation.into_iter().zip(cloud_mask).enumerate() {
        if let (Some(g), Some(m)) = (granule(&geo), granule(&mask)) {
            if g != m {
                return Err(CloudGridError::InputPairing(format!(
                    "pair {} mixes granules {} ({}) and {} ({})",
                    index,
                    g,
                    geo.display(),
                    m,
                    mask.display()
                )));
            }
        }
        pairs.push(SwathPair::new(geo, mask));
    }

    Ok(pairs)
}

/// Discover both product lists and pair them
pub fn discover_pairs<P: AsRef<Path>, Q: AsRef<Path>>(
    geolocation_dir: P,
    geolocation_pattern: &ProductPattern,
    cloud_mask_dir: Q,
    cloud_mask_pattern: &ProductPattern,
) -> CloudGridResult<Vec<SwathPair>> {
    let geolocation = discover_files(geolocation_dir, geolocation_pattern)?;
    let cloud_mask = discover_files(cloud_mask_dir, cloud_mask_pattern)?;
    pair_files(geolocation, cloud_mask)
}
