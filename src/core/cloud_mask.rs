use serde::{Deserialize, Serialize};

/// Bits 1-2 of the first Cloud_Mask_1km byte hold the confidence code
pub const CONFIDENCE_MASK: u8 = 0b0000_0110;

/// Cloud-mask confidence levels encoded in the MOD35/MYD35 bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CloudConfidence {
    /// Code 0
    ConfidentCloudy,
    /// Code 1
    ProbablyCloudy,
    /// Code 2
    ProbablyClear,
    /// Code 3
    ConfidentClear,
}

impl CloudConfidence {
    /// Map a 2-bit code to its confidence level; only the low two bits are used
    pub fn from_code(code: u8) -> Self {
        match code & 0b11 {
            0 => CloudConfidence::ConfidentCloudy,
            1 => CloudConfidence::ProbablyCloudy,
            2 => CloudConfidence::ProbablyClear,
            _ => CloudConfidence::ConfidentClear,
        }
    }
}

impl std::fmt::Display for CloudConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloudConfidence::ConfidentCloudy => write!(f, "confident cloudy"),
            CloudConfidence::ProbablyCloudy => write!(f, "probably cloudy"),
            CloudConfidence::ProbablyClear => write!(f, "probably clear"),
            CloudConfidence::ConfidentClear => write!(f, "confident clear"),
        }
    }
}

/// Extract the 2-bit confidence code from a raw cloud-mask byte
#[inline]
pub fn decode_cloud_confidence(raw_byte: u8) -> u8 {
    (raw_byte & CONFIDENCE_MASK) >> 1
}

/// Only confident cloudy (code 0) counts as cloudy
#[inline]
pub fn is_cloudy(code: u8) -> bool {
    code == 0
}

/// Reinterpret a signed HDF4 int8 value as its raw byte
#[inline]
pub fn raw_byte_from_signed(value: i16) -> u8 {
    value as u8
}
