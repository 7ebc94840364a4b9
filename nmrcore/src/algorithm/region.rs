use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PeakError, Result};

/// How a region is reduced to a single value by the analyzer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasureMode {
    Center,
    Jitter,
    Max,
    Min,
    Extreme,
    Volume,
    EVolume,
    TVolume,
}

impl MeasureMode {
    /// Volume-type modes fill the volume fields, the rest fill intensity.
    pub fn is_volume(&self) -> bool {
        matches!(self, MeasureMode::Volume | MeasureMode::EVolume | MeasureMode::TVolume)
    }
}

impl FromStr for MeasureMode {
    type Err = PeakError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "center" => Ok(MeasureMode::Center),
            "jitter" => Ok(MeasureMode::Jitter),
            "max" => Ok(MeasureMode::Max),
            "min" => Ok(MeasureMode::Min),
            "extreme" => Ok(MeasureMode::Extreme),
            "volume" => Ok(MeasureMode::Volume),
            "evolume" => Ok(MeasureMode::EVolume),
            "tvolume" => Ok(MeasureMode::TVolume),
            _ => Err(PeakError::InvalidArgument(format!("unknown measure mode {}", s))),
        }
    }
}

impl fmt::Display for MeasureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MeasureMode::Center => "center",
            MeasureMode::Jitter => "jitter",
            MeasureMode::Max => "max",
            MeasureMode::Min => "min",
            MeasureMode::Extreme => "extreme",
            MeasureMode::Volume => "volume",
            MeasureMode::EVolume => "evolume",
            MeasureMode::TVolume => "tvolume",
        };
        write!(f, "{}", name)
    }
}

/// Box in ppm around a peak, one `(lower, upper)` pair per dimension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub center: Vec<f64>,
    pub limits: Vec<(f64, f64)>,
}

/// A value measured over a region together with its uncertainty.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub error: f64,
}

/// Dataset access used to quantify peaks. Implemented outside this crate.
pub trait RegionAnalyzer {
    fn measure(&self, region: &Region, mode: MeasureMode) -> Result<Measurement>;
    fn noise_level(&self) -> f64;
}
