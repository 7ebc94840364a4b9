use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::algorithm::coupling::AbsComponent;
use crate::data::peak_dim::PeakDim;
use crate::data::peak_list::ListId;
use crate::error::{PeakError, Result};

/// Address of a peak: list id plus peak id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeakRef {
    pub list: ListId,
    pub peak: i32,
}

impl PeakRef {
    pub fn new(list: ListId, peak: i32) -> Self {
        PeakRef { list, peak }
    }
}

/// Classification of a peak.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeakType {
    #[default]
    Compound,
    Minor,
    Solvent,
    Artifact,
    Impurity,
    ChemShiftRef,
    Qc,
    Unknown,
}

impl PeakType {
    pub const ALL: [PeakType; 8] = [
        PeakType::Compound,
        PeakType::Minor,
        PeakType::Solvent,
        PeakType::Artifact,
        PeakType::Impurity,
        PeakType::ChemShiftRef,
        PeakType::Qc,
        PeakType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PeakType::Compound => "compound",
            PeakType::Minor => "minor",
            PeakType::Solvent => "solvent",
            PeakType::Artifact => "artifact",
            PeakType::Impurity => "impurity",
            PeakType::ChemShiftRef => "chemshiftref",
            PeakType::Qc => "qc",
            PeakType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PeakType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PeakType {
    type Err = PeakError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        PeakType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| PeakError::InvalidArgument(format!("unknown peak type {}", s)))
    }
}

pub const N_FLAGS: usize = 16;

/// Up to 16 boolean flags, bit `i` is flag `i`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeakFlags(u16);

impl PeakFlags {
    pub fn get(&self, index: usize) -> bool {
        index < N_FLAGS && self.0 & (1 << index) != 0
    }

    pub fn set(&mut self, index: usize, value: bool) -> Result<()> {
        if index >= N_FLAGS {
            return Err(PeakError::InvalidArgument(format!("flag index {} out of range", index)));
        }
        if value {
            self.0 |= 1 << index;
        } else {
            self.0 &= !(1 << index);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// `"0"` when no flag is set, otherwise one `0`/`1` character per flag starting at flag 0.
impl fmt::Display for PeakFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "0");
        }
        for i in 0..N_FLAGS {
            write!(f, "{}", if self.get(i) { '1' } else { '0' })?;
        }
        Ok(())
    }
}

impl FromStr for PeakFlags {
    type Err = PeakError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() > N_FLAGS || s.is_empty() {
            return Err(PeakError::InvalidArgument(format!("invalid flag string '{}'", s)));
        }
        let mut flags = PeakFlags::default();
        for (i, ch) in s.chars().enumerate() {
            match ch {
                '0' => {}
                '1' => flags.set(i, true)?,
                _ => return Err(PeakError::InvalidArgument(format!("invalid flag string '{}'", s))),
            }
        }
        Ok(flags)
    }
}

/// Label placement relative to the peak: compass code or fractional position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Corner {
    Compass([char; 2]),
    Fractional { x: f64, y: f64 },
}

impl Default for Corner {
    fn default() -> Self {
        Corner::Compass(['n', 'e'])
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Corner::Compass([a, b]) => write!(f, "{}{}", a, b),
            Corner::Fractional { x, y } => write!(f, "{} {}", x, y),
        }
    }
}

impl FromStr for Corner {
    type Err = PeakError;

    fn from_str(s: &str) -> Result<Self> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        if tokens.len() == 2 {
            if let (Ok(x), Ok(y)) = (tokens[0].parse::<f64>(), tokens[1].parse::<f64>()) {
                return Ok(Corner::Fractional { x, y });
            }
        }
        let chars: Vec<char> = s.chars().collect();
        let valid_ns = |c: char| matches!(c, 'n' | 's' | ' ');
        let valid_ew = |c: char| matches!(c, 'e' | 'w' | ' ');
        match chars.as_slice() {
            [a] if valid_ns(*a) => Ok(Corner::Compass([*a, ' '])),
            [a] if valid_ew(*a) => Ok(Corner::Compass([' ', *a])),
            [a, b] if valid_ns(*a) && valid_ew(*b) => Ok(Corner::Compass([*a, *b])),
            _ => Err(PeakError::InvalidArgument(format!("invalid corner '{}'", s))),
        }
    }
}

/// An N-dimensional peak owned by a peak list.
///
/// `status` < 0 marks the peak deleted, 0 is free and >= 1 is claimed by
/// clustering or path tracking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    id: i32,
    pub status: i32,
    pub peak_type: PeakType,
    pub comment: String,
    pub flags: PeakFlags,
    pub figure_of_merit: f64,
    pub intensity: f64,
    pub intensity_err: Option<f64>,
    pub volume1: f64,
    pub volume1_err: Option<f64>,
    pub volume2: f64,
    pub volume2_err: Option<f64>,
    pub measures: Option<Vec<f64>>,
    pub color: Option<String>,
    pub corner: Corner,
    peak_dims: Vec<PeakDim>,
}

impl Peak {
    /// Creates an unnumbered peak from its dimensions; the owning list assigns the id.
    pub fn with_dims(peak_dims: Vec<PeakDim>) -> Self {
        Peak {
            id: -1,
            status: 0,
            peak_type: PeakType::default(),
            comment: String::new(),
            flags: PeakFlags::default(),
            figure_of_merit: 1.0,
            intensity: 0.0,
            intensity_err: None,
            volume1: 0.0,
            volume1_err: None,
            volume2: 0.0,
            volume2_err: None,
            measures: None,
            color: None,
            corner: Corner::default(),
            peak_dims,
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: i32) {
        self.id = id;
    }

    pub fn n_dim(&self) -> usize {
        self.peak_dims.len()
    }

    pub fn peak_dims(&self) -> &[PeakDim] {
        &self.peak_dims
    }

    pub fn peak_dim(&self, dim: usize) -> Option<&PeakDim> {
        self.peak_dims.get(dim)
    }

    pub fn peak_dim_mut(&mut self, dim: usize) -> Option<&mut PeakDim> {
        self.peak_dims.get_mut(dim)
    }

    pub(crate) fn peak_dims_mut(&mut self) -> &mut [PeakDim] {
        &mut self.peak_dims
    }

    pub fn is_deleted(&self) -> bool {
        self.status < 0
    }

    pub fn is_free(&self) -> bool {
        self.status == 0
    }

    pub fn delete(&mut self) {
        self.status = -1;
    }

    /// Shifts at `dims`, `None` if any of them is unset or out of range.
    pub fn position(&self, dims: &[usize]) -> Option<Vec<f64>> {
        dims.iter()
            .map(|&d| self.peak_dims.get(d).and_then(|pd| pd.chem_shift))
            .collect()
    }

    /// Component lines at dimension `dim`; an uncoupled dimension is a singlet of the peak's intensity.
    pub fn abs_components(&self, dim: usize, sf: f64) -> Vec<AbsComponent> {
        self.peak_dims
            .get(dim)
            .map(|pd| pd.abs_components(sf, self.intensity))
            .unwrap_or_default()
    }

    /// Fields needed to write the per-peak line of a peak file.
    pub fn record(&self) -> PeakRecord {
        PeakRecord {
            id: self.id,
            figure_of_merit: self.figure_of_merit,
            comment: self.comment.clone(),
            peak_type: self.peak_type.to_string(),
            status: self.status,
            color: self.color.clone(),
            flags: self.flags.to_string(),
            corner: self.corner.to_string(),
        }
    }
}

/// Flat view of a peak for external formatters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeakRecord {
    pub id: i32,
    pub figure_of_merit: f64,
    pub comment: String,
    pub peak_type: String,
    pub status: i32,
    pub color: Option<String>,
    pub flags: String,
    pub corner: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak_2d() -> Peak {
        let mut dims = vec![PeakDim::new(0, 0), PeakDim::new(1, 1)];
        dims[0].chem_shift = Some(8.1);
        dims[1].chem_shift = Some(121.4);
        Peak::with_dims(dims)
    }

    #[test]
    fn test_flags_display() {
        let mut flags = PeakFlags::default();
        assert_eq!(flags.to_string(), "0");
        flags.set(0, true).unwrap();
        flags.set(3, true).unwrap();
        assert_eq!(flags.to_string(), "1001000000000000");
        assert!(flags.set(16, true).is_err());

        let parsed: PeakFlags = "1001".parse().unwrap();
        assert!(parsed.get(0) && parsed.get(3) && !parsed.get(1));
        assert!("10x1".parse::<PeakFlags>().is_err());
    }

    #[test]
    fn test_corner_parse() {
        assert_eq!("ne".parse::<Corner>().unwrap(), Corner::Compass(['n', 'e']));
        assert_eq!("w".parse::<Corner>().unwrap(), Corner::Compass([' ', 'w']));
        assert_eq!(
            "0.25 0.75".parse::<Corner>().unwrap(),
            Corner::Fractional { x: 0.25, y: 0.75 }
        );
        assert!("en".parse::<Corner>().is_err());
        assert_eq!(Corner::default().to_string(), "ne");
    }

    #[test]
    fn test_peak_type_parse() {
        assert_eq!("Solvent".parse::<PeakType>().unwrap(), PeakType::Solvent);
        assert_eq!(PeakType::ChemShiftRef.to_string(), "chemshiftref");
        assert!("ghost".parse::<PeakType>().is_err());
    }

    #[test]
    fn test_position() {
        let mut peak = peak_2d();
        assert_eq!(peak.position(&[1, 0]), Some(vec![121.4, 8.1]));
        assert_eq!(peak.position(&[2]), None);
        peak.peak_dim_mut(1).unwrap().chem_shift = None;
        assert_eq!(peak.position(&[0, 1]), None);
    }

    #[test]
    fn test_singlet_carries_peak_intensity() {
        let mut peak = peak_2d();
        peak.intensity = 42.0;
        assert_eq!(peak.abs_components(0, 800.0), vec![AbsComponent { ppm: 8.1, amplitude: 42.0 }]);
        assert!(peak.abs_components(5, 800.0).is_empty());
    }

    #[test]
    fn test_delete_and_record() {
        let mut peak = peak_2d();
        peak.comment = "weak".to_string();
        peak.delete();
        assert!(peak.is_deleted());
        let rec = peak.record();
        assert_eq!(rec.status, -1);
        assert_eq!(rec.flags, "0");
        assert_eq!(rec.peak_type, "compound");
        assert_eq!(rec.corner, "ne");
        assert_eq!(rec.comment, "weak");
    }
}
