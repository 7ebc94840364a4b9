use serde::{Deserialize, Serialize};

use crate::error::{PeakError, Result};

/// Per-dimension metadata shared by every peak of a list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpectralDim {
    pub name: String,
    pub nucleus: String,
    /// Spectral width in Hz.
    pub sw: f64,
    /// Spectrometer frequency in MHz.
    pub sf: f64,
}

impl SpectralDim {
    pub fn new(name: &str, nucleus: &str, sw: f64, sf: f64) -> Self {
        SpectralDim {
            name: name.to_string(),
            nucleus: nucleus.to_string(),
            sw,
            sf,
        }
    }

    /// Spectral width in ppm.
    pub fn sw_ppm(&self) -> f64 {
        if self.sf > 0.0 {
            self.sw / self.sf
        } else {
            self.sw
        }
    }

    /// Converts a width in ppm to Hz.
    pub fn ppm_to_hz(&self, ppm: f64) -> f64 {
        ppm * self.sf
    }

    pub fn hz_to_ppm(&self, hz: f64) -> f64 {
        if self.sf > 0.0 {
            hz / self.sf
        } else {
            hz
        }
    }
}

/// A dimension taking part in nearest-neighbour search, with its tolerance in ppm.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchDim {
    pub dim: usize,
    pub tol: f64,
}

impl SearchDim {
    pub fn new(dim: usize, tol: f64) -> Self {
        SearchDim { dim, tol }
    }
}

/// Parses `"<dimName> <tol> [<dimName> <tol> ...]"` against the list's dimensions.
///
/// # Example
///
/// ```rust
/// # use nmrcore::data::spectral_dim::{parse_search_dims, SpectralDim};
/// let dims = vec![
///     SpectralDim::new("H1", "1H", 8000.0, 800.0),
///     SpectralDim::new("N15", "15N", 2400.0, 81.0),
/// ];
/// let search = parse_search_dims("H1 0.02 N15 0.2", &dims).unwrap();
/// assert_eq!(search.len(), 2);
/// assert_eq!(search[1].dim, 1);
/// ```
pub fn parse_search_dims(spec: &str, dims: &[SpectralDim]) -> Result<Vec<SearchDim>> {
    let tokens: Vec<&str> = spec.split_whitespace().collect();
    if tokens.is_empty() || tokens.len() % 2 != 0 {
        return Err(PeakError::InvalidArgument(format!(
            "search dims must be name/tolerance pairs: '{}'",
            spec
        )));
    }

    tokens
        .chunks_exact(2)
        .map(|pair| {
            let dim = dims
                .iter()
                .position(|d| d.name == pair[0])
                .ok_or_else(|| PeakError::InvalidArgument(format!("unknown dimension {}", pair[0])))?;
            let tol: f64 = pair[1]
                .parse()
                .map_err(|_| PeakError::InvalidArgument(format!("invalid tolerance {}", pair[1])))?;
            Ok(SearchDim::new(dim, tol))
        })
        .collect()
}
