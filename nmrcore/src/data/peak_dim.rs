use std::fmt;

use serde::{Deserialize, Serialize};

use crate::algorithm::coupling::{AbsComponent, Coupling};
use crate::algorithm::multiplet::Multiplet;
use crate::data::peak_list::ListId;
use crate::data::resonance::{ResonanceId, ResonanceRegistry};

/// Address of one peak dimension: list id, peak id and dimension index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeakDimRef {
    pub list: ListId,
    pub peak: i32,
    pub dim: usize,
}

impl PeakDimRef {
    pub fn new(list: ListId, peak: i32, dim: usize) -> Self {
        PeakDimRef { list, peak, dim }
    }
}

impl fmt::Display for PeakDimRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.list, self.peak, self.dim)
    }
}

/// One spectral dimension of a peak.
///
/// Positions, widths and bounds are in ppm. The resonance id is always set;
/// it is rewritten in place whenever resonances are merged or split.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeakDim {
    spectral_dim: usize,
    resonance: ResonanceId,
    pub chem_shift: Option<f64>,
    pub chem_shift_err: Option<f64>,
    pub line_width: f64,
    pub line_width_err: Option<f64>,
    pub bounds: f64,
    pub bounds_err: Option<f64>,
    pub phase: f64,
    pub phase_err: Option<f64>,
    pub decay_rate: f64,
    pub decay_rate_err: Option<f64>,
    pub frozen: bool,
    pub user: String,
    pub error: [char; 2],
    pub multiplet: Option<Multiplet>,
}

impl PeakDim {
    pub fn new(spectral_dim: usize, resonance: ResonanceId) -> Self {
        PeakDim {
            spectral_dim,
            resonance,
            chem_shift: None,
            chem_shift_err: None,
            line_width: 0.0,
            line_width_err: None,
            bounds: 0.0,
            bounds_err: None,
            phase: 0.0,
            phase_err: None,
            decay_rate: 0.0,
            decay_rate_err: None,
            frozen: false,
            user: String::new(),
            error: ['+', '+'],
            multiplet: None,
        }
    }

    pub fn spectral_dim(&self) -> usize {
        self.spectral_dim
    }

    pub fn resonance(&self) -> ResonanceId {
        self.resonance
    }

    pub(crate) fn set_resonance(&mut self, resonance: ResonanceId) {
        self.resonance = resonance;
    }

    pub fn error_code(&self) -> String {
        self.error.iter().collect()
    }

    /// Attaches a coupling, keeping the current multiplet intensity if there is one.
    pub fn set_coupling(&mut self, coupling: Coupling) {
        match self.multiplet.as_mut() {
            Some(multiplet) => multiplet.coupling = coupling,
            None => self.multiplet = Some(Multiplet::new(coupling, 1.0)),
        }
    }

    pub fn multiplicity(&self) -> Option<String> {
        self.multiplet.as_ref().map(Multiplet::multiplicity)
    }

    /// Component lines of the multiplet on the ppm axis.
    ///
    /// Without a multiplet the dimension is a singlet at its own shift carrying
    /// `intensity`, the owning peak's intensity; without a shift there are no lines.
    pub fn abs_components(&self, sf: f64, intensity: f64) -> Vec<AbsComponent> {
        let Some(shift) = self.chem_shift else {
            return Vec::new();
        };
        match &self.multiplet {
            Some(multiplet) => multiplet.abs_components(shift, sf),
            None => vec![AbsComponent { ppm: shift, amplitude: intensity }],
        }
    }

    /// Fields needed to write one per-dimension line of a peak file.
    pub fn record(&self, registry: &ResonanceRegistry) -> DimRecord {
        let label = registry.get(self.resonance).map(|r| r.label()).unwrap_or_default();
        let (multiplicity, couplings) = match &self.multiplet {
            Some(m) => (m.multiplicity(), m.coupling.coupling_listing()),
            None => (String::new(), None),
        };
        DimRecord {
            label,
            shift: self.chem_shift,
            width: self.line_width,
            bounds: self.bounds,
            error: self.error_code(),
            multiplicity,
            couplings,
            frozen: u8::from(self.frozen),
            resonances: vec![self.resonance],
        }
    }
}

/// Flat view of a peak dimension for external formatters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DimRecord {
    pub label: String,
    pub shift: Option<f64>,
    pub width: f64,
    pub bounds: f64,
    pub error: String,
    pub multiplicity: String,
    pub couplings: Option<String>,
    pub frozen: u8,
    pub resonances: Vec<ResonanceId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_dim_defaults() {
        let dim = PeakDim::new(1, 7);
        assert_eq!(dim.spectral_dim(), 1);
        assert_eq!(dim.resonance(), 7);
        assert_eq!(dim.error_code(), "++");
        assert!(dim.multiplicity().is_none());
    }

    #[test]
    fn test_abs_components_without_multiplet() {
        let mut dim = PeakDim::new(0, 0);
        assert!(dim.abs_components(600.0, 2.5).is_empty());
        dim.chem_shift = Some(3.5);
        assert_eq!(dim.abs_components(600.0, 2.5), vec![AbsComponent { ppm: 3.5, amplitude: 2.5 }]);
    }

    #[test]
    fn test_set_coupling_keeps_intensity() {
        let mut dim = PeakDim::new(0, 0);
        dim.multiplet = Some(Multiplet::new(Coupling::Singlet, 3.0));
        dim.set_coupling(Coupling::from_code("d", &[8.0]).unwrap());
        let m = dim.multiplet.as_ref().unwrap();
        assert_eq!(m.intensity, 3.0);
        assert_eq!(dim.multiplicity().unwrap(), "d");
    }

    #[test]
    fn test_record() {
        let mut reg = ResonanceRegistry::new();
        let id = reg.build();
        reg.get_mut(id).unwrap().set_label("HN 12");
        let mut dim = PeakDim::new(0, id);
        dim.chem_shift = Some(8.25);
        dim.line_width = 0.02;
        dim.frozen = true;
        dim.set_coupling(Coupling::from_code("d", &[9.0]).unwrap());

        let rec = dim.record(&reg);
        assert_eq!(rec.label, "HN 12");
        assert_eq!(rec.frozen, 1);
        assert_eq!(rec.multiplicity, "d");
        assert_eq!(rec.couplings.as_deref(), Some("9.00 1 0.00"));
        assert_eq!(rec.resonances, vec![id]);
    }
}
