use serde::{Deserialize, Serialize};

use crate::algorithm::coupling::{AbsComponent, Coupling, RelComponent, Segment};

/// Fine structure attached to one peak dimension: a coupling plus an overall intensity scale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Multiplet {
    pub coupling: Coupling,
    pub intensity: f64,
}

impl Default for Multiplet {
    fn default() -> Self {
        Multiplet {
            coupling: Coupling::Singlet,
            intensity: 1.0,
        }
    }
}

impl Multiplet {
    pub fn new(coupling: Coupling, intensity: f64) -> Self {
        Multiplet { coupling, intensity }
    }

    pub fn is_coupled(&self) -> bool {
        self.coupling.is_coupled()
    }

    pub fn multiplicity(&self) -> String {
        self.coupling.multiplicity()
    }

    /// Lines relative to the center (Hz), amplitudes scaled by the multiplet intensity.
    pub fn rel_components(&self) -> Vec<RelComponent> {
        self.coupling
            .rel_components()
            .into_iter()
            .map(|c| RelComponent {
                offset: c.offset,
                amplitude: c.amplitude * self.intensity,
            })
            .collect()
    }

    /// Lines on the ppm axis around the owning dimension's shift.
    pub fn abs_components(&self, center_ppm: f64, sf: f64) -> Vec<AbsComponent> {
        self.coupling
            .abs_components(center_ppm, sf)
            .into_iter()
            .map(|c| AbsComponent {
                ppm: c.ppm,
                amplitude: c.amplitude * self.intensity,
            })
            .collect()
    }

    pub fn splitting_graph(&self) -> Vec<Segment> {
        self.coupling.splitting_graph()
    }
}
