use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use statrs::function::factorial::binomial;

use crate::error::{PeakError, Result};

/// One-letter multiplicity codes indexed by `n_splits - 1`; anything larger renders as `m`.
pub const COUPLING_CHARS: [char; 7] = ['s', 'd', 't', 'q', 'p', 'h', 'x'];

/// Offsets (Hz) closer to the parent line than this get no strong-coupling adjustment.
pub const STRONG_COUPLING_DEAD_ZONE: f64 = 0.01;

/// A single coupling: constant in Hz, strong-coupling sin²θ and splitting multiplicity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CouplingItem {
    pub coupling: f64,
    pub sin2theta: f64,
    pub n_splits: u32,
}

impl CouplingItem {
    pub fn new(coupling: f64, n_splits: u32) -> Self {
        CouplingItem { coupling, sin2theta: 0.0, n_splits }
    }

    pub fn with_sin2theta(coupling: f64, n_splits: u32, sin2theta: f64) -> Self {
        CouplingItem { coupling, sin2theta, n_splits }
    }

    pub fn code(&self) -> char {
        multiplicity_char(self.n_splits)
    }
}

pub fn multiplicity_char(n_splits: u32) -> char {
    let index = n_splits.saturating_sub(1) as usize;
    COUPLING_CHARS.get(index).copied().unwrap_or('m')
}

/// Row `n` of Pascal's triangle.
///
/// # Example
///
/// ```rust
/// # use nmrcore::algorithm::coupling::pascal_row;
/// assert_eq!(pascal_row(3), vec![1.0, 3.0, 3.0, 1.0]);
/// ```
pub fn pascal_row(n: u32) -> Vec<f64> {
    (0..=n as u64).map(|k| binomial(n as u64, k)).collect()
}

/// Line positions (Hz, relative to the multiplet center) and relative amplitudes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Splitting {
    pub freqs: Vec<f64>,
    pub amplitudes: Vec<f64>,
}

impl Splitting {
    fn parent() -> Self {
        Splitting { freqs: vec![0.0], amplitudes: vec![1.0] }
    }

    pub fn len(&self) -> usize {
        self.freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }
}

/// Every intermediate stage of a splitting, starting with the parent singlet.
///
/// Children of the same parent line appear consecutively, in parent order.
/// Items are applied in the order given; callers sort them by descending
/// coupling magnitude first.
pub fn split_cascade(items: &[CouplingItem]) -> Vec<Splitting> {
    let mut stages = vec![Splitting::parent()];
    for item in items {
        let n = item.n_splits.max(1);
        let row = pascal_row(n - 1);
        let prev = &stages[stages.len() - 1];
        let mut next = Splitting {
            freqs: Vec::with_capacity(prev.len() * n as usize),
            amplitudes: Vec::with_capacity(prev.len() * n as usize),
        };
        for (&freq, &amp) in prev.freqs.iter().zip(prev.amplitudes.iter()) {
            let mut offset = item.coupling * (n - 1) as f64 / 2.0;
            for coef in &row {
                let roof = if offset > STRONG_COUPLING_DEAD_ZONE {
                    1.0 - item.sin2theta
                } else if offset < -STRONG_COUPLING_DEAD_ZONE {
                    1.0 + item.sin2theta
                } else {
                    1.0
                };
                next.freqs.push(freq + offset);
                next.amplitudes.push(amp * coef * roof);
                offset -= item.coupling;
            }
        }
        stages.push(next);
    }
    stages
}

/// Splits a single line by each coupling item in turn.
///
/// The number of lines returned is the product of all `n_splits`. With no
/// items a single line of amplitude 1 at offset 0 is returned.
///
/// # Example
///
/// ```rust
/// # use nmrcore::algorithm::coupling::{j_splittings, CouplingItem};
/// let items = [CouplingItem::new(7.0, 2), CouplingItem::new(3.0, 2)];
/// let split = j_splittings(&items);
/// assert_eq!(split.freqs, vec![5.0, 2.0, -2.0, -5.0]);
/// assert_eq!(split.amplitudes, vec![1.0, 1.0, 1.0, 1.0]);
/// ```
pub fn j_splittings(items: &[CouplingItem]) -> Splitting {
    split_cascade(items).pop().unwrap_or_else(Splitting::parent)
}

/// A line position relative to the multiplet center, in Hz.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelComponent {
    pub offset: f64,
    pub amplitude: f64,
}

/// A line position on the ppm axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AbsComponent {
    pub ppm: f64,
    pub amplitude: f64,
}

/// A straight line of the splitting tree drawing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

/// Coupling items sorted by descending coupling magnitude.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CouplingPattern {
    items: Vec<CouplingItem>,
}

impl CouplingPattern {
    pub fn new(mut items: Vec<CouplingItem>) -> Result<Self> {
        for item in &items {
            if item.n_splits == 0 {
                return Err(PeakError::InvalidArgument("coupling multiplicity must be at least 1".to_string()));
            }
            if !item.coupling.is_finite() || !item.sin2theta.is_finite() {
                return Err(PeakError::InvalidArgument(format!("non-finite coupling {:?}", item)));
            }
        }
        items.sort_by(|a, b| b.coupling.abs().total_cmp(&a.coupling.abs()));
        Ok(CouplingPattern { items })
    }

    /// Builds a pattern from parallel arrays of couplings, multiplicities and sin²θ values.
    pub fn from_values(values: &[f64], n_splits: &[u32], sin2thetas: &[f64]) -> Result<Self> {
        if values.len() != n_splits.len() || values.len() != sin2thetas.len() {
            return Err(PeakError::InvalidArgument(format!(
                "coupling arrays differ in length: {} {} {}",
                values.len(),
                n_splits.len(),
                sin2thetas.len()
            )));
        }
        let items = values
            .iter()
            .zip(n_splits)
            .zip(sin2thetas)
            .map(|((&j, &n), &s)| CouplingItem::with_sin2theta(j, n, s))
            .collect();
        Self::new(items)
    }

    pub fn items(&self) -> &[CouplingItem] {
        &self.items
    }

    pub fn multiplicity(&self) -> String {
        self.items.iter().map(CouplingItem::code).collect()
    }

    /// `"<coupling> <n-1> <sin2theta>"` per item, two decimals, space joined.
    pub fn coupling_listing(&self) -> String {
        self.items
            .iter()
            .map(|item| format!("{:.2} {} {:.2}", item.coupling, item.n_splits - 1, item.sin2theta))
            .join(" ")
    }

    pub fn splitting(&self) -> Splitting {
        j_splittings(&self.items)
    }
}

/// Explicit relative line list, used when a multiplet is not a first-order pattern.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComplexCoupling {
    components: Vec<RelComponent>,
}

impl ComplexCoupling {
    pub fn new(components: Vec<RelComponent>) -> Result<Self> {
        if components.is_empty() {
            return Err(PeakError::InvalidArgument("complex coupling needs at least one component".to_string()));
        }
        Ok(ComplexCoupling { components })
    }

    /// Builds the relative line list from absolute line positions in ppm.
    pub fn from_abs(center_ppm: f64, sf: f64, lines: &[AbsComponent]) -> Result<Self> {
        if sf <= 0.0 {
            return Err(PeakError::InvalidArgument(format!("invalid spectrometer frequency {}", sf)));
        }
        let components = lines
            .iter()
            .map(|line| RelComponent {
                offset: (line.ppm - center_ppm) * sf,
                amplitude: line.amplitude,
            })
            .collect();
        Self::new(components)
    }

    pub fn components(&self) -> &[RelComponent] {
        &self.components
    }
}

/// Fine structure of a peak dimension.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Coupling {
    #[default]
    Singlet,
    Pattern(CouplingPattern),
    Complex(ComplexCoupling),
}

impl Coupling {
    /// Builds a coupling from a multiplicity code such as `"dt"` and one value per non-singlet letter.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use nmrcore::algorithm::coupling::Coupling;
    /// let c = Coupling::from_code("dt", &[7.0, 3.0]).unwrap();
    /// assert_eq!(c.multiplicity(), "dt");
    /// assert_eq!(c.rel_components().len(), 6);
    /// ```
    pub fn from_code(code: &str, values: &[f64]) -> Result<Self> {
        let mut n_splits = Vec::new();
        for ch in code.trim().chars() {
            match COUPLING_CHARS.iter().position(|&c| c == ch) {
                Some(0) => {}
                Some(index) => n_splits.push(index as u32 + 1),
                None => {
                    return Err(PeakError::InvalidArgument(format!(
                        "unsupported multiplicity code '{}' in '{}'",
                        ch, code
                    )))
                }
            }
        }
        if n_splits.len() != values.len() {
            return Err(PeakError::InvalidArgument(format!(
                "multiplicity '{}' needs {} couplings, got {}",
                code,
                n_splits.len(),
                values.len()
            )));
        }
        if n_splits.is_empty() {
            return Ok(Coupling::Singlet);
        }
        let sin2thetas = vec![0.0; values.len()];
        Ok(Coupling::Pattern(CouplingPattern::from_values(values, &n_splits, &sin2thetas)?))
    }

    pub fn is_coupled(&self) -> bool {
        matches!(self, Coupling::Pattern(_))
    }

    pub fn multiplicity(&self) -> String {
        match self {
            Coupling::Singlet => "s".to_string(),
            Coupling::Pattern(pattern) => pattern.multiplicity(),
            Coupling::Complex(_) => "m".to_string(),
        }
    }

    /// Coupling listing for first-order patterns, `None` otherwise.
    pub fn coupling_listing(&self) -> Option<String> {
        match self {
            Coupling::Pattern(pattern) => Some(pattern.coupling_listing()),
            _ => None,
        }
    }

    pub fn rel_components(&self) -> Vec<RelComponent> {
        match self {
            Coupling::Singlet => vec![RelComponent { offset: 0.0, amplitude: 1.0 }],
            Coupling::Pattern(pattern) => {
                let split = pattern.splitting();
                split
                    .freqs
                    .into_iter()
                    .zip(split.amplitudes)
                    .map(|(offset, amplitude)| RelComponent { offset, amplitude })
                    .collect()
            }
            Coupling::Complex(complex) => complex.components.clone(),
        }
    }

    /// Lines on the ppm axis around `center_ppm`; `sf` converts Hz offsets to ppm.
    pub fn abs_components(&self, center_ppm: f64, sf: f64) -> Vec<AbsComponent> {
        let scale = if sf > 0.0 { 1.0 / sf } else { 0.0 };
        self.rel_components()
            .into_iter()
            .map(|c| AbsComponent {
                ppm: center_ppm + c.offset * scale,
                amplitude: c.amplitude,
            })
            .collect()
    }

    /// Tree drawing of the splitting in Hz (x) against stage height (y).
    ///
    /// Every stage of a pattern sits one unit below its parent stage, the
    /// final lines drop from height 1 to 0. Singlets and complex couplings are
    /// drawn as plain sticks scaled to the largest amplitude.
    pub fn splitting_graph(&self) -> Vec<Segment> {
        match self {
            Coupling::Pattern(pattern) => {
                let stages = split_cascade(pattern.items());
                let depth = stages.len() as f64;
                let mut segments = Vec::new();
                for (level, pair) in stages.windows(2).enumerate() {
                    let (parents, children) = (&pair[0], &pair[1]);
                    let group = children.len() / parents.len().max(1);
                    let y_parent = depth - level as f64;
                    for (i, &x_parent) in parents.freqs.iter().enumerate() {
                        for &x_child in &children.freqs[i * group..(i + 1) * group] {
                            segments.push(Segment { x1: x_parent, y1: y_parent, x2: x_child, y2: y_parent - 1.0 });
                        }
                    }
                }
                if let Some(last) = stages.last() {
                    for &x in &last.freqs {
                        segments.push(Segment { x1: x, y1: 1.0, x2: x, y2: 0.0 });
                    }
                }
                segments
            }
            _ => {
                let components = self.rel_components();
                let max_amp = components.iter().map(|c| c.amplitude.abs()).fold(0.0, f64::max);
                components
                    .iter()
                    .map(|c| {
                        let height = if max_amp > 0.0 { c.amplitude / max_amp } else { 0.0 };
                        Segment { x1: c.offset, y1: 0.0, x2: c.offset, y2: height }
                    })
                    .collect()
            }
        }
    }
}

impl fmt::Display for Coupling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.coupling_listing() {
            Some(listing) => write!(f, "{} {}", self.multiplicity(), listing),
            None => write!(f, "{}", self.multiplicity()),
        }
    }
}
