use serde::{Deserialize, Serialize};

use nmrcore::data::peak::PeakRef;

/// A peak held by a path slot, with its distance to the path's first peak.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeakDistance {
    pub peak: PeakRef,
    pub distance: f64,
    /// Signed per-dimension differences to the first peak, in ppm.
    pub deltas: Vec<f64>,
}

/// Chain of peaks following one spin system through a series of lists.
///
/// Slot 0 always holds the defining peak of the first list; slot `i` holds at
/// most one peak of list `i`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeakPath {
    first_peak: PeakRef,
    peak_dists: Vec<Option<PeakDistance>>,
    pub confirmed: bool,
    pub active: bool,
    fit_pars: Option<Vec<f64>>,
    fit_errs: Option<Vec<f64>>,
}

impl PeakPath {
    pub fn new(first_peak: PeakRef, n_dims: usize, n_lists: usize) -> Self {
        let mut peak_dists = vec![None; n_lists.max(1)];
        peak_dists[0] = Some(PeakDistance { peak: first_peak, distance: 0.0, deltas: vec![0.0; n_dims] });
        PeakPath {
            first_peak,
            peak_dists,
            confirmed: false,
            active: true,
            fit_pars: None,
            fit_errs: None,
        }
    }

    pub fn first_peak(&self) -> PeakRef {
        self.first_peak
    }

    pub fn peak_dists(&self) -> &[Option<PeakDistance>] {
        &self.peak_dists
    }

    pub fn slot(&self, index: usize) -> Option<&PeakDistance> {
        self.peak_dists.get(index).and_then(Option::as_ref)
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> Option<&mut Option<PeakDistance>> {
        self.peak_dists.get_mut(index)
    }

    pub fn n_slots(&self) -> usize {
        self.peak_dists.len()
    }

    /// Peaks currently on the path, slot 0 included.
    pub fn peaks(&self) -> impl Iterator<Item = PeakRef> + '_ {
        self.peak_dists.iter().flatten().map(|pd| pd.peak)
    }

    pub fn contains(&self, peak: PeakRef) -> bool {
        self.peaks().any(|p| p == peak)
    }

    /// Largest distance to the first peak over the filled slots.
    pub fn radius(&self) -> f64 {
        self.peak_dists.iter().flatten().map(|pd| pd.distance).fold(0.0, f64::max)
    }

    /// True when every slot holds a peak.
    pub fn is_complete(&self) -> bool {
        self.peak_dists.iter().all(Option::is_some)
    }

    /// True when no slot past the first holds a peak.
    pub fn is_free(&self) -> bool {
        self.peak_dists.iter().skip(1).all(Option::is_none)
    }

    pub fn set_fit(&mut self, pars: Vec<f64>, errs: Vec<f64>) {
        self.fit_pars = Some(pars);
        self.fit_errs = Some(errs);
    }

    pub fn fit_pars(&self) -> Option<&[f64]> {
        self.fit_pars.as_deref()
    }

    pub fn fit_errs(&self) -> Option<&[f64]> {
        self.fit_errs.as_deref()
    }
}
