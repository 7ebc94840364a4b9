//! Path tracking of peaks across a series of conditions.
//!
//! A [`PeakPaths`] holds one [`PeakPath`] per peak of the first list and
//! fills the remaining slots with peaks of the later lists. A peak can sit
//! on one path at a time; its status is 1 while claimed and 0 when free.

use std::fmt;
use std::str::FromStr;

use log::{debug, info, warn};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use nmrcore::data::peak::PeakRef;
use nmrcore::data::peak_list::ListId;
use nmrcore::error::{PeakError, Result};
use nmrcore::session::Session;

use crate::path::input::PathInputRow;
use crate::path::peak_path::{PeakDistance, PeakPath};

/// Kind of series the lists were measured in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathMode {
    #[default]
    Titration,
    Pressure,
}

impl fmt::Display for PathMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathMode::Titration => write!(f, "titration"),
            PathMode::Pressure => write!(f, "pressure"),
        }
    }
}

impl FromStr for PathMode {
    type Err = PeakError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "titration" => Ok(PathMode::Titration),
            "pressure" => Ok(PathMode::Pressure),
            _ => Err(PeakError::InvalidArgument(format!("unknown path mode {}", s))),
        }
    }
}

/// Radius schedule for [`PeakPaths::extend_paths`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathSearchParams {
    /// Search radii in weighted distance units, tried smallest first.
    pub radii: Vec<f64>,
}

impl Default for PathSearchParams {
    fn default() -> Self {
        Self {
            radii: vec![0.05, 0.1, 0.2, 0.4],
        }
    }
}

/// Paths over an ordered series of peak lists.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeakPaths {
    pub name: String,
    list_ids: Vec<ListId>,
    x_values: Vec<[f64; 2]>,
    dims: Vec<usize>,
    weights: Vec<f64>,
    pub mode: PathMode,
    paths: Vec<PeakPath>,
}

impl PeakPaths {
    /// Creates an empty path set over `list_names`.
    ///
    /// # Arguments
    ///
    /// * `list_names` - the series, first list defines the paths.
    /// * `x_values` - `[x0, x1]` per list, e.g. ligand and protein concentration.
    /// * `dims` - peak dimensions compared between lists.
    /// * `weights` - divisor applied to the shift difference at each of `dims`.
    pub fn new(
        session: &Session,
        name: &str,
        list_names: &[&str],
        x_values: Vec<[f64; 2]>,
        dims: Vec<usize>,
        weights: Vec<f64>,
        mode: PathMode,
    ) -> Result<Self> {
        if list_names.is_empty() {
            return Err(PeakError::InvalidArgument("path set needs at least one list".to_string()));
        }
        if x_values.len() != list_names.len() {
            return Err(PeakError::DimensionMismatch { expected: list_names.len(), actual: x_values.len() });
        }
        if dims.is_empty() {
            return Err(PeakError::InvalidArgument("path set needs at least one dimension".to_string()));
        }
        if weights.len() != dims.len() {
            return Err(PeakError::DimensionMismatch { expected: dims.len(), actual: weights.len() });
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w <= 0.0) {
            return Err(PeakError::InvalidArgument(format!("invalid weight {}", w)));
        }
        let max_dim = dims.iter().copied().max().unwrap_or(0);
        let mut list_ids = Vec::with_capacity(list_names.len());
        for name in list_names {
            let list = session.list(name)?;
            if max_dim >= list.n_dim() {
                return Err(PeakError::DimensionMismatch { expected: list.n_dim(), actual: max_dim + 1 });
            }
            list_ids.push(list.id());
        }
        Ok(PeakPaths {
            name: name.to_string(),
            list_ids,
            x_values,
            dims,
            weights,
            mode,
            paths: Vec::new(),
        })
    }

    /// Creates a path set from parsed input rows.
    ///
    /// Each row's dataset is matched against the lists' dataset names, falling
    /// back to the list name.
    pub fn from_input(
        session: &Session,
        name: &str,
        rows: &[PathInputRow],
        dims: Vec<usize>,
        weights: Vec<f64>,
        mode: PathMode,
    ) -> Result<Self> {
        let mut list_names = Vec::with_capacity(rows.len());
        for row in rows {
            let list = session
                .lists()
                .find(|l| l.dataset_name.as_deref() == Some(row.dataset.as_str()))
                .or_else(|| session.lists().find(|l| l.name == row.dataset))
                .ok_or_else(|| PeakError::ListNotFound(row.dataset.clone()))?;
            list_names.push(list.name.as_str());
        }
        let x_values = rows.iter().map(|r| [r.x0, r.x1]).collect();
        Self::new(session, name, &list_names, x_values, dims, weights, mode)
    }

    pub fn list_ids(&self) -> &[ListId] {
        &self.list_ids
    }

    pub fn x_values(&self) -> &[[f64; 2]] {
        &self.x_values
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn paths(&self) -> &[PeakPath] {
        &self.paths
    }

    pub fn path(&self, index: usize) -> Option<&PeakPath> {
        self.paths.get(index)
    }

    pub fn path_mut(&mut self, index: usize) -> Option<&mut PeakPath> {
        self.paths.get_mut(index)
    }

    /// Index of the path holding `peak` in any slot.
    pub fn path_for_peak(&self, peak: PeakRef) -> Option<usize> {
        self.paths.iter().position(|p| p.contains(peak))
    }

    fn list_index(&self, list: ListId) -> Option<usize> {
        self.list_ids.iter().position(|&id| id == list)
    }

    /// Shift differences `p2 - p1` at the path dimensions, `None` if either lacks a shift.
    fn deltas(&self, session: &Session, p1: PeakRef, p2: PeakRef) -> Result<Option<Vec<f64>>> {
        let a = session.peak(p1)?.position(&self.dims);
        let b = session.peak(p2)?.position(&self.dims);
        Ok(a.zip(b).map(|(a, b)| b.iter().zip(&a).map(|(y, x)| y - x).collect()))
    }

    fn weighted_norm(&self, deltas: &[f64]) -> f64 {
        deltas
            .iter()
            .zip(&self.weights)
            .map(|(d, w)| (d / w).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Weighted Euclidean distance between two peaks over the path dimensions.
    ///
    /// Symmetric in its arguments. `None` when either peak lacks a shift.
    pub fn calc_distance(&self, session: &Session, p1: PeakRef, p2: PeakRef) -> Result<Option<f64>> {
        Ok(self.deltas(session, p1, p2)?.map(|d| self.weighted_norm(&d)))
    }

    fn peak_distance(&self, session: &Session, start: PeakRef, peak: PeakRef) -> Result<Option<PeakDistance>> {
        Ok(self.deltas(session, start, peak)?.map(|deltas| PeakDistance {
            peak,
            distance: self.weighted_norm(&deltas),
            deltas,
        }))
    }

    /// Free peaks of every list closer than `radius` to `start`, nearest first.
    ///
    /// Entry 0 holds only `start` itself at distance 0.
    pub fn get_near_peaks(&self, session: &Session, start: PeakRef, radius: f64) -> Result<Vec<Vec<PeakDistance>>> {
        if session.peak(start)?.position(&self.dims).is_none() {
            return Err(PeakError::InvalidArgument(format!(
                "peak {}.{} has no shift at a path dimension",
                start.list, start.peak
            )));
        }
        let mut near = Vec::with_capacity(self.list_ids.len());
        near.push(vec![PeakDistance { peak: start, distance: 0.0, deltas: vec![0.0; self.dims.len()] }]);
        for &list_id in self.list_ids.iter().skip(1) {
            let list = session
                .list_by_id(list_id)
                .ok_or_else(|| PeakError::ListNotFound(list_id.to_string()))?;
            let mut hits = Vec::new();
            for peak in list.active_peaks().filter(|p| p.is_free()) {
                let r = PeakRef::new(list_id, peak.id());
                if let Some(pd) = self.peak_distance(session, start, r)? {
                    if pd.distance < radius {
                        hits.push(pd);
                    }
                }
            }
            hits.sort_by_key(|pd| (OrderedFloat(pd.distance), pd.peak));
            near.push(hits);
        }
        Ok(near)
    }

    /// Releases every claimed peak and starts one path per positioned peak of the first list.
    ///
    /// Returns the number of paths.
    pub fn init_paths(&mut self, session: &mut Session) -> Result<usize> {
        self.clear(session)?;
        let first = self.list_ids[0];
        let list = session
            .list_by_id(first)
            .ok_or_else(|| PeakError::ListNotFound(first.to_string()))?;
        let n_slots = self.list_ids.len();
        self.paths = list
            .active_peaks()
            .filter(|p| p.position(&self.dims).is_some())
            .map(|p| PeakPath::new(PeakRef::new(first, p.id()), self.dims.len(), n_slots))
            .collect();
        debug!("{}: started {} paths", self.name, self.paths.len());
        Ok(self.paths.len())
    }

    /// Removes all paths, releasing the peaks they held.
    pub fn clear(&mut self, session: &mut Session) -> Result<()> {
        for path in &self.paths {
            for pd in path.peak_dists().iter().skip(1).flatten() {
                release(session, pd.peak)?;
            }
        }
        self.paths.clear();
        Ok(())
    }

    fn claimed_error(&self, session: &Session, peak: PeakRef) -> PeakError {
        let list = session
            .list_by_id(peak.list)
            .map(|l| l.name.clone())
            .unwrap_or_else(|| peak.list.to_string());
        PeakError::PeakClaimed { list, peak: peak.peak }
    }

    /// Puts `peak` on path `index`, in the slot of its list, and claims it.
    ///
    /// A peak already in that slot is released. Fails with
    /// [`PeakError::PeakClaimed`] when the peak is held elsewhere.
    pub fn add_peak(&mut self, session: &mut Session, index: usize, peak: PeakRef) -> Result<()> {
        let slot = self.slot_for(index, peak)?;
        let path = &self.paths[index];
        if path.slot(slot).map(|pd| pd.peak) == Some(peak) {
            return Ok(());
        }
        let target = session.peak(peak)?;
        if target.is_deleted() {
            return Err(PeakError::PeakNotFound { list: peak.list.to_string(), peak: peak.peak });
        }
        if !target.is_free() {
            return Err(self.claimed_error(session, peak));
        }
        let dist = self.peak_distance(session, path.first_peak(), peak)?.ok_or_else(|| {
            PeakError::InvalidArgument(format!("peak {}.{} has no shift at a path dimension", peak.list, peak.peak))
        })?;

        let previous = self.paths[index].slot(slot).map(|pd| pd.peak);
        if let Some(old) = previous {
            release(session, old)?;
        }
        session.set_status(peak, 1)?;
        if let Some(s) = self.paths[index].slot_mut(slot) {
            *s = Some(dist);
        }
        debug!("{}: path {} claimed {}.{}", self.name, index, peak.list, peak.peak);
        Ok(())
    }

    /// Takes `peak` off path `index` and releases it. Returns false if the path did not hold it.
    pub fn remove_peak(&mut self, session: &mut Session, index: usize, peak: PeakRef) -> Result<bool> {
        let slot = self.slot_for(index, peak)?;
        if self.paths[index].slot(slot).map(|pd| pd.peak) != Some(peak) {
            return Ok(false);
        }
        if let Some(s) = self.paths[index].slot_mut(slot) {
            *s = None;
        }
        release(session, peak)?;
        Ok(true)
    }

    fn slot_for(&self, index: usize, peak: PeakRef) -> Result<usize> {
        if index >= self.paths.len() {
            return Err(PeakError::InvalidArgument(format!("no path {}", index)));
        }
        match self.list_index(peak.list) {
            Some(0) => Err(PeakError::InvalidArgument("the first slot of a path is fixed".to_string())),
            Some(slot) => Ok(slot),
            None => Err(PeakError::InvalidArgument(format!("list {} is not part of {}", peak.list, self.name))),
        }
    }

    /// Recomputes every slot distance against the path's first peak.
    ///
    /// Slots whose peak lost its shift are emptied and the peaks released.
    /// Slots whose peak was deleted, or compressed out of its list, are
    /// emptied. A path whose first peak is gone is emptied and deactivated.
    pub fn refresh(&mut self, session: &mut Session) -> Result<()> {
        for index in 0..self.paths.len() {
            let first = self.paths[index].first_peak();
            if !is_live(session, first)? {
                warn!("{}: path {} lost its first peak {}.{}", self.name, index, first.list, first.peak);
                for slot in 1..self.paths[index].n_slots() {
                    if let Some(pd) = self.paths[index].slot_mut(slot).and_then(Option::take) {
                        release(session, pd.peak)?;
                    }
                }
                self.paths[index].active = false;
                continue;
            }
            for slot in 1..self.paths[index].n_slots() {
                let Some(peak) = self.paths[index].slot(slot).map(|pd| pd.peak) else {
                    continue;
                };
                let updated = if is_live(session, peak)? {
                    let updated = self.peak_distance(session, first, peak)?;
                    if updated.is_none() {
                        warn!("{}: path {} dropped {}.{} without position", self.name, index, peak.list, peak.peak);
                        release(session, peak)?;
                    }
                    updated
                } else {
                    debug!("{}: path {} dropped deleted peak {}.{}", self.name, index, peak.list, peak.peak);
                    None
                };
                if let Some(s) = self.paths[index].slot_mut(slot) {
                    *s = updated;
                }
            }
        }
        Ok(())
    }

    /// Fills empty slots greedily, trying each radius of `params` from the smallest up.
    ///
    /// At each radius all (path, slot, peak) candidates are ranked by distance
    /// and claimed nearest first; a peak or slot taken earlier in the pass is
    /// skipped. Confirmed and inactive paths are left alone. Returns the
    /// number of peaks claimed.
    pub fn extend_paths(&mut self, session: &mut Session, params: &PathSearchParams) -> Result<usize> {
        let mut radii = params.radii.clone();
        if let Some(r) = radii.iter().find(|r| !r.is_finite() || **r <= 0.0) {
            return Err(PeakError::InvalidArgument(format!("invalid radius {}", r)));
        }
        radii.sort_by_key(|r| OrderedFloat(*r));

        let mut claimed = 0;
        for radius in radii {
            let mut candidates: Vec<(OrderedFloat<f64>, usize, usize, PeakRef)> = Vec::new();
            for (index, path) in self.paths.iter().enumerate() {
                if !path.active || path.confirmed || path.is_complete() {
                    continue;
                }
                let near = match self.get_near_peaks(session, path.first_peak(), radius) {
                    Ok(near) => near,
                    Err(PeakError::InvalidArgument(_)) => continue,
                    Err(e) => return Err(e),
                };
                for (slot, hits) in near.into_iter().enumerate().skip(1) {
                    if path.slot(slot).is_some() {
                        continue;
                    }
                    candidates.extend(hits.into_iter().map(|h| (OrderedFloat(h.distance), index, slot, h.peak)));
                }
            }
            candidates.sort();

            let mut pass = 0;
            for (_, index, slot, peak) in candidates {
                if self.paths[index].slot(slot).is_some() || !session.peak(peak)?.is_free() {
                    continue;
                }
                self.add_peak(session, index, peak)?;
                pass += 1;
            }
            debug!("{}: radius {} claimed {} peaks", self.name, radius, pass);
            claimed += pass;
        }
        info!(
            "{}: {} peaks claimed, {} of {} paths complete",
            self.name,
            claimed,
            self.paths.iter().filter(|p| p.is_complete()).count(),
            self.paths.len()
        );
        Ok(claimed)
    }
}

/// False when `peak` is deleted or no longer in its list.
fn is_live(session: &Session, peak: PeakRef) -> Result<bool> {
    match session.peak(peak) {
        Ok(p) => Ok(!p.is_deleted()),
        Err(PeakError::PeakNotFound { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

fn release(session: &mut Session, peak: PeakRef) -> Result<()> {
    match session.peak(peak) {
        Ok(p) if p.is_deleted() => Ok(()),
        Ok(_) => session.set_status(peak, 0),
        Err(PeakError::PeakNotFound { .. }) => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nmrcore::data::spectral_dim::SpectralDim;

    fn series(peaks: &[&[(f64, f64)]]) -> Session {
        let mut session = Session::new();
        for (i, list) in peaks.iter().enumerate() {
            let name = format!("c{}", i);
            session
                .new_peak_list(
                    &name,
                    vec![
                        SpectralDim::new("H1", "1H", 8000.0, 800.0),
                        SpectralDim::new("N15", "15N", 2400.0, 80.0),
                    ],
                )
                .unwrap();
            for &(h, n) in *list {
                session.add_peak(&name, &[h, n]).unwrap();
            }
        }
        session
    }

    fn paths_over(session: &Session, n: usize, weights: Vec<f64>) -> PeakPaths {
        let names: Vec<String> = (0..n).map(|i| format!("c{}", i)).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let x = (0..n).map(|i| [i as f64, 100.0]).collect();
        PeakPaths::new(session, "titr", &names, x, vec![0, 1], weights, PathMode::Titration).unwrap()
    }

    #[test]
    fn test_new_validates() {
        let session = series(&[&[(8.0, 120.0)]]);
        assert!(PeakPaths::new(&session, "p", &["c0"], vec![], vec![0], vec![1.0], PathMode::Titration).is_err());
        assert!(PeakPaths::new(&session, "p", &["c0"], vec![[0.0, 1.0]], vec![0], vec![0.0], PathMode::Titration).is_err());
        assert!(PeakPaths::new(&session, "p", &["c0"], vec![[0.0, 1.0]], vec![2], vec![1.0], PathMode::Titration).is_err());
        assert!(PeakPaths::new(&session, "p", &["zz"], vec![[0.0, 1.0]], vec![0], vec![1.0], PathMode::Titration).is_err());
    }

    #[test]
    fn test_distance_is_symmetric_and_weighted() {
        let session = series(&[&[(8.0, 120.0)], &[(8.03, 120.4)]]);
        let paths = paths_over(&session, 2, vec![1.0, 5.0]);
        let (a, b) = (PeakRef::new(0, 0), PeakRef::new(1, 0));
        let d_ab = paths.calc_distance(&session, a, b).unwrap().unwrap();
        let d_ba = paths.calc_distance(&session, b, a).unwrap().unwrap();
        assert_eq!(d_ab, d_ba);
        let expected = (0.03f64.powi(2) + (0.4f64 / 5.0).powi(2)).sqrt();
        assert!((d_ab - expected).abs() < 1e-9);
    }

    #[test]
    fn test_near_peaks_sorted_and_free_only() {
        let mut session = series(&[&[(8.0, 120.0)], &[(8.05, 120.0), (8.01, 120.0), (9.0, 120.0)]]);
        let paths = paths_over(&session, 2, vec![1.0, 1.0]);
        let near = paths.get_near_peaks(&session, PeakRef::new(0, 0), 0.1).unwrap();
        assert_eq!(near[0].len(), 1);
        assert_eq!(near[0][0].distance, 0.0);
        let ids: Vec<i32> = near[1].iter().map(|pd| pd.peak.peak).collect();
        assert_eq!(ids, vec![1, 0]);

        session.set_status(PeakRef::new(1, 1), 1).unwrap();
        let near = paths.get_near_peaks(&session, PeakRef::new(0, 0), 0.1).unwrap();
        assert_eq!(near[1].len(), 1);
    }

    #[test]
    fn test_claims_are_exclusive() {
        let mut session = series(&[&[(8.0, 120.0), (8.1, 121.0)], &[(8.02, 120.1)]]);
        let mut paths = paths_over(&session, 2, vec![1.0, 1.0]);
        assert_eq!(paths.init_paths(&mut session).unwrap(), 2);

        let target = PeakRef::new(1, 0);
        paths.add_peak(&mut session, 0, target).unwrap();
        assert_eq!(session.peak(target).unwrap().status, 1);
        assert!(matches!(paths.add_peak(&mut session, 1, target), Err(PeakError::PeakClaimed { .. })));
        assert!(matches!(paths.add_peak(&mut session, 0, PeakRef::new(0, 1)), Err(PeakError::InvalidArgument(_))));

        assert!(paths.remove_peak(&mut session, 0, target).unwrap());
        assert!(!paths.remove_peak(&mut session, 0, target).unwrap());
        assert_eq!(session.peak(target).unwrap().status, 0);
        paths.add_peak(&mut session, 1, target).unwrap();
        assert_eq!(paths.path_for_peak(target), Some(1));
    }

    #[test]
    fn test_refresh_after_shift_edit() {
        let mut session = series(&[&[(8.0, 120.0)], &[(8.02, 120.0)]]);
        let mut paths = paths_over(&session, 2, vec![1.0, 1.0]);
        paths.init_paths(&mut session).unwrap();
        paths.add_peak(&mut session, 0, PeakRef::new(1, 0)).unwrap();

        session
            .set_chem_shift(nmrcore::data::peak_dim::PeakDimRef::new(0, 0, 0), 7.98)
            .unwrap();
        paths.refresh(&mut session).unwrap();
        let slot = paths.path(0).unwrap().slot(1).unwrap();
        assert!((slot.distance - 0.04).abs() < 1e-9);
        assert!((slot.deltas[0] - 0.04).abs() < 1e-9);
    }

    #[test]
    fn test_radius_follows_the_chain() {
        let mut session = series(&[&[(8.0, 120.0)], &[(8.01, 120.0)], &[(8.03, 120.0)]]);
        let mut paths = paths_over(&session, 3, vec![1.0, 1.0]);
        paths.init_paths(&mut session).unwrap();
        paths.add_peak(&mut session, 0, PeakRef::new(1, 0)).unwrap();
        paths.add_peak(&mut session, 0, PeakRef::new(2, 0)).unwrap();
        paths.refresh(&mut session).unwrap();
        assert!((paths.path(0).unwrap().radius() - 0.03).abs() < 1e-9);

        paths.remove_peak(&mut session, 0, PeakRef::new(2, 0)).unwrap();
        assert!((paths.path(0).unwrap().radius() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_refresh_drops_deleted_and_compressed_peaks() {
        let mut session = series(&[&[(8.0, 120.0), (8.3, 121.0)], &[(8.02, 120.0), (8.31, 121.0)]]);
        let mut paths = paths_over(&session, 2, vec![1.0, 1.0]);
        paths.init_paths(&mut session).unwrap();
        paths.add_peak(&mut session, 0, PeakRef::new(1, 0)).unwrap();
        paths.add_peak(&mut session, 1, PeakRef::new(1, 1)).unwrap();

        session.list_mut("c1").unwrap().delete_peak(0).unwrap();
        paths.refresh(&mut session).unwrap();
        assert!(paths.path(0).unwrap().slot(1).is_none());
        assert_eq!(paths.path(0).unwrap().radius(), 0.0);
        assert_eq!(session.peak(PeakRef::new(1, 0)).unwrap().status, -1);
        assert!(paths.path(1).unwrap().slot(1).is_some());

        session.list_mut("c1").unwrap().delete_peak(1).unwrap();
        session.compress("c1").unwrap();
        paths.refresh(&mut session).unwrap();
        assert!(paths.path(1).unwrap().slot(1).is_none());
        assert!(paths.paths().iter().all(PeakPath::is_free));
    }

    #[test]
    fn test_refresh_deactivates_path_without_first_peak() {
        let mut session = series(&[&[(8.0, 120.0)], &[(8.02, 120.0)]]);
        let mut paths = paths_over(&session, 2, vec![1.0, 1.0]);
        paths.init_paths(&mut session).unwrap();
        paths.add_peak(&mut session, 0, PeakRef::new(1, 0)).unwrap();

        session.list_mut("c0").unwrap().delete_peak(0).unwrap();
        paths.refresh(&mut session).unwrap();
        let path = paths.path(0).unwrap();
        assert!(!path.active);
        assert!(path.is_free());
        assert_eq!(session.peak(PeakRef::new(1, 0)).unwrap().status, 0);
    }

    #[test]
    fn test_extend_prefers_nearest_pair() {
        // both paths could take peak 0 of c1; the nearer path wins it
        let mut session = series(&[&[(8.0, 120.0), (8.06, 120.0)], &[(8.04, 120.0), (8.09, 120.0)]]);
        let mut paths = paths_over(&session, 2, vec![1.0, 1.0]);
        paths.init_paths(&mut session).unwrap();
        let claimed = paths
            .extend_paths(&mut session, &PathSearchParams { radii: vec![0.1, 0.05] })
            .unwrap();
        assert_eq!(claimed, 2);
        assert_eq!(paths.path(1).unwrap().slot(1).unwrap().peak, PeakRef::new(1, 0));
        assert_eq!(paths.path(0).unwrap().slot(1).unwrap().peak, PeakRef::new(1, 1));
        assert!((paths.path(0).unwrap().radius() - 0.09).abs() < 1e-9);
        assert!((paths.path(1).unwrap().radius() - 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_from_input_prefers_dataset_name() {
        let mut session = series(&[&[(8.0, 120.0)], &[(8.0, 120.0)]]);
        session.list_mut("c1").unwrap().dataset_name = Some("c0".to_string());
        let rows = vec![
            PathInputRow { dataset: "c0".to_string(), x0: 0.0, x1: 100.0 },
            PathInputRow { dataset: "c0".to_string(), x0: 1.0, x1: 100.0 },
        ];
        let paths = PeakPaths::from_input(&session, "p", &rows, vec![0], vec![1.0], PathMode::Pressure).unwrap();
        assert_eq!(paths.list_ids(), &[1, 1]);

        let rows = vec![PathInputRow { dataset: "nope".to_string(), x0: 0.0, x1: 100.0 }];
        assert!(matches!(
            PeakPaths::from_input(&session, "p", &rows, vec![0], vec![1.0], PathMode::Pressure),
            Err(PeakError::ListNotFound(_))
        ));
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("Pressure".parse::<PathMode>().unwrap(), PathMode::Pressure);
        assert_eq!(PathMode::default().to_string(), "titration");
        assert!("ph".parse::<PathMode>().is_err());
    }
}
