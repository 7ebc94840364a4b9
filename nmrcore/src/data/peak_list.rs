use std::cell::OnceCell;
use std::cmp::Ordering;
use std::collections::HashMap;

use log::debug;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::algorithm::fold::fold_shift;
use crate::algorithm::region::{MeasureMode, Region, RegionAnalyzer};
use crate::data::peak::Peak;
use crate::data::peak_dim::{PeakDim, PeakDimRef};
use crate::data::resonance::ResonanceRegistry;
use crate::data::spectral_dim::{parse_search_dims, SearchDim, SpectralDim};
use crate::error::{PeakError, Result};

/// Stable id of a peak list inside a session.
pub type ListId = u32;

/// Change markers for observers; they batch notifications and carry no ordering guarantees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirtyFlags {
    pub peak_changed: bool,
    pub list_changed: bool,
    pub count_changed: bool,
}

impl DirtyFlags {
    pub fn any(&self) -> bool {
        self.peak_changed || self.list_changed || self.count_changed
    }
}

/// Ordered collection of peaks sharing one set of spectral dimensions.
///
/// Peak ids are assigned in increasing order and stay fixed until
/// [`PeakList::renumber`]. Deleted peaks (status < 0) stay in the list until
/// [`PeakList::compress`]. The id-to-position index is rebuilt lazily after
/// any change of membership or order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeakList {
    id: ListId,
    pub name: String,
    pub dataset_name: Option<String>,
    spectral_dims: Vec<SpectralDim>,
    pub scale: f64,
    search_dims: Vec<SearchDim>,
    pub sample_label: String,
    pub sample_condition_label: String,
    pub slideable: bool,
    peaks: Vec<Peak>,
    next_peak_id: i32,
    #[serde(skip)]
    index: OnceCell<HashMap<i32, usize>>,
    #[serde(skip)]
    dirty: DirtyFlags,
}

impl PeakList {
    pub fn new(id: ListId, name: &str, spectral_dims: Vec<SpectralDim>) -> Self {
        PeakList {
            id,
            name: name.to_string(),
            dataset_name: None,
            spectral_dims,
            scale: 1.0,
            search_dims: Vec::new(),
            sample_label: String::new(),
            sample_condition_label: String::new(),
            slideable: false,
            peaks: Vec::new(),
            next_peak_id: 0,
            index: OnceCell::new(),
            dirty: DirtyFlags::default(),
        }
    }

    pub fn id(&self) -> ListId {
        self.id
    }

    pub fn n_dim(&self) -> usize {
        self.spectral_dims.len()
    }

    pub fn spectral_dims(&self) -> &[SpectralDim] {
        &self.spectral_dims
    }

    pub fn spectral_dim(&self, dim: usize) -> Option<&SpectralDim> {
        self.spectral_dims.get(dim)
    }

    /// Index of the dimension called `name`.
    pub fn dim_index(&self, name: &str) -> Option<usize> {
        self.spectral_dims.iter().position(|d| d.name == name)
    }

    pub fn search_dims(&self) -> &[SearchDim] {
        &self.search_dims
    }

    pub fn set_search_dims(&mut self, search_dims: Vec<SearchDim>) -> Result<()> {
        for sd in &search_dims {
            if sd.dim >= self.n_dim() {
                return Err(PeakError::DimensionMismatch { expected: self.n_dim(), actual: sd.dim + 1 });
            }
            if !sd.tol.is_finite() || sd.tol < 0.0 {
                return Err(PeakError::InvalidArgument(format!("invalid tolerance {}", sd.tol)));
            }
        }
        self.search_dims = search_dims;
        self.dirty.list_changed = true;
        Ok(())
    }

    /// Configures search dims from `"<dimName> <tol> ..."`.
    pub fn set_search_dims_str(&mut self, spec: &str) -> Result<()> {
        let search_dims = parse_search_dims(spec, &self.spectral_dims)?;
        self.set_search_dims(search_dims)
    }

    pub fn clear_search_dims(&mut self) {
        self.search_dims.clear();
    }

    /// Number of peaks including deleted ones.
    pub fn size(&self) -> usize {
        self.peaks.len()
    }

    pub fn count_active(&self) -> usize {
        self.peaks.iter().filter(|p| !p.is_deleted()).count()
    }

    /// All peaks in list order, deleted ones included.
    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    pub fn active_peaks(&self) -> impl Iterator<Item = &Peak> {
        self.peaks.iter().filter(|p| !p.is_deleted())
    }

    pub(crate) fn peaks_mut(&mut self) -> &mut [Peak] {
        self.dirty.peak_changed = true;
        &mut self.peaks
    }

    fn index_of(&self, id: i32) -> Option<usize> {
        self.index
            .get_or_init(|| self.peaks.iter().enumerate().map(|(i, p)| (p.id(), i)).collect())
            .get(&id)
            .copied()
    }

    fn invalidate_index(&mut self) {
        self.index = OnceCell::new();
    }

    pub fn peak(&self, id: i32) -> Option<&Peak> {
        self.index_of(id).map(|i| &self.peaks[i])
    }

    pub fn peak_mut(&mut self, id: i32) -> Option<&mut Peak> {
        let i = self.index_of(id)?;
        self.dirty.peak_changed = true;
        self.peaks.get_mut(i)
    }

    pub fn peak_dim(&self, r: PeakDimRef) -> Option<&PeakDim> {
        self.peak(r.peak).and_then(|p| p.peak_dim(r.dim))
    }

    pub fn peak_dim_mut(&mut self, r: PeakDimRef) -> Option<&mut PeakDim> {
        self.peak_mut(r.peak).and_then(|p| p.peak_dim_mut(r.dim))
    }

    fn require_peak(&self, id: i32) -> Result<&Peak> {
        self.peak(id).ok_or_else(|| PeakError::PeakNotFound { list: self.name.clone(), peak: id })
    }

    /// Adds an empty peak, each dimension getting a fresh resonance. Returns the new id.
    pub fn new_peak(&mut self, registry: &mut ResonanceRegistry) -> i32 {
        let id = self.next_peak_id;
        self.next_peak_id += 1;
        let dims = (0..self.n_dim())
            .map(|d| PeakDim::new(d, registry.build_for(PeakDimRef::new(self.id, id, d))))
            .collect();
        let mut peak = Peak::with_dims(dims);
        peak.set_id(id);
        self.push_peak(peak);
        id
    }

    /// Adds a peak built elsewhere and assigns it the next id.
    ///
    /// Dimensions whose resonance exists in `registry` keep it (and so become
    /// linked to its other peak dimensions); unknown resonances are replaced
    /// by fresh ones.
    pub fn add_peak(&mut self, mut peak: Peak, registry: &mut ResonanceRegistry) -> Result<i32> {
        if peak.n_dim() != self.n_dim() {
            return Err(PeakError::DimensionMismatch { expected: self.n_dim(), actual: peak.n_dim() });
        }
        if let Some((i, pd)) = peak.peak_dims().iter().enumerate().find(|(i, pd)| pd.spectral_dim() != *i) {
            return Err(PeakError::InvalidArgument(format!(
                "peak dimension {} refers to spectral dimension {}",
                i,
                pd.spectral_dim()
            )));
        }

        let id = self.next_peak_id;
        self.next_peak_id += 1;
        peak.set_id(id);
        let list = self.id;
        for (d, pd) in peak.peak_dims_mut().iter_mut().enumerate() {
            let r = PeakDimRef::new(list, id, d);
            if registry.attach(pd.resonance(), r).is_err() {
                pd.set_resonance(registry.build_for(r));
            }
        }
        self.push_peak(peak);
        Ok(id)
    }

    fn push_peak(&mut self, peak: Peak) {
        self.peaks.push(peak);
        self.invalidate_index();
        self.dirty.count_changed = true;
    }

    /// Marks a peak deleted. It stays in place until [`PeakList::compress`].
    pub fn delete_peak(&mut self, id: i32) -> Result<()> {
        self.require_peak(id)?;
        if let Some(peak) = self.peak_mut(id) {
            peak.delete();
        }
        self.dirty.count_changed = true;
        Ok(())
    }

    /// Physically removes deleted peaks and their resonance references.
    ///
    /// Returns the number of peaks removed.
    pub fn compress(&mut self, registry: &mut ResonanceRegistry) -> usize {
        let list = self.id;
        for peak in self.peaks.iter().filter(|p| p.is_deleted()) {
            for (d, pd) in peak.peak_dims().iter().enumerate() {
                registry.detach(pd.resonance(), PeakDimRef::new(list, peak.id(), d));
            }
        }
        let before = self.peaks.len();
        self.peaks.retain(|p| !p.is_deleted());
        let removed = before - self.peaks.len();
        if removed > 0 {
            self.invalidate_index();
            self.dirty.count_changed = true;
            debug!("compressed {} deleted peaks from {}", removed, self.name);
        }
        removed
    }

    /// Assigns ids `0..n` in list order and rewrites the registry references.
    pub fn renumber(&mut self, registry: &mut ResonanceRegistry) {
        let mut remap = HashMap::new();
        for (i, peak) in self.peaks.iter_mut().enumerate() {
            let new_id = i as i32;
            if peak.id() != new_id {
                remap.insert(peak.id(), new_id);
                peak.set_id(new_id);
            }
        }
        registry.remap_peak_ids(self.id, &remap);
        self.next_peak_id = self.peaks.len() as i32;
        self.invalidate_index();
        self.dirty.list_changed = true;
    }

    /// Reorders peaks by their shift in `dim`; peaks without a shift go last.
    pub fn sort_peaks(&mut self, dim: usize, ascending: bool) -> Result<()> {
        if dim >= self.n_dim() {
            return Err(PeakError::DimensionMismatch { expected: self.n_dim(), actual: dim + 1 });
        }
        self.peaks.sort_by(|a, b| {
            let sa = a.peak_dim(dim).and_then(|pd| pd.chem_shift);
            let sb = b.peak_dim(dim).and_then(|pd| pd.chem_shift);
            match (sa, sb) {
                (Some(x), Some(y)) => {
                    let ord = x.total_cmp(&y);
                    if ascending {
                        ord
                    } else {
                        ord.reverse()
                    }
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        });
        self.invalidate_index();
        self.dirty.list_changed = true;
        Ok(())
    }

    /// Finds active peaks whose shifts fall inside `limits` at `dims`, nearest to the box center first.
    ///
    /// # Arguments
    ///
    /// * `limits` - one `[a, b]` pair per entry of `dims`, in either order. The
    ///   interval is half-open `[lower, upper)`. Equal bounds are widened by
    ///   one twentieth of the spectral width.
    /// * `dims` - peak dimensions to test.
    /// * `fold_limits` - optional `[min, max]` window per entry of `dims`; shifts
    ///   are folded into it before testing.
    ///
    /// # Returns
    ///
    /// Peak ids ranked by normalized distance `sqrt(sum(((shift - center) / half_width)^2))`.
    /// An empty `dims` is rejected with [`PeakError::NoSearchDims`].
    pub fn locate_peaks(
        &self,
        limits: &[[f64; 2]],
        dims: &[usize],
        fold_limits: Option<&[Option<[f64; 2]>]>,
    ) -> Result<Vec<i32>> {
        if dims.is_empty() {
            return Err(PeakError::NoSearchDims(self.name.clone()));
        }
        if limits.len() != dims.len() {
            return Err(PeakError::DimensionMismatch { expected: dims.len(), actual: limits.len() });
        }
        if let Some(folds) = fold_limits {
            if folds.len() != dims.len() {
                return Err(PeakError::DimensionMismatch { expected: dims.len(), actual: folds.len() });
            }
        }

        let mut boxes = Vec::with_capacity(dims.len());
        for (&dim, limit) in dims.iter().zip(limits) {
            let sdim = self
                .spectral_dim(dim)
                .ok_or(PeakError::DimensionMismatch { expected: self.n_dim(), actual: dim + 1 })?;
            let (mut lower, mut upper) = if limit[0] > limit[1] { (limit[1], limit[0]) } else { (limit[0], limit[1]) };
            if lower == upper {
                let filler = sdim.sw_ppm() / 20.0;
                lower -= filler / 2.0;
                upper += filler / 2.0;
            }
            boxes.push((lower, upper, (lower + upper) / 2.0, (upper - lower) / 2.0));
        }

        let mut hits: Vec<(OrderedFloat<f64>, i32)> = Vec::new();
        'peaks: for peak in self.active_peaks() {
            let mut sum = 0.0;
            for (i, (&dim, &(lower, upper, center, half))) in dims.iter().zip(&boxes).enumerate() {
                let Some(mut shift) = peak.peak_dim(dim).and_then(|pd| pd.chem_shift) else {
                    continue 'peaks;
                };
                let fold = fold_limits.and_then(|f| f[i]);
                let inside = match fold {
                    Some([a, b]) => {
                        shift = fold_shift(shift, a.min(b), a.max(b));
                        // folded shifts are tested with a disjunction, kept as observed behavior
                        shift >= lower || shift < upper
                    }
                    None => shift >= lower && shift < upper,
                };
                if !inside {
                    continue 'peaks;
                }
                if half > 0.0 {
                    let delta = (shift - center) / half;
                    sum += delta * delta;
                }
            }
            hits.push((OrderedFloat(sum.sqrt()), peak.id()));
        }
        hits.sort();
        Ok(hits.into_iter().map(|(_, id)| id).collect())
    }

    /// Fills intensity or volume of every active peak from the region analyzer.
    ///
    /// The region spans `shift ± bounds / 2` in each dimension. Peaks with an
    /// unset shift are skipped. Returns the number of peaks measured.
    pub fn quantify(&mut self, analyzer: &dyn RegionAnalyzer, mode: MeasureMode) -> Result<usize> {
        let noise = analyzer.noise_level();
        let mut measured = 0;
        for peak in self.peaks.iter_mut().filter(|p| !p.is_deleted()) {
            let center: Option<Vec<f64>> = peak.peak_dims().iter().map(|pd| pd.chem_shift).collect();
            let Some(center) = center else {
                continue;
            };
            let limits = peak
                .peak_dims()
                .iter()
                .zip(&center)
                .map(|(pd, &c)| (c - pd.bounds / 2.0, c + pd.bounds / 2.0))
                .collect();
            let region = Region { center, limits };
            let m = analyzer.measure(&region, mode)?;
            let error = if m.error > 0.0 { m.error } else { noise };
            if mode.is_volume() {
                peak.volume1 = m.value;
                peak.volume1_err = Some(error);
            } else {
                peak.intensity = m.value;
                peak.intensity_err = Some(error);
            }
            measured += 1;
        }
        if measured > 0 {
            self.dirty.peak_changed = true;
        }
        Ok(measured)
    }

    pub fn mark_peak_changed(&mut self) {
        self.dirty.peak_changed = true;
    }

    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    /// Returns and clears the change markers.
    pub fn take_dirty(&mut self) -> DirtyFlags {
        std::mem::take(&mut self.dirty)
    }

    pub fn same_condition(&self, other: &PeakList) -> bool {
        self.sample_condition_label == other.sample_condition_label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::region::Measurement;

    fn hsqc(registry: &mut ResonanceRegistry, shifts: &[(f64, f64)]) -> PeakList {
        let mut list = PeakList::new(
            0,
            "hsqc",
            vec![
                SpectralDim::new("H1", "1H", 8000.0, 800.0),
                SpectralDim::new("N15", "15N", 2400.0, 80.0),
            ],
        );
        for &(h, n) in shifts {
            let id = list.new_peak(registry);
            let peak = list.peak_mut(id).unwrap();
            peak.peak_dim_mut(0).unwrap().chem_shift = Some(h);
            peak.peak_dim_mut(1).unwrap().chem_shift = Some(n);
        }
        list
    }

    #[test]
    fn test_new_peak_ids_and_resonances() {
        let mut reg = ResonanceRegistry::new();
        let list = hsqc(&mut reg, &[(8.0, 120.0), (7.5, 115.0)]);
        assert_eq!(list.size(), 2);
        assert_eq!(list.peaks()[1].id(), 1);
        assert_eq!(reg.len(), 4);
        let pd = list.peak(1).unwrap().peak_dim(1).unwrap();
        let res = reg.get(pd.resonance()).unwrap();
        assert_eq!(res.peak_dims(), &[PeakDimRef::new(0, 1, 1)]);
    }

    #[test]
    fn test_add_peak_dimension_mismatch() {
        let mut reg = ResonanceRegistry::new();
        let mut list = hsqc(&mut reg, &[]);
        let peak = Peak::with_dims(vec![PeakDim::new(0, 99)]);
        assert_eq!(
            list.add_peak(peak, &mut reg),
            Err(PeakError::DimensionMismatch { expected: 2, actual: 1 })
        );
    }

    #[test]
    fn test_add_peak_replaces_unknown_resonance() {
        let mut reg = ResonanceRegistry::new();
        let mut list = hsqc(&mut reg, &[]);
        let peak = Peak::with_dims(vec![PeakDim::new(0, 99), PeakDim::new(1, 100)]);
        let id = list.add_peak(peak, &mut reg).unwrap();
        let res = list.peak(id).unwrap().peak_dim(0).unwrap().resonance();
        assert!(reg.get(res).is_some());
        assert_ne!(res, 99);
    }

    #[test]
    fn test_locate_nearest_first() {
        let mut reg = ResonanceRegistry::new();
        let list = hsqc(&mut reg, &[(8.0, 120.0), (8.3, 121.0), (9.5, 130.0)]);
        let found = list.locate_peaks(&[[7.8, 8.6], [118.0, 124.0]], &[0, 1], None).unwrap();
        assert_eq!(found, vec![1, 0]);
    }

    #[test]
    fn test_locate_inverted_limits_match() {
        let mut reg = ResonanceRegistry::new();
        let list = hsqc(&mut reg, &[(8.0, 120.0), (8.3, 121.0), (9.5, 130.0)]);
        let forward = list.locate_peaks(&[[7.8, 8.6], [118.0, 124.0]], &[0, 1], None).unwrap();
        let inverted = list.locate_peaks(&[[8.6, 7.8], [124.0, 118.0]], &[0, 1], None).unwrap();
        assert_eq!(forward, inverted);
    }

    #[test]
    fn test_locate_half_open_and_widening() {
        let mut reg = ResonanceRegistry::new();
        let list = hsqc(&mut reg, &[(8.0, 120.0)]);
        assert!(list.locate_peaks(&[[7.0, 8.0]], &[0], None).unwrap().is_empty());
        assert_eq!(list.locate_peaks(&[[8.0, 9.0]], &[0], None).unwrap(), vec![0]);
        // equal bounds widen by sw/20 = 0.5 ppm
        assert_eq!(list.locate_peaks(&[[8.2, 8.2]], &[0], None).unwrap(), vec![0]);
        assert!(list.locate_peaks(&[[8.3, 8.3]], &[0], None).unwrap().is_empty());
    }

    #[test]
    fn test_locate_skips_deleted_and_checks_args() {
        let mut reg = ResonanceRegistry::new();
        let mut list = hsqc(&mut reg, &[(8.0, 120.0), (8.1, 120.5)]);
        list.delete_peak(0).unwrap();
        assert_eq!(list.locate_peaks(&[[7.0, 9.0]], &[0], None).unwrap(), vec![1]);
        assert!(list.locate_peaks(&[[7.0, 9.0]], &[0, 1], None).is_err());
        assert!(list.locate_peaks(&[[7.0, 9.0]], &[2], None).is_err());
        assert_eq!(list.locate_peaks(&[], &[], None), Err(PeakError::NoSearchDims(list.name.clone())));
    }

    #[test]
    fn test_locate_with_fold() {
        let mut reg = ResonanceRegistry::new();
        let list = hsqc(&mut reg, &[(8.0, 135.0)]);
        let folds = [Some([100.0, 130.0])];
        // folded shift 105 lies outside [110, 112) but the folded test is permissive
        let found = list.locate_peaks(&[[110.0, 112.0]], &[1], Some(&folds)).unwrap();
        assert_eq!(found, vec![0]);
    }

    #[test]
    fn test_sort_compress_renumber() {
        let mut reg = ResonanceRegistry::new();
        let mut list = hsqc(&mut reg, &[(8.0, 120.0), (7.0, 110.0), (9.0, 125.0)]);
        list.sort_peaks(0, true).unwrap();
        let ids: Vec<i32> = list.peaks().iter().map(Peak::id).collect();
        assert_eq!(ids, vec![1, 0, 2]);
        assert_eq!(list.peak(2).unwrap().peak_dim(0).unwrap().chem_shift, Some(9.0));

        list.delete_peak(0).unwrap();
        assert_eq!(list.compress(&mut reg), 1);
        assert_eq!(reg.len(), 4);
        assert!(list.peak(0).is_none());

        list.renumber(&mut reg);
        let ids: Vec<i32> = list.peaks().iter().map(Peak::id).collect();
        assert_eq!(ids, vec![0, 1]);
        let pd = list.peak(1).unwrap().peak_dim(0).unwrap();
        assert_eq!(reg.get(pd.resonance()).unwrap().peak_dims(), &[PeakDimRef::new(0, 1, 0)]);
        assert_eq!(list.new_peak(&mut reg), 2);
    }

    #[test]
    fn test_dirty_flags() {
        let mut reg = ResonanceRegistry::new();
        let mut list = hsqc(&mut reg, &[(8.0, 120.0)]);
        assert!(list.take_dirty().count_changed);
        assert!(!list.dirty().any());
        list.sort_peaks(1, false).unwrap();
        assert!(list.dirty().list_changed);
    }

    #[test]
    fn test_search_dims() {
        let mut reg = ResonanceRegistry::new();
        let mut list = hsqc(&mut reg, &[]);
        list.set_search_dims_str("H1 0.02 N15 0.2").unwrap();
        assert_eq!(list.search_dims().len(), 2);
        assert!(list.set_search_dims(vec![SearchDim::new(3, 0.1)]).is_err());
        assert!(list.set_search_dims(vec![SearchDim::new(0, -0.1)]).is_err());
    }

    struct FlatAnalyzer;

    impl RegionAnalyzer for FlatAnalyzer {
        fn measure(&self, region: &Region, mode: MeasureMode) -> Result<Measurement> {
            let value = match mode {
                MeasureMode::Volume => region.limits.iter().map(|(lo, hi)| hi - lo).product::<f64>(),
                _ => 100.0,
            };
            Ok(Measurement { value, error: 0.0 })
        }

        fn noise_level(&self) -> f64 {
            2.5
        }
    }

    #[test]
    fn test_quantify() {
        let mut reg = ResonanceRegistry::new();
        let mut list = hsqc(&mut reg, &[(8.0, 120.0), (7.0, 110.0)]);
        for id in [0, 1] {
            let peak = list.peak_mut(id).unwrap();
            peak.peak_dim_mut(0).unwrap().bounds = 0.1;
            peak.peak_dim_mut(1).unwrap().bounds = 1.0;
        }
        list.peak_mut(1).unwrap().peak_dim_mut(0).unwrap().chem_shift = None;

        assert_eq!(list.quantify(&FlatAnalyzer, MeasureMode::Max).unwrap(), 1);
        assert_eq!(list.peak(0).unwrap().intensity, 100.0);
        assert_eq!(list.peak(0).unwrap().intensity_err, Some(2.5));

        list.quantify(&FlatAnalyzer, MeasureMode::Volume).unwrap();
        assert!((list.peak(0).unwrap().volume1 - 0.1).abs() < 1e-9);
    }
}
