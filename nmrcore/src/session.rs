use std::collections::BTreeMap;
use std::sync::LazyLock;

use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::data::peak::{Peak, PeakRef};
use crate::data::peak_dim::{DimRecord, PeakDim, PeakDimRef};
use crate::data::peak_list::{ListId, PeakList};
use crate::data::resonance::{Resonance, ResonanceId, ResonanceRegistry};
use crate::data::spectral_dim::SpectralDim;
use crate::error::{PeakError, Result};

static PEAK_SPECIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_\-]+)\.(\d+)(?:\.([^.\s]+))?$").expect("valid peak specifier regex")
});

/// Session-wide behavior switches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Only slide linked shifts into lists with the same sample condition label.
    pub slide_requires_same_condition: bool,
    /// Upper-case labels when grouping resonances by label.
    pub label_case_fold: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            slide_requires_same_condition: false,
            label_case_fold: true,
        }
    }
}

/// A parsed `"<list>.<peakId>[.<dim>]"` specifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeakSpecifier {
    pub list: String,
    pub peak: i32,
    pub dim: Option<String>,
}

/// Parses a peak specifier such as `hsqc.12` or `hsqc.12.H1`.
///
/// # Example
///
/// ```rust
/// # use nmrcore::session::parse_peak_specifier;
/// let spec = parse_peak_specifier("hsqc.12.H1").unwrap();
/// assert_eq!(spec.list, "hsqc");
/// assert_eq!(spec.peak, 12);
/// assert_eq!(spec.dim.as_deref(), Some("H1"));
/// assert!(parse_peak_specifier("hsqc-12").is_err());
/// ```
pub fn parse_peak_specifier(spec: &str) -> Result<PeakSpecifier> {
    let caps = PEAK_SPECIFIER
        .captures(spec.trim())
        .ok_or_else(|| PeakError::MalformedSpecifier(spec.to_string()))?;
    let peak = caps[2]
        .parse()
        .map_err(|_| PeakError::MalformedSpecifier(spec.to_string()))?;
    Ok(PeakSpecifier {
        list: caps[1].to_string(),
        peak,
        dim: caps.get(3).map(|m| m.as_str().to_string()),
    })
}

/// Owns the peak lists of a project together with the resonance registry they share.
///
/// Every operation that must resolve a list by name, or that touches
/// resonances shared between lists, goes through the session.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Session {
    pub config: SessionConfig,
    lists: BTreeMap<ListId, PeakList>,
    next_list_id: ListId,
    resonances: ResonanceRegistry,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Session { config, ..Self::default() }
    }

    pub fn new_peak_list(&mut self, name: &str, dims: Vec<SpectralDim>) -> Result<ListId> {
        if self.lists.values().any(|l| l.name == name) {
            return Err(PeakError::DuplicateList(name.to_string()));
        }
        let id = self.next_list_id;
        self.next_list_id += 1;
        self.lists.insert(id, PeakList::new(id, name, dims));
        debug!("created peak list {} ({})", name, id);
        Ok(id)
    }

    /// Removes a list and every resonance reference into it.
    pub fn remove_peak_list(&mut self, name: &str) -> Result<PeakList> {
        let id = self.list_id(name)?;
        self.resonances.drop_list(id);
        self.lists.remove(&id).ok_or_else(|| PeakError::ListNotFound(name.to_string()))
    }

    pub fn list_id(&self, name: &str) -> Result<ListId> {
        self.lists
            .values()
            .find(|l| l.name == name)
            .map(PeakList::id)
            .ok_or_else(|| PeakError::ListNotFound(name.to_string()))
    }

    pub fn list(&self, name: &str) -> Result<&PeakList> {
        let id = self.list_id(name)?;
        self.list_by_id(id).ok_or_else(|| PeakError::ListNotFound(name.to_string()))
    }

    pub fn list_mut(&mut self, name: &str) -> Result<&mut PeakList> {
        let id = self.list_id(name)?;
        self.lists.get_mut(&id).ok_or_else(|| PeakError::ListNotFound(name.to_string()))
    }

    pub fn list_by_id(&self, id: ListId) -> Option<&PeakList> {
        self.lists.get(&id)
    }

    pub fn list_by_id_mut(&mut self, id: ListId) -> Option<&mut PeakList> {
        self.lists.get_mut(&id)
    }

    pub fn lists(&self) -> impl Iterator<Item = &PeakList> {
        self.lists.values()
    }

    pub fn resonances(&self) -> &ResonanceRegistry {
        &self.resonances
    }

    /// Adds a peak to the named list with the given shifts, one per dimension.
    pub fn add_peak(&mut self, list_name: &str, shifts: &[f64]) -> Result<PeakRef> {
        let id = self.list_id(list_name)?;
        let Session { lists, resonances, .. } = self;
        let list = lists.get_mut(&id).ok_or_else(|| PeakError::ListNotFound(list_name.to_string()))?;
        if shifts.len() != list.n_dim() {
            return Err(PeakError::DimensionMismatch { expected: list.n_dim(), actual: shifts.len() });
        }
        let peak_id = list.new_peak(resonances);
        if let Some(peak) = list.peak_mut(peak_id) {
            for (d, &shift) in shifts.iter().enumerate() {
                if let Some(pd) = peak.peak_dim_mut(d) {
                    pd.chem_shift = Some(shift);
                }
            }
        }
        Ok(PeakRef::new(id, peak_id))
    }

    fn list_name(&self, id: ListId) -> String {
        self.lists.get(&id).map(|l| l.name.clone()).unwrap_or_else(|| id.to_string())
    }

    fn not_found(&self, r: PeakDimRef) -> PeakError {
        match self.lists.get(&r.list) {
            Some(list) if list.peak(r.peak).is_some() => PeakError::DimensionMismatch {
                expected: list.n_dim(),
                actual: r.dim + 1,
            },
            Some(list) => PeakError::PeakNotFound { list: list.name.clone(), peak: r.peak },
            None => PeakError::ListNotFound(r.list.to_string()),
        }
    }

    pub fn peak(&self, p: PeakRef) -> Result<&Peak> {
        let list = self
            .lists
            .get(&p.list)
            .ok_or_else(|| PeakError::ListNotFound(p.list.to_string()))?;
        list.peak(p.peak)
            .ok_or_else(|| PeakError::PeakNotFound { list: list.name.clone(), peak: p.peak })
    }

    pub fn peak_dim(&self, r: PeakDimRef) -> Result<&PeakDim> {
        self.lists
            .get(&r.list)
            .and_then(|l| l.peak_dim(r))
            .ok_or_else(|| self.not_found(r))
    }

    fn peak_dim_mut(&mut self, r: PeakDimRef) -> Result<&mut PeakDim> {
        if self.lists.get(&r.list).and_then(|l| l.peak_dim(r)).is_none() {
            return Err(self.not_found(r));
        }
        self.lists
            .get_mut(&r.list)
            .and_then(|l| l.peak_dim_mut(r))
            .ok_or(PeakError::ListNotFound(r.list.to_string()))
    }

    pub fn resonance_of(&self, r: PeakDimRef) -> Result<&Resonance> {
        let id = self.peak_dim(r)?.resonance();
        self.resonances.get(id).ok_or(PeakError::ResonanceNotFound(id))
    }

    /// Sets the assignment label on the resonance of `r`, visible to every linked dimension.
    pub fn set_label(&mut self, r: PeakDimRef, label: &str) -> Result<()> {
        let id = self.peak_dim(r)?.resonance();
        let res = self.resonances.get_mut(id).ok_or(PeakError::ResonanceNotFound(id))?;
        res.set_label(label);
        Ok(())
    }

    /// Binds the resonance of `r` to an atom.
    pub fn set_atom(&mut self, r: PeakDimRef, atom: Option<&str>) -> Result<()> {
        let id = self.peak_dim(r)?.resonance();
        let res = self.resonances.get_mut(id).ok_or(PeakError::ResonanceNotFound(id))?;
        res.atom = atom.map(str::to_string);
        Ok(())
    }

    pub fn set_frozen(&mut self, r: PeakDimRef, frozen: bool) -> Result<()> {
        self.peak_dim_mut(r)?.frozen = frozen;
        Ok(())
    }

    /// Points every dimension recorded on `id` back at `id`.
    fn sync_resonance(&mut self, id: ResonanceId) {
        let dims: Vec<PeakDimRef> = match self.resonances.get(id) {
            Some(res) => res.peak_dims().to_vec(),
            None => return,
        };
        for d in dims {
            if let Some(pd) = self.lists.get_mut(&d.list).and_then(|l| l.peak_dim_mut(d)) {
                pd.set_resonance(id);
            }
        }
    }

    /// Makes `a` and `b` share one resonance.
    ///
    /// Fails with [`PeakError::AtomConflict`] when their resonances are bound to different atoms.
    pub fn link(&mut self, a: PeakDimRef, b: PeakDimRef) -> Result<ResonanceId> {
        let ra = self.peak_dim(a)?.resonance();
        let rb = self.peak_dim(b)?.resonance();
        match self.resonances.merge(ra, rb) {
            Some(keep) => {
                self.sync_resonance(keep);
                Ok(keep)
            }
            None => {
                let atom = |id: ResonanceId| {
                    self.resonances
                        .get(id)
                        .and_then(|r| r.atom.clone())
                        .unwrap_or_default()
                };
                Err(PeakError::AtomConflict { a: atom(ra), b: atom(rb) })
            }
        }
    }

    /// Gives `r` a resonance of its own, keeping the label and bound atom.
    ///
    /// A dimension that already has a private resonance is left untouched.
    pub fn unlink(&mut self, r: PeakDimRef) -> Result<ResonanceId> {
        let old_id = self.peak_dim(r)?.resonance();
        let old = self.resonances.get(old_id).ok_or(PeakError::ResonanceNotFound(old_id))?;
        if old.peak_dims().iter().all(|d| *d == r) {
            return Ok(old_id);
        }
        let (names, atom) = (old.names.clone(), old.atom.clone());

        self.resonances.detach(old_id, r);
        let new_id = self.resonances.build_for(r);
        if let Some(res) = self.resonances.get_mut(new_id) {
            res.names = names;
            res.atom = atom;
        }
        self.peak_dim_mut(r)?.set_resonance(new_id);
        Ok(new_id)
    }

    /// True when more than two peak dimensions (counting `r`) share its resonance.
    ///
    /// A single linked pair is not reported as linked.
    pub fn is_linked(&self, r: PeakDimRef) -> Result<bool> {
        Ok(self.resonance_of(r)?.peak_dim_count() > 2)
    }

    /// All peak dimensions sharing the resonance of `r`, `r` included.
    pub fn link_group(&self, r: PeakDimRef) -> Result<Vec<PeakDimRef>> {
        Ok(self.resonance_of(r)?.peak_dims().to_vec())
    }

    /// Mean shift over the link group of `r`, ignoring dimensions without a shift.
    pub fn group_mean_shift(&self, r: PeakDimRef) -> Result<Option<f64>> {
        let mut sum = 0.0;
        let mut n = 0usize;
        for d in self.link_group(r)? {
            if let Some(shift) = self.peak_dim(d).ok().and_then(|pd| pd.chem_shift) {
                sum += shift;
                n += 1;
            }
        }
        Ok((n > 0).then(|| sum / n as f64))
    }

    /// Sets the shift of `r`.
    ///
    /// If the owning list is slideable and `r` is not frozen the new shift is
    /// copied to every other non-frozen dimension sharing the resonance,
    /// restricted to lists with the same sample condition when configured.
    /// Returns the dimensions that were updated, `r` first.
    pub fn set_chem_shift(&mut self, r: PeakDimRef, shift: f64) -> Result<Vec<PeakDimRef>> {
        let pd = self.peak_dim_mut(r)?;
        pd.chem_shift = Some(shift);
        let frozen = pd.frozen;
        let mut updated = vec![r];

        let Some(source) = self.lists.get(&r.list) else {
            return Ok(updated);
        };
        if !source.slideable || frozen {
            return Ok(updated);
        }
        let condition = source.sample_condition_label.clone();
        let same_condition = self.config.slide_requires_same_condition;

        for other in self.link_group(r)? {
            if other == r {
                continue;
            }
            let Some(list) = self.lists.get_mut(&other.list) else {
                continue;
            };
            if same_condition && list.sample_condition_label != condition {
                continue;
            }
            if let Some(pd) = list.peak_dim_mut(other) {
                if !pd.frozen {
                    pd.chem_shift = Some(shift);
                    updated.push(other);
                }
            }
        }
        if updated.len() > 1 {
            debug!("shift {:.4} slid to {} linked dimensions", shift, updated.len() - 1);
        }
        Ok(updated)
    }

    /// Resolves `"<list>.<peakId>"` (any dimension token is ignored).
    pub fn resolve_peak(&self, spec: &str) -> Result<PeakRef> {
        let parsed = parse_peak_specifier(spec)?;
        let list = self.list(&parsed.list)?;
        if list.peak(parsed.peak).is_none() {
            return Err(PeakError::PeakNotFound { list: parsed.list, peak: parsed.peak });
        }
        Ok(PeakRef::new(list.id(), parsed.peak))
    }

    /// Resolves `"<list>.<peakId>.<dim>"`, where `dim` is a dimension name or a 1-based number.
    pub fn resolve_peak_dim(&self, spec: &str) -> Result<PeakDimRef> {
        let parsed = parse_peak_specifier(spec)?;
        let token = parsed
            .dim
            .as_deref()
            .ok_or_else(|| PeakError::MalformedSpecifier(spec.to_string()))?;
        let list = self.list(&parsed.list)?;
        if list.peak(parsed.peak).is_none() {
            return Err(PeakError::PeakNotFound { list: parsed.list, peak: parsed.peak });
        }
        let dim = match list.dim_index(token) {
            Some(dim) => dim,
            None => match token.parse::<usize>() {
                Ok(n) if n >= 1 && n <= list.n_dim() => n - 1,
                _ => return Err(PeakError::MalformedSpecifier(spec.to_string())),
            },
        };
        Ok(PeakDimRef::new(list.id(), parsed.peak, dim))
    }

    pub fn dim_record(&self, r: PeakDimRef) -> Result<DimRecord> {
        Ok(self.peak_dim(r)?.record(&self.resonances))
    }

    /// Groups resonances by normalized label, see [`ResonanceRegistry::label_map`].
    pub fn label_map(&self) -> BTreeMap<String, Vec<ResonanceId>> {
        self.resonances.label_map(self.config.label_case_fold)
    }

    /// Drops deleted peaks of the named list. Returns the number removed.
    pub fn compress(&mut self, list_name: &str) -> Result<usize> {
        let id = self.list_id(list_name)?;
        let Session { lists, resonances, .. } = self;
        let list = lists.get_mut(&id).ok_or_else(|| PeakError::ListNotFound(list_name.to_string()))?;
        Ok(list.compress(resonances))
    }

    pub fn renumber(&mut self, list_name: &str) -> Result<()> {
        let id = self.list_id(list_name)?;
        let Session { lists, resonances, .. } = self;
        let list = lists.get_mut(&id).ok_or_else(|| PeakError::ListNotFound(list_name.to_string()))?;
        list.renumber(resonances);
        Ok(())
    }

    /// Drops orphaned resonances, compacts ids and rewrites every peak dimension.
    ///
    /// Returns the number of resonances left.
    pub fn clean_resonances(&mut self) -> usize {
        let remap = self.resonances.clean();
        for list in self.lists.values_mut() {
            for peak in list.peaks_mut() {
                for pd in peak.peak_dims_mut() {
                    if let Some(&new_id) = remap.get(&pd.resonance()) {
                        pd.set_resonance(new_id);
                    }
                }
            }
        }
        info!("resonances cleaned, {} in use", self.resonances.len());
        self.resonances.len()
    }

    /// Sets the status of a peak, used by clustering and path tracking to claim peaks.
    pub fn set_status(&mut self, p: PeakRef, status: i32) -> Result<()> {
        let name = self.list_name(p.list);
        let list = self.lists.get_mut(&p.list).ok_or_else(|| PeakError::ListNotFound(name.clone()))?;
        let peak = list.peak_mut(p.peak).ok_or(PeakError::PeakNotFound { list: name, peak: p.peak })?;
        peak.status = status;
        Ok(())
    }
}
