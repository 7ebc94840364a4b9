use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::data::peak_dim::PeakDimRef;
use crate::data::peak_list::ListId;
use crate::error::{PeakError, Result};

/// Stable id of a resonance inside a [`ResonanceRegistry`].
pub type ResonanceId = i64;

/// Shared assignment identity referenced by one or more peak dimensions.
///
/// A resonance carries the assignment label (possibly several names) and an
/// optional bound atom. Peak dimensions hold its id, the resonance keeps the
/// back references so that a merge can rewrite every referencing dimension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resonance {
    pub id: ResonanceId,
    pub names: Vec<String>,
    pub atom: Option<String>,
    peak_dims: Vec<PeakDimRef>,
}

impl Resonance {
    fn new(id: ResonanceId) -> Self {
        Resonance {
            id,
            names: Vec::new(),
            atom: None,
            peak_dims: Vec::new(),
        }
    }

    /// Assignment label, multiple names separated by a single space.
    pub fn label(&self) -> String {
        self.names.iter().join(" ")
    }

    /// Replaces the names with the whitespace separated tokens of `label`.
    pub fn set_label(&mut self, label: &str) {
        self.names = label.split_whitespace().map(str::to_string).collect();
    }

    pub fn peak_dims(&self) -> &[PeakDimRef] {
        &self.peak_dims
    }

    pub fn peak_dim_count(&self) -> usize {
        self.peak_dims.len()
    }

    /// Ranking used when two resonances are merged: an atom beats a name, a name beats nothing.
    fn information_rank(&self) -> u8 {
        match (self.atom.is_some(), !self.names.is_empty()) {
            (true, _) => 2,
            (false, true) => 1,
            (false, false) => 0,
        }
    }
}

/// Arena of resonances indexed by id.
///
/// Ids are handed out in strictly increasing order. A resonance whose last
/// peak dimension detaches is removed from the arena.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResonanceRegistry {
    resonances: BTreeMap<ResonanceId, Resonance>,
    next_id: ResonanceId,
}

impl ResonanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and registers a fresh resonance, returning its id.
    pub fn build(&mut self) -> ResonanceId {
        while self.resonances.contains_key(&self.next_id) {
            self.next_id += 1;
        }
        let id = self.next_id;
        self.resonances.insert(id, Resonance::new(id));
        self.next_id += 1;
        id
    }

    /// Creates a fresh resonance already referenced by `dim`.
    pub fn build_for(&mut self, dim: PeakDimRef) -> ResonanceId {
        let id = self.build();
        if let Some(res) = self.resonances.get_mut(&id) {
            res.peak_dims.push(dim);
        }
        id
    }

    pub fn get(&self, id: ResonanceId) -> Option<&Resonance> {
        self.resonances.get(&id)
    }

    pub fn get_mut(&mut self, id: ResonanceId) -> Option<&mut Resonance> {
        self.resonances.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.resonances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resonances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resonance> {
        self.resonances.values()
    }

    /// Records that `dim` references resonance `id`.
    pub fn attach(&mut self, id: ResonanceId, dim: PeakDimRef) -> Result<()> {
        let res = self
            .resonances
            .get_mut(&id)
            .ok_or(PeakError::ResonanceNotFound(id))?;
        if !res.peak_dims.contains(&dim) {
            res.peak_dims.push(dim);
        }
        Ok(())
    }

    /// Removes the reference from `dim` to resonance `id`.
    ///
    /// Returns `true` if the resonance had no references left and was dropped.
    pub fn detach(&mut self, id: ResonanceId, dim: PeakDimRef) -> bool {
        let Some(res) = self.resonances.get_mut(&id) else {
            return false;
        };
        res.peak_dims.retain(|d| *d != dim);
        if res.peak_dims.is_empty() {
            self.resonances.remove(&id);
            true
        } else {
            false
        }
    }

    /// Unions two resonances.
    ///
    /// The resonance carrying more information (an atom, else a name) absorbs
    /// every peak dimension of the other one, which is then removed. When both
    /// are bound to different atoms nothing changes and `None` is returned.
    /// Callers must rewrite the resonance id on every peak dimension listed by
    /// the surviving resonance.
    pub fn merge(&mut self, a: ResonanceId, b: ResonanceId) -> Option<ResonanceId> {
        if a == b {
            return self.resonances.contains_key(&a).then_some(a);
        }
        let (ra, rb) = match (self.resonances.get(&a), self.resonances.get(&b)) {
            (Some(ra), Some(rb)) => (ra, rb),
            _ => {
                warn!("merge of unknown resonances {} and {}", a, b);
                return None;
            }
        };
        if let (Some(atom_a), Some(atom_b)) = (&ra.atom, &rb.atom) {
            if atom_a != atom_b {
                debug!("resonances {} and {} bound to {} and {}, not merged", a, b, atom_a, atom_b);
                return None;
            }
        }

        let (keep, drop) = if rb.information_rank() > ra.information_rank() {
            (b, a)
        } else {
            (a, b)
        };

        let absorbed = self.resonances.remove(&drop)?;
        let kept = self.resonances.get_mut(&keep)?;
        for dim in absorbed.peak_dims {
            if !kept.peak_dims.contains(&dim) {
                kept.peak_dims.push(dim);
            }
        }
        if kept.names.is_empty() {
            kept.names = absorbed.names;
        }
        if kept.atom.is_none() {
            kept.atom = absorbed.atom;
        }
        debug!("resonance {} absorbed {}", keep, drop);
        Some(keep)
    }

    /// Drops resonances without peak dimensions and compacts ids to `0..n`.
    ///
    /// Returns the old-to-new id map for the surviving resonances.
    pub fn clean(&mut self) -> HashMap<ResonanceId, ResonanceId> {
        let old = std::mem::take(&mut self.resonances);
        let mut remap = HashMap::new();
        let mut next: ResonanceId = 0;
        for (old_id, mut res) in old {
            if res.peak_dims.is_empty() {
                continue;
            }
            res.id = next;
            remap.insert(old_id, next);
            self.resonances.insert(next, res);
            next += 1;
        }
        self.next_id = next;
        debug!("resonance registry cleaned, {} remaining", next);
        remap
    }

    /// Groups resonances by normalized assignment label.
    ///
    /// Whitespace is collapsed and, with `case_fold`, labels are upper-cased.
    /// Resonances without a label are left out.
    pub fn label_map(&self, case_fold: bool) -> BTreeMap<String, Vec<ResonanceId>> {
        let mut map: BTreeMap<String, Vec<ResonanceId>> = BTreeMap::new();
        for res in self.resonances.values() {
            let label = normalize_label(&res.label(), case_fold);
            if label.is_empty() {
                continue;
            }
            map.entry(label).or_default().push(res.id);
        }
        map
    }

    /// Rewrites peak ids of references into `list` after a renumbering.
    pub fn remap_peak_ids(&mut self, list: ListId, remap: &HashMap<i32, i32>) {
        for res in self.resonances.values_mut() {
            for dim in res.peak_dims.iter_mut() {
                if dim.list == list {
                    if let Some(&new_id) = remap.get(&dim.peak) {
                        dim.peak = new_id;
                    }
                }
            }
        }
    }

    /// Removes every reference into `list`, dropping resonances left empty.
    pub fn drop_list(&mut self, list: ListId) {
        for res in self.resonances.values_mut() {
            res.peak_dims.retain(|d| d.list != list);
        }
        self.resonances.retain(|_, r| !r.peak_dims.is_empty());
    }
}

pub fn normalize_label(label: &str, case_fold: bool) -> String {
    let collapsed = label.split_whitespace().join(" ");
    if case_fold {
        collapsed.to_uppercase()
    } else {
        collapsed
    }
}
