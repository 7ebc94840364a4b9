//! Tolerance-box clustering of peak positions across lists.
//!
//! Items from different lists are joined when every coordinate lies within
//! the per-dimension tolerance. Connected components are built with a
//! union-find; a component that picked up several items of the same list
//! through transitive joins keeps only the one nearest its centroid, and the
//! evicted items are clustered again in the next round.

use std::collections::HashMap;

use itertools::Itertools;
use log::debug;
use nalgebra::DVector;
use ordered_float::OrderedFloat;

use nmrcore::data::peak::PeakRef;
use nmrcore::error::{PeakError, Result};

/// Disjoint sets over item slots `0..n`.
///
/// The root of a set is always its smallest slot, so sets come out ordered
/// and stable regardless of the order unions were made in.
pub struct Dsu {
    parent: Vec<usize>,
}

impl Dsu {
    pub fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    /// Root of `x`, halving the path on the way up.
    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Joins the sets of `a` and `b`; false if they were already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        self.parent[ra.max(rb)] = ra.min(rb);
        true
    }

    /// Sets in order of their smallest slot, slots ascending.
    pub fn groups(mut self) -> Vec<Vec<usize>> {
        let n = self.parent.len();
        (0..n)
            .map(|i| (self.find(i), i))
            .into_group_map()
            .into_iter()
            .sorted_by_key(|(root, _)| *root)
            .map(|(_, members)| members)
            .collect()
    }
}

/// One position fed to the clusterer.
#[derive(Clone, Debug)]
pub struct ClusterItem {
    pub position: DVector<f64>,
    pub peak: PeakRef,
    pub list_index: usize,
}

/// Collects positions and groups them by per-dimension tolerance.
#[derive(Clone, Debug)]
pub struct Clusterer {
    tolerances: DVector<f64>,
    items: Vec<ClusterItem>,
}

impl Clusterer {
    pub fn new(tolerances: &[f64]) -> Result<Self> {
        if tolerances.is_empty() {
            return Err(PeakError::InvalidArgument("clusterer needs at least one tolerance".to_string()));
        }
        if let Some(t) = tolerances.iter().find(|t| !t.is_finite() || **t < 0.0) {
            return Err(PeakError::InvalidArgument(format!("invalid tolerance {}", t)));
        }
        Ok(Clusterer {
            tolerances: DVector::from_column_slice(tolerances),
            items: Vec::new(),
        })
    }

    pub fn n_dim(&self) -> usize {
        self.tolerances.len()
    }

    pub fn items(&self) -> &[ClusterItem] {
        &self.items
    }

    pub fn add_item(&mut self, position: &[f64], peak: PeakRef, list_index: usize) -> Result<()> {
        if position.len() != self.n_dim() {
            return Err(PeakError::DimensionMismatch { expected: self.n_dim(), actual: position.len() });
        }
        self.items.push(ClusterItem {
            position: DVector::from_column_slice(position),
            peak,
            list_index,
        });
        Ok(())
    }

    fn is_near(&self, a: &ClusterItem, b: &ClusterItem) -> bool {
        (&a.position - &b.position)
            .iter()
            .zip(self.tolerances.iter())
            .all(|(d, tol)| d.abs() <= *tol)
    }

    /// Distance in tolerance units; zero tolerances only count exact hits.
    fn scaled_distance(&self, position: &DVector<f64>, centroid: &DVector<f64>) -> f64 {
        (position - centroid)
            .iter()
            .zip(self.tolerances.iter())
            .map(|(d, tol)| if *tol > 0.0 { (d / tol).powi(2) } else if *d == 0.0 { 0.0 } else { f64::INFINITY })
            .sum::<f64>()
            .sqrt()
    }

    fn components(&self, pending: &[usize]) -> Vec<Vec<usize>> {
        let mut dsu = Dsu::new(pending.len());
        for i in 0..pending.len() {
            for j in (i + 1)..pending.len() {
                let (a, b) = (&self.items[pending[i]], &self.items[pending[j]]);
                if a.list_index != b.list_index && self.is_near(a, b) {
                    dsu.union(i, j);
                }
            }
        }
        dsu.groups()
            .into_iter()
            .map(|g| g.into_iter().map(|i| pending[i]).collect())
            .collect()
    }

    /// Splits a component into one member per list plus the evicted rest.
    fn resolve_duplicates(&self, group: Vec<usize>) -> (Vec<usize>, Vec<usize>) {
        let mut centroid: DVector<f64> = DVector::zeros(self.n_dim());
        for &i in &group {
            centroid += &self.items[i].position;
        }
        centroid /= group.len() as f64;

        let mut best: HashMap<usize, usize> = HashMap::new();
        for &i in &group {
            let list = self.items[i].list_index;
            let dist = self.scaled_distance(&self.items[i].position, &centroid);
            match best.get(&list) {
                Some(&j) if OrderedFloat(self.scaled_distance(&self.items[j].position, &centroid)) <= OrderedFloat(dist) => {}
                _ => {
                    best.insert(list, i);
                }
            }
        }
        group.into_iter().partition(|i| best.get(&self.items[*i].list_index) == Some(i))
    }

    /// Runs the clustering until no further cluster forms.
    ///
    /// Returns clusters of item indices with at least two members, each
    /// holding at most one item per list and connected through in-tolerance
    /// pairs. Members cut off by a duplicate eviction go back to the pool.
    pub fn run(&self) -> Vec<Vec<usize>> {
        let mut pending: Vec<usize> = (0..self.items.len()).collect();
        let mut clusters = Vec::new();
        let mut round = 0;
        while !pending.is_empty() {
            round += 1;
            let mut evicted_all = Vec::new();
            let mut formed = 0;
            for group in self.components(&pending) {
                let (kept, mut evicted) = self.resolve_duplicates(group);
                let parts = if evicted.is_empty() { vec![kept] } else { self.components(&kept) };
                for part in parts {
                    if part.len() >= 2 {
                        clusters.push(part);
                        formed += 1;
                    } else if !evicted.is_empty() {
                        evicted.extend(part);
                    }
                }
                evicted_all.extend(evicted);
            }
            debug!("cluster round {}: {} clusters, {} evicted", round, formed, evicted_all.len());
            if evicted_all.len() == pending.len() {
                break;
            }
            evicted_all.sort_unstable();
            pending = evicted_all;
        }
        clusters
    }
}
