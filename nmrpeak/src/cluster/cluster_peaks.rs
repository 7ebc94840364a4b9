use log::{debug, info, warn};

use nmrcore::data::peak::PeakRef;
use nmrcore::data::peak_dim::PeakDimRef;
use nmrcore::data::peak_list::ListId;
use nmrcore::data::spectral_dim::SearchDim;
use nmrcore::error::{PeakError, Result};
use nmrcore::session::Session;

use crate::cluster::clusterer::Clusterer;

struct Participant {
    id: ListId,
    search_dims: Vec<SearchDim>,
}

/// Orders the participating lists with the reference first and checks their search dimensions.
fn participants(session: &Session, lists: &[&str], ref_list: Option<&str>) -> Result<Vec<Participant>> {
    let mut names: Vec<&str> = Vec::with_capacity(lists.len() + 1);
    if let Some(r) = ref_list {
        names.push(r);
    }
    for name in lists {
        if !names.contains(name) {
            names.push(name);
        }
    }

    let mut out: Vec<Participant> = Vec::with_capacity(names.len());
    for name in names {
        let list = session.list(name)?;
        if list.search_dims().is_empty() {
            return Err(PeakError::NoSearchDims(name.to_string()));
        }
        if let Some(first) = out.first() {
            if first.search_dims.len() != list.search_dims().len() {
                return Err(PeakError::SearchDimMismatch {
                    expected: first.search_dims.len(),
                    actual: list.search_dims().len(),
                });
            }
        }
        // every search dimension must resolve before anything is unlinked
        for peak in list.active_peaks() {
            for sd in list.search_dims() {
                session.resonance_of(PeakDimRef::new(list.id(), peak.id(), sd.dim))?;
            }
        }
        out.push(Participant { id: list.id(), search_dims: list.search_dims().to_vec() });
    }
    Ok(out)
}

/// Links peaks of different lists whose positions agree within the search tolerances.
///
/// Every active peak of the participating lists is first unlinked at its
/// search dimensions and released (status 0). Peaks are then visited list by
/// list, the reference list first, and each free peak contributes the mean
/// shift of its link group at every search dimension. Tolerances are those of
/// the first list. Each resulting cluster has its members linked at each
/// search dimension. Peaks claimed during the scan are released again
/// whether or not the call succeeds.
///
/// # Arguments
///
/// * `session` - owner of the lists and resonances.
/// * `lists` - names of the participating lists.
/// * `ref_list` - optional list processed first; added if not in `lists`.
///
/// # Returns
///
/// The number of clusters with at least two members.
pub fn cluster_peaks(session: &mut Session, lists: &[&str], ref_list: Option<&str>) -> Result<usize> {
    let parts = participants(session, lists, ref_list)?;
    let Some(first) = parts.first() else {
        return Ok(0);
    };
    let tolerances: Vec<f64> = first.search_dims.iter().map(|sd| sd.tol).collect();
    let mut clusterer = Clusterer::new(&tolerances)?;

    for part in &parts {
        for peak in active_peaks(session, part.id) {
            for sd in &part.search_dims {
                session.unlink(PeakDimRef::new(part.id, peak.peak, sd.dim))?;
            }
            session.set_status(peak, 0)?;
        }
    }

    let mut claimed = Vec::new();
    let formed = scan(session, &parts, &mut clusterer, &mut claimed)
        .map(|()| link_clusters(session, &parts, &clusterer));
    for &peak in &claimed {
        if let Err(e) = session.set_status(peak, 0) {
            warn!("could not release {}.{}: {}", peak.list, peak.peak, e);
        }
    }
    let formed = formed?;
    info!("clustered {} lists into {} clusters", parts.len(), formed);
    Ok(formed)
}

/// Feeds every free, fully positioned peak to the clusterer, claiming it.
fn scan(
    session: &mut Session,
    parts: &[Participant],
    clusterer: &mut Clusterer,
    claimed: &mut Vec<PeakRef>,
) -> Result<()> {
    for (list_index, part) in parts.iter().enumerate() {
        for peak in active_peaks(session, part.id) {
            if session.peak(peak)?.status != 0 {
                continue;
            }
            let mut position = Vec::with_capacity(part.search_dims.len());
            for sd in &part.search_dims {
                match session.group_mean_shift(PeakDimRef::new(part.id, peak.peak, sd.dim))? {
                    Some(shift) => position.push(shift),
                    None => break,
                }
            }
            if position.len() != part.search_dims.len() {
                debug!("peak {}.{} has no shift at a search dimension, skipped", part.id, peak.peak);
                continue;
            }
            clusterer.add_item(&position, peak, list_index)?;
            session.set_status(peak, 1)?;
            claimed.push(peak);
        }
    }
    Ok(())
}

/// Links each cluster's members to its first member at every search dimension.
fn link_clusters(session: &mut Session, parts: &[Participant], clusterer: &Clusterer) -> usize {
    let clusters = clusterer.run();
    for cluster in &clusters {
        let anchor = &clusterer.items()[cluster[0]];
        let anchor_dims = &parts[anchor.list_index].search_dims;
        for &member in &cluster[1..] {
            let item = &clusterer.items()[member];
            let member_dims = &parts[item.list_index].search_dims;
            for (a, b) in anchor_dims.iter().zip(member_dims) {
                let ra = PeakDimRef::new(anchor.peak.list, anchor.peak.peak, a.dim);
                let rb = PeakDimRef::new(item.peak.list, item.peak.peak, b.dim);
                if let Err(e) = session.link(ra, rb) {
                    warn!("could not link {} and {}: {}", ra, rb, e);
                }
            }
        }
    }
    clusters.len()
}

fn active_peaks(session: &Session, list: ListId) -> Vec<PeakRef> {
    session
        .list_by_id(list)
        .map(|l| l.active_peaks().map(|p| PeakRef::new(list, p.id())).collect())
        .unwrap_or_default()
}
