use nmrcore::algorithm::coupling::{Coupling, CouplingItem, CouplingPattern};
use nmrcore::data::peak::PeakRef;
use nmrcore::data::peak_dim::PeakDimRef;
use nmrcore::data::spectral_dim::{SearchDim, SpectralDim};
use nmrcore::session::Session;
use nmrpeak::cluster::cluster_peaks::cluster_peaks;
use nmrpeak::path::input::parse_path_input;
use nmrpeak::path::peak_paths::{PathMode, PathSearchParams, PeakPaths};

fn hn_dims() -> Vec<SpectralDim> {
    vec![
        SpectralDim::new("H1", "1H", 8000.0, 800.0),
        SpectralDim::new("N15", "15N", 2400.0, 80.0),
    ]
}

fn two_lists(l2_peak: (f64, f64)) -> Session {
    let mut session = Session::new();
    for name in ["L1", "L2"] {
        session.new_peak_list(name, hn_dims()).unwrap();
        session
            .list_mut(name)
            .unwrap()
            .set_search_dims(vec![SearchDim::new(0, 0.02), SearchDim::new(1, 0.2)])
            .unwrap();
    }
    session.add_peak("L1", &[7.50, 118.0]).unwrap();
    session.add_peak("L2", &[l2_peak.0, l2_peak.1]).unwrap();
    session
}

#[test]
fn clustering_merges_peaks_within_tolerance() {
    let mut session = two_lists((7.51, 118.1));
    assert_eq!(cluster_peaks(&mut session, &["L1", "L2"], None).unwrap(), 1);

    let l1 = session.list_id("L1").unwrap();
    let l2 = session.list_id("L2").unwrap();
    for dim in 0..2 {
        let a = session.peak_dim(PeakDimRef::new(l1, 0, dim)).unwrap().resonance();
        let b = session.peak_dim(PeakDimRef::new(l2, 0, dim)).unwrap().resonance();
        assert_eq!(a, b);
    }
}

#[test]
fn clustering_leaves_distant_peaks_alone() {
    let mut session = two_lists((7.80, 118.0));
    assert_eq!(cluster_peaks(&mut session, &["L1", "L2"], None).unwrap(), 0);
    let l1 = session.list_id("L1").unwrap();
    assert_eq!(session.link_group(PeakDimRef::new(l1, 0, 0)).unwrap().len(), 1);
}

#[test]
fn doublet_of_doublets_components() {
    let pattern = CouplingPattern::new(vec![CouplingItem::new(3.0, 2), CouplingItem::new(7.0, 2)]).unwrap();
    let coupling = Coupling::Pattern(pattern);
    assert_eq!(coupling.multiplicity(), "dd");

    let comps = coupling.rel_components();
    let offsets: Vec<f64> = comps.iter().map(|c| c.offset).collect();
    let expected = [5.0, 2.0, -2.0, -5.0];
    assert_eq!(offsets.len(), 4);
    for (o, e) in offsets.iter().zip(expected) {
        assert!((o - e).abs() < 1e-9, "offset {} != {}", o, e);
    }
    let first = comps[0].amplitude;
    assert!(comps.iter().all(|c| (c.amplitude - first).abs() < 1e-12));
}

#[test]
fn path_over_three_conditions() {
    let mut session = Session::new();
    for (name, peaks) in [
        ("cond0", vec![(8.0, 120.0)]),
        ("cond1", vec![(8.02, 120.01), (8.06, 120.05)]),
        ("cond2", vec![(8.3, 121.0)]),
    ] {
        session.new_peak_list(name, hn_dims()).unwrap();
        for (h, n) in peaks {
            session.add_peak(name, &[h, n]).unwrap();
        }
    }

    let rows = parse_path_input("# series\ncond0 0.0\ncond1 0.5\ncond2 1.0 100\n").unwrap();
    let mut paths =
        PeakPaths::from_input(&session, "series", &rows, vec![0, 1], vec![1.0, 1.0], PathMode::Titration).unwrap();
    assert_eq!(paths.init_paths(&mut session).unwrap(), 1);

    let start = PeakRef::new(session.list_id("cond0").unwrap(), 0);
    let near = paths.get_near_peaks(&session, start, 0.1).unwrap();
    assert_eq!(near[1][0].peak, PeakRef::new(session.list_id("cond1").unwrap(), 0));
    assert!(near[2].is_empty());

    paths.extend_paths(&mut session, &PathSearchParams { radii: vec![0.1] }).unwrap();
    let path = paths.path(0).unwrap();
    assert!(path.slot(1).is_some());
    assert!(path.slot(2).is_none());
    assert!(!path.is_complete());
    assert_eq!(session.peak(path.slot(1).unwrap().peak).unwrap().status, 1);
}
