use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use flexi_logger::Logger;
use itertools::Itertools;
use log::info;
use serde::Serialize;

use nmrcore::data::peak::PeakRef;
use nmrcore::data::peak_dim::PeakDimRef;
use nmrcore::session::Session;
use nmrpeak::cluster::cluster_peaks::cluster_peaks;
use nmrpeak::path::input::parse_path_input;
use nmrpeak::path::peak_paths::{PathMode, PathSearchParams, PeakPaths};

#[derive(Parser)]
#[command(name = "nmrpeak")]
#[command(about = "Cluster NMR peak lists and track peaks across condition series", long_about = None)]
struct Cli {
    /// Log specification, e.g. `info` or `nmrpeak=debug`
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Link peaks of several lists that agree within their search tolerances
    Cluster {
        /// Session snapshot (JSON)
        #[arg(short, long)]
        session: PathBuf,

        /// Lists to cluster (comma-separated)
        #[arg(long, value_delimiter = ',', required = true)]
        lists: Vec<String>,

        /// List processed first; its tolerances are used
        #[arg(long)]
        reference: Option<String>,

        /// Write the updated session here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Follow peaks of the first list through a series of lists
    Paths {
        /// Session snapshot (JSON)
        #[arg(short, long)]
        session: PathBuf,

        /// Series file: `<dataset> <x0> [<x1>]` per line
        #[arg(short, long)]
        input: PathBuf,

        /// Peak dimensions compared (comma-separated)
        #[arg(long, value_delimiter = ',', default_value = "0,1")]
        dims: Vec<usize>,

        /// Per-dimension weights (comma-separated)
        #[arg(long, value_delimiter = ',', default_value = "1.0,5.0")]
        weights: Vec<f64>,

        /// Search radii, smallest tried first (comma-separated)
        #[arg(long, value_delimiter = ',')]
        radii: Option<Vec<f64>>,

        /// Series kind: titration or pressure
        #[arg(long, default_value = "titration")]
        mode: String,

        /// Write the updated session here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct ClusterReport {
    clusters: usize,
    groups: Vec<Vec<String>>,
}

#[derive(Serialize)]
struct PathReport {
    first: String,
    peaks: Vec<Option<String>>,
    distances: Vec<Option<f64>>,
    radius: f64,
    complete: bool,
}

fn load_session(path: &Path) -> Result<Session, Box<dyn Error>> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn save_session(session: &Session, path: &Path) -> Result<(), Box<dyn Error>> {
    fs::write(path, serde_json::to_string_pretty(session)?)?;
    info!("session written to {}", path.display());
    Ok(())
}

fn peak_name(session: &Session, peak: PeakRef) -> String {
    match session.list_by_id(peak.list) {
        Some(list) => format!("{}.{}", list.name, peak.peak),
        None => format!("{}.{}", peak.list, peak.peak),
    }
}

fn run_cluster(
    session: &mut Session,
    lists: &[String],
    reference: Option<&str>,
) -> Result<ClusterReport, Box<dyn Error>> {
    let names: Vec<&str> = lists.iter().map(String::as_str).collect();
    let clusters = cluster_peaks(session, &names, reference)?;

    let anchor_name = reference.or(names.first().copied()).ok_or("no lists given")?;
    let anchor = session.list(anchor_name)?;
    let Some(sd) = anchor.search_dims().first() else {
        return Ok(ClusterReport { clusters, groups: Vec::new() });
    };
    let mut groups = Vec::new();
    for peak in anchor.active_peaks() {
        let group = session.link_group(PeakDimRef::new(anchor.id(), peak.id(), sd.dim))?;
        if group.len() > 1 {
            groups.push(
                group
                    .iter()
                    .map(|r| peak_name(session, PeakRef::new(r.list, r.peak)))
                    .collect(),
            );
        }
    }
    Ok(ClusterReport { clusters, groups })
}

fn run_paths(
    session: &mut Session,
    input: &Path,
    dims: Vec<usize>,
    weights: Vec<f64>,
    radii: Option<Vec<f64>>,
    mode: PathMode,
) -> Result<Vec<PathReport>, Box<dyn Error>> {
    let rows = parse_path_input(&fs::read_to_string(input)?)?;
    let name = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "paths".to_string());
    let mut paths = PeakPaths::from_input(session, &name, &rows, dims, weights, mode)?;
    info!(
        "{}: {} over {}",
        name,
        mode,
        paths.list_ids().iter().map(|&id| session.list_by_id(id).map(|l| l.name.as_str()).unwrap_or("?")).join(", ")
    );

    paths.init_paths(session)?;
    let params = radii.map(|radii| PathSearchParams { radii }).unwrap_or_default();
    paths.extend_paths(session, &params)?;

    Ok(paths
        .paths()
        .iter()
        .map(|path| PathReport {
            first: peak_name(session, path.first_peak()),
            peaks: path.peak_dists().iter().map(|s| s.as_ref().map(|pd| peak_name(session, pd.peak))).collect(),
            distances: path.peak_dists().iter().map(|s| s.as_ref().map(|pd| pd.distance)).collect(),
            radius: path.radius(),
            complete: path.is_complete(),
        })
        .collect())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let _logger = Logger::try_with_str(&cli.log_level)?.start()?;

    match cli.command {
        Command::Cluster { session, lists, reference, output } => {
            let mut state = load_session(&session)?;
            let report = run_cluster(&mut state, &lists, reference.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if let Some(out) = output {
                save_session(&state, &out)?;
            }
        }
        Command::Paths { session, input, dims, weights, radii, mode, output } => {
            let mut state = load_session(&session)?;
            let mode: PathMode = mode.parse()?;
            let report = run_paths(&mut state, &input, dims, weights, radii, mode)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if let Some(out) = output {
                save_session(&state, &out)?;
            }
        }
    }
    Ok(())
}
