// src/lib.rs
pub mod cluster {
    pub mod clusterer;
    pub mod cluster_peaks;
}

pub mod path {
    pub mod peak_path;
    pub mod peak_paths;
    pub mod input;
}
