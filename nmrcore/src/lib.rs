// error module
pub mod error;

// data module
pub mod data {
    pub mod resonance;
    pub mod spectral_dim;
    pub mod peak_dim;
    pub mod peak;
    pub mod peak_list;
}

// algorithm module
pub mod algorithm {
    pub mod coupling;
    pub mod multiplet;
    pub mod fold;
    pub mod region;
}

// session module
pub mod session;
