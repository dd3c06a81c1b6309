//! Segmented spectral data and cross-channel correlation tensor for
//! stochastic-background inference with a three-channel space interferometer.
//!
//! A run plans half-overlapping splices over the observation window, obtains
//! the raw channel triplet (synthesized or read from disk), moves it into
//! the analysis basis, converts every splice to a frequency series and
//! builds the `(K, S, 3, 3)` correlation tensor consumed by the likelihood.

pub mod args;
pub mod channels;
pub mod config;
pub mod correlation;
pub mod datafile;
pub mod diag;
pub mod error;
pub mod params;
pub mod pipeline;
pub mod plot;
pub mod product;
pub mod schedule;
pub mod spectral;
pub mod synth;
pub mod utils;
