//! Economic Scenario Generator: Monte-Carlo simulation of interest-rate and
//! equity paths under Hull-White and Black-Scholes models, written to a
//! seekable binary artifact and checked against analytic expectations.

// === Public Modules (The Canonical Paths) ===
pub mod config;
pub mod error;
pub mod models;
pub mod validation;

// === Private Implementation Details ===
mod codec;
mod graph;
mod random;
mod settings;
mod simulation;
mod types;
mod yield_curve;

// === Facades (Re-exporting internals) ===
pub use crate::codec::{OutputKey, Reader, Writer};
pub use crate::random::GaussianSource;
pub use crate::settings::InitialisedSettings;
pub use crate::types::{param, params_from, AnalysisId, Frequency, ModelId, OutputType, Parameters};
pub use crate::yield_curve::{extract_yield_curve, YieldCurve};

// === Convenience ===
pub mod sorted_vec_map;
pub use crate::simulation::generate;
