//! Drift Module - input distribution shift against the startup reference
//!
//! Advisory only: a verdict never blocks a prediction.

pub mod ks;
pub mod detector;


pub use detector::{Correction, DriftConfig, DriftDetector, DriftOutcome, DriftVerdict, Indeterminate, DEFAULT_P_VALUE};
