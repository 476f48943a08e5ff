//! Core logic, independent of the HTTP layer
//!
//! - `features`: schema registry and request encoding
//! - `baseline`: feature store, scaler, reference fit
//! - `drift`: KS drift detector
//! - `model`: artifacts and classifiers
//! - `gateway`: per-request pipeline

pub mod features;
pub mod baseline;
pub mod drift;
pub mod model;
pub mod gateway;

#[cfg(test)]
pub(crate) mod testing;
