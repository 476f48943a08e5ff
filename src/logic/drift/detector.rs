//! KS Drift Detector - per-feature KS tests against the frozen reference
//!
//! Feature-wise p-values are aggregated with a multiple-testing correction
//! into one verdict. The detector never mutates after construction and is
//! shared read-only by every request.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ks::ks_2samp;
use crate::logic::baseline::{ReferenceDistribution, StandardizedVector};

// ============================================================================
// CONSTANTS
// ============================================================================

pub const DEFAULT_P_VALUE: f64 = 0.05;

// ============================================================================
// CONFIG
// ============================================================================

/// How per-feature p-values combine into the family-wise verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Correction {
    /// Drift iff any p < p_val / n_features
    Bonferroni,
    /// Benjamini–Hochberg false discovery rate at level p_val
    Fdr,
}

impl FromStr for Correction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bonferroni" => Ok(Correction::Bonferroni),
            "fdr" => Ok(Correction::Fdr),
            other => Err(format!("unknown correction '{}', expected bonferroni or fdr", other)),
        }
    }
}

impl fmt::Display for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Correction::Bonferroni => write!(f, "bonferroni"),
            Correction::Fdr => write!(f, "fdr"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Family-wise significance level
    pub p_val: f64,
    pub correction: Correction,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            p_val: DEFAULT_P_VALUE,
            correction: Correction::Bonferroni,
        }
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DriftVerdict {
    pub is_drift: bool,
    /// Per-feature p-values, schema order
    pub p_values: Vec<f64>,
    /// Per-feature KS distances, schema order
    pub distances: Vec<f64>,
    /// Effective per-feature threshold after correction
    pub threshold: f64,
    pub batch_size: usize,
}

impl DriftVerdict {
    pub fn min_p_value(&self) -> f64 {
        self.p_values.iter().copied().fold(1.0, f64::min)
    }

    /// Features ordered by ascending p-value
    pub fn top_features<'a>(&self, names: &'a [String], limit: usize) -> Vec<(&'a str, f64)> {
        let mut ranked: Vec<(&str, f64)> = names
            .iter()
            .map(String::as_str)
            .zip(self.p_values.iter().copied())
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        ranked.truncate(limit);
        ranked
    }
}

/// Why a batch produced no verdict
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Indeterminate {
    #[error("empty batch")]
    EmptyBatch,

    #[error("vector {row} has {actual} features, reference has {expected}")]
    Dimension { row: usize, expected: usize, actual: usize },

    #[error("non-finite value in vector {row}, feature {feature}")]
    NonFinite { row: usize, feature: usize },

    #[error("reference column {0} is empty")]
    EmptyReference(usize),
}

#[derive(Debug, Clone)]
pub enum DriftOutcome {
    Verdict(DriftVerdict),
    Indeterminate(Indeterminate),
}

impl DriftOutcome {
    /// `Some(is_drift)` for a verdict, `None` when indeterminate
    pub fn is_drift(&self) -> Option<bool> {
        match self {
            DriftOutcome::Verdict(v) => Some(v.is_drift),
            DriftOutcome::Indeterminate(_) => None,
        }
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

#[derive(Debug, Clone)]
pub struct DriftDetector {
    reference: Arc<ReferenceDistribution>,
    config: DriftConfig,
}

impl DriftDetector {
    pub fn new(reference: Arc<ReferenceDistribution>, config: DriftConfig) -> Self {
        Self { reference, config }
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    pub fn feature_names(&self) -> &[String] {
        &self.reference.feature_names
    }

    pub fn check(&self, batch: &[StandardizedVector]) -> DriftOutcome {
        match self.score(batch) {
            Ok(verdict) => DriftOutcome::Verdict(verdict),
            Err(reason) => DriftOutcome::Indeterminate(reason),
        }
    }

    fn score(&self, batch: &[StandardizedVector]) -> Result<DriftVerdict, Indeterminate> {
        if batch.is_empty() {
            return Err(Indeterminate::EmptyBatch);
        }

        let width = self.reference.n_features();
        for (row, vector) in batch.iter().enumerate() {
            if vector.len() != width {
                return Err(Indeterminate::Dimension { row, expected: width, actual: vector.len() });
            }
            if let Some(feature) = vector.as_slice().iter().position(|v| !v.is_finite()) {
                return Err(Indeterminate::NonFinite { row, feature });
            }
        }

        let mut p_values = Vec::with_capacity(width);
        let mut distances = Vec::with_capacity(width);
        let mut sample = Vec::with_capacity(batch.len());

        for feature in 0..width {
            sample.clear();
            sample.extend(batch.iter().map(|v| v.as_slice()[feature]));
            sample.sort_by(f64::total_cmp);

            let reference = self.reference.column(feature).unwrap_or(&[]);
            let result = ks_2samp(reference, &sample).ok_or(Indeterminate::EmptyReference(feature))?;

            p_values.push(result.p_value);
            distances.push(result.statistic);
        }

        let (is_drift, threshold) = match self.config.correction {
            Correction::Bonferroni => bonferroni(&p_values, self.config.p_val),
            Correction::Fdr => fdr(&p_values, self.config.p_val),
        };

        Ok(DriftVerdict {
            is_drift,
            p_values,
            distances,
            threshold,
            batch_size: batch.len(),
        })
    }
}

fn bonferroni(p_values: &[f64], p_val: f64) -> (bool, f64) {
    let threshold = p_val / p_values.len().max(1) as f64;
    (p_values.iter().any(|p| *p < threshold), threshold)
}

/// Benjamini–Hochberg: reject when the k-th smallest p is below q·k/n
fn fdr(p_values: &[f64], q: f64) -> (bool, f64) {
    let n = p_values.len().max(1) as f64;
    let mut sorted = p_values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let largest = sorted
        .iter()
        .enumerate()
        .filter(|(i, p)| **p < q * (*i + 1) as f64 / n)
        .map(|(i, _)| i)
        .last();

    match largest {
        Some(i) => (true, q * (i + 1) as f64 / n),
        None => (false, q / n),
    }
}
