use serde::Serialize;

use super::scaler::StandardScaler;

// ============================================================================
// REFERENCE DISTRIBUTION
// ============================================================================

/// Frozen standardized reference sample, stored column-wise.
///
/// Each column is sorted ascending so ECDF lookups are binary searches.
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceDistribution {
    pub layout_hash: u32,
    pub feature_names: Vec<String>,
    columns: Vec<Vec<f64>>,
    samples: usize,
}

impl ReferenceDistribution {
    /// Build from standardized rows. Rows must all have `feature_names.len()`
    /// values.
    pub fn from_rows(layout_hash: u32, feature_names: Vec<String>, rows: &[Vec<f64>]) -> Self {
        let width = feature_names.len();
        let mut columns: Vec<Vec<f64>> = (0..width).map(|_| Vec::with_capacity(rows.len())).collect();

        for row in rows {
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(*value);
            }
        }
        for column in &mut columns {
            column.sort_by(f64::total_cmp);
        }

        Self {
            layout_hash,
            feature_names,
            columns,
            samples: rows.len(),
        }
    }

    /// Sorted reference values of feature `index`
    pub fn column(&self, index: usize) -> Option<&[f64]> {
        self.columns.get(index).map(Vec::as_slice)
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn n_samples(&self) -> usize {
        self.samples
    }
}

// ============================================================================
// FITTED REFERENCE
// ============================================================================

/// Output of the startup fit: transform + the baseline drift is measured against
#[derive(Debug, Clone)]
pub struct FittedReference {
    pub scaler: StandardScaler,
    pub reference: ReferenceDistribution,
    /// Entity ids listed by the store but without a stored record
    pub skipped_entities: usize,
}
