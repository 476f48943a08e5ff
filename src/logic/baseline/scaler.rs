//! Standardization - per-feature mean / scale fitted once on reference data

use serde::{Deserialize, Serialize};

use crate::logic::features::{FeatureSchema, FeatureVector, LayoutMismatchError};

/// Scales below this are treated as constant features (scale 1.0)
const MIN_SCALE: f64 = 10.0 * f64::EPSILON;

#[derive(Debug, thiserror::Error)]
pub enum ScalerError {
    #[error("Cannot fit scaler on an empty matrix")]
    Empty,

    #[error("Row {row} has {actual} values, expected {expected}")]
    RaggedRow { row: usize, expected: usize, actual: usize },
}

/// A vector in standardized space; only ever produced by [`StandardScaler`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardizedVector {
    values: Vec<f64>,
}

impl StandardizedVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
impl From<Vec<f64>> for StandardizedVector {
    fn from(values: Vec<f64>) -> Self {
        Self { values }
    }
}

/// Fitted standardization parameters (population std, like sklearn)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub layout_hash: u32,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    pub samples: usize,
}

impl StandardScaler {
    pub fn fit(schema: &FeatureSchema, rows: &[Vec<f64>]) -> Result<Self, ScalerError> {
        let width = schema.len();
        if rows.is_empty() {
            return Err(ScalerError::Empty);
        }
        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(ScalerError::RaggedRow { row, expected: width, actual: r.len() });
        }

        let n = rows.len() as f64;
        let mut mean = vec![0.0; width];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut variance = vec![0.0; width];
        for row in rows {
            for ((var, v), m) in variance.iter_mut().zip(row).zip(&mean) {
                *var += (v - m).powi(2);
            }
        }

        let scale = variance
            .into_iter()
            .map(|var| {
                let std = (var / n).sqrt();
                if std < MIN_SCALE { 1.0 } else { std }
            })
            .collect();

        Ok(Self {
            layout_hash: schema.layout_hash(),
            mean,
            scale,
            samples: rows.len(),
        })
    }

    pub fn transform(&self, vector: &FeatureVector) -> Result<StandardizedVector, LayoutMismatchError> {
        if vector.layout_hash != self.layout_hash || vector.len() != self.mean.len() {
            return Err(LayoutMismatchError {
                expected_hash: self.layout_hash,
                expected_len: self.mean.len(),
                actual_hash: vector.layout_hash,
                actual_len: vector.len(),
            });
        }
        Ok(StandardizedVector { values: self.transform_row(vector.as_slice()) })
    }

    /// Transform a raw row already known to have the fitted width
    pub(crate) fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(schema: &FeatureSchema) -> Vec<Vec<f64>> {
        (0..10)
            .map(|i| (0..schema.len()).map(|j| (i * (j % 3)) as f64).collect())
            .collect()
    }

    #[test]
    fn test_fit_mean_and_scale() {
        let schema = FeatureSchema::churn_v1();
        let scaler = StandardScaler::fit(&schema, &rows(&schema)).unwrap();

        // column 1: values 0..9 → mean 4.5, population std sqrt(8.25)
        assert!((scaler.mean[1] - 4.5).abs() < 1e-12);
        assert!((scaler.scale[1] - 8.25f64.sqrt()).abs() < 1e-12);
        // column 0 is constant zero → scale 1
        assert_eq!(scaler.scale[0], 1.0);
        assert_eq!(scaler.samples, 10);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let schema = FeatureSchema::churn_v1();
        let scaler = StandardScaler::fit(&schema, &rows(&schema)).unwrap();
        let raw = FeatureVector::from_values(&schema, vec![3.0; schema.len()]).unwrap();

        let a = scaler.transform(&raw).unwrap();
        let b = scaler.transform(&raw).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), schema.len());
    }

    #[test]
    fn test_fit_rejects_empty_and_ragged() {
        let schema = FeatureSchema::churn_v1();
        assert!(matches!(StandardScaler::fit(&schema, &[]), Err(ScalerError::Empty)));
        assert!(matches!(
            StandardScaler::fit(&schema, &[vec![1.0; 5]]),
            Err(ScalerError::RaggedRow { row: 0, expected: 32, actual: 5 })
        ));
    }

    #[test]
    fn test_transform_rejects_foreign_vector() {
        let schema = FeatureSchema::churn_v1();
        let scaler = StandardScaler::fit(&schema, &rows(&schema)).unwrap();
        let mut raw = FeatureVector::zeroed(&schema);
        raw.layout_hash ^= 1;
        assert!(scaler.transform(&raw).is_err());
    }
}
