//! Feature Vector - Core data structure for model input
//!
//! Carries the layout hash of the schema that produced it so a vector can
//! never be silently fed to a component built for another layout.

use serde::{Deserialize, Serialize};

use super::layout::FeatureSchema;

// ============================================================================
// LAYOUT MISMATCH
// ============================================================================

/// Error when a vector doesn't match the expected layout
#[derive(Debug, Clone, thiserror::Error)]
#[error("Feature layout mismatch: expected {expected_len} features (hash: {expected_hash:08x}), got {actual_len} (hash: {actual_hash:08x})")]
pub struct LayoutMismatchError {
    pub expected_hash: u32,
    pub expected_len: usize,
    pub actual_hash: u32,
    pub actual_len: usize,
}

// ============================================================================
// FEATURE VECTOR
// ============================================================================

/// Schema-ordered numeric encoding of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// CRC32 hash of the feature layout (for mismatch detection)
    pub layout_hash: u32,
    /// Feature values in schema order
    values: Vec<f64>,
}

impl FeatureVector {
    /// Create a zeroed vector for `schema`
    pub fn zeroed(schema: &FeatureSchema) -> Self {
        Self {
            layout_hash: schema.layout_hash(),
            values: vec![0.0; schema.len()],
        }
    }

    /// Create from raw values; length must match the schema
    pub fn from_values(schema: &FeatureSchema, values: Vec<f64>) -> Result<Self, LayoutMismatchError> {
        let layout_hash = schema.layout_hash();
        if values.len() != schema.len() {
            return Err(LayoutMismatchError {
                expected_hash: layout_hash,
                expected_len: schema.len(),
                actual_hash: layout_hash,
                actual_len: values.len(),
            });
        }
        Ok(Self { layout_hash, values })
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Set feature by index; out of range indices are ignored
    pub fn set(&mut self, index: usize, value: f64) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    /// Single precision copy for tensor backends
    pub fn to_f32(&self) -> Vec<f32> {
        self.values.iter().map(|v| *v as f32).collect()
    }

    /// Validate that this vector was produced for `schema`
    pub fn validate(&self, schema: &FeatureSchema) -> Result<(), LayoutMismatchError> {
        let expected_hash = schema.layout_hash();
        if self.layout_hash != expected_hash || self.values.len() != schema.len() {
            return Err(LayoutMismatchError {
                expected_hash,
                expected_len: schema.len(),
                actual_hash: self.layout_hash,
                actual_len: self.values.len(),
            });
        }
        Ok(())
    }

    /// Convert to JSON-serializable format for logging
    pub fn to_log_entry(&self, schema: &FeatureSchema) -> serde_json::Value {
        serde_json::json!({
            "layout_hash": self.layout_hash,
            "named_values": schema.order().into_iter()
                .zip(self.values.iter())
                .map(|(name, value)| (name.to_string(), *value))
                .collect::<std::collections::BTreeMap<_, _>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_vector_matches_schema() {
        let schema = FeatureSchema::churn_v1();
        let v = FeatureVector::zeroed(&schema);
        assert_eq!(v.len(), schema.len());
        assert!(v.as_slice().iter().all(|x| *x == 0.0));
        assert!(v.validate(&schema).is_ok());
    }

    #[test]
    fn test_from_values_rejects_wrong_length() {
        let schema = FeatureSchema::churn_v1();
        let result = FeatureVector::from_values(&schema, vec![1.0; 3]);
        let err = result.unwrap_err();
        assert_eq!(err.expected_len, 32);
        assert_eq!(err.actual_len, 3);
    }

    #[test]
    fn test_validate_rejects_foreign_layout() {
        let schema = FeatureSchema::churn_v1();
        let mut v = FeatureVector::zeroed(&schema);
        v.layout_hash = !v.layout_hash;
        assert!(v.validate(&schema).is_err());
    }

    #[test]
    fn test_set_out_of_range_is_ignored() {
        let schema = FeatureSchema::churn_v1();
        let mut v = FeatureVector::zeroed(&schema);
        v.set(100, 1.0);
        v.set(6, 45.0);
        assert_eq!(v.get(6), Some(45.0));
        assert_eq!(v.get(100), None);
    }

    #[test]
    fn test_log_entry_names_values() {
        let schema = FeatureSchema::churn_v1();
        let mut v = FeatureVector::zeroed(&schema);
        v.set(6, 45.0);

        let entry = v.to_log_entry(&schema);
        assert_eq!(entry["layout_hash"], schema.layout_hash());
        assert_eq!(entry["named_values"][schema.order()[6]], 45.0);
        assert_eq!(entry["named_values"].as_object().unwrap().len(), 32);
    }
}
