//! Feature Encoder - request payload → schema-ordered vector
//!
//! Best-effort by contract: `encode` never fails. Malformed or missing
//! numerics fall back to the column default, unknown categorical labels
//! fall back to the all-zero baseline bucket. Every fallback is recorded in
//! the returned [`EncodeReport`].

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::layout::{FeatureKind, FeatureSchema, NumericType};
use super::vector::FeatureVector;

/// Unordered field name → primitive value mapping from a caller
pub type RawRequest = serde_json::Map<String, Value>;

// ============================================================================
// ENCODING PLAN
// ============================================================================

#[derive(Debug, Clone)]
enum ColumnPlan {
    Numeric {
        index: usize,
        field: String,
        numeric_type: NumericType,
        default: f64,
    },
    Binary {
        index: usize,
        field: String,
        positive_label: String,
    },
}

#[derive(Debug, Clone)]
struct GroupPlan {
    field: String,
    baseline: String,
    columns: HashMap<String, usize>,
}

/// Fallbacks taken while encoding one payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodeReport {
    /// Numeric fields absent from the payload
    pub missing: Vec<String>,
    /// Numeric fields present but unparseable
    pub malformed: Vec<String>,
    /// `(field, label)` pairs outside the enumerated labels
    pub unrecognized: Vec<(String, String)>,
}

impl EncodeReport {
    pub fn is_clean(&self) -> bool {
        self.malformed.is_empty() && self.unrecognized.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct EncodedFeatures {
    pub vector: FeatureVector,
    pub report: EncodeReport,
}

// ============================================================================
// FEATURE ENCODER
// ============================================================================

#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    schema: Arc<FeatureSchema>,
    columns: Vec<ColumnPlan>,
    groups: Vec<GroupPlan>,
}

impl FeatureEncoder {
    /// Build the per-column parsing plan. `schema` must already be validated.
    pub fn new(schema: Arc<FeatureSchema>) -> Self {
        let mut columns = Vec::new();

        for (index, feature) in schema.features.iter().enumerate() {
            match &feature.kind {
                FeatureKind::Numeric { field, numeric_type, default } => {
                    columns.push(ColumnPlan::Numeric {
                        index,
                        field: field.clone(),
                        numeric_type: *numeric_type,
                        default: *default,
                    });
                }
                FeatureKind::Binary { field, positive_label } => {
                    columns.push(ColumnPlan::Binary {
                        index,
                        field: field.clone(),
                        positive_label: positive_label.clone(),
                    });
                }
                FeatureKind::Indicator { .. } => {}
            }
        }

        let groups = schema
            .groups
            .iter()
            .map(|group| GroupPlan {
                field: group.field.clone(),
                baseline: group.baseline.clone(),
                columns: schema
                    .indicator_columns(&group.name)
                    .into_iter()
                    .map(|(index, label)| (label.to_string(), index))
                    .collect(),
            })
            .collect();

        Self { schema, columns, groups }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn encode(&self, payload: &RawRequest) -> EncodedFeatures {
        let mut vector = FeatureVector::zeroed(&self.schema);
        let mut report = EncodeReport::default();

        for column in &self.columns {
            match column {
                ColumnPlan::Numeric { index, field, numeric_type, default } => {
                    let value = match payload.get(field) {
                        None | Some(Value::Null) => {
                            report.missing.push(field.clone());
                            *default
                        }
                        Some(raw) => parse_numeric(raw, *numeric_type).unwrap_or_else(|| {
                            report.malformed.push(field.clone());
                            *default
                        }),
                    };
                    vector.set(*index, value);
                }
                ColumnPlan::Binary { index, field, positive_label } => {
                    let hit = payload.get(field).and_then(Value::as_str) == Some(positive_label.as_str());
                    vector.set(*index, if hit { 1.0 } else { 0.0 });
                }
            }
        }

        for group in &self.groups {
            let label = match payload.get(&group.field) {
                None | Some(Value::Null) => continue,
                Some(Value::String(s)) => s.as_str(),
                Some(other) => {
                    report.unrecognized.push((group.field.clone(), other.to_string()));
                    continue;
                }
            };

            if let Some(index) = group.columns.get(label) {
                vector.set(*index, 1.0);
            } else if label != group.baseline {
                report.unrecognized.push((group.field.clone(), label.to_string()));
            }
        }

        EncodedFeatures { vector, report }
    }
}

/// Parse a primitive into the declared numeric subtype.
///
/// Integers truncate fractional JSON numbers but reject fractional strings.
fn parse_numeric(raw: &Value, numeric_type: NumericType) -> Option<f64> {
    let value = match (raw, numeric_type) {
        (Value::Number(n), NumericType::Integer) => match n.as_i64() {
            Some(i) => i as f64,
            None => n.as_f64()?.trunc(),
        },
        (Value::Number(n), NumericType::Float) => n.as_f64()?,
        (Value::String(s), NumericType::Integer) => s.trim().parse::<i64>().ok()? as f64,
        (Value::String(s), NumericType::Float) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    value.is_finite().then_some(value)
}
