//! Feature Layout - Centralized Feature Schema
//!
//! **CRITICAL: This file controls the model input schema**
//!
//! ## Rules (NEVER break these):
//! 1. Add feature → increment FEATURE_VERSION
//! 2. Change order → increment FEATURE_VERSION
//! 3. Change a group baseline → increment FEATURE_VERSION
//!
//! The column order must be identical to the order the classifier was
//! trained on. Categorical groups are one-hot encoded with the first sorted
//! label dropped; that dropped label is recorded as the group `baseline` and
//! is what an all-zero group means at serving time.

use std::collections::HashSet;
use std::path::Path;

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current built-in layout version
/// MUST be incremented when `churn_v1` changes
pub const FEATURE_VERSION: u8 = 1;

/// Default value substituted for missing or malformed numeric fields
pub const NUMERIC_DEFAULT: f64 = 0.0;

// ============================================================================
// FEATURE KINDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericType {
    Integer,
    Float,
}

/// Semantic type of one schema column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureKind {
    /// Passthrough numeric value read from `field`
    Numeric {
        field: String,
        numeric_type: NumericType,
        #[serde(default)]
        default: f64,
    },
    /// 1 when `field` equals `positive_label`, else 0
    Binary {
        field: String,
        positive_label: String,
    },
    /// One-hot indicator of `label` within categorical `group`
    Indicator {
        group: String,
        label: String,
    },
}

impl FeatureKind {
    pub fn is_indicator(&self) -> bool {
        matches!(self, FeatureKind::Indicator { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: FeatureKind,
}

/// A drop-first one-hot encoded categorical variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalGroup {
    /// Column prefix used at training time, e.g. `Education_Level`
    pub name: String,
    /// Request field carrying the label, e.g. `education_level`
    pub field: String,
    /// Label dropped during training; encoded as all-zero
    pub baseline: String,
    /// Labels with their own indicator column
    pub labels: Vec<String>,
}

// ============================================================================
// SCHEMA ERRORS
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Duplicate feature name: {0}")]
    DuplicateFeature(String),

    #[error("Indicator column {column} references undeclared group {group}")]
    UnknownGroup { column: String, group: String },

    #[error("Group {group}: label {label} has {count} indicator columns (expected 1)")]
    IndicatorCount { group: String, label: String, count: usize },

    #[error("Group {group}: baseline label {baseline} must not have an indicator column")]
    BaselineEncoded { group: String, baseline: String },

    #[error("Schema is empty")]
    Empty,

    #[error("Model expects {expected} features, schema has {actual}")]
    ModelWidth { expected: usize, actual: usize },

    #[error("Model feature #{index} is {model}, schema has {schema}")]
    ModelOrder { index: usize, model: String, schema: String },

    #[error("Failed to read schema artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse schema artifact: {0}")]
    Parse(#[from] serde_json::Error),
}

// ============================================================================
// FEATURE SCHEMA
// ============================================================================

/// Ordered, named model input features.
///
/// Serializes to the schema artifact shared by training and serving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub name: String,
    pub version: u8,
    pub features: Vec<FeatureSpec>,
    pub groups: Vec<CategoricalGroup>,
}

impl FeatureSchema {
    /// Built-in churn schema, in training column order
    pub fn churn_v1() -> Self {
        use NumericType::{Float, Integer};

        let features = vec![
            numeric("Contacts_Count_12_mon", "contacts_count", Integer),
            numeric("Months_Inactive_12_mon", "months_inactive", Integer),
            indicator("Education_Level", "Doctorate"),
            indicator("Income_Category", "Less than $40K"),
            indicator("Marital_Status", "Single"),
            numeric("Dependent_count", "dependent_count", Integer),
            numeric("Customer_Age", "customer_age", Integer),
            numeric("Months_on_book", "months_on_book", Integer),
            indicator("Education_Level", "Post-Graduate"),
            indicator("Card_Category", "Platinum"),
            indicator("Education_Level", "Unknown"),
            indicator("Marital_Status", "Unknown"),
            indicator("Income_Category", "Unknown"),
            indicator("Card_Category", "Gold"),
            numeric("Avg_Open_To_Buy", "avg_open_to_buy", Float),
            indicator("Education_Level", "Uneducated"),
            indicator("Income_Category", "$80K - $120K"),
            indicator("Card_Category", "Silver"),
            indicator("Education_Level", "Graduate"),
            indicator("Income_Category", "$40K - $60K"),
            indicator("Education_Level", "High School"),
            indicator("Marital_Status", "Married"),
            numeric("Credit_Limit", "credit_limit", Float),
            indicator("Income_Category", "$60K - $80K"),
            FeatureSpec {
                name: "Gender".to_string(),
                kind: FeatureKind::Binary {
                    field: "gender".to_string(),
                    positive_label: "M".to_string(),
                },
            },
            numeric("Total_Amt_Chng_Q4_Q1", "total_amt_chng", Float),
            numeric("Total_Relationship_Count", "total_relationship_count", Integer),
            numeric("Total_Trans_Amt", "total_trans_amt", Float),
            numeric("Avg_Utilization_Ratio", "avg_utilization_ratio", Float),
            numeric("Total_Revolving_Bal", "total_revolving_bal", Float),
            numeric("Total_Ct_Chng_Q4_Q1", "total_ct_chng", Float),
            numeric("Total_Trans_Ct", "total_trans_ct", Integer),
        ];

        let groups = vec![
            group(
                "Education_Level",
                "education_level",
                "College",
                &["Doctorate", "Post-Graduate", "Graduate", "High School", "Uneducated", "Unknown"],
            ),
            group("Marital_Status", "marital_status", "Divorced", &["Single", "Married", "Unknown"]),
            group(
                "Income_Category",
                "income_category",
                "$120K +",
                &["Less than $40K", "$40K - $60K", "$60K - $80K", "$80K - $120K", "Unknown"],
            ),
            group("Card_Category", "card_category", "Blue", &["Platinum", "Gold", "Silver"]),
        ];

        Self {
            name: "churn".to_string(),
            version: FEATURE_VERSION,
            features,
            groups,
        }
    }

    /// Load and validate a schema artifact
    pub fn from_json_file(path: &Path) -> Result<Self, SchemaError> {
        let raw = std::fs::read_to_string(path)?;
        let schema: FeatureSchema = serde_json::from_str(&raw)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Feature names in vector order
    pub fn order(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn kind(&self, name: &str) -> Option<&FeatureKind> {
        self.features.iter().find(|f| f.name == name).map(|f| &f.kind)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Get feature index by name (O(n) but features are few)
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name == name)
    }

    pub fn feature_name(&self, index: usize) -> Option<&str> {
        self.features.get(index).map(|f| f.name.as_str())
    }

    pub fn group(&self, name: &str) -> Option<&CategoricalGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// `(column index, label)` of every indicator belonging to `group`
    pub fn indicator_columns(&self, group: &str) -> Vec<(usize, &str)> {
        self.features
            .iter()
            .enumerate()
            .filter_map(|(i, f)| match &f.kind {
                FeatureKind::Indicator { group: g, label } if g == group => Some((i, label.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Compute CRC32 hash of the layout.
    /// Used to detect layout mismatches at runtime
    pub fn layout_hash(&self) -> u32 {
        let mut hasher = Hasher::new();

        hasher.update(&[self.version]);

        for feature in &self.features {
            hasher.update(feature.name.as_bytes());
            hasher.update(&[0]);
        }

        // The baseline is part of the encoding contract
        for group in &self.groups {
            hasher.update(group.name.as_bytes());
            hasher.update(&[1]);
            hasher.update(group.baseline.as_bytes());
            hasher.update(&[0]);
        }

        hasher.finalize()
    }

    /// Structural checks run once at startup
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.features.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut seen = HashSet::new();
        for feature in &self.features {
            if !seen.insert(feature.name.as_str()) {
                return Err(SchemaError::DuplicateFeature(feature.name.clone()));
            }
            if let FeatureKind::Indicator { group, .. } = &feature.kind {
                if self.group(group).is_none() {
                    return Err(SchemaError::UnknownGroup {
                        column: feature.name.clone(),
                        group: group.clone(),
                    });
                }
            }
        }

        for group in &self.groups {
            let columns = self.indicator_columns(&group.name);

            if columns.iter().any(|(_, label)| *label == group.baseline) {
                return Err(SchemaError::BaselineEncoded {
                    group: group.name.clone(),
                    baseline: group.baseline.clone(),
                });
            }

            for label in &group.labels {
                let count = columns.iter().filter(|(_, l)| l == label).count();
                if count != 1 {
                    return Err(SchemaError::IndicatorCount {
                        group: group.name.clone(),
                        label: label.clone(),
                        count,
                    });
                }
            }

            if columns.len() != group.labels.len() {
                let stray = columns
                    .iter()
                    .find(|(_, l)| !group.labels.iter().any(|g| g == l))
                    .map(|(_, l)| l.to_string())
                    .unwrap_or_default();
                return Err(SchemaError::IndicatorCount {
                    group: group.name.clone(),
                    label: stray,
                    count: 0,
                });
            }
        }

        Ok(())
    }

    /// Compare the feature names embedded in a model artifact with this
    /// schema. LightGBM replaces whitespace in feature names with `_`, so
    /// names are compared after the same normalisation.
    pub fn verify_model_features(&self, model_features: &[String]) -> Result<(), SchemaError> {
        if model_features.len() != self.len() {
            return Err(SchemaError::ModelWidth {
                expected: model_features.len(),
                actual: self.len(),
            });
        }

        for (index, (model, schema)) in model_features.iter().zip(&self.features).enumerate() {
            if normalize_name(model) != normalize_name(&schema.name) {
                return Err(SchemaError::ModelOrder {
                    index,
                    model: model.clone(),
                    schema: schema.name.clone(),
                });
            }
        }

        Ok(())
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::churn_v1()
    }
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

fn numeric(name: &str, field: &str, numeric_type: NumericType) -> FeatureSpec {
    FeatureSpec {
        name: name.to_string(),
        kind: FeatureKind::Numeric {
            field: field.to_string(),
            numeric_type,
            default: NUMERIC_DEFAULT,
        },
    }
}

fn indicator(group: &str, label: &str) -> FeatureSpec {
    FeatureSpec {
        name: format!("{}_{}", group, label),
        kind: FeatureKind::Indicator {
            group: group.to_string(),
            label: label.to_string(),
        },
    }
}

fn group(name: &str, field: &str, baseline: &str, labels: &[&str]) -> CategoricalGroup {
    CategoricalGroup {
        name: name.to_string(),
        field: field.to_string(),
        baseline: baseline.to_string(),
        labels: labels.iter().map(|l| l.to_string()).collect(),
    }
}

// ============================================================================
// LAYOUT INFO
// ============================================================================

/// Complete layout information for serialization/logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub name: String,
    pub version: u8,
    pub hash: u32,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
    pub groups: Vec<CategoricalGroup>,
}

impl From<&FeatureSchema> for LayoutInfo {
    fn from(schema: &FeatureSchema) -> Self {
        Self {
            name: schema.name.clone(),
            version: schema.version,
            hash: schema.layout_hash(),
            feature_count: schema.len(),
            feature_names: schema.features.iter().map(|f| f.name.clone()).collect(),
            groups: schema.groups.clone(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
