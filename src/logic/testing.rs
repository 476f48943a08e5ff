//! Shared fixtures for unit tests

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use std::sync::Arc;

use super::baseline::{FeatureMap, FittedReference, InMemoryFeatureStore, ReferenceDistribution, StandardScaler};
use super::drift::DriftConfig;
use super::features::{FeatureKind, FeatureSchema, FeatureVector, NumericType};
use super::gateway::InferenceService;
use super::model::{
    sha256_hex, ChurnClassifier, ClassProbabilities, LoadedModel, ModelError, ModelFormat, ModelMetadata,
    TreeEnsemble,
};

/// Plausible value range of a numeric column
fn range_of(name: &str) -> (f64, f64) {
    match name {
        "Customer_Age" => (26.0, 73.0),
        "Dependent_count" => (0.0, 5.0),
        "Months_on_book" => (13.0, 56.0),
        "Total_Relationship_Count" => (1.0, 6.0),
        "Months_Inactive_12_mon" | "Contacts_Count_12_mon" => (0.0, 6.0),
        "Credit_Limit" => (1438.0, 34516.0),
        "Total_Revolving_Bal" => (0.0, 2517.0),
        "Avg_Open_To_Buy" => (3.0, 34516.0),
        "Total_Amt_Chng_Q4_Q1" => (0.0, 3.4),
        "Total_Trans_Amt" => (510.0, 18484.0),
        "Total_Trans_Ct" => (10.0, 139.0),
        "Total_Ct_Chng_Q4_Q1" => (0.0, 3.7),
        "Avg_Utilization_Ratio" => (0.0, 1.0),
        _ => (0.0, 10.0),
    }
}

/// Random stored record in schema columns, plus the training label
pub fn synthetic_record(schema: &FeatureSchema, rng: &mut StdRng) -> FeatureMap {
    let mut map = FeatureMap::new();

    for feature in &schema.features {
        let value = match &feature.kind {
            FeatureKind::Numeric { numeric_type, .. } => {
                let (lo, hi) = range_of(&feature.name);
                let v = rng.gen_range(lo..hi);
                match numeric_type {
                    NumericType::Integer => v.round(),
                    NumericType::Float => v,
                }
            }
            FeatureKind::Binary { .. } => f64::from(u8::from(rng.gen_bool(0.5))),
            FeatureKind::Indicator { .. } => 0.0,
        };
        map.insert(feature.name.clone(), value);
    }

    for group in &schema.groups {
        // index == labels.len() picks the baseline
        let pick = rng.gen_range(0..=group.labels.len());
        if let Some(label) = group.labels.get(pick) {
            map.insert(format!("{}_{}", group.name, label), 1.0);
        }
    }

    map.insert("Attrition_Flag".to_string(), f64::from(u8::from(rng.gen_bool(0.16))));
    map
}

/// Raw schema-ordered rows drawn like `synthetic_record`
pub fn synthetic_rows(schema: &FeatureSchema, n: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let record = synthetic_record(schema, &mut rng);
            schema.order().iter().map(|c| record[*c]).collect()
        })
        .collect()
}

pub fn seeded_store(schema: &FeatureSchema, n: usize, seed: u64) -> InMemoryFeatureStore {
    let mut rng = StdRng::seed_from_u64(seed);
    let entries = (0..n)
        .map(|i| (format!("{:05}", i), synthetic_record(schema, &mut rng)))
        .collect();
    InMemoryFeatureStore::from_entries(entries)
}

/// Small LightGBM `dump_model()` document over `schema`.
///
/// Attrition rises with few transactions and low transaction amount.
pub fn lightgbm_dump(schema: &FeatureSchema) -> serde_json::Value {
    let names: Vec<String> = schema.order().iter().map(|n| n.replace(' ', "_")).collect();
    let trans_ct = schema.index_of("Total_Trans_Ct").unwrap();
    let trans_amt = schema.index_of("Total_Trans_Amt").unwrap();
    let inactive = schema.index_of("Months_Inactive_12_mon").unwrap();

    json!({
        "name": "tree",
        "version": "v4",
        "num_class": 1,
        "num_tree_per_iteration": 1,
        "max_feature_idx": names.len() - 1,
        "objective": "binary sigmoid:1",
        "average_output": false,
        "feature_names": names,
        "tree_info": [
            {
                "tree_index": 0,
                "num_leaves": 3,
                "shrinkage": 1,
                "tree_structure": {
                    "split_index": 0,
                    "split_feature": trans_ct,
                    "threshold": 55.5,
                    "decision_type": "<=",
                    "default_left": true,
                    "missing_type": "None",
                    "left_child": {
                        "split_index": 1,
                        "split_feature": trans_amt,
                        "threshold": 2000.0,
                        "decision_type": "<=",
                        "default_left": true,
                        "missing_type": "None",
                        "left_child": { "leaf_index": 0, "leaf_value": 1.2 },
                        "right_child": { "leaf_index": 1, "leaf_value": 0.1 }
                    },
                    "right_child": { "leaf_index": 2, "leaf_value": -1.8 }
                }
            },
            {
                "tree_index": 1,
                "num_leaves": 2,
                "shrinkage": 0.1,
                "tree_structure": {
                    "split_index": 0,
                    "split_feature": inactive,
                    "threshold": 2.5,
                    "decision_type": "<=",
                    "default_left": true,
                    "missing_type": "None",
                    "left_child": { "leaf_index": 0, "leaf_value": -0.4 },
                    "right_child": { "leaf_index": 1, "leaf_value": 0.6 }
                }
            }
        ]
    })
}

/// Reference fitted directly from synthetic rows, without a store
pub fn fitted_reference(schema: &FeatureSchema, n: usize, seed: u64) -> FittedReference {
    let rows = synthetic_rows(schema, n, seed);
    let scaler = StandardScaler::fit(schema, &rows).unwrap();
    let standardized: Vec<Vec<f64>> = rows.iter().map(|row| scaler.transform_row(row)).collect();
    let reference = ReferenceDistribution::from_rows(
        schema.layout_hash(),
        schema.order().into_iter().map(String::from).collect(),
        &standardized,
    );

    FittedReference {
        scaler,
        reference,
        skipped_entities: 0,
    }
}

pub fn loaded(classifier: Box<dyn ChurnClassifier>, format: ModelFormat) -> LoadedModel {
    LoadedModel {
        metadata: ModelMetadata {
            format,
            origin: "memory".to_string(),
            sha256: sha256_hex(b""),
            n_features: classifier.n_features(),
            loaded_at: chrono::Utc::now(),
        },
        classifier,
    }
}

/// Service over 2000 synthetic reference rows and the `lightgbm_dump` model
pub fn service_with(classifier: Box<dyn ChurnClassifier>) -> InferenceService {
    let schema = Arc::new(FeatureSchema::churn_v1());
    let fitted = fitted_reference(&schema, 2000, 7);
    InferenceService::new(schema, fitted, DriftConfig::default(), loaded(classifier, ModelFormat::Lightgbm))
}

pub fn lightgbm_service() -> InferenceService {
    let schema = FeatureSchema::churn_v1();
    let bytes = serde_json::to_vec(&lightgbm_dump(&schema)).unwrap();
    service_with(Box::new(TreeEnsemble::from_slice(&bytes).unwrap()))
}

/// Classifier whose behaviour is fixed per test
pub enum StubClassifier {
    Fails,
    Panics,
    Returns(f64),
}

impl ChurnClassifier for StubClassifier {
    fn predict_proba(&self, _features: &FeatureVector) -> Result<ClassProbabilities, ModelError> {
        match self {
            StubClassifier::Fails => Err(ModelError::Inference("stub failure".to_string())),
            StubClassifier::Panics => panic!("stub classifier panicked"),
            StubClassifier::Returns(p) => Ok(ClassProbabilities::from_attrition(*p)),
        }
    }

    fn n_features(&self) -> usize {
        32
    }

    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    fn kind(&self) -> &'static str {
        "stub"
    }
}

/// Partial request, unset fields fall back to defaults
pub fn sample_payload() -> serde_json::Map<String, serde_json::Value> {
    match json!({
        "customer_age": 45,
        "gender": "M",
        "education_level": "Graduate",
        "credit_limit": 5000,
        "total_trans_amt": 1200
    }) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    }
}
