//! LightGBM tree ensemble evaluated natively from a `dump_model()` JSON
//!
//! Supports binary objectives (`binary`, `cross_entropy`) with numerical
//! and categorical splits, following LightGBM's missing-value rules.

use serde::Deserialize;

use super::inference::{ChurnClassifier, ClassProbabilities, ModelError};
use crate::logic::features::FeatureVector;

const ZERO_THRESHOLD: f64 = 1e-35;

// ============================================================================
// DUMP FORMAT
// ============================================================================

#[derive(Debug, Deserialize)]
struct ModelDump {
    #[serde(default = "one")]
    num_class: usize,
    #[serde(default)]
    objective: String,
    #[serde(default)]
    average_output: bool,
    feature_names: Vec<String>,
    tree_info: Vec<TreeInfo>,
}

fn one() -> usize {
    1
}

#[derive(Debug, Deserialize)]
struct TreeInfo {
    tree_structure: DumpNode,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DumpNode {
    Split(DumpSplit),
    Leaf { leaf_value: f64 },
}

#[derive(Debug, Deserialize)]
struct DumpSplit {
    split_feature: usize,
    threshold: DumpThreshold,
    decision_type: String,
    #[serde(default)]
    default_left: bool,
    #[serde(default)]
    missing_type: String,
    left_child: Box<DumpNode>,
    right_child: Box<DumpNode>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DumpThreshold {
    Numeric(f64),
    Categories(String),
}

// ============================================================================
// COMPILED TREES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum MissingType {
    None,
    Zero,
    NaN,
}

#[derive(Debug, Clone)]
enum Decision {
    LessOrEqual(f64),
    OneOf(Vec<i64>),
}

#[derive(Debug, Clone)]
enum TreeNode {
    Leaf(f64),
    Split {
        feature: usize,
        decision: Decision,
        default_left: bool,
        missing: MissingType,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn compile(node: DumpNode, n_features: usize) -> Result<Self, ModelError> {
        let split = match node {
            DumpNode::Leaf { leaf_value } => return Ok(TreeNode::Leaf(leaf_value)),
            DumpNode::Split(split) => split,
        };

        if split.split_feature >= n_features {
            return Err(ModelError::Parse(format!(
                "split on feature {} but model has {} features",
                split.split_feature, n_features
            )));
        }

        let decision = match (split.decision_type.as_str(), split.threshold) {
            ("<=", DumpThreshold::Numeric(t)) => Decision::LessOrEqual(t),
            ("==", DumpThreshold::Categories(raw)) => Decision::OneOf(
                raw.split("||")
                    .map(|c| c.trim().parse::<i64>())
                    .collect::<Result<_, _>>()
                    .map_err(|e| ModelError::Parse(format!("bad category list '{}': {}", raw, e)))?,
            ),
            ("==", DumpThreshold::Numeric(t)) => Decision::OneOf(vec![t as i64]),
            (other, _) => return Err(ModelError::Parse(format!("unsupported decision type '{}'", other))),
        };

        let missing = match split.missing_type.as_str() {
            "Zero" => MissingType::Zero,
            "NaN" => MissingType::NaN,
            _ => MissingType::None,
        };

        Ok(TreeNode::Split {
            feature: split.split_feature,
            decision,
            default_left: split.default_left,
            missing,
            left: Box::new(TreeNode::compile(*split.left_child, n_features)?),
            right: Box::new(TreeNode::compile(*split.right_child, n_features)?),
        })
    }

    fn evaluate(&self, features: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf(value) => return *value,
                TreeNode::Split { feature, decision, default_left, missing, left, right } => {
                    let go_left = goes_left(features[*feature], decision, *default_left, *missing);
                    node = if go_left { left } else { right };
                }
            }
        }
    }
}

fn goes_left(value: f64, decision: &Decision, default_left: bool, missing: MissingType) -> bool {
    match decision {
        Decision::LessOrEqual(threshold) => {
            let value = if value.is_nan() && missing != MissingType::NaN { 0.0 } else { value };
            let is_missing = match missing {
                MissingType::Zero => value.abs() <= ZERO_THRESHOLD,
                MissingType::NaN => value.is_nan(),
                MissingType::None => false,
            };
            if is_missing {
                default_left
            } else {
                value <= *threshold
            }
        }
        Decision::OneOf(categories) => {
            // NaN is category 0 unless NaN is the missing marker; others truncate toward zero
            let category = if value.is_nan() {
                if missing == MissingType::NaN {
                    return false;
                }
                0
            } else {
                value.trunc() as i64
            };
            category >= 0 && categories.contains(&category)
        }
    }
}

// ============================================================================
// ENSEMBLE
// ============================================================================

#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    feature_names: Vec<String>,
    trees: Vec<TreeNode>,
    sigmoid: f64,
    average_output: bool,
}

impl TreeEnsemble {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        let dump: ModelDump = serde_json::from_slice(bytes).map_err(|e| ModelError::Parse(e.to_string()))?;

        if dump.num_class != 1 {
            return Err(ModelError::UnsupportedFormat(format!(
                "{} classes, only binary models are served",
                dump.num_class
            )));
        }

        let sigmoid = parse_objective(&dump.objective)?;
        let n_features = dump.feature_names.len();

        let trees = dump
            .tree_info
            .into_iter()
            .map(|t| TreeNode::compile(t.tree_structure, n_features))
            .collect::<Result<Vec<_>, _>>()?;

        if trees.is_empty() {
            return Err(ModelError::Parse("model has no trees".to_string()));
        }

        Ok(Self {
            feature_names: dump.feature_names,
            trees,
            sigmoid,
            average_output: dump.average_output,
        })
    }

    /// Summed leaf output before the sigmoid
    pub fn raw_score(&self, features: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.evaluate(features)).sum();
        if self.average_output {
            sum / self.trees.len() as f64
        } else {
            sum
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

/// `binary sigmoid:<k>` → k, `cross_entropy` → 1
fn parse_objective(objective: &str) -> Result<f64, ModelError> {
    let mut parts = objective.split_whitespace();
    match parts.next() {
        Some("binary") => {
            let sigmoid = parts
                .find_map(|p| p.strip_prefix("sigmoid:"))
                .map(|s| s.parse::<f64>().map_err(|e| ModelError::Parse(format!("bad sigmoid '{}': {}", s, e))))
                .transpose()?
                .unwrap_or(1.0);
            Ok(sigmoid)
        }
        Some("cross_entropy") | Some("xentropy") => Ok(1.0),
        other => Err(ModelError::UnsupportedFormat(format!(
            "objective '{}' is not a binary classifier",
            other.unwrap_or("")
        ))),
    }
}

impl ChurnClassifier for TreeEnsemble {
    fn predict_proba(&self, features: &FeatureVector) -> Result<ClassProbabilities, ModelError> {
        if features.len() != self.feature_names.len() {
            return Err(ModelError::Width {
                expected: self.feature_names.len(),
                actual: features.len(),
            });
        }

        let raw = self.raw_score(features.as_slice());
        let attrition = 1.0 / (1.0 + (-self.sigmoid * raw).exp());
        Ok(ClassProbabilities::from_attrition(attrition))
    }

    fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    fn feature_names(&self) -> Option<&[String]> {
        Some(&self.feature_names)
    }

    fn kind(&self) -> &'static str {
        "lightgbm"
    }
}
