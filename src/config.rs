//! Configuration module

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::logic::baseline::DEFAULT_BATCH_SIZE;
use crate::logic::drift::{Correction, DriftConfig, DEFAULT_P_VALUE};
use crate::logic::model::{ArtifactRef, ModelFormat};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_MODEL_PATH: &str = "artifacts/models/lgb_model.json";
pub const DEFAULT_ARTIFACT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}={value}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("DRIFT_P_VALUE must be in (0, 1), got {0}")]
    PValueRange(f64),

    #[error("REFERENCE_BATCH_SIZE must be positive")]
    ZeroBatchSize,

    #[error("No feature store configured: set DATABASE_URL or FEATURE_STORE_SNAPSHOT")]
    NoFeatureStore,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Feature store database (PostgreSQL)
    pub database_url: Option<String>,

    /// JSON snapshot used instead of the database
    pub feature_store_snapshot: Option<PathBuf>,

    /// Schema artifact shared with training; built-in schema when unset
    pub feature_schema_path: Option<PathBuf>,

    pub drift: DriftConfig,

    /// Entities fetched per feature store round trip during the reference fit
    pub reference_batch_size: usize,

    pub model_artifact_url: Option<String>,
    pub model_local_path: PathBuf,
    pub model_sha256: Option<String>,
    pub model_format: Option<ModelFormat>,
    pub artifact_timeout: Duration,

    /// Environment (development, production)
    pub environment: String,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            port: parse_or(var("PORT"), "PORT", DEFAULT_PORT)?,

            database_url: var("DATABASE_URL"),

            feature_store_snapshot: var("FEATURE_STORE_SNAPSHOT").map(PathBuf::from),

            feature_schema_path: var("FEATURE_SCHEMA_PATH").map(PathBuf::from),

            drift: DriftConfig {
                p_val: parse_or(var("DRIFT_P_VALUE"), "DRIFT_P_VALUE", DEFAULT_P_VALUE)?,
                correction: parse_or(var("DRIFT_CORRECTION"), "DRIFT_CORRECTION", Correction::Bonferroni)?,
            },

            reference_batch_size: parse_or(var("REFERENCE_BATCH_SIZE"), "REFERENCE_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,

            model_artifact_url: var("MODEL_ARTIFACT_URL"),

            model_local_path: var("MODEL_LOCAL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),

            model_sha256: var("MODEL_SHA256"),

            model_format: var("MODEL_FORMAT")
                .map(|v| parse_value::<ModelFormat>(&v, "MODEL_FORMAT"))
                .transpose()?,

            artifact_timeout: Duration::from_secs(parse_or(
                var("ARTIFACT_TIMEOUT_SECS"),
                "ARTIFACT_TIMEOUT_SECS",
                DEFAULT_ARTIFACT_TIMEOUT_SECS,
            )?),

            environment: var("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),

            log_format: match var("LOG_FORMAT").map(|v| v.to_ascii_lowercase()).as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.drift.p_val > 0.0 && self.drift.p_val < 1.0) {
            return Err(ConfigError::PValueRange(self.drift.p_val));
        }
        if self.reference_batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.database_url.is_none() && self.feature_store_snapshot.is_none() {
            return Err(ConfigError::NoFeatureStore);
        }
        Ok(())
    }

    pub fn model_artifact(&self) -> ArtifactRef {
        ArtifactRef {
            remote_url: self.model_artifact_url.clone(),
            local_path: self.model_local_path.clone(),
            sha256: self.model_sha256.clone(),
        }
    }

    /// Explicit `MODEL_FORMAT`, else `.onnx` by extension, else LightGBM JSON
    pub fn resolved_model_format(&self) -> ModelFormat {
        self.model_format
            .or_else(|| ModelFormat::from_path(&self.model_local_path))
            .unwrap_or(ModelFormat::Lightgbm)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            feature_store_snapshot: None,
            feature_schema_path: None,
            drift: DriftConfig::default(),
            reference_batch_size: DEFAULT_BATCH_SIZE,
            model_artifact_url: None,
            model_local_path: PathBuf::from(DEFAULT_MODEL_PATH),
            model_sha256: None,
            model_format: None,
            artifact_timeout: Duration::from_secs(DEFAULT_ARTIFACT_TIMEOUT_SECS),
            environment: "development".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

fn parse_value<T>(value: &str, var: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_or<T>(value: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => parse_value(&v, var),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.drift, DriftConfig::default());
        assert_eq!(config.reference_batch_size, 500);
        assert_eq!(config.model_local_path, PathBuf::from("artifacts/models/lgb_model.json"));
        assert_eq!(config.resolved_model_format(), ModelFormat::Lightgbm);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.environment, "development");
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("PORT", "8081"),
            ("DRIFT_P_VALUE", "0.01"),
            ("DRIFT_CORRECTION", "FDR"),
            ("MODEL_LOCAL_PATH", "models/churn.onnx"),
            ("LOG_FORMAT", "json"),
            ("DATABASE_URL", "postgres://localhost/features"),
        ])
        .unwrap();

        assert_eq!(config.port, 8081);
        assert_eq!(config.drift.correction, Correction::Fdr);
        assert!((config.drift.p_val - 0.01).abs() < 1e-12);
        assert_eq!(config.resolved_model_format(), ModelFormat::Onnx);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_format_wins() {
        let config = config(&[("MODEL_FORMAT", "lightgbm"), ("MODEL_LOCAL_PATH", "model.onnx")]).unwrap();
        assert_eq!(config.resolved_model_format(), ModelFormat::Lightgbm);
    }

    #[test]
    fn test_unparseable_values_rejected() {
        assert!(matches!(config(&[("PORT", "http")]), Err(ConfigError::Invalid { var: "PORT", .. })));
        assert!(matches!(
            config(&[("DRIFT_CORRECTION", "holm")]),
            Err(ConfigError::Invalid { var: "DRIFT_CORRECTION", .. })
        ));
    }

    #[test]
    fn test_validate_ranges() {
        let snapshot = ("FEATURE_STORE_SNAPSHOT", "features.json");

        let c = config(&[snapshot, ("DRIFT_P_VALUE", "1.5")]).unwrap();
        assert!(matches!(c.validate(), Err(ConfigError::PValueRange(_))));

        let c = config(&[snapshot, ("REFERENCE_BATCH_SIZE", "0")]).unwrap();
        assert!(matches!(c.validate(), Err(ConfigError::ZeroBatchSize)));

        let c = config(&[]).unwrap();
        assert!(matches!(c.validate(), Err(ConfigError::NoFeatureStore)));
    }
}
