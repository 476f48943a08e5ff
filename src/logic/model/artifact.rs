//! Model Artifact - versioned blob retrieval with local fallback
//!
//! The remote store is tried first; any remote failure (network, status,
//! checksum) falls back to the local path. Both failing is fatal.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Content-addressed URL in the remote artifact store
    pub remote_url: Option<String>,
    pub local_path: PathBuf,
    /// Expected SHA-256 (hex) of the blob, verified for either source
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOrigin {
    Remote(String),
    Local(PathBuf),
}

impl std::fmt::Display for ArtifactOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactOrigin::Remote(url) => write!(f, "{}", url),
            ArtifactOrigin::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub bytes: Vec<u8>,
    pub origin: ArtifactOrigin,
    pub sha256: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Remote fetch failed: {0}")]
    Remote(#[from] reqwest::Error),

    #[error("Remote store returned HTTP {0}")]
    Status(u16),

    #[error("Checksum mismatch for {origin}: expected {expected}, got {actual}")]
    Checksum {
        origin: ArtifactOrigin,
        expected: String,
        actual: String,
    },

    #[error("Failed to read {path}: {error}")]
    Local {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Model artifact unavailable (remote: {remote}; local: {local})")]
    Unavailable { remote: String, local: String },
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn verify(bytes: Vec<u8>, origin: ArtifactOrigin, expected: Option<&str>) -> Result<ModelArtifact, ArtifactError> {
    let actual = sha256_hex(&bytes);

    if let Some(expected) = expected {
        if !expected.trim().eq_ignore_ascii_case(&actual) {
            return Err(ArtifactError::Checksum {
                origin,
                expected: expected.to_string(),
                actual,
            });
        }
    }

    Ok(ModelArtifact { bytes, origin, sha256: actual })
}

/// Client setup failures count as remote failures
async fn fetch_remote(url: &str, timeout: Duration, expected: Option<&str>) -> Result<ModelArtifact, ArtifactError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(ArtifactError::Status(response.status().as_u16()));
    }

    let bytes = response.bytes().await?.to_vec();
    verify(bytes, ArtifactOrigin::Remote(url.to_string()), expected)
}

async fn read_local(path: &PathBuf, expected: Option<&str>) -> Result<ModelArtifact, ArtifactError> {
    let bytes = tokio::fs::read(path).await.map_err(|error| ArtifactError::Local {
        path: path.clone(),
        error,
    })?;
    verify(bytes, ArtifactOrigin::Local(path.clone()), expected)
}

/// Fetch the artifact, remote first, local file as fallback
pub async fn fetch(artifact: &ArtifactRef, timeout: Duration) -> Result<ModelArtifact, ArtifactError> {
    let expected = artifact.sha256.as_deref();

    let remote_error = match &artifact.remote_url {
        Some(url) => match fetch_remote(url, timeout, expected).await {
            Ok(model) => {
                tracing::info!("Model artifact fetched from {} ({} bytes)", url, model.bytes.len());
                return Ok(model);
            }
            Err(e) => {
                tracing::warn!("Could not load model from remote store: {}", e);
                e.to_string()
            }
        },
        None => "not configured".to_string(),
    };

    match read_local(&artifact.local_path, expected).await {
        Ok(model) => {
            tracing::info!(
                "Model artifact loaded from local file {} ({} bytes)",
                artifact.local_path.display(),
                model.bytes.len()
            );
            Ok(model)
        }
        Err(e) => Err(ArtifactError::Unavailable {
            remote: remote_error,
            local: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_fallback_when_remote_unset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, b"{}").unwrap();

        let artifact = ArtifactRef {
            remote_url: None,
            local_path: path.clone(),
            sha256: Some(sha256_hex(b"{}").to_uppercase()),
        };

        let model = fetch(&artifact, Duration::from_secs(1)).await.unwrap();
        assert_eq!(model.origin, ArtifactOrigin::Local(path));
        assert_eq!(model.bytes, b"{}");
    }

    #[tokio::test]
    async fn test_local_fallback_when_remote_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, b"weights").unwrap();

        let artifact = ArtifactRef {
            // Reserved port on loopback, connection is refused
            remote_url: Some("http://127.0.0.1:9/model.json".to_string()),
            local_path: path.clone(),
            sha256: None,
        };

        let model = fetch(&artifact, Duration::from_secs(2)).await.unwrap();
        assert!(matches!(model.origin, ArtifactOrigin::Local(_)));
    }

    #[tokio::test]
    async fn test_local_fallback_when_remote_url_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, b"weights").unwrap();

        let artifact = ArtifactRef {
            remote_url: Some("not a url".to_string()),
            local_path: path.clone(),
            sha256: Some(sha256_hex(b"weights")),
        };

        let model = fetch(&artifact, Duration::from_secs(1)).await.unwrap();
        assert_eq!(model.origin, ArtifactOrigin::Local(path));
    }

    #[tokio::test]
    async fn test_remote_failure_reported_when_local_missing() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = ArtifactRef {
            remote_url: Some("not a url".to_string()),
            local_path: dir.path().join("absent.json"),
            sha256: None,
        };

        match fetch(&artifact, Duration::from_secs(1)).await {
            Err(ArtifactError::Unavailable { remote, .. }) => assert_ne!(remote, "not configured"),
            other => panic!("Expected Unavailable, got {:?}", other.map(|m| m.origin)),
        }
    }

    #[tokio::test]
    async fn test_missing_everywhere_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = ArtifactRef {
            remote_url: None,
            local_path: dir.path().join("absent.json"),
            sha256: None,
        };

        let result = fetch(&artifact, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ArtifactError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_checksum_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, b"tampered").unwrap();

        let artifact = ArtifactRef {
            remote_url: None,
            local_path: path,
            sha256: Some(sha256_hex(b"original")),
        };

        match fetch(&artifact, Duration::from_secs(1)).await {
            Err(ArtifactError::Unavailable { local, .. }) => assert!(local.contains("Checksum mismatch")),
            other => panic!("expected checksum failure, got {:?}", other.map(|m| m.origin)),
        }
    }
}
