//! Artifact storage for version payloads
//!
//! Payloads arrive as base64 text, are bounded by the configured maximum size,
//! and are written under the artifacts directory. Callers only ever hold the
//! opaque [`ArtifactRef`] returned by [`ArtifactStore::put`].

use crate::error::{RegistryError, RegistryResult, ValidationErrors};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

/// Opaque reference to a stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub reference: ArtifactRef,
    /// SHA-256 of the decoded bytes, lowercase hex
    pub checksum: String,
    pub size: u64,
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Maximum decoded payload size in bytes
    fn max_size(&self) -> u64;

    /// Decode and store a base64 payload
    async fn put(&self, encoded: &str) -> RegistryResult<StoredArtifact>;

    /// Remove a stored artifact. Removing an absent artifact is not an error.
    async fn delete(&self, reference: &ArtifactRef) -> RegistryResult<()>;

    async fn exists(&self, reference: &ArtifactRef) -> bool;
}

/// Calculate SHA256 hash of data as lowercase hex
pub fn sha256_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Filesystem-backed artifact store
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
    max_size: u64,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>, max_size: u64) -> Self {
        Self {
            root: root.into(),
            max_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a reference back to a path, refusing anything outside the root
    fn resolve(&self, reference: &ArtifactRef) -> Option<PathBuf> {
        let path = Path::new(reference.as_str());
        let file_name = path.file_name()?;
        if path.parent() != Some(self.root.as_path()) {
            return None;
        }
        Some(self.root.join(file_name))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    fn max_size(&self) -> u64 {
        self.max_size
    }

    async fn put(&self, encoded: &str) -> RegistryResult<StoredArtifact> {
        let bytes = STANDARD.decode(encoded.trim())?;
        let size = bytes.len() as u64;
        if size > self.max_size {
            return Err(RegistryError::Validation(ValidationErrors::single(
                "archive",
                format!(
                    "archive is {size} bytes, exceeding maximum size of {} bytes",
                    self.max_size
                ),
            )));
        }

        fs::create_dir_all(&self.root).await?;
        let path = self.root.join(format!("{}.tgz", Uuid::new_v4()));
        fs::write(&path, &bytes).await?;

        let checksum = sha256_hash(&bytes);
        info!(path = %path.display(), size, checksum = %checksum, "Artifact stored");

        Ok(StoredArtifact {
            reference: ArtifactRef::new(path.to_string_lossy()),
            checksum,
            size,
        })
    }

    async fn delete(&self, reference: &ArtifactRef) -> RegistryResult<()> {
        let Some(path) = self.resolve(reference) else {
            return Err(anyhow::anyhow!("artifact reference outside store: {reference}").into());
        };
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Artifact deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, reference: &ArtifactRef) -> bool {
        match self.resolve(reference) {
            Some(path) => fs::try_exists(&path).await.unwrap_or(false),
            None => false,
        }
    }
}
