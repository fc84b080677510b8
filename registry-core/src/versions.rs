//! # Version Lifecycle
//!
//! Sanitizes, validates, creates, fetches and destroys individual package
//! versions. Artifacts are written before the version document and removed
//! again when the document cannot be stored.

use crate::artifacts::{ArtifactStore, StoredArtifact};
use crate::config::LimitsConfig;
use crate::error::{RegistryError, RegistryResult, ValidationErrors};
use crate::saga::Saga;
use crate::store::DocumentStore;
use crate::types::{NewVersion, PackageRecord, PackageVersion, VersionData};
use crate::validation::{self, coerce_string, is_truthy};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct VersionLifecycleManager {
    store: Arc<dyn DocumentStore>,
    artifacts: Arc<dyn ArtifactStore>,
    limits: LimitsConfig,
}

impl VersionLifecycleManager {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        artifacts: Arc<dyn ArtifactStore>,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            store,
            artifacts,
            limits,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Copy the recognised fields out of untrusted input as plain strings.
    /// `description` is only copied when truthy.
    pub fn sanitize(input: &Value) -> VersionData {
        VersionData {
            name: input
                .get("name")
                .filter(|value| !value.is_null())
                .map(coerce_string),
            archive: input
                .get("archive")
                .filter(|value| !value.is_null())
                .map(coerce_string),
            description: input
                .get("description")
                .filter(|value| is_truthy(value))
                .map(coerce_string),
        }
    }

    /// Sanitize every element, dropping nulls. Anything but an array yields an
    /// empty list.
    pub fn sanitize_many(input: Option<&Value>) -> Vec<VersionData> {
        match input {
            Some(Value::Array(items)) => items
                .iter()
                .filter(|item| !item.is_null())
                .map(Self::sanitize)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn validate(&self, data: &VersionData) -> RegistryResult<()> {
        validation::validate_version(data, &self.limits).into_result()
    }

    /// Validate, store the artifact and persist a single version
    pub async fn create(&self, data: VersionData) -> RegistryResult<PackageVersion> {
        self.validate(&data)?;
        let (new_version, stored) = self.store_artifact(data).await?;

        match self.store.insert_version(new_version).await {
            Ok(version) => {
                info!(version = %version.name, id = %version.id, "Version created");
                Ok(version)
            }
            Err(e) => {
                self.discard_artifacts(vec![stored]).await;
                Err(e)
            }
        }
    }

    /// Sanitize, validate and persist a batch of versions, all or nothing
    pub async fn create_many(&self, input: Option<&Value>) -> RegistryResult<Vec<PackageVersion>> {
        let versions = Self::sanitize_many(input);

        let mut errors = ValidationErrors::new();
        for (index, data) in versions.iter().enumerate() {
            errors.extend_prefixed(
                &format!("versions.{index}"),
                validation::validate_version(data, &self.limits),
            );
        }
        errors.into_result()?;

        let mut documents = Vec::with_capacity(versions.len());
        let mut stored = Vec::with_capacity(versions.len());
        for data in versions {
            match self.store_artifact(data).await {
                Ok((document, artifact)) => {
                    documents.push(document);
                    stored.push(artifact);
                }
                Err(e) => {
                    self.discard_artifacts(stored).await;
                    return Err(e);
                }
            }
        }

        match self.store.insert_versions(documents).await {
            Ok(created) => {
                info!(count = created.len(), "Versions created");
                Ok(created)
            }
            Err(e) => {
                self.discard_artifacts(stored).await;
                Err(e)
            }
        }
    }

    /// Fetch one version of a package by name
    pub async fn get(
        &self,
        package_name: &str,
        version_name: &str,
    ) -> RegistryResult<PackageVersion> {
        let package = self.find_package(package_name).await?;
        self.find_in_package(&package, version_name).await
    }

    /// Remove one version. A package's sole version can only go away with the
    /// package itself.
    pub async fn destroy(&self, package_name: &str, version_name: &str) -> RegistryResult<()> {
        let package = self.find_package(package_name).await?;
        if package.versions.len() <= 1 {
            return Err(RegistryError::InvalidOperation(format!(
                "version {version_name} is the only version of package {package_name}; destroy the package instead"
            )));
        }

        let version = self.find_in_package(&package, version_name).await?;
        self.store.remove_version(version.id).await?;
        info!(package = %package_name, version = %version_name, "Version destroyed");
        Ok(())
    }

    /// Publish a new version into an existing package.
    ///
    /// Steps: locate the package, create the version, attach it to the
    /// package. A failed attach removes the freshly created version.
    pub async fn add(
        &self,
        package_name: &str,
        data: VersionData,
    ) -> RegistryResult<PackageVersion> {
        let mut saga = Saga::new("version.add");

        let package = saga
            .step("locate package", self.find_package(package_name))
            .await?;

        let version = saga.step("create version", self.create(data)).await?;
        let store = self.store.clone();
        let version_id = version.id;
        saga.on_rollback("remove version", async move {
            store.remove_versions(&[version_id]).await.map(|_| ())
        });

        saga.step(
            "attach version",
            self.store.append_version(package.id, version.id),
        )
        .await?;
        saga.commit();

        info!(package = %package_name, version = %version.name, "Version added");
        Ok(version)
    }

    pub(crate) async fn find_package(&self, package_name: &str) -> RegistryResult<PackageRecord> {
        self.store
            .find_package(package_name)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("package {package_name} not found")))
    }

    async fn find_in_package(
        &self,
        package: &PackageRecord,
        version_name: &str,
    ) -> RegistryResult<PackageVersion> {
        self.store
            .find_versions(&package.versions)
            .await?
            .into_iter()
            .find(|version| version.name == version_name)
            .ok_or_else(|| {
                RegistryError::NotFound(format!(
                    "version {version_name} of package {} not found",
                    package.name
                ))
            })
    }

    async fn store_artifact(
        &self,
        data: VersionData,
    ) -> RegistryResult<(NewVersion, StoredArtifact)> {
        let (Some(name), Some(archive)) = (data.name, data.archive) else {
            return Err(
                anyhow::anyhow!("store_artifact called with unvalidated version data").into(),
            );
        };
        let stored = self.artifacts.put(&archive).await?;
        let document = NewVersion {
            name,
            archive: stored.reference.clone(),
            description: data.description,
            checksum: stored.checksum.clone(),
            size: stored.size,
            created_at: Utc::now(),
        };
        Ok((document, stored))
    }

    async fn discard_artifacts(&self, stored: Vec<StoredArtifact>) {
        for artifact in stored {
            if let Err(e) = self.artifacts.delete(&artifact.reference).await {
                warn!(artifact = %artifact.reference, error = %e, "Failed to discard artifact");
            }
        }
    }
}
