//! # Document Store
//!
//! Arena-style persistence for users, packages and versions. Every document is
//! keyed by its identifier and references other documents only by id; the
//! lifecycle managers resolve those references explicitly on read.
//!
//! The store owns the guarantees the managers cannot provide on their own:
//!
//! - unique package names and unique version names within a package
//! - atomic batch insertion of versions
//! - a version belongs to at most one package
//! - cascading removal (package -> versions -> artifacts)
//! - a package never loses its last version through single-version removal
//!
//! Application-level pre-checks elsewhere are conveniences; these checks run
//! under the store's write lock and are the ones that hold under concurrency.

use crate::artifacts::{ArtifactRef, ArtifactStore};
use crate::auth::Role;
use crate::error::{RegistryError, RegistryResult, ValidationErrors};
use crate::types::{
    NewPackage, NewVersion, PackageId, PackageRecord, PackageVersion, User, UserId, VersionId,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_user(&self, name: &str, role: Role) -> RegistryResult<User>;

    async fn find_user(&self, id: UserId) -> RegistryResult<Option<User>>;

    async fn insert_version(&self, version: NewVersion) -> RegistryResult<PackageVersion>;

    /// Insert all versions or none of them
    async fn insert_versions(
        &self,
        versions: Vec<NewVersion>,
    ) -> RegistryResult<Vec<PackageVersion>>;

    /// Fetch versions by id, in the order requested; unknown ids are skipped
    async fn find_versions(&self, ids: &[VersionId]) -> RegistryResult<Vec<PackageVersion>>;

    /// Bulk removal used to discard versions; detaches them from any package
    /// and cascades to their artifacts. Returns the number removed.
    async fn remove_versions(&self, ids: &[VersionId]) -> RegistryResult<usize>;

    /// Remove one version of a package, cascading to its artifact. Refuses to
    /// remove the last version a package holds.
    async fn remove_version(&self, id: VersionId) -> RegistryResult<()>;

    async fn insert_package(&self, package: NewPackage) -> RegistryResult<PackageRecord>;

    async fn find_package(&self, name: &str) -> RegistryResult<Option<PackageRecord>>;

    /// Fetch packages by name, in the order requested; unknown names are skipped
    async fn find_packages(&self, names: &[String]) -> RegistryResult<Vec<PackageRecord>>;

    /// Attach an existing, unowned version to a package
    async fn append_version(
        &self,
        package: PackageId,
        version: VersionId,
    ) -> RegistryResult<PackageRecord>;

    /// Remove a package and cascade to its versions and their artifacts
    async fn remove_package(&self, name: &str) -> RegistryResult<PackageRecord>;
}

#[derive(Default)]
struct Collections {
    users: HashMap<UserId, User>,
    user_names: HashMap<String, UserId>,
    packages: HashMap<PackageId, PackageRecord>,
    package_names: HashMap<String, PackageId>,
    versions: HashMap<VersionId, PackageVersion>,
    version_owner: HashMap<VersionId, PackageId>,
}

impl Collections {
    fn package_by_name(&self, name: &str) -> Option<&PackageRecord> {
        self.package_names
            .get(name)
            .and_then(|id| self.packages.get(id))
    }

    /// Shared checks for attaching `version` to a package holding `existing`
    fn check_attachable(
        &self,
        package_name: &str,
        version: VersionId,
        taken_names: &HashSet<&str>,
    ) -> RegistryResult<&PackageVersion> {
        let stored = self.versions.get(&version).ok_or_else(|| {
            RegistryError::NotFound(format!("version document {version} not found"))
        })?;
        if self.version_owner.contains_key(&version) {
            return Err(RegistryError::Conflict(format!(
                "version {} already belongs to another package",
                stored.name
            )));
        }
        if taken_names.contains(stored.name.as_str()) {
            return Err(RegistryError::Conflict(format!(
                "version {} of package {package_name} already exists",
                stored.name
            )));
        }
        Ok(stored)
    }

    fn detach(&mut self, id: VersionId) -> Option<PackageVersion> {
        let version = self.versions.remove(&id)?;
        if let Some(owner) = self.version_owner.remove(&id) {
            if let Some(package) = self.packages.get_mut(&owner) {
                package.versions.retain(|v| *v != id);
            }
        }
        Some(version)
    }
}

/// In-process document store
pub struct MemoryStore {
    collections: RwLock<Collections>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl MemoryStore {
    pub fn new(artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            collections: RwLock::new(Collections::default()),
            artifacts,
        }
    }

    /// Cascade hook: artifact removal happens outside the lock and never fails
    /// the removal of the owning documents.
    async fn delete_artifacts(&self, references: Vec<ArtifactRef>) {
        for reference in references {
            if let Err(e) = self.artifacts.delete(&reference).await {
                warn!(artifact = %reference, error = %e, "Failed to delete artifact");
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_user(&self, name: &str, role: Role) -> RegistryResult<User> {
        if name.trim().is_empty() {
            return Err(RegistryError::Validation(ValidationErrors::single(
                "name",
                "name is required",
            )));
        }

        let mut collections = self.collections.write().await;
        if collections.user_names.contains_key(name) {
            return Err(RegistryError::Conflict(format!(
                "user {name} already exists"
            )));
        }

        let user = User {
            id: UserId::new(),
            name: name.to_string(),
            role,
            created_at: Utc::now(),
        };
        collections.user_names.insert(user.name.clone(), user.id);
        collections.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: UserId) -> RegistryResult<Option<User>> {
        Ok(self.collections.read().await.users.get(&id).cloned())
    }

    async fn insert_version(&self, version: NewVersion) -> RegistryResult<PackageVersion> {
        let mut inserted = self.insert_versions(vec![version]).await?;
        inserted
            .pop()
            .ok_or_else(|| anyhow::anyhow!("version insert returned no document").into())
    }

    async fn insert_versions(
        &self,
        versions: Vec<NewVersion>,
    ) -> RegistryResult<Vec<PackageVersion>> {
        let documents: Vec<PackageVersion> = versions
            .into_iter()
            .map(|version| PackageVersion {
                id: VersionId::new(),
                name: version.name,
                archive: version.archive,
                description: version.description,
                checksum: version.checksum,
                size: version.size,
                created_at: version.created_at,
            })
            .collect();

        let mut collections = self.collections.write().await;
        for document in &documents {
            collections.versions.insert(document.id, document.clone());
        }
        debug!(count = documents.len(), "Inserted version documents");
        Ok(documents)
    }

    async fn find_versions(&self, ids: &[VersionId]) -> RegistryResult<Vec<PackageVersion>> {
        let collections = self.collections.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| collections.versions.get(id).cloned())
            .collect())
    }

    async fn remove_versions(&self, ids: &[VersionId]) -> RegistryResult<usize> {
        let removed: Vec<PackageVersion> = {
            let mut collections = self.collections.write().await;
            ids.iter().filter_map(|id| collections.detach(*id)).collect()
        };
        let count = removed.len();
        self.delete_artifacts(removed.into_iter().map(|v| v.archive).collect())
            .await;
        debug!(count, "Removed version documents");
        Ok(count)
    }

    async fn remove_version(&self, id: VersionId) -> RegistryResult<()> {
        let removed = {
            let mut collections = self.collections.write().await;
            if let Some(owner) = collections.version_owner.get(&id) {
                let package = collections.packages.get(owner).ok_or_else(|| {
                    anyhow::anyhow!("version {id} owned by missing package {owner}")
                })?;
                if package.versions.len() <= 1 {
                    return Err(RegistryError::InvalidOperation(format!(
                        "package {} must keep at least one version",
                        package.name
                    )));
                }
            }
            collections.detach(id).ok_or_else(|| {
                RegistryError::NotFound(format!("version document {id} not found"))
            })?
        };
        self.delete_artifacts(vec![removed.archive]).await;
        Ok(())
    }

    async fn insert_package(&self, package: NewPackage) -> RegistryResult<PackageRecord> {
        if package.versions.is_empty() {
            return Err(RegistryError::Validation(ValidationErrors::single(
                "versions",
                "a package must have at least one version",
            )));
        }

        let mut collections = self.collections.write().await;
        if collections.package_names.contains_key(&package.name) {
            return Err(RegistryError::Conflict(format!(
                "package {} already exists",
                package.name
            )));
        }

        let mut taken = HashSet::new();
        for version in &package.versions {
            let stored = collections.check_attachable(&package.name, *version, &taken)?;
            taken.insert(stored.name.as_str());
        }

        let record = PackageRecord {
            id: PackageId::new(),
            name: package.name,
            author: package.author,
            versions: package.versions,
        };
        for version in &record.versions {
            collections.version_owner.insert(*version, record.id);
        }
        collections
            .package_names
            .insert(record.name.clone(), record.id);
        collections.packages.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_package(&self, name: &str) -> RegistryResult<Option<PackageRecord>> {
        Ok(self
            .collections
            .read()
            .await
            .package_by_name(name)
            .cloned())
    }

    async fn find_packages(&self, names: &[String]) -> RegistryResult<Vec<PackageRecord>> {
        let collections = self.collections.read().await;
        Ok(names
            .iter()
            .filter_map(|name| collections.package_by_name(name).cloned())
            .collect())
    }

    async fn append_version(
        &self,
        package: PackageId,
        version: VersionId,
    ) -> RegistryResult<PackageRecord> {
        let mut collections = self.collections.write().await;
        let record = collections
            .packages
            .get(&package)
            .ok_or_else(|| {
                RegistryError::NotFound(format!("package document {package} not found"))
            })?;

        let taken: HashSet<&str> = record
            .versions
            .iter()
            .filter_map(|id| collections.versions.get(id))
            .map(|v| v.name.as_str())
            .collect();
        collections.check_attachable(&record.name, version, &taken)?;

        collections.version_owner.insert(version, package);
        let record = collections
            .packages
            .get_mut(&package)
            .ok_or_else(|| {
                RegistryError::NotFound(format!("package document {package} not found"))
            })?;
        record.versions.push(version);
        Ok(record.clone())
    }

    async fn remove_package(&self, name: &str) -> RegistryResult<PackageRecord> {
        let (record, artifacts) = {
            let mut collections = self.collections.write().await;
            let id = collections
                .package_names
                .remove(name)
                .ok_or_else(|| RegistryError::NotFound(format!("package {name} not found")))?;
            let record = collections
                .packages
                .remove(&id)
                .ok_or_else(|| anyhow::anyhow!("package index points at missing document {id}"))?;

            let mut artifacts = Vec::with_capacity(record.versions.len());
            for version in &record.versions {
                collections.version_owner.remove(version);
                if let Some(removed) = collections.versions.remove(version) {
                    artifacts.push(removed.archive);
                }
            }
            (record, artifacts)
        };

        self.delete_artifacts(artifacts).await;
        debug!(
            package = %record.name,
            versions = record.versions.len(),
            "Removed package document"
        );
        Ok(record)
    }
}
