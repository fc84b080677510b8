//! Authorized entry point to the registry core
//!
//! [`Registry`] consults the [`AuthorizationEngine`] before handing a call to the
//! lifecycle managers. Operations that distinguish owned resources resolve the
//! own/other permission pair against the package's author.
//!
//! Actors that may only touch their own packages get `Forbidden` for packages
//! owned by someone else and for packages that do not exist, so the answer
//! never reveals whether a name is taken.

use crate::artifacts::{ArtifactStore, FsArtifactStore};
use crate::auth::{AccessScope, Actor, AuthorizationEngine, OwnershipRule, Permission, Role};
use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult, ValidationErrors};
use crate::packages::{PackageDraft, PackageLifecycleManager};
use crate::search::{MemorySearchIndex, SearchIndex};
use crate::store::{DocumentStore, MemoryStore};
use crate::types::{Package, PackageVersion, SearchResult, User, UserId};
use crate::validation;
use crate::versions::VersionLifecycleManager;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct Registry {
    auth: Arc<AuthorizationEngine>,
    packages: PackageLifecycleManager,
}

impl Registry {
    pub fn new(auth: AuthorizationEngine, packages: PackageLifecycleManager) -> Self {
        Self {
            auth: Arc::new(auth),
            packages,
        }
    }

    /// Wire the in-process collaborators described by `config`
    pub fn from_config(config: &RegistryConfig, auth: AuthorizationEngine) -> Self {
        let artifacts: Arc<dyn ArtifactStore> = Arc::new(FsArtifactStore::new(
            config.artifacts_path(),
            config.limits.max_artifact_size,
        ));
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new(artifacts.clone()));
        let search: Arc<dyn SearchIndex> = Arc::new(MemorySearchIndex::new());
        Self::with_collaborators(config, auth, store, artifacts, search)
    }

    pub fn with_collaborators(
        config: &RegistryConfig,
        auth: AuthorizationEngine,
        store: Arc<dyn DocumentStore>,
        artifacts: Arc<dyn ArtifactStore>,
        search: Arc<dyn SearchIndex>,
    ) -> Self {
        let versions = VersionLifecycleManager::new(store, artifacts, config.limits.clone());
        let packages = PackageLifecycleManager::new(
            versions,
            search,
            config.limits.clone(),
            config.search.clone(),
        );
        Self::new(auth, packages)
    }

    pub fn authorization(&self) -> &AuthorizationEngine {
        &self.auth
    }

    pub fn packages(&self) -> &PackageLifecycleManager {
        &self.packages
    }

    pub async fn create_user(&self, actor: &Actor, name: &str, role: &str) -> RegistryResult<User> {
        self.auth.require(actor, Permission::CreateUser)?;
        let role: Role = role.parse()?;
        let user = self
            .packages
            .versions()
            .store()
            .insert_user(name, role)
            .await?;
        info!(user = %user.name, role = %user.role, "User created");
        Ok(user)
    }

    /// Create a package from an untrusted body. The author defaults to the actor.
    pub async fn publish(&self, actor: &Actor, body: &Value) -> RegistryResult<Package> {
        let author = match body.get("author") {
            None | Some(Value::Null) => actor.id,
            Some(value) => value
                .as_str()
                .and_then(|author| author.parse::<Uuid>().ok())
                .map(UserId::from)
                .ok_or_else(|| {
                    RegistryError::Validation(ValidationErrors::single(
                        "author",
                        format!(
                            "`{}` is not a valid user id",
                            validation::coerce_string(value)
                        ),
                    ))
                })?,
        };
        self.auth
            .authorize_owned(actor, author, OwnershipRule::CREATE)?;
        self.packages
            .create(PackageDraft::from_value(body, author))
            .await
    }

    pub async fn publish_version(
        &self,
        actor: &Actor,
        package_name: &str,
        body: &Value,
    ) -> RegistryResult<PackageVersion> {
        self.authorize_package(actor, package_name, OwnershipRule::CREATE)
            .await?;
        self.packages.add_version(package_name, body).await
    }

    pub async fn package(&self, actor: &Actor, name: &str) -> RegistryResult<Option<Package>> {
        self.auth.require(actor, Permission::GetPackage)?;
        self.packages.get(name).await
    }

    pub async fn version(
        &self,
        actor: &Actor,
        package_name: &str,
        version_name: &str,
    ) -> RegistryResult<PackageVersion> {
        self.auth.require(actor, Permission::GetPackage)?;
        self.packages.versions().get(package_name, version_name).await
    }

    pub async fn delete_package(&self, actor: &Actor, name: &str) -> RegistryResult<()> {
        self.authorize_package(actor, name, OwnershipRule::DELETE)
            .await?;
        self.packages.destroy(name).await
    }

    pub async fn delete_version(
        &self,
        actor: &Actor,
        package_name: &str,
        version_name: &str,
    ) -> RegistryResult<()> {
        self.authorize_package(actor, package_name, OwnershipRule::DELETE)
            .await?;
        self.packages
            .versions()
            .destroy(package_name, version_name)
            .await
    }

    /// Search failures are downgraded to an empty result at this boundary
    pub async fn search(&self, actor: &Actor, query: &str) -> RegistryResult<Vec<SearchResult>> {
        self.auth.require(actor, Permission::SearchPackages)?;
        match self.packages.search(query).await {
            Ok(results) => Ok(results),
            Err(RegistryError::Dependency(e)) => {
                warn!(query = %query, error = %e, "Search engine failed, returning no results");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Own/other resolution against an existing package
    async fn authorize_package(
        &self,
        actor: &Actor,
        package_name: &str,
        rule: OwnershipRule,
    ) -> RegistryResult<()> {
        match self.auth.scope(actor, rule)? {
            AccessScope::Any => Ok(()),
            AccessScope::Owned => {
                let record = self.packages.find_record(package_name).await?;
                match record {
                    Some(record) if record.author == actor.id => Ok(()),
                    _ => Err(RegistryError::Forbidden(format!(
                        "role `{}` lacks permission `{}` for package {package_name}",
                        actor.role, rule.other
                    ))),
                }
            }
        }
    }
}
