//! # Package Lifecycle
//!
//! Orchestrates package creation, retrieval, destruction and search on top of
//! [`VersionLifecycleManager`], the document store and the search index.
//!
//! ## Creation
//!
//! Creating a package spans two collections without a shared transaction:
//!
//! 1. sanitize and persist all versions (yields their identifiers)
//! 2. persist the package referencing those identifiers
//! 3. resolve author and versions for the caller
//!
//! A failure in step 2 removes every version created in step 1. Step 3 runs
//! after the saga has committed; a failure there is returned as is and the
//! stored documents stay in place.
//!
//! ## Search
//!
//! The engine supplies `(score, name)` hits. Authoritative records are loaded
//! from the store, ranked by the engine's score (ties keep the engine's order)
//! and projected onto their newest version. Hits whose package is gone from the
//! store are skipped.

use crate::config::{LimitsConfig, SearchConfig};
use crate::error::{RegistryError, RegistryResult, ValidationErrors};
use crate::saga::Saga;
use crate::search::{PackageDocument, SearchIndex};
use crate::store::DocumentStore;
use crate::types::{
    NewPackage, Package, PackageRecord, PackageVersion, SearchHit, SearchResult, UserId,
};
use crate::validation;
use crate::version_order::sort_newest_first;
use crate::versions::VersionLifecycleManager;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Package creation input. `versions` is untrusted JSON and is sanitized
/// before anything is stored.
#[derive(Debug, Clone)]
pub struct PackageDraft {
    pub name: String,
    pub author: UserId,
    pub versions: Option<Value>,
}

impl PackageDraft {
    /// Build a draft from an untrusted request body
    pub fn from_value(input: &Value, author: UserId) -> Self {
        Self {
            name: input
                .get("name")
                .map(validation::coerce_string)
                .unwrap_or_default(),
            author,
            versions: input.get("versions").cloned(),
        }
    }
}

#[derive(Clone)]
pub struct PackageLifecycleManager {
    versions: VersionLifecycleManager,
    store: Arc<dyn DocumentStore>,
    search: Arc<dyn SearchIndex>,
    limits: LimitsConfig,
    search_config: SearchConfig,
}

impl PackageLifecycleManager {
    pub fn new(
        versions: VersionLifecycleManager,
        search: Arc<dyn SearchIndex>,
        limits: LimitsConfig,
        search_config: SearchConfig,
    ) -> Self {
        Self {
            store: versions.store().clone(),
            versions,
            search,
            limits,
            search_config,
        }
    }

    pub fn versions(&self) -> &VersionLifecycleManager {
        &self.versions
    }

    pub async fn create(&self, draft: PackageDraft) -> RegistryResult<Package> {
        let mut errors = validation::validate_package_name(&draft.name, &self.limits);
        if VersionLifecycleManager::sanitize_many(draft.versions.as_ref()).is_empty() {
            errors.add("versions", "a package must have at least one version");
        }
        errors.into_result()?;

        if self.store.find_user(draft.author).await?.is_none() {
            return Err(RegistryError::Validation(ValidationErrors::single(
                "author",
                format!("author {} not found", draft.author),
            )));
        }

        // Uniqueness is enforced by the store; this only fails early.
        if self.store.find_package(&draft.name).await?.is_some() {
            return Err(RegistryError::Conflict(format!(
                "package {} already exists",
                draft.name
            )));
        }

        let mut saga = Saga::new("package.create");

        let versions = saga
            .step(
                "create versions",
                self.versions.create_many(draft.versions.as_ref()),
            )
            .await?;
        let version_ids: Vec<_> = versions.iter().map(|v| v.id).collect();
        let store = self.store.clone();
        let created = version_ids.clone();
        saga.on_rollback("remove versions", async move {
            store.remove_versions(&created).await.map(|_| ())
        });

        let record = saga
            .step(
                "save package",
                self.store.insert_package(NewPackage {
                    name: draft.name,
                    author: draft.author,
                    versions: version_ids,
                }),
            )
            .await?;
        saga.commit();

        let package = self.populate(record).await?;
        self.reindex(&package);
        info!(package = %package.name, versions = package.versions.len(), "Package created");
        Ok(package)
    }

    /// Publish an additional version and refresh the search document
    pub async fn add_version(
        &self,
        package_name: &str,
        input: &Value,
    ) -> RegistryResult<PackageVersion> {
        let version = self
            .versions
            .add(package_name, VersionLifecycleManager::sanitize(input))
            .await?;
        if let Some(package) = self.get(package_name).await? {
            self.reindex(&package);
        }
        Ok(version)
    }

    /// `None` when no package has that name
    pub async fn get(&self, name: &str) -> RegistryResult<Option<Package>> {
        match self.store.find_package(name).await? {
            Some(record) => Ok(Some(self.populate(record).await?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn find_record(&self, name: &str) -> RegistryResult<Option<PackageRecord>> {
        self.store.find_package(name).await
    }

    /// Remove a package with all of its versions and their artifacts
    pub async fn destroy(&self, name: &str) -> RegistryResult<()> {
        if self.store.find_package(name).await?.is_none() {
            return Err(RegistryError::NotFound(format!("package {name} not found")));
        }
        let record = self.store.remove_package(name).await?;
        self.unindex(name);
        info!(package = %name, versions = record.versions.len(), "Package destroyed");
        Ok(())
    }

    /// Fuzzy search by name, ranked by the engine's relevance score
    pub async fn search(&self, query: &str) -> RegistryResult<Vec<SearchResult>> {
        let hits = self
            .search
            .search(query, self.search_config.max_hits)
            .await
            .map_err(|e| RegistryError::Dependency(e.to_string()))?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let names: Vec<String> = hits.iter().map(|hit| hit.name.clone()).collect();
        let records = self.store.find_packages(&names).await?;
        let mut packages = Vec::with_capacity(records.len());
        for record in records {
            let name = record.name.clone();
            match self.populate(record).await {
                Ok(package) => packages.push(package),
                Err(e) => warn!(package = %name, error = %e, "Skipping unresolvable search hit"),
            }
        }
        Ok(reconcile(&hits, packages))
    }

    /// Resolve author and versions; versions come back newest first
    async fn populate(&self, record: PackageRecord) -> RegistryResult<Package> {
        let author = self.store.find_user(record.author).await?.ok_or_else(|| {
            RegistryError::NotFound(format!(
                "author {} of package {} not found",
                record.author, record.name
            ))
        })?;
        let mut versions = self.store.find_versions(&record.versions).await?;
        sort_newest_first(&mut versions, |v| v.name.as_str());

        Ok(Package {
            id: record.id,
            name: record.name,
            author,
            versions,
        })
    }

    fn reindex(&self, package: &Package) {
        let document = PackageDocument {
            name: package.name.clone(),
            author: package.author.name.clone(),
            description: package.latest().and_then(|v| v.description.clone()),
        };
        let search = self.search.clone();
        let name = document.name.clone();
        spawn_indexing(&package.name, async move {
            if let Err(e) = search.index(document).await {
                warn!(package = %name, error = %e, "Failed to index package");
            }
        });
    }

    fn unindex(&self, name: &str) {
        let search = self.search.clone();
        let package = name.to_string();
        spawn_indexing(name, async move {
            if let Err(e) = search.remove(&package).await {
                warn!(package = %package, error = %e, "Failed to remove package from index");
            }
        });
    }
}

/// Run index maintenance on the current Tokio runtime. Without a runtime the
/// update is dropped and the index stays stale until the next write.
fn spawn_indexing<F>(package: &str, task: F) -> bool
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(task);
            true
        }
        Err(_) => {
            warn!(package = %package, "No async runtime, skipping search index update");
            false
        }
    }
}

/// Rank populated packages by their hit score and project them onto their
/// newest version. Packages without a hit, or without versions, are dropped.
pub fn reconcile(hits: &[SearchHit], packages: Vec<Package>) -> Vec<SearchResult> {
    let ranks: HashMap<&str, (f64, usize)> = hits
        .iter()
        .enumerate()
        .map(|(position, hit)| (hit.name.as_str(), (hit.score, position)))
        .collect();

    let mut ranked: Vec<(f64, usize, Package)> = Vec::with_capacity(packages.len());
    for package in packages {
        match ranks.get(package.name.as_str()) {
            Some(&(score, position)) => ranked.push((score, position, package)),
            None => debug!(package = %package.name, "Package returned without a search hit"),
        }
    }
    for hit in hits {
        if !ranked.iter().any(|(_, _, p)| p.name == hit.name) {
            debug!(package = %hit.name, "Skipping search hit for missing package");
        }
    }

    ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    ranked
        .into_iter()
        .filter_map(|(_, _, package)| {
            let latest = package.versions.first()?;
            Some(SearchResult {
                name: package.name.clone(),
                description: latest.description.clone(),
                author: package.author.name.clone(),
                version: latest.name.clone(),
                date: latest.created_at,
            })
        })
        .collect()
}
