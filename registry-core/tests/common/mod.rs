//! Common test utilities and helpers
//!
//! Shared setup for the integration tests: a registry wired to a temporary
//! artifact directory, seeded users, payload helpers and a document store
//! wrapper that can be told to fail specific operations.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use registry_core::search::SearchError;
use registry_core::types::{NewPackage, NewVersion};
use registry_core::{
    Actor, ArtifactStore, AuthorizationEngine, DocumentStore, FsArtifactStore, MemorySearchIndex,
    MemoryStore, PackageId, PackageLifecycleManager, PackageRecord, PackageVersion, Registry,
    RegistryConfig, RegistryError, RegistryResult, Role, SearchHit, SearchIndex, User, UserId,
    VersionId, VersionLifecycleManager,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Test setup result
pub struct TestSetup {
    pub temp_dir: TempDir,
    pub config: RegistryConfig,
    pub store: Arc<FaultyStore>,
    pub artifacts: Arc<FsArtifactStore>,
    pub search: Arc<ScriptedSearch>,
    pub registry: Registry,
    pub admin: User,
    pub author: User,
}

impl TestSetup {
    pub fn packages(&self) -> &PackageLifecycleManager {
        self.registry.packages()
    }

    pub fn versions(&self) -> &VersionLifecycleManager {
        self.registry.packages().versions()
    }

    pub fn admin_actor(&self) -> Actor {
        Actor::new(self.admin.id, self.admin.role)
    }

    pub fn author_actor(&self) -> Actor {
        Actor::new(self.author.id, self.author.role)
    }
}

/// Creates a registry backed by a temporary artifact directory
pub async fn create_test_setup() -> TestSetup {
    create_test_setup_with(AuthorizationEngine::default()).await
}

pub async fn create_test_setup_with(auth: AuthorizationEngine) -> TestSetup {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = RegistryConfig::default();
    config.storage.data_dir = temp_dir.path().to_path_buf();

    let artifacts = Arc::new(FsArtifactStore::new(
        config.artifacts_path(),
        config.limits.max_artifact_size,
    ));
    let store = Arc::new(FaultyStore::new(MemoryStore::new(artifacts.clone())));
    let search = Arc::new(ScriptedSearch::default());

    let registry = Registry::with_collaborators(
        &config,
        auth,
        store.clone(),
        artifacts.clone(),
        search.clone(),
    );

    let admin = store
        .insert_user("root", Role::Admin)
        .await
        .expect("Failed to seed admin");
    let author = store
        .insert_user("ada", Role::Author)
        .await
        .expect("Failed to seed author");

    TestSetup {
        temp_dir,
        config,
        store,
        artifacts,
        search,
        registry,
        admin,
        author,
    }
}

/// Base64 payload for an artifact
pub fn payload(content: &str) -> String {
    STANDARD.encode(content)
}

/// Version body as the outer layer would hand it over
pub fn version_body(name: &str) -> Value {
    json!({
        "name": name,
        "archive": payload(&format!("artifact for {name}")),
        "description": format!("release {name}"),
    })
}

pub fn package_body(name: &str, versions: &[&str]) -> Value {
    json!({
        "name": name,
        "versions": versions.iter().map(|v| version_body(v)).collect::<Vec<_>>(),
    })
}

/// Document store wrapper that can be told to fail package writes
pub struct FaultyStore {
    inner: MemoryStore,
    fail_insert_package: AtomicBool,
    fail_append_version: AtomicBool,
    attempted_versions: Mutex<Vec<VersionId>>,
}

impl FaultyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_insert_package: AtomicBool::new(false),
            fail_append_version: AtomicBool::new(false),
            attempted_versions: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_insert_package(&self, fail: bool) {
        self.fail_insert_package.store(fail, Ordering::SeqCst);
    }

    pub fn fail_append_version(&self, fail: bool) {
        self.fail_append_version.store(fail, Ordering::SeqCst);
    }

    /// Version ids handed to the last failed package write
    pub fn attempted_versions(&self) -> Vec<VersionId> {
        self.attempted_versions.lock().unwrap().clone()
    }

    fn injected() -> RegistryError {
        RegistryError::Internal(anyhow::anyhow!("injected store failure"))
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn insert_user(&self, name: &str, role: Role) -> RegistryResult<User> {
        self.inner.insert_user(name, role).await
    }

    async fn find_user(&self, id: UserId) -> RegistryResult<Option<User>> {
        self.inner.find_user(id).await
    }

    async fn insert_version(&self, version: NewVersion) -> RegistryResult<PackageVersion> {
        self.inner.insert_version(version).await
    }

    async fn insert_versions(
        &self,
        versions: Vec<NewVersion>,
    ) -> RegistryResult<Vec<PackageVersion>> {
        self.inner.insert_versions(versions).await
    }

    async fn find_versions(&self, ids: &[VersionId]) -> RegistryResult<Vec<PackageVersion>> {
        self.inner.find_versions(ids).await
    }

    async fn remove_versions(&self, ids: &[VersionId]) -> RegistryResult<usize> {
        self.inner.remove_versions(ids).await
    }

    async fn remove_version(&self, id: VersionId) -> RegistryResult<()> {
        self.inner.remove_version(id).await
    }

    async fn insert_package(&self, package: NewPackage) -> RegistryResult<PackageRecord> {
        if self.fail_insert_package.load(Ordering::SeqCst) {
            *self.attempted_versions.lock().unwrap() = package.versions.clone();
            return Err(Self::injected());
        }
        self.inner.insert_package(package).await
    }

    async fn find_package(&self, name: &str) -> RegistryResult<Option<PackageRecord>> {
        self.inner.find_package(name).await
    }

    async fn find_packages(&self, names: &[String]) -> RegistryResult<Vec<PackageRecord>> {
        self.inner.find_packages(names).await
    }

    async fn append_version(
        &self,
        package: PackageId,
        version: VersionId,
    ) -> RegistryResult<PackageRecord> {
        if self.fail_append_version.load(Ordering::SeqCst) {
            *self.attempted_versions.lock().unwrap() = vec![version];
            return Err(Self::injected());
        }
        self.inner.append_version(package, version).await
    }

    async fn remove_package(&self, name: &str) -> RegistryResult<PackageRecord> {
        self.inner.remove_package(name).await
    }
}

/// Search engine double: indexes like the in-memory engine, but hits and
/// failures can be scripted per test
#[derive(Default)]
pub struct ScriptedSearch {
    index: MemorySearchIndex,
    hits: Mutex<Option<Vec<SearchHit>>>,
    failure: Mutex<Option<String>>,
}

impl ScriptedSearch {
    pub fn respond_with(&self, hits: Vec<(f64, &str)>) {
        *self.hits.lock().unwrap() = Some(
            hits.into_iter()
                .map(|(score, name)| SearchHit {
                    score,
                    name: name.to_string(),
                })
                .collect(),
        );
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub async fn indexed(&self) -> usize {
        self.index.len().await
    }
}

#[async_trait]
impl SearchIndex for ScriptedSearch {
    async fn index(
        &self,
        document: registry_core::PackageDocument,
    ) -> Result<(), SearchError> {
        self.index.index(document).await
    }

    async fn remove(&self, name: &str) -> Result<(), SearchError> {
        self.index.remove(name).await
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let failure = self.failure.lock().unwrap().clone();
        if let Some(message) = failure {
            return Err(SearchError(message));
        }
        let scripted = self.hits.lock().unwrap().clone();
        match scripted {
            Some(hits) => Ok(hits),
            None => self.index.search(query, limit).await,
        }
    }
}

/// Every artifact file currently on disk
pub fn artifact_files(setup: &TestSetup) -> Vec<std::path::PathBuf> {
    match std::fs::read_dir(setup.artifacts.root()) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

pub async fn assert_artifacts_gone(setup: &TestSetup, versions: &[PackageVersion]) {
    for version in versions {
        assert!(
            !setup.artifacts.exists(&version.archive).await,
            "artifact {} should have been removed",
            version.archive
        );
    }
}
