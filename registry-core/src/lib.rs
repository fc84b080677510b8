//! # Package Registry Core
//!
//! Lifecycle management for a package registry: authenticated users publish
//! named packages, each holding one or more immutable versions with a binary
//! artifact.
//!
//! ## Key Modules
//!
//! - [`auth`]: Role/permission matrix and the authorization engine
//! - [`versions`]: Sanitizing, validating, creating and destroying versions
//! - [`packages`]: Package creation sagas, retrieval, destruction and search
//! - [`registry`]: Authorized entry point combining the above
//! - [`store`]: Document store with uniqueness and cascade guarantees
//! - [`artifacts`]: Size-bounded artifact storage
//! - [`search`]: Full-text search collaborator
//! - [`saga`]: Step/compensation executor for multi-document operations
//! - [`config`]: Configuration management and settings
//! - [`error`]: Error taxonomy and standardized error responses
//!
//! ## Usage
//!
//! ```rust,no_run
//! use registry_core::{Actor, AuthorizationEngine, Registry, RegistryConfig};
//! use serde_json::json;
//!
//! # async fn example(admin: Actor) -> registry_core::RegistryResult<()> {
//! let registry = Registry::from_config(&RegistryConfig::default(), AuthorizationEngine::default());
//! let package = registry
//!     .publish(&admin, &json!({
//!         "name": "left-pad",
//!         "versions": [{"name": "1.0.0", "archive": "aGVsbG8="}]
//!     }))
//!     .await?;
//! println!("published {} {}", package.name, package.versions[0].name);
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod auth;
pub mod config;
pub mod error;
pub mod packages;
pub mod registry;
pub mod saga;
pub mod search;
pub mod store;
pub mod types;
pub mod validation;
pub mod version_order;
pub mod versions;

pub use artifacts::{ArtifactRef, ArtifactStore, FsArtifactStore, StoredArtifact};
pub use auth::{Actor, AuthorizationEngine, OwnershipRule, Permission, PermissionMatrix, Role};
pub use config::RegistryConfig;
pub use error::{
    ErrorCode, ErrorResponse, FieldError, RegistryError, RegistryResult, ValidationErrors,
};
pub use packages::{PackageDraft, PackageLifecycleManager};
pub use registry::Registry;
pub use search::{MemorySearchIndex, PackageDocument, SearchError, SearchIndex};
pub use store::{DocumentStore, MemoryStore};
pub use types::{
    Package, PackageId, PackageRecord, PackageVersion, SearchHit, SearchResult, User, UserId,
    VersionData, VersionId,
};
pub use versions::VersionLifecycleManager;
