//! Strong type definitions for registry documents
//!
//! Packages and versions reference each other only through identifiers. The
//! stored shapes ([`PackageRecord`], [`PackageVersion`]) hold ids; the resolved
//! [`Package`] is produced by an explicit populate step on read.

use crate::auth::Role;
use crate::artifacts::ArtifactRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! document_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

document_id!(
    /// Identifier of a stored user
    UserId
);
document_id!(
    /// Identifier of a stored package
    PackageId
);
document_id!(
    /// Identifier of a stored package version
    VersionId
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// A persisted, immutable release of a package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageVersion {
    pub id: VersionId,
    pub name: String,
    pub archive: ArtifactRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// SHA-256 of the artifact bytes
    pub checksum: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// Version fields after validation, with the artifact already written
#[derive(Debug, Clone, PartialEq)]
pub struct NewVersion {
    pub name: String,
    pub archive: ArtifactRef,
    pub description: Option<String>,
    pub checksum: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// Package as stored: identity plus references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub id: PackageId,
    pub name: String,
    pub author: UserId,
    pub versions: Vec<VersionId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPackage {
    pub name: String,
    pub author: UserId,
    pub versions: Vec<VersionId>,
}

/// Package with its author and versions resolved, newest version first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Package {
    pub id: PackageId,
    pub name: String,
    pub author: User,
    pub versions: Vec<PackageVersion>,
}

impl Package {
    pub fn latest(&self) -> Option<&PackageVersion> {
        self.versions.first()
    }
}

/// Sanitized, not yet validated, version input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Base64 text of the artifact payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Ranked hit returned by the search engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub score: f64,
    pub name: String,
}

/// Denormalized search summary built from a package's latest version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub name: String,
    pub description: Option<String>,
    pub author: String,
    pub version: String,
    pub date: DateTime<Utc>,
}
