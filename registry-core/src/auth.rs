//! Role based authorization for registry mutations
//!
//! Roles and permissions are closed enums. The role to permission table is a
//! [`PermissionMatrix`] built once at startup and injected into the
//! [`AuthorizationEngine`]; nothing mutates it afterwards.

use crate::error::{RegistryError, RegistryResult};
use crate::types::UserId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Actor roles, serialized through their string form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    Admin,
    Author,
    Subscriber,
    Guest,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Author, Role::Subscriber, Role::Guest];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Author => "author",
            Role::Subscriber => "subscriber",
            Role::Guest => "guest",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "author" => Ok(Role::Author),
            "subscriber" => Ok(Role::Subscriber),
            "guest" => Ok(Role::Guest),
            other => Err(RegistryError::InvalidRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = RegistryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    CreateUser,
    CreatePackage,
    CreateOwnPackage,
    CreateOtherPackage,
    GetPackage,
    DeletePackage,
    DeleteOwnPackages,
    DeleteOtherPackages,
    SearchPackages,
}

impl Permission {
    pub const ALL: [Permission; 9] = [
        Permission::CreateUser,
        Permission::CreatePackage,
        Permission::CreateOwnPackage,
        Permission::CreateOtherPackage,
        Permission::GetPackage,
        Permission::DeletePackage,
        Permission::DeleteOwnPackages,
        Permission::DeleteOtherPackages,
        Permission::SearchPackages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CreateUser => "create_user",
            Permission::CreatePackage => "create_package",
            Permission::CreateOwnPackage => "create_own_package",
            Permission::CreateOtherPackage => "create_other_package",
            Permission::GetPackage => "get_package",
            Permission::DeletePackage => "delete_package",
            Permission::DeleteOwnPackages => "delete_own_packages",
            Permission::DeleteOtherPackages => "delete_other_packages",
            Permission::SearchPackages => "search_packages",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|permission| permission.as_str() == s)
            .ok_or_else(|| RegistryError::InvalidPermission(s.to_string()))
    }
}

/// Immutable role to permission table
#[derive(Debug, Clone)]
pub struct PermissionMatrix {
    grants: HashMap<Role, HashSet<Permission>>,
}

impl PermissionMatrix {
    /// The standard table: admins may do everything, authors publish their own
    /// packages, subscribers only read and guests get nothing.
    pub fn standard() -> Self {
        Self::with_grants([
            (Role::Admin, Permission::ALL.to_vec()),
            (
                Role::Author,
                vec![
                    Permission::CreateOwnPackage,
                    Permission::GetPackage,
                    Permission::SearchPackages,
                ],
            ),
            (
                Role::Subscriber,
                vec![Permission::GetPackage, Permission::SearchPackages],
            ),
            (Role::Guest, Vec::new()),
        ])
    }

    /// Build a custom table. Roles left out have no row at all, which the
    /// engine reports as a misconfiguration rather than a denial.
    pub fn with_grants<I>(grants: I) -> Self
    where
        I: IntoIterator<Item = (Role, Vec<Permission>)>,
    {
        Self {
            grants: grants
                .into_iter()
                .map(|(role, permissions)| (role, permissions.into_iter().collect()))
                .collect(),
        }
    }

    fn row(&self, role: Role) -> Option<&HashSet<Permission>> {
        self.grants.get(&role)
    }
}

impl Default for PermissionMatrix {
    fn default() -> Self {
        Self::standard()
    }
}

/// Authenticated caller, as supplied by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }
}

/// Pure lookup of (role, permission) against an injected matrix
#[derive(Debug, Clone, Default)]
pub struct AuthorizationEngine {
    matrix: PermissionMatrix,
}

impl AuthorizationEngine {
    pub fn new(matrix: PermissionMatrix) -> Self {
        Self { matrix }
    }

    pub fn has_permission(&self, role: Role, permission: Permission) -> RegistryResult<bool> {
        let row = self.matrix.row(role).ok_or_else(|| {
            RegistryError::InvalidRole(format!("no permission entry for role `{role}`"))
        })?;
        Ok(row.contains(&permission))
    }

    /// String form used at the boundary; unknown names fail instead of denying
    pub fn has_permission_named(&self, role: &str, permission: &str) -> RegistryResult<bool> {
        let role: Role = role.parse()?;
        let permission: Permission = permission.parse()?;
        self.has_permission(role, permission)
    }

    /// Fails with `Forbidden` unless the actor's role holds `permission`
    pub fn require(&self, actor: &Actor, permission: Permission) -> RegistryResult<()> {
        if self.has_permission(actor.role, permission)? {
            Ok(())
        } else {
            Err(forbidden(actor, permission))
        }
    }

    /// Whether the actor may act on any resource, or at least on owned ones.
    pub fn scope(&self, actor: &Actor, rule: OwnershipRule) -> RegistryResult<AccessScope> {
        if self.has_permission(actor.role, rule.any)?
            || self.has_permission(actor.role, rule.other)?
        {
            Ok(AccessScope::Any)
        } else if self.has_permission(actor.role, rule.own)? {
            Ok(AccessScope::Owned)
        } else {
            Err(forbidden(actor, rule.own))
        }
    }

    /// Resolve the own/other pair for a resource owned by `owner`
    pub fn authorize_owned(
        &self,
        actor: &Actor,
        owner: UserId,
        rule: OwnershipRule,
    ) -> RegistryResult<()> {
        match self.scope(actor, rule)? {
            AccessScope::Any => Ok(()),
            AccessScope::Owned if owner == actor.id => Ok(()),
            AccessScope::Owned => Err(forbidden(actor, rule.other)),
        }
    }
}

/// Permission triple for operations that distinguish owned resources
#[derive(Debug, Clone, Copy)]
pub struct OwnershipRule {
    pub any: Permission,
    pub own: Permission,
    pub other: Permission,
}

impl OwnershipRule {
    pub const CREATE: OwnershipRule = OwnershipRule {
        any: Permission::CreatePackage,
        own: Permission::CreateOwnPackage,
        other: Permission::CreateOtherPackage,
    };

    pub const DELETE: OwnershipRule = OwnershipRule {
        any: Permission::DeletePackage,
        own: Permission::DeleteOwnPackages,
        other: Permission::DeleteOtherPackages,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessScope {
    Any,
    Owned,
}

fn forbidden(actor: &Actor, permission: Permission) -> RegistryError {
    RegistryError::Forbidden(format!(
        "role `{}` lacks permission `{}`",
        actor.role, permission
    ))
}
