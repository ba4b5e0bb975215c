//! Application principals and the role grants bound to them.
//!
//! A [`Principal`] is what the bootstrap asks the store to persist in its
//! user catalog. [`PrincipalInfo`] is what the store reports back when the
//! catalog is read, without the credential.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures for principal definitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthzError {
    #[error("principal user name must not be empty")]
    EmptyUser,

    #[error("password for principal '{user}' must not be empty")]
    EmptyPassword { user: String },

    #[error("principal '{user}' has no role grants")]
    NoRoles { user: String },
}

/// Built-in database roles, plus any custom role name carried as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Read,
    #[default]
    ReadWrite,
    DbAdmin,
    DbOwner,
    UserAdmin,
    Custom(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Read => "read",
            Role::ReadWrite => "readWrite",
            Role::DbAdmin => "dbAdmin",
            Role::DbOwner => "dbOwner",
            Role::UserAdmin => "userAdmin",
            Role::Custom(name) => name,
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        match value {
            "read" => Role::Read,
            "readWrite" => Role::ReadWrite,
            "dbAdmin" => Role::DbAdmin,
            "dbOwner" => Role::DbOwner,
            "userAdmin" => Role::UserAdmin,
            other => Role::Custom(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Role::from(s))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role scoped to one logical database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role: Role,
    pub db: String,
}

impl RoleGrant {
    pub fn new(role: Role, db: impl Into<String>) -> Self {
        Self {
            role,
            db: db.into(),
        }
    }
}

impl fmt::Display for RoleGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.role, self.db)
    }
}

/// Plaintext credential. Never shown by `Debug` or `Display`.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the plaintext; only the store driver should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

impl fmt::Display for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Principal definition to be created in the store's user catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user: String,
    pub password: Password,
    pub roles: Vec<RoleGrant>,
}

impl Principal {
    /// Principal holding a single role on a single database.
    pub fn scoped(
        user: impl Into<String>,
        password: Password,
        role: Role,
        db: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            password,
            roles: vec![RoleGrant::new(role, db)],
        }
    }

    pub fn validate(&self) -> Result<(), AuthzError> {
        if self.user.trim().is_empty() {
            return Err(AuthzError::EmptyUser);
        }
        if self.password.is_empty() {
            return Err(AuthzError::EmptyPassword {
                user: self.user.clone(),
            });
        }
        if self.roles.is_empty() {
            return Err(AuthzError::NoRoles {
                user: self.user.clone(),
            });
        }
        Ok(())
    }

    pub fn info(&self, db: impl Into<String>) -> PrincipalInfo {
        PrincipalInfo {
            user: self.user.clone(),
            db: db.into(),
            roles: self.roles.clone(),
        }
    }
}

/// Catalog view of a principal, as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalInfo {
    pub user: String,
    pub db: String,
    pub roles: Vec<RoleGrant>,
}

impl PrincipalInfo {
    pub fn has_role(&self, role: &Role, db: &str) -> bool {
        self.roles.iter().any(|g| &g.role == role && g.db == db)
    }
}
