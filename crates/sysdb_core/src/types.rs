//! Core type definitions for SysDB.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Maximum length of tenant ids and database, collection names.
pub const MAX_NAME_LEN: usize = 63;

/// Tenant created by [`crate::SysDb::bootstrap_defaults`].
pub const DEFAULT_TENANT: &str = "default_tenant";

/// Database created by [`crate::SysDb::bootstrap_defaults`].
pub const DEFAULT_DATABASE: &str = "default_database";

/// Per-record version used for compare-and-swap.
///
/// Versions start at 1 when a record is first written and grow by one on
/// every successful mutation, including the tombstone write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(pub u64);

impl Version {
    /// Creates a version.
    #[must_use]
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    /// Returns the raw version value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next version.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Validates a tenant id or a database, collection name.
///
/// Names are 1 to [`MAX_NAME_LEN`] characters from `[A-Za-z0-9._-]` and
/// must start and end with an alphanumeric character.
pub fn validate_name(kind: &str, name: &str) -> CoreResult<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(CoreError::invalid_argument(format!(
            "{kind} name must be 1-{MAX_NAME_LEN} characters, got {}",
            name.len()
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(CoreError::invalid_argument(format!(
            "{kind} name {name:?} may only contain ASCII letters, digits, '.', '_' and '-'"
        )));
    }
    let alnum = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !alnum(name.chars().next()) || !alnum(name.chars().last()) {
        return Err(CoreError::invalid_argument(format!(
            "{kind} name {name:?} must start and end with a letter or digit"
        )));
    }
    Ok(())
}

/// Identifier of a tenant.
///
/// Tenant ids are chosen by the caller, validated with [`validate_name`]
/// and never reused: tenants are not deleted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Creates a tenant id after validating the format.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the id is malformed.
    pub fn new(id: impl Into<String>) -> CoreResult<Self> {
        let id = id.into();
        validate_name("tenant", &id)?;
        Ok(Self(id))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TenantId {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for TenantId {
    type Error = CoreError;

    fn try_from(id: String) -> CoreResult<Self> {
        Self::new(id)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident, $kind:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Parses an identifier from its hyphenated string form.
            ///
            /// # Errors
            ///
            /// Returns `InvalidArgument` if `s` is not a UUID.
            pub fn parse(s: &str) -> CoreResult<Self> {
                Uuid::parse_str(s).map(Self).map_err(|e| {
                    CoreError::invalid_argument(format!("invalid {} id {s:?}: {e}", $kind))
                })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> CoreResult<Self> {
                Self::parse(s)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a database. Assigned once, never reused.
    DatabaseId,
    "database"
);

uuid_id!(
    /// Identifier of a collection. Assigned once, never reused.
    CollectionId,
    "collection"
);

uuid_id!(
    /// Identifier of a segment. Assigned once, never reused.
    SegmentId,
    "segment"
);
