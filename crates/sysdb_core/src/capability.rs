//! Administrative capability.

use std::fmt;

/// Proof that the caller may run destructive administrative operations.
///
/// The core never validates credentials itself. The serving layer mints a
/// capability after checking an admin token and passes it down; operations
/// such as [`reset_state`](crate::SysDb::reset_state) refuse to run without one.
///
/// This is a marker, not a security boundary: code linked into the same
/// process can always call [`AdminCapability::grant`]. Remote callers only
/// obtain one through the server's admin token check.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminCapability {
    principal: String,
}

impl AdminCapability {
    /// Grants a capability to `principal`.
    ///
    /// Call this only after the principal has been authenticated.
    #[doc(hidden)]
    #[must_use]
    pub fn grant(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
        }
    }

    /// Returns the principal the capability was granted to.
    #[must_use]
    pub fn principal(&self) -> &str {
        &self.principal
    }
}

impl fmt::Debug for AdminCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCapability")
            .field("principal", &self.principal)
            .finish()
    }
}
