//! Roles and per-tab role resolution.
//!
//! DESIGN
//! ======
//! A browser profile can hold two independent sessions (shopper and shelter
//! admin) at the same time. Which one a given tab is acting as is resolved
//! here, from a fixed precedence chain, and pinned into tab-scoped storage so
//! later calls in the same tab stay stable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::storage::{CredentialStore, TabStore};

/// The authorization identity a session acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    /// Storage key prefix for this role (`user_jwt_token`, `admin_jwt_token`, ...).
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    /// Wire value sent in the `X-Session-Role` header and stored in tab markers.
    #[must_use]
    pub fn header_value(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }

    /// The opposite role.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::User => Self::Admin,
            Self::Admin => Self::User,
        }
    }

    /// Sign-in page for this role.
    #[must_use]
    pub fn login_path(self) -> &'static str {
        match self {
            Self::User => "/login",
            Self::Admin => "/admin/login",
        }
    }

    /// Post-login landing page for this role.
    #[must_use]
    pub fn landing_path(self) -> &'static str {
        match self {
            Self::User => "/",
            Self::Admin => "/admin/dashboard",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header_value())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            _ => Err(()),
        }
    }
}

// =============================================================================
// PER-ROLE PAIR
// =============================================================================

/// A value held once per role. Cheaper and stricter than a `HashMap<Role, T>`.
#[derive(Debug, Clone, Default)]
pub struct PerRole<T> {
    pub user: T,
    pub admin: T,
}

impl<T> PerRole<T> {
    pub fn get(&self, role: Role) -> &T {
        match role {
            Role::User => &self.user,
            Role::Admin => &self.admin,
        }
    }

    pub fn get_mut(&mut self, role: Role) -> &mut T {
        match role {
            Role::User => &mut self.user,
            Role::Admin => &mut self.admin,
        }
    }
}

// =============================================================================
// PATH POLICY
// =============================================================================

/// Path prefixes that imply a role. First match wins; checked in order.
const PATH_ROLE_POLICY: &[(&str, Role)] = &[("/admin", Role::Admin), ("/user", Role::User)];

/// Infer a role from a path prefix, if the path is role-scoped at all.
///
/// `/admin/...` paths belong to shelter administrators, `/user/...` paths to
/// ordinary adopters. Everything else (pet listings, articles) is unscoped.
#[must_use]
pub fn role_for_path(path: &str) -> Option<Role> {
    let route = path.split('?').next().unwrap_or(path);
    PATH_ROLE_POLICY.iter().find_map(|(prefix, role)| {
        let matches = route == *prefix
            || route
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'));
        matches.then_some(*role)
    })
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Resolves which role a call in this tab is acting as.
///
/// Resolution order, first match wins:
/// 1. explicit role on the call
/// 2. role pinned in tab storage
/// 3. role implied by the target path prefix
/// 4. role with a stored credential (cross-tab fallback)
/// 5. [`Role::User`]
///
/// Every successful resolution re-pins the tab marker. Pure synchronous
/// storage lookups, no I/O.
#[derive(Clone)]
pub struct RoleResolver {
    creds: CredentialStore,
    tab: TabStore,
}

impl RoleResolver {
    #[must_use]
    pub fn new(creds: CredentialStore, tab: TabStore) -> Self {
        Self { creds, tab }
    }

    #[must_use]
    pub fn resolve(&self, explicit: Option<Role>, path: &str) -> Role {
        let role = explicit
            .or_else(|| self.tab.read())
            .or_else(|| role_for_path(path))
            .or_else(|| self.stored_fallback())
            .unwrap_or(Role::User);
        self.tab.write(role);
        role
    }

    /// A role that still has a stored token. When both do, the ordinary user
    /// session wins.
    fn stored_fallback(&self) -> Option<Role> {
        if self.creds.has_token(Role::User) {
            Some(Role::User)
        } else if self.creds.has_token(Role::Admin) {
            Some(Role::Admin)
        } else {
            None
        }
    }
}

#[cfg(test)]
#[path = "role_test.rs"]
mod tests;
