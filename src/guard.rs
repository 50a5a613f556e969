//! Navigation-time access control.
//!
//! DESIGN
//! ======
//! Route access rules live in one policy table instead of scattered string
//! checks. For every navigation the guard decides: proceed, or redirect to a
//! login page, the forbidden page, or a role's landing page. Right after a
//! reload, persistent storage is the source of truth for "is logged in" —
//! memory may not be hydrated yet — and a destination whose role's profile
//! is not loaded blocks until the profile fetch settles.

use crate::role::{Role, role_for_path};
use crate::session::store::SessionStore;

// =============================================================================
// ROUTE POLICY TABLE
// =============================================================================

/// Access rules for one route prefix.
#[derive(Debug, Clone, Copy)]
pub struct RoutePolicy {
    pub prefix: &'static str,
    pub requires_auth: bool,
    pub requires_admin: bool,
    /// Login/register pages: authenticated sessions are bounced away.
    pub guest_only: bool,
}

const fn policy(
    prefix: &'static str,
    requires_auth: bool,
    requires_admin: bool,
    guest_only: bool,
) -> RoutePolicy {
    RoutePolicy { prefix, requires_auth, requires_admin, guest_only }
}

/// Longest matching prefix wins. Anything unmatched is public.
pub const ROUTE_POLICIES: &[RoutePolicy] = &[
    policy("/login", false, false, true),
    policy("/register", false, false, true),
    policy("/admin/login", false, false, true),
    policy("/admin", true, true, false),
    policy("/user", true, false, false),
];

/// Look up the policy governing a path. Unmatched paths are public.
#[must_use]
pub fn policy_for(path: &str) -> RoutePolicy {
    let route = path.split('?').next().unwrap_or(path);
    ROUTE_POLICIES
        .iter()
        .filter(|candidate| {
            route == candidate.prefix
                || route
                    .strip_prefix(candidate.prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
        .max_by_key(|candidate| candidate.prefix.len())
        .copied()
        .unwrap_or(policy("", false, false, false))
}

// =============================================================================
// DECISIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    LoginRequired,
    ProfileUnavailable,
    AdminRequired,
    AlreadyAuthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Redirect { target: String, reason: RedirectReason },
}

impl GuardDecision {
    fn login(role: Role, attempted: &str, reason: RedirectReason) -> Self {
        Self::Redirect {
            target: format!("{}?redirect={attempted}", role.login_path()),
            reason,
        }
    }
}

// =============================================================================
// GUARD
// =============================================================================

/// Per-navigation access-control decision point.
#[derive(Clone)]
pub struct RouteGuard {
    session: SessionStore,
}

impl RouteGuard {
    #[must_use]
    pub fn new(session: SessionStore) -> Self {
        Self { session }
    }

    /// Decide whether a navigation to `path` may proceed.
    ///
    /// May suspend to load the destination role's profile when the session
    /// is authenticated but not yet hydrated (first navigation after a
    /// reload).
    pub async fn check(&self, path: &str) -> GuardDecision {
        let rules = policy_for(path);
        let user_in = self.session.is_logged_in(Role::User);
        let admin_in = self.session.is_logged_in(Role::Admin);

        // Align the active role with the destination before anything else;
        // the other role's session stays intact.
        let dest_role = role_for_path(path).unwrap_or_else(|| self.session.active_role());
        if dest_role != self.session.active_role() {
            self.session.set_active_role(dest_role);
        }

        if rules.guest_only {
            let guarded = role_for_path(path).unwrap_or(Role::User);
            if self.session.is_logged_in(guarded) {
                return GuardDecision::Redirect {
                    target: guarded.landing_path().to_owned(),
                    reason: RedirectReason::AlreadyAuthenticated,
                };
            }
            return GuardDecision::Proceed;
        }

        if rules.requires_auth {
            if !user_in && !admin_in {
                return GuardDecision::login(dest_role, path, RedirectReason::LoginRequired);
            }
            // Hydrate the destination role's profile when that role is
            // authenticated but not yet loaded (first navigation after a
            // reload). A role that is not logged in at all is handled by the
            // privilege check below, not by a doomed profile fetch.
            if self.session.is_logged_in(dest_role) && !self.session.profile_loaded(dest_role) {
                self.session.fetch_profile(dest_role).await;
                if !self.session.profile_loaded(dest_role) {
                    return GuardDecision::login(dest_role, path, RedirectReason::ProfileUnavailable);
                }
            }
        }

        if rules.requires_admin && !admin_in {
            return GuardDecision::Redirect {
                target: Role::User.landing_path().to_owned(),
                reason: RedirectReason::AdminRequired,
            };
        }

        GuardDecision::Proceed
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
