//! The session store: per-role tokens and profiles, hydration, and the
//! refresh timer.
//!
//! ARCHITECTURE
//! ============
//! One store per application instance. In-memory state mirrors the two
//! browser storages: every mutation writes through to persistent storage
//! synchronously, so a page reload reconstructs equivalent state from the
//! storages alone. The two roles' credentials are fully independent —
//! logging one out never touches the other.
//!
//! TRADE-OFFS
//! ==========
//! Profile fetches fail soft (logged, not returned) so a transient profile
//! outage degrades the UI instead of tearing down a valid token session.
//! Callers gate on [`ProfileSnapshot::loaded`] instead.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;

use crate::config::SessionConfig;
use crate::role::{PerRole, Role, RoleResolver};
use crate::sched::{Scheduler, TaskHandle};
use crate::session::api::{AuthApi, AuthError, RefreshFailure};
use crate::session::events::{EventBus, RefreshSource, SessionEvent};
use crate::session::types::{
    CredentialRecord, LoginCredentials, ProfileSnapshot, ProfileUpdate, unix_ms_now,
};
use crate::storage::{CredentialStore, KeyValueStorage, TabStore};

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Default)]
struct SessionState {
    active: Option<Role>,
    tokens: PerRole<String>,
    profiles: PerRole<ProfileSnapshot>,
}

struct Inner {
    config: SessionConfig,
    state: Mutex<SessionState>,
    creds: CredentialStore,
    tab: TabStore,
    resolver: RoleResolver,
    api: Arc<dyn AuthApi>,
    scheduler: Arc<dyn Scheduler>,
    timers: Mutex<PerRole<Option<TaskHandle>>>,
    bus: EventBus,
}

/// Reactive session record for one application instance. Cheap to clone;
/// clones share state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    /// Build a store and hydrate it from the two storages.
    ///
    /// Hydration does not arm refresh timers (construction may happen before
    /// a runtime is available); call [`Self::resume_refresh_schedule`] once
    /// the host is ready to let stored sessions refresh proactively.
    #[must_use]
    pub fn new(
        config: SessionConfig,
        persistent: Arc<dyn KeyValueStorage>,
        tab: Arc<dyn KeyValueStorage>,
        api: Arc<dyn AuthApi>,
        scheduler: Arc<dyn Scheduler>,
        bus: EventBus,
    ) -> Self {
        let creds = CredentialStore::new(persistent);
        let tab = TabStore::new(tab);
        let resolver = RoleResolver::new(creds.clone(), tab.clone());

        let mut state = SessionState::default();
        for role in [Role::User, Role::Admin] {
            if let Some(record) = creds.load(role) {
                *state.tokens.get_mut(role) = record.access_token;
                *state.profiles.get_mut(role) = record.profile;
            }
        }
        state.active = tab.read().or_else(|| {
            [Role::User, Role::Admin]
                .into_iter()
                .find(|&role| creds.has_token(role))
        });

        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(state),
                creds,
                tab,
                resolver,
                api,
                scheduler,
                timers: Mutex::new(PerRole::default()),
                bus,
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_timers(&self) -> MutexGuard<'_, PerRole<Option<TaskHandle>>> {
        self.inner
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // READ SIDE
    // =========================================================================

    /// The role this instance currently presents to the UI.
    #[must_use]
    pub fn active_role(&self) -> Role {
        self.lock_state().active.unwrap_or(Role::User)
    }

    /// In-memory access token for a role, falling back to storage (another
    /// tab may have refreshed it).
    #[must_use]
    pub fn token(&self, role: Role) -> Option<String> {
        let in_memory = self.lock_state().tokens.get(role).clone();
        if in_memory.is_empty() {
            self.inner.creds.access_token(role)
        } else {
            Some(in_memory)
        }
    }

    #[must_use]
    pub fn profile(&self, role: Role) -> ProfileSnapshot {
        self.lock_state().profiles.get(role).clone()
    }

    #[must_use]
    pub fn profile_loaded(&self, role: Role) -> bool {
        self.lock_state().profiles.get(role).loaded()
    }

    /// "Has valid session" for the active role: a token plus a loaded
    /// profile.
    #[must_use]
    pub fn has_valid_session(&self) -> bool {
        let state = self.lock_state();
        let Some(active) = state.active else {
            return false;
        };
        !state.tokens.get(active).is_empty() && state.profiles.get(active).loaded()
    }

    /// Whether persistent storage holds a token for this role.
    #[must_use]
    pub fn has_stored_session(&self, role: Role) -> bool {
        self.inner.creds.has_token(role)
    }

    /// Logged-in check used by navigation: storage presence wins right after
    /// a reload, before memory is warm.
    #[must_use]
    pub fn is_logged_in(&self, role: Role) -> bool {
        self.has_stored_session(role) || !self.lock_state().tokens.get(role).is_empty()
    }

    /// Resolve which role a call acts as. See [`RoleResolver`].
    #[must_use]
    pub fn resolve_role(&self, explicit: Option<Role>, path: &str) -> Role {
        self.inner.resolver.resolve(explicit, path)
    }

    /// Subscribe-side access to the session event bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Switch which role's profile the UI presents. Tokens are untouched.
    pub fn set_active_role(&self, role: Role) {
        self.lock_state().active = Some(role);
        self.inner.tab.write(role);
    }

    /// Authenticate against the backend and establish a session for the
    /// server-declared role.
    pub async fn login(&self, credentials: LoginCredentials) -> Result<(), AuthError> {
        let outcome = self.inner.api.login(&credentials).await?;
        let role = outcome.role;

        {
            let mut state = self.lock_state();
            state.active = Some(role);
            *state.tokens.get_mut(role) = outcome.access_token.clone();
            *state.profiles.get_mut(role) = outcome.profile.clone();
        }
        let record = CredentialRecord {
            access_token: outcome.access_token.clone(),
            refresh_token: outcome.refresh_token,
            expires_at: outcome.expires_at,
            profile: outcome.profile,
        };
        self.inner.creds.save(role, &record);
        self.inner.tab.write(role);
        self.arm_refresh(role, outcome.expires_at);
        self.inner.bus.emit(SessionEvent::Refreshed {
            role,
            access_token: outcome.access_token,
            source: RefreshSource::Login,
        });
        tracing::info!(%role, user_id = record.profile.user_id, "login succeeded");
        Ok(())
    }

    /// Tear down one role's session. The other role's session is never
    /// touched. Never fails: the server-side logout call is best effort.
    pub async fn logout(&self, role: Role) {
        if let Some(handle) = self.lock_timers().get_mut(role).take() {
            handle.cancel();
        }

        if let Some(token) = self.token(role) {
            if let Err(e) = self.inner.api.logout(role, &token).await {
                tracing::debug!(error = %e, %role, "server-side logout failed");
            }
        }

        let was_active = {
            let mut state = self.lock_state();
            state.tokens.get_mut(role).clear();
            *state.profiles.get_mut(role) = ProfileSnapshot::default();
            state.active == Some(role)
        };
        self.inner.creds.clear(role);

        if was_active {
            let other = role.other();
            if self.is_logged_in(other) {
                self.lock_state().active = Some(other);
                self.inner.tab.write(other);
            } else {
                self.lock_state().active = None;
                self.inner.tab.clear();
            }
        }

        self.inner.bus.emit(SessionEvent::Cleared { role });
        tracing::info!(%role, "session cleared");
    }

    /// Convenience for `logout(active_role())`.
    pub async fn logout_active(&self) {
        let role = self.active_role();
        self.logout(role).await;
    }

    /// Fetch and hydrate one role's profile. No-op without a token; failures
    /// are logged, not returned — check [`Self::profile_loaded`] after.
    pub async fn fetch_profile(&self, role: Role) {
        let Some(token) = self.token(role) else {
            return;
        };
        match self.inner.api.fetch_profile(role, &token).await {
            Ok(profile) => self.store_profile(role, &token, profile),
            Err(e) => tracing::warn!(error = %e, %role, "profile fetch failed"),
        }
    }

    /// Push a profile edit and hydrate the merged snapshot the backend
    /// returns.
    pub async fn update_profile(&self, role: Role, changes: ProfileUpdate) -> Result<(), AuthError> {
        let token = self.token(role).ok_or(AuthError::MissingToken)?;
        let profile = self.inner.api.update_profile(role, &token, &changes).await?;
        self.store_profile(role, &token, profile);
        Ok(())
    }

    fn store_profile(&self, role: Role, token: &str, profile: ProfileSnapshot) {
        {
            let mut state = self.lock_state();
            *state.profiles.get_mut(role) = profile.clone();
        }
        let mut record = self.inner.creds.load(role).unwrap_or_else(|| CredentialRecord {
            access_token: token.to_owned(),
            ..CredentialRecord::default()
        });
        record.profile = profile;
        self.inner.creds.save(role, &record);
    }

    /// Exchange the stored refresh token for a fresh access token.
    ///
    /// # Errors
    ///
    /// [`RefreshFailure`] when no refresh token is stored or the backend
    /// rejects it. The caller is expected to log the role out.
    pub async fn refresh_session(
        &self,
        role: Role,
        source: RefreshSource,
    ) -> Result<(), RefreshFailure> {
        let refresh_token = self
            .inner
            .creds
            .load(role)
            .and_then(|record| record.refresh_token)
            .ok_or(RefreshFailure::MissingToken { role })?;

        let outcome = self.inner.api.refresh(role, &refresh_token).await?;

        {
            let mut state = self.lock_state();
            *state.tokens.get_mut(role) = outcome.access_token.clone();
        }
        let mut record = self.inner.creds.load(role).unwrap_or_default();
        record.access_token = outcome.access_token.clone();
        record.refresh_token = outcome.refresh_token.or(Some(refresh_token));
        record.expires_at = outcome.expires_at;
        record.profile = self.profile(role);
        self.inner.creds.save(role, &record);

        self.arm_refresh(role, outcome.expires_at);
        self.inner.bus.emit(SessionEvent::Refreshed {
            role,
            access_token: outcome.access_token,
            source,
        });
        tracing::debug!(%role, ?source, "session refreshed");
        Ok(())
    }

    // =========================================================================
    // REFRESH SCHEDULING
    // =========================================================================

    /// Re-arm refresh timers for every stored session that has an expiry.
    /// Call once after construction, from within the async host.
    pub fn resume_refresh_schedule(&self) {
        for role in [Role::User, Role::Admin] {
            if let Some(record) = self.inner.creds.load(role) {
                self.arm_refresh(role, record.expires_at);
            }
        }
    }

    fn arm_refresh(&self, role: Role, expires_at: Option<i64>) {
        if let Some(previous) = self.lock_timers().get_mut(role).take() {
            previous.cancel();
        }
        let Some(expires_at) = expires_at else {
            return;
        };
        let delay = refresh_delay(
            expires_at,
            unix_ms_now(),
            self.inner.config.refresh_margin,
            self.inner.config.refresh_min_delay,
        );

        let store = self.clone();
        let task = async move {
            if let Err(e) = store.refresh_session(role, RefreshSource::Scheduler).await {
                tracing::warn!(error = %e, %role, "scheduled refresh failed, logging out");
                store.logout(role).await;
            }
        }
        .boxed();
        let handle = self.inner.scheduler.schedule(delay, task);
        *self.lock_timers().get_mut(role) = Some(handle);
    }
}

/// Delay until the proactive refresh should fire: the margin before expiry,
/// floored so an already-stale token still refreshes almost immediately
/// instead of in the past.
pub(crate) fn refresh_delay(
    expires_at_ms: i64,
    now_ms: i64,
    margin: Duration,
    min_delay: Duration,
) -> Duration {
    let margin_ms = i64::try_from(margin.as_millis()).unwrap_or(i64::MAX);
    let min_ms = i64::try_from(min_delay.as_millis()).unwrap_or(i64::MAX);
    let delay_ms = (expires_at_ms - now_ms - margin_ms).max(min_ms);
    Duration::from_millis(u64::try_from(delay_ms).unwrap_or(0))
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
