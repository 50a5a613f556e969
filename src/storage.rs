//! Storage abstraction and the credential/tab stores built on it.
//!
//! DESIGN
//! ======
//! The browser gives us two key-value stores: one persistent per profile
//! (localStorage) and one scoped to a single tab (sessionStorage). Both are
//! modeled by the [`KeyValueStorage`] trait so the session core stays
//! portable and testable; [`MemoryStorage`] is the in-process implementation
//! used by native hosts and tests.
//!
//! Every credential key is prefixed with the role slug (`user_jwt_token`,
//! `admin_jwt_token`, ...) so the two roles' sessions never collide and one
//! can be cleared without touching the other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::role::Role;
use crate::session::types::{CredentialRecord, ProfileSnapshot};

/// Synchronous string key-value storage. All operations are infallible the
/// way browser storage is: writes that cannot be honored are dropped.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    /// Snapshot of all present keys, unordered.
    fn keys(&self) -> Vec<String>;
}

/// In-memory [`KeyValueStorage`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.lock().insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.lock().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

// =============================================================================
// KEY LAYOUT
// =============================================================================

const SUFFIX_JWT_TOKEN: &str = "jwt_token";
const SUFFIX_REFRESH_TOKEN: &str = "refresh_token";
const SUFFIX_JWT_EXPIRE_AT: &str = "jwt_expire_at";
const SUFFIX_USER_ID: &str = "userId";
const SUFFIX_USER_INFO: &str = "userInfo";
const SUFFIX_USER_NAME: &str = "userName";

/// Tab marker key recording which role this tab acts as.
pub const TAB_ROLE_KEY: &str = "pawhaven_role";
/// Alias kept readable/writable for bundles that predate the rename.
pub const TAB_ROLE_KEY_LEGACY: &str = "current_role";

fn role_key(role: Role, suffix: &str) -> String {
    format!("{}_{suffix}", role.slug())
}

// =============================================================================
// CREDENTIAL STORE
// =============================================================================

/// Typed view over persistent storage for per-role credential records.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStorage>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStorage>) -> Self {
        Self { store }
    }

    /// Persist a full credential record for one role.
    pub fn save(&self, role: Role, record: &CredentialRecord) {
        self.store
            .set(&role_key(role, SUFFIX_JWT_TOKEN), &record.access_token);
        match &record.refresh_token {
            Some(token) => self.store.set(&role_key(role, SUFFIX_REFRESH_TOKEN), token),
            None => self.store.remove(&role_key(role, SUFFIX_REFRESH_TOKEN)),
        }
        match record.expires_at {
            Some(at) => self
                .store
                .set(&role_key(role, SUFFIX_JWT_EXPIRE_AT), &at.to_string()),
            None => self.store.remove(&role_key(role, SUFFIX_JWT_EXPIRE_AT)),
        }
        self.store.set(
            &role_key(role, SUFFIX_USER_ID),
            &record.profile.user_id.to_string(),
        );
        self.store.set(
            &role_key(role, SUFFIX_USER_NAME),
            &record.profile.display_name,
        );
        if let Ok(json) = serde_json::to_string(&record.profile) {
            self.store.set(&role_key(role, SUFFIX_USER_INFO), &json);
        }
    }

    /// Load the credential record for one role. `None` when no access token
    /// is stored.
    #[must_use]
    pub fn load(&self, role: Role) -> Option<CredentialRecord> {
        let access_token = self.access_token(role)?;
        let refresh_token = self.store.get(&role_key(role, SUFFIX_REFRESH_TOKEN));
        let expires_at = self
            .store
            .get(&role_key(role, SUFFIX_JWT_EXPIRE_AT))
            .and_then(|raw| raw.parse::<i64>().ok());
        let profile = self.load_profile(role);
        Some(CredentialRecord { access_token, refresh_token, expires_at, profile })
    }

    fn load_profile(&self, role: Role) -> ProfileSnapshot {
        let mut profile = self
            .store
            .get(&role_key(role, SUFFIX_USER_INFO))
            .and_then(|json| serde_json::from_str::<ProfileSnapshot>(&json).ok())
            .unwrap_or_default();
        // The scalar keys win over the serialized blob when both are present;
        // older bundles wrote them independently.
        if let Some(id) = self
            .store
            .get(&role_key(role, SUFFIX_USER_ID))
            .and_then(|raw| raw.parse::<i64>().ok())
        {
            profile.user_id = id;
        }
        if let Some(name) = self.store.get(&role_key(role, SUFFIX_USER_NAME)) {
            if !name.is_empty() {
                profile.display_name = name;
            }
        }
        profile
    }

    #[must_use]
    pub fn access_token(&self, role: Role) -> Option<String> {
        self.store
            .get(&role_key(role, SUFFIX_JWT_TOKEN))
            .filter(|token| !token.is_empty())
    }

    #[must_use]
    pub fn has_token(&self, role: Role) -> bool {
        self.access_token(role).is_some()
    }

    /// Remove every key under this role's slug prefix: tokens, profile, and
    /// any role-scoped UI artifacts (cached filters and the like). The other
    /// role's keys are untouched.
    pub fn clear(&self, role: Role) {
        let prefix = format!("{}_", role.slug());
        for key in self.store.keys() {
            if key.starts_with(&prefix) {
                self.store.remove(&key);
            }
        }
    }
}

// =============================================================================
// TAB STORE
// =============================================================================

/// Typed view over tab-scoped storage for the role marker.
#[derive(Clone)]
pub struct TabStore {
    store: Arc<dyn KeyValueStorage>,
}

impl TabStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStorage>) -> Self {
        Self { store }
    }

    /// The role this tab is pinned to, if any. The current key wins over the
    /// legacy alias.
    #[must_use]
    pub fn read(&self) -> Option<Role> {
        self.store
            .get(TAB_ROLE_KEY)
            .or_else(|| self.store.get(TAB_ROLE_KEY_LEGACY))
            .and_then(|raw| raw.parse().ok())
    }

    /// Pin the tab to a role. Both keys are written so older bundles sharing
    /// the tab agree.
    pub fn write(&self, role: Role) {
        self.store.set(TAB_ROLE_KEY, role.header_value());
        self.store.set(TAB_ROLE_KEY_LEGACY, role.header_value());
    }

    pub fn clear(&self) {
        self.store.remove(TAB_ROLE_KEY);
        self.store.remove(TAB_ROLE_KEY_LEGACY);
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
