//! Session data model: profiles and credential records.

use serde::{Deserialize, Serialize};

use crate::role::Role;

/// Cached profile fields for one role's account.
///
/// `user_id == 0` means "not loaded yet" — hosts gate on [`Self::loaded`]
/// rather than on fetch errors, since profile fetches fail soft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileSnapshot {
    pub user_id: i64,
    pub display_name: String,
    pub avatar_ref: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub role: Option<Role>,
    /// Shelter this account administers; admin accounts only.
    pub admin_shelter_id: Option<i64>,
}

impl ProfileSnapshot {
    #[must_use]
    pub fn loaded(&self) -> bool {
        self.user_id > 0
    }
}

/// Persisted token + profile bundle for one role.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Access-token expiry, unix milliseconds.
    pub expires_at: Option<i64>,
    pub profile: ProfileSnapshot,
}

/// Login form payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginCredentials {
    pub account: String,
    pub password: String,
}

/// Partial profile edit; unset fields are left unchanged server-side.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

/// Current time as unix milliseconds.
#[must_use]
pub(crate) fn unix_ms_now() -> i64 {
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
