//! Auth endpoint client — login, refresh, profile, logout.
//!
//! [`AuthApi`] keeps the session store independent of the HTTP layer and
//! mockable in tests; [`HttpAuthApi`] is the real client. Domain endpoints do
//! not live here — they go through the gateway, which layers token refresh on
//! top. The auth endpoints themselves must never recurse into that machinery.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::SessionConfig;
use crate::net::wire::{Envelope, SESSION_ROLE_HEADER, parse_envelope};
use crate::role::Role;
use crate::session::types::{
    LoginCredentials, ProfileSnapshot, ProfileUpdate, unix_ms_now,
};

// =============================================================================
// ERRORS
// =============================================================================

/// Login or profile call failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The backend rejected the call; message is the server's own.
    #[error("authentication rejected: {0}")]
    Rejected(String),
    /// A success envelope arrived without a usable access token.
    #[error("login response missing access token")]
    MissingToken,
    #[error("auth transport failed: {0}")]
    Transport(String),
    #[error("auth response parse failed: {0}")]
    Parse(String),
    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),
}

/// Refresh failures. Always escalates to logging the role out.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RefreshFailure {
    #[error("no refresh token stored for {role}")]
    MissingToken { role: Role },
    #[error("refresh rejected: {0}")]
    Rejected(String),
    #[error("refresh transport failed: {0}")]
    Transport(String),
}

// =============================================================================
// OUTCOMES
// =============================================================================

/// Parsed result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix milliseconds.
    pub expires_at: Option<i64>,
    pub role: Role,
    pub profile: ProfileSnapshot,
}

/// Parsed result of a successful token refresh.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub access_token: String,
    /// Present when the backend rotates refresh tokens.
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
}

// =============================================================================
// TRAIT
// =============================================================================

/// Auth endpoint operations. Mockable in tests.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, credentials: &LoginCredentials) -> Result<LoginOutcome, AuthError>;

    async fn refresh(&self, role: Role, refresh_token: &str) -> Result<RefreshOutcome, RefreshFailure>;

    async fn fetch_profile(&self, role: Role, access_token: &str) -> Result<ProfileSnapshot, AuthError>;

    async fn update_profile(
        &self,
        role: Role,
        access_token: &str,
        changes: &ProfileUpdate,
    ) -> Result<ProfileSnapshot, AuthError>;

    async fn logout(&self, role: Role, access_token: &str) -> Result<(), AuthError>;
}

// =============================================================================
// WIRE SHAPES
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TokenGrant {
    access_token: String,
    /// Older backend builds send the token under this name.
    token: String,
    refresh_token: Option<String>,
    /// Absolute expiry, unix milliseconds. Preferred over `expires_in`.
    expires_at: Option<i64>,
    /// Relative expiry, seconds.
    expires_in: Option<i64>,
    role: Option<String>,
    user_info: Option<ProfileSnapshot>,
}

impl TokenGrant {
    fn access_token(&self) -> Option<String> {
        if !self.access_token.is_empty() {
            Some(self.access_token.clone())
        } else if !self.token.is_empty() {
            Some(self.token.clone())
        } else {
            None
        }
    }

    fn expires_at_ms(&self) -> Option<i64> {
        self.expires_at
            .or_else(|| self.expires_in.map(|secs| unix_ms_now() + secs * 1000))
    }
}

/// Decide which role a login established. The profile's declared role wins
/// over the top-level field; a disagreement is logged and the profile's
/// claim trusted, since the profile is what every later authorization check
/// reads.
fn grant_role(grant: &TokenGrant) -> Role {
    let top_level: Option<Role> = grant.role.as_deref().and_then(|raw| raw.parse().ok());
    let declared = grant.user_info.as_ref().and_then(|info| info.role);
    match (declared, top_level) {
        (Some(profile_role), Some(envelope_role)) if profile_role != envelope_role => {
            tracing::warn!(
                %profile_role,
                %envelope_role,
                "login payload declares conflicting roles; trusting profile"
            );
            profile_role
        }
        (Some(role), _) | (None, Some(role)) => role,
        (None, None) => Role::User,
    }
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

/// [`AuthApi`] over HTTP.
pub struct HttpAuthApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAuthApi {
    pub fn new(config: &SessionConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| AuthError::ClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.base_url.clone() })
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
        bearer: Option<(&str, Role)>,
    ) -> Result<Envelope, AuthError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.http.post(&url).json(body);
        if let Some((token, role)) = bearer {
            request = request
                .bearer_auth(token)
                .header(SESSION_ROLE_HEADER, role.header_value());
        }
        envelope_for(request).await
    }

    fn parse_profile(envelope: Envelope) -> Result<ProfileSnapshot, AuthError> {
        if !envelope.is_success() {
            return Err(AuthError::Rejected(envelope.display_message()));
        }
        serde_json::from_value(envelope.data).map_err(|e| AuthError::Parse(e.to_string()))
    }
}

async fn envelope_for(request: reqwest::RequestBuilder) -> Result<Envelope, AuthError> {
    let response = request
        .send()
        .await
        .map_err(|e| AuthError::Transport(e.to_string()))?;
    let text = response
        .text()
        .await
        .map_err(|e| AuthError::Transport(e.to_string()))?;
    parse_envelope(&text).ok_or_else(|| AuthError::Parse(format!("unexpected response: {text}")))
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, credentials: &LoginCredentials) -> Result<LoginOutcome, AuthError> {
        let body = serde_json::to_value(credentials).map_err(|e| AuthError::Parse(e.to_string()))?;
        let envelope = self.post_json("/user/login", &body, None).await?;
        if !envelope.is_success() {
            return Err(AuthError::Rejected(envelope.display_message()));
        }
        let grant: TokenGrant =
            serde_json::from_value(envelope.data).map_err(|e| AuthError::Parse(e.to_string()))?;
        let access_token = grant.access_token().ok_or(AuthError::MissingToken)?;
        let role = grant_role(&grant);
        let mut profile = grant.user_info.clone().unwrap_or_default();
        if profile.role.is_none() {
            profile.role = Some(role);
        }
        Ok(LoginOutcome {
            access_token,
            refresh_token: grant.refresh_token.clone(),
            expires_at: grant.expires_at_ms(),
            role,
            profile,
        })
    }

    async fn refresh(&self, role: Role, refresh_token: &str) -> Result<RefreshOutcome, RefreshFailure> {
        let url = format!("{}/user/refresh-token", self.base_url);
        let body = serde_json::json!({ "refreshToken": refresh_token });
        let request = self
            .http
            .post(&url)
            .header(SESSION_ROLE_HEADER, role.header_value())
            .json(&body);
        let envelope = envelope_for(request)
            .await
            .map_err(|e| RefreshFailure::Transport(e.to_string()))?;
        if !envelope.is_success() {
            return Err(RefreshFailure::Rejected(envelope.display_message()));
        }
        let grant: TokenGrant = serde_json::from_value(envelope.data)
            .map_err(|e| RefreshFailure::Transport(e.to_string()))?;
        let access_token = grant
            .access_token()
            .ok_or_else(|| RefreshFailure::Rejected("refresh response missing access token".to_owned()))?;
        Ok(RefreshOutcome {
            access_token,
            refresh_token: grant.refresh_token.clone(),
            expires_at: grant.expires_at_ms(),
        })
    }

    async fn fetch_profile(&self, role: Role, access_token: &str) -> Result<ProfileSnapshot, AuthError> {
        let url = format!("{}/user/profile", self.base_url);
        let request = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .header(SESSION_ROLE_HEADER, role.header_value());
        Self::parse_profile(envelope_for(request).await?)
    }

    async fn update_profile(
        &self,
        role: Role,
        access_token: &str,
        changes: &ProfileUpdate,
    ) -> Result<ProfileSnapshot, AuthError> {
        let url = format!("{}/user/profile", self.base_url);
        let request = self
            .http
            .put(&url)
            .bearer_auth(access_token)
            .header(SESSION_ROLE_HEADER, role.header_value())
            .json(changes);
        Self::parse_profile(envelope_for(request).await?)
    }

    async fn logout(&self, role: Role, access_token: &str) -> Result<(), AuthError> {
        let body = serde_json::json!({});
        let envelope = self
            .post_json("/user/logout", &body, Some((access_token, role)))
            .await?;
        if !envelope.is_success() {
            return Err(AuthError::Rejected(envelope.display_message()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
