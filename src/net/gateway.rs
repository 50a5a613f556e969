//! The outgoing-request pipeline for domain endpoints.
//!
//! ARCHITECTURE
//! ============
//! Every domain call (pets, adoptions, fosters, health alerts, articles)
//! funnels through [`Gateway::request`]. The request phase resolves which
//! role the call acts as and attaches that role's bearer token and the
//! role header, unless the endpoint is on the public allow-list. The
//! response phase classifies the body in a fixed order — unauthorized,
//! HTML-instead-of-JSON, business code, transport status — and either
//! returns the envelope's `data`, hands the request to the refresh
//! coordinator for replay, or surfaces a user-visible notice and rejects.

use std::sync::Arc;

use futures::FutureExt;
use reqwest::Method;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::net::error::{ApiError, TransportError};
use crate::net::refresh::{RefreshCoordinator, ReplayFn};
use crate::net::wire::{SESSION_ROLE_HEADER, looks_like_html, parse_envelope};
use crate::notify::{CoalescingNotices, NavigationSink, NoticeSink, RateLimitedRedirects};
use crate::role::Role;
use crate::session::store::SessionStore;

/// Forbidden page shown after a 403, carrying the attempted path and reason.
const FORBIDDEN_PATH: &str = "/403";

/// Per-call overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    /// Act as this role regardless of tab or path resolution.
    pub role: Option<Role>,
}

/// Classified response outcome, before refresh handling.
enum Classified {
    Success(serde_json::Value),
    Unauthorized,
    Failed(ApiError),
}

struct Inner {
    http: reqwest::Client,
    config: SessionConfig,
    session: SessionStore,
    coordinator: RefreshCoordinator,
    notices: CoalescingNotices,
    nav: Arc<dyn NavigationSink>,
}

/// The single outgoing-request pipeline. Cheap to clone; clones share the
/// HTTP client and coordinator.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<Inner>,
}

impl Gateway {
    /// Build the pipeline around an existing session store.
    ///
    /// # Errors
    ///
    /// [`ApiError::ClientBuild`] when the HTTP client cannot be constructed.
    pub fn new(
        config: SessionConfig,
        session: SessionStore,
        notice_sink: Arc<dyn NoticeSink>,
        nav: Arc<dyn NavigationSink>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ApiError::ClientBuild(e.to_string()))?;
        let notices = CoalescingNotices::new(notice_sink, config.notice_window);
        let redirects = RateLimitedRedirects::new(nav.clone(), config.redirect_window);
        let coordinator = RefreshCoordinator::new(session.clone(), redirects);
        Ok(Self {
            inner: Arc::new(Inner { http, config, session, coordinator, notices, nav }),
        })
    }

    pub async fn get(&self, path: &str) -> Result<serde_json::Value, ApiError> {
        self.request(Method::GET, path, None, RequestOptions::default())
            .await
    }

    pub async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        self.request(Method::POST, path, Some(body), RequestOptions::default())
            .await
    }

    pub async fn put(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        self.request(Method::PUT, path, Some(body), RequestOptions::default())
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<serde_json::Value, ApiError> {
        self.request(Method::DELETE, path, None, RequestOptions::default())
            .await
    }

    /// Issue a domain request and return the envelope's `data` on success.
    ///
    /// # Errors
    ///
    /// [`ApiError`] per the taxonomy in [`crate::net::error`]; unauthorized
    /// responses on non-public endpoints are recovered via refresh-and-replay
    /// before an error is ever surfaced.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> Result<serde_json::Value, ApiError> {
        let role = self.inner.session.resolve_role(options.role, path);
        let request_id = Uuid::new_v4();
        tracing::debug!(%request_id, %role, %method, path, "dispatching request");

        match self.perform(method.clone(), path, body.clone(), role).await {
            Classified::Success(data) => Ok(data),
            Classified::Failed(error) => {
                self.report(path, &error);
                Err(error)
            }
            Classified::Unauthorized => {
                let gateway = self.clone();
                let path_owned = path.to_owned();
                let replay: ReplayFn = Box::new(move || {
                    async move {
                        match gateway
                            .perform(method, &path_owned, body, role)
                            .await
                        {
                            Classified::Success(data) => Ok(data),
                            Classified::Failed(error) => {
                                gateway.report(&path_owned, &error);
                                Err(error)
                            }
                            // Still unauthorized after a fresh token: surface
                            // as a plain transport failure, no second refresh.
                            Classified::Unauthorized => {
                                let error =
                                    ApiError::Transport(TransportError::Status { status: 401 });
                                gateway.report(&path_owned, &error);
                                Err(error)
                            }
                        }
                    }
                    .boxed()
                });
                self.inner.coordinator.recover(role, replay).await
            }
        }
    }

    /// Send one request and classify its response. Never triggers a refresh.
    async fn perform(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        role: Role,
    ) -> Classified {
        let url = format!("{}{path}", self.inner.config.base_url);
        let public = self.inner.config.is_public(path);

        let mut request = self.inner.http.request(method, &url);
        if !public {
            if let Some(token) = self.inner.session.token(role) {
                request = request
                    .bearer_auth(token)
                    .header(SESSION_ROLE_HEADER, role.header_value());
            }
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return Classified::Failed(ApiError::Transport(TransportError::Network(
                    e.to_string(),
                )));
            }
        };
        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                return Classified::Failed(ApiError::Transport(TransportError::Network(
                    e.to_string(),
                )));
            }
        };

        classify(status, &text, public)
    }

    /// Surface a failure to the UI: coalesced notice, plus the forbidden
    /// redirect for a 403.
    fn report(&self, path: &str, error: &ApiError) {
        match error {
            ApiError::Business { .. } | ApiError::Transport(_) | ApiError::Configuration(_) => {
                self.inner.notices.publish(&error.to_string());
            }
            ApiError::Refresh(_) | ApiError::ClientBuild(_) => {}
        }
        if let ApiError::Transport(TransportError::Status { status: 403 }) = error {
            let target = format!("{FORBIDDEN_PATH}?from={path}&reason=forbidden");
            self.inner.nav.redirect(&target);
        }
    }
}

/// Classify a response body. Order matters and mirrors how failures are
/// recovered: unauthorized first (recoverable), then the HTML misconfig
/// check, then the application code, then raw transport status.
fn classify(status: u16, body: &str, public: bool) -> Classified {
    if status == 401 && !public {
        return Classified::Unauthorized;
    }
    if looks_like_html(body) {
        return Classified::Failed(ApiError::Configuration("HTML document received".to_owned()));
    }
    if let Some(envelope) = parse_envelope(body) {
        if envelope.is_unauthorized() && !public {
            return Classified::Unauthorized;
        }
        if envelope.is_success() {
            return Classified::Success(envelope.data);
        }
        return Classified::Failed(ApiError::Business {
            code: envelope.code.clone(),
            message: envelope.display_message(),
        });
    }
    if !(200..300).contains(&status) {
        return Classified::Failed(ApiError::Transport(TransportError::Status { status }));
    }
    Classified::Failed(ApiError::Configuration("unparseable response body".to_owned()))
}

#[cfg(test)]
#[path = "gateway_test.rs"]
mod tests;
