//! Single-flight token refresh with request replay.
//!
//! ARCHITECTURE
//! ============
//! Process-global state machine `Idle -> Refreshing -> Idle`. The first
//! request that hits an unauthorized response becomes the leader: it runs
//! the refresh, then replays every queued request sequentially in arrival
//! order (itself first) and hands each result back over a oneshot. Requests
//! that go unauthorized while a refresh is in flight only enqueue their
//! replay continuation — a second refresh call is never issued.
//!
//! On refresh failure every queued request is rejected, the role is logged
//! out exactly once, and the user is sent to that role's login page. The
//! login redirect is rate-limited so a burst of rejected requests cannot
//! storm the router.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use tokio::sync::oneshot;

use crate::net::error::ApiError;
use crate::notify::RateLimitedRedirects;
use crate::role::Role;
use crate::session::events::RefreshSource;
use crate::session::store::SessionStore;

/// A queued request's replay continuation: re-issues the original request
/// once with whatever token is now stored.
pub type ReplayFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<serde_json::Value, ApiError>> + Send>;

struct Queued {
    replay: ReplayFn,
    done: oneshot::Sender<Result<serde_json::Value, ApiError>>,
}

enum State {
    Idle,
    Refreshing { queue: Vec<Queued> },
}

struct Inner {
    session: SessionStore,
    state: Mutex<State>,
    redirects: RateLimitedRedirects,
}

/// Coordinates token refresh across all in-flight gateway requests.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new(session: SessionStore, redirects: RateLimitedRedirects) -> Self {
        Self {
            inner: Arc::new(Inner {
                session,
                state: Mutex::new(State::Idle),
                redirects,
            }),
        }
    }

    /// Recover an unauthorized request: join (or start) the single in-flight
    /// refresh, then resolve with the replayed request's result.
    pub async fn recover(&self, role: Role, replay: ReplayFn) -> Result<serde_json::Value, ApiError> {
        let (tx, rx) = oneshot::channel();
        let is_leader = {
            let mut state = self
                .inner
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match &mut *state {
                State::Refreshing { queue } => {
                    queue.push(Queued { replay, done: tx });
                    false
                }
                State::Idle => {
                    *state = State::Refreshing { queue: vec![Queued { replay, done: tx }] };
                    true
                }
            }
        };

        if is_leader {
            self.lead_refresh(role).await;
        }

        rx.await.unwrap_or_else(|_| {
            Err(ApiError::Refresh(crate::session::api::RefreshFailure::Rejected(
                "refresh coordinator dropped".to_owned(),
            )))
        })
    }

    /// Leader path: run the refresh, then drain the queue.
    async fn lead_refresh(&self, role: Role) {
        let outcome = self
            .inner
            .session
            .refresh_session(role, RefreshSource::Gateway)
            .await;

        let queue = {
            let mut state = self
                .inner
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *state, State::Idle) {
                State::Refreshing { queue } => queue,
                State::Idle => Vec::new(),
            }
        };

        match outcome {
            Ok(()) => {
                tracing::debug!(%role, queued = queue.len(), "refresh succeeded, replaying requests");
                for entry in queue {
                    let result = (entry.replay)().await;
                    let _ = entry.done.send(result);
                }
            }
            Err(failure) => {
                tracing::warn!(error = %failure, %role, queued = queue.len(), "refresh failed, clearing session");
                self.inner.session.logout(role).await;
                self.inner.redirects.redirect(role.login_path());
                for entry in queue {
                    let _ = entry.done.send(Err(ApiError::Refresh(failure.clone())));
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "refresh_test.rs"]
mod tests;
