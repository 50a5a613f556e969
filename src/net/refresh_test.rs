use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;

use super::*;
use crate::config::SessionConfig;
use crate::net::error::ApiError;
use crate::notify::NavigationSink;
use crate::sched::{Scheduler, TaskHandle};
use crate::session::api::{
    AuthApi, AuthError, LoginOutcome, RefreshFailure, RefreshOutcome,
};
use crate::session::events::{EventBus, SessionEvent};
use crate::session::types::{
    CredentialRecord, LoginCredentials, ProfileSnapshot, ProfileUpdate,
};
use crate::storage::{CredentialStore, KeyValueStorage, MemoryStorage};

// =============================================================================
// MOCKS
// =============================================================================

/// Auth backend whose refresh call takes simulated time, so concurrent
/// unauthorized requests pile up behind the first one.
#[derive(Default)]
struct SlowAuth {
    refresh_calls: AtomicUsize,
    fail_refresh: AtomicBool,
}

#[async_trait]
impl AuthApi for SlowAuth {
    async fn login(&self, _credentials: &LoginCredentials) -> Result<LoginOutcome, AuthError> {
        Err(AuthError::Rejected("not under test".to_owned()))
    }

    async fn refresh(&self, _role: Role, _refresh_token: &str) -> Result<RefreshOutcome, RefreshFailure> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_millis(50)).await;
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(RefreshFailure::Rejected("refresh token expired".to_owned()));
        }
        Ok(RefreshOutcome {
            access_token: format!("refreshed-{call}"),
            refresh_token: None,
            expires_at: None,
        })
    }

    async fn fetch_profile(&self, _role: Role, _access_token: &str) -> Result<ProfileSnapshot, AuthError> {
        Ok(ProfileSnapshot::default())
    }

    async fn update_profile(
        &self,
        _role: Role,
        _access_token: &str,
        _changes: &ProfileUpdate,
    ) -> Result<ProfileSnapshot, AuthError> {
        Ok(ProfileSnapshot::default())
    }

    async fn logout(&self, _role: Role, _access_token: &str) -> Result<(), AuthError> {
        Ok(())
    }
}

struct NullScheduler;

impl Scheduler for NullScheduler {
    fn schedule(&self, _delay: Duration, _task: futures::future::BoxFuture<'static, ()>) -> TaskHandle {
        TaskHandle::noop()
    }
}

#[derive(Default)]
struct RecordingNav {
    targets: Mutex<Vec<String>>,
}

impl NavigationSink for RecordingNav {
    fn redirect(&self, target: &str) {
        self.targets.lock().unwrap().push(target.to_owned());
    }
}

// =============================================================================
// HARNESS
// =============================================================================

struct Harness {
    coordinator: RefreshCoordinator,
    auth: Arc<SlowAuth>,
    store: SessionStore,
    persistent: Arc<MemoryStorage>,
    nav: Arc<RecordingNav>,
    bus: EventBus,
}

fn harness() -> Harness {
    let auth = Arc::new(SlowAuth::default());
    let persistent = Arc::new(MemoryStorage::new());
    CredentialStore::new(persistent.clone()).save(
        Role::User,
        &CredentialRecord {
            access_token: "stale".to_owned(),
            refresh_token: Some("refresh-tok".to_owned()),
            expires_at: None,
            profile: ProfileSnapshot { user_id: 3, ..Default::default() },
        },
    );
    let bus = EventBus::new();
    let store = SessionStore::new(
        SessionConfig::default(),
        persistent.clone(),
        Arc::new(MemoryStorage::new()),
        auth.clone(),
        Arc::new(NullScheduler),
        bus.clone(),
    );
    let nav = Arc::new(RecordingNav::default());
    let redirects = RateLimitedRedirects::new(nav.clone(), Duration::from_secs(1));
    let coordinator = RefreshCoordinator::new(store.clone(), redirects);
    Harness { coordinator, auth, store, persistent, nav, bus }
}

fn counting_replay(order: &Arc<Mutex<Vec<usize>>>, id: usize) -> ReplayFn {
    let order = order.clone();
    Box::new(move || {
        async move {
            order.lock().unwrap().push(id);
            Ok(serde_json::json!(id))
        }
        .boxed()
    })
}

// =============================================================================
// SINGLE FLIGHT
// =============================================================================

#[tokio::test(start_paused = true)]
async fn concurrent_recoveries_share_one_refresh() {
    let h = harness();
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for id in 0..5 {
        let coordinator = h.coordinator.clone();
        let replay = counting_replay(&order, id);
        handles.push(tokio::spawn(async move {
            coordinator.recover(Role::User, replay).await
        }));
        // Pin down arrival order.
        tokio::task::yield_now().await;
    }

    for (id, handle) in handles.into_iter().enumerate() {
        let value = handle.await.unwrap().unwrap();
        assert_eq!(value, serde_json::json!(id));
    }
    assert_eq!(h.auth.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(order.lock().unwrap().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn queued_requests_replay_in_arrival_order() {
    let h = harness();
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for id in 0..4 {
        let coordinator = h.coordinator.clone();
        let replay = counting_replay(&order, id);
        handles.push(tokio::spawn(async move {
            coordinator.recover(Role::User, replay).await
        }));
        tokio::task::yield_now().await;
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn refresh_after_completion_starts_a_new_flight() {
    let h = harness();
    let order = Arc::new(Mutex::new(Vec::new()));

    h.coordinator
        .recover(Role::User, counting_replay(&order, 0))
        .await
        .unwrap();
    h.coordinator
        .recover(Role::User, counting_replay(&order, 1))
        .await
        .unwrap();

    assert_eq!(h.auth.refresh_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn successful_recovery_updates_stored_token() {
    let h = harness();
    let order = Arc::new(Mutex::new(Vec::new()));
    h.coordinator
        .recover(Role::User, counting_replay(&order, 0))
        .await
        .unwrap();
    assert_eq!(h.store.token(Role::User).as_deref(), Some("refreshed-1"));
    assert_eq!(h.persistent.get("user_jwt_token"), Some("refreshed-1".to_owned()));
}

// =============================================================================
// FAILURE PATH
// =============================================================================

#[tokio::test(start_paused = true)]
async fn failed_refresh_rejects_every_queued_request() {
    let h = harness();
    h.auth.fail_refresh.store(true, Ordering::SeqCst);
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for id in 0..3 {
        let coordinator = h.coordinator.clone();
        let replay = counting_replay(&order, id);
        handles.push(tokio::spawn(async move {
            coordinator.recover(Role::User, replay).await
        }));
        tokio::task::yield_now().await;
    }
    for handle in handles {
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(ApiError::Refresh(_))));
    }
    // Nothing was replayed.
    assert!(order.lock().unwrap().is_empty());
    assert_eq!(h.auth.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_logs_the_role_out_once() {
    let h = harness();
    h.auth.fail_refresh.store(true, Ordering::SeqCst);
    let mut rx = h.bus.subscribe();
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for id in 0..3 {
        let coordinator = h.coordinator.clone();
        let replay = counting_replay(&order, id);
        handles.push(tokio::spawn(async move {
            coordinator.recover(Role::User, replay).await
        }));
        tokio::task::yield_now().await;
    }
    for handle in handles {
        let _ = handle.await.unwrap();
    }

    assert_eq!(h.store.token(Role::User), None);
    assert_eq!(h.persistent.get("user_jwt_token"), None);
    // Exactly one session-cleared event despite three rejected requests.
    assert!(matches!(
        rx.try_recv().unwrap(),
        SessionEvent::Cleared { role: Role::User }
    ));
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_redirects_to_login_once() {
    let h = harness();
    h.auth.fail_refresh.store(true, Ordering::SeqCst);
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for id in 0..3 {
        let coordinator = h.coordinator.clone();
        let replay = counting_replay(&order, id);
        handles.push(tokio::spawn(async move {
            coordinator.recover(Role::User, replay).await
        }));
        tokio::task::yield_now().await;
    }
    for handle in handles {
        let _ = handle.await.unwrap();
    }

    assert_eq!(*h.nav.targets.lock().unwrap(), vec!["/login".to_owned()]);
}
