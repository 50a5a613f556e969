//! Session, auth, and API gateway core for the PawHaven pet-adoption web
//! client.
//!
//! ARCHITECTURE
//! ============
//! A browser profile can hold two independent sessions at once — an adopter
//! ([`Role::User`]) and a shelter administrator ([`Role::Admin`]) — while
//! each tab acts as exactly one of them. This crate owns that lifecycle:
//!
//! - [`SessionStore`]: per-role tokens and profiles, hydrated from storage,
//!   written through on every mutation, refreshed proactively on a timer.
//! - [`Gateway`]: the single outgoing-request pipeline attaching bearer
//!   tokens and the role header, classifying responses, and recovering
//!   unauthorized calls through the single-flight refresh coordinator.
//! - [`RouteGuard`]: the per-navigation access decision (proceed or
//!   redirect).
//!
//! Hosts supply the two storages ([`KeyValueStorage`]), the UI sinks
//! ([`NoticeSink`], [`NavigationSink`]), and an event bus ([`EventBus`]) at
//! construction; nothing here reaches for globals or the DOM.

pub mod config;
pub mod guard;
pub mod net;
pub mod notify;
pub mod role;
pub mod sched;
pub mod session;
pub mod storage;

pub use config::SessionConfig;
pub use guard::{GuardDecision, RedirectReason, RouteGuard};
pub use net::error::{ApiError, TransportError};
pub use net::gateway::{Gateway, RequestOptions};
pub use net::refresh::RefreshCoordinator;
pub use notify::{NavigationSink, NoticeSink};
pub use role::{Role, role_for_path};
pub use sched::{Scheduler, TaskHandle, TokioScheduler};
pub use session::api::{AuthApi, AuthError, HttpAuthApi, RefreshFailure};
pub use session::events::{EventBus, RefreshSource, SessionEvent};
pub use session::store::SessionStore;
pub use session::types::{CredentialRecord, LoginCredentials, ProfileSnapshot, ProfileUpdate};
pub use storage::{KeyValueStorage, MemoryStorage};
