//! Typed in-process session event bus.
//!
//! Independently-mounted UI islands (header badge, account menu, admin
//! shell) stay in sync by subscribing here instead of holding references to
//! each other. The bus is passed in at construction — there is no global.

use tokio::sync::broadcast;

use crate::role::Role;

const BUS_CAPACITY: usize = 32;

/// What caused a token refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshSource {
    /// Fresh tokens from an interactive login.
    Login,
    /// The proactive pre-expiry timer fired.
    Scheduler,
    /// The gateway recovered from an unauthorized response.
    Gateway,
}

/// Cross-component session notifications.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A role's session was cleared (logout or refresh failure).
    Cleared { role: Role },
    /// A role acquired a fresh access token.
    Refreshed {
        role: Role,
        access_token: String,
        source: RefreshSource,
    },
}

/// Broadcast fan-out of [`SessionEvent`]s. Cloning shares the channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit to all current subscribers. Emitting with no subscribers is fine.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
