//! UI-facing sinks: user notices and forced navigation.
//!
//! DESIGN
//! ======
//! The session core never touches the DOM or a router directly. Hosts hand in
//! a [`NoticeSink`] (toast line, status bar) and a [`NavigationSink`] (SPA
//! router push) at construction. Two small suppression layers sit in front of
//! them: identical notices inside a short window collapse to one, and forced
//! redirects inside a short window collapse to one, so a burst of failing
//! concurrent requests cannot flood the UI or storm the router.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Receives transient user-visible error notices.
pub trait NoticeSink: Send + Sync {
    fn notify(&self, message: &str);
}

/// Receives forced navigations (redirect to login, forbidden page, landing).
pub trait NavigationSink: Send + Sync {
    fn redirect(&self, target: &str);
}

// =============================================================================
// NOTICE COALESCING
// =============================================================================

/// Forwards notices to a [`NoticeSink`], dropping duplicates of a message
/// seen within the configured window.
#[derive(Clone)]
pub struct CoalescingNotices {
    sink: Arc<dyn NoticeSink>,
    window: Duration,
    recent: Arc<Mutex<HashMap<String, Instant>>>,
}

impl CoalescingNotices {
    #[must_use]
    pub fn new(sink: Arc<dyn NoticeSink>, window: Duration) -> Self {
        Self { sink, window, recent: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn publish(&self, message: &str) {
        self.publish_at(message, Instant::now());
    }

    /// Internal: publish with explicit timestamp (for testing).
    fn publish_at(&self, message: &str, now: Instant) {
        let emit = {
            let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
            recent.retain(|_, seen| now.duration_since(*seen) <= self.window);
            match recent.get(message) {
                Some(_) => false,
                None => {
                    recent.insert(message.to_owned(), now);
                    true
                }
            }
        };
        if emit {
            self.sink.notify(message);
        }
    }
}

// =============================================================================
// REDIRECT RATE LIMITING
// =============================================================================

/// Forwards redirects to a [`NavigationSink`], suppressing any redirect that
/// arrives within the window after the previous one. Many concurrent requests
/// rejected by one refresh failure all try to send the user to login; only
/// the first navigation goes through.
#[derive(Clone)]
pub struct RateLimitedRedirects {
    sink: Arc<dyn NavigationSink>,
    window: Duration,
    last: Arc<Mutex<Option<Instant>>>,
}

impl RateLimitedRedirects {
    #[must_use]
    pub fn new(sink: Arc<dyn NavigationSink>, window: Duration) -> Self {
        Self { sink, window, last: Arc::new(Mutex::new(None)) }
    }

    pub fn redirect(&self, target: &str) {
        self.redirect_at(target, Instant::now());
    }

    fn redirect_at(&self, target: &str, now: Instant) {
        let emit = {
            let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
            match *last {
                Some(prev) if now.duration_since(prev) < self.window => false,
                _ => {
                    *last = Some(now);
                    true
                }
            }
        };
        if emit {
            self.sink.redirect(target);
        } else {
            tracing::debug!(destination = target, "redirect suppressed");
        }
    }
}

#[cfg(test)]
#[path = "notify_test.rs"]
mod tests;
