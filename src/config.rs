//! Session/gateway configuration loaded from the environment.

use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const DEFAULT_REFRESH_MARGIN_SECS: u64 = 60;
const DEFAULT_REFRESH_MIN_DELAY_SECS: u64 = 5;

const DEFAULT_NOTICE_WINDOW_MS: u64 = 1200;
const DEFAULT_REDIRECT_WINDOW_MS: u64 = 1000;

/// Endpoints callable without a session. No token is attached and an
/// unauthorized response is surfaced instead of triggering a refresh.
const DEFAULT_PUBLIC_PATHS: &[&str] = &["/user/login", "/user/refresh-token", "/user/register"];

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// API origin all request paths are joined onto.
    pub base_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// How long before token expiry the scheduled refresh fires.
    pub refresh_margin: Duration,
    /// Floor for the scheduled refresh delay when a token is already stale.
    pub refresh_min_delay: Duration,
    /// Window in which identical user-facing notices are coalesced.
    pub notice_window: Duration,
    /// Window in which repeated forced redirects are suppressed.
    pub redirect_window: Duration,
    pub public_paths: Vec<String>,
}

impl SessionConfig {
    /// Load from `PAWHAVEN_*` environment variables, falling back to compiled
    /// defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("PAWHAVEN_API_BASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty())
                .map_or_else(|| DEFAULT_BASE_URL.to_owned(), |url| url.trim_end_matches('/').to_owned()),
            request_timeout: Duration::from_secs(env_parse(
                "PAWHAVEN_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            connect_timeout: Duration::from_secs(env_parse(
                "PAWHAVEN_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )),
            refresh_margin: Duration::from_secs(env_parse(
                "PAWHAVEN_REFRESH_MARGIN_SECS",
                DEFAULT_REFRESH_MARGIN_SECS,
            )),
            refresh_min_delay: Duration::from_secs(env_parse(
                "PAWHAVEN_REFRESH_MIN_DELAY_SECS",
                DEFAULT_REFRESH_MIN_DELAY_SECS,
            )),
            notice_window: Duration::from_millis(env_parse(
                "PAWHAVEN_NOTICE_WINDOW_MS",
                DEFAULT_NOTICE_WINDOW_MS,
            )),
            redirect_window: Duration::from_millis(env_parse(
                "PAWHAVEN_REDIRECT_WINDOW_MS",
                DEFAULT_REDIRECT_WINDOW_MS,
            )),
            public_paths: DEFAULT_PUBLIC_PATHS.iter().map(|&p| p.to_owned()).collect(),
        }
    }

    /// Whether a request path (query string ignored) is on the public
    /// allow-list.
    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        let route = path.split('?').next().unwrap_or(path);
        self.public_paths.iter().any(|public| public == route)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            refresh_margin: Duration::from_secs(DEFAULT_REFRESH_MARGIN_SECS),
            refresh_min_delay: Duration::from_secs(DEFAULT_REFRESH_MIN_DELAY_SECS),
            notice_window: Duration::from_millis(DEFAULT_NOTICE_WINDOW_MS),
            redirect_window: Duration::from_millis(DEFAULT_REDIRECT_WINDOW_MS),
            public_paths: DEFAULT_PUBLIC_PATHS.iter().map(|&p| p.to_owned()).collect(),
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
