//! Session store
//!
//! Holds one authenticated client context per user key. A context bundles a
//! reqwest client with its own cookie jar and browser-like default headers;
//! the portals track authentication purely through cookies, so the jar *is*
//! the session. Expiry is a side effect of access: a key whose context has
//! been idle past the timeout is destroyed on the next lookup. A
//! `clear_expired` sweep exists for housekeeping but nothing schedules it.
//!
//! Concurrent use of different user keys is fully independent. Callers must
//! serialize authentication flows for a single key; the jar itself is
//! thread-safe but two interleaved handshakes would race on its contents.

use std::sync::Arc;
use std::time::Duration;

use campline_domain::constants::SESSION_TIMEOUT;
use campline_domain::{Result, SessionReport, SessionStatus};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;

use crate::http::HttpClient;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";
const ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8,en-GB;q=0.7,en-US;q=0.6";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One authenticated client context: cookie jar, default headers and the
/// HTTP client built around them. Redirects are always surfaced to callers.
pub struct SessionContext {
    http: HttpClient,
    jar: Arc<Jar>,
    created_at: DateTime<Utc>,
    last_used: Mutex<DateTime<Utc>>,
    status: Mutex<SessionStatus>,
}

impl SessionContext {
    /// Standalone context outside the keyed store, for flows that
    /// authenticate per call instead of per user.
    pub(crate) fn ephemeral() -> Result<Self> {
        Self::new()
    }

    fn new() -> Result<Self> {
        let jar = Arc::new(Jar::default());

        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static(ACCEPT));
        headers.insert("Accept-Language", HeaderValue::from_static(ACCEPT_LANGUAGE));
        headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));

        let http = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .max_attempts(2)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_jar(jar.clone())
            .no_redirects()
            .build()?;

        let now = Utc::now();
        Ok(Self {
            http,
            jar,
            created_at: now,
            last_used: Mutex::new(now),
            status: Mutex::new(SessionStatus::Active),
        })
    }

    pub fn client(&self) -> &HttpClient {
        &self.http
    }

    pub fn jar(&self) -> &Arc<Jar> {
        &self.jar
    }

    /// Cookies visible to `url`, deduplicated by keeping the first
    /// occurrence of each name. The SSO flow can leave duplicate names in
    /// the jar; first-wins matches what the portals themselves see.
    pub fn cookies_for(&self, url: &Url) -> Vec<(String, String)> {
        let Some(header) = self.jar.cookies(url) else {
            return Vec::new();
        };
        let Ok(raw) = header.to_str() else {
            return Vec::new();
        };

        let mut seen = Vec::new();
        let mut cookies = Vec::new();
        for pair in raw.split("; ") {
            if let Some((name, value)) = pair.split_once('=') {
                if seen.contains(&name.to_string()) {
                    continue;
                }
                seen.push(name.to_string());
                cookies.push((name.to_string(), value.to_string()));
            }
        }
        cookies
    }

    pub fn mark_invalid(&self) {
        *self.status.lock() = SessionStatus::Invalid;
    }

    fn touch(&self) {
        *self.last_used.lock() = Utc::now();
    }

    fn idle_longer_than(&self, timeout: Duration) -> bool {
        let last_used = *self.last_used.lock();
        Utc::now()
            .signed_duration_since(last_used)
            .to_std()
            .map(|idle| idle > timeout)
            .unwrap_or(false)
    }
}

/// Session store keyed by deterministic user key.
pub struct SessionStore {
    sessions: DashMap<String, Arc<SessionContext>>,
    timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_timeout(SESSION_TIMEOUT)
    }

    /// Custom idle timeout, mainly for tests.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { sessions: DashMap::new(), timeout }
    }

    /// Deterministic key binding a local account to an external one.
    pub fn user_key(local_id: &str, external_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(local_id.as_bytes());
        hasher.update(b":");
        hasher.update(external_id.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Install a fresh context for the identity pair, replacing any previous
    /// one for the same key.
    pub fn create_session(&self, local_id: &str, external_id: &str) -> Result<String> {
        let key = Self::user_key(local_id, external_id);
        let context = Arc::new(SessionContext::new()?);
        self.sessions.insert(key.clone(), context);
        debug!(user_key = %key, "created portal session");
        Ok(key)
    }

    /// Fetch a live context, refreshing its last-used stamp. An idle-expired
    /// context is destroyed here and `None` returned.
    pub fn get_session(&self, user_key: &str) -> Option<Arc<SessionContext>> {
        let expired = {
            let entry = self.sessions.get(user_key)?;
            entry.idle_longer_than(self.timeout)
        };

        if expired {
            debug!(user_key, "session expired on access");
            self.sessions.remove(user_key);
            return None;
        }

        let entry = self.sessions.get(user_key)?;
        entry.touch();
        Some(entry.clone())
    }

    /// Remove a context. Returns whether one existed.
    pub fn destroy_session(&self, user_key: &str) -> bool {
        self.sessions.remove(user_key).is_some()
    }

    /// Housekeeping sweep; expiry-on-access makes this optional.
    pub fn clear_expired(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, context| !context.idle_longer_than(self.timeout));
        before - self.sessions.len()
    }

    /// Status snapshot without refreshing the last-used stamp.
    pub fn session_report(&self, user_key: &str) -> SessionReport {
        let Some(entry) = self.sessions.get(user_key) else {
            return SessionReport::absent();
        };

        let status = if entry.idle_longer_than(self.timeout) {
            SessionStatus::Expired
        } else {
            *entry.status.lock()
        };

        let last_used = *entry.last_used.lock();
        SessionReport {
            exists: true,
            status: Some(status),
            created_at: Some(entry.created_at),
            last_used: Some(last_used),
        }
    }

    /// Conservative server-side validity probe: a no-redirect GET against
    /// `probe_url`. Only a redirect pointing at the SSO host means the
    /// session was invalidated remotely; every other outcome, transport
    /// failures included, counts as healthy.
    pub async fn check_health(&self, user_key: &str, probe_url: &str, sso_host: &str) -> bool {
        let Some(context) = self.get_session(user_key) else {
            return false;
        };

        let response = match context.client().send(context.client().get(probe_url)).await {
            Ok(response) => response,
            Err(err) => {
                debug!(user_key, %err, "health probe transport failure, assuming healthy");
                return true;
            }
        };

        if response.status().is_redirection() {
            let location = response
                .headers()
                .get("Location")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if location.contains(sso_host) {
                warn!(user_key, location, "session invalidated server-side");
                context.mark_invalid();
                return false;
            }
        }

        true
    }
}
