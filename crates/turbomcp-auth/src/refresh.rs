//! JWK Set refresh with Cache-Control driven rescheduling
//!
//! The coordinator owns the active [`KeyStore`]. A refresh fetches the JWK Set,
//! builds a complete new store and swaps it in atomically, so readers see
//! either the old store or the new one and never a mix.
//!
//! Scheduling rules:
//!
//! - every refresh, manual or timer-driven, first cancels the pending timer
//! - a successful response whose `Cache-Control` carries `max-age=N` arms the
//!   timer for `N` seconds
//! - a response without a usable `max-age`, and any failed refresh, re-arm the
//!   timer with the previous delay if there was one
//! - timer-driven failures leave the current store in place and are reported
//!   to the [`DiagnosticSink`]

use std::sync::{Arc, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use turbomcp_jose::{JwkSet, KeyStore};

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::{AuthError, Result};
use crate::fetch::{Fetch, FetchRequest, remote_error};

/// `Accept` header sent to the JWK Set endpoint
pub const JWK_SET_ACCEPT: &str = "application/json, application/jwk-set+json";

/// Result of a successful refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Keys in the new store
    pub keys: usize,
    /// Entries left out of the new store
    pub skipped: usize,
    /// Delay until the next automatic refresh, if one is scheduled
    pub next_refresh: Option<Duration>,
}

#[derive(Debug, Default)]
struct Schedule {
    pending: Option<CancellationToken>,
    delay: Option<Duration>,
}

struct Inner {
    store: ArcSwap<KeyStore>,
    fetch: Arc<dyn Fetch>,
    diagnostics: Arc<dyn DiagnosticSink>,
    jwk_path: String,
    leeway: u64,
    schedule: Mutex<Schedule>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(pending) = self.schedule.get_mut().pending.take() {
            pending.cancel();
        }
    }
}

/// Owner of the active key store and its refresh timer
///
/// Cloning is cheap; clones share the store and the schedule.
#[derive(Clone)]
pub struct KeyRefreshCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for KeyRefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRefreshCoordinator")
            .field("jwk_path", &self.inner.jwk_path)
            .field("keys", &self.inner.store.load().len())
            .field("schedule", &*self.inner.schedule.lock())
            .finish()
    }
}

struct FetchedKeySet {
    set: JwkSet,
    max_age: Option<Duration>,
}

impl KeyRefreshCoordinator {
    /// Coordinator serving `initial` until the first refresh
    pub fn new(
        fetch: Arc<dyn Fetch>,
        jwk_path: impl Into<String>,
        initial: KeyStore,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let leeway = initial.leeway();
        Self {
            inner: Arc::new(Inner {
                store: ArcSwap::from_pointee(initial),
                fetch,
                diagnostics,
                jwk_path: jwk_path.into(),
                leeway,
                schedule: Mutex::new(Schedule::default()),
            }),
        }
    }

    /// Snapshot of the active store
    pub fn store(&self) -> Arc<KeyStore> {
        self.inner.store.load_full()
    }

    /// Whether the active store holds no keys
    pub fn is_unsecure(&self) -> bool {
        self.inner.store.load().is_unsecure()
    }

    /// Replace the active store without fetching
    pub fn replace_store(&self, store: KeyStore) {
        self.inner.store.store(Arc::new(store));
    }

    /// Delay of the armed refresh timer, if any
    pub fn next_refresh(&self) -> Option<Duration> {
        let schedule = self.inner.schedule.lock();
        schedule.pending.as_ref().and(schedule.delay)
    }

    /// Stop automatic refreshes
    ///
    /// The remembered delay is kept, so a later successful refresh without a
    /// `max-age` re-arms the timer with it.
    pub fn cancel_pending(&self) {
        if let Some(pending) = self.inner.schedule.lock().pending.take() {
            debug!("Cancelled pending JWK Set refresh");
            pending.cancel();
        }
    }

    /// Fetch the JWK Set and swap in a new store
    ///
    /// Entries that cannot be turned into keys are skipped and reported to
    /// the diagnostic sink; the rest of the set is still installed.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Fetch`] if the request could not be made
    /// - [`AuthError::Remote`] for a failure status or an `error` member
    /// - [`AuthError::EmptyResponse`] if the body is empty
    /// - [`AuthError::UnacceptableContentType`] for anything but JSON / JWK Set JSON
    /// - [`AuthError::InvalidResponse`] if the body is not a JWK Set
    ///
    /// On error the active store is left unchanged.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        self.cancel_pending();
        let previous = self.inner.schedule.lock().delay;

        let fetched = match self.fetch_key_set().await {
            Ok(fetched) => fetched,
            Err(err) => {
                if let Some(delay) = previous {
                    self.arm(delay);
                }
                return Err(err);
            }
        };

        let (store, skipped) = KeyStore::from_jwk_set(&fetched.set);
        let store = store.with_leeway(self.inner.leeway);
        for entry in &skipped {
            self.inner.diagnostics.report(Diagnostic::SkippedKey {
                index: entry.index,
                kid: entry.kid.clone(),
                reason: entry.error.to_string(),
            });
        }

        let keys = store.len();
        self.inner.store.store(Arc::new(store));

        let next = fetched.max_age.or(previous);
        if let Some(delay) = next {
            self.arm(delay);
        }
        info!(keys, skipped = skipped.len(), next_refresh = ?next, "JWK Set loaded");

        Ok(RefreshOutcome {
            keys,
            skipped: skipped.len(),
            next_refresh: next,
        })
    }

    async fn fetch_key_set(&self) -> Result<FetchedKeySet> {
        let request =
            FetchRequest::get(self.inner.jwk_path.clone()).header("Accept", JWK_SET_ACCEPT);
        let response = self.inner.fetch.fetch(request).await?.error_for_status()?;

        if response.body.is_empty() {
            return Err(AuthError::EmptyResponse);
        }
        if !(response.is_content_type("application/json")
            || response.is_content_type("application/jwk-set+json"))
        {
            return Err(AuthError::UnacceptableContentType(
                response.content_type().unwrap_or_default().to_string(),
            ));
        }

        let json: Value = serde_json::from_slice(&response.body)
            .map_err(|e| AuthError::InvalidResponse(format!("JWK Set is not JSON: {e}")))?;
        if let Some(message) = remote_error(&json) {
            return Err(AuthError::Remote(message));
        }
        let set: JwkSet = serde_json::from_value(json)
            .map_err(|e| AuthError::InvalidResponse(format!("not a JWK Set: {e}")))?;

        Ok(FetchedKeySet {
            set,
            max_age: cache_max_age(response.headers("cache-control")),
        })
    }

    fn arm(&self, delay: Duration) {
        let token = CancellationToken::new();
        {
            let mut schedule = self.inner.schedule.lock();
            if let Some(previous) = schedule.pending.replace(token.clone()) {
                previous.cancel();
            }
            schedule.delay = Some(delay);
        }
        debug!(delay_secs = delay.as_secs(), "Scheduled JWK Set refresh");

        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(run_timer(inner, token, delay));
    }
}

async fn run_timer(inner: Weak<Inner>, token: CancellationToken, delay: Duration) {
    tokio::select! {
        () = token.cancelled() => {}
        () = tokio::time::sleep(delay) => {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let coordinator = KeyRefreshCoordinator { inner };
            debug!("Refreshing JWK Set on timer");
            if let Err(err) = coordinator.refresh().await {
                coordinator
                    .inner
                    .diagnostics
                    .report(Diagnostic::RefreshFailed { reason: err.to_string() });
            }
        }
    }
}

/// First usable `max-age` among `Cache-Control` values
///
/// Values of eight characters or fewer cannot hold a `max-age` directive and
/// are ignored.
pub fn cache_max_age<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<Duration> {
    values
        .into_iter()
        .filter(|value| value.len() > 8)
        .find_map(parse_max_age)
        .map(Duration::from_secs)
}

/// `max-age` seconds from one `Cache-Control` value; the value may be quoted
///
/// `max-age=0` is not a usable refresh delay and yields `None`, so the
/// previous schedule stays in place instead of refetching immediately.
pub fn parse_max_age(value: &str) -> Option<u64> {
    value.split(',').find_map(|directive| {
        let (name, seconds) = directive.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("max-age") {
            return None;
        }
        seconds
            .trim()
            .trim_matches('"')
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
    })
}
