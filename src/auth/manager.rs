// Allow dead code: session surface is wider than any single consumer
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::error::AuthError;
use super::session::{AuthUser, Session, REFRESH_WINDOW_MS};
use super::store::SessionStore;

/// Monitor cadence: one expiry/refresh check per minute.
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(60);

/// The remote login/refresh endpoints, abstracted behind a trait so the
/// manager can run against a stub in tests.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<AuthUser, AuthError>;
    async fn refresh(&self, token: &str) -> Result<AuthUser, AuthError>;
}

/// Phase of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    LoggedOut,
    Authenticating,
    Authenticated,
    Refreshing,
}

/// Result of `restore_on_startup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Nothing persisted (or the record was unusable); starting logged out.
    NoSession,
    /// A persisted session was still valid and is now current.
    Restored,
    /// The persisted session had already expired; storage was cleared so the
    /// caller can show a session-expired notice.
    Expired,
}

/// What a single monitor tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No session, or plenty of time left.
    Idle,
    /// Session was inside the refresh window and was refreshed.
    Refreshed,
    /// Refresh was attempted and rejected; the session is gone.
    RefreshFailed,
    /// Session had expired; forced logout.
    Expired,
}

struct Inner {
    session: Option<Session>,
    phase: AuthPhase,
    // Bumped on every logout so a refresh that resolves afterwards can tell
    // its session was cleared and must discard the result.
    epoch: u64,
}

/// Owns the current session and every transition on it.
///
/// Collaborators read the session through `current()` and observe
/// authenticated/unauthenticated flips through `subscribe()`; nothing
/// outside this type mutates session state.
pub struct SessionManager {
    api: Arc<dyn AuthApi>,
    store: SessionStore,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
    auth_tx: watch::Sender<bool>,
}

impl SessionManager {
    pub fn new(api: Arc<dyn AuthApi>, store: SessionStore) -> Self {
        Self::with_clock(api, store, Arc::new(SystemClock))
    }

    pub fn with_clock(api: Arc<dyn AuthApi>, store: SessionStore, clock: Arc<dyn Clock>) -> Self {
        let (auth_tx, _) = watch::channel(false);
        Self {
            api,
            store,
            clock,
            inner: Mutex::new(Inner {
                session: None,
                phase: AuthPhase::LoggedOut,
                epoch: 0,
            }),
            auth_tx,
        }
    }

    /// Authenticate against the remote endpoint and install the resulting
    /// session. A failed login leaves any prior session untouched.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let prior = {
            let mut inner = self.inner.lock().unwrap();
            let prior = inner.phase;
            inner.phase = AuthPhase::Authenticating;
            prior
        };

        let user = match self.api.login(username, password).await {
            Ok(user) => user,
            Err(e) => {
                let mut inner = self.inner.lock().unwrap();
                inner.phase = if inner.session.is_some() {
                    prior
                } else {
                    AuthPhase::LoggedOut
                };
                return Err(e);
            }
        };

        let session = Session::issue(user, self.clock.now_ms());
        if let Err(e) = self.store.save(&session) {
            let mut inner = self.inner.lock().unwrap();
            inner.phase = if inner.session.is_some() {
                prior
            } else {
                AuthPhase::LoggedOut
            };
            return Err(AuthError::Storage(e));
        }
        {
            let mut inner = self.inner.lock().unwrap();
            inner.session = Some(session.clone());
            inner.phase = AuthPhase::Authenticated;
        }
        self.auth_tx.send_replace(true);
        info!(username = %session.principal.username, "login succeeded");
        Ok(session)
    }

    /// Clear the session from memory and storage. Idempotent; a storage
    /// failure is logged, never surfaced.
    pub fn logout(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.session = None;
            inner.phase = AuthPhase::LoggedOut;
            inner.epoch += 1;
        }
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear persisted session");
        }
        self.auth_tx.send_replace(false);
        info!("logged out");
    }

    /// Restore the persisted session, if any. Run once at process start.
    pub fn restore_on_startup(&self) -> RestoreOutcome {
        let loaded = match self.store.load() {
            Ok(loaded) => loaded,
            Err(e) => {
                // Unreadable or partial records are treated as absent
                warn!(error = %e, "persisted session unusable, discarding");
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "failed to clear unusable session record");
                }
                self.auth_tx.send_replace(false);
                return RestoreOutcome::NoSession;
            }
        };

        let Some(session) = loaded else {
            self.auth_tx.send_replace(false);
            return RestoreOutcome::NoSession;
        };

        if session.is_expired_at(self.clock.now_ms()) {
            info!("persisted session has expired, clearing");
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "failed to clear expired session record");
            }
            self.auth_tx.send_replace(false);
            return RestoreOutcome::Expired;
        }

        debug!(username = %session.principal.username, "session restored from storage");
        {
            let mut inner = self.inner.lock().unwrap();
            inner.session = Some(session);
            inner.phase = AuthPhase::Authenticated;
        }
        self.auth_tx.send_replace(true);
        RestoreOutcome::Restored
    }

    /// Exchange the current token for a fresh one.
    ///
    /// Only one refresh runs at a time: a trigger while one is in flight is
    /// coalesced into it. A refresh that resolves after logout is discarded.
    /// A rejected refresh tears the session down.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let (token, epoch) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.phase == AuthPhase::Refreshing {
                debug!("refresh already in flight, coalescing");
                return Ok(());
            }
            let Some(session) = inner.session.as_ref() else {
                return Err(AuthError::NotAuthenticated);
            };
            let token = session.token.clone();
            inner.phase = AuthPhase::Refreshing;
            (token, inner.epoch)
        };

        let result = self.api.refresh(&token).await;

        let mut inner = self.inner.lock().unwrap();
        if inner.epoch != epoch {
            // Logged out while the call was in flight; do not resurrect
            debug!("discarding refresh result for a cleared session");
            return Ok(());
        }

        match result {
            Ok(user) => {
                let session = Session::issue(user, self.clock.now_ms());
                if let Err(e) = self.store.save(&session) {
                    // Keep the old session live rather than get stuck Refreshing
                    inner.phase = AuthPhase::Authenticated;
                    return Err(AuthError::Storage(e));
                }
                inner.session = Some(session);
                inner.phase = AuthPhase::Authenticated;
                drop(inner);
                self.auth_tx.send_replace(true);
                debug!("session refreshed");
                Ok(())
            }
            Err(e) => {
                inner.session = None;
                inner.phase = AuthPhase::LoggedOut;
                inner.epoch += 1;
                drop(inner);
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "failed to clear session after refresh failure");
                }
                self.auth_tx.send_replace(false);
                warn!(error = %e, "session refresh rejected, logging out");
                Err(match e {
                    AuthError::RefreshFailed(_) => e,
                    other => AuthError::RefreshFailed(other.to_string()),
                })
            }
        }
    }

    /// One monitor pass: log out on expiry, refresh inside the window,
    /// otherwise do nothing.
    pub async fn tick(&self) -> TickOutcome {
        let remaining = {
            let inner = self.inner.lock().unwrap();
            match inner.session.as_ref() {
                Some(session) => session.remaining_at(self.clock.now_ms()),
                None => return TickOutcome::Idle,
            }
        };

        if remaining <= 0 {
            info!("session expired, logging out");
            self.logout();
            TickOutcome::Expired
        } else if remaining <= REFRESH_WINDOW_MS {
            match self.refresh().await {
                Ok(()) => TickOutcome::Refreshed,
                Err(_) => TickOutcome::RefreshFailed,
            }
        } else {
            TickOutcome::Idle
        }
    }

    /// Spawn the periodic monitor. The returned handle cancels the task on
    /// drop, so the timer never outlives its owner.
    pub fn spawn_monitor(self: &Arc<Self>) -> MonitorHandle {
        let manager = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(MONITOR_INTERVAL);
            // interval fires immediately; consume that so the first real
            // check happens one full period after startup
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let outcome = manager.tick().await;
                debug!(?outcome, "monitor tick");
            }
        });
        MonitorHandle { task }
    }

    /// Snapshot of the current session, if any.
    pub fn current(&self) -> Option<Session> {
        self.inner.lock().unwrap().session.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.lock().unwrap().session.is_some()
    }

    pub fn phase(&self) -> AuthPhase {
        self.inner.lock().unwrap().phase
    }

    /// Observe authenticated/unauthenticated flips.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.auth_tx.subscribe()
    }
}

/// Cancellation handle for the monitor task.
pub struct MonitorHandle {
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::auth::clock::testing::FixedClock;
    use crate::auth::session::SESSION_TTL_MS;
    use crate::auth::store::{KeyValueStorage, MemoryStorage};

    struct MockApi {
        login_ok: bool,
        refresh_ok: bool,
        refresh_delay_ms: u64,
        login_calls: AtomicUsize,
        refresh_calls: AtomicUsize,
    }

    impl MockApi {
        fn ok() -> Self {
            Self {
                login_ok: true,
                refresh_ok: true,
                refresh_delay_ms: 0,
                login_calls: AtomicUsize::new(0),
                refresh_calls: AtomicUsize::new(0),
            }
        }

        fn user(token: &str) -> AuthUser {
            AuthUser {
                id: 1,
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                image: String::new(),
                token: token.to_string(),
            }
        }
    }

    #[async_trait]
    impl AuthApi for MockApi {
        async fn login(&self, _username: &str, _password: &str) -> Result<AuthUser, AuthError> {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            if self.login_ok {
                Ok(Self::user("T1"))
            } else {
                Err(AuthError::InvalidCredentials)
            }
        }

        async fn refresh(&self, _token: &str) -> Result<AuthUser, AuthError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if self.refresh_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.refresh_delay_ms)).await;
            }
            if self.refresh_ok {
                Ok(Self::user("T2"))
            } else {
                Err(AuthError::RefreshFailed("refresh endpoint returned 401".to_string()))
            }
        }
    }

    struct Harness {
        api: Arc<MockApi>,
        storage: MemoryStorage,
        clock: Arc<FixedClock>,
        manager: Arc<SessionManager>,
    }

    fn harness(api: MockApi, now_ms: i64) -> Harness {
        let api = Arc::new(api);
        let storage = MemoryStorage::new();
        let clock = Arc::new(FixedClock::at(now_ms));
        let manager = Arc::new(SessionManager::with_clock(
            api.clone(),
            SessionStore::new(Box::new(storage.clone())),
            clock.clone(),
        ));
        Harness {
            api,
            storage,
            clock,
            manager,
        }
    }

    fn seeded_store(storage: &MemoryStorage) -> SessionStore {
        SessionStore::new(Box::new(storage.clone()))
    }

    #[tokio::test]
    async fn test_login_sets_four_hour_expiry() {
        let h = harness(MockApi::ok(), 1000);
        let session = h.manager.login("alice", "hunter2").await.expect("login");

        assert_eq!(session.expires_at, 1000 + 14_400_000);
        assert_eq!(session.token, "T1");
        assert!(h.manager.is_authenticated());
        assert_eq!(h.manager.phase(), AuthPhase::Authenticated);

        // persisted synchronously
        let persisted = seeded_store(&h.storage).load().expect("load").expect("some");
        assert_eq!(persisted, session);
    }

    #[tokio::test]
    async fn test_login_failure_surfaces_invalid_credentials() {
        let h = harness(MockApi { login_ok: false, ..MockApi::ok() }, 1000);
        let err = h.manager.login("alice", "wrong").await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(!h.manager.is_authenticated());
        assert_eq!(h.manager.phase(), AuthPhase::LoggedOut);
        assert!(seeded_store(&h.storage).load().expect("load").is_none());
    }

    #[tokio::test]
    async fn test_login_failure_leaves_prior_session_untouched() {
        // Manager with a failing login endpoint, seeded with a restored session
        let h = harness(MockApi { login_ok: false, ..MockApi::ok() }, 1000);
        let prior = Session::issue(MockApi::user("T1"), 1000);
        seeded_store(&h.storage).save(&prior).expect("seed");
        assert_eq!(h.manager.restore_on_startup(), RestoreOutcome::Restored);

        let err = h.manager.login("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        // Prior session survives the failed login
        assert!(h.manager.is_authenticated());
        assert_eq!(h.manager.current().expect("session").token, "T1");
        assert_eq!(h.manager.phase(), AuthPhase::Authenticated);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let h = harness(MockApi::ok(), 1000);
        h.manager.login("alice", "hunter2").await.expect("login");

        h.manager.logout();
        assert!(!h.manager.is_authenticated());
        assert!(seeded_store(&h.storage).load().expect("load").is_none());

        // Second logout: same observable state, no panic
        h.manager.logout();
        assert!(!h.manager.is_authenticated());
        assert_eq!(h.manager.phase(), AuthPhase::LoggedOut);
    }

    #[tokio::test]
    async fn test_restore_with_nothing_persisted() {
        let h = harness(MockApi::ok(), 1000);
        assert_eq!(h.manager.restore_on_startup(), RestoreOutcome::NoSession);
        assert!(!h.manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_valid_session() {
        let h = harness(MockApi::ok(), 1000);
        let session = Session::issue(MockApi::user("persisted-token"), 1000);
        seeded_store(&h.storage).save(&session).expect("seed");

        assert_eq!(h.manager.restore_on_startup(), RestoreOutcome::Restored);
        let current = h.manager.current().expect("session");
        assert_eq!(current.token, "persisted-token");
        assert_eq!(current.principal, session.principal);
    }

    #[tokio::test]
    async fn test_restore_expired_session_clears_storage() {
        // Persisted expiry 500, now 1000
        let h = harness(MockApi::ok(), 1000);
        let mut session = Session::issue(MockApi::user("old"), 0);
        session.expires_at = 500;
        seeded_store(&h.storage).save(&session).expect("seed");

        assert_eq!(h.manager.restore_on_startup(), RestoreOutcome::Expired);
        assert!(!h.manager.is_authenticated());
        assert!(seeded_store(&h.storage).load().expect("load").is_none());
    }

    #[tokio::test]
    async fn test_restore_corrupted_record_treated_as_absent() {
        let h = harness(MockApi::ok(), 1000);
        h.storage.set("session", "{definitely not json").expect("set");
        h.storage.set("expires_at", "123").expect("set");

        assert_eq!(h.manager.restore_on_startup(), RestoreOutcome::NoSession);
        assert!(!h.manager.is_authenticated());
        // Garbage was cleared, not left to fail again next start
        assert!(h.storage.get("session").expect("get").is_none());
    }

    #[tokio::test]
    async fn test_tick_idle_when_plenty_of_time_left() {
        let h = harness(MockApi::ok(), 1000);
        h.manager.login("alice", "hunter2").await.expect("login");

        assert_eq!(h.manager.tick().await, TickOutcome::Idle);
        assert_eq!(h.api.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_tick_logs_out_on_expiry() {
        let h = harness(MockApi::ok(), 1000);
        h.manager.login("alice", "hunter2").await.expect("login");

        h.clock.set(1000 + SESSION_TTL_MS);
        assert_eq!(h.manager.tick().await, TickOutcome::Expired);
        assert!(!h.manager.is_authenticated());
        assert!(seeded_store(&h.storage).load().expect("load").is_none());
    }

    #[tokio::test]
    async fn test_tick_refreshes_inside_window() {
        let h = harness(MockApi::ok(), 1000);
        h.manager.login("alice", "hunter2").await.expect("login");

        // Two minutes before expiry
        let now = 1000 + SESSION_TTL_MS - 120_000;
        h.clock.set(now);
        assert_eq!(h.manager.tick().await, TickOutcome::Refreshed);
        assert_eq!(h.api.refresh_calls.load(Ordering::SeqCst), 1);

        let session = h.manager.current().expect("session");
        assert_eq!(session.token, "T2");
        assert_eq!(session.expires_at, now + SESSION_TTL_MS);
    }

    #[tokio::test]
    async fn test_refresh_requires_a_session() {
        let h = harness(MockApi::ok(), 1000);
        let err = h.manager.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_refresh_failure_tears_down_session() {
        let h = harness(MockApi { refresh_ok: false, ..MockApi::ok() }, 1000);
        h.manager.login("alice", "hunter2").await.expect("login");

        let err = h.manager.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed(_)));
        assert!(!h.manager.is_authenticated());
        assert_eq!(h.manager.phase(), AuthPhase::LoggedOut);
        assert!(seeded_store(&h.storage).load().expect("load").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_refresh_is_coalesced() {
        let h = harness(MockApi { refresh_delay_ms: 100, ..MockApi::ok() }, 1000);
        h.manager.login("alice", "hunter2").await.expect("login");

        let manager = h.manager.clone();
        let first = tokio::spawn(async move { manager.refresh().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Second trigger while the first is still in flight
        h.manager.refresh().await.expect("coalesced refresh");
        assert_eq!(h.api.refresh_calls.load(Ordering::SeqCst), 1);

        first.await.expect("join").expect("refresh");
        assert_eq!(h.api.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.manager.current().expect("session").token, "T2");
    }

    #[tokio::test]
    async fn test_logout_discards_inflight_refresh() {
        let h = harness(MockApi { refresh_delay_ms: 100, ..MockApi::ok() }, 1000);
        h.manager.login("alice", "hunter2").await.expect("login");

        let manager = h.manager.clone();
        let inflight = tokio::spawn(async move { manager.refresh().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        h.manager.logout();
        inflight.await.expect("join").expect("discarded refresh");

        // The late-arriving token must not resurrect the session
        assert!(!h.manager.is_authenticated());
        assert!(seeded_store(&h.storage).load().expect("load").is_none());
    }

    #[tokio::test]
    async fn test_watch_notifications() {
        let h = harness(MockApi::ok(), 1000);
        let mut rx = h.manager.subscribe();
        assert!(!*rx.borrow_and_update());

        h.manager.login("alice", "hunter2").await.expect("login");
        assert!(*rx.borrow_and_update());

        h.manager.logout();
        assert!(!*rx.borrow_and_update());
    }

    #[tokio::test]
    async fn test_monitor_handle_aborts_task() {
        let h = harness(MockApi::ok(), 1000);
        let handle = h.manager.spawn_monitor();
        handle.shutdown();
        // Dropping is also a clean teardown
        drop(handle);
    }
}
