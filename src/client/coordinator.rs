use super::classify::{FailurePolicy, classify};
use super::*;
use crate::logger::{debug, info, warn};
use chrono::Utc;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// A credential this close to expiry is refreshed before use.
    pub freshness_buffer: Duration,
    /// Auth failures this soon after a successful refresh end the session.
    pub loop_breaker_window: Duration,
    pub refresh_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            freshness_buffer: Duration::from_secs(5 * 60),
            loop_breaker_window: Duration::from_secs(8),
            refresh_timeout: Duration::from_secs(30),
        }
    }
}

type Waiter = oneshot::Sender<Result<String, RefreshError>>;

#[derive(Default)]
struct SessionState {
    access: Option<String>,
    refresh_in_flight: bool,
    waiters: VecDeque<Waiter>,
    last_refresh_success_at: Option<Instant>,
    /// Set once the forced-logout hook has fired for this session.
    terminated: bool,
}

struct Inner {
    transport: Arc<dyn ApiTransport>,
    storage: Arc<dyn CredentialStorage>,
    logout: Arc<dyn ForcedLogout>,
    config: CoordinatorConfig,
    state: Mutex<SessionState>,
    cancel: CancellationToken,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, outcome: &Result<String, RefreshError>) {
        let waiters = {
            let mut st = self.state();
            st.refresh_in_flight = false;
            if let Ok(token) = outcome {
                st.access = Some(token.clone());
                st.last_refresh_success_at = Some(Instant::now());
                st.terminated = false;
            }
            std::mem::take(&mut st.waiters)
        };

        if let Ok(token) = outcome {
            if let Err(e) = self.storage.store(token) {
                warn!(error = %e, "failed to persist refreshed credential");
            }
        }

        // FIFO release, every waiter sees the same outcome
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Rejects queued waiters if the leading task is dropped mid-refresh.
struct LeaderGuard<'a> {
    inner: &'a Inner,
    settled: bool,
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.inner.settle(&Err(RefreshError::Abandoned));
        }
    }
}

/// Credential holder for one signed-in subject.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<Inner>,
}

impl SessionCoordinator {
    pub fn create(
        transport: Arc<dyn ApiTransport>,
        storage: Arc<dyn CredentialStorage>,
        logout: Arc<dyn ForcedLogout>,
        config: CoordinatorConfig,
    ) -> Self {
        let access = storage.load().unwrap_or_else(|e| {
            warn!(error = %e, "stored credential unreadable, starting signed out");
            None
        });

        SessionCoordinator {
            inner: Arc::new(Inner {
                transport,
                storage,
                logout,
                config,
                state: Mutex::new(SessionState {
                    access,
                    ..Default::default()
                }),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn credential(&self) -> Option<String> {
        self.inner.state().access.clone()
    }

    pub fn set_credential(&self, token: impl Into<String>) {
        let token = token.into();
        if let Err(e) = self.inner.storage.store(&token) {
            warn!(error = %e, "failed to persist credential");
        }
        let mut st = self.inner.state();
        st.access = Some(token);
        st.terminated = false;
    }

    /// Sends `request`, refreshing and replaying it at most once.
    ///
    /// Issuer endpoints are sent as-is. A successful OTP verification
    /// adopts the access credential it returns.
    pub async fn send(&self, request: OutboundRequest) -> Result<InboundResponse, SessionError> {
        if self.inner.cancel.is_cancelled() {
            return Err(SessionError::Disposed);
        }

        if request.is_auth_endpoint() {
            let resp = self.inner.transport.execute(&request, None).await?;
            if request.is_endpoint(VERIFY_OTP_PATH) && resp.is_success() {
                if let Some(token) = resp.access_token() {
                    self.set_credential(token);
                }
            }
            return Ok(resp);
        }

        let mut retried = false;
        loop {
            let bearer = self.fresh_credential().await?;
            let resp = self
                .inner
                .transport
                .execute(&request, bearer.as_deref())
                .await?;

            match classify(&resp, bearer.is_some()) {
                FailurePolicy::PassThrough => return Ok(resp),
                FailurePolicy::HardLogout(reason) => return Err(self.force_logout(reason)),
                FailurePolicy::Unauthenticated => {
                    return Err(self.force_logout(LogoutReason::NoCredential));
                }
                FailurePolicy::RefreshOnce { .. } if retried => {
                    return Err(self.force_logout(LogoutReason::RetryRejected));
                }
                FailurePolicy::RefreshOnce { loop_guarded } => {
                    retried = true;
                    if self.credential_replaced(bearer.as_deref()) {
                        debug!(path = %request.path, "credential replaced meanwhile, replaying");
                        continue;
                    }
                    if loop_guarded && self.within_loop_window() {
                        return Err(self.force_logout(LogoutReason::LoopBreaker));
                    }
                    debug!(path = %request.path, status = resp.status, "refreshing before replay");
                    if let Err(e) = self.refresh_access().await {
                        return Err(self.refresh_failed(e));
                    }
                }
            }
        }
    }

    /// Obtains a new access credential, joining the refresh already in
    /// flight if there is one.
    pub async fn refresh_access(&self) -> Result<String, RefreshError> {
        let queued = {
            let mut st = self.inner.state();
            if self.inner.cancel.is_cancelled() {
                return Err(RefreshError::Disposed);
            }
            if st.refresh_in_flight {
                let (tx, rx) = oneshot::channel();
                st.waiters.push_back(tx);
                Some(rx)
            } else {
                st.refresh_in_flight = true;
                None
            }
        };

        match queued {
            Some(rx) => rx.await.unwrap_or(Err(RefreshError::Abandoned)),
            None => self.lead_refresh().await,
        }
    }

    async fn lead_refresh(&self) -> Result<String, RefreshError> {
        let mut guard = LeaderGuard {
            inner: &self.inner,
            settled: false,
        };

        let outcome = tokio::select! {
            _ = self.inner.cancel.cancelled() => Err(RefreshError::Disposed),
            res = tokio::time::timeout(
                self.inner.config.refresh_timeout,
                self.inner.transport.refresh(),
            ) => res.unwrap_or(Err(RefreshError::TimedOut)),
        };

        match &outcome {
            Ok(_) => info!("access credential refreshed"),
            Err(e) => warn!(error = %e, "access credential refresh failed"),
        }

        guard.settled = true;
        self.inner.settle(&outcome);
        outcome
    }

    /// Revokes the refresh credential server-side and signs out locally.
    ///
    /// The forced-logout hook does not fire.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let res = self
            .inner
            .transport
            .execute(&OutboundRequest::post(LOGOUT_PATH, json!({})), None)
            .await;

        {
            let mut st = self.inner.state();
            st.access = None;
            st.terminated = true;
        }
        if let Err(e) = self.inner.storage.clear() {
            warn!(error = %e, "failed to clear stored credential");
        }

        res.map(|_| ()).map_err(SessionError::from)
    }

    /// Aborts any refresh in flight and rejects its waiters.
    pub fn dispose(&self) {
        self.inner.cancel.cancel();
        let waiters = std::mem::take(&mut self.inner.state().waiters);
        for waiter in waiters {
            let _ = waiter.send(Err(RefreshError::Disposed));
        }
    }

    async fn fresh_credential(&self) -> Result<Option<String>, SessionError> {
        let Some(token) = self.credential() else {
            return Ok(None);
        };
        if !is_stale(&token, self.inner.config.freshness_buffer, Utc::now()) {
            return Ok(Some(token));
        }

        self.refresh_access()
            .await
            .map(Some)
            .map_err(|e| self.refresh_failed(e))
    }

    /// True when a refresh finished after `sent` went out.
    fn credential_replaced(&self, sent: Option<&str>) -> bool {
        self.inner
            .state()
            .access
            .as_deref()
            .is_some_and(|current| sent != Some(current))
    }

    fn within_loop_window(&self) -> bool {
        self.inner
            .state()
            .last_refresh_success_at
            .is_some_and(|at| at.elapsed() < self.inner.config.loop_breaker_window)
    }

    fn refresh_failed(&self, err: RefreshError) -> SessionError {
        match err {
            RefreshError::Disposed => SessionError::Disposed,
            RefreshError::Rejected { .. } => {
                self.force_logout(LogoutReason::RefreshFailed);
                SessionError::Refresh(err)
            }
            other => SessionError::Refresh(other),
        }
    }

    fn force_logout(&self, reason: LogoutReason) -> SessionError {
        let first = {
            let mut st = self.inner.state();
            st.access = None;
            !std::mem::replace(&mut st.terminated, true)
        };
        if let Err(e) = self.inner.storage.clear() {
            warn!(error = %e, "failed to clear stored credential");
        }

        if first {
            warn!(%reason, "forcing logout");
            self.inner.logout.on_forced_logout(reason);
        }
        SessionError::LoggedOut(reason)
    }
}
