use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, RequestError};
use crate::models::{AuthCheck, Identity, LoginRequest, LoginResponse};
use crate::navigation::{Navigator, Route};

/// Authentication state of the running application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Nothing checked yet
    Unknown,
    Loading,
    Authenticated(Identity),
    Anonymous,
}

impl AuthState {
    pub fn is_loading(&self) -> bool {
        matches!(self, AuthState::Unknown | AuthState::Loading)
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity().is_some()
    }

    pub fn session(&self) -> Session {
        Session {
            identity: self.identity().cloned(),
            loading: self.is_loading(),
        }
    }
}

/// What views gate on: who is signed in, and whether that is still being
/// worked out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub identity: Option<Identity>,
    pub loading: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    AuthCheck,
    Login,
    Logout,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::AuthCheck => "Auth check",
            Operation::Login => "Login",
            Operation::Logout => "Logout",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("{0} already in progress")]
    InFlight(Operation),

    #[error("Session changed while the request was outstanding")]
    Superseded,

    #[error(transparent)]
    Request(#[from] RequestError),
}

/// Cloneable handle to the application-wide session.
///
/// Pass it to every view that needs the signed-in user; there is no
/// global lookup.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    api: ApiClient,
    navigator: Navigator,
    state: watch::Sender<AuthState>,
    /// Bumped by every operation; completions from older operations are dropped
    epoch: Mutex<u64>,
    check_lock: AsyncMutex<()>,
    login_lock: AsyncMutex<()>,
    logout_lock: AsyncMutex<()>,
    last_error: Mutex<Option<String>>,
}

impl SessionHandle {
    /// Registers with the dispatcher so a failed token refresh ends the
    /// session.
    pub fn new(api: ApiClient, navigator: Navigator) -> Self {
        let (state, _) = watch::channel(AuthState::Unknown);
        let handle = Self {
            inner: Arc::new(SessionInner {
                api,
                navigator,
                state,
                epoch: Mutex::new(0),
                check_lock: AsyncMutex::new(()),
                login_lock: AsyncMutex::new(()),
                logout_lock: AsyncMutex::new(()),
                last_error: Mutex::new(None),
            }),
        };

        // Weak: the dispatcher is owned by the session itself
        let session = Arc::downgrade(&handle.inner);
        handle.inner.api.dispatcher().on_session_expired(move || {
            if let Some(inner) = session.upgrade() {
                SessionHandle { inner }.expire();
            }
        });
        handle
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    pub fn session(&self) -> Session {
        self.inner.state.borrow().session()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Message from the last failed login, for display under the form
    pub fn last_error(&self) -> Option<String> {
        self.inner
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_last_error(&self, message: Option<String>) {
        *self
            .inner
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = message;
    }

    /// Start an operation: bump the epoch and enter `Loading`.
    fn begin(&self) -> u64 {
        let mut epoch = self.inner.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        *epoch += 1;
        self.inner.state.send_replace(AuthState::Loading);
        *epoch
    }

    /// Apply `next` if no newer operation started since `epoch`.
    /// `commit` runs under the same lock, only when the update applies.
    fn settle(&self, epoch: u64, next: AuthState, commit: impl FnOnce()) -> bool {
        let current = self.inner.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != epoch {
            debug!(epoch, current = *current, "Discarding stale session update");
            return false;
        }
        commit();
        self.inner.state.send_replace(next);
        true
    }

    /// Drop the signed-in user without a backend call, e.g. after the
    /// token could not be refreshed. Outstanding operations are superseded.
    pub fn expire(&self) {
        let mut epoch = self.inner.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        *epoch += 1;
        self.inner.state.send_replace(AuthState::Anonymous);
        info!("Session expired");
    }

    /// Ask the backend whether a session already exists.
    pub async fn start(&self) -> Result<AuthState, SessionError> {
        let _guard = self
            .inner
            .check_lock
            .try_lock()
            .map_err(|_| SessionError::InFlight(Operation::AuthCheck))?;
        let epoch = self.begin();

        let next = match self.inner.api.check_auth().await {
            Ok(AuthCheck { authenticated: true, user: Some(user) }) => {
                info!(login = %user.login, "Session restored");
                AuthState::Authenticated(user)
            }
            Ok(_) => {
                debug!("No active session");
                AuthState::Anonymous
            }
            Err(e) => {
                warn!(error = %e, "Auth check failed");
                AuthState::Anonymous
            }
        };

        self.settle(epoch, next, || {});
        Ok(self.state())
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<Identity, SessionError> {
        let _guard = self
            .inner
            .login_lock
            .try_lock()
            .map_err(|_| SessionError::InFlight(Operation::Login))?;
        self.set_last_error(None);
        let epoch = self.begin();

        match self.inner.api.login(request).await {
            Ok(LoginResponse { user, token }) => {
                let credentials = self.inner.api.dispatcher().credentials();
                let applied = self.settle(epoch, AuthState::Authenticated(user.clone()), || {
                    if let Err(e) = credentials.set(&token) {
                        warn!(error = %e, "Failed to store token");
                    }
                });
                if !applied {
                    return Err(SessionError::Superseded);
                }
                info!(login = %user.login, "Login successful");
                self.inner.navigator.push(Route::Dashboard);
                Ok(user)
            }
            Err(e) => {
                error!(error = %e, "Login failed");
                let message = login_failure_message(&e);
                if !self.settle(epoch, AuthState::Anonymous, || self.set_last_error(Some(message))) {
                    return Err(SessionError::Superseded);
                }
                Err(e.into())
            }
        }
    }

    /// Sign out. The backend call is best-effort; the local session is
    /// always dropped.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let _guard = self
            .inner
            .logout_lock
            .try_lock()
            .map_err(|_| SessionError::InFlight(Operation::Logout))?;
        let epoch = self.begin();

        if let Err(e) = self.inner.api.logout().await {
            warn!(error = %e, "Logout request failed");
        }

        let credentials = self.inner.api.dispatcher().credentials();
        let applied = self.settle(epoch, AuthState::Anonymous, || {
            if let Err(e) = credentials.clear() {
                warn!(error = %e, "Failed to clear stored token");
            }
        });
        if !applied {
            return Err(SessionError::Superseded);
        }
        info!("Logged out");
        self.inner.navigator.replace(Route::Login);
        Ok(())
    }
}

fn login_failure_message(err: &RequestError) -> String {
    match err {
        RequestError::Server { message, .. } => message.clone(),
        RequestError::Unreachable => err.to_string(),
        _ => "Login failed".to_string(),
    }
}
