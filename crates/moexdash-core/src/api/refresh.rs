//! Single-flight token refresh.
//!
//! The first caller that sees a 401 starts the refresh and parks a shared
//! future in the slot; every other 401 that arrives while it is pending
//! awaits the same future instead of issuing its own refresh. Each caller
//! then replays its own request exactly once.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::auth::CredentialStore;
use crate::navigation::{Navigator, Route};

use super::dispatcher::Dispatcher;
use super::transport::{ApiRequest, Transport, TransportError};
use super::RequestError;

pub(crate) const REFRESH_PATH: &str = "/auth/refresh-token";

/// Fields a refresh response may use to hand back a new access token
const TOKEN_FIELDS: [&str; 2] = ["token", "access_token"];

type SharedRefresh = Shared<BoxFuture<'static, Result<(), RequestError>>>;

/// Called once a refresh has failed and the credential is gone
pub(crate) type ExpiryHook = Arc<dyn Fn() + Send + Sync>;

pub(crate) struct RefreshCoordinator {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    navigator: Navigator,
    slot: Arc<Mutex<Option<SharedRefresh>>>,
    on_expired: Arc<Mutex<Option<ExpiryHook>>>,
}

impl RefreshCoordinator {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
        navigator: Navigator,
    ) -> Self {
        Self {
            transport,
            credentials,
            navigator,
            slot: Arc::new(Mutex::new(None)),
            on_expired: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn set_expiry_hook(&self, hook: ExpiryHook) {
        *self.on_expired.lock().unwrap_or_else(PoisonError::into_inner) = Some(hook);
    }

    pub(crate) fn in_flight(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Recover a request that came back 401: wait for a refresh, then
    /// replay the request once. The replay's outcome is the caller's outcome.
    pub(crate) async fn recover(
        &self,
        dispatcher: &Dispatcher,
        pending: ApiRequest,
    ) -> Result<Value, RequestError> {
        warn!(path = %pending.path, "Unauthorized, waiting on token refresh");
        self.refresh().await?;

        let response = dispatcher.transmit(&pending).await?;
        if response.status == 401 {
            warn!(path = %pending.path, "Still unauthorized after refresh");
            return Err(RequestError::AuthExpired);
        }
        debug!(path = %pending.path, status = response.status, "Replayed request after refresh");
        Dispatcher::finish(&pending, response)
    }

    /// Join the in-flight refresh or start one.
    pub(crate) async fn refresh(&self) -> Result<(), RequestError> {
        let shared = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(existing) => {
                    debug!("Joining in-flight token refresh");
                    existing.clone()
                }
                None => {
                    let started = self.start().shared();
                    *slot = Some(started.clone());
                    started
                }
            }
        };
        shared.await
    }

    fn start(&self) -> BoxFuture<'static, Result<(), RequestError>> {
        let transport = Arc::clone(&self.transport);
        let credentials = Arc::clone(&self.credentials);
        let navigator = self.navigator.clone();
        let slot = Arc::clone(&self.slot);
        let on_expired = Arc::clone(&self.on_expired);

        async move {
            info!("Refreshing access token");
            let outcome = Self::call_refresh(transport.as_ref(), credentials.as_ref()).await;

            // Empty the slot before any waiter sees the outcome
            slot.lock().unwrap_or_else(PoisonError::into_inner).take();

            match outcome {
                Ok(()) => {
                    info!("Access token refreshed");
                    Ok(())
                }
                Err(e) => {
                    error!(error = %e, "Token refresh failed, forcing re-login");
                    if let Err(e) = credentials.clear() {
                        warn!(error = %e, "Failed to clear stored token");
                    }
                    let hook = on_expired.lock().unwrap_or_else(PoisonError::into_inner).clone();
                    if let Some(hook) = hook {
                        hook();
                    }
                    navigator.hard(Route::Login);
                    Err(RequestError::AuthExpired)
                }
            }
        }
        .boxed()
    }

    async fn call_refresh(
        transport: &dyn Transport,
        credentials: &dyn CredentialStore,
    ) -> Result<(), RequestError> {
        let response = transport
            .execute(&ApiRequest::post(REFRESH_PATH))
            .await
            .map_err(|e| match e {
                TransportError::NoResponse(_) => RequestError::Unreachable,
                TransportError::Build(reason) => RequestError::InvalidRequest(reason),
            })?;

        if !response.is_success() {
            return Err(RequestError::from_status(response.status, &response.body));
        }

        // The server may rotate the access token in the body; otherwise it
        // lives in cookies the HTTP client already carries.
        let body: Value = serde_json::from_str(&response.body).unwrap_or(Value::Null);
        let token = TOKEN_FIELDS
            .iter()
            .find_map(|field| body.get(field).and_then(Value::as_str));
        if let Some(token) = token {
            if let Err(e) = credentials.set(token) {
                warn!(error = %e, "Failed to store refreshed token");
            }
        }
        Ok(())
    }
}
