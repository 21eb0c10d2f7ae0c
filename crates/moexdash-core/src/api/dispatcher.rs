//! Request dispatcher.
//!
//! Every backend call goes through [`Dispatcher::send`]: the stored
//! credential is attached to non-auth requests, responses are normalized
//! into [`RequestError`], and a 401 from a protected endpoint is handed to
//! the refresh coordinator.

use std::sync::Arc;

use reqwest::header;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::CredentialStore;
use crate::navigation::Navigator;

use super::refresh::RefreshCoordinator;
use super::transport::{ApiRequest, RawResponse, Transport, TransportError};
use super::RequestError;

/// Field of analysis responses that feeds the price chart
const CHART_DATA_FIELD: &str = "ohlc";

const STATUS_UNAUTHORIZED: u16 = 401;

/// Clone is cheap - all state sits behind one Arc.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    refresh: RefreshCoordinator,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
        navigator: Navigator,
    ) -> Self {
        let refresh = RefreshCoordinator::new(
            Arc::clone(&transport),
            Arc::clone(&credentials),
            navigator,
        );
        Self {
            inner: Arc::new(DispatcherInner {
                transport,
                credentials,
                refresh,
            }),
        }
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.credentials
    }

    /// Run `hook` whenever a token refresh fails and the session is over.
    pub fn on_session_expired(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.inner.refresh.set_expiry_hook(Arc::new(hook));
    }

    pub fn refresh_in_flight(&self) -> bool {
        self.inner.refresh.in_flight()
    }

    /// Send a request and return its parsed JSON body.
    pub async fn send(&self, request: ApiRequest) -> Result<Value, RequestError> {
        let response = self.transmit(&request).await?;

        if response.status == STATUS_UNAUTHORIZED && !request.is_auth_endpoint() {
            return self.inner.refresh.recover(self, request).await;
        }

        Self::finish(&request, response)
    }

    /// Put the request on the wire with the credential read at this moment.
    pub(crate) async fn transmit(&self, request: &ApiRequest) -> Result<RawResponse, RequestError> {
        let outgoing = self.authorize(request);
        debug!(
            method = outgoing.method.as_str(),
            path = %outgoing.path,
            authorized = outgoing.header(header::AUTHORIZATION.as_str()).is_some(),
            "Dispatching request"
        );

        self.inner
            .transport
            .execute(&outgoing)
            .await
            .map_err(|e| match e {
                TransportError::NoResponse(reason) => {
                    warn!(path = %request.path, reason = %reason, "Server not responding");
                    RequestError::Unreachable
                }
                TransportError::Build(reason) => RequestError::InvalidRequest(reason),
            })
    }

    fn authorize(&self, request: &ApiRequest) -> ApiRequest {
        let mut outgoing = request.clone();
        if request.is_auth_endpoint() {
            return outgoing;
        }
        if let Some(token) = self.inner.credentials.get() {
            outgoing
                .headers
                .retain(|(name, _)| !name.eq_ignore_ascii_case(header::AUTHORIZATION.as_str()));
            outgoing.headers.push((
                header::AUTHORIZATION.as_str().to_string(),
                format!("Bearer {}", token),
            ));
        }
        outgoing
    }

    /// Turn a response into the parsed body or a normalized error.
    pub(crate) fn finish(request: &ApiRequest, response: RawResponse) -> Result<Value, RequestError> {
        if !response.is_success() {
            return Err(RequestError::from_status(response.status, &response.body));
        }

        let body = Self::parse_body(&response.body)?;
        if request.is_analysis_endpoint() {
            Self::check_chart_data(&body)?;
        }
        Ok(body)
    }

    fn parse_body(body: &str) -> Result<Value, RequestError> {
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(body)
            .map_err(|e| RequestError::MalformedResponse(format!("invalid JSON body: {}", e)))
    }

    /// Chart data, when present, must be a sequence.
    fn check_chart_data(body: &Value) -> Result<(), RequestError> {
        match body.get(CHART_DATA_FIELD) {
            None | Some(Value::Null) | Some(Value::Array(_)) => Ok(()),
            Some(_) => Err(RequestError::MalformedResponse(
                "chart data is not a sequence".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{MockTransport, Scripted};
    use crate::api::transport::Method;
    use crate::auth::MemoryCredentialStore;
    use crate::navigation::{Navigation, NavigationKind, NavigationReceiver, Route};

    use std::sync::Arc;

    use tokio::sync::Notify;

    const FORECAST: &str = "/analysis/SBER/forecast/7";
    const DASHBOARD: &str = "/init/dashboard";
    const REFRESH: &str = "/auth/refresh-token";

    fn setup(token: Option<&str>) -> (Dispatcher, Arc<MockTransport>, Arc<MemoryCredentialStore>, NavigationReceiver) {
        let transport = MockTransport::new();
        let store = Arc::new(match token {
            Some(t) => MemoryCredentialStore::with_token(t),
            None => MemoryCredentialStore::new(),
        });
        let (navigator, rx) = Navigator::channel();
        let dispatcher = Dispatcher::new(transport.clone(), store.clone(), navigator);
        (dispatcher, transport, store, rx)
    }

    fn auth_header(request: &ApiRequest) -> Option<&str> {
        request.header("Authorization")
    }

    #[tokio::test]
    async fn test_attaches_bearer_to_protected_requests() {
        let (dispatcher, transport, _, _) = setup(Some("abc"));
        transport.respond(Method::Get, DASHBOARD, 200, "{}");

        dispatcher.send(ApiRequest::get(DASHBOARD)).await.expect("send");

        let requests = transport.requests();
        assert_eq!(auth_header(&requests[0]), Some("Bearer abc"));
    }

    #[tokio::test]
    async fn test_no_header_without_credential() {
        let (dispatcher, transport, _, _) = setup(None);
        transport.respond(Method::Get, DASHBOARD, 200, "{}");

        dispatcher.send(ApiRequest::get(DASHBOARD)).await.expect("send");

        assert_eq!(auth_header(&transport.requests()[0]), None);
    }

    #[tokio::test]
    async fn test_auth_requests_never_carry_credential() {
        let (dispatcher, transport, _, _) = setup(Some("abc"));
        for path in ["/auth/login", "/auth/register", "/auth/logout", "/auth/refresh-token"] {
            transport.respond(Method::Post, path, 200, "{}");
            dispatcher.send(ApiRequest::post(path)).await.expect("send");
        }
        transport.respond(Method::Get, "/auth/check-auth", 200, r#"{"authenticated": false}"#);
        dispatcher.send(ApiRequest::get("/auth/check-auth")).await.expect("send");

        let requests = transport.requests();
        assert_eq!(requests.len(), 5);
        assert!(requests.iter().all(|r| auth_header(r).is_none()));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let (dispatcher, transport, _, _) = setup(None);
        transport.script(Method::Get, DASHBOARD, Scripted::Unreachable);

        let err = dispatcher.send(ApiRequest::get(DASHBOARD)).await.unwrap_err();
        assert_eq!(err, RequestError::Unreachable);
        assert_eq!(err.user_message(), "Server not responding, try later");
    }

    #[tokio::test]
    async fn test_server_error_normalized() {
        let (dispatcher, transport, _, _) = setup(Some("abc"));
        transport.respond(Method::Get, DASHBOARD, 500, r#"{"message": "database down"}"#);

        let err = dispatcher.send(ApiRequest::get(DASHBOARD)).await.unwrap_err();
        assert_eq!(
            err,
            RequestError::Server { status: 500, message: "database down".to_string() }
        );
    }

    #[tokio::test]
    async fn test_empty_success_body_is_null() {
        let (dispatcher, transport, _, _) = setup(None);
        transport.respond(Method::Post, "/auth/logout", 200, "");

        let body = dispatcher.send(ApiRequest::post("/auth/logout")).await.expect("send");
        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn test_chart_data_must_be_sequence() {
        let (dispatcher, transport, _, _) = setup(Some("abc"));
        transport.respond(Method::Get, FORECAST, 200, r#"{"ohlc": {"close": 1.0}}"#);

        let err = dispatcher.send(ApiRequest::get(FORECAST)).await.unwrap_err();
        assert!(matches!(err, RequestError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_chart_data_absent_or_null_passes() {
        let (dispatcher, transport, _, _) = setup(Some("abc"));
        transport.respond(Method::Get, FORECAST, 200, r#"{"forecast": null}"#);
        assert!(dispatcher.send(ApiRequest::get(FORECAST)).await.is_ok());

        let path = "/analysis/GAZP/forecast/3";
        transport.respond(Method::Get, path, 200, r#"{"ohlc": null}"#);
        assert!(dispatcher.send(ApiRequest::get(path)).await.is_ok());
    }

    #[tokio::test]
    async fn test_chart_check_only_applies_to_analysis() {
        let (dispatcher, transport, _, _) = setup(Some("abc"));
        transport.respond(Method::Get, DASHBOARD, 200, r#"{"ohlc": "not checked here"}"#);
        assert!(dispatcher.send(ApiRequest::get(DASHBOARD)).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_then_replay_once() {
        let (dispatcher, transport, _, _) = setup(Some("old"));
        transport.respond(Method::Get, FORECAST, 401, r#"{"detail": "expired"}"#);
        transport.respond(Method::Get, FORECAST, 200, r#"{"ohlc": [], "forecast": null}"#);
        transport.respond(Method::Post, REFRESH, 200, r#"{"status": "ok"}"#);

        let body = dispatcher.send(ApiRequest::get(FORECAST)).await.expect("send");

        assert_eq!(body["ohlc"], Value::Array(vec![]));
        assert_eq!(transport.calls(Method::Post, REFRESH), 1);
        assert_eq!(transport.calls(Method::Get, FORECAST), 2);
        assert!(!dispatcher.refresh_in_flight());
    }

    #[tokio::test]
    async fn test_refresh_token_replaces_credential_for_replay() {
        let (dispatcher, transport, store, _) = setup(Some("old"));
        transport.respond(Method::Get, DASHBOARD, 401, "");
        transport.respond(Method::Get, DASHBOARD, 200, "{}");
        transport.respond(Method::Post, REFRESH, 200, r#"{"token": "new"}"#);

        dispatcher.send(ApiRequest::get(DASHBOARD)).await.expect("send");

        let requests = transport.requests();
        let calls: Vec<_> = requests.iter().filter(|r| r.path == DASHBOARD).collect();
        assert_eq!(auth_header(calls[0]), Some("Bearer old"));
        assert_eq!(auth_header(calls[1]), Some("Bearer new"));
        assert_eq!(store.get().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_failed_refresh_forces_login() {
        let (dispatcher, transport, store, mut rx) = setup(Some("old"));
        transport.respond(Method::Get, DASHBOARD, 401, "");
        transport.respond(Method::Post, REFRESH, 401, r#"{"detail": "refresh expired"}"#);

        let err = dispatcher.send(ApiRequest::get(DASHBOARD)).await.unwrap_err();

        assert_eq!(err, RequestError::AuthExpired);
        assert_eq!(store.get(), None);
        assert_eq!(transport.calls(Method::Get, DASHBOARD), 1);
        assert_eq!(
            rx.try_recv().ok(),
            Some(Navigation { route: Route::Login, kind: NavigationKind::Hard })
        );
        assert!(!dispatcher.refresh_in_flight());
    }

    #[tokio::test]
    async fn test_unreachable_refresh_forces_login() {
        let (dispatcher, transport, store, mut rx) = setup(Some("old"));
        transport.respond(Method::Get, DASHBOARD, 401, "");
        transport.script(Method::Post, REFRESH, Scripted::Unreachable);

        let err = dispatcher.send(ApiRequest::get(DASHBOARD)).await.unwrap_err();

        assert_eq!(err, RequestError::AuthExpired);
        assert_eq!(store.get(), None);
        assert_eq!(rx.try_recv().map(|n| n.route).ok(), Some(Route::Login));
    }

    #[tokio::test]
    async fn test_replay_unauthorized_does_not_refresh_again() {
        let (dispatcher, transport, _, _) = setup(Some("old"));
        transport.respond(Method::Get, DASHBOARD, 401, "");
        transport.respond(Method::Post, REFRESH, 200, "{}");

        let err = dispatcher.send(ApiRequest::get(DASHBOARD)).await.unwrap_err();

        assert_eq!(err, RequestError::AuthExpired);
        assert_eq!(transport.calls(Method::Post, REFRESH), 1);
        assert_eq!(transport.calls(Method::Get, DASHBOARD), 2);
    }

    #[tokio::test]
    async fn test_auth_endpoint_unauthorized_skips_refresh() {
        let (dispatcher, transport, _, _) = setup(None);
        transport.respond(Method::Post, "/auth/login", 401, r#"{"detail": "Неправильный пароль"}"#);

        let err = dispatcher.send(ApiRequest::post("/auth/login")).await.unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(transport.calls(Method::Post, REFRESH), 0);
    }

    #[tokio::test]
    async fn test_concurrent_unauthorized_share_one_refresh() {
        let (dispatcher, transport, _, _) = setup(Some("old"));
        let gate = Arc::new(Notify::new());
        transport.respond(Method::Get, FORECAST, 401, "");
        transport.respond(Method::Get, FORECAST, 200, r#"{"ohlc": []}"#);
        transport.respond(Method::Get, DASHBOARD, 401, "");
        transport.respond(Method::Get, DASHBOARD, 200, r#"{"chart_data": []}"#);
        transport.script(Method::Post, REFRESH, Scripted::Gated(gate.clone(), 200, "{}".to_string()));

        let release = async {
            while transport.calls(Method::Post, REFRESH) < 1
                || transport.calls(Method::Get, DASHBOARD) < 1
                || !dispatcher.refresh_in_flight()
            {
                tokio::task::yield_now().await;
            }
            // Let the second caller reach the shared refresh as well
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
            gate.notify_one();
        };

        let (first, second, ()) = tokio::join!(
            dispatcher.send(ApiRequest::get(FORECAST)),
            dispatcher.send(ApiRequest::get(DASHBOARD)),
            release,
        );

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(transport.calls(Method::Post, REFRESH), 1);
        assert_eq!(transport.calls(Method::Get, FORECAST), 2);
        assert_eq!(transport.calls(Method::Get, DASHBOARD), 2);
        assert!(!dispatcher.refresh_in_flight());
    }

    #[tokio::test]
    async fn test_new_refresh_allowed_after_previous_settles() {
        let (dispatcher, transport, _, _) = setup(Some("old"));
        transport.respond(Method::Get, DASHBOARD, 401, "");
        transport.respond(Method::Get, DASHBOARD, 200, "{}");
        transport.respond(Method::Get, DASHBOARD, 401, "");
        transport.respond(Method::Get, DASHBOARD, 200, "{}");
        transport.respond(Method::Post, REFRESH, 200, "{}");

        dispatcher.send(ApiRequest::get(DASHBOARD)).await.expect("first");
        dispatcher.send(ApiRequest::get(DASHBOARD)).await.expect("second");

        assert_eq!(transport.calls(Method::Post, REFRESH), 2);
    }
}
