//! Typed calls for the backend endpoints.
//!
//! Every method goes through the [`Dispatcher`], so bearer attachment and
//! the refresh protocol apply uniformly.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::models::{
    Analysis, AuthCheck, DashboardInit, LoginRequest, LoginResponse, RegisterRequest,
};

use super::dispatcher::Dispatcher;
use super::transport::ApiRequest;
use super::RequestError;

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";
const CHECK_AUTH_PATH: &str = "/auth/check-auth";
const LOGOUT_PATH: &str = "/auth/logout";
const DASHBOARD_PATH: &str = "/init/dashboard";

#[derive(Clone)]
pub struct ApiClient {
    dispatcher: Dispatcher,
}

impl ApiClient {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn decode<T: DeserializeOwned>(body: Value, what: &str) -> Result<T, RequestError> {
        serde_json::from_value(body)
            .map_err(|e| RequestError::MalformedResponse(format!("{}: {}", what, e)))
    }

    fn encode<B: serde::Serialize>(body: &B) -> Result<Value, RequestError> {
        serde_json::to_value(body).map_err(|e| RequestError::InvalidRequest(e.to_string()))
    }

    // ===== Auth =====

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, RequestError> {
        let body = Self::encode(request)?;
        let response = self
            .dispatcher
            .send(ApiRequest::post(LOGIN_PATH).with_body(body))
            .await?;
        Self::decode(response, "login response")
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<(), RequestError> {
        let body = Self::encode(request)?;
        self.dispatcher
            .send(ApiRequest::post(REGISTER_PATH).with_body(body))
            .await?;
        Ok(())
    }

    pub async fn check_auth(&self) -> Result<AuthCheck, RequestError> {
        let response = self.dispatcher.send(ApiRequest::get(CHECK_AUTH_PATH)).await?;
        if response.is_null() {
            return Ok(AuthCheck::default());
        }
        Self::decode(response, "auth check")
    }

    pub async fn logout(&self) -> Result<(), RequestError> {
        self.dispatcher.send(ApiRequest::post(LOGOUT_PATH)).await?;
        Ok(())
    }

    // ===== Data Fetching Methods =====

    pub async fn init_dashboard(&self) -> Result<DashboardInit, RequestError> {
        let response = self.dispatcher.send(ApiRequest::get(DASHBOARD_PATH)).await?;
        Self::decode(response, "dashboard")
    }

    /// Forecast and analytics for `ticker` over `days`. The ticker is sent
    /// upper-cased.
    pub async fn forecast(&self, ticker: &str, days: u32) -> Result<Analysis, RequestError> {
        let path = format!("/analysis/{}/forecast/{}", ticker.trim().to_uppercase(), days);
        let response = self.dispatcher.send(ApiRequest::get(path)).await?;
        Self::decode(response, "analysis")
    }
}
