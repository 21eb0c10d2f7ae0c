//! Auth payloads and the signed-in user's identity.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The authenticated user as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub id: Option<i64>,
    pub login: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub subscription_active: bool,
    #[serde(default)]
    pub subscription_expiry: Option<String>,
}

impl Identity {
    pub fn new(login: &str) -> Self {
        Self {
            id: None,
            login: login.to_string(),
            email: None,
            email_verified: false,
            subscription_active: false,
            subscription_expiry: None,
        }
    }

    /// Subscription expiry date. The backend sends either a date or a
    /// datetime; only the date part is kept.
    pub fn subscription_expiry_date(&self) -> Option<NaiveDate> {
        let raw = self.subscription_expiry.as_deref()?;
        let date_part = raw.get(..10)?;
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }

    pub fn subscription_display(&self) -> String {
        match (self.subscription_active, self.subscription_expiry_date()) {
            (true, Some(date)) => format!("active until {}", date.format("%d.%m.%Y")),
            (true, None) => "active".to_string(),
            (false, _) => "inactive".to_string(),
        }
    }
}

/// Response of `GET /auth/check-auth`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthCheck {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub user: Option<Identity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// Response of `POST /auth/login`
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub user: Identity,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub login: String,
    pub email: String,
    pub password: String,
}
