//! Client-side form validation.
//!
//! Invalid forms never reach the network: each `validate` returns either
//! the request payload or every field error found.

use thiserror::Error;

use crate::api::RequestError;
use crate::models::{LoginRequest, RegisterRequest};

const LOGIN_MIN_PASSWORD_LENGTH: usize = 6;
const REGISTER_MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_FORECAST_DAYS: u32 = 365;
pub const DEFAULT_FORECAST_DAYS: u32 = 7;

/// Backend `detail` fragments reported when registration hits a taken field
const EMAIL_TAKEN_MARKERS: [&str; 2] = ["email уже занят", "email already"];
const LOGIN_TAKEN_MARKERS: [&str; 2] = ["логин уже занят", "login already"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Login,
    Email,
    Password,
    ConfirmPassword,
    Ticker,
    Days,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Enter login")]
    LoginRequired,
    #[error("Enter email")]
    EmailRequired,
    #[error("Invalid email")]
    EmailInvalid,
    #[error("Enter password")]
    PasswordRequired,
    #[error("Password too short")]
    PasswordTooShort,
    #[error("Password must be at least 8 characters")]
    PasswordBelowMinimum,
    #[error("Password must contain letters and digits")]
    PasswordNeedsLettersAndDigits,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Please choose a ticker")]
    TickerRequired,
    #[error("Forecast horizon must be between 1 and 365 days")]
    DaysOutOfRange,
}

impl ValidationError {
    pub fn field(&self) -> Field {
        match self {
            ValidationError::LoginRequired => Field::Login,
            ValidationError::EmailRequired | ValidationError::EmailInvalid => Field::Email,
            ValidationError::PasswordRequired
            | ValidationError::PasswordTooShort
            | ValidationError::PasswordBelowMinimum
            | ValidationError::PasswordNeedsLettersAndDigits => Field::Password,
            ValidationError::PasswordMismatch => Field::ConfirmPassword,
            ValidationError::TickerRequired => Field::Ticker,
            ValidationError::DaysOutOfRange => Field::Days,
        }
    }
}

fn finish<T>(errors: Vec<ValidationError>, payload: impl FnOnce() -> T) -> Result<T, Vec<ValidationError>> {
    if errors.is_empty() {
        Ok(payload())
    } else {
        Err(errors)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub login: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<LoginRequest, Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.login.trim().is_empty() {
            errors.push(ValidationError::LoginRequired);
        }
        if self.password.is_empty() {
            errors.push(ValidationError::PasswordRequired);
        } else if self.password.chars().count() < LOGIN_MIN_PASSWORD_LENGTH {
            errors.push(ValidationError::PasswordTooShort);
        }

        finish(errors, || LoginRequest {
            login: self.login.clone(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub login: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<RegisterRequest, Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.login.trim().is_empty() {
            errors.push(ValidationError::LoginRequired);
        }

        if self.email.trim().is_empty() {
            errors.push(ValidationError::EmailRequired);
        } else if !looks_like_email(&self.email) {
            errors.push(ValidationError::EmailInvalid);
        }

        if self.password.is_empty() {
            errors.push(ValidationError::PasswordRequired);
        } else if self.password.chars().count() < REGISTER_MIN_PASSWORD_LENGTH {
            errors.push(ValidationError::PasswordBelowMinimum);
        } else if !has_letter_and_digit(&self.password) {
            errors.push(ValidationError::PasswordNeedsLettersAndDigits);
        }

        if self.password != self.confirm_password {
            errors.push(ValidationError::PasswordMismatch);
        }

        finish(errors, || RegisterRequest {
            login: self.login.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastQuery {
    pub ticker: String,
    pub days: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ForecastForm {
    pub ticker: String,
    pub days: u32,
}

impl ForecastForm {
    pub fn validate(&self) -> Result<ForecastQuery, Vec<ValidationError>> {
        let mut errors = Vec::new();
        let ticker = self.ticker.trim();
        if ticker.is_empty() {
            errors.push(ValidationError::TickerRequired);
        }
        if !(1..=MAX_FORECAST_DAYS).contains(&self.days) {
            errors.push(ValidationError::DaysOutOfRange);
        }

        finish(errors, || ForecastQuery {
            ticker: ticker.to_uppercase(),
            days: self.days,
        })
    }
}

/// Whole-string `\S+@\S+\.\S+`
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    email.match_indices('@').any(|(at, _)| {
        let domain = &email[at + 1..];
        at > 0
            && domain
                .match_indices('.')
                .any(|(dot, _)| dot > 0 && dot + 1 < domain.len())
    })
}

fn has_letter_and_digit(password: &str) -> bool {
    password.chars().any(|c| c.is_ascii_alphabetic()) && password.chars().any(|c| c.is_ascii_digit())
}

/// Message for a failed registration call.
pub fn registration_failure_message(err: &RequestError) -> String {
    match err {
        RequestError::Server { message, .. } => {
            let detail = message.to_lowercase();
            if EMAIL_TAKEN_MARKERS.iter().any(|m| detail.contains(m)) {
                "This email is already in use".to_string()
            } else if LOGIN_TAKEN_MARKERS.iter().any(|m| detail.contains(m)) {
                "This login is already taken".to_string()
            } else {
                "Registration failed".to_string()
            }
        }
        RequestError::Unreachable => err.to_string(),
        _ => "Registration failed".to_string(),
    }
}
