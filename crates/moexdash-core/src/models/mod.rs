//! Data models for backend payloads.
//!
//! This module contains the structures exchanged with the backend:
//!
//! - `Identity`, `AuthCheck`, `LoginResponse`: auth payloads
//! - `DashboardInit`: candles and news for the initial dashboard
//! - `Analysis`: OHLC history, forecast point, factor groups and model metrics

pub mod analysis;
pub mod dashboard;
pub mod user;

pub use analysis::{Analysis, FactorGroups, ForecastPoint, ModelMetrics, OhlcBar};
pub use dashboard::{Candle, DashboardInit, MoexNewsItem, TelegramMessage};
pub use user::{AuthCheck, Identity, LoginRequest, LoginResponse, RegisterRequest};
