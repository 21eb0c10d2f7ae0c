//! Session and request-authentication core for the MOEX analysis dashboard.
//!
//! Every backend call goes through [`api::Dispatcher`], which attaches the
//! stored bearer token and transparently recovers from expired tokens with a
//! single shared refresh. [`auth::SessionHandle`] tracks who is signed in and
//! [`auth::Router`] gates protected views on that state.

pub mod api;
pub mod auth;
pub mod config;
pub mod favorites;
pub mod forms;
pub mod models;
pub mod navigation;

pub use api::{ApiClient, Dispatcher, HttpTransport, RequestError};
pub use auth::{AuthState, KeyringCredentialStore, Router, SessionHandle};
pub use config::Config;
pub use navigation::{Navigation, NavigationKind, Navigator, Route};
