//! HTTP side of the client.
//!
//! This module provides the `Dispatcher` that every backend call goes
//! through, the single-flight token refresh behind it, and `ApiClient`
//! with typed endpoint methods.
//!
//! The backend uses bearer token authentication; the token is obtained
//! from `/auth/login` and renewed through `/auth/refresh-token`.

pub mod client;
pub mod dispatcher;
pub mod error;
mod refresh;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use client::ApiClient;
pub use dispatcher::Dispatcher;
pub use error::RequestError;
pub use transport::{ApiRequest, HttpTransport, Method, RawResponse, Transport, TransportError};
