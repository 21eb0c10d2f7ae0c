//! Authentication module for managing the user session and credential.
//!
//! This module provides:
//! - `CredentialStore`: Bearer token storage (OS keychain or in-memory)
//! - `SessionHandle`: Auth-check, login and logout state machine
//! - `Router`: Route gating on session state

pub mod credentials;
pub mod guard;
pub mod session;

pub use credentials::{CredentialError, CredentialStore, KeyringCredentialStore, MemoryCredentialStore};
pub use guard::{decide, login_view_redirect, resolve, Decision, RouteError, Router};
pub use session::{AuthState, Operation, Session, SessionError, SessionHandle};
