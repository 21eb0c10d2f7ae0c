use std::sync::RwLock;

use keyring::Entry;
use thiserror::Error;
use tracing::warn;

const SERVICE_NAME: &str = "moexdash";

/// Keychain account holding the access token
const TOKEN_ACCOUNT: &str = "mg_access_token";

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Keychain error: {0}")]
    Keychain(#[from] keyring::Error),

    #[error("Keychain unavailable")]
    Unavailable,
}

/// Accessor for the session credential (bearer token).
///
/// Implementations hold no policy: the dispatcher reads, login writes,
/// logout and a failed refresh clear.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: &str) -> Result<(), CredentialError>;
    fn clear(&self) -> Result<(), CredentialError>;
}

/// Token persisted in the OS keychain so it survives restarts.
///
/// Reads are served from an in-memory mirror after the first lookup. The
/// mirror is updated before the keychain, so a keychain failure never leaves
/// the process sending a stale token.
pub struct KeyringCredentialStore {
    entry: Option<Entry>,
    mirror: RwLock<Option<Option<String>>>,
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self::with_account(TOKEN_ACCOUNT)
    }

    pub fn with_account(account: &str) -> Self {
        let entry = match Entry::new(SERVICE_NAME, account) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Failed to create keyring entry, token kept in memory only");
                None
            }
        };
        Self {
            entry,
            mirror: RwLock::new(None),
        }
    }

    fn entry(&self) -> Result<&Entry, CredentialError> {
        self.entry.as_ref().ok_or(CredentialError::Unavailable)
    }

    fn load(&self) -> Option<String> {
        let entry = self.entry().ok()?;
        match entry.get_password() {
            Ok(token) => Some(token),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read token from keychain");
                None
            }
        }
    }

    fn remember(&self, value: Option<String>) {
        if let Ok(mut mirror) = self.mirror.write() {
            *mirror = Some(value);
        }
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get(&self) -> Option<String> {
        if let Ok(mirror) = self.mirror.read() {
            if let Some(ref cached) = *mirror {
                return cached.clone();
            }
        }
        let token = self.load();
        self.remember(token.clone());
        token
    }

    fn set(&self, token: &str) -> Result<(), CredentialError> {
        self.remember(Some(token.to_string()));
        self.entry()?.set_password(token)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        // Forget the token locally even if the keychain refuses the delete
        self.remember(None);
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local store, used by tests and by hosts without a keychain.
#[derive(Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: RwLock::new(Some(token.to_string())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<String> {
        self.token.read().ok().and_then(|token| token.clone())
    }

    fn set(&self, token: &str) -> Result<(), CredentialError> {
        if let Ok(mut current) = self.token.write() {
            *current = Some(token.to_string());
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        if let Ok(mut current) = self.token.write() {
            *current = None;
        }
        Ok(())
    }
}
