//! Credential storage seam.
//!
//! The core never persists tokens itself; frontends plug in a platform
//! store (OS keychain in the CLI) behind this trait.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Error, Result};

/// Storage for the API bearer token.
pub trait CredentialStore: Send + Sync {
    /// Load the stored token, `None` when the user is signed out.
    fn load_token(&self) -> Result<Option<String>>;

    /// Persist the token, replacing any previous one.
    fn save_token(&self, token: &str) -> Result<()>;

    /// Remove the stored token.
    fn clear_token(&self) -> Result<()>;
}

/// Volatile in-memory store, for tests and short-lived tooling.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    values: Mutex<HashMap<&'static str, String>>,
}

const TOKEN_KEY: &str = "api_token";

impl CredentialStore for InMemoryCredentialStore {
    fn load_token(&self) -> Result<Option<String>> {
        Ok(self.values.lock().unwrap().get(TOKEN_KEY).cloned())
    }

    fn save_token(&self, token: &str) -> Result<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::Credentials(
                "token must not be empty".to_string(),
            ));
        }
        self.values
            .lock()
            .unwrap()
            .insert(TOKEN_KEY, token.to_string());
        Ok(())
    }

    fn clear_token(&self) -> Result<()> {
        self.values.lock().unwrap().remove(TOKEN_KEY);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_roundtrip_and_clear() {
        let store = InMemoryCredentialStore::default();
        assert_eq!(store.load_token().unwrap(), None);

        store.save_token("  tok-123  ").unwrap();
        assert_eq!(store.load_token().unwrap().as_deref(), Some("tok-123"));

        store.clear_token().unwrap();
        assert_eq!(store.load_token().unwrap(), None);
    }

    #[test]
    fn test_empty_token_rejected() {
        let store = InMemoryCredentialStore::default();
        assert!(store.save_token("   ").is_err());
    }
}
