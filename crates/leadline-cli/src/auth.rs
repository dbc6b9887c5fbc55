//! API token persistence in the OS keychain.
//!
//! Tokens are stored per profile so `--profile staging` and the default
//! prod setup keep separate credentials. `LEADLINE_API_KEY` in the
//! environment always wins over the keychain, for CI and one-off runs.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use leadline_core::config::{Profile, ENV_API_KEY};
use leadline_core::credentials::CredentialStore;
use leadline_core::error::Error as CoreError;
use leadline_core::Result as CoreResult;

use crate::error::CliError;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "leadline-cli";

/// Keychain-backed token store, keyed by deployment profile.
#[derive(Clone)]
pub struct KeychainTokenStore {
    username: String,
}

impl KeychainTokenStore {
    pub fn new(profile: Profile) -> Self {
        Self {
            username: format!("api_token:{profile:?}").to_lowercase(),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> CoreResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| CoreError::Credentials(error.to_string()))
    }
}

impl CredentialStore for KeychainTokenStore {
    #[cfg(not(test))]
    fn load_token(&self) -> CoreResult<Option<String>> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(CoreError::Credentials(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load_token(&self) -> CoreResult<Option<String>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| CoreError::Credentials(error.to_string()))?;
        Ok(guard.get(&self.username).cloned())
    }

    #[cfg(not(test))]
    fn save_token(&self, token: &str) -> CoreResult<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(CoreError::Credentials("token must not be empty".to_string()));
        }
        self.entry()?
            .set_password(token)
            .map_err(|error| CoreError::Credentials(error.to_string()))
    }

    #[cfg(test)]
    fn save_token(&self, token: &str) -> CoreResult<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(CoreError::Credentials("token must not be empty".to_string()));
        }
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| CoreError::Credentials(error.to_string()))?;
        guard.insert(self.username.clone(), token.to_string());
        Ok(())
    }

    #[cfg(not(test))]
    fn clear_token(&self) -> CoreResult<()> {
        let entry = self.entry()?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(CoreError::Credentials(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear_token(&self) -> CoreResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| CoreError::Credentials(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}

/// The token for API calls: environment override first, then the keychain.
pub fn resolve_token(profile: Profile) -> Result<String, CliError> {
    if let Ok(token) = std::env::var(ENV_API_KEY) {
        let token = token.trim().to_string();
        if !token.is_empty() {
            return Ok(token);
        }
    }
    KeychainTokenStore::new(profile)
        .load_token()?
        .ok_or(CliError::NotAuthenticated)
}

/// A masked rendering safe to print: first four characters, then a stub.
pub fn mask_token(token: &str) -> String {
    let head: String = token.chars().take(4).collect();
    format!("{head}…")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_store_roundtrip_is_per_profile() {
        let prod = KeychainTokenStore::new(Profile::Prod);
        let staging = KeychainTokenStore::new(Profile::Staging);

        prod.save_token("prod-token").unwrap();
        staging.save_token("staging-token").unwrap();

        assert_eq!(prod.load_token().unwrap().as_deref(), Some("prod-token"));
        assert_eq!(
            staging.load_token().unwrap().as_deref(),
            Some("staging-token")
        );

        prod.clear_token().unwrap();
        assert_eq!(prod.load_token().unwrap(), None);
        assert_eq!(
            staging.load_token().unwrap().as_deref(),
            Some("staging-token")
        );
        staging.clear_token().unwrap();
    }

    #[test]
    fn test_empty_token_rejected() {
        let store = KeychainTokenStore::new(Profile::Dev);
        assert!(store.save_token("   ").is_err());
    }

    #[test]
    fn test_mask_token_hides_the_tail() {
        let masked = mask_token("secret-token-value");
        assert!(masked.starts_with("secr"));
        assert!(!masked.contains("token-value"));
    }
}
