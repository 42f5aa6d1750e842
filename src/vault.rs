//! Credential vault
//!
//! Derives a key from the user's password with PBKDF2-HMAC-SHA256 and keeps
//! it in memory only. The caller persists the salt (and optionally the key
//! check tag); neither the password nor the key ever leaves this module.

use crate::constants::{KEY_CHECK_LABEL, KEY_DERIVATION_ITERATIONS, KEY_LEN, SALT_LEN};
use crate::error::{EnforcementError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;
type DerivedKey = Zeroizing<[u8; KEY_LEN]>;

/// Holds the derived key for the lifetime of the session
#[derive(Default)]
pub struct CredentialVault {
    key: Option<DerivedKey>,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault")
            .field("loaded", &self.key.is_some())
            .finish()
    }
}

impl CredentialVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a key for a new password under a fresh random salt.
    ///
    /// Returns the salt for durable storage.
    pub fn set_password(&mut self, password: &str) -> Result<Vec<u8>> {
        if password.is_empty() {
            return Err(EnforcementError::InvalidInput(
                "Password cannot be empty".to_string(),
            ));
        }

        let mut salt = vec![0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let key = derive_key(password, &salt).ok_or_else(|| {
            EnforcementError::InvalidInput("Key derivation failed".to_string())
        })?;
        self.key = Some(key);
        Ok(salt)
    }

    /// Re-derive from `password` and `salt` and compare against the loaded key.
    ///
    /// Fails closed: absent inputs, a missing key, or a derivation error all
    /// yield `false`.
    pub fn verify_password(&self, password: &str, salt: Option<&[u8]>) -> bool {
        let (Some(loaded), Some(salt)) = (self.key.as_ref(), salt) else {
            return false;
        };
        if password.is_empty() || salt.is_empty() {
            return false;
        }

        match derive_key(password, salt) {
            Some(candidate) => key_tag(loaded.as_slice())
                .is_some_and(|expected| verify_tag(candidate.as_slice(), &expected)),
            None => false,
        }
    }

    /// Rehydrate the in-memory key from a persisted salt and a freshly
    /// entered password.
    pub fn load_key(&mut self, password: &str, salt: &[u8]) -> bool {
        if password.is_empty() || salt.is_empty() {
            return false;
        }
        match derive_key(password, salt) {
            Some(key) => {
                self.key = Some(key);
                true
            }
            None => false,
        }
    }

    /// Like [`load_key`](Self::load_key), but only accepts the derived key if
    /// it reproduces the persisted key check.
    pub fn unlock(&mut self, password: &str, salt: &[u8], key_check: &str) -> bool {
        if password.is_empty() || salt.is_empty() {
            return false;
        }
        let Ok(expected) = STANDARD.decode(key_check.trim()) else {
            return false;
        };
        match derive_key(password, salt) {
            Some(candidate) if verify_tag(candidate.as_slice(), &expected) => {
                self.key = Some(candidate);
                true
            }
            _ => false,
        }
    }

    /// Base64 key check of the loaded key, suitable for persisting
    pub fn key_check(&self) -> Option<String> {
        self.key
            .as_ref()
            .and_then(|key| key_tag(key.as_slice()))
            .map(|tag| STANDARD.encode(tag))
    }

    pub fn is_loaded(&self) -> bool {
        self.key.is_some()
    }

    /// Forget the loaded key
    pub fn clear(&mut self) {
        self.key = None;
    }
}

fn derive_key(password: &str, salt: &[u8]) -> Option<DerivedKey> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2::<HmacSha256>(
        password.as_bytes(),
        salt,
        KEY_DERIVATION_ITERATIONS,
        key.as_mut(),
    )
    .ok()?;
    Some(key)
}

fn key_mac(key: &[u8]) -> Option<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).ok()?;
    mac.update(KEY_CHECK_LABEL);
    Some(mac)
}

fn key_tag(key: &[u8]) -> Option<Vec<u8>> {
    key_mac(key).map(|mac| mac.finalize().into_bytes().to_vec())
}

/// Constant-time comparison of `candidate`'s tag against `expected`
fn verify_tag(candidate: &[u8], expected: &[u8]) -> bool {
    key_mac(candidate).is_some_and(|mac| mac.verify_slice(expected).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_verify_same_password() {
        let mut vault = CredentialVault::new();
        let salt = vault.set_password("focus123").unwrap();

        assert_eq!(salt.len(), SALT_LEN);
        assert!(vault.verify_password("focus123", Some(&salt)));
    }

    #[test]
    fn test_verify_rejects_other_password() {
        let mut vault = CredentialVault::new();
        let salt = vault.set_password("focus123").unwrap();

        assert!(!vault.verify_password("wrong", Some(&salt)));
        assert!(!vault.verify_password("focus1234", Some(&salt)));
    }

    #[test]
    fn test_verify_fails_closed_on_missing_inputs() {
        let mut vault = CredentialVault::new();
        let salt = vault.set_password("focus123").unwrap();

        assert!(!vault.verify_password("focus123", None));
        assert!(!vault.verify_password("", Some(&salt)));
        assert!(!vault.verify_password("focus123", Some(&[])));
    }

    #[test]
    fn test_verify_without_loaded_key_is_false() {
        let vault = CredentialVault::new();
        assert!(!vault.verify_password("focus123", Some(&[1u8; SALT_LEN])));
    }

    #[test]
    fn test_empty_password_rejected() {
        let mut vault = CredentialVault::new();
        let err = vault.set_password("").unwrap_err();
        assert!(matches!(err, EnforcementError::InvalidInput(_)));
        assert!(!vault.is_loaded());
    }

    #[test]
    fn test_salts_are_fresh_per_call() {
        let mut vault = CredentialVault::new();
        let first = vault.set_password("focus123").unwrap();
        let second = vault.set_password("focus123").unwrap();
        assert_ne!(first, second);
        // The newer salt wins
        assert!(vault.verify_password("focus123", Some(&second)));
        assert!(!vault.verify_password("focus123", Some(&first)));
    }

    #[test]
    fn test_load_key_rehydrates_from_salt() {
        let mut original = CredentialVault::new();
        let salt = original.set_password("focus123").unwrap();

        let mut restarted = CredentialVault::new();
        assert!(restarted.load_key("focus123", &salt));
        assert!(restarted.verify_password("focus123", Some(&salt)));
        assert_eq!(restarted.key_check(), original.key_check());
    }

    #[test]
    fn test_load_key_rejects_empty_inputs() {
        let mut vault = CredentialVault::new();
        assert!(!vault.load_key("", &[1u8; SALT_LEN]));
        assert!(!vault.load_key("focus123", &[]));
        assert!(!vault.is_loaded());
    }

    #[test]
    fn test_unlock_checks_key_tag() {
        let mut original = CredentialVault::new();
        let salt = original.set_password("focus123").unwrap();
        let check = original.key_check().unwrap();

        let mut restarted = CredentialVault::new();
        assert!(!restarted.unlock("wrong", &salt, &check));
        assert!(!restarted.is_loaded());
        assert!(!restarted.unlock("focus123", &salt, "%%% not base64"));
        assert!(restarted.unlock("focus123", &salt, &check));
        assert!(restarted.verify_password("focus123", Some(&salt)));
    }

    #[test]
    fn test_key_check_does_not_contain_key_bytes() {
        let mut vault = CredentialVault::new();
        let salt = vault.set_password("focus123").unwrap();
        let key = derive_key("focus123", &salt).unwrap();
        let check = STANDARD.decode(vault.key_check().unwrap()).unwrap();
        assert_ne!(check.as_slice(), key.as_slice());
    }

    #[test]
    fn test_clear_forgets_key() {
        let mut vault = CredentialVault::new();
        let salt = vault.set_password("focus123").unwrap();
        vault.clear();
        assert!(!vault.is_loaded());
        assert!(vault.key_check().is_none());
        assert!(!vault.verify_password("focus123", Some(&salt)));
    }
}
