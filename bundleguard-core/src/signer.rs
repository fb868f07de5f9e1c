//! Signing capability

use crate::{GuardError, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// Keystore and key used to sign the output bundle.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningCredentials {
    pub store_file: PathBuf,
    pub store_password: String,
    pub key_alias: String,
    pub key_password: String,
}

impl SigningCredentials {
    /// Credentials with every field required to be non-empty.
    pub fn new(
        store_file: impl Into<PathBuf>,
        store_password: impl Into<String>,
        key_alias: impl Into<String>,
        key_password: impl Into<String>,
    ) -> Result<Self> {
        let credentials = Self {
            store_file: store_file.into(),
            store_password: store_password.into(),
            key_alias: key_alias.into(),
            key_password: key_password.into(),
        };
        credentials.validate()?;
        Ok(credentials)
    }

    /// Rejects any empty field.
    pub fn validate(&self) -> Result<()> {
        if self.store_file.as_os_str().is_empty() {
            return Err(GuardError::Configuration("keystore file is empty".into()));
        }
        if self.store_password.is_empty() {
            return Err(GuardError::Configuration("keystore password is empty".into()));
        }
        if self.key_alias.is_empty() {
            return Err(GuardError::Configuration("key alias is empty".into()));
        }
        if self.key_password.is_empty() {
            return Err(GuardError::Configuration("key password is empty".into()));
        }
        Ok(())
    }
}

// Passwords stay out of logs.
impl fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("store_file", &self.store_file)
            .field("store_password", &"***")
            .field("key_alias", &self.key_alias)
            .field("key_password", &"***")
            .finish()
    }
}

/// Signs a finished bundle in place.
pub trait BundleSigner {
    fn sign(&self, bundle: &Path, credentials: &SigningCredentials) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_fields() {
        assert!(SigningCredentials::new("debug.keystore", "android", "key", "android").is_ok());
        let err = SigningCredentials::new("debug.keystore", "", "key", "android").unwrap_err();
        assert!(matches!(err, GuardError::Configuration(ref m) if m.contains("keystore password")));
        assert!(SigningCredentials::new("", "a", "b", "c").is_err());
        assert!(SigningCredentials::new("ks", "a", "", "c").is_err());
    }

    #[test]
    fn test_debug_hides_passwords() {
        let credentials = SigningCredentials::new("ks", "secret-store", "alias", "secret-key").unwrap();
        let shown = format!("{:?}", credentials);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("alias"));
    }
}
