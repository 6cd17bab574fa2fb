//! [`MasterSecretHolder`]: the process-wide root secret, set exactly once.
//!
//! Readers never receive the stored value itself. Each read returns a fresh
//! copy registered with the caller's [`WipeScope`], so flushing a unit of work
//! destroys that unit's copy without touching the original or any copy held by
//! a concurrent unit.

use std::sync::OnceLock;

use thiserror::Error;
use tracing::info;

use crate::wipe::{SecretText, WipeScope};

/// Errors produced by master secret lifecycle operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A second `set` was attempted.
    #[error("master secret is already set")]
    AlreadySet,

    /// The secret was read before it was set.
    #[error("master secret is not set")]
    NotSet,
}

/// Holder of the root secret.
///
/// Constructed once during startup and shared (usually behind an `Arc`) with
/// every component that needs it.
#[derive(Default)]
pub struct MasterSecretHolder {
    secret: OnceLock<SecretText>,
}

impl MasterSecretHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the master secret.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::AlreadySet`] if a secret is already held.
    /// The existing secret is left untouched.
    pub fn set(&self, secret: impl Into<String>) -> Result<(), ConfigurationError> {
        self.secret
            .set(SecretText::new(secret))
            .map_err(|_rejected| ConfigurationError::AlreadySet)?;
        info!("master secret set");
        Ok(())
    }

    /// Return a copy of the master secret, tracked by `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NotSet`] if no secret has been stored.
    pub fn get(&self, scope: &WipeScope) -> Result<SecretText, ConfigurationError> {
        let copy = self
            .secret
            .get()
            .ok_or(ConfigurationError::NotSet)?
            .duplicate();
        scope.mark(&copy);
        Ok(copy)
    }

    /// Report that a secret is present.
    ///
    /// Never returns `Ok(false)`: an absent secret is reported as
    /// [`ConfigurationError::NotSet`]. Use [`is_ready`](Self::is_ready) for a
    /// plain boolean.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NotSet`] if no secret has been stored.
    pub fn is_set(&self) -> Result<bool, ConfigurationError> {
        self.secret
            .get()
            .map(|_| true)
            .ok_or(ConfigurationError::NotSet)
    }

    /// `true` once a secret has been stored.
    pub fn is_ready(&self) -> bool {
        self.secret.get().is_some()
    }
}

impl std::fmt::Debug for MasterSecretHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterSecretHolder")
            .field("ready", &self.is_ready())
            .finish()
    }
}
