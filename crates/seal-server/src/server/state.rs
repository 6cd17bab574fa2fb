//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use seal_core::{FieldCipher, MasterSecretHolder, RepositoryResolver, WipeRegistry};

use crate::documents::DocumentCollection;

/// Application state shared across all request handlers.
///
/// All fields are cheaply cloneable (`Arc`-wrapped or already `Arc`-backed) so
/// that Axum can clone the state for each request without copying expensive data.
#[derive(Clone)]
pub struct AppState {
    /// Process-wide root secret.
    pub master: Arc<MasterSecretHolder>,
    /// Field cipher bound to the encryption key label.
    pub cipher: FieldCipher,
    /// Hands out and flushes per-request wipe scopes.
    pub wipe: WipeRegistry,
    /// Entity type → document repository.
    pub repositories: Arc<RepositoryResolver<DocumentCollection>>,
    /// Record and verify a digest for every stored document.
    pub integrity_check_enabled: bool,
    /// Content above this size is hashed as a stream.
    pub storage_threshold_bytes: u64,
}

impl AppState {
    /// Create a new [`AppState`] from its shared services.
    pub fn new(
        master: Arc<MasterSecretHolder>,
        wipe: WipeRegistry,
        repositories: RepositoryResolver<DocumentCollection>,
        integrity_check_enabled: bool,
        storage_threshold_bytes: u64,
    ) -> Self {
        Self {
            master,
            cipher: FieldCipher::new(),
            wipe,
            repositories: Arc::new(repositories),
            integrity_check_enabled,
            storage_threshold_bytes,
        }
    }
}

#[cfg(test)]
impl Default for AppState {
    /// No master secret and no repositories.
    fn default() -> Self {
        Self::new(
            Arc::new(MasterSecretHolder::new()),
            WipeRegistry::new(seal_core::WipeConfig::default()).expect("wipe pool"),
            RepositoryResolver::new(Default::default()),
            true,
            crate::config::MIN_STORAGE_THRESHOLD_BYTES,
        )
    }
}
