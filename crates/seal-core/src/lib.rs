//! Field-level encryption core: key derivation, AES-256-GCM envelopes, secret
//! entropy checks, content hashing, master secret lifecycle, request-scoped
//! secure wiping and repository resolution.
//!
//! # Security invariants
//!
//! - Secrets, derived keys and decrypted plaintext are **never** logged.
//! - Every secret, derived key and decrypted buffer handled by [`crypto`] is
//!   registered with the caller's [`wipe::WipeScope`].
//! - A derived key is used for exactly one operation and destroyed before the
//!   operation returns.

pub mod crypto;
pub mod master;
pub mod repository;
pub mod wipe;

pub use crypto::{CipherError, Envelope, FieldCipher};
pub use master::{ConfigurationError, MasterSecretHolder};
pub use repository::{LookupError, Repository, RepositoryResolver};
pub use wipe::{KeyMaterial, SecretBytes, SecretText, WipeConfig, WipeError, WipeRegistry, WipeScope};
