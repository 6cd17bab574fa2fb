//! Request-scoped secure wiping of sensitive in-memory values.
//!
//! # Lifecycle
//!
//! 1. At the start of a unit of work (usually one inbound request) the caller
//!    obtains a [`WipeScope`] from [`WipeRegistry::begin`].
//! 2. Every secret, derived key, and decrypted buffer created during the unit
//!    is registered with the scope. The scope handle is passed explicitly to
//!    every call and cloned into child tasks of the same unit.
//! 3. On every exit path the caller invokes [`WipeRegistry::flush`], which
//!    detaches the set and destroys each member in parallel.
//!
//! # Invariants
//!
//! - Membership is by identity (shared allocation), never by value.
//! - A flush destroys each detached member exactly once; registrations that
//!   arrive after the detach land in a fresh set.
//! - Scopes are isolated: flushing one never touches another's members.

pub mod registry;
pub mod scope;
pub mod secret;

pub use registry::{WipeConfig, WipeRegistry, WipeReport};
pub use scope::{WipeItem, WipeScope};
pub use secret::{KeyMaterial, SecretBytes, SecretText};

use thiserror::Error;

/// Errors produced by the wipe layer.
#[derive(Debug, Error)]
pub enum WipeError {
    /// A value with no destruction routine was offered for wiping. This is a
    /// programming error in the caller, never a runtime condition.
    #[error("unsupported wipe type: {type_name}")]
    UnsupportedType { type_name: String },

    /// The bounded flush worker pool could not be created.
    #[error("failed to build wipe worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
