//! Entity type → repository lookup.
//!
//! The persistence layer registers its repositories by name at startup. The
//! [`RepositoryResolver`] finds the repository responsible for an entity type
//! and caches the answer for the lifetime of the process.

pub mod resolver;

pub use resolver::{LookupError, RepositoryResolver};

/// A repository that stores documents of exactly one entity type.
pub trait Repository: Send + Sync {
    /// The entity type this repository persists.
    fn entity_type(&self) -> &str;
}

