//! In-memory document repositories with field-level encryption.
//!
//! # Responsibilities
//! - Hold the documents of one entity type ([`DocumentCollection`]).
//! - Encrypt configured string fields before storage and decrypt them on read,
//!   each field under the context `"{entity}.{path}"`.
//! - Compute the integrity digest recorded alongside each stored document.

pub mod collection;
pub mod fields;

pub use collection::{DocumentCollection, StoredDocument};
