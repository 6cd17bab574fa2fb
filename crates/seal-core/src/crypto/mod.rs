//! Field encryption primitives.
//!
//! This module is free of HTTP and storage dependencies. It provides key
//! derivation, AES-256-GCM field encryption, secret entropy checks and
//! content hashing.
//!
//! # Envelope format
//!
//! ```text
//! nonce (12 bytes) || ciphertext || tag (16 bytes)
//! ```
//!
//! Text callers store the envelope as standard padded base64. The byte layout
//! is the only storage-facing contract and must not change.

pub mod cipher;
pub mod entropy;
pub mod envelope;
pub mod hash;
pub mod kdf;

pub use cipher::{CipherError, FieldCipher};
pub use envelope::Envelope;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Byte length of the GCM authentication tag (16 bytes = 128 bits).
pub const TAG_LEN: usize = 16;
