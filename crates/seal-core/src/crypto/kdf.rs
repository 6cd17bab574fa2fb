//! Deterministic, context-bound key derivation (HKDF-SHA256).
//!
//! The secret is the input keying material, the context is the extract salt
//! and the label is the expand info. Identical inputs always produce the same
//! key; any change to the context or label produces an unrelated key.

use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

use super::KEY_LEN;
use crate::wipe::KeyMaterial;

/// Label used for keys that encrypt field values.
pub const ENCRYPTION_KEY_LABEL: &str = "field-encryption-key";

#[derive(Debug, Error)]
pub enum KdfError {
    /// HKDF refused the requested output length.
    #[error("hkdf expand failed")]
    Expand,
}

/// Derive a [`KEY_LEN`]-byte key bound to `(context, label)`.
///
/// # Errors
///
/// Returns [`KdfError::Expand`] if HKDF rejects the output length. With the
/// fixed 32-byte output this does not happen in practice.
pub fn derive(secret: &[u8], context: &str, label: &str) -> Result<KeyMaterial, KdfError> {
    let hk = Hkdf::<Sha256>::new(Some(context.as_bytes()), secret);
    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(label.as_bytes(), &mut okm[..])
        .map_err(|_| KdfError::Expand)?;
    Ok(KeyMaterial::new(okm))
}
