//! The stored form of an encrypted payload.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::cipher::CipherError;
use super::{NONCE_LEN, TAG_LEN};

/// Smallest valid envelope: a nonce and the tag of an empty plaintext.
pub const MIN_ENVELOPE_LEN: usize = NONCE_LEN + TAG_LEN;

/// A parsed envelope.
///
/// The byte representation is `nonce || ciphertext || tag`; the text
/// representation is that byte string in standard padded base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Raw nonce bytes.
    pub nonce: [u8; NONCE_LEN],
    /// Raw ciphertext + authentication tag bytes.
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Encode to the storage byte layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Split a stored envelope into nonce and ciphertext.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidEnvelope`] if `bytes` is shorter than
    /// [`MIN_ENVELOPE_LEN`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CipherError> {
        if bytes.len() < MIN_ENVELOPE_LEN {
            return Err(CipherError::InvalidEnvelope { len: bytes.len() });
        }
        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(nonce_bytes);
        Ok(Self {
            nonce,
            ciphertext: ciphertext.to_vec(),
        })
    }

    /// Encode to the text form used by string fields.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Parse the text form.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Encoding`] for invalid base64 and
    /// [`CipherError::InvalidEnvelope`] if the decoded bytes are too short.
    pub fn from_base64(text: &str) -> Result<Self, CipherError> {
        let bytes = STANDARD.decode(text).map_err(|_| CipherError::Encoding)?;
        Self::from_bytes(&bytes)
    }
}
