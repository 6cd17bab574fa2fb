//! AES-256-GCM encryption and decryption of individual field values.
//!
//! Every call derives its own key from `(secret, context)` via
//! [`kdf::derive`], uses it once and destroys it before returning. A fresh
//! random 96-bit nonce is drawn from the OS CSPRNG for every encryption.
//!
//! # Failure contract
//!
//! The plain [`FieldCipher::encrypt`] / [`FieldCipher::decrypt`] methods never
//! return an error. A failed encryption yields an **empty** envelope; a failed
//! decryption (wrong key, tampering, malformed input) yields the **original
//! input unchanged**. Both log the failure without secret material. Callers
//! that need to tell "failed" apart from "never encrypted" use the `try_`
//! variants or an independent integrity check.

use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use thiserror::Error;
use tracing::warn;
use zeroize::Zeroize;

use super::envelope::Envelope;
use super::kdf::{self, ENCRYPTION_KEY_LABEL};
use super::NONCE_LEN;
use crate::wipe::{KeyMaterial, SecretBytes, SecretText, WipeScope};

/// Algorithm name recorded in failure logs.
pub const ALGORITHM: &str = "AES-256-GCM";

/// Errors produced by the cipher layer.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The envelope is shorter than nonce + tag.
    #[error("invalid envelope: {len} bytes")]
    InvalidEnvelope { len: usize },

    /// The text envelope is not valid base64.
    #[error("invalid envelope encoding")]
    Encoding,

    /// Key derivation failed.
    #[error("key derivation failed")]
    KeyDerivation,

    /// The derived key was destroyed before the cipher could be built.
    #[error("key material already destroyed")]
    KeyDestroyed,

    /// The derived key is the wrong length.
    #[error("invalid key length")]
    InvalidKeyLength,

    /// AES-GCM encryption or authentication failed.
    #[error("aead operation failed")]
    AeadFailure,

    /// Decrypted text is not valid UTF-8.
    #[error("decrypted text is not valid UTF-8")]
    InvalidUtf8,
}

/// Destroys a derived key when the operation that uses it ends, on every path.
struct DestroyOnDrop<'a>(&'a KeyMaterial);

impl Drop for DestroyOnDrop<'_> {
    fn drop(&mut self) {
        self.0.destroy();
    }
}

/// Authenticated field encryption bound to a derivation label.
#[derive(Debug, Clone, Copy)]
pub struct FieldCipher {
    label: &'static str,
}

impl Default for FieldCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldCipher {
    /// A cipher deriving keys under [`ENCRYPTION_KEY_LABEL`].
    pub const fn new() -> Self {
        Self {
            label: ENCRYPTION_KEY_LABEL,
        }
    }

    /// A cipher deriving keys under a custom purpose label.
    pub const fn with_label(label: &'static str) -> Self {
        Self { label }
    }

    /// Encrypt `plaintext`, returning `nonce || ciphertext || tag`.
    ///
    /// Returns an empty vector on failure; see the module docs.
    pub fn encrypt(
        &self,
        scope: &WipeScope,
        secret: &SecretText,
        context: &str,
        plaintext: &[u8],
    ) -> Vec<u8> {
        self.try_encrypt(scope, secret, context, plaintext)
            .unwrap_or_else(|e| {
                warn!(
                    algorithm = ALGORITHM,
                    context,
                    size = plaintext.len(),
                    error = %e,
                    "field encryption failed; returning empty envelope"
                );
                Vec::new()
            })
    }

    /// Decrypt an envelope. The result is tracked by `scope`.
    ///
    /// Returns a copy of `envelope` unchanged on failure; see the module docs.
    pub fn decrypt(
        &self,
        scope: &WipeScope,
        secret: &SecretText,
        context: &str,
        envelope: &[u8],
    ) -> SecretBytes {
        match self.try_decrypt(scope, secret, context, envelope) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!(
                    algorithm = ALGORITHM,
                    context,
                    size = envelope.len(),
                    error = %e,
                    "field decryption failed; returning input unchanged"
                );
                let passthrough = SecretBytes::new(envelope.to_vec());
                scope.mark(&passthrough);
                passthrough
            }
        }
    }

    /// Encrypt a string field into its base64 envelope.
    ///
    /// Returns an empty string on failure.
    pub fn encrypt_text(
        &self,
        scope: &WipeScope,
        secret: &SecretText,
        context: &str,
        plaintext: &str,
    ) -> String {
        self.try_encrypt_text(scope, secret, context, plaintext)
            .unwrap_or_else(|e| {
                warn!(
                    algorithm = ALGORITHM,
                    context,
                    size = plaintext.len(),
                    error = %e,
                    "field encryption failed; returning empty envelope"
                );
                String::new()
            })
    }

    /// Decrypt a base64 envelope back into text. The result is tracked by
    /// `scope`.
    ///
    /// Returns `envelope` unchanged on failure.
    pub fn decrypt_text(
        &self,
        scope: &WipeScope,
        secret: &SecretText,
        context: &str,
        envelope: &str,
    ) -> SecretText {
        match self.try_decrypt_text(scope, secret, context, envelope) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!(
                    algorithm = ALGORITHM,
                    context,
                    size = envelope.len(),
                    error = %e,
                    "field decryption failed; returning input unchanged"
                );
                let passthrough = SecretText::new(envelope);
                scope.mark(&passthrough);
                passthrough
            }
        }
    }

    /// Strict form of [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Returns a [`CipherError`] if key derivation or the AEAD operation fails.
    pub fn try_encrypt(
        &self,
        scope: &WipeScope,
        secret: &SecretText,
        context: &str,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CipherError> {
        self.with_cipher(scope, secret, context, |cipher| {
            let mut nonce_bytes = [0u8; NONCE_LEN];
            OsRng.fill_bytes(&mut nonce_bytes);
            let ciphertext = cipher
                .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
                .map_err(|_| CipherError::AeadFailure)?;
            Ok(Envelope {
                nonce: nonce_bytes,
                ciphertext,
            }
            .to_bytes())
        })
    }

    /// Strict form of [`decrypt`](Self::decrypt).
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidEnvelope`] for truncated input and
    /// [`CipherError::AeadFailure`] if authentication fails (wrong key or
    /// tampered data).
    pub fn try_decrypt(
        &self,
        scope: &WipeScope,
        secret: &SecretText,
        context: &str,
        envelope: &[u8],
    ) -> Result<SecretBytes, CipherError> {
        let parsed = Envelope::from_bytes(envelope)?;
        let plaintext = self.with_cipher(scope, secret, context, |cipher| {
            cipher
                .decrypt(Nonce::from_slice(&parsed.nonce), parsed.ciphertext.as_ref())
                .map_err(|_| CipherError::AeadFailure)
        })?;
        let plaintext = SecretBytes::new(plaintext);
        scope.mark(&plaintext);
        Ok(plaintext)
    }

    /// Strict form of [`encrypt_text`](Self::encrypt_text).
    ///
    /// # Errors
    ///
    /// See [`try_encrypt`](Self::try_encrypt).
    pub fn try_encrypt_text(
        &self,
        scope: &WipeScope,
        secret: &SecretText,
        context: &str,
        plaintext: &str,
    ) -> Result<String, CipherError> {
        let envelope = self.try_encrypt(scope, secret, context, plaintext.as_bytes())?;
        Envelope::from_bytes(&envelope).map(|e| e.to_base64())
    }

    /// Strict form of [`decrypt_text`](Self::decrypt_text).
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Encoding`] for invalid base64,
    /// [`CipherError::InvalidUtf8`] if the plaintext is not text, and any
    /// error of [`try_decrypt`](Self::try_decrypt).
    pub fn try_decrypt_text(
        &self,
        scope: &WipeScope,
        secret: &SecretText,
        context: &str,
        envelope: &str,
    ) -> Result<SecretText, CipherError> {
        let parsed = Envelope::from_base64(envelope)?;
        let bytes = self.try_decrypt(scope, secret, context, &parsed.to_bytes())?;
        let text = String::from_utf8(bytes.to_vec()).map_err(|e| {
            e.into_bytes().zeroize();
            CipherError::InvalidUtf8
        })?;
        let text = SecretText::new(text);
        scope.mark(&text);
        Ok(text)
    }

    /// Derive the key for `context`, build the cipher, run `op`, and destroy
    /// the key whatever the outcome.
    fn with_cipher<R>(
        &self,
        scope: &WipeScope,
        secret: &SecretText,
        context: &str,
        op: impl FnOnce(&Aes256Gcm) -> Result<R, CipherError>,
    ) -> Result<R, CipherError> {
        scope.mark(secret);
        let key = secret
            .expose(|s| kdf::derive(s.as_bytes(), context, self.label))
            .map_err(|_| CipherError::KeyDerivation)?;
        scope.mark(&key);
        let _destroy = DestroyOnDrop(&key);

        let cipher = key
            .with_bytes(|k| Aes256Gcm::new_from_slice(k))
            .ok_or(CipherError::KeyDestroyed)?
            .map_err(|_| CipherError::InvalidKeyLength)?;
        op(&cipher)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;
    use crate::crypto::{envelope::MIN_ENVELOPE_LEN, TAG_LEN};
    use crate::wipe::{WipeConfig, WipeRegistry};

    const SECRET: &str = "Jx7#qL2m!Vb9@rT4wZ8$kP1nC6";

    fn secret() -> SecretText {
        SecretText::new(SECRET)
    }

    fn scope() -> WipeScope {
        WipeScope::new()
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let cipher = FieldCipher::new();
        let scope = scope();
        let plaintext = b"123-45-6789";
        let envelope = cipher.encrypt(&scope, &secret(), "Customer.ssn", plaintext);
        assert_eq!(envelope.len(), NONCE_LEN + plaintext.len() + TAG_LEN);
        let decrypted = cipher.decrypt(&scope, &secret(), "Customer.ssn", &envelope);
        assert_eq!(decrypted.to_vec(), plaintext);
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let cipher = FieldCipher::new();
        let scope = scope();
        let envelope = cipher.encrypt(&scope, &secret(), "ctx", b"");
        assert_eq!(envelope.len(), MIN_ENVELOPE_LEN);
        assert!(cipher.try_decrypt(&scope, &secret(), "ctx", &envelope).unwrap().is_empty());
    }

    #[test]
    fn text_round_trip_uses_base64() {
        let cipher = FieldCipher::new();
        let scope = scope();
        let envelope = cipher.encrypt_text(&scope, &secret(), "Customer.email", "alice@example.com");
        assert!(Envelope::from_base64(&envelope).is_ok());
        let plain = cipher.decrypt_text(&scope, &secret(), "Customer.email", &envelope);
        plain.expose(|s| assert_eq!(s, "alice@example.com"));
    }

    #[test]
    fn nonces_are_unique() {
        let cipher = FieldCipher::new();
        let scope = scope();
        let secret = secret();
        let nonces: HashSet<Vec<u8>> = (0..1000)
            .map(|_| cipher.encrypt(&scope, &secret, "ctx", b"same plaintext")[..NONCE_LEN].to_vec())
            .collect();
        assert_eq!(nonces.len(), 1000);
    }

    #[test]
    fn wrong_context_returns_input_unchanged() {
        let cipher = FieldCipher::new();
        let scope = scope();
        let envelope = cipher.encrypt(&scope, &secret(), "Customer", b"secret");
        let out = cipher.decrypt(&scope, &secret(), "Invoice", &envelope);
        assert_eq!(out.to_vec(), envelope);
        assert!(matches!(
            cipher.try_decrypt(&scope, &secret(), "Invoice", &envelope),
            Err(CipherError::AeadFailure)
        ));
    }

    #[test]
    fn wrong_secret_returns_input_unchanged() {
        let cipher = FieldCipher::new();
        let scope = scope();
        let envelope = cipher.encrypt_text(&scope, &secret(), "ctx", "value");
        let other = SecretText::new("another-secret-of-enough-length");
        let out = cipher.decrypt_text(&scope, &other, "ctx", &envelope);
        out.expose(|s| assert_eq!(s, envelope));
    }

    #[test]
    fn truncated_envelope_returns_input_unchanged() {
        let cipher = FieldCipher::new();
        let scope = scope();
        let short = vec![1u8; MIN_ENVELOPE_LEN - 1];
        assert_eq!(cipher.decrypt(&scope, &secret(), "ctx", &short).to_vec(), short);
        let text = cipher.decrypt_text(&scope, &secret(), "ctx", "not an envelope");
        text.expose(|s| assert_eq!(s, "not an envelope"));
    }

    #[test]
    fn secrets_keys_and_plaintext_are_tracked() {
        let registry = WipeRegistry::new(WipeConfig::default()).unwrap();
        let cipher = FieldCipher::new();
        let scope = registry.begin();
        let secret = secret();

        let envelope = cipher.encrypt(&scope, &secret, "ctx", b"payload");
        let plaintext = cipher.decrypt(&scope, &secret, "ctx", &envelope);

        assert!(scope.is_tracked(&secret));
        assert!(scope.is_tracked(&plaintext));

        registry.flush(&scope);
        assert_eq!(plaintext.to_vec(), vec![0u8; 7]);
        assert!(secret.is_empty());
    }

    #[test]
    fn derived_key_does_not_outlive_the_call() {
        let registry = WipeRegistry::new(WipeConfig::default()).unwrap();
        let cipher = FieldCipher::new();
        let scope = registry.begin();
        let secret = secret();
        cipher.encrypt(&scope, &secret, "ctx", b"x");

        // Secret and derived key are tracked; only the secret is still alive.
        assert_eq!(scope.tracked_count(), 2);
        let report = registry.flush(&scope);
        assert_eq!(report.destroyed, 1);
        assert_eq!(report.expired, 1);
    }

    #[test]
    fn destroy_guard_clears_key() {
        let key = kdf::derive(SECRET.as_bytes(), "ctx", ENCRYPTION_KEY_LABEL).unwrap();
        {
            let _guard = DestroyOnDrop(&key);
        }
        assert!(key.is_destroyed());
    }

    #[test]
    fn custom_label_isolates_keys() {
        let scope = scope();
        let envelope = FieldCipher::with_label("index-key").encrypt(&scope, &secret(), "ctx", b"v");
        assert!(FieldCipher::new()
            .try_decrypt(&scope, &secret(), "ctx", &envelope)
            .is_err());
    }

    proptest! {
        #[test]
        fn round_trip_any_plaintext(plaintext in proptest::collection::vec(any::<u8>(), 0..512)) {
            let cipher = FieldCipher::new();
            let scope = scope();
            let envelope = cipher.encrypt(&scope, &secret(), "ctx", &plaintext);
            prop_assert_eq!(cipher.decrypt(&scope, &secret(), "ctx", &envelope).to_vec(), plaintext);
        }

        #[test]
        fn any_bit_flip_is_rejected(
            plaintext in proptest::collection::vec(any::<u8>(), 0..64),
            position in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let cipher = FieldCipher::new();
            let scope = scope();
            let mut envelope = cipher.encrypt(&scope, &secret(), "ctx", &plaintext);
            let idx = NONCE_LEN + position.index(envelope.len() - NONCE_LEN);
            envelope[idx] ^= 1 << bit;
            let out = cipher.decrypt(&scope, &secret(), "ctx", &envelope);
            prop_assert_eq!(out.to_vec(), envelope);
        }
    }
}
