//! Request and response types for the HTTP API.
//!
//! All bodies are JSON. Envelopes travel as standard padded base64.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Field encryption
// ---------------------------------------------------------------------------

/// Request body for `POST /encrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptRequest {
    /// Usage context the key is bound to (e.g. `"Customer.ssn"`).
    pub context: String,
    /// Text to encrypt.
    pub plaintext: String,
}

/// Successful response body for `POST /encrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptResponse {
    /// Base64 `nonce || ciphertext || tag`.
    pub envelope: String,
}

/// Request body for `POST /decrypt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptRequest {
    /// Usage context the envelope was encrypted under.
    pub context: String,
    /// Base64 envelope.
    pub envelope: String,
}

/// Response body for `POST /decrypt`.
///
/// When decryption fails the `plaintext` is the submitted envelope unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptResponse {
    pub plaintext: String,
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Response body for `POST /hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashResponse {
    /// Lowercase hex SHA-512 of the request body.
    pub digest: String,
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Request body for `POST /documents/{entity_type}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDocumentRequest {
    /// JSON object whose configured fields are encrypted before storage.
    pub payload: serde_json::Value,
}

/// Successful response body for `POST /documents/{entity_type}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDocumentResponse {
    pub id: String,
}

/// Response body for `GET /documents/{entity_type}/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub id: String,
    /// The stored document with encrypted fields decrypted.
    pub payload: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"bad_request"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status: `"ok"` or `"degraded"`.
    pub status: String,
    /// Whether the master secret is set.
    pub master_secret_ready: bool,
    /// Number of document repositories registered.
    pub repositories: usize,
}
