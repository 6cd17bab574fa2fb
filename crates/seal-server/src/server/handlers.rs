//! Axum request handlers for all service endpoints.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use common::protocol::{
    DecryptRequest, DecryptResponse, DocumentResponse, EncryptRequest, EncryptResponse,
    ErrorResponse, HashResponse, HealthResponse, StoreDocumentRequest, StoreDocumentResponse,
};
use common::ServiceError;
use seal_core::crypto::hash::hash_auto;
use seal_core::{SecretText, WipeScope};
use tracing::{info, warn};
use uuid::Uuid;

use super::state::AppState;
use crate::documents::{collection, DocumentCollection, StoredDocument};

/// A [`ServiceError`] rendered as a JSON [`ErrorResponse`].
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse::new(self.0.code(), self.0.to_string());
        (status, Json(body)).into_response()
    }
}

/// Copy of the master secret tracked by `scope`, or 503 if none is set.
fn master_secret(state: &AppState, scope: &WipeScope) -> Result<SecretText, ApiError> {
    state
        .master
        .get(scope)
        .map_err(|e| ServiceError::Unavailable(e.to_string()).into())
}

fn repository(state: &AppState, entity_type: &str) -> Result<std::sync::Arc<DocumentCollection>, ApiError> {
    state
        .repositories
        .resolve(entity_type)
        .map_err(|e| ServiceError::NotFound(e.to_string()).into())
}

fn require_context(context: &str) -> Result<(), ApiError> {
    if context.trim().is_empty() {
        return Err(ServiceError::BadRequest("context must not be empty".into()).into());
    }
    Ok(())
}

/// `POST /encrypt` — encrypt one value under the master secret.
pub async fn encrypt(
    State(state): State<AppState>,
    Extension(scope): Extension<WipeScope>,
    Json(req): Json<EncryptRequest>,
) -> Result<Json<EncryptResponse>, ApiError> {
    require_context(&req.context)?;
    let plaintext = SecretText::new(req.plaintext);
    scope.mark(&plaintext);
    let secret = master_secret(&state, &scope)?;

    let envelope = plaintext
        .expose(|p| state.cipher.try_encrypt_text(&scope, &secret, &req.context, p))
        .map_err(|e| {
            warn!(context = %req.context, error = %e, "encryption failed");
            ServiceError::EncryptionFailure("encryption failed".into())
        })?;

    Ok(Json(EncryptResponse { envelope }))
}

/// `POST /decrypt` — decrypt one envelope under the master secret.
///
/// A value that fails to decrypt is echoed back unchanged.
pub async fn decrypt(
    State(state): State<AppState>,
    Extension(scope): Extension<WipeScope>,
    Json(req): Json<DecryptRequest>,
) -> Result<Json<DecryptResponse>, ApiError> {
    require_context(&req.context)?;
    let secret = master_secret(&state, &scope)?;
    let plaintext = state
        .cipher
        .decrypt_text(&scope, &secret, &req.context, &req.envelope);
    Ok(Json(DecryptResponse {
        plaintext: plaintext.expose(str::to_owned),
    }))
}

/// `POST /hash` — SHA-512 of the raw request body.
pub async fn hash(State(state): State<AppState>, body: Bytes) -> Json<HashResponse> {
    Json(HashResponse {
        digest: hash_auto(&body, state.storage_threshold_bytes),
    })
}

/// `POST /documents/{entity_type}` — encrypt configured fields and store.
pub async fn store_document(
    State(state): State<AppState>,
    Extension(scope): Extension<WipeScope>,
    Path(entity_type): Path<String>,
    Json(req): Json<StoreDocumentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = repository(&state, &entity_type)?;
    if !req.payload.is_object() {
        return Err(ServiceError::BadRequest("document must be a JSON object".into()).into());
    }
    let secret = master_secret(&state, &scope)?;

    let mut payload = req.payload;
    repo.seal(&state.cipher, &scope, &secret, &mut payload)
        .map_err(|e| {
            warn!(entity = %entity_type, error = %e, "document encryption failed");
            ServiceError::EncryptionFailure("encryption failed".into())
        })?;

    let digest = if state.integrity_check_enabled {
        Some(
            collection::digest(&payload, state.storage_threshold_bytes)
                .map_err(|e| ServiceError::Internal(e.to_string()))?,
        )
    } else {
        None
    };

    let id = repo.insert(StoredDocument { payload, digest }).await;
    info!(entity = %entity_type, %id, "document stored");
    Ok((
        StatusCode::CREATED,
        Json(StoreDocumentResponse { id: id.to_string() }),
    ))
}

/// `GET /documents/{entity_type}/{id}` — verify, decrypt and return a document.
pub async fn get_document(
    State(state): State<AppState>,
    Extension(scope): Extension<WipeScope>,
    Path((entity_type, id)): Path<(String, String)>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| ServiceError::BadRequest(format!("invalid document id: {id}")))?;
    let repo = repository(&state, &entity_type)?;
    let stored = repo
        .get(&id)
        .await
        .ok_or_else(|| ServiceError::NotFound(format!("{entity_type} document {id}")))?;

    if state.integrity_check_enabled {
        if let Some(expected) = &stored.digest {
            let actual = collection::digest(&stored.payload, state.storage_threshold_bytes)
                .map_err(|e| ServiceError::Internal(e.to_string()))?;
            if &actual != expected {
                warn!(entity = %entity_type, %id, "document digest mismatch");
                return Err(ServiceError::IntegrityFailure(format!(
                    "{entity_type} document {id} was modified"
                ))
                .into());
            }
        }
    }

    let secret = master_secret(&state, &scope)?;
    let mut payload = stored.payload;
    repo.open(&state.cipher, &scope, &secret, &mut payload);
    Ok(Json(DocumentResponse {
        id: id.to_string(),
        payload,
    }))
}

/// `GET /health` — liveness and readiness check.
///
/// Returns `200 OK` once the master secret is set, `503 Service Unavailable`
/// otherwise.
pub async fn health(State(state): State<AppState>) -> Response {
    let master_secret_ready = state.master.is_ready();
    let repositories = state.repositories.registered();

    let (status_code, status_str) = if master_secret_ready {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let body = HealthResponse {
        status: status_str.into(),
        master_secret_ready,
        repositories,
    };
    (status_code, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}
