//! [`DocumentCollection`]: the repository for one entity type.

use std::collections::HashMap;
use std::sync::Arc;

use seal_core::crypto::hash;
use seal_core::{CipherError, FieldCipher, Repository, SecretText, WipeScope};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;
use zeroize::Zeroize;

use super::fields::for_each_field;
use crate::schema::EncryptedFieldPaths;

/// A document as held in memory: encrypted fields are envelopes.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub payload: Value,
    /// SHA-512 of `payload` at insert time, when integrity checks are enabled.
    pub digest: Option<String>,
}

/// In-memory repository for the documents of a single entity type.
///
/// Cloning shares the underlying storage.
#[derive(Debug, Clone)]
pub struct DocumentCollection {
    entity_type: Arc<str>,
    encrypted_fields: Arc<EncryptedFieldPaths>,
    documents: Arc<RwLock<HashMap<Uuid, StoredDocument>>>,
}

impl Repository for DocumentCollection {
    fn entity_type(&self) -> &str {
        &self.entity_type
    }
}

impl DocumentCollection {
    pub fn new(entity_type: impl Into<String>, encrypted_fields: EncryptedFieldPaths) -> Self {
        Self {
            entity_type: Arc::from(entity_type.into()),
            encrypted_fields: Arc::new(encrypted_fields),
            documents: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Key derivation context for the field at `path`.
    pub fn field_context(&self, path: &str) -> String {
        format!("{}.{path}", self.entity_type)
    }

    /// Encrypt every configured field of `payload` in place.
    ///
    /// The replaced plaintext is zeroized. Returns the number of fields
    /// encrypted.
    ///
    /// # Errors
    ///
    /// Returns the first [`CipherError`]; fields already encrypted at that
    /// point stay encrypted.
    pub fn seal(
        &self,
        cipher: &FieldCipher,
        scope: &WipeScope,
        secret: &SecretText,
        payload: &mut Value,
    ) -> Result<usize, CipherError> {
        for_each_field(payload, self.encrypted_fields.iter(), |path, leaf| -> Result<(), CipherError> {
            let envelope =
                cipher.try_encrypt_text(scope, secret, &self.field_context(path), leaf.as_str())?;
            leaf.zeroize();
            *leaf = envelope;
            Ok(())
        })
    }

    /// Decrypt every configured field of `payload` in place.
    ///
    /// A field that fails to decrypt is left as stored. Returns the number of
    /// fields visited.
    pub fn open(
        &self,
        cipher: &FieldCipher,
        scope: &WipeScope,
        secret: &SecretText,
        payload: &mut Value,
    ) -> usize {
        let visited = for_each_field(payload, self.encrypted_fields.iter(), |path, leaf| {
            let plaintext = cipher.decrypt_text(scope, secret, &self.field_context(path), leaf.as_str());
            *leaf = plaintext.expose(str::to_owned);
            Ok::<_, std::convert::Infallible>(())
        });
        visited.unwrap_or_else(|never| match never {})
    }

    /// Store a document under a fresh id.
    pub async fn insert(&self, document: StoredDocument) -> Uuid {
        let id = Uuid::new_v4();
        self.documents.write().await.insert(id, document);
        id
    }

    /// Fetch a stored document.
    pub async fn get(&self, id: &Uuid) -> Option<StoredDocument> {
        self.documents.read().await.get(id).cloned()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    #[cfg(test)]
    pub(crate) async fn replace(&self, id: Uuid, document: StoredDocument) {
        self.documents.write().await.insert(id, document);
    }
}

/// Integrity digest of a stored document.
///
/// Serialises `payload` and hashes it, streaming when the serialised form is
/// larger than `threshold` bytes.
///
/// # Errors
///
/// Returns an error if `payload` cannot be serialised.
pub fn digest(payload: &Value, threshold: u64) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(payload)?;
    Ok(hash::hash_auto(&bytes, threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use seal_core::{MasterSecretHolder, WipeConfig, WipeRegistry};
    use serde_json::json;

    const SECRET: &str = "Jx7#qL2m!Vb9@rT4wZ8$kP1nC6";

    fn customers() -> DocumentCollection {
        let fields = ["ssn", "cards[].number"].iter().map(|s| s.to_string()).collect();
        DocumentCollection::new("Customer", fields)
    }

    fn secret(scope: &WipeScope) -> SecretText {
        let holder = MasterSecretHolder::new();
        holder.set(SECRET).unwrap();
        holder.get(scope).unwrap()
    }

    #[test]
    fn field_context_joins_entity_and_path() {
        assert_eq!(customers().field_context("cards[].number"), "Customer.cards[].number");
        assert_eq!(customers().entity_type(), "Customer");
    }

    #[test]
    fn seal_then_open_restores_document() {
        let registry = WipeRegistry::new(WipeConfig::default()).unwrap();
        let scope = registry.begin();
        let secret = secret(&scope);
        let repo = customers();
        let cipher = FieldCipher::new();
        let original = json!({
            "name": "Alice",
            "ssn": "123-45-6789",
            "cards": [{"number": "4111111111111111"}, {"number": "5500000000000004"}]
        });

        let mut doc = original.clone();
        assert_eq!(repo.seal(&cipher, &scope, &secret, &mut doc).unwrap(), 3);
        assert_eq!(doc["name"], "Alice");
        assert_ne!(doc["ssn"], original["ssn"]);
        assert_ne!(doc["cards"][0]["number"], original["cards"][0]["number"]);

        assert_eq!(repo.open(&cipher, &scope, &secret, &mut doc), 3);
        assert_eq!(doc, original);
        registry.flush(&scope);
    }

    #[test]
    fn envelopes_are_bound_to_their_field() {
        let scope = WipeRegistry::new(WipeConfig::default()).unwrap().begin();
        let secret = secret(&scope);
        let cipher = FieldCipher::new();
        let repo = customers();

        let mut doc = json!({"ssn": "123-45-6789"});
        repo.seal(&cipher, &scope, &secret, &mut doc).unwrap();
        let sealed_ssn = doc["ssn"].clone();

        // Moving the envelope to another field must not decrypt it.
        let mut moved = json!({"cards": [{"number": sealed_ssn.clone()}]});
        repo.open(&cipher, &scope, &secret, &mut moved);
        assert_eq!(moved["cards"][0]["number"], sealed_ssn);
    }

    #[tokio::test]
    async fn insert_and_get() {
        let repo = customers();
        let doc = StoredDocument {
            payload: json!({"name": "Bob"}),
            digest: None,
        };
        let id = repo.insert(doc.clone()).await;
        assert_eq!(repo.get(&id).await, Some(doc));
        assert_eq!(repo.get(&Uuid::new_v4()).await, None);
        assert_eq!(repo.len().await, 1);
    }

    #[test]
    fn digest_is_stable_and_sensitive() {
        let a = digest(&json!({"x": 1, "y": "two"}), 1024).unwrap();
        let b = digest(&json!({"y": "two", "x": 1}), 1024).unwrap();
        let c = digest(&json!({"x": 2, "y": "two"}), 1024).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 128);
    }
}
