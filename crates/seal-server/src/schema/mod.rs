//! Entity type discovery from OpenAPI documents on local disk.
//!
//! # Responsibilities
//!
//! - Read every `.yaml`, `.yml` and `.json` file in the configured directory
//!   once at startup.
//! - Treat every component schema as an entity type and index the properties
//!   annotated with `x-encrypted: true`.
//!
//! # Module invariants
//!
//! - **No crypto dependencies.** This module must not import anything from
//!   `seal_core::crypto`.
//! - The result is static for the process lifetime; there is no refresh.

pub mod resolver;

pub use resolver::EncryptedFieldPaths;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use openapiv3::OpenAPI;
use tracing::{info, warn};

/// Load every OpenAPI document in `dir` and return each entity type with its
/// encrypted field paths.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed, a file cannot be read,
/// a file is neither valid YAML nor JSON, or two documents define the same
/// entity type.
pub async fn load_dir(dir: &Path) -> Result<HashMap<String, EncryptedFieldPaths>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("failed to list schema directory {}", dir.display()))?;

    let mut entities: HashMap<String, EncryptedFieldPaths> = HashMap::new();
    let mut files = 0usize;

    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed to read schema directory {}", dir.display()))?
    {
        let path = entry.path();
        if !is_schema_file(&path) {
            continue;
        }

        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read schema file {}", path.display()))?;
        let api = parse_document(&text)
            .with_context(|| format!("failed to parse OpenAPI schema {}", path.display()))?;

        for (entity, fields) in resolver::resolve_entity_fields(&api) {
            if entities.contains_key(&entity) {
                anyhow::bail!("entity type {entity} defined more than once (in {})", path.display());
            }
            info!(entity = %entity, encrypted_fields = fields.len(), file = %path.display(), "loaded entity type");
            entities.insert(entity, fields);
        }
        files += 1;
    }

    if files == 0 {
        warn!(dir = %dir.display(), "no schema files found");
    }
    Ok(entities)
}

/// Parse an OpenAPI document as YAML, falling back to JSON.
fn parse_document(text: &str) -> Result<OpenAPI> {
    if let Ok(parsed) = serde_yaml::from_str(text) {
        return Ok(parsed);
    }
    serde_json::from_str(text).context("not valid YAML or JSON")
}

fn is_schema_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml" | "json")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_file_extensions() {
        assert!(is_schema_file(Path::new("schemas/customers.yaml")));
        assert!(is_schema_file(Path::new("schemas/customers.yml")));
        assert!(is_schema_file(Path::new("customers.json")));
        assert!(!is_schema_file(Path::new("README.md")));
        assert!(!is_schema_file(Path::new("bare")));
    }

    #[test]
    fn json_documents_parse() {
        let api = parse_document(
            r#"{"openapi":"3.0.0","info":{"title":"t","version":"1"},"paths":{}}"#,
        )
        .unwrap();
        assert!(api.components.is_none());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_document("{ not: [valid").is_err());
    }

    #[tokio::test]
    async fn loads_directory_and_rejects_duplicates() {
        let dir = std::env::temp_dir().join(format!("field-seal-schemas-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let doc = r#"
openapi: "3.0.0"
info: {title: t, version: "1"}
paths: {}
components:
  schemas:
    Customer:
      type: object
      properties:
        ssn: {type: string, x-encrypted: true}
"#;
        tokio::fs::write(dir.join("customers.yaml"), doc).await.unwrap();
        tokio::fs::write(dir.join("notes.txt"), "ignored").await.unwrap();

        let entities = load_dir(&dir).await.unwrap();
        assert_eq!(entities.len(), 1);
        assert!(entities["Customer"].contains("ssn"));

        tokio::fs::write(dir.join("again.yml"), doc).await.unwrap();
        assert!(load_dir(&dir).await.is_err());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
