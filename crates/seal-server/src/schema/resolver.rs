//! Encrypted field path resolution from OpenAPI schemas.
//!
//! Given a parsed [`openapiv3::OpenAPI`] document, this module produces, for
//! every component schema, the set of dot-notation paths to properties
//! annotated with `x-encrypted: true`.

use std::collections::{BTreeSet, HashMap};

use openapiv3::{OpenAPI, ReferenceOr, Schema, SchemaKind, Type};

/// Extension marking a property whose value is stored encrypted.
pub const ENCRYPTED_EXTENSION: &str = "x-encrypted";

/// A set of dot-notation field paths that are stored encrypted.
///
/// Example paths: `"ssn"`, `"address.zip"`, `"cards[].number"`. Ordered so
/// traversal and logging are deterministic.
pub type EncryptedFieldPaths = BTreeSet<String>;

/// Walk every schema in `components/schemas` and collect its encrypted paths,
/// keyed by component (entity type) name.
///
/// Array items are represented with the `[]` suffix on the array field name
/// (e.g. `"cards[].number"`). Components without encrypted fields are still
/// returned, with an empty set.
pub fn resolve_entity_fields(api: &OpenAPI) -> HashMap<String, EncryptedFieldPaths> {
    let Some(components) = &api.components else {
        return HashMap::new();
    };

    components
        .schemas
        .iter()
        .filter_map(|(name, schema_ref)| match schema_ref {
            ReferenceOr::Item(schema) => {
                let mut paths = EncryptedFieldPaths::new();
                walk_schema(schema, "", &mut paths);
                Some((name.clone(), paths))
            }
            ReferenceOr::Reference { .. } => None,
        })
        .collect()
}

/// Recursively walk a [`Schema`], appending discovered paths to `out`.
fn walk_schema(schema: &Schema, prefix: &str, out: &mut EncryptedFieldPaths) {
    match &schema.schema_kind {
        SchemaKind::Type(Type::Object(obj)) => {
            for (prop_name, prop_ref) in &obj.properties {
                let path = if prefix.is_empty() {
                    prop_name.clone()
                } else {
                    format!("{prefix}.{prop_name}")
                };

                if let ReferenceOr::Item(prop_schema) = prop_ref {
                    let encrypted = prop_schema
                        .schema_data
                        .extensions
                        .get(ENCRYPTED_EXTENSION)
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false);

                    if encrypted {
                        out.insert(path.clone());
                    }

                    walk_schema(prop_schema, &path, out);
                }
            }
        }
        SchemaKind::Type(Type::Array(arr)) => {
            if let Some(ReferenceOr::Item(items)) = &arr.items {
                let array_path = format!("{prefix}[]");
                let encrypted = items
                    .schema_data
                    .extensions
                    .get(ENCRYPTED_EXTENSION)
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                if encrypted && !prefix.is_empty() {
                    out.insert(array_path.clone());
                }
                walk_schema(items, &array_path, out);
            }
        }
        _ => {}
    }
}
