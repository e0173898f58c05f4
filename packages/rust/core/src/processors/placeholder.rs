//! Expands `$text`, `$json`, and `$yaml` placeholders inside entities.
//!
//! A placeholder is an object with exactly one key naming the resolver and a
//! string value naming the file, relative to the entity's own location:
//!
//! ```yaml
//! spec:
//!   definition:
//!     $text: ./openapi.yaml
//! ```

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use catalogloader_shared::{CatalogError, Entity, LocationSpec, Result};

use super::{LocationProcessor, LocationResolver, Transformed, resolve_relative};

/// How a placeholder turns the referenced bytes into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolver {
    Text,
    Json,
    Yaml,
}

impl Resolver {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "$text" => Some(Self::Text),
            "$json" => Some(Self::Json),
            "$yaml" => Some(Self::Yaml),
            _ => None,
        }
    }

    fn decode(self, data: &[u8], reference: &str) -> Result<Value> {
        match self {
            Self::Text => String::from_utf8(data.to_vec())
                .map(Value::String)
                .map_err(|e| CatalogError::parse(format!("{reference} is not UTF-8, {e}"))),
            Self::Json => serde_json::from_slice(data)
                .map_err(|e| CatalogError::parse(format!("{reference} is not valid JSON, {e}"))),
            Self::Yaml => serde_yaml::from_slice(data)
                .map_err(|e| CatalogError::parse(format!("{reference} is not valid YAML, {e}"))),
        }
    }
}

/// A placeholder found in the entity tree.
struct Placeholder {
    pointer: String,
    resolver: Resolver,
    reference: String,
}

pub struct PlaceholderProcessor;

impl PlaceholderProcessor {
    /// Collect every placeholder under `value`, depth first.
    fn collect(value: &Value, pointer: &str, found: &mut Vec<Placeholder>) -> Result<()> {
        match value {
            Value::Object(map) => {
                if map.len() == 1 {
                    if let Some((key, inner)) = map.iter().next() {
                        if let Some(resolver) = Resolver::from_key(key) {
                            let Value::String(reference) = inner else {
                                return Err(CatalogError::validation(format!(
                                    "Placeholder {key} at {pointer} expects a string value"
                                )));
                            };
                            found.push(Placeholder {
                                pointer: pointer.to_string(),
                                resolver,
                                reference: reference.clone(),
                            });
                            return Ok(());
                        }
                    }
                }
                for (key, inner) in map {
                    Self::collect(inner, &format!("{pointer}/{}", escape(key)), found)?;
                }
            }
            Value::Array(items) => {
                for (i, inner) in items.iter().enumerate() {
                    Self::collect(inner, &format!("{pointer}/{i}"), found)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// JSON pointer escaping of one reference token.
fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

#[async_trait]
impl LocationProcessor for PlaceholderProcessor {
    fn name(&self) -> &str {
        "PlaceholderProcessor"
    }

    async fn process_entity(
        &self,
        entity: &Entity,
        location: &LocationSpec,
        resolver: &dyn LocationResolver,
    ) -> Result<Transformed> {
        let mut value = entity.to_value()?;

        let mut found = Vec::new();
        Self::collect(&value, "", &mut found)?;
        if found.is_empty() {
            return Ok(Transformed::unchanged());
        }

        for placeholder in found {
            let target =
                resolve_relative(location, &location.location_type, &placeholder.reference)?;
            let source = LocationSpec::new(&location.location_type, target);
            debug!(%source, pointer = %placeholder.pointer, "resolving placeholder");

            let data = resolver.read_location(&source).await?;
            let resolved = placeholder.resolver.decode(&data, &placeholder.reference)?;
            if let Some(slot) = value.pointer_mut(&placeholder.pointer) {
                *slot = resolved;
            }
        }

        Ok(Transformed::replaced(Entity::from_value(value)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::testing::MapResolver;
    use serde_json::json;

    fn entity(spec: Value) -> Entity {
        Entity::from_value(json!({
            "apiVersion": "catalog/v1",
            "kind": "API",
            "metadata": { "name": "petstore" },
            "spec": spec
        }))
        .unwrap()
    }

    fn location() -> LocationSpec {
        LocationSpec::new("url", "https://example.com/apis/catalog-info.yaml")
    }

    #[tokio::test]
    async fn replaces_placeholders() {
        let resolver = MapResolver::default()
            .with("url:https://example.com/apis/openapi.yaml", "openapi: 3.0.0\n")
            .with("url:https://example.com/shared/owners.json", r#"["a","b"]"#)
            .with("url:https://example.com/apis/meta.yaml", "tier: 1\n");

        let input = entity(json!({
            "definition": { "$text": "./openapi.yaml" },
            "owners": { "$json": "../shared/owners.json" },
            "nested": [{ "meta": { "$yaml": "meta.yaml" } }],
            "untouched": { "$other": "x" }
        }));

        let out = PlaceholderProcessor
            .process_entity(&input, &location(), &resolver)
            .await
            .unwrap();
        let spec = out.entity.unwrap().spec.unwrap();
        assert_eq!(spec["definition"], "openapi: 3.0.0\n");
        assert_eq!(spec["owners"], json!(["a", "b"]));
        assert_eq!(spec["nested"][0]["meta"], json!({ "tier": 1 }));
        assert_eq!(spec["untouched"], json!({ "$other": "x" }));
    }

    #[tokio::test]
    async fn entity_without_placeholders_is_unchanged() {
        let input = entity(json!({ "type": "openapi" }));
        let out = PlaceholderProcessor
            .process_entity(&input, &location(), &MapResolver::default())
            .await
            .unwrap();
        assert!(out.entity.is_none());
        assert!(out.emitted.is_empty());
    }

    #[tokio::test]
    async fn non_string_reference_fails() {
        let input = entity(json!({ "definition": { "$text": 3 } }));
        let err = PlaceholderProcessor
            .process_entity(&input, &location(), &MapResolver::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { .. }));
    }

    #[tokio::test]
    async fn unreadable_reference_fails() {
        let input = entity(json!({ "definition": { "$text": "missing.yaml" } }));
        let err = PlaceholderProcessor
            .process_entity(&input, &location(), &MapResolver::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn pointer_tokens_are_escaped() {
        assert_eq!(escape("a/b~c"), "a~1b~0c");
    }
}
