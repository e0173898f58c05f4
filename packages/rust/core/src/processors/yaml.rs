//! Parses YAML data into entities, one per document.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use catalogloader_shared::{CatalogError, Entity, LocationSpec, ProcessorResult, Result};

use super::{Claim, LocationProcessor};

pub struct YamlProcessor;

/// Whether `target` names a YAML file, either by its path or by a `path`
/// query parameter (as Azure DevOps addresses do).
fn is_yaml_target(target: &str) -> bool {
    let is_yaml = |s: &str| s.ends_with(".yaml") || s.ends_with(".yml");

    let without_fragment = target.split('#').next().unwrap_or(target);
    let (path, query) = match without_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (without_fragment, None),
    };
    if is_yaml(path) {
        return true;
    }
    query.is_some_and(|q| {
        q.split('&')
            .filter_map(|pair| pair.split_once('='))
            .any(|(key, value)| key == "path" && is_yaml(value))
    })
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl LocationProcessor for YamlProcessor {
    fn name(&self) -> &str {
        "YamlProcessor"
    }

    async fn parse_data(&self, data: &[u8], location: &LocationSpec) -> Result<Claim> {
        if !is_yaml_target(&location.target) {
            return Ok(Claim::Declined);
        }

        let mut items = Vec::new();
        for document in serde_yaml::Deserializer::from_slice(data) {
            let value = match Value::deserialize(document) {
                Ok(value) => value,
                Err(e) => {
                    items.push(ProcessorResult::error(
                        location,
                        CatalogError::parse(format!("YAML error, {e}")),
                    ));
                    break;
                }
            };

            match value {
                Value::Null => {}
                Value::Object(_) => match Entity::from_value(value) {
                    Ok(entity) => items.push(ProcessorResult::entity(location, entity)),
                    Err(e) => items.push(ProcessorResult::error(location, e)),
                },
                other => items.push(ProcessorResult::error(
                    location,
                    CatalogError::validation(format!(
                        "Expected object at root, got {}",
                        describe(&other)
                    )),
                )),
            }
        }
        Ok(Claim::Handled(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn parse(target: &str, text: &str) -> Claim {
        let location = LocationSpec::new("url", target);
        YamlProcessor
            .parse_data(text.as_bytes(), &location)
            .await
            .unwrap()
    }

    fn handled(claim: Claim) -> Vec<ProcessorResult> {
        match claim {
            Claim::Handled(items) => items,
            Claim::Declined => panic!("data should be claimed"),
        }
    }

    #[test]
    fn recognises_yaml_targets() {
        assert!(is_yaml_target("https://example.com/a/catalog-info.yaml"));
        assert!(is_yaml_target("/srv/catalog.yml"));
        assert!(is_yaml_target("https://example.com/a.yaml?ref=main#L3"));
        assert!(is_yaml_target(
            "https://dev.azure.com/o/p/_git/r?path=/catalog.yaml&version=GBmain"
        ));
        assert!(!is_yaml_target("https://example.com/a.json"));
        assert!(!is_yaml_target("https://dev.azure.com/o/p/_git/r?path=/a.json"));
    }

    #[tokio::test]
    async fn parses_multiple_documents() {
        let text = "\
apiVersion: catalog/v1
kind: Component
metadata:
  name: a
---
---
apiVersion: catalog/v1
kind: Group
metadata:
  name: b
";
        let items = handled(parse("https://example.com/all.yaml", text).await);
        let names: Vec<&str> = items
            .iter()
            .map(|item| match item {
                ProcessorResult::Entity { entity, .. } => entity.name(),
                other => panic!("unexpected {}", other.kind()),
            })
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn non_object_root_is_an_error() {
        let items = handled(parse("https://example.com/a.yaml", "- a\n- b\n").await);
        assert!(matches!(
            &items[..],
            [ProcessorResult::Error { error: CatalogError::Validation { message }, .. }]
                if message.contains("got array")
        ));
    }

    #[tokio::test]
    async fn syntax_error_is_a_single_parse_error() {
        let items = handled(parse("https://example.com/a.yaml", "kind: [unclosed\n").await);
        assert!(matches!(
            &items[..],
            [ProcessorResult::Error { error: CatalogError::Parse { .. }, .. }]
        ));
    }

    #[tokio::test]
    async fn declines_other_formats() {
        let claim = parse("https://example.com/a.json", "{}").await;
        assert!(!claim.is_handled());
    }
}
