//! Core domain types: locations and catalog entities.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CatalogError, Result};

/// Namespace assumed for entities that do not declare one.
pub const ENTITY_DEFAULT_NAMESPACE: &str = "default";

/// Annotation recording which location an entity was read from.
pub const LOCATION_ANNOTATION: &str = "catalog/managed-by-location";

/// Annotation pointing an API entity at an external definition document.
pub const DEFINITION_AT_LOCATION_ANNOTATION: &str = "catalog/definition-at-location";

// ---------------------------------------------------------------------------
// LocationSpec
// ---------------------------------------------------------------------------

/// A typed reference to an external resource to ingest.
///
/// `location_type` selects the processor family (`url`, `file`, `ldap-org`,
/// `bootstrap`, ...); `target` is opaque to everything but that family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationSpec {
    #[serde(rename = "type")]
    pub location_type: String,
    pub target: String,
}

impl LocationSpec {
    pub fn new(location_type: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            location_type: location_type.into(),
            target: target.into(),
        }
    }

    /// Parse the `<type>:<target>` form used in annotations.
    pub fn parse_ref(reference: &str) -> Result<Self> {
        match reference.split_once(':') {
            Some((location_type, target)) if !location_type.is_empty() && !target.is_empty() => {
                Ok(Self::new(location_type, target))
            }
            _ => Err(CatalogError::validation(format!(
                "unable to parse location reference '{reference}', expected '<type>:<target>'"
            ))),
        }
    }
}

impl fmt::Display for LocationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.location_type, self.target)
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// Identity and bookkeeping metadata of an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Any further metadata fields, carried through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A normalized catalog record.
///
/// The pipeline only cares about `kind` and the `(namespace, name)` identity;
/// everything else rides along in `spec` and `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: EntityMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Entity {
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            metadata: EntityMeta {
                name: name.into(),
                ..EntityMeta::default()
            },
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Declared namespace, or [`ENTITY_DEFAULT_NAMESPACE`].
    pub fn namespace(&self) -> &str {
        self.metadata
            .namespace
            .as_deref()
            .unwrap_or(ENTITY_DEFAULT_NAMESPACE)
    }

    /// `kind:namespace/name`, used in log lines and error messages.
    pub fn ref_string(&self) -> String {
        format!("{}:{}/{}", self.kind, self.namespace(), self.name())
    }

    /// Build an entity from an arbitrary JSON object.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| CatalogError::validation(format!("malformed entity, {e}")))
    }

    /// Serialize the entity into a JSON object.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| CatalogError::validation(format!("unable to serialize entity, {e}")))
    }

    /// Mutable access to `spec` as an object, creating it when absent.
    ///
    /// Fails when `spec` exists but is not an object.
    pub fn spec_object_mut(&mut self) -> Result<&mut serde_json::Map<String, Value>> {
        let spec = self
            .spec
            .get_or_insert_with(|| Value::Object(serde_json::Map::new()));
        spec.as_object_mut()
            .ok_or_else(|| CatalogError::validation("entity spec is not an object"))
    }
}
