//! Processor contract and the built-in processors.
//!
//! A processor implements any subset of four capabilities: reading a
//! location, parsing data, transforming an entity, and reacting to an error.
//! The driver walks processors in registration order; location, data, and
//! error items go to the first processor that claims them, entities pass
//! through every processor's transform in turn.

mod annotate_location;
mod definition_at_location;
mod entity_policy;
mod file;
mod ldap_org;
mod location_ref;
mod placeholder;
mod static_location;
mod url_reader;
mod yaml;

use async_trait::async_trait;

use catalogloader_shared::{CatalogError, Entity, LocationSpec, ProcessorResult, Result};

pub use annotate_location::AnnotateLocationEntityProcessor;
pub use definition_at_location::DefinitionAtLocationProcessor;
pub use entity_policy::EntityPolicyProcessor;
pub use file::FileReaderProcessor;
pub use ldap_org::LdapOrgReaderProcessor;
pub use location_ref::LocationRefProcessor;
pub use placeholder::PlaceholderProcessor;
pub use static_location::StaticLocationProcessor;
pub use url_reader::UrlReaderProcessor;
pub use yaml::YamlProcessor;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Outcome of offering an item to a first-claim capability.
#[derive(Debug)]
pub enum Claim {
    /// Not this processor's item; the driver moves on.
    Declined,
    /// Claimed; the items go to the next round (possibly none).
    Handled(Vec<ProcessorResult>),
}

impl Claim {
    pub fn handled(item: ProcessorResult) -> Self {
        Self::Handled(vec![item])
    }

    #[cfg(test)]
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled(_))
    }
}

/// Outcome of one transform step.
#[derive(Debug, Default)]
pub struct Transformed {
    /// Replacement entity; `None` keeps the current one.
    pub entity: Option<Entity>,
    /// Items for the next round.
    pub emitted: Vec<ProcessorResult>,
}

impl Transformed {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn replaced(entity: Entity) -> Self {
        Self {
            entity: Some(entity),
            emitted: Vec::new(),
        }
    }

    pub fn emit(mut self, item: ProcessorResult) -> Self {
        self.emitted.push(item);
        self
    }
}

/// Reads a single location to completion, out of band from the round queue.
///
/// Handed to transforms that need auxiliary content. Exactly one data item
/// must come out of the read; anything else is an error.
#[async_trait]
pub trait LocationResolver: Send + Sync {
    async fn read_location(&self, location: &LocationSpec) -> Result<Vec<u8>>;
}

/// A pipeline stage.
///
/// Every capability has a default that declines or leaves the entity alone,
/// so processors only override what they take part in. Returning `Err` never
/// aborts a run: the driver turns it into an error item and carries on.
#[async_trait]
pub trait LocationProcessor: Send + Sync {
    /// Name used in logs and downgraded error messages.
    fn name(&self) -> &str;

    async fn read_location(&self, _location: &LocationSpec, _optional: bool) -> Result<Claim> {
        Ok(Claim::Declined)
    }

    async fn parse_data(&self, _data: &[u8], _location: &LocationSpec) -> Result<Claim> {
        Ok(Claim::Declined)
    }

    async fn process_entity(
        &self,
        _entity: &Entity,
        _location: &LocationSpec,
        _resolver: &dyn LocationResolver,
    ) -> Result<Transformed> {
        Ok(Transformed::unchanged())
    }

    async fn handle_error(&self, _error: &CatalogError, _location: &LocationSpec) -> Result<Claim> {
        Ok(Claim::Declined)
    }
}

// ---------------------------------------------------------------------------
// Helpers shared by processors
// ---------------------------------------------------------------------------

/// Resolve `target` of `location_type` relative to the location it was
/// found in. Only same-type `url` and `file` references are rewritten.
pub(crate) fn resolve_relative(
    origin: &LocationSpec,
    location_type: &str,
    target: &str,
) -> Result<String> {
    if origin.location_type != location_type {
        return Ok(target.to_string());
    }
    match location_type {
        "url" => {
            let base = url::Url::parse(&origin.target)
                .map_err(|e| CatalogError::invalid_location(&origin.target, e.to_string()))?;
            let joined = base
                .join(target)
                .map_err(|e| CatalogError::invalid_location(target, e.to_string()))?;
            Ok(joined.to_string())
        }
        "file" => {
            let base = std::path::Path::new(&origin.target);
            let dir = base.parent().unwrap_or_else(|| std::path::Path::new(""));
            Ok(dir.join(target).to_string_lossy().into_owned())
        }
        _ => Ok(target.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Test doubles shared by processor tests.

    use std::collections::HashMap;

    use super::*;

    /// Resolver serving canned bytes keyed by `type:target`.
    #[derive(Default)]
    pub struct MapResolver {
        pub files: HashMap<String, Vec<u8>>,
    }

    impl MapResolver {
        pub fn with(mut self, location: &str, content: &str) -> Self {
            self.files
                .insert(location.to_string(), content.as_bytes().to_vec());
            self
        }
    }

    #[async_trait]
    impl LocationResolver for MapResolver {
        async fn read_location(&self, location: &LocationSpec) -> Result<Vec<u8>> {
            self.files
                .get(&location.to_string())
                .cloned()
                .ok_or_else(|| CatalogError::NotFound(location.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_url_targets() {
        let origin = LocationSpec::new("url", "https://example.com/org/catalog/all.yaml");
        assert_eq!(
            resolve_relative(&origin, "url", "./team/a.yaml").unwrap(),
            "https://example.com/org/catalog/team/a.yaml"
        );
        assert_eq!(
            resolve_relative(&origin, "url", "https://other.net/b.yaml").unwrap(),
            "https://other.net/b.yaml"
        );
        assert_eq!(
            resolve_relative(&origin, "file", "b.yaml").unwrap(),
            "b.yaml"
        );
    }

    #[test]
    fn relative_file_targets() {
        let origin = LocationSpec::new("file", "/srv/catalog/all.yaml");
        assert_eq!(
            resolve_relative(&origin, "file", "team/a.yaml").unwrap(),
            "/srv/catalog/team/a.yaml"
        );
        assert_eq!(
            resolve_relative(&origin, "file", "/abs/b.yaml").unwrap(),
            "/abs/b.yaml"
        );
    }
}
