//! Rejects entities whose envelope or identity is malformed.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use catalogloader_shared::{CatalogError, Entity, LocationSpec, Result};

use super::{LocationProcessor, LocationResolver, Transformed};

const MAX_NAME_LENGTH: usize = 63;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([-_.A-Za-z0-9]*[A-Za-z0-9])?$").expect("valid regex")
});

fn check_name(field: &str, value: &str) -> Result<()> {
    if value.len() > MAX_NAME_LENGTH || !NAME_RE.is_match(value) {
        return Err(CatalogError::validation(format!(
            "{field} \"{value}\" is not valid; expected at most {MAX_NAME_LENGTH} characters \
             of [a-zA-Z0-9] separated by [-_.]"
        )));
    }
    Ok(())
}

/// Validates `apiVersion`, `kind`, `metadata.name`, and `metadata.namespace`.
pub struct EntityPolicyProcessor;

impl EntityPolicyProcessor {
    pub fn validate(entity: &Entity) -> Result<()> {
        if entity.api_version.trim().is_empty() {
            return Err(CatalogError::validation("apiVersion must not be empty"));
        }
        if entity.kind.trim().is_empty() {
            return Err(CatalogError::validation("kind must not be empty"));
        }
        check_name("metadata.name", entity.name())?;
        if let Some(namespace) = &entity.metadata.namespace {
            check_name("metadata.namespace", namespace)?;
        }
        Ok(())
    }
}

#[async_trait]
impl LocationProcessor for EntityPolicyProcessor {
    fn name(&self) -> &str {
        "EntityPolicyProcessor"
    }

    async fn process_entity(
        &self,
        entity: &Entity,
        _location: &LocationSpec,
        _resolver: &dyn LocationResolver,
    ) -> Result<Transformed> {
        Self::validate(entity)?;
        Ok(Transformed::unchanged())
    }
}
