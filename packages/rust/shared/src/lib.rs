//! Shared types, error model, and configuration for catalogloader.
//!
//! This crate is the foundation depended on by all other catalogloader crates.
//! It provides:
//! - [`CatalogError`], the unified error type
//! - Domain types ([`LocationSpec`], [`Entity`])
//! - Pipeline work items and run output ([`ProcessorResult`], [`ReadLocationResult`])
//! - Configuration ([`AppConfig`], integrations, rules, directory providers)

pub mod config;
pub mod error;
pub mod results;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AzureIntegrationConfig, BitbucketIntegrationConfig, CatalogConfig,
    DEFAULT_MAX_DEPTH, GithubIntegrationConfig, GitlabIntegrationConfig, IntegrationsConfig,
    LdapBindConfig, LdapGroupConfig, LdapGroupMap, LdapOrgConfig, LdapProviderConfig, LdapScope,
    LdapSearchOptions, LdapUserConfig, LdapUserMap, LocationRuleConfig, ProcessorsConfig,
    RuleConfig, RuleLocationConfig, StaticLocationConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, require_non_empty,
};
pub use error::{CatalogError, Result};
pub use results::{LocationEntity, LocationError, ProcessorResult, ReadLocationResult};
pub use types::{
    DEFINITION_AT_LOCATION_ANNOTATION, ENTITY_DEFAULT_NAMESPACE, Entity, EntityMeta,
    LOCATION_ANNOTATION, LocationSpec,
};
