//! Application configuration for catalogloader.
//!
//! User config lives at `~/.catalogloader/catalogloader.toml`.
//! Credentials are validated eagerly: an explicitly empty credential is a
//! configuration error, an absent one means "unauthenticated".

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};
use crate::types::LocationSpec;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "catalogloader.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".catalogloader";

/// Default bound on the number of pipeline rounds.
pub const DEFAULT_MAX_DEPTH: usize = 10;

// ---------------------------------------------------------------------------
// Config structs (matching catalogloader.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Pipeline, policy, and processor settings.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Source-control integrations used by the URL readers.
    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

/// `[catalog]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Maximum number of pipeline rounds per read.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Locations emitted when a `bootstrap` location is read.
    #[serde(default)]
    pub locations: Vec<StaticLocationConfig>,

    /// Access rules; replaces the built-in defaults when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<RuleConfig>>,

    /// Per-processor settings.
    #[serde(default)]
    pub processors: ProcessorsConfig,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            locations: Vec::new(),
            rules: None,
            processors: ProcessorsConfig::default(),
        }
    }
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

/// `[[catalog.locations]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticLocationConfig {
    #[serde(rename = "type")]
    pub location_type: String,
    pub target: String,
    /// Extra rules that apply to entities read from exactly this location.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<LocationRuleConfig>,
}

impl StaticLocationConfig {
    pub fn location(&self) -> LocationSpec {
        LocationSpec::new(&self.location_type, &self.target)
    }
}

/// Rule attached to a single static location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationRuleConfig {
    /// Entity kinds allowed from the location.
    pub allow: Vec<String>,
}

/// `[[catalog.rules]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Entity kinds the rule allows.
    pub allow: Vec<String>,
    /// Locations the rule applies to; absent means any location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<RuleLocationConfig>>,
}

/// Location matcher inside a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleLocationConfig {
    #[serde(rename = "type")]
    pub location_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// `[catalog.processors]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessorsConfig {
    #[serde(default)]
    pub ldap_org: LdapOrgConfig,
}

/// `[catalog.processors.ldap_org]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LdapOrgConfig {
    #[serde(default)]
    pub providers: Vec<LdapProviderConfig>,
}

// ---------------------------------------------------------------------------
// Directory-service providers
// ---------------------------------------------------------------------------

/// One directory server and how to read users and groups from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapProviderConfig {
    /// Server URL, e.g. `ldaps://ds.example.net`; also the location target.
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<LdapBindConfig>,
    pub users: LdapUserConfig,
    pub groups: LdapGroupConfig,
}

/// Simple-bind credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapBindConfig {
    pub dn: String,
    pub secret: String,
}

/// Search scope relative to the base DN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LdapScope {
    Base,
    One,
    #[default]
    Sub,
}

/// Search options shared by user and group lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LdapSearchOptions {
    pub scope: LdapScope,
    pub filter: String,
    /// Attributes to request; empty requests all.
    pub attributes: Vec<String>,
}

impl Default for LdapSearchOptions {
    fn default() -> Self {
        Self {
            scope: LdapScope::Sub,
            filter: "(objectClass=*)".into(),
            attributes: Vec::new(),
        }
    }
}

/// `users` block of a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapUserConfig {
    pub dn: String,
    #[serde(default)]
    pub options: LdapSearchOptions,
    #[serde(default)]
    pub map: LdapUserMap,
}

/// Which LDAP attributes feed which user entity fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LdapUserMap {
    pub rdn: String,
    pub name: String,
    pub description: String,
    pub display_name: String,
    pub email: String,
    pub member_of: String,
}

impl Default for LdapUserMap {
    fn default() -> Self {
        Self {
            rdn: "uid".into(),
            name: "uid".into(),
            description: "description".into(),
            display_name: "cn".into(),
            email: "mail".into(),
            member_of: "memberOf".into(),
        }
    }
}

/// `groups` block of a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapGroupConfig {
    pub dn: String,
    #[serde(default)]
    pub options: LdapSearchOptions,
    #[serde(default)]
    pub map: LdapGroupMap,
}

/// Which LDAP attributes feed which group entity fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LdapGroupMap {
    pub rdn: String,
    pub name: String,
    pub description: String,
    pub group_type: String,
    pub display_name: String,
    pub email: String,
    pub member_of: String,
    pub members: String,
}

impl Default for LdapGroupMap {
    fn default() -> Self {
        Self {
            rdn: "cn".into(),
            name: "cn".into(),
            description: "description".into(),
            group_type: "groupType".into(),
            display_name: "cn".into(),
            email: "mail".into(),
            member_of: "memberOf".into(),
            members: "member".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Integrations
// ---------------------------------------------------------------------------

/// `[integrations]` section: one list per hosting system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrationsConfig {
    #[serde(default)]
    pub github: Vec<GithubIntegrationConfig>,
    #[serde(default)]
    pub gitlab: Vec<GitlabIntegrationConfig>,
    #[serde(default)]
    pub bitbucket: Vec<BitbucketIntegrationConfig>,
    #[serde(default)]
    pub azure: Vec<AzureIntegrationConfig>,
}

/// `[[integrations.github]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubIntegrationConfig {
    #[serde(default = "default_github_host")]
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Raw-content base; defaults to `raw.githubusercontent.com` for github.com
    /// and `https://<host>/raw` for enterprise hosts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_base_url: Option<String>,
}

impl Default for GithubIntegrationConfig {
    fn default() -> Self {
        Self {
            host: default_github_host(),
            token: None,
            raw_base_url: None,
        }
    }
}

fn default_github_host() -> String {
    "github.com".into()
}

/// `[[integrations.gitlab]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitlabIntegrationConfig {
    #[serde(default = "default_gitlab_host")]
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for GitlabIntegrationConfig {
    fn default() -> Self {
        Self {
            host: default_gitlab_host(),
            token: None,
        }
    }
}

fn default_gitlab_host() -> String {
    "gitlab.com".into()
}

/// `[[integrations.bitbucket]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitbucketIntegrationConfig {
    #[serde(default = "default_bitbucket_host")]
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_password: Option<String>,
    /// API base; defaults to `https://api.bitbucket.org/2.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
}

impl Default for BitbucketIntegrationConfig {
    fn default() -> Self {
        Self {
            host: default_bitbucket_host(),
            username: None,
            app_password: None,
            api_base_url: None,
        }
    }
}

fn default_bitbucket_host() -> String {
    "bitbucket.org".into()
}

/// `[[integrations.azure]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureIntegrationConfig {
    #[serde(default = "default_azure_host")]
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for AzureIntegrationConfig {
    fn default() -> Self {
        Self {
            host: default_azure_host(),
            token: None,
        }
    }
}

fn default_azure_host() -> String {
    "dev.azure.com".into()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Reject a credential that is present but empty.
pub fn require_non_empty(key: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some("") => Err(CatalogError::config(format!(
            "invalid type in config for key '{key}', got empty-string, wanted string"
        ))),
        _ => Ok(()),
    }
}

impl AppConfig {
    /// Check the whole config up front so misconfiguration fails at startup.
    pub fn validate(&self) -> Result<()> {
        if self.catalog.max_depth == 0 {
            return Err(CatalogError::config("catalog.max_depth must be at least 1"));
        }

        for (i, github) in self.integrations.github.iter().enumerate() {
            require_non_empty(
                &format!("integrations.github[{i}].token"),
                github.token.as_deref(),
            )?;
        }
        for (i, gitlab) in self.integrations.gitlab.iter().enumerate() {
            require_non_empty(
                &format!("integrations.gitlab[{i}].token"),
                gitlab.token.as_deref(),
            )?;
        }
        for (i, bitbucket) in self.integrations.bitbucket.iter().enumerate() {
            require_non_empty(
                &format!("integrations.bitbucket[{i}].username"),
                bitbucket.username.as_deref(),
            )?;
            require_non_empty(
                &format!("integrations.bitbucket[{i}].app_password"),
                bitbucket.app_password.as_deref(),
            )?;
        }
        for (i, azure) in self.integrations.azure.iter().enumerate() {
            require_non_empty(
                &format!("integrations.azure[{i}].token"),
                azure.token.as_deref(),
            )?;
        }

        for (i, provider) in self.catalog.processors.ldap_org.providers.iter().enumerate() {
            if provider.target.is_empty() {
                return Err(CatalogError::config(format!(
                    "catalog.processors.ldap_org.providers[{i}].target must not be empty"
                )));
            }
            if let Some(bind) = &provider.bind {
                require_non_empty(
                    &format!("catalog.processors.ldap_org.providers[{i}].bind.secret"),
                    Some(bind.secret.as_str()),
                )?;
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.catalogloader/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CatalogError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.catalogloader/catalogloader.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CatalogError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        CatalogError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CatalogError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CatalogError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CatalogError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
