//! `ldap-org` locations read users and groups from a directory server.

use std::sync::Arc;

use async_trait::async_trait;

use catalogloader_readers::{DirectoryConnector, LdapConnector, read_ldap_org_from};
use catalogloader_shared::{LdapProviderConfig, LocationSpec, ProcessorResult, Result};

use super::{Claim, LocationProcessor};

const LDAP_ORG_TYPE: &str = "ldap-org";

/// Emits one entity per group, then one per user.
pub struct LdapOrgReaderProcessor {
    providers: Vec<LdapProviderConfig>,
    connector: Arc<dyn DirectoryConnector>,
}

impl LdapOrgReaderProcessor {
    pub fn new(providers: Vec<LdapProviderConfig>) -> Self {
        Self::with_connector(providers, Arc::new(LdapConnector))
    }

    pub fn with_connector(
        providers: Vec<LdapProviderConfig>,
        connector: Arc<dyn DirectoryConnector>,
    ) -> Self {
        Self {
            providers,
            connector,
        }
    }
}

#[async_trait]
impl LocationProcessor for LdapOrgReaderProcessor {
    fn name(&self) -> &str {
        "LdapOrgReaderProcessor"
    }

    async fn read_location(&self, location: &LocationSpec, _optional: bool) -> Result<Claim> {
        if location.location_type != LDAP_ORG_TYPE {
            return Ok(Claim::Declined);
        }

        let org =
            read_ldap_org_from(self.connector.as_ref(), &self.providers, &location.target).await?;
        let items = org
            .groups
            .into_iter()
            .chain(org.users)
            .map(|entity| ProcessorResult::entity(location, entity))
            .collect();
        Ok(Claim::Handled(items))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use catalogloader_readers::{DirectoryClient, DirectoryEntry};
    use catalogloader_shared::{
        CatalogError, LdapGroupConfig, LdapGroupMap, LdapSearchOptions, LdapUserConfig,
        LdapUserMap,
    };

    const USERS_DN: &str = "ou=people,dc=example,dc=net";
    const GROUPS_DN: &str = "ou=groups,dc=example,dc=net";

    fn entry(dn: &str, attrs: &[(&str, &str)]) -> DirectoryEntry {
        let mut attributes: HashMap<String, Vec<String>> = HashMap::new();
        for (key, value) in attrs {
            attributes
                .entry(key.to_string())
                .or_default()
                .push(value.to_string());
        }
        DirectoryEntry {
            dn: dn.to_string(),
            attributes,
        }
    }

    /// Serves the same two users and two groups to every connection.
    struct StaticDirectory;

    #[async_trait]
    impl DirectoryClient for StaticDirectory {
        async fn search(
            &mut self,
            base_dn: &str,
            _options: &LdapSearchOptions,
        ) -> Result<Vec<DirectoryEntry>> {
            Ok(match base_dn {
                USERS_DN => vec![
                    entry("uid=ann,ou=people,dc=example,dc=net", &[("uid", "ann")]),
                    entry("uid=bob,ou=people,dc=example,dc=net", &[("uid", "bob")]),
                ],
                GROUPS_DN => vec![
                    entry(
                        "cn=ops,ou=groups,dc=example,dc=net",
                        &[("cn", "ops"), ("member", "uid=ann,ou=people,dc=example,dc=net")],
                    ),
                    entry("cn=dev,ou=groups,dc=example,dc=net", &[("cn", "dev")]),
                ],
                _ => Vec::new(),
            })
        }
    }

    struct StaticConnector;

    #[async_trait]
    impl DirectoryConnector for StaticConnector {
        async fn connect(
            &self,
            _provider: &LdapProviderConfig,
        ) -> Result<Box<dyn DirectoryClient>> {
            Ok(Box::new(StaticDirectory))
        }
    }

    fn provider(target: &str) -> LdapProviderConfig {
        LdapProviderConfig {
            target: target.to_string(),
            bind: None,
            users: LdapUserConfig {
                dn: USERS_DN.to_string(),
                options: LdapSearchOptions::default(),
                map: LdapUserMap::default(),
            },
            groups: LdapGroupConfig {
                dn: GROUPS_DN.to_string(),
                options: LdapSearchOptions::default(),
                map: LdapGroupMap::default(),
            },
        }
    }

    #[tokio::test]
    async fn emits_groups_before_users() {
        let target = "ldaps://ds.example.net";
        let processor = LdapOrgReaderProcessor::with_connector(
            vec![provider(target)],
            Arc::new(StaticConnector),
        );
        let location = LocationSpec::new("ldap-org", target);

        let Claim::Handled(items) = processor.read_location(&location, false).await.unwrap()
        else {
            panic!("ldap-org location should be claimed");
        };

        let emitted: Vec<(String, String)> = items
            .into_iter()
            .map(|item| match item {
                ProcessorResult::Entity {
                    location: source,
                    entity,
                } => {
                    assert_eq!(source, location);
                    (entity.kind.clone(), entity.name().to_string())
                }
                other => panic!("unexpected {}", other.kind()),
            })
            .collect();
        let kinds: Vec<&str> = emitted.iter().map(|(kind, _)| kind.as_str()).collect();
        assert_eq!(kinds, ["Group", "Group", "User", "User"]);
        assert!(emitted.contains(&("Group".to_string(), "ops".to_string())));
        assert!(emitted.contains(&("User".to_string(), "ann".to_string())));
    }

    #[tokio::test]
    async fn unknown_provider_fails() {
        let processor = LdapOrgReaderProcessor::new(Vec::new());
        let location = LocationSpec::new("ldap-org", "ldaps://ds.example.net");
        let err = processor.read_location(&location, false).await.unwrap_err();
        assert!(matches!(err, CatalogError::Config { .. }));
    }

    #[tokio::test]
    async fn declines_other_types() {
        let processor = LdapOrgReaderProcessor::new(Vec::new());
        let location = LocationSpec::new("url", "https://example.com/a.yaml");
        let claim = processor.read_location(&location, false).await.unwrap();
        assert!(!claim.is_handled());
    }
}
