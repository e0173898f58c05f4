//! Directory-service (LDAP) organisation reader.
//!
//! Users and groups are searched under their configured base DNs, mapped to
//! `User` and `Group` entities through the attribute maps, and then linked:
//! group `member` values and user `memberOf` values fill in user memberships,
//! group `memberOf` values and nested group members fill in the group tree.

use std::collections::HashMap;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, Scope, SearchEntry};
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use catalogloader_shared::{
    CatalogError, Entity, LdapBindConfig, LdapGroupConfig, LdapProviderConfig, LdapScope,
    LdapSearchOptions, LdapUserConfig, Result,
};

/// `apiVersion` stamped on entities produced from a directory.
pub const LDAP_ENTITY_API_VERSION: &str = "catalog/v1";

/// Annotation holding the full DN an entity was read from.
pub const LDAP_DN_ANNOTATION: &str = "catalog/ldap-dn";

/// Annotation holding the RDN value an entity was read from.
pub const LDAP_RDN_ANNOTATION: &str = "catalog/ldap-rdn";

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// One search result: its DN and all returned attribute values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// First value of `attribute`, if any.
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .get(attribute)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of `attribute`; empty when absent.
    pub fn all(&self, attribute: &str) -> &[String] {
        self.attributes
            .get(attribute)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Search access to a directory server.
#[async_trait]
pub trait DirectoryClient: Send {
    async fn search(
        &mut self,
        base_dn: &str,
        options: &LdapSearchOptions,
    ) -> Result<Vec<DirectoryEntry>>;

    /// Release the connection; called once after the org has been read.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Opens a [`DirectoryClient`] for a configured provider.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    async fn connect(&self, provider: &LdapProviderConfig) -> Result<Box<dyn DirectoryClient>>;
}

/// [`DirectoryConnector`] that opens real `ldap3` connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct LdapConnector;

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(&self, provider: &LdapProviderConfig) -> Result<Box<dyn DirectoryClient>> {
        let client = LdapClient::connect(&provider.target, provider.bind.as_ref()).await?;
        Ok(Box::new(client))
    }
}

/// [`DirectoryClient`] backed by an `ldap3` connection.
pub struct LdapClient {
    target: String,
    ldap: Ldap,
}

impl LdapClient {
    /// Connect to `target` and, when credentials are given, simple-bind.
    #[instrument(skip_all, fields(server = %target))]
    pub async fn connect(target: &str, bind: Option<&LdapBindConfig>) -> Result<Self> {
        let (conn, mut ldap) = LdapConnAsync::new(target)
            .await
            .map_err(|e| directory_error(target, "connect", e))?;

        let driver_target = target.to_string();
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(server = %driver_target, error = %e, "LDAP connection closed with error");
            }
        });

        if let Some(bind) = bind {
            ldap.simple_bind(&bind.dn, &bind.secret)
                .await
                .and_then(|result| result.success())
                .map_err(|e| directory_error(target, "bind", e))?;
            debug!(dn = %bind.dn, "bound");
        }

        Ok(Self {
            target: target.to_string(),
            ldap,
        })
    }
}

#[async_trait]
impl DirectoryClient for LdapClient {
    async fn search(
        &mut self,
        base_dn: &str,
        options: &LdapSearchOptions,
    ) -> Result<Vec<DirectoryEntry>> {
        let scope = match options.scope {
            LdapScope::Base => Scope::Base,
            LdapScope::One => Scope::OneLevel,
            LdapScope::Sub => Scope::Subtree,
        };
        let attributes: Vec<&str> = if options.attributes.is_empty() {
            vec!["*"]
        } else {
            options.attributes.iter().map(String::as_str).collect()
        };

        let (entries, _) = self
            .ldap
            .search(base_dn, scope, &options.filter, attributes)
            .await
            .and_then(|result| result.success())
            .map_err(|e| directory_error(&self.target, "search", e))?;

        Ok(entries
            .into_iter()
            .map(|entry| {
                let entry = SearchEntry::construct(entry);
                DirectoryEntry {
                    dn: entry.dn,
                    attributes: entry.attrs,
                }
            })
            .collect())
    }

    async fn close(&mut self) -> Result<()> {
        self.ldap
            .unbind()
            .await
            .map_err(|e| directory_error(&self.target, "unbind", e))
    }
}

fn directory_error(target: &str, action: &str, e: ldap3::LdapError) -> CatalogError {
    CatalogError::Directory(format!("LDAP {action} failed for {target}, {e}"))
}

// ---------------------------------------------------------------------------
// Organisation reading
// ---------------------------------------------------------------------------

/// Users and groups read from one directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LdapOrg {
    pub users: Vec<Entity>,
    pub groups: Vec<Entity>,
}

/// Read users and groups through `client` and resolve their relations.
#[instrument(skip_all, fields(users_dn = %users.dn, groups_dn = %groups.dn))]
pub async fn read_ldap_org<C: DirectoryClient + ?Sized>(
    client: &mut C,
    users: &LdapUserConfig,
    groups: &LdapGroupConfig,
) -> Result<LdapOrg> {
    let user_entries = client.search(&users.dn, &users.options).await?;
    let group_entries = client.search(&groups.dn, &groups.options).await?;

    let mut user_entities = Vec::new();
    let mut user_member_of = Vec::new();
    for entry in &user_entries {
        if let Some(entity) = map_user(entry, users) {
            user_member_of.push((entry.dn.clone(), entry.all(&users.map.member_of).to_vec()));
            user_entities.push((entry.dn.clone(), entity));
        }
    }

    let mut group_entities = Vec::new();
    let mut group_member_of = Vec::new();
    let mut group_members = Vec::new();
    for entry in &group_entries {
        if let Some(entity) = map_group(entry, groups) {
            group_member_of.push((entry.dn.clone(), entry.all(&groups.map.member_of).to_vec()));
            group_members.push((entry.dn.clone(), entry.all(&groups.map.members).to_vec()));
            group_entities.push((entry.dn.clone(), entity));
        }
    }

    let mut org = Relations::new(user_entities, group_entities);
    for (user_dn, parents) in &user_member_of {
        for group_dn in parents {
            org.add_membership(user_dn, group_dn);
        }
    }
    for (group_dn, parents) in &group_member_of {
        for parent_dn in parents {
            org.add_parent(group_dn, parent_dn);
        }
    }
    for (group_dn, members) in &group_members {
        for member_dn in members {
            if org.is_group(member_dn) {
                org.add_parent(member_dn, group_dn);
            } else {
                org.add_membership(member_dn, group_dn);
            }
        }
    }

    let org = org.finish();
    info!(
        users = org.users.len(),
        groups = org.groups.len(),
        "read directory organisation"
    );
    Ok(org)
}

/// Connect to the provider whose target matches `target` and read its org.
pub async fn read_ldap_org_from(
    connector: &dyn DirectoryConnector,
    providers: &[LdapProviderConfig],
    target: &str,
) -> Result<LdapOrg> {
    let provider = providers
        .iter()
        .find(|p| p.target == target)
        .ok_or_else(|| {
            CatalogError::config(format!(
                "There is no LDAP Org provider that matches {target}. Please add a configuration entry for it under catalog.processors.ldap_org.providers."
            ))
        })?;

    // A fresh connection per read; reads happen at most once per run.
    let mut client = connector.connect(provider).await?;
    let org = read_ldap_org(client.as_mut(), &provider.users, &provider.groups).await;
    if let Err(e) = client.close().await {
        warn!(error = %e, "failed to unbind");
    }
    org
}

fn map_user(entry: &DirectoryEntry, config: &LdapUserConfig) -> Option<Entity> {
    let map = &config.map;
    let Some(name) = entry.first(&map.name) else {
        warn!(dn = %entry.dn, attribute = %map.name, "user entry has no name, skipping");
        return None;
    };

    let mut entity = Entity::new(LDAP_ENTITY_API_VERSION, "User", name);
    annotate(&mut entity, entry, &map.rdn);
    entity.metadata.description = entry.first(&map.description).map(String::from);

    let mut profile = Map::new();
    insert_opt(&mut profile, "displayName", entry.first(&map.display_name));
    insert_opt(&mut profile, "email", entry.first(&map.email));
    entity.spec = Some(json!({ "profile": profile, "memberOf": [] }));
    Some(entity)
}

fn map_group(entry: &DirectoryEntry, config: &LdapGroupConfig) -> Option<Entity> {
    let map = &config.map;
    let Some(name) = entry.first(&map.name) else {
        warn!(dn = %entry.dn, attribute = %map.name, "group entry has no name, skipping");
        return None;
    };

    let mut entity = Entity::new(LDAP_ENTITY_API_VERSION, "Group", name);
    annotate(&mut entity, entry, &map.rdn);
    entity.metadata.description = entry.first(&map.description).map(String::from);

    let mut profile = Map::new();
    insert_opt(&mut profile, "displayName", entry.first(&map.display_name));
    insert_opt(&mut profile, "email", entry.first(&map.email));
    let group_type = entry.first(&map.group_type).unwrap_or("unknown");
    entity.spec = Some(json!({ "type": group_type, "profile": profile, "children": [] }));
    Some(entity)
}

fn annotate(entity: &mut Entity, entry: &DirectoryEntry, rdn_attribute: &str) {
    let annotations = &mut entity.metadata.annotations;
    annotations.insert(LDAP_DN_ANNOTATION.to_string(), entry.dn.clone());
    if let Some(rdn) = entry.first(rdn_attribute) {
        annotations.insert(LDAP_RDN_ANNOTATION.to_string(), rdn.to_string());
    }
}

fn insert_opt(map: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
}

// ----- Relation resolution -----

/// DN-indexed entities being linked together.
struct Relations {
    users: Vec<Entity>,
    groups: Vec<Entity>,
    user_index: HashMap<String, usize>,
    group_index: HashMap<String, usize>,
}

impl Relations {
    fn new(users: Vec<(String, Entity)>, groups: Vec<(String, Entity)>) -> Self {
        let user_index = users
            .iter()
            .enumerate()
            .map(|(i, (dn, _))| (normalize_dn(dn), i))
            .collect();
        let group_index = groups
            .iter()
            .enumerate()
            .map(|(i, (dn, _))| (normalize_dn(dn), i))
            .collect();
        Self {
            users: users.into_iter().map(|(_, e)| e).collect(),
            groups: groups.into_iter().map(|(_, e)| e).collect(),
            user_index,
            group_index,
        }
    }

    fn is_group(&self, dn: &str) -> bool {
        self.group_index.contains_key(&normalize_dn(dn))
    }

    /// Record that the user at `user_dn` belongs to the group at `group_dn`.
    fn add_membership(&mut self, user_dn: &str, group_dn: &str) {
        let (Some(&u), Some(&g)) = (
            self.user_index.get(&normalize_dn(user_dn)),
            self.group_index.get(&normalize_dn(group_dn)),
        ) else {
            debug!(user_dn, group_dn, "membership refers to an unknown entry");
            return;
        };
        let group_name = self.groups[g].name().to_string();
        push_unique(&mut self.users[u], "memberOf", group_name);
    }

    /// Record that the group at `child_dn` sits under the group at `parent_dn`.
    fn add_parent(&mut self, child_dn: &str, parent_dn: &str) {
        let (Some(&c), Some(&p)) = (
            self.group_index.get(&normalize_dn(child_dn)),
            self.group_index.get(&normalize_dn(parent_dn)),
        ) else {
            debug!(child_dn, parent_dn, "group relation refers to an unknown entry");
            return;
        };
        if c == p {
            return;
        }
        let parent_name = self.groups[p].name().to_string();
        let child_name = self.groups[c].name().to_string();
        if let Some(spec) = self.groups[c].spec.as_mut().and_then(Value::as_object_mut) {
            spec.insert("parent".to_string(), Value::String(parent_name));
        }
        push_unique(&mut self.groups[p], "children", child_name);
    }

    fn finish(self) -> LdapOrg {
        LdapOrg {
            users: self.users,
            groups: self.groups,
        }
    }
}

fn push_unique(entity: &mut Entity, key: &str, value: String) {
    let Some(spec) = entity.spec.as_mut().and_then(Value::as_object_mut) else {
        return;
    };
    let list = spec
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(items) = list {
        if !items.iter().any(|v| v.as_str() == Some(value.as_str())) {
            items.push(Value::String(value));
        }
    }
}

/// DNs compare case-insensitively and without spaces around separators.
fn normalize_dn(dn: &str) -> String {
    dn.split(',')
        .map(|part| part.trim().to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogloader_shared::{LdapGroupMap, LdapUserMap};

    /// Serves fixed entries per base DN.
    struct FakeDirectory {
        entries: HashMap<String, Vec<DirectoryEntry>>,
        searches: Vec<String>,
    }

    #[async_trait]
    impl DirectoryClient for FakeDirectory {
        async fn search(
            &mut self,
            base_dn: &str,
            _options: &LdapSearchOptions,
        ) -> Result<Vec<DirectoryEntry>> {
            self.searches.push(base_dn.to_string());
            Ok(self.entries.get(base_dn).cloned().unwrap_or_default())
        }
    }

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

    fn user_config() -> LdapUserConfig {
        LdapUserConfig {
            dn: "ou=people,dc=example,dc=net".into(),
            options: LdapSearchOptions::default(),
            map: LdapUserMap::default(),
        }
    }

    fn group_config() -> LdapGroupConfig {
        LdapGroupConfig {
            dn: "ou=groups,dc=example,dc=net".into(),
            options: LdapSearchOptions::default(),
            map: LdapGroupMap::default(),
        }
    }

    fn directory() -> FakeDirectory {
        let mut entries = HashMap::new();
        entries.insert(
            "ou=people,dc=example,dc=net".to_string(),
            vec![
                entry(
                    "uid=alice,ou=people,dc=example,dc=net",
                    &[
                        ("uid", "alice"),
                        ("cn", "Alice Example"),
                        ("mail", "alice@example.net"),
                        ("memberOf", "cn=ops,ou=groups,dc=example,dc=net"),
                    ],
                ),
                entry(
                    "uid=bob,ou=people,dc=example,dc=net",
                    &[("uid", "bob"), ("cn", "Bob")],
                ),
                entry("uid=nameless,ou=people,dc=example,dc=net", &[("cn", "?")]),
            ],
        );
        entries.insert(
            "ou=groups,dc=example,dc=net".to_string(),
            vec![
                entry(
                    "cn=eng,ou=groups,dc=example,dc=net",
                    &[
                        ("cn", "eng"),
                        ("groupType", "department"),
                        ("member", "cn=ops,ou=groups,dc=example,dc=net"),
                    ],
                ),
                entry(
                    "cn=ops,ou=groups,dc=example,dc=net",
                    &[
                        ("cn", "ops"),
                        ("description", "Operations"),
                        ("member", "uid=bob, ou=people, dc=example, dc=net"),
                    ],
                ),
            ],
        );
        FakeDirectory {
            entries,
            searches: Vec::new(),
        }
    }

    fn spec(entity: &Entity) -> &Value {
        entity.spec.as_ref().unwrap()
    }

    #[tokio::test]
    async fn maps_users_and_groups() {
        let mut client = directory();
        let org = read_ldap_org(&mut client, &user_config(), &group_config())
            .await
            .unwrap();

        assert_eq!(
            client.searches,
            vec!["ou=people,dc=example,dc=net", "ou=groups,dc=example,dc=net"]
        );
        assert_eq!(org.users.len(), 2);
        assert_eq!(org.groups.len(), 2);

        let alice = &org.users[0];
        assert_eq!(alice.kind, "User");
        assert_eq!(alice.name(), "alice");
        assert_eq!(
            alice.metadata.annotations[LDAP_DN_ANNOTATION],
            "uid=alice,ou=people,dc=example,dc=net"
        );
        assert_eq!(alice.metadata.annotations[LDAP_RDN_ANNOTATION], "alice");
        assert_eq!(spec(alice)["profile"]["displayName"], "Alice Example");
        assert_eq!(spec(alice)["profile"]["email"], "alice@example.net");

        let ops = &org.groups[1];
        assert_eq!(ops.metadata.description.as_deref(), Some("Operations"));
        assert_eq!(spec(ops)["type"], "unknown");
        assert_eq!(spec(&org.groups[0])["type"], "department");
    }

    #[tokio::test]
    async fn resolves_relations() {
        let mut client = directory();
        let org = read_ldap_org(&mut client, &user_config(), &group_config())
            .await
            .unwrap();

        let alice = &org.users[0];
        let bob = &org.users[1];
        assert_eq!(spec(alice)["memberOf"], json!(["ops"]));
        assert_eq!(spec(bob)["memberOf"], json!(["ops"]));

        let eng = &org.groups[0];
        let ops = &org.groups[1];
        assert_eq!(spec(eng)["children"], json!(["ops"]));
        assert_eq!(spec(ops)["parent"], "eng");
        assert!(spec(eng).get("parent").is_none());
    }

    #[test]
    fn dn_normalization() {
        assert_eq!(
            normalize_dn("CN=Ops, OU=Groups,dc=Example"),
            "cn=ops,ou=groups,dc=example"
        );
    }

    #[tokio::test]
    async fn unknown_provider_is_config_error() {
        let err = read_ldap_org_from(&LdapConnector, &[], "ldaps://ds.example.net")
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Config { .. }));
        assert!(err.to_string().contains("ldaps://ds.example.net"));
    }
}
