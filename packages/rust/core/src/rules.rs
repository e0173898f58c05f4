//! Access policy: which entity kinds may come from which locations.

use catalogloader_shared::{CatalogConfig, Entity, LocationSpec};

/// Kinds allowed from any location when no rules are configured.
const DEFAULT_ALLOWED_KINDS: &[&str] = &[
    "Component",
    "API",
    "Location",
    "User",
    "Group",
    "System",
    "Domain",
    "Resource",
    "Template",
];

/// Location matcher inside a rule; `target: None` matches any target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleLocation {
    pub location_type: String,
    pub target: Option<String>,
}

impl RuleLocation {
    fn matches(&self, location: &LocationSpec) -> bool {
        self.location_type == location.location_type
            && self.target.as_ref().is_none_or(|t| *t == location.target)
    }
}

/// One rule: a set of kinds and the locations they are allowed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRule {
    /// Allowed kinds, compared case-insensitively.
    pub allow: Vec<String>,
    /// `None` allows the kinds from any location.
    pub locations: Option<Vec<RuleLocation>>,
}

impl CatalogRule {
    fn allows(&self, entity: &Entity, location: &LocationSpec) -> bool {
        let kind_ok = self
            .allow
            .iter()
            .any(|kind| kind.eq_ignore_ascii_case(&entity.kind));
        let location_ok = self
            .locations
            .as_ref()
            .is_none_or(|locations| locations.iter().any(|l| l.matches(location)));
        kind_ok && location_ok
    }
}

/// Evaluates an ordered rule set; any matching rule admits the pair.
#[derive(Debug, Clone)]
pub struct CatalogRulesEnforcer {
    rules: Vec<CatalogRule>,
}

impl CatalogRulesEnforcer {
    pub fn new(rules: Vec<CatalogRule>) -> Self {
        Self { rules }
    }

    /// The built-in kinds, from any location.
    pub fn default_rules() -> Vec<CatalogRule> {
        vec![CatalogRule {
            allow: DEFAULT_ALLOWED_KINDS.iter().map(|k| k.to_string()).collect(),
            locations: None,
        }]
    }

    /// `catalog.rules` when present (otherwise the defaults), followed by one
    /// rule per static location that carries its own `rules`.
    pub fn from_config(config: &CatalogConfig) -> Self {
        let mut rules = match &config.rules {
            Some(configured) => configured
                .iter()
                .map(|rule| CatalogRule {
                    allow: rule.allow.clone(),
                    locations: rule.locations.as_ref().map(|locations| {
                        locations
                            .iter()
                            .map(|l| RuleLocation {
                                location_type: l.location_type.clone(),
                                target: l.target.clone(),
                            })
                            .collect()
                    }),
                })
                .collect(),
            None => Self::default_rules(),
        };

        for static_location in &config.locations {
            for rule in &static_location.rules {
                rules.push(CatalogRule {
                    allow: rule.allow.clone(),
                    locations: Some(vec![RuleLocation {
                        location_type: static_location.location_type.clone(),
                        target: Some(static_location.target.clone()),
                    }]),
                });
            }
        }

        Self::new(rules)
    }

    pub fn is_allowed(&self, entity: &Entity, location: &LocationSpec) -> bool {
        self.rules.iter().any(|rule| rule.allows(entity, location))
    }
}

impl Default for CatalogRulesEnforcer {
    fn default() -> Self {
        Self::new(Self::default_rules())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogloader_shared::{
        LocationRuleConfig, RuleConfig, RuleLocationConfig, StaticLocationConfig,
    };

    fn entity(kind: &str) -> Entity {
        Entity::new("catalog/v1", kind, "x")
    }

    #[test]
    fn defaults_allow_builtin_kinds_anywhere() {
        let enforcer = CatalogRulesEnforcer::default();
        let location = LocationSpec::new("url", "https://example.com/a.yaml");
        for kind in DEFAULT_ALLOWED_KINDS {
            assert!(enforcer.is_allowed(&entity(kind), &location));
        }
        assert!(enforcer.is_allowed(&entity("component"), &location));
        assert!(!enforcer.is_allowed(&entity("Widget"), &location));
    }

    #[test]
    fn directory_rule_rejects_components() {
        let enforcer = CatalogRulesEnforcer::new(vec![CatalogRule {
            allow: vec!["User".into(), "Group".into()],
            locations: Some(vec![RuleLocation {
                location_type: "ldap-org".into(),
                target: None,
            }]),
        }]);
        let location = LocationSpec::new("ldap-org", "ldaps://ds.example.net");
        assert!(enforcer.is_allowed(&entity("User"), &location));
        assert!(enforcer.is_allowed(&entity("group"), &location));
        assert!(!enforcer.is_allowed(&entity("Component"), &location));
        assert!(!enforcer.is_allowed(
            &entity("User"),
            &LocationSpec::new("url", "https://example.com/a.yaml")
        ));
    }

    #[test]
    fn configured_rules_replace_defaults() {
        let config = CatalogConfig {
            rules: Some(vec![RuleConfig {
                allow: vec!["Component".into()],
                locations: Some(vec![RuleLocationConfig {
                    location_type: "url".into(),
                    target: Some("https://example.com/a.yaml".into()),
                }]),
            }]),
            ..Default::default()
        };
        let enforcer = CatalogRulesEnforcer::from_config(&config);

        let a = LocationSpec::new("url", "https://example.com/a.yaml");
        let b = LocationSpec::new("url", "https://example.com/b.yaml");
        assert!(enforcer.is_allowed(&entity("Component"), &a));
        assert!(!enforcer.is_allowed(&entity("Component"), &b));
        assert!(!enforcer.is_allowed(&entity("API"), &a));
    }

    #[test]
    fn static_location_rules_are_added() {
        let config = CatalogConfig {
            rules: Some(Vec::new()),
            locations: vec![StaticLocationConfig {
                location_type: "file".into(),
                target: "/srv/org.yaml".into(),
                rules: vec![LocationRuleConfig {
                    allow: vec!["Group".into()],
                }],
            }],
            ..Default::default()
        };
        let enforcer = CatalogRulesEnforcer::from_config(&config);
        assert!(enforcer.is_allowed(&entity("Group"), &LocationSpec::new("file", "/srv/org.yaml")));
        assert!(!enforcer.is_allowed(&entity("Group"), &LocationSpec::new("file", "/srv/x.yaml")));
    }
}
