//! Programmatic policy rules
//!
//! A [`PolicyRuleSet`] is an ordered list of rules plus a default. The first
//! rule with a pattern matching the method decides; later rules are never
//! looked at. There is no specificity scoring: a wildcard allow listed before
//! an exact deny makes the deny unreachable, and that is the documented
//! behaviour.

use crate::context::AuthContext;
use crate::error::{ConfigError, Denial};
use crate::method::{MethodIdentity, MethodPattern};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What a caller must present for a method
///
/// Shared by programmatic rules and per-method descriptor metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRequirement {
    /// No authentication needed
    Public,
    /// Any authenticated caller
    Authenticated,
    /// Authenticated caller holding every listed role
    Roles(BTreeSet<String>),
}

impl AccessRequirement {
    /// Role-gated requirement; an empty set degrades to `Authenticated`
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let roles: BTreeSet<String> = roles.into_iter().map(Into::into).collect();
        if roles.is_empty() {
            AccessRequirement::Authenticated
        } else {
            AccessRequirement::Roles(roles)
        }
    }

    /// Check a caller against this requirement
    pub fn check(&self, ctx: Option<&AuthContext>) -> Result<(), Denial> {
        match (self, ctx) {
            (AccessRequirement::Public, _) => Ok(()),
            (_, None) => Err(Denial::AuthenticationRequired),
            (AccessRequirement::Authenticated, Some(_)) => Ok(()),
            (AccessRequirement::Roles(required), Some(ctx)) => {
                let missing = ctx.missing_roles(required);
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(Denial::InsufficientRole {
                        missing: missing.into_iter().map(str::to_string).collect(),
                    })
                }
            }
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, AccessRequirement::Public)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

/// Fallback when no rule and no metadata matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultPolicy {
    Allow,
    #[default]
    Deny,
}

/// One ordered entry in a [`PolicyRuleSet`]
#[derive(Debug, Clone)]
pub struct PolicyRule {
    /// Diagnostic only
    pub name: String,
    pub methods: Vec<MethodPattern>,
    pub effect: Effect,
    /// Ignored for deny rules
    pub access: AccessRequirement,
}

impl PolicyRule {
    /// Allow rule requiring an authenticated caller
    pub fn allow(name: impl Into<String>, methods: Vec<MethodPattern>) -> Self {
        Self {
            name: name.into(),
            methods,
            effect: Effect::Allow,
            access: AccessRequirement::Authenticated,
        }
    }

    /// Deny rule
    pub fn deny(name: impl Into<String>, methods: Vec<MethodPattern>) -> Self {
        Self {
            name: name.into(),
            methods,
            effect: Effect::Deny,
            access: AccessRequirement::Authenticated,
        }
    }

    /// Make an allow rule public (no authentication needed)
    pub fn public(mut self) -> Self {
        self.access = AccessRequirement::Public;
        self
    }

    /// Require every role in `roles`
    pub fn require_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.access = AccessRequirement::roles(roles);
        self
    }

    pub fn matches(&self, method: &MethodIdentity) -> bool {
        self.methods.iter().any(|p| p.matches(method))
    }

    /// Evaluate this rule for a caller, assuming it already matched
    pub fn evaluate(&self, ctx: Option<&AuthContext>) -> Result<(), Denial> {
        match self.effect {
            Effect::Deny => Err(Denial::RuleDenied {
                rule: self.name.clone(),
            }),
            Effect::Allow => self.access.check(ctx),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.methods.is_empty() {
            return Err(ConfigError::InvalidRule {
                rule: self.name.clone(),
                reason: "rule has no method patterns".to_string(),
            });
        }
        Ok(())
    }
}

/// Serialized form of a rule, as written in configuration files
///
/// ```yaml
/// - name: admin-only
///   methods: ["example.v1.AdminService/*"]
///   roles: ["admin"]
/// - name: health
///   methods: ["grpc.health.v1.Health/Check"]
///   public: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRuleConfig {
    pub name: String,
    pub methods: Vec<String>,
    #[serde(default)]
    pub effect: Effect,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl TryFrom<&PolicyRuleConfig> for PolicyRule {
    type Error = ConfigError;

    fn try_from(cfg: &PolicyRuleConfig) -> Result<Self, Self::Error> {
        let invalid = |reason: &str| ConfigError::InvalidRule {
            rule: cfg.name.clone(),
            reason: reason.to_string(),
        };

        if cfg.public && !cfg.roles.is_empty() {
            return Err(invalid("a rule cannot be both public and role-gated"));
        }
        if cfg.effect == Effect::Deny && (cfg.public || !cfg.roles.is_empty()) {
            return Err(invalid("deny rules take no public flag or roles"));
        }
        if cfg.roles.iter().any(|r| r.trim().is_empty()) {
            return Err(invalid("role names must not be empty"));
        }

        let methods = cfg
            .methods
            .iter()
            .map(|m| MethodPattern::parse(m))
            .collect::<Result<Vec<_>, _>>()?;

        let access = if cfg.public {
            AccessRequirement::Public
        } else {
            AccessRequirement::roles(cfg.roles.iter().cloned())
        };

        let rule = PolicyRule {
            name: cfg.name.clone(),
            methods,
            effect: cfg.effect,
            access,
        };
        rule.validate()?;
        Ok(rule)
    }
}

/// Where a decision came from
#[derive(Debug, Clone, Copy)]
pub enum RuleSource<'a> {
    Rule(&'a PolicyRule),
    Default(DefaultPolicy),
}

/// Ordered rules plus default policy; immutable once built
#[derive(Debug, Clone, Default)]
pub struct PolicyRuleSet {
    rules: Vec<PolicyRule>,
    default_policy: DefaultPolicy,
}

impl PolicyRuleSet {
    pub fn new(rules: Vec<PolicyRule>, default_policy: DefaultPolicy) -> Result<Self, ConfigError> {
        for rule in &rules {
            rule.validate()?;
        }
        Ok(Self {
            rules,
            default_policy,
        })
    }

    pub fn from_config(
        rules: &[PolicyRuleConfig],
        default_policy: DefaultPolicy,
    ) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .map(PolicyRule::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(rules, default_policy)
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    pub fn default_policy(&self) -> DefaultPolicy {
        self.default_policy
    }

    /// First rule matching `method`, or the default
    pub fn resolve(&self, method: &MethodIdentity) -> RuleSource<'_> {
        self.rules
            .iter()
            .find(|rule| rule.matches(method))
            .map(RuleSource::Rule)
            .unwrap_or(RuleSource::Default(self.default_policy))
    }

    /// Evaluate the rule set for a method and caller
    pub fn evaluate(&self, method: &MethodIdentity, ctx: Option<&AuthContext>) -> Result<(), Denial> {
        match self.resolve(method) {
            RuleSource::Rule(rule) => rule.evaluate(ctx),
            RuleSource::Default(DefaultPolicy::Allow) => Ok(()),
            RuleSource::Default(DefaultPolicy::Deny) => Err(Denial::DefaultDeny),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> MethodIdentity {
        MethodIdentity::parse(s).unwrap()
    }

    fn pat(s: &str) -> MethodPattern {
        MethodPattern::parse(s).unwrap()
    }

    fn user(roles: &[&str]) -> AuthContext {
        AuthContext::new("user-1").with_roles(roles.iter().copied())
    }

    #[test]
    fn test_first_match_wins_allow_then_deny() {
        let rules = PolicyRuleSet::new(
            vec![
                PolicyRule::allow("allow-all", vec![pat("test.v1.TestService/*")]),
                PolicyRule::deny("deny-delete", vec![pat("test.v1.TestService/Delete")]),
            ],
            DefaultPolicy::Deny,
        )
        .unwrap();

        let ctx = user(&[]);
        assert!(rules
            .evaluate(&id("test.v1.TestService/Delete"), Some(&ctx))
            .is_ok());
    }

    #[test]
    fn test_first_match_wins_deny_then_allow() {
        let rules = PolicyRuleSet::new(
            vec![
                PolicyRule::deny("deny-delete", vec![pat("test.v1.TestService/Delete")]),
                PolicyRule::allow("allow-all", vec![pat("test.v1.TestService/*")]),
            ],
            DefaultPolicy::Deny,
        )
        .unwrap();

        let ctx = user(&[]);
        assert_eq!(
            rules.evaluate(&id("test.v1.TestService/Delete"), Some(&ctx)),
            Err(Denial::RuleDenied {
                rule: "deny-delete".to_string()
            })
        );
        assert!(rules
            .evaluate(&id("test.v1.TestService/Get"), Some(&ctx))
            .is_ok());
    }

    #[test]
    fn test_default_policy() {
        let deny = PolicyRuleSet::new(vec![], DefaultPolicy::Deny).unwrap();
        let allow = PolicyRuleSet::new(vec![], DefaultPolicy::Allow).unwrap();
        let method = id("test.v1.TestService/Anything");

        assert_eq!(deny.evaluate(&method, None), Err(Denial::DefaultDeny));
        assert_eq!(
            deny.evaluate(&method, Some(&user(&["admin"]))),
            Err(Denial::DefaultDeny)
        );
        assert!(allow.evaluate(&method, None).is_ok());
    }

    #[test]
    fn test_role_conjunction() {
        let rules = PolicyRuleSet::new(
            vec![PolicyRule::allow("ops", vec![pat("test.v1.OpsService/*")])
                .require_roles(["admin", "ops"])],
            DefaultPolicy::Deny,
        )
        .unwrap();
        let method = id("test.v1.OpsService/Restart");

        assert_eq!(
            rules.evaluate(&method, Some(&user(&["admin"]))),
            Err(Denial::InsufficientRole {
                missing: vec!["ops".to_string()]
            })
        );
        assert!(rules
            .evaluate(&method, Some(&user(&["admin", "ops", "extra"])))
            .is_ok());
        assert_eq!(
            rules.evaluate(&method, None),
            Err(Denial::AuthenticationRequired)
        );
    }

    #[test]
    fn test_authenticated_rule_without_context() {
        let rules = PolicyRuleSet::new(
            vec![PolicyRule::allow("users", vec![pat("test.v1.TestService/GetUser")])],
            DefaultPolicy::Deny,
        )
        .unwrap();

        assert_eq!(
            rules.evaluate(&id("test.v1.TestService/GetUser"), None),
            Err(Denial::AuthenticationRequired)
        );
    }

    #[test]
    fn test_public_rule() {
        let rules = PolicyRuleSet::new(
            vec![PolicyRule::allow("public", vec![pat("test.v1.TestService/Ping")]).public()],
            DefaultPolicy::Deny,
        )
        .unwrap();

        assert!(rules.evaluate(&id("test.v1.TestService/Ping"), None).is_ok());
    }

    #[test]
    fn test_rule_from_config() {
        let cfg = PolicyRuleConfig {
            name: "admins".into(),
            methods: vec!["test.v1.AdminService/*".into()],
            effect: Effect::Allow,
            public: false,
            roles: vec!["admin".into()],
        };
        let rule = PolicyRule::try_from(&cfg).unwrap();
        assert_eq!(rule.access, AccessRequirement::roles(["admin"]));

        let conflicting = PolicyRuleConfig {
            public: true,
            ..cfg.clone()
        };
        assert!(PolicyRule::try_from(&conflicting).is_err());

        let empty = PolicyRuleConfig {
            methods: vec![],
            ..cfg.clone()
        };
        assert!(PolicyRule::try_from(&empty).is_err());

        let bad_pattern = PolicyRuleConfig {
            methods: vec!["AdminService".into()],
            ..cfg
        };
        assert!(matches!(
            PolicyRule::try_from(&bad_pattern),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_rule_config_yaml_shape() {
        let cfg: PolicyRuleConfig = serde_json::from_value(serde_json::json!({
            "name": "health",
            "methods": ["grpc.health.v1.Health/Check"],
            "public": true,
        }))
        .unwrap();
        assert_eq!(cfg.effect, Effect::Allow);
        assert!(PolicyRule::try_from(&cfg).unwrap().access.is_public());
    }

    #[test]
    fn test_empty_roles_degrade_to_authenticated() {
        assert_eq!(
            AccessRequirement::roles(Vec::<String>::new()),
            AccessRequirement::Authenticated
        );
    }
}
