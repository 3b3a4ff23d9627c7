//! Per-call access decision
//!
//! Resolution order for a method:
//!
//! 1. declarative metadata from the [`DescriptorRegistry`] (override map)
//! 2. the first matching rule of the [`PolicyRuleSet`]
//! 3. the default policy
//!
//! The authorizer is immutable and holds no per-call state.

use crate::context::AuthContext;
use crate::descriptor::DescriptorRegistry;
use crate::error::Denial;
use crate::method::MethodIdentity;
use crate::policy::{AccessRequirement, DefaultPolicy, Effect, PolicyRule, PolicyRuleSet, RuleSource};
use std::collections::HashMap;
use std::fmt;

/// What decided a call
#[derive(Debug, Clone, Copy)]
pub enum Resolution<'a> {
    Metadata(&'a AccessRequirement),
    Rule(&'a PolicyRule),
    Default(DefaultPolicy),
}

impl Resolution<'_> {
    /// Whether the method can be called without a credential
    pub fn is_public(&self) -> bool {
        match self {
            Resolution::Metadata(access) => access.is_public(),
            Resolution::Rule(rule) => rule.effect == Effect::Allow && rule.access.is_public(),
            Resolution::Default(_) => false,
        }
    }

    pub fn evaluate(&self, ctx: Option<&AuthContext>) -> Result<(), Denial> {
        match self {
            Resolution::Metadata(access) => access.check(ctx),
            Resolution::Rule(rule) => rule.evaluate(ctx),
            Resolution::Default(DefaultPolicy::Allow) => Ok(()),
            Resolution::Default(DefaultPolicy::Deny) => Err(Denial::DefaultDeny),
        }
    }
}

impl fmt::Display for Resolution<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Metadata(_) => f.write_str("metadata"),
            Resolution::Rule(rule) => write!(f, "rule:{}", rule.name),
            Resolution::Default(DefaultPolicy::Allow) => f.write_str("default:allow"),
            Resolution::Default(DefaultPolicy::Deny) => f.write_str("default:deny"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Authorizer {
    metadata: HashMap<MethodIdentity, AccessRequirement>,
    rules: PolicyRuleSet,
}

impl Authorizer {
    pub fn new(rules: PolicyRuleSet) -> Self {
        Self {
            metadata: HashMap::new(),
            rules,
        }
    }

    /// Take the access metadata of every method in `descriptors`
    pub fn with_descriptors(mut self, descriptors: &DescriptorRegistry) -> Self {
        self.metadata = descriptors
            .methods()
            .filter_map(|m| m.access.clone().map(|access| (m.method.clone(), access)))
            .collect();
        self
    }

    /// Add or replace the metadata for a single method
    pub fn with_metadata(mut self, method: MethodIdentity, access: AccessRequirement) -> Self {
        self.metadata.insert(method, access);
        self
    }

    pub fn rules(&self) -> &PolicyRuleSet {
        &self.rules
    }

    pub fn resolve(&self, method: &MethodIdentity) -> Resolution<'_> {
        if let Some(access) = self.metadata.get(method) {
            return Resolution::Metadata(access);
        }
        match self.rules.resolve(method) {
            RuleSource::Rule(rule) => Resolution::Rule(rule),
            RuleSource::Default(policy) => Resolution::Default(policy),
        }
    }

    /// Decide whether `ctx` may call `method`
    pub fn authorize(&self, method: &MethodIdentity, ctx: Option<&AuthContext>) -> Result<(), Denial> {
        let resolution = self.resolve(method);
        let decision = resolution.evaluate(ctx);

        tracing::debug!(
            method = %method,
            source = %resolution,
            allowed = decision.is_ok(),
            "authorization decision"
        );

        decision
    }
}
