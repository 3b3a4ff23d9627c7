//! Method identities and the patterns that match them
//!
//! A method identity is `<package>.<service>/<method>`, the same string gRPC
//! puts in `:path` minus the leading slash. A pattern is either an exact
//! identity or `<package>.<service>/*`. Matching is a plain string compare on
//! the service part; there is no glob engine.

use crate::error::ConfigError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Fully qualified RPC method name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodIdentity {
    full: String,
    split: usize,
}

impl MethodIdentity {
    /// Parse `<package>.<service>/<method>`, accepting a leading `/`
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let invalid = |reason| ConfigError::InvalidMethod {
            input: input.to_string(),
            reason,
        };

        let trimmed = input.strip_prefix('/').unwrap_or(input);
        let (service, method) = trimmed
            .split_once('/')
            .ok_or_else(|| invalid("expected <package>.<service>/<method>"))?;

        validate_service(service).map_err(invalid)?;
        validate_segment(method).map_err(invalid)?;

        Ok(Self {
            full: trimmed.to_string(),
            split: service.len(),
        })
    }

    /// `<package>.<service>`
    pub fn service(&self) -> &str {
        &self.full[..self.split]
    }

    /// Bare method name
    pub fn method(&self) -> &str {
        &self.full[self.split + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.full
    }
}

impl fmt::Display for MethodIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl FromStr for MethodIdentity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for MethodIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.full)
    }
}

impl<'de> Deserialize<'de> for MethodIdentity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Exact method or whole-service wildcard
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MethodPattern {
    Exact(MethodIdentity),
    /// `<package>.<service>/*`; holds the service part only
    Service(String),
}

impl MethodPattern {
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let trimmed = input.strip_prefix('/').unwrap_or(input);

        if let Some(service) = trimmed.strip_suffix("/*") {
            validate_service(service).map_err(|reason| ConfigError::InvalidPattern {
                input: input.to_string(),
                reason,
            })?;
            return Ok(MethodPattern::Service(service.to_string()));
        }

        MethodIdentity::parse(trimmed)
            .map(MethodPattern::Exact)
            .map_err(|err| match err {
                ConfigError::InvalidMethod { reason, .. } => ConfigError::InvalidPattern {
                    input: input.to_string(),
                    reason,
                },
                other => other,
            })
    }

    pub fn matches(&self, method: &MethodIdentity) -> bool {
        match self {
            MethodPattern::Exact(exact) => exact == method,
            MethodPattern::Service(service) => method.service() == service,
        }
    }
}

impl fmt::Display for MethodPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodPattern::Exact(exact) => write!(f, "{exact}"),
            MethodPattern::Service(service) => write!(f, "{service}/*"),
        }
    }
}

/// Methods exempt from authentication and authorization
#[derive(Debug, Clone, Default)]
pub struct SkipList {
    patterns: Vec<MethodPattern>,
}

impl SkipList {
    pub fn new(patterns: Vec<MethodPattern>) -> Self {
        Self { patterns }
    }

    pub fn parse<I, S>(patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| MethodPattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn contains(&self, method: &MethodIdentity) -> bool {
        self.patterns.iter().any(|p| p.matches(method))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn validate_service(service: &str) -> Result<(), &'static str> {
    validate_segment(service)?;
    let (package, name) = service
        .rsplit_once('.')
        .ok_or("service must be qualified by a package")?;
    if package.is_empty() || name.is_empty() || package.split('.').any(str::is_empty) {
        return Err("empty package or service segment");
    }
    Ok(())
}

fn validate_segment(segment: &str) -> Result<(), &'static str> {
    if segment.is_empty() {
        return Err("empty segment");
    }
    if segment
        .chars()
        .any(|c| c.is_whitespace() || c == '/' || c == '*')
    {
        return Err("segment contains whitespace, '/' or '*'");
    }
    Ok(())
}
