//! Operator configuration
//!
//! [`AuthConfig`] is plain serde data. It is loaded with the `config` crate
//! (optional file, then environment overrides) and turned into the runtime
//! pieces by [`AuthConfig::verifier`], [`AuthConfig::skip_list`] and
//! [`AuthConfig::rule_set`]. Any defect is reported at startup.
//!
//! ```yaml
//! issuer: example
//! key:
//!   algorithm: HS256
//!   secret: change-me
//! skip: ["grpc.health.v1.Health/*"]
//! rules:
//!   - name: admin
//!     methods: ["example.v1.AdminService/*"]
//!     roles: [admin]
//! default_policy: deny
//! redaction:
//!   skip_streaming: true
//! ```

use crate::claims::ClaimMapping;
use crate::error::ConfigError;
use crate::method::SkipList;
use crate::policy::{DefaultPolicy, PolicyRuleConfig, PolicyRuleSet};
use crate::verifier::{CredentialVerifier, VerificationKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Key material for the pinned verification algorithm
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm")]
pub enum KeyConfig {
    #[serde(rename = "HS256")]
    Hs256 { secret: String },

    /// Exactly one of the two sources must be set
    #[serde(rename = "RS256")]
    Rs256 {
        #[serde(default)]
        public_key_pem: Option<String>,
        #[serde(default)]
        public_key_path: Option<PathBuf>,
    },
}

impl KeyConfig {
    pub fn verification_key(&self) -> Result<VerificationKey, ConfigError> {
        match self {
            KeyConfig::Hs256 { secret } => VerificationKey::hs256(secret.as_bytes()),
            KeyConfig::Rs256 {
                public_key_pem: Some(pem),
                public_key_path: None,
            } => VerificationKey::rs256_pem(pem.as_bytes()),
            KeyConfig::Rs256 {
                public_key_pem: None,
                public_key_path: Some(path),
            } => {
                let pem = std::fs::read(path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                VerificationKey::rs256_pem(&pem)
            }
            KeyConfig::Rs256 { .. } => Err(ConfigError::InvalidKey(
                "RS256 needs exactly one of public_key_pem or public_key_path".to_string(),
            )),
        }
    }
}

impl fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyConfig::Hs256 { .. } => f
                .debug_struct("Hs256")
                .field("secret", &"[REDACTED]")
                .finish(),
            KeyConfig::Rs256 {
                public_key_pem,
                public_key_path,
            } => f
                .debug_struct("Rs256")
                .field("public_key_pem", &public_key_pem.as_ref().map(|_| "<inline>"))
                .field("public_key_path", public_key_path)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionConfig {
    /// Leave server-streaming responses untouched
    #[serde(default = "default_skip_streaming")]
    pub skip_streaming: bool,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            skip_streaming: default_skip_streaming(),
        }
    }
}

fn default_skip_streaming() -> bool {
    true
}

/// Everything an operator can set for the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Expected `iss` claim
    pub issuer: String,

    pub key: KeyConfig,

    #[serde(default)]
    pub claims: ClaimMapping,

    /// Reject tokens whose `iat`/`nbf` is in the future
    #[serde(default)]
    pub enforce_issued_at: bool,

    /// Method patterns that bypass authentication and authorization
    #[serde(default)]
    pub skip: Vec<String>,

    /// Ordered; first match wins
    #[serde(default)]
    pub rules: Vec<PolicyRuleConfig>,

    #[serde(default)]
    pub default_policy: DefaultPolicy,

    #[serde(default)]
    pub redaction: RedactionConfig,
}

impl AuthConfig {
    /// Minimal HS256 config, everything else at its default
    pub fn hs256(issuer: impl Into<String>, secret: impl Into<String>) -> Self {
        Self::new(
            issuer,
            KeyConfig::Hs256 {
                secret: secret.into(),
            },
        )
    }

    pub fn new(issuer: impl Into<String>, key: KeyConfig) -> Self {
        Self {
            issuer: issuer.into(),
            key,
            claims: ClaimMapping::default(),
            enforce_issued_at: false,
            skip: Vec::new(),
            rules: Vec::new(),
            default_policy: DefaultPolicy::default(),
            redaction: RedactionConfig::default(),
        }
    }

    /// Load from an optional file, then `<PREFIX>__*` environment variables
    ///
    /// Nested keys use `__`, e.g. `AUTH__KEY__SECRET` or
    /// `AUTH__REDACTION__SKIP_STREAMING`. The result is validated.
    pub fn load(path: Option<&Path>, env_prefix: &str) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(env_prefix)
                .separator("__")
                .try_parsing(true),
        );

        let config: AuthConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Run every startup check without keeping the results
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.verifier()?;
        self.skip_list()?;
        self.rule_set()?;
        Ok(())
    }

    pub fn verifier(&self) -> Result<CredentialVerifier, ConfigError> {
        let key = self.key.verification_key()?;
        Ok(CredentialVerifier::new(self.issuer.clone(), key)?
            .with_claim_mapping(self.claims.clone())
            .enforce_issued_at(self.enforce_issued_at))
    }

    pub fn skip_list(&self) -> Result<SkipList, ConfigError> {
        SkipList::parse(&self.skip)
    }

    pub fn rule_set(&self) -> Result<PolicyRuleSet, ConfigError> {
        PolicyRuleSet::from_config(&self.rules, self.default_policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Effect;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::hs256("example", "secret");
        assert_eq!(config.default_policy, DefaultPolicy::Deny);
        assert!(config.redaction.skip_streaming);
        assert!(!config.enforce_issued_at);
        assert_eq!(config.claims, ClaimMapping::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            r#"
issuer: example
key:
  algorithm: HS256
  secret: file-secret
claims:
  roles: groups
skip: ["grpc.health.v1.Health/*"]
rules:
  - name: admin
    methods: ["example.v1.AdminService/*"]
    roles: [admin]
  - name: blocked
    methods: ["example.v1.Legacy/*"]
    effect: deny
default_policy: allow
redaction:
  skip_streaming: false
"#
        )
        .unwrap();

        let config = AuthConfig::load(Some(file.path()), "GAP_TEST_YAML").unwrap();
        assert_eq!(config.issuer, "example");
        assert_eq!(config.claims.roles, "groups");
        assert_eq!(config.claims.name, "name");
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[1].effect, Effect::Deny);
        assert_eq!(config.default_policy, DefaultPolicy::Allow);
        assert!(!config.redaction.skip_streaming);
        assert_eq!(config.rule_set().unwrap().rules().len(), 2);
    }

    #[test]
    fn test_invalid_rule_fails_load() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            r#"
issuer: example
key:
  algorithm: HS256
  secret: s
rules:
  - name: broken
    methods: ["example.v1.Svc/*"]
    public: true
    roles: [admin]
"#
        )
        .unwrap();

        let err = AuthConfig::load(Some(file.path()), "GAP_TEST_BROKEN").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule { .. }));
    }

    #[test]
    fn test_validate_catches_bad_pattern_and_issuer() {
        let mut config = AuthConfig::hs256("example", "secret");
        config.skip = vec!["no-slash".to_string()];
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPattern { .. })));

        let config = AuthConfig::hs256("", "secret");
        assert!(matches!(config.validate(), Err(ConfigError::EmptyIssuer)));
    }

    #[test]
    fn test_rs256_key_sources() {
        let both = KeyConfig::Rs256 {
            public_key_pem: Some("pem".into()),
            public_key_path: Some("/tmp/key.pem".into()),
        };
        assert!(matches!(both.verification_key(), Err(ConfigError::InvalidKey(_))));

        let neither = KeyConfig::Rs256 {
            public_key_pem: None,
            public_key_path: None,
        };
        assert!(neither.verification_key().is_err());

        let missing_file = KeyConfig::Rs256 {
            public_key_pem: None,
            public_key_path: Some("/definitely/not/here.pem".into()),
        };
        assert!(matches!(missing_file.verification_key(), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_debug_hides_secret() {
        let config = AuthConfig::hs256("example", "super-secret-value");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret-value"));
        assert!(rendered.contains("REDACTED"));
    }
}
