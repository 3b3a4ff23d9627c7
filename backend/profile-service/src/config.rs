//! Configuration management for Profile Service
//!
//! Loads settings from:
//! 1. An optional config file (`PROFILE_CONFIG`, YAML/TOML/JSON)
//! 2. `PROFILE__*` environment variables, e.g. `PROFILE__SERVER__PORT` or
//!    `PROFILE__AUTH__KEY__SECRET`
//! 3. `.env` file (local development, loaded by the binary)

use grpc_auth_pipeline::{AuthConfig, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_prefix(path, "PROFILE")
    }

    pub fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(prefix)
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.auth.validate()?;
        Ok(settings)
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_file_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            r#"
auth:
  issuer: example
  key:
    algorithm: HS256
    secret: test-secret
"#
        )
        .unwrap();

        let settings = Settings::load_with_prefix(Some(file.path()), "PROFILE_TEST_DEFAULTS").unwrap();
        assert_eq!(settings.bind_address(), ("0.0.0.0".to_string(), 8080));
        assert_eq!(settings.auth.issuer, "example");
        assert!(settings.auth.redaction.skip_streaming);
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/profile-service.yaml");
        let settings = Settings::load_with_prefix(Some(&path), "PROFILE_TEST_SHIPPED").unwrap();
        assert_eq!(settings.auth.skip.len(), 2);
        assert!(settings.auth.skip_list().unwrap().contains(
            &grpc_auth_pipeline::MethodIdentity::parse("example.v1.ProfileService/Ping").unwrap()
        ));
        assert!(!settings.auth.rules.is_empty());
    }
}
