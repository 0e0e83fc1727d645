//! Server configuration.

use gym_access_core::{PrimaryRole, User};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

/// Server-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Host to bind to.
    pub host: String,
    /// Log level.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "0.0.0.0".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Address to bind, as `host:port`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parses the configured log level.
    pub fn level(&self) -> Result<tracing::Level, ConfigError> {
        tracing::Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidValue {
            key: "server.log_level".to_string(),
            value: self.log_level.clone(),
        })
    }
}

/// Access control settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessSettings {
    /// Header carrying the authenticated user id.
    pub identity_header: String,
    /// Header carrying the branch a request targets.
    pub branch_header: String,
    /// Seed the standard gym roles on startup.
    pub seed_system_roles: bool,
    /// Base path for access routes.
    pub base_path: String,
}

impl Default for AccessSettings {
    fn default() -> Self {
        Self {
            identity_header: gym_access_axum::DEFAULT_IDENTITY_HEADER.to_string(),
            branch_header: gym_access_axum::DEFAULT_BRANCH_HEADER.to_string(),
            seed_system_roles: true,
            base_path: "/api/access".to_string(),
        }
    }
}

/// A user registered at startup, from a `[[users]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapUser {
    pub id: String,
    pub email: String,
    pub role: PrimaryRole,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub gym_id: Option<String>,
    #[serde(default)]
    pub branch_id: Option<String>,
}

impl BootstrapUser {
    /// Builds the user profile to register.
    pub fn to_user(&self) -> User {
        let mut user = User::new(&self.id, &self.email, self.role);
        user.name = self.name.clone();
        user.gym_id = self.gym_id.clone();
        user.branch_id = self.branch_id.clone();
        user
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub access: AccessSettings,
    /// Users registered on startup when missing.
    pub users: Vec<BootstrapUser>,
}

impl AppConfig {
    /// Checks values serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.level()?;

        for (key, value) in [
            ("access.identity_header", &self.access.identity_header),
            ("access.branch_header", &self.access.branch_header),
        ] {
            if value.trim().is_empty() || axum::http::HeaderName::from_str(value).is_err() {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.clone(),
                });
            }
        }

        if !self.access.base_path.starts_with('/') || self.access.base_path == "/" {
            return Err(ConfigError::InvalidValue {
                key: "access.base_path".to_string(),
                value: self.access.base_path.clone(),
            });
        }

        let mut ids = HashSet::new();
        for (i, user) in self.users.iter().enumerate() {
            let invalid = || ConfigError::InvalidValue {
                key: format!("users[{}]", i),
                value: user.id.clone(),
            };
            user.to_user().validate().map_err(|_| invalid())?;
            if !ids.insert(user.id.as_str()) {
                return Err(invalid());
            }
        }

        Ok(())
    }
}

/// Parses configuration from TOML text. Missing sections use defaults.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from a TOML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::IoError(e.to_string()))?;
    parse_config(&content)
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.access.identity_header, "x-user-id");
        assert!(config.access.seed_system_roles);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_config() {
        let config = parse_config(
            r#"
            [server]
            port = 9100
            log_level = "debug"

            [access]
            branch_header = "x-gym-branch"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.level().unwrap(), tracing::Level::DEBUG);
        assert_eq!(config.access.branch_header, "x-gym-branch");
        assert_eq!(config.access.identity_header, "x-user-id");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.server.addr(), "0.0.0.0:8000");
        assert_eq!(config.access.base_path, "/api/access");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            parse_config("[server]\nlog_level = \"loud\""),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse_config("[access]\nidentity_header = \"not a header\""),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse_config("[server]\nport = \"eighty\""),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_parse_bootstrap_users() {
        let config = parse_config(
            r#"
            [[users]]
            id = "owner"
            email = "owner@example.com"
            role = "admin"
            gym_id = "g1"

            [[users]]
            id = "coach"
            email = "coach@example.com"
            role = "trainer"
            name = "Sam"
            gym_id = "g1"
            branch_id = "downtown"
            "#,
        )
        .unwrap();

        assert_eq!(config.users.len(), 2);
        assert_eq!(config.users[0].role, PrimaryRole::Admin);
        let coach = config.users[1].to_user();
        assert_eq!(coach.name.as_deref(), Some("Sam"));
        assert_eq!(coach.branch_id.as_deref(), Some("downtown"));
    }

    #[test]
    fn test_invalid_bootstrap_users() {
        // A trainer needs a branch.
        assert!(matches!(
            parse_config("[[users]]\nid = \"t\"\nemail = \"t@example.com\"\nrole = \"trainer\"\ngym_id = \"g1\""),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse_config("[[users]]\nid = \"x\"\nemail = \"x@example.com\"\nrole = \"owner\""),
            Err(ConfigError::ParseError(_))
        ));

        let twice = r#"
            [[users]]
            id = "ops"
            email = "ops@example.com"
            role = "super_admin"

            [[users]]
            id = "ops"
            email = "ops2@example.com"
            role = "super_admin"
        "#;
        assert!(matches!(parse_config(twice), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_config("/nonexistent/gym-access.toml"),
            Err(ConfigError::IoError(_))
        ));
    }
}
