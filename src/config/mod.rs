//! Configuration management for coop-cms
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "COOP_CMS_";

/// Bare secret variable accepted when no prefixed one is set
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";

/// Longest accepted session lifetime (one year)
pub const MAX_TOKEN_TTL_HOURS: u64 = 8760;

/// Longest accepted account lock (one day)
pub const MAX_LOCK_DURATION_SECS: u64 = 86_400;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// OpenTelemetry configuration
    #[serde(default)]
    pub otel: OtelConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // First, expand environment variables in the YAML string
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables with prefix COOP_CMS_
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Server config from env
        if let Ok(host) = std::env::var("COOP_CMS_SERVER_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("COOP_CMS_SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid port number".to_string()))?;
        }

        // Database config from env
        if let Ok(path) = std::env::var("COOP_CMS_DATABASE_PATH") {
            config.database.path = path;
        }

        // Auth config from env
        config.fill_secret_from_env();
        if let Ok(hours) = std::env::var("COOP_CMS_AUTH_TOKEN_TTL_HOURS") {
            config.auth.token_ttl_hours = hours
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid token TTL".to_string()))?;
        }
        if let Ok(secure) = std::env::var("COOP_CMS_AUTH_COOKIE_SECURE") {
            config.auth.cookie_secure = secure.parse().unwrap_or(false);
        }
        if let Ok(single) = std::env::var("COOP_CMS_AUTH_SINGLE_SESSION") {
            config.auth.single_session = single.parse().unwrap_or(false);
        }
        if let (Ok(username), Ok(password)) = (
            std::env::var("COOP_CMS_AUTH_BOOTSTRAP_USERNAME"),
            std::env::var("COOP_CMS_AUTH_BOOTSTRAP_PASSWORD"),
        ) {
            config.auth.bootstrap_admin = Some(BootstrapAdminConfig {
                username,
                password,
                display_name: None,
            });
        }

        // OTEL config from env
        if let Ok(enabled) = std::env::var("COOP_CMS_OTEL_ENABLED") {
            config.otel.enabled = enabled.parse().unwrap_or(false);
        }
        if let Ok(endpoint) = std::env::var("COOP_CMS_OTEL_ENDPOINT") {
            config.otel.endpoint = Some(endpoint);
        }

        Ok(config)
    }

    /// Take the signing secret from the environment when none is configured
    ///
    /// `COOP_CMS_AUTH_JWT_SECRET` wins over `JWT_SECRET`.
    pub fn fill_secret_from_env(&mut self) {
        if !self.auth.jwt_secret.is_empty() && !is_unexpanded(&self.auth.jwt_secret) {
            return;
        }
        let secret = std::env::var(format!("{}AUTH_JWT_SECRET", ENV_PREFIX))
            .or_else(|_| std::env::var(JWT_SECRET_ENV));
        if let Ok(secret) = secret {
            self.auth.jwt_secret = secret;
        }
    }

    /// Check the preconditions the server needs before binding
    pub fn validate(&self) -> Result<(), ConfigError> {
        let secret = self.auth.jwt_secret.trim();
        if secret.is_empty() || is_unexpanded(secret) {
            return Err(ConfigError::MissingRequired("auth.jwt_secret".to_string()));
        }
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&self.auth.token_ttl_hours) {
            return Err(ConfigError::InvalidValue(format!(
                "auth.token_ttl_hours must be between 1 and {}, got {}",
                MAX_TOKEN_TTL_HOURS, self.auth.token_ttl_hours
            )));
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(ConfigError::InvalidValue(format!(
                "auth.bcrypt_cost must be between 4 and 31, got {}",
                self.auth.bcrypt_cost
            )));
        }
        if self.auth.lockout.max_failures == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.lockout.max_failures must be greater than 0".to_string(),
            ));
        }
        if self.auth.lockout.lock_duration_secs > MAX_LOCK_DURATION_SECS {
            return Err(ConfigError::InvalidValue(format!(
                "auth.lockout.lock_duration_secs must be at most {}, got {}",
                MAX_LOCK_DURATION_SECS, self.auth.lockout.lock_duration_secs
            )));
        }
        if let Some(admin) = &self.auth.bootstrap_admin {
            if admin.username.trim().is_empty() || admin.password.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "auth.bootstrap_admin needs a username and a password".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
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

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// HS256 signing secret for session tokens
    #[serde(default)]
    pub jwt_secret: String,

    /// Session token lifetime in hours
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,

    /// bcrypt work factor
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,

    /// Failed-login lockout settings
    #[serde(default)]
    pub lockout: LockoutSettings,

    /// Add `Secure` to the session cookie
    #[serde(default)]
    pub cookie_secure: bool,

    /// Only the most recently issued token of an account is accepted
    #[serde(default)]
    pub single_session: bool,

    /// Admin account created when the account table is empty
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdminConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: default_token_ttl_hours(),
            bcrypt_cost: default_bcrypt_cost(),
            lockout: LockoutSettings::default(),
            cookie_secure: false,
            single_session: false,
            bootstrap_admin: None,
        }
    }
}

impl AuthConfig {
    /// Session token lifetime
    pub fn token_ttl(&self) -> chrono::Duration {
        i64::try_from(self.token_ttl_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .unwrap_or_else(chrono::Duration::max_value)
    }
}

fn default_token_ttl_hours() -> u64 {
    8
}

fn default_bcrypt_cost() -> u32 {
    12
}

/// Lockout thresholds for failed logins
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockoutSettings {
    /// Consecutive failures before the account is locked
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Lock duration (in seconds)
    #[serde(default = "default_lock_duration")]
    pub lock_duration_secs: u64,
}

impl Default for LockoutSettings {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            lock_duration_secs: default_lock_duration(),
        }
    }
}

fn default_max_failures() -> u32 {
    5
}

fn default_lock_duration() -> u64 {
    1800 // 30 minutes
}

/// Initial administrator credentials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BootstrapAdminConfig {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "/data/db/coop-cms.db".to_string()
}

/// OpenTelemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OtelConfig {
    /// Whether OpenTelemetry is enabled
    #[serde(default)]
    pub enabled: bool,

    /// OTLP endpoint URL
    pub endpoint: Option<String>,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            service_name: default_service_name(),
        }
    }
}

fn default_service_name() -> String {
    "coop-cms".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// A `${VAR}` reference left in place because VAR was not set
fn is_unexpanded(value: &str) -> bool {
    value.starts_with("${") && value.ends_with('}')
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_complete_yaml_config() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9090

auth:
  jwt_secret: "s3cret"
  token_ttl_hours: 4
  bcrypt_cost: 10
  lockout:
    max_failures: 3
    lock_duration_secs: 600
  cookie_secure: true
  single_session: true
  bootstrap_admin:
    username: "admin"
    password: "admin1234"
    display_name: "Administrator"

database:
  path: "/tmp/test.db"

otel:
  enabled: true
  endpoint: "http://localhost:4317"
  service_name: "test-service"

logging:
  level: "debug"
  format: "pretty"
"#;

        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);

        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.auth.token_ttl_hours, 4);
        assert_eq!(config.auth.bcrypt_cost, 10);
        assert_eq!(config.auth.lockout.max_failures, 3);
        assert_eq!(config.auth.lockout.lock_duration_secs, 600);
        assert!(config.auth.cookie_secure);
        assert!(config.auth.single_session);
        let admin = config.auth.bootstrap_admin.as_ref().unwrap();
        assert_eq!(admin.username, "admin");
        assert_eq!(admin.display_name.as_deref(), Some("Administrator"));

        assert_eq!(config.database.path, "/tmp/test.db");
        assert!(config.otel.enabled);
        assert_eq!(config.otel.service_name, "test-service");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_applied_to_minimal_yaml() {
        let config = Config::from_yaml("auth:\n  jwt_secret: abc\n").unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.token_ttl_hours, 8);
        assert_eq!(config.auth.bcrypt_cost, 12);
        assert_eq!(config.auth.lockout.max_failures, 5);
        assert_eq!(config.auth.lockout.lock_duration_secs, 1800);
        assert!(!config.auth.cookie_secure);
        assert!(!config.auth.single_session);
        assert!(config.auth.bootstrap_admin.is_none());
        assert_eq!(config.auth.token_ttl(), chrono::Duration::hours(8));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_validate_rejects_missing_secret() {
        let config = Config::default();
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingRequired("auth.jwt_secret".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_unexpanded_secret() {
        let yaml = "auth:\n  jwt_secret: \"${COOP_CMS_TEST_UNSET_SECRET_VAR}\"\n";
        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.auth.jwt_secret, "${COOP_CMS_TEST_UNSET_SECRET_VAR}");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.auth.jwt_secret = "secret".to_string();

        config.auth.bcrypt_cost = 2;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
        config.auth.bcrypt_cost = 12;

        config.auth.token_ttl_hours = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
        config.auth.token_ttl_hours = 8;

        config.auth.bootstrap_admin = Some(BootstrapAdminConfig {
            username: " ".to_string(),
            password: "pw".to_string(),
            display_name: None,
        });
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_validate_rejects_oversized_token_ttl() {
        let yaml = "auth:\n  jwt_secret: secret\n  token_ttl_hours: 1000000000000\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));

        let mut config = config;
        config.auth.token_ttl_hours = MAX_TOKEN_TTL_HOURS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_oversized_lock_duration() {
        let yaml = "auth:\n  jwt_secret: secret\n  lockout:\n    lock_duration_secs: 1000000000000000\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));

        let mut config = config;
        config.auth.lockout.lock_duration_secs = MAX_LOCK_DURATION_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_token_ttl_does_not_wrap() {
        let config = AuthConfig {
            token_ttl_hours: u64::MAX,
            ..Default::default()
        };
        assert!(config.token_ttl() > chrono::Duration::zero());
    }

    #[test]
    fn test_expand_env_vars_in_yaml() {
        std::env::set_var("COOP_CMS_TEST_YAML_SECRET", "from-env");
        std::env::set_var("COOP_CMS_TEST_YAML_DB", "/var/data/cms.db");

        let yaml = r#"
auth:
  jwt_secret: "${COOP_CMS_TEST_YAML_SECRET}"
database:
  path: "${COOP_CMS_TEST_YAML_DB}"
"#;
        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.auth.jwt_secret, "from-env");
        assert_eq!(config.database.path, "/var/data/cms.db");

        std::env::remove_var("COOP_CMS_TEST_YAML_SECRET");
        std::env::remove_var("COOP_CMS_TEST_YAML_DB");
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("COOP_CMS_SERVER_HOST", "localhost");
        std::env::set_var("COOP_CMS_SERVER_PORT", "9999");
        std::env::set_var("COOP_CMS_DATABASE_PATH", "/env/test.db");
        std::env::set_var("COOP_CMS_AUTH_JWT_SECRET", "prefixed-secret");
        std::env::set_var("COOP_CMS_AUTH_SINGLE_SESSION", "true");
        std::env::set_var("COOP_CMS_OTEL_ENABLED", "true");

        let config = Config::from_env().unwrap();

        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.database.path, "/env/test.db");
        assert_eq!(config.auth.jwt_secret, "prefixed-secret");
        assert!(config.auth.single_session);
        assert!(config.otel.enabled);

        std::env::remove_var("COOP_CMS_SERVER_HOST");
        std::env::remove_var("COOP_CMS_SERVER_PORT");
        std::env::remove_var("COOP_CMS_DATABASE_PATH");
        std::env::remove_var("COOP_CMS_AUTH_JWT_SECRET");
        std::env::remove_var("COOP_CMS_AUTH_SINGLE_SESSION");
        std::env::remove_var("COOP_CMS_OTEL_ENABLED");
    }

    #[test]
    fn test_fill_secret_keeps_configured_value() {
        let mut config = Config::default();
        config.auth.jwt_secret = "configured".to_string();

        config.fill_secret_from_env();

        assert_eq!(config.auth.jwt_secret, "configured");
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let result = Config::from_yaml("server: [unclosed");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = Config::from_file("/nonexistent/coop-cms.yaml");
        assert!(matches!(result, Err(ConfigError::FileRead(_))));
    }
}
