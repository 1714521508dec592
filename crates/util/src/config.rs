use std::{env, fmt, net::SocketAddr};

use super::{database_url, server_bind_address};

const DEFAULT_ADMIN_USER: &str = "admin";
const DEFAULT_ADMIN_PASSWORD: &str = "password";
const DEFAULT_TIMEZONE: &str = "UTC";

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns `true` when the current environment should behave as development.
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Username/password pair accepted by the operator login check.
#[derive(Clone, PartialEq, Eq)]
pub struct OperatorCredentials {
    pub username: String,
    pub password: String,
}

impl OperatorCredentials {
    /// Returns `true` when the built-in fallback pair is still in use.
    pub fn is_default(&self) -> bool {
        self.username == DEFAULT_ADMIN_USER && self.password == DEFAULT_ADMIN_PASSWORD
    }
}

impl fmt::Debug for OperatorCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub database_url: String,
    pub operator: OperatorCredentials,
    /// IANA timezone name used when rendering dates in reports and day filters.
    pub timezone: String,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;

        let username =
            env::var("APP_ADMIN_USER").unwrap_or_else(|_| DEFAULT_ADMIN_USER.to_string());
        let password =
            env::var("APP_ADMIN_PASSWORD").unwrap_or_else(|_| DEFAULT_ADMIN_PASSWORD.to_string());
        if username.trim().is_empty() {
            return Err(ConfigError::EmptyValue("APP_ADMIN_USER"));
        }
        if password.is_empty() {
            return Err(ConfigError::EmptyValue("APP_ADMIN_PASSWORD"));
        }

        let timezone = env::var("APP_TIMEZONE").unwrap_or_else(|_| DEFAULT_TIMEZONE.to_string());
        if timezone.trim().is_empty() {
            return Err(ConfigError::EmptyValue("APP_TIMEZONE"));
        }

        Ok(Self {
            bind_addr,
            environment,
            database_url: database_url(),
            operator: OperatorCredentials { username, password },
            timezone,
        })
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    EmptyValue(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::EmptyValue(name) => write!(f, "{name} must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ENV_GUARD;
    use crate::{DEFAULT_BIND_ADDR, DEFAULT_DATABASE_URL};

    fn clear_env() {
        for name in [
            "APP_ENV",
            "APP_BIND_ADDR",
            "APP_DATABASE_URL",
            "APP_ADMIN_USER",
            "APP_ADMIN_PASSWORD",
            "APP_TIMEZONE",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn loads_defaults_in_development() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();

        let config = AppConfig::from_env().expect("config should load with defaults");
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert!(config.operator.is_default());
        assert_eq!(config.timezone, "UTC");
    }

    #[test]
    fn rejects_invalid_environment() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        env::set_var("APP_ENV", "invalid");

        let err = AppConfig::from_env().expect_err("invalid env should error");
        assert!(matches!(err, ConfigError::InvalidEnvironment(value) if value == "invalid"));

        clear_env();
    }

    #[test]
    fn parses_production_environment() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        env::set_var("APP_ENV", "production");
        env::set_var("APP_BIND_ADDR", "0.0.0.0:9000");
        env::set_var("APP_ADMIN_USER", "operator");
        env::set_var("APP_ADMIN_PASSWORD", "s3cret");
        env::set_var("APP_TIMEZONE", "Europe/Madrid");

        let config = AppConfig::from_env().expect("config should load");
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:9000");
        assert_eq!(config.operator.username, "operator");
        assert!(!config.operator.is_default());
        assert_eq!(config.timezone, "Europe/Madrid");

        clear_env();
    }

    #[test]
    fn rejects_empty_admin_password() {
        let _guard = ENV_GUARD.lock().expect("env guard poisoned");
        clear_env();
        env::set_var("APP_ADMIN_PASSWORD", "");

        let err = AppConfig::from_env().expect_err("empty password should error");
        assert!(matches!(err, ConfigError::EmptyValue("APP_ADMIN_PASSWORD")));

        clear_env();
    }

    #[test]
    fn debug_output_redacts_password() {
        let credentials = OperatorCredentials {
            username: "admin".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }
}
