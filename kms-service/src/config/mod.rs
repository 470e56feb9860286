use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct KmsConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    /// OTLP collector; tracing export is off when unset.
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    /// Prefix of the entity lookup routes.
    pub entities_base_path: String,
    pub change_feed: ChangeFeedConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeFeedConfig {
    pub enabled: bool,
    pub queue_size: usize,
}

impl KmsConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = KmsConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("kms-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.trim().is_empty()),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", Some("sqlite://kms.db"), is_prod)?,
                max_connections: parse(get_env("DATABASE_MAX_CONNECTIONS", Some("5"), is_prod)?)?,
                min_connections: parse(get_env("DATABASE_MIN_CONNECTIONS", Some("1"), is_prod)?)?,
            },
            entities_base_path: get_env("ENTITIES_BASE_PATH", Some("/entities"), is_prod)?,
            change_feed: ChangeFeedConfig {
                enabled: get_env("CHANGE_FEED_ENABLED", Some("true"), is_prod)?
                    .parse()
                    .unwrap_or(true),
                queue_size: parse(get_env("CHANGE_FEED_QUEUE_SIZE", Some("64"), is_prod)?)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Settings for tests and local tooling: in-memory database, feed on.
    pub fn for_tests() -> Self {
        KmsConfig {
            common: core_config::Config::default(),
            environment: Environment::Dev,
            service_name: "kms-service".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "debug".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
                min_connections: 1,
            },
            entities_base_path: "/entities".to_string(),
            change_feed: ChangeFeedConfig {
                enabled: true,
                queue_size: 16,
            },
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.database.max_connections == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MAX_CONNECTIONS must be positive"
            )));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MIN_CONNECTIONS cannot exceed DATABASE_MAX_CONNECTIONS"
            )));
        }

        if self.change_feed.queue_size == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "CHANGE_FEED_QUEUE_SIZE must be positive"
            )));
        }

        if !self.entities_base_path.starts_with('/') {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ENTITIES_BASE_PATH must start with '/'"
            )));
        }

        if self.environment == Environment::Prod && self.database.url.contains(":memory:") {
            tracing::error!("In-memory replica in production loses all state on restart");
        }

        Ok(())
    }
}

fn parse<T>(value: String) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!(e.to_string())))
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(KmsConfig::for_tests().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_port() {
        let mut config = KmsConfig::for_tests();
        config.common.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_connections_and_queue() {
        let mut config = KmsConfig::for_tests();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = KmsConfig::for_tests();
        config.change_feed.queue_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_relative_base_path() {
        let mut config = KmsConfig::for_tests();
        config.entities_base_path = "entities".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("PROD".parse::<Environment>(), Ok(Environment::Prod));
        assert!("staging".parse::<Environment>().is_err());
    }
}
