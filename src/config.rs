use std::env;

use chrono::Duration;
use thiserror::Error;

/// Secrets that ship in samples and `.env` templates. Refused outside development.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "secret",
    "changeme",
    "change-me",
    "your-secret-key",
    "supersecretdevelopmentkey",
];

const MIN_PRODUCTION_SECRET_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" | "test" => Ok(Environment::Development),
            "production" | "prod" | "staging" => Ok(Environment::Production),
            other => Err(ConfigError::Invalid {
                key: "APP_ENV",
                reason: format!("unknown environment `{}`", other),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    /// `None` selects the in-memory store, which is only allowed in development.
    pub database_url: Option<String>,
    pub server_port: u16,
    pub server_host: String,
    pub jwt_secret: String,
    pub token_lifetime: Duration,
    pub bcrypt_cost: u32,
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Reads configuration from the process environment, loading `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// Every check that would otherwise surface as a runtime failure happens here,
    /// so a bad deployment refuses to start instead of misbehaving later.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let environment = match get("APP_ENV") {
            Some(value) => Environment::parse(&value)?,
            None => Environment::Development,
        };

        let database_url = get("DATABASE_URL");
        if database_url.is_none() && environment == Environment::Production {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let server_port = match get("SERVER_PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "SERVER_PORT",
                reason: "must be a number".into(),
            })?,
            None => 8080,
        };
        let server_host = get("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if environment == Environment::Production {
            if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
                return Err(ConfigError::Invalid {
                    key: "JWT_SECRET",
                    reason: "placeholder secrets are not allowed in production".into(),
                });
            }
            if jwt_secret.len() < MIN_PRODUCTION_SECRET_LEN {
                return Err(ConfigError::Invalid {
                    key: "JWT_SECRET",
                    reason: format!("must be at least {} bytes", MIN_PRODUCTION_SECRET_LEN),
                });
            }
        }

        let token_hours: i64 = match get("JWT_EXPIRATION_HOURS") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "JWT_EXPIRATION_HOURS",
                reason: "must be a whole number of hours".into(),
            })?,
            None => 24,
        };
        if token_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "JWT_EXPIRATION_HOURS",
                reason: "must be positive".into(),
            });
        }

        let bcrypt_cost = match get("BCRYPT_COST") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "BCRYPT_COST",
                reason: "must be a number".into(),
            })?,
            None => bcrypt::DEFAULT_COST,
        };
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                reason: "must be between 4 and 31".into(),
            });
        }

        let allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            environment,
            database_url,
            server_port,
            server_host,
            jwt_secret,
            token_lifetime: Duration::hours(token_hours),
            bcrypt_cost,
            allowed_origins,
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup(&[("JWT_SECRET", "dev-secret")])).unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert!(config.database_url.is_none());
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.token_lifetime, Duration::hours(24));
        assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert!(config.allowed_origins.is_empty());
        assert_eq!(config.server_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_config_custom_values() {
        let config = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "dev-secret"),
            ("DATABASE_URL", "postgres://test"),
            ("SERVER_PORT", "3000"),
            ("SERVER_HOST", "0.0.0.0"),
            ("JWT_EXPIRATION_HOURS", "2"),
            ("BCRYPT_COST", "4"),
            ("CORS_ALLOWED_ORIGINS", "http://localhost:3000, https://app.example.com"),
        ]))
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgres://test"));
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.server_host, "0.0.0.0");
        assert_eq!(config.token_lifetime, Duration::hours(2));
        assert_eq!(config.bcrypt_cost, 4);
        assert_eq!(
            config.allowed_origins,
            vec!["http://localhost:3000", "https://app.example.com"]
        );
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        assert_eq!(
            Config::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::Missing("JWT_SECRET")
        );
        assert_eq!(
            Config::from_lookup(lookup(&[("JWT_SECRET", "   ")])).unwrap_err(),
            ConfigError::Missing("JWT_SECRET")
        );
    }

    #[test]
    fn test_production_rejects_weak_setup() {
        let strong = "k3y-that-is-long-enough-for-production-use";

        let err = Config::from_lookup(lookup(&[("APP_ENV", "production"), ("JWT_SECRET", strong)]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));

        let err = Config::from_lookup(lookup(&[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "postgres://prod"),
            ("JWT_SECRET", "supersecretdevelopmentkey"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "JWT_SECRET", .. }));

        let err = Config::from_lookup(lookup(&[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "postgres://prod"),
            ("JWT_SECRET", "short"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "JWT_SECRET", .. }));

        let config = Config::from_lookup(lookup(&[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "postgres://prod"),
            ("JWT_SECRET", strong),
        ]))
        .unwrap();
        assert!(config.is_production());
    }

    #[test]
    fn test_invalid_numbers() {
        let err = Config::from_lookup(lookup(&[("JWT_SECRET", "s"), ("SERVER_PORT", "http")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SERVER_PORT", .. }));

        let err = Config::from_lookup(lookup(&[("JWT_SECRET", "s"), ("JWT_EXPIRATION_HOURS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "JWT_EXPIRATION_HOURS", .. }));

        let err = Config::from_lookup(lookup(&[("JWT_SECRET", "s"), ("BCRYPT_COST", "40")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "BCRYPT_COST", .. }));
    }
}
