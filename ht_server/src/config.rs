//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use holdem_tables::{
    db::DatabaseConfig,
    table::{TableConfig, TableSpeed},
};
use std::net::SocketAddr;

const DEFAULT_PORT: u16 = 6969;

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration; `None` runs everything in memory
    pub database: Option<DatabaseConfig>,
    /// Defaults for tables created without a full config
    pub table_defaults: TableConfig,
    /// Accounts seeded when running in memory
    pub demo_accounts: DemoAccountsConfig,
}

/// In-memory accounts created at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoAccountsConfig {
    /// Users 1..=count are created
    pub count: i64,
    /// Balance each demo user starts with
    pub starting_balance: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Returns
    ///
    /// * `Result<ServerConfig, ConfigError>` - Loaded configuration or error
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but can't be parsed, or the
    /// resulting table defaults are invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_env_or(
                "SERVER_BIND",
                SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            )?,
        };

        let database = match database_url_override {
            Some(database_url) => Some(DatabaseConfig {
                database_url,
                ..DatabaseConfig::from_env().unwrap_or_default()
            }),
            None => DatabaseConfig::from_env(),
        };

        let speed = match std::env::var("TABLE_SPEED") {
            Ok(value) => parse_speed(&value)?,
            Err(_) => TableSpeed::Normal,
        };

        let defaults = TableConfig::default();
        let table_defaults = TableConfig {
            name: std::env::var("TABLE_NAME").unwrap_or(defaults.name),
            max_players: parse_env_or("TABLE_MAX_PLAYERS", defaults.max_players)?,
            small_blind: parse_env_or("TABLE_SMALL_BLIND", defaults.small_blind)?,
            big_blind: parse_env_or("TABLE_BIG_BLIND", defaults.big_blind)?,
            max_buy_in: parse_env_or("TABLE_MAX_BUY_IN", defaults.max_buy_in)?,
            speed,
            auto_start_next_hand: parse_env_or(
                "TABLE_AUTO_START",
                defaults.auto_start_next_hand,
            )?,
        };

        let demo_accounts = DemoAccountsConfig {
            count: parse_env_or("DEMO_ACCOUNTS", 10)?,
            starting_balance: parse_env_or("DEMO_STARTING_BALANCE", 10_000)?,
        };

        let config = ServerConfig {
            bind,
            database,
            table_defaults,
            demo_accounts,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.table_defaults
            .validate()
            .map_err(|reason| ConfigError::Invalid {
                var: "TABLE_*".to_string(),
                reason,
            })?;

        if self.demo_accounts.count < 0 {
            return Err(ConfigError::Invalid {
                var: "DEMO_ACCOUNTS".to_string(),
                reason: "Must not be negative".to_string(),
            });
        }

        if self.demo_accounts.starting_balance < 0 {
            return Err(ConfigError::Invalid {
                var: "DEMO_STARTING_BALANCE".to_string(),
                reason: "Must not be negative".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn parse_speed(value: &str) -> Result<TableSpeed, ConfigError> {
    match value.to_lowercase().as_str() {
        "normal" => Ok(TableSpeed::Normal),
        "turbo" => Ok(TableSpeed::Turbo),
        "hyper" => Ok(TableSpeed::Hyper),
        other => Err(ConfigError::Invalid {
            var: "TABLE_SPEED".to_string(),
            reason: format!("unknown speed '{other}' (normal, turbo or hyper)"),
        }),
    }
}

/// Helper to parse environment variable with default fallback. A value
/// that is present but unparseable is an error.
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("can't parse '{value}'"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServerConfig {
        ServerConfig {
            bind: "127.0.0.1:8080".parse().unwrap(),
            database: None,
            table_defaults: TableConfig::default(),
            demo_accounts: DemoAccountsConfig {
                count: 2,
                starting_balance: 1000,
            },
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            var: "TABLE_SPEED".to_string(),
            reason: "unknown speed".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("TABLE_SPEED"));
        assert!(msg.contains("unknown speed"));
    }

    #[test]
    fn test_config_validation_accepts_defaults() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_big_blind_too_small() {
        let mut config = config();
        config.table_defaults.small_blind = 20;
        config.table_defaults.big_blind = 10;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_config_validation_negative_balance() {
        let mut config = config();
        config.demo_accounts.starting_balance = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_speed() {
        assert_eq!(parse_speed("Turbo").unwrap(), TableSpeed::Turbo);
        assert!(parse_speed("ludicrous").is_err());
    }

    #[test]
    fn test_parse_env_or_falls_back_when_unset() {
        let value: u64 = parse_env_or("HT_SERVER_TEST_SURELY_UNSET", 42).unwrap();
        assert_eq!(value, 42);
    }
}
