//! Runtime knobs read from the environment.
//!
//! Binaries call `dotenvy::dotenv()` first so a local `.env` file can supply
//! any of these.

use std::env;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_IMPORT_BATCH_SIZE: usize = 2000;
pub const DEFAULT_POOL_MAX_SIZE: u32 = 8;
pub const DEFAULT_TICKETING_API_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FEED_DOWNLOAD_TIMEOUT_SECS: u64 = 60 * 30;
pub const DEFAULT_AVAILABILITY_MAX_CONCURRENCY: usize = 4;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {name} is not set")]
    Missing { name: &'static str },
    #[error("environment variable {name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub import_batch_size: usize,
    pub pool_max_size: u32,
    pub ticketing_api_timeout: Duration,
    pub feed_download_timeout: Duration,
    pub availability_max_concurrency: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any key lookup, so tests don't have to touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing {
            name: "DATABASE_URL",
        })?;

        let import_batch_size: usize = parse_or(
            &lookup,
            "GTFS_IMPORT_BATCH_SIZE",
            DEFAULT_IMPORT_BATCH_SIZE,
        )?;

        if import_batch_size == 0 {
            return Err(ConfigError::Invalid {
                name: "GTFS_IMPORT_BATCH_SIZE",
                value: "0".to_string(),
            });
        }

        Ok(Config {
            database_url,
            import_batch_size,
            pool_max_size: parse_or(&lookup, "DB_POOL_MAX_SIZE", DEFAULT_POOL_MAX_SIZE)?,
            ticketing_api_timeout: Duration::from_secs(parse_or(
                &lookup,
                "TICKETING_API_TIMEOUT_SECS",
                DEFAULT_TICKETING_API_TIMEOUT_SECS,
            )?),
            feed_download_timeout: Duration::from_secs(parse_or(
                &lookup,
                "FEED_DOWNLOAD_TIMEOUT_SECS",
                DEFAULT_FEED_DOWNLOAD_TIMEOUT_SECS,
            )?),
            availability_max_concurrency: parse_or(
                &lookup,
                "AVAILABILITY_MAX_CONCURRENCY",
                DEFAULT_AVAILABILITY_MAX_CONCURRENCY,
            )?
            .max(1),
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) if value.trim().is_empty() => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://x")])).unwrap();

        assert_eq!(config.import_batch_size, 2000);
        assert_eq!(config.ticketing_api_timeout, Duration::from_secs(10));
        assert_eq!(config.availability_max_concurrency, 4);
    }

    #[test]
    fn database_url_is_required() {
        assert_eq!(
            Config::from_lookup(lookup_from(&[])),
            Err(ConfigError::Missing {
                name: "DATABASE_URL"
            })
        );
    }

    #[test]
    fn invalid_numbers_name_the_variable() {
        let result = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("GTFS_IMPORT_BATCH_SIZE", "lots"),
        ]));

        assert_eq!(
            result,
            Err(ConfigError::Invalid {
                name: "GTFS_IMPORT_BATCH_SIZE",
                value: "lots".to_string()
            })
        );
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("GTFS_IMPORT_BATCH_SIZE", "0"),
        ]));

        assert!(result.is_err());
    }
}
