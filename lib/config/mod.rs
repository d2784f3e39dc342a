use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] env::VarError),

    #[error("Invalid value for {0}: {1}")]
    InvalidDayCount(&'static str, String),
}

pub struct Config {
    pub es_url: String,
    pub es_username: String,
    pub es_password: String,
    /// Index holding the raw activity events
    pub index_datastream: String,
    /// Index the pseudonym identity records are written to
    pub index_identities: String,
    /// Width of the aggregation window in days. Default: 1
    pub days_to_count: i64,
    /// Identity records with no activity for this many days get purged. Default: 30
    pub kill_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let es_url = required("ES_URL")?;
        let es_username = required("ES_USERNAME")?;
        let es_password = required("ES_PASSWORD")?;
        let index_datastream = required("INDEX_DATASTREAM")?;
        let index_identities = required("INDEX_IDENTITIES")?;

        let days_to_count = day_count("DAYS_TO_COUNT", env::var("DAYS_TO_COUNT").ok(), 1)?;
        let kill_days = day_count("KILL_DAYS", env::var("KILL_DAYS").ok(), 30)?;

        Ok(Self {
            es_url,
            es_username,
            es_password,
            index_datastream,
            index_identities,
            days_to_count,
            kill_days,
        })
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn day_count(
    name: &'static str,
    value: Option<String>,
    default: i64,
) -> Result<i64, ConfigError> {
    match value {
        Some(val) => match val.parse::<i64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::InvalidDayCount(name, val)),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_count_defaults_when_unset() {
        assert_eq!(day_count("DAYS_TO_COUNT", None, 1).unwrap(), 1);
        assert_eq!(day_count("KILL_DAYS", None, 30).unwrap(), 30);
    }

    #[test]
    fn day_count_parses_positive_integers() {
        assert_eq!(
            day_count("DAYS_TO_COUNT", Some("14".to_string()), 1).unwrap(),
            14
        );
    }

    #[test]
    fn day_count_rejects_garbage_and_non_positive() {
        assert!(day_count("KILL_DAYS", Some("soon".to_string()), 30).is_err());
        assert!(day_count("KILL_DAYS", Some("0".to_string()), 30).is_err());
        assert!(day_count("KILL_DAYS", Some("-3".to_string()), 30).is_err());
    }
}
