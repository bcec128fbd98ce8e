use std::{env, str::FromStr, time::Duration};

use url::Url;

use crate::error::ConfigError;

const DEFAULT_TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const DEFAULT_DEBOUNCE_MS: u64 = 500;
const DEFAULT_TRENDING_LIMIT: i64 = 5;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub mongodb_url: String,
    pub mongodb_database: String,
    pub mongodb_collection: String,
    pub redis_url: Option<String>,
    pub tmdb_base_url: Url,
    pub tmdb_api_key: String,
    pub debounce: Duration,
    pub trending_limit: i64,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when a required variable is unset and
    /// [`ConfigError::Invalid`] when a value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let optional = |key: &'static str| lookup(key).filter(|value| !value.is_empty());

        let tmdb_base_url = optional("TMDB_BASE_URL")
            .unwrap_or_else(|| DEFAULT_TMDB_BASE_URL.to_string());
        let tmdb_base_url = Url::parse(&tmdb_base_url).map_err(|_| ConfigError::Invalid {
            key: "TMDB_BASE_URL",
            value: tmdb_base_url.clone(),
        })?;

        Ok(Self {
            port: parse("PORT", &required("PORT")?)?,
            mongodb_url: required("MONGODB_URL")?,
            mongodb_database: optional("MONGODB_DATABASE")
                .unwrap_or_else(|| "movieboard".to_string()),
            mongodb_collection: optional("MONGODB_COLLECTION")
                .unwrap_or_else(|| "metrics".to_string()),
            redis_url: optional("REDIS_URL"),
            tmdb_base_url,
            tmdb_api_key: required("TMDB_API_KEY")?,
            debounce: Duration::from_millis(optional("SEARCH_DEBOUNCE_MS").map_or(
                Ok(DEFAULT_DEBOUNCE_MS),
                |value| parse("SEARCH_DEBOUNCE_MS", &value),
            )?),
            trending_limit: optional("TRENDING_LIMIT").map_or(
                Ok(DEFAULT_TRENDING_LIMIT),
                |value| parse_positive("TRENDING_LIMIT", &value),
            )?,
        })
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

/// MongoDB reads a limit of zero as "no limit", so only positive values are accepted.
fn parse_positive(key: &'static str, value: &str) -> Result<i64, ConfigError> {
    match parse::<i64>(key, value)? {
        limit if limit > 0 => Ok(limit),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}
