//! Environment overrides for the settings structs.
//!
//! Every loader takes a lookup closure so tests can supply variables without
//! touching the process environment; `from_env` wraps `std::env::var`.

use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use scrape_core::AggregationPolicy;
use thiserror::Error;

use crate::client::ClientSettings;
use crate::poller::PollSettings;
use crate::server::ServerSettings;

pub const API_PORT: &str = "API_PORT";
pub const BIND_HOST: &str = "SCRAPE_BIND_HOST";
pub const DB_PATH: &str = "SCRAPE_DB_PATH";
pub const RESPONSE_DELAY_MS: &str = "SCRAPE_RESPONSE_DELAY_MS";
pub const FAILURE_RATE: &str = "SCRAPE_FAILURE_RATE";
pub const SEED: &str = "SCRAPE_SEED";
pub const API_URL: &str = "SCRAPE_API_URL";
pub const REQUEST_TIMEOUT_MS: &str = "SCRAPE_REQUEST_TIMEOUT_MS";
pub const POLL_INTERVAL_MS: &str = "SCRAPE_POLL_INTERVAL_MS";
pub const AGGREGATION: &str = "SCRAPE_AGGREGATION";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0} must not be empty")]
    EmptyRange(&'static str),
}

impl ServerSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        let host: IpAddr = parse(&lookup, BIND_HOST)?.unwrap_or(settings.listen_addr.ip());
        let port: u16 = parse(&lookup, API_PORT)?.unwrap_or(settings.listen_addr.port());
        settings.listen_addr = SocketAddr::new(host, port);

        if let Some(path) = lookup(DB_PATH).filter(|value| !value.trim().is_empty()) {
            settings.db_path = PathBuf::from(path);
        }
        if let Some(ms) = parse::<u64>(&lookup, RESPONSE_DELAY_MS)? {
            settings.response_delay = Duration::from_millis(ms);
        }
        if let Some(rate) = parse::<f64>(&lookup, FAILURE_RATE)? {
            if !(0.0..=1.0).contains(&rate) {
                return Err(invalid(FAILURE_RATE, rate, "expected a value in [0, 1]"));
            }
            settings.store.failure_rate = rate;
        }
        settings.store.seed = parse(&lookup, SEED)?;

        check_range("completion_delay_ms", &settings.store.completion_delay_ms)?;
        check_range("tag_count", &settings.store.tag_count)?;
        check_range("duration_ms", &settings.store.duration_ms)?;
        Ok(settings)
    }
}

impl ClientSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        if let Some(url) = lookup(API_URL).filter(|value| !value.trim().is_empty()) {
            url::Url::parse(url.trim()).map_err(|err| invalid(API_URL, &url, err))?;
            settings.base_url = url.trim().to_string();
        }
        if let Some(ms) = parse::<u64>(&lookup, REQUEST_TIMEOUT_MS)? {
            settings.request_timeout = Duration::from_millis(ms);
        }
        Ok(settings)
    }
}

impl PollSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        if let Some(ms) = parse::<u64>(&lookup, POLL_INTERVAL_MS)? {
            if ms == 0 {
                return Err(invalid(POLL_INTERVAL_MS, ms, "interval must be positive"));
            }
            settings.interval = Duration::from_millis(ms);
        }
        if let Some(policy) = parse::<AggregationPolicy>(&lookup, AGGREGATION)? {
            settings.policy = policy;
        }
        Ok(settings)
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|err| invalid(key, &raw, err)),
    }
}

fn invalid(key: &'static str, value: impl Display, reason: impl Display) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn check_range<T: PartialOrd>(
    name: &'static str,
    range: &RangeInclusive<T>,
) -> Result<(), ConfigError> {
    if range.start() > range.end() {
        return Err(ConfigError::EmptyRange(name));
    }
    Ok(())
}
