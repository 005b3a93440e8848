// src/config.rs
use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_COINCAP_BASE_URL: &str = "https://rest.coincap.io";
const DEFAULT_SCYLLA_NODE: &str = "127.0.0.1:9042";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3030";
const DEFAULT_TOKEN_TTL_SECS: u64 = 86_400;
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub coincap_api_key: String,
    pub coincap_base_url: String,
    pub scylla_node: String,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub refresh_interval: Duration,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let or_default =
            |key: &'static str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let bind_raw = or_default("BIND_ADDR", DEFAULT_BIND_ADDR);
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            key: "BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        Ok(Self {
            coincap_api_key: required("COINCAP_API_KEY")?,
            coincap_base_url: or_default("COINCAP_BASE_URL", DEFAULT_COINCAP_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            scylla_node: or_default("SCYLLA_NODE", DEFAULT_SCYLLA_NODE),
            bind_addr,
            jwt_secret: required("JWT_SECRET")?,
            token_ttl: seconds(&lookup, "TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?,
            refresh_interval: seconds(
                &lookup,
                "REFRESH_INTERVAL_SECS",
                DEFAULT_REFRESH_INTERVAL_SECS,
            )?,
        })
    }
}

fn seconds<F>(lookup: &F, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(Duration::from_secs(default)),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(ConfigError::Invalid { key, value: raw }),
        },
    }
}
