//! Process configuration, read from the environment.
//!
//! `.env` is loaded by the binary before [`Config::from_env`] runs, so every
//! setting below may also come from that file.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::estimation::DEFAULT_MODEL;

/// Default bound on a single model call.
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(15);

const DEFAULT_OVERRIDE_PATH: &str = "config/estimator.runtime.json";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub http: HttpConfig,
    pub store: StoreConfig,
    pub openai: OpenAiConfig,
    /// Deployment label reported by the health endpoint.
    pub environment: String,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Where the runtime override document lives.
    pub override_path: PathBuf,
}

/// Settings for the OpenAI-compatible chat completions API.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Without a key the model stage is skipped.
    pub api_key: Option<SecretString>,
    pub base_url: String,
    /// Default model; the admin override may replace it per call.
    pub model: String,
    pub timeout: Duration,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout_secs: u64 = parse_or(&get, "ESTIMATOR_MODEL_TIMEOUT_SECS", DEFAULT_MODEL_TIMEOUT.as_secs())?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ESTIMATOR_MODEL_TIMEOUT_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            http: HttpConfig {
                host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&get, "PORT", 5000)?,
            },
            store: StoreConfig {
                override_path: get("ESTIMATOR_OVERRIDE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OVERRIDE_PATH)),
            },
            openai: OpenAiConfig {
                api_key: get("OPENAI_API_KEY").map(SecretString::from),
                base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                timeout: Duration::from_secs(timeout_secs),
            },
            environment: get("APP_ENV")
                .or_else(|| get("NODE_ENV"))
                .unwrap_or_else(|| "development".to_string()),
        })
    }
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{}': {}", raw, e),
        }),
        None => Ok(default),
    }
}
