//! Runtime configuration for the push pipeline.
//!
//! `SyncConfig` comes from `TALLY_*` environment variables. Per-entity
//! endpoint overrides can be supplied as a JSON file.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::EntityType;
use crate::sync::FlushPolicy;
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const ENV_API_BASE_URL: &str = "TALLY_API_BASE_URL";
const ENV_API_TOKEN: &str = "TALLY_API_TOKEN";
const ENV_PUSH_INTERVAL_SECS: &str = "TALLY_PUSH_INTERVAL_SECS";
const ENV_HTTP_TIMEOUT_SECS: &str = "TALLY_HTTP_TIMEOUT_SECS";
const ENV_UPLOAD_TIMEOUT_SECS: &str = "TALLY_UPLOAD_TIMEOUT_SECS";
const ENV_PROFILES_FILE: &str = "TALLY_PROFILES_FILE";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 20;

/// Settings needed to reach the remote sync API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Base URL every endpoint path is joined onto
    pub api_base_url: String,
    /// Bearer token sent with push and liveness calls
    pub access_token: Option<String>,
    /// Interval between periodic push cycles; `None` disables the timer
    pub push_interval: Option<Duration>,
    /// Timeout for each push or liveness HTTP call
    pub http_timeout: Duration,
    /// Timeout for each media upload
    pub upload_timeout: Duration,
    /// JSON file with per-entity endpoint overrides
    pub profiles_file: Option<PathBuf>,
}

impl SyncConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        parse_config(|key| env::var(key).ok())
    }

    /// Endpoint overrides from `profiles_file`, if one is configured.
    pub fn load_overrides(&self) -> Result<Option<ProfileOverrides>> {
        self.profiles_file
            .as_deref()
            .map(ProfileOverrides::load)
            .transpose()
    }
}

/// Per-entity overrides of the built-in push profiles.
///
/// ```json
/// { "entities": { "orders": { "path": "/v2/orders", "method": "PUT" } } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProfileOverrides {
    #[serde(default)]
    pub entities: BTreeMap<EntityType, ProfileOverride>,
}

/// Fields of an entity profile that may be overridden.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProfileOverride {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub flush: Option<FlushPolicy>,
}

impl ProfileOverrides {
    /// Parse overrides from a JSON payload.
    pub fn from_json(payload: &str) -> Result<Self> {
        let overrides: Self = serde_json::from_str(payload)?;
        for (entity, entry) in &overrides.entities {
            if let Some(path) = &entry.path {
                if !path.starts_with('/') {
                    return Err(Error::InvalidInput(format!(
                        "Endpoint path for {entity} must start with '/': {path}"
                    )));
                }
            }
        }
        Ok(overrides)
    }

    /// Read and parse an overrides file.
    pub fn load(path: &Path) -> Result<Self> {
        let payload = std::fs::read_to_string(path)?;
        Self::from_json(&payload)
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<SyncConfig> {
    let api_base_url = normalize_text_option(lookup(ENV_API_BASE_URL)).ok_or_else(|| {
        Error::InvalidInput(format!("{ENV_API_BASE_URL} must be set"))
    })?;
    if !is_http_url(&api_base_url) {
        return Err(Error::InvalidInput(format!(
            "{ENV_API_BASE_URL} must start with http:// or https://"
        )));
    }

    let push_interval = parse_secs(&lookup, ENV_PUSH_INTERVAL_SECS)?
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);
    let http_timeout = parse_timeout(&lookup, ENV_HTTP_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT_SECS)?;
    let upload_timeout =
        parse_timeout(&lookup, ENV_UPLOAD_TIMEOUT_SECS, DEFAULT_UPLOAD_TIMEOUT_SECS)?;

    Ok(SyncConfig {
        api_base_url: api_base_url.trim_end_matches('/').to_string(),
        access_token: normalize_text_option(lookup(ENV_API_TOKEN)),
        push_interval,
        http_timeout,
        upload_timeout,
        profiles_file: normalize_text_option(lookup(ENV_PROFILES_FILE)).map(PathBuf::from),
    })
}

fn parse_timeout(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default_secs: u64,
) -> Result<Duration> {
    match parse_secs(lookup, key)?.unwrap_or(default_secs) {
        0 => Err(Error::InvalidInput(format!(
            "{key} must be greater than zero"
        ))),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    normalize_text_option(lookup(key))
        .map(|value| {
            value.parse::<u64>().map_err(|error| {
                Error::InvalidInput(format!("{key} must be a whole number of seconds: {error}"))
            })
        })
        .transpose()
}
