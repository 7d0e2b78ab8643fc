use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tally_core::config::SyncConfig;
use tally_core::media::{MediaUploader, R2MediaUploader};
use tally_core::remote::HttpSyncApi;
use tally_core::services::SyncStore;
use tally_core::storage::{R2Config, R2Storage};
use tally_core::sync::{PushOrchestrator, SyncProfiles};
use tally_core::{MutationAction, SyncRequest};

use crate::error::CliError;

pub type CliOrchestrator = PushOrchestrator<HttpSyncApi, MediaBackend>;

/// Media uploads go to R2 when it is configured and fail otherwise.
pub enum MediaBackend {
    R2(R2MediaUploader),
    Disabled,
}

impl MediaUploader for MediaBackend {
    async fn upload(
        &self,
        local_uri: &str,
        namespace: &str,
    ) -> tally_core::Result<Option<String>> {
        match self {
            Self::R2(uploader) => uploader.upload(local_uri, namespace).await,
            Self::Disabled => Err(tally_core::Error::Storage(format!(
                "cannot upload {local_uri}: media storage is not configured"
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RequestListItem {
    pub id: String,
    pub entity: String,
    pub status: String,
    pub created_at: i64,
    pub last_sync: i64,
    pub last_sync_iso: String,
}

pub fn request_to_item(request: &SyncRequest) -> RequestListItem {
    RequestListItem {
        id: request.id.to_string(),
        entity: request.entity_name.to_string(),
        status: request.status.to_string(),
        created_at: request.created_at,
        last_sync: request.last_sync,
        last_sync_iso: format_sync_timestamp(request.last_sync),
    }
}

pub fn format_request_lines(requests: &[SyncRequest], now_ms: i64) -> Vec<String> {
    requests
        .iter()
        .map(|request| {
            format!(
                "{}  {:<22}  {:<7}  last sync {}",
                request.id,
                request.entity_name,
                request.status,
                format_relative_time(request.last_sync, now_ms)
            )
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}

/// Parse and validate the JSON payload of a recorded mutation.
pub fn parse_mutation_data(
    action: MutationAction,
    raw: &str,
) -> Result<serde_json::Value, CliError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CliError::InvalidData("payload is empty".to_string()));
    }

    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|error| CliError::InvalidData(format!("payload is not valid JSON: {error}")))?;
    let Some(object) = value.as_object() else {
        return Err(CliError::InvalidData(
            "payload must be a JSON object".to_string(),
        ));
    };

    if action == MutationAction::Update {
        for key in ["filter", "update"] {
            if !object.get(key).is_some_and(serde_json::Value::is_object) {
                return Err(CliError::InvalidData(format!(
                    "update payload needs an object under \"{key}\""
                )));
            }
        }
    }

    Ok(value)
}

/// Payload text from the argument, or stdin when the argument is `-`.
pub fn read_payload(raw: &str) -> Result<String, CliError> {
    if raw != "-" {
        return Ok(raw.to_string());
    }

    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        return Err(CliError::InvalidData(
            "expected JSON on stdin but stdin is a terminal".to_string(),
        ));
    }
    let mut buffer = String::new();
    stdin.read_to_string(&mut buffer)?;
    Ok(buffer)
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("TALLY_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tally")
        .join("tally.db")
}

pub async fn open_store(path: &Path) -> Result<SyncStore, CliError> {
    Ok(SyncStore::open_path(path).await?)
}

pub fn load_sync_config() -> Result<SyncConfig, CliError> {
    SyncConfig::from_env().map_err(|error| CliError::Config(error.to_string()))
}

pub fn media_backend(config: &SyncConfig) -> Result<MediaBackend, CliError> {
    let Some(r2_config) = R2Config::from_env()? else {
        tracing::warn!("R2 is not configured; product image uploads will fail");
        return Ok(MediaBackend::Disabled);
    };

    let storage = R2Storage::new(r2_config);
    Ok(MediaBackend::R2(R2MediaUploader::new(
        storage,
        config.upload_timeout,
    )?))
}

pub fn build_profiles(config: &SyncConfig) -> Result<SyncProfiles, CliError> {
    let mut profiles = SyncProfiles::defaults();
    if let Some(overrides) = config.load_overrides()? {
        profiles.apply_overrides(&overrides);
    }
    Ok(profiles)
}

pub async fn build_orchestrator(
    db_path: &Path,
    config: &SyncConfig,
) -> Result<CliOrchestrator, CliError> {
    let store = open_store(db_path).await?;
    let api = HttpSyncApi::new(config.api_base_url.clone(), config.http_timeout)?
        .with_access_token(config.access_token.clone());
    let uploader = media_backend(config)?;
    let profiles = build_profiles(config)?;

    tracing::debug!(base_url = api.base_url(), "Push orchestrator configured");
    Ok(PushOrchestrator::new(store, api, uploader, profiles))
}
