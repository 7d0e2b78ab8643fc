//! HTTP implementation of the remote sync API.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::RecordId;
use crate::util::{compact_text, is_http_url, normalize_text_option};

use super::{Endpoint, PushRequest, PushResponse, RequestCheck, SyncApi};

const CHECK_REQUEST_PATH: &str = "/check-request";

/// reqwest-backed client for the push and liveness endpoints.
#[derive(Debug, Clone)]
pub struct HttpSyncApi {
    base_url: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl HttpSyncApi {
    /// Builds a client for an explicit API base URL.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = normalize_base_url(&base_url.into())?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            access_token: None,
            client,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request.
    #[must_use]
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = normalize_text_option(token);
        self
    }

    /// Returns the base URL this client was configured with.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl SyncApi for HttpSyncApi {
    async fn push(&self, endpoint: &Endpoint, request: &PushRequest) -> Result<PushResponse> {
        let method = parse_method(&endpoint.method)?;
        let url = self.url(&endpoint.path);

        tracing::debug!(
            %url,
            request_id = %request.request_id,
            operations = request.operations.len(),
            "Sending push page"
        );

        let response = self
            .authorize(self.client.request(method, &url))
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(parse_api_error(status, &body)));
        }

        Ok(response.json::<PushResponse>().await?)
    }

    async fn check_request(&self, request_id: &RecordId) -> Result<RequestCheck> {
        let url = format!(
            "{}?requestId={}",
            self.url(CHECK_REQUEST_PATH),
            urlencoding::encode(&request_id.as_str())
        );

        let response = self
            .authorize(self.client.get(&url))
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(parse_api_error(status, &body)));
        }

        let body = response.text().await?;
        parse_check_body(&body)
    }
}

fn parse_check_body(body: &str) -> Result<RequestCheck> {
    let trimmed = body.trim();
    if trimmed == super::NO_REQUEST_SENTINEL {
        return Ok(RequestCheck::NoRequest);
    }

    let value: serde_json::Value = serde_json::from_str(trimmed)?;
    RequestCheck::from_value(&value).ok_or_else(|| {
        Error::Api(format!(
            "Unexpected check-request payload: {}",
            compact_text(trimmed)
        ))
    })
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let base = raw.trim().trim_end_matches('/').to_string();
    if base.is_empty() {
        return Err(Error::InvalidInput(
            "API base URL must not be empty".to_string(),
        ));
    }
    if !is_http_url(&base) {
        return Err(Error::InvalidInput(
            "API base URL must include http:// or https://".to_string(),
        ));
    }
    Ok(base)
}

fn parse_method(raw: &str) -> Result<Method> {
    Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes())
        .map_err(|error| Error::InvalidInput(format!("Unsupported HTTP method {raw}: {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url("").is_err());
        assert!(normalize_base_url("example.com").is_err());
    }

    #[test]
    fn normalize_base_url_trims_trailing_slash() {
        assert_eq!(
            normalize_base_url("https://api.example.com/").unwrap(),
            "https://api.example.com"
        );
    }

    #[test]
    fn url_joins_paths_with_single_slash() {
        let api = HttpSyncApi::new("https://api.example.com/v1/", Duration::from_secs(5)).unwrap();
        assert_eq!(api.url("/sync/orders"), "https://api.example.com/v1/sync/orders");
        assert_eq!(api.url("sync/orders"), "https://api.example.com/v1/sync/orders");
    }

    #[test]
    fn access_token_is_normalized() {
        let api = HttpSyncApi::new("https://api.example.com", Duration::from_secs(5))
            .unwrap()
            .with_access_token(Some("   ".to_string()));
        assert!(api.access_token.is_none());
    }

    #[test]
    fn parse_method_accepts_lowercase() {
        assert_eq!(parse_method("post").unwrap(), Method::POST);
        assert_eq!(parse_method("PATCH").unwrap(), Method::PATCH);
        assert!(parse_method("NOT A METHOD").is_err());
    }

    #[test]
    fn parse_check_body_handles_raw_sentinel_and_json() {
        assert_eq!(
            parse_check_body("NO_REQUEST\n").unwrap(),
            RequestCheck::NoRequest
        );
        assert_eq!(
            parse_check_body("\"NO_REQUEST\"").unwrap(),
            RequestCheck::NoRequest
        );
        assert!(parse_check_body(r#"{"status":"success"}"#)
            .unwrap()
            .is_success());
        assert!(parse_check_body("[]").is_err());
    }

    #[test]
    fn parse_api_error_prefers_message_field() {
        assert_eq!(
            parse_api_error(StatusCode::BAD_REQUEST, r#"{"message":" bad page "}"#),
            "bad page (400)"
        );
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, ""),
            "HTTP 502"
        );
    }
}
