//! Telemetry Client - HTTP fetch of raw charge-point records
//!
//! One GET per invocation, bounded by the configured timeout. The upstream
//! API is not consistent about where it puts the record list, so the body
//! is unwrapped by [`unwrap_records`] rather than deserialized into a fixed
//! type. No retries: a failed fetch fails the invocation.

use reqwest::header::AUTHORIZATION;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{CmsSettings, Credentials, FetchSettings};
use crate::logging::redact_token;

/// Schemes recognised at the start of a token that already carries one.
const SCHEME_PREFIXES: &[&str] = &["Bearer ", "Basic ", "basic "];

/// Object keys known to hold the record list, in lookup order.
const LIST_KEYS: &[&str] = &["data", "Items", "records"];

/// Fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid endpoint URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Server returned status {0}")]
    Status(StatusCode),

    #[error("Response body is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// HTTP client for the charge-management telemetry API
#[derive(Clone)]
pub struct TelemetryClient {
    http: reqwest::Client,
    timeout: Duration,
    limit: usize,
}

impl TelemetryClient {
    /// Create a client using the fetch timeout and record limit from settings
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let timeout = settings.timeout();
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if !settings.use_system_proxy {
            builder = builder.no_proxy();
        }
        let http = builder.build().map_err(FetchError::Http)?;

        Ok(Self {
            http,
            timeout,
            limit: settings.limit,
        })
    }

    /// Fetch the latest records from `endpoint`.
    ///
    /// The `limit` query parameter is replaced with the configured limit.
    pub async fn fetch(
        &self,
        endpoint: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Vec<Value>, FetchError> {
        let url = with_limit(endpoint, self.limit)?;
        info!(
            url = %url,
            limit = self.limit,
            auth_scheme = credentials.map_or("none", |c| c.scheme.as_str()),
            token = %credentials.map_or_else(String::new, |c| redact_token(&c.token)),
            "Fetching telemetry records"
        );

        let mut request = self.http.get(url);
        if let Some(creds) = credentials {
            request = request.header(AUTHORIZATION, authorization_header(&creds.token, &creds.scheme));
        }

        let response = request.send().await.map_err(|e| self.map_transport(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.bytes().await.map_err(|e| self.map_transport(e))?;
        let parsed: Value = serde_json::from_slice(&body)?;
        let records = unwrap_records(parsed);
        info!(records = records.len(), "Fetched telemetry records");
        Ok(records)
    }

    fn map_transport(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Http(err)
        }
    }
}

/// Replace (or add) the `limit` query parameter.
pub fn with_limit(endpoint: &str, limit: usize) -> Result<Url, FetchError> {
    let mut url = parse_url(endpoint)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "limit")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("limit", &limit.to_string());
    Ok(url)
}

/// Authorization header value for a token.
///
/// A token that already starts with a scheme is sent as-is.
pub fn authorization_header(token: &str, scheme: &str) -> String {
    let token = token.trim();
    if SCHEME_PREFIXES.iter().any(|prefix| token.starts_with(prefix)) {
        token.to_string()
    } else {
        format!("{} {}", scheme, token)
    }
}

/// Locate the record list inside a response body.
///
/// - a list is the record list
/// - an object with a list under `data`, `Items` or `records` yields that list
/// - an object with `result` yields it (wrapped when it is a single object)
/// - otherwise the first list-valued key in document order
/// - otherwise the body itself is the only record
pub fn unwrap_records(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let key = LIST_KEYS
                .iter()
                .find(|key| map.get(**key).is_some_and(Value::is_array))
                .map(|key| (*key).to_string())
                .or_else(|| map.contains_key("result").then(|| "result".to_string()))
                .or_else(|| {
                    map.iter()
                        .find(|(_, value)| value.is_array())
                        .map(|(key, _)| key.clone())
                });

            if let Some(ref k) = key {
                debug!(key = %k, "Unwrapping record list from response object");
            }
            match key.and_then(|k| map.remove(&k)) {
                Some(Value::Array(items)) => items,
                Some(single) => vec![single],
                None => vec![Value::Object(map)],
            }
        }
        other => vec![other],
    }
}

/// Build the CMS time-lapsed endpoint URL for one EVSE.
pub fn cms_time_lapsed_url(
    cms: &CmsSettings,
    evse_id: &str,
    limit: usize,
) -> Result<Url, FetchError> {
    let mut url = parse_url(&cms.base_url)?;
    url.query_pairs_mut()
        .append_pair("role", &cms.role)
        .append_pair("operator", &cms.operator)
        .append_pair("evse_id", evse_id)
        .append_pair("connector_id", &cms.connector_id.to_string())
        .append_pair("page", &cms.page.to_string())
        .append_pair("limit", &limit.to_string());
    Ok(url)
}

/// Device label for reports.
///
/// Endpoints addressing a specific EVSE (`evse_id` query parameter) are
/// labelled `{evse_id}_{connector_id}`; anything else keeps `default`.
pub fn device_label(default: &str, endpoint: &str) -> String {
    let Ok(url) = Url::parse(endpoint) else {
        return default.to_string();
    };
    let param = |name: &str| {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    };

    match (param("evse_id"), param("connector_id")) {
        (Some(evse), Some(connector)) => format!("{}_{}", evse, connector),
        (Some(evse), None) => evse,
        _ => default.to_string(),
    }
}

fn parse_url(raw: &str) -> Result<Url, FetchError> {
    Url::parse(raw).map_err(|e| FetchError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}
