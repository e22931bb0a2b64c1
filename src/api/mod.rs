//! HTTP client for the appliance REST API.
//!
//! Every request is bearer-authenticated against a configured base URL.
//! Responses are either wrapped in an envelope (`{"data": T, "meta": {...}}`)
//! or a bare `T`; [`unwrap_envelope`] accepts both so callers never care.

pub mod types;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::api::types::{Ack, ContainerAction};

/// Endpoint paths, relative to the configured base URL
pub mod paths {
    pub const METRICS_SUMMARY: &str = "/api/metrics/summary";
    pub const METRICS_DISK: &str = "/api/metrics/disk";
    pub const METRICS_HISTORY: &str = "/api/metrics/history";
    pub const HEALTH: &str = "/api/health";
    pub const USB_DEVICES: &str = "/api/usb/devices";
    pub const DOCKER_CONTAINERS: &str = "/api/docker/containers";
    pub const DONGLE_STATUS: &str = "/api/dongle/status";
    pub const SETTINGS: &str = "/api/settings/";
    pub const SERVICE_LINKS: &str = "/api/settings/service-links";
    pub const SMTP: &str = "/api/settings/smtp";
    pub const SMTP_STATUS: &str = "/api/settings/smtp/status";
    pub const SMTP_TEST: &str = "/api/settings/smtp/test";
    pub const API_KEYS: &str = "/api/settings/api-keys";
    pub const USERS: &str = "/api/users";
    pub const CHANGE_PASSWORD: &str = "/api/users/me/change-password";
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{path} returned HTTP {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("could not decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The backend answered with `{"data": null}`: it has not collected
    /// this stream yet.
    #[error("{path} has no data yet")]
    EmptySnapshot { path: String },
}

impl ApiError {
    /// HTTP status code, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Freshness metadata the backend attaches to cached streams
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheMeta {
    pub stale: bool,
    pub expired: bool,
    pub age: Option<f64>,
}

/// A response with its envelope removed
#[derive(Clone, Debug, PartialEq)]
pub struct Unwrapped {
    pub data: Value,
    pub meta: Option<CacheMeta>,
}

/// Strip an optional `{ "data": ..., "meta": ... }` envelope.
///
/// An object counts as an envelope only when it has a `data` key and no keys
/// other than `data` and `meta`; anything else is a bare payload.
pub fn unwrap_envelope(value: Value) -> Unwrapped {
    match value {
        Value::Object(mut map)
            if map.contains_key("data") && map.keys().all(|k| k == "data" || k == "meta") =>
        {
            let meta = map
                .remove("meta")
                .and_then(|m| serde_json::from_value::<CacheMeta>(m).ok());
            let data = map.remove("data").unwrap_or(Value::Null);
            Unwrapped { data, meta }
        }
        other => Unwrapped {
            data: other,
            meta: None,
        },
    }
}

/// Decode an already-unwrapped payload into a typed value
pub fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|source| ApiError::Decode {
        path: path.to_string(),
        source,
    })
}

/// Decode an acknowledgement body. The request already succeeded, so a body
/// of another shape only loses the message text.
pub fn decode_ack(path: &str, value: Value) -> Ack {
    decode(path, value).unwrap_or_else(|e| {
        debug!(path, "Unexpected acknowledgement body: {}", e);
        Ack::default()
    })
}

/// Source of unwrapped JSON payloads.
///
/// The poller only needs this one operation, which keeps it testable
/// without a live backend.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// GET `path` and return its payload with any envelope removed
    async fn get_payload(&self, path: &str) -> Result<Value, ApiError>;
}

/// Bearer-authenticated JSON client
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pidash/", env!("PIDASH_VERSION")))
            .build()
            .map_err(ApiError::Client)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and parse the JSON body (`Null` for an empty body)
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Value, ApiError> {
        debug!(method = %method, path, "API request");

        let mut request = self.client.request(method, self.url(path));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let transport = |source: reqwest::Error| ApiError::Transport {
            path: path.to_string(),
            source,
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let text = response.text().await.map_err(transport)?;

        if !status.is_success() {
            return Err(ApiError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
    }

    /// GET and decode, unwrapping any envelope
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let payload = self.get_payload(path).await?;
        decode(path, payload)
    }

    pub async fn post_json<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        let value = self.send(Method::POST, path, Some(body)).await?;
        decode(path, unwrap_envelope(value).data)
    }

    pub async fn put_json<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        let value = self.send(Method::PUT, path, Some(body)).await?;
        decode(path, unwrap_envelope(value).data)
    }

    pub async fn patch_json<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        let value = self.send(Method::PATCH, path, Some(body)).await?;
        decode(path, unwrap_envelope(value).data)
    }

    /// POST with no request body, ignoring the response body
    pub async fn post_empty(&self, path: &str) -> Result<(), ApiError> {
        self.send::<Value>(Method::POST, path, None).await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send::<Value>(Method::DELETE, path, None).await?;
        Ok(())
    }

    // =========================================================================
    // Mutations that are not part of the settings resource
    // =========================================================================

    /// `POST /api/docker/containers/{id}/{action}`
    pub async fn container_action(
        &self,
        container_id: &str,
        action: ContainerAction,
    ) -> Result<Ack, ApiError> {
        let path = format!(
            "{}/{}/{}",
            paths::DOCKER_CONTAINERS,
            urlencoding::encode(container_id),
            action.as_str()
        );
        let value = self.send::<Value>(Method::POST, &path, None).await?;
        Ok(decode_ack(&path, unwrap_envelope(value).data))
    }

    /// `POST /api/dongle/sms/{index}/delete`
    pub async fn delete_sms(&self, index: &str) -> Result<(), ApiError> {
        let path = format!("/api/dongle/sms/{}/delete", urlencoding::encode(index));
        self.post_empty(&path).await
    }
}

#[async_trait]
impl Fetch for ApiClient {
    async fn get_payload(&self, path: &str) -> Result<Value, ApiError> {
        let value = self.send::<Value>(Method::GET, path, None).await?;
        let Unwrapped { data, meta } = unwrap_envelope(value);

        if let Some(meta) = meta.filter(|m| m.stale) {
            debug!(
                path,
                age = ?meta.age,
                expired = meta.expired,
                "Backend served stale data"
            );
        }

        if data.is_null() {
            return Err(ApiError::EmptySnapshot {
                path: path.to_string(),
            });
        }
        Ok(data)
    }
}
