//! HTTP transport wrapper shared by every component that talks to the backend.
//!
//! Normalizes credentials handling, body decoding and error-message
//! extraction so callers only ever see a decoded body or a `RequestError`
//! with a user-presentable message.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;

/// Shown when the backend cannot be reached at all.
pub const SERVICE_UNREACHABLE_MESSAGE: &str = "网络异常，请检查后端服务是否启动";

/// Shown in place of raw internal-error messages leaked by the backend.
pub const INTERNAL_ERROR_MESSAGE: &str = "系统异常，请稍后再试";

#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Decode(#[from] serde_json::Error),
    #[error("{message}")]
    Status { message: String, status: StatusCode },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl RequestError {
    /// HTTP status of the response, if the request got that far.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A decoded 2xx response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    pub fn into_json(self) -> Option<Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct RequestOptions {
    /// Treat a 401 as "nobody is signed in" rather than a failure. Used by
    /// the identity bootstrap probe.
    pub allow_unauthorized: bool,
    pub body: Option<Value>,
    /// Extra headers; these override the default JSON content type.
    pub headers: Option<HeaderMap>,
}

/// Thin wrapper around `reqwest::Client` bound to the configured API base.
///
/// Every request carries the session cookie jar, so server-side session
/// state survives across calls exactly like a browser tab.
#[derive(Debug, Clone)]
pub struct RequestClient {
    api_base: String,
    http: reqwest::Client,
}

impl RequestClient {
    pub fn new(config: &Config) -> Result<Self, RequestError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(std::time::Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            api_base: config.api_base.clone(),
            http,
        })
    }

    pub async fn get(&self, path: &str) -> Result<Option<ResponseBody>, RequestError> {
        self.request(Method::GET, path, RequestOptions::default())
            .await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Option<ResponseBody>, RequestError> {
        self.request(
            Method::POST,
            path,
            RequestOptions {
                body: Some(body),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<Option<ResponseBody>, RequestError> {
        self.request(
            Method::PUT,
            path,
            RequestOptions {
                body: Some(body),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete(&self, path: &str) -> Result<Option<ResponseBody>, RequestError> {
        self.request(Method::DELETE, path, RequestOptions::default())
            .await
    }

    /// Issue a request and decode the response.
    ///
    /// 2xx: a 204 or empty body yields `None`; a JSON content type yields
    /// `ResponseBody::Json`, anything else `ResponseBody::Text`.
    ///
    /// Failure: a 401 with `allow_unauthorized` yields `Ok(None)`; every
    /// other non-2xx status becomes `RequestError::Status` with the most
    /// specific message the response offers (JSON `detail`, then `message`,
    /// then `title`, then the raw body, then the status line).
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<Option<ResponseBody>, RequestError> {
        let url = format!("{}{}", self.api_base, path);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(extra) = options.headers {
            for (name, value) in extra.iter() {
                headers.insert(name.clone(), value.clone());
            }
        }

        let mut builder = self.http.request(method.clone(), &url).headers(headers);
        if let Some(body) = &options.body {
            builder = builder.body(serde_json::to_string(body)?);
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED && options.allow_unauthorized {
                return Ok(None);
            }

            let content_type = content_type_of(response.headers());
            let text = response.text().await?;
            let message = extract_error_message(status, &content_type, &text);
            tracing::debug!(%method, path, status = status.as_u16(), "Request failed");
            return Err(RequestError::Status { message, status });
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let content_type = content_type_of(response.headers());
        let text = response.text().await?;
        if text.is_empty() {
            return Ok(None);
        }

        if content_type.contains("application/json") {
            return Ok(Some(ResponseBody::Json(serde_json::from_str(&text)?)));
        }
        Ok(Some(ResponseBody::Text(text)))
    }
}

fn content_type_of(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Resolve the most specific error message a failed response carries.
fn extract_error_message(status: StatusCode, content_type: &str, text: &str) -> String {
    let status_line = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );

    if text.is_empty() {
        return status_line;
    }

    let is_json = content_type.contains("application/json")
        || content_type.contains("application/problem+json")
        || text.trim_start().starts_with('{');

    if is_json {
        if let Ok(payload) = serde_json::from_str::<Value>(text) {
            for field in ["detail", "message", "title"] {
                if let Some(value) = payload.get(field).and_then(Value::as_str) {
                    if !value.is_empty() {
                        return value.to_string();
                    }
                }
            }
            return status_line;
        }
    }
    text.to_string()
}

/// Map a low-level failure to the message shown to the operator.
///
/// Transport failures all collapse into a single "service unreachable" hint;
/// backend 5xx messages containing "system error" are replaced with a generic
/// one. Everything else passes through unchanged. Also used by file-download
/// callers that drive `reqwest` directly and never go through [`RequestClient`].
pub fn format_error_message(error: &RequestError) -> String {
    if let RequestError::Transport(inner) = error {
        if inner.is_connect() || inner.is_timeout() || inner.is_request() {
            return SERVICE_UNREACHABLE_MESSAGE.to_string();
        }
    }

    let message = error.to_string();
    if message.to_lowercase().contains("system error") {
        return INTERNAL_ERROR_MESSAGE.to_string();
    }
    message
}

/// Extract the download filename from a `content-disposition` header value.
///
/// Prefers the RFC 5987 `filename*=charset''percent-encoded` form, falling
/// back to the plain `filename=` parameter.
pub fn content_disposition_filename(header: &str) -> Option<String> {
    for part in header.split(';') {
        if let Some(value) = part.trim().strip_prefix("filename*=") {
            let value = value.trim_matches('"');
            let encoded = value.split_once("''").map(|(_, v)| v).unwrap_or(value);
            if let Ok(decoded) = urlencoding::decode(encoded) {
                return Some(decoded.into_owned());
            }
        }
    }

    for part in header.split(';') {
        if let Some(value) = part.trim().strip_prefix("filename=") {
            let value = value.trim_matches('"');
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    None
}
