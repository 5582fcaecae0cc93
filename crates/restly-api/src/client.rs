// JSON REST client
//
// Wraps `reqwest::Client` with base-URL resolution, JSON content
// negotiation and status classification. Callers get either a typed
// `Reply` or an `Error`; they never inspect raw responses.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// MIME type used for every request and accepted for every response.
pub const APPLICATION_JSON: &str = "application/json";

// ── Request ──────────────────────────────────────────────────────────

/// A single request to a REST resource.
#[derive(Debug, Clone)]
pub struct RestRequest {
    pub method: Method,
    /// Absolute URL, or a path relative to the client's base URL.
    pub url: String,
    pub content_type: Option<&'static str>,
    pub accept: Option<&'static str>,
    /// Pre-serialized body, sent verbatim.
    pub body: Option<String>,
}

impl RestRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            content_type: None,
            accept: Some(APPLICATION_JSON),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Mark the request as carrying JSON, with or without a body.
    pub fn json_content(mut self) -> Self {
        self.content_type = Some(APPLICATION_JSON);
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

// ── Reply ────────────────────────────────────────────────────────────

/// A non-error outcome of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Any 2xx response. `body` is `None` when the server sent nothing.
    Content { status: StatusCode, body: Option<Value> },
    /// 304 Not Modified.
    NotModified,
}

impl Reply {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Content { status, .. } => *status,
            Self::NotModified => StatusCode::NOT_MODIFIED,
        }
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for JSON REST resources.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Option<Url>,
}

impl RestClient {
    /// Build a client from a `TransportConfig`.
    ///
    /// With a `base_url`, relative request URLs are joined onto it;
    /// without one, every request URL must be absolute.
    pub fn new(base_url: Option<Url>, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Wrap an existing `reqwest::Client` (caller manages TLS and headers).
    pub fn with_client(http: reqwest::Client, base_url: Option<Url>) -> Self {
        Self {
            http,
            base_url: base_url.map(Self::normalize_base_url),
        }
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Ensure the base path ends with `/` so relative joins append to it.
    fn normalize_base_url(mut url: Url) -> Url {
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Resolve a request URL: absolute URLs pass through, anything else is
    /// joined onto the base URL.
    pub fn resolve(&self, raw: &str) -> Result<Url, Error> {
        match Url::parse(raw) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
                Some(base) => Ok(base.join(raw.trim_start_matches('/'))?),
                None => Err(Error::InvalidUrl(url::ParseError::RelativeUrlWithoutBase)),
            },
            Err(e) => Err(e.into()),
        }
    }

    // ── Sending ──────────────────────────────────────────────────────

    /// Send a request and classify the response.
    pub async fn send(&self, request: RestRequest) -> Result<Reply, Error> {
        let url = self.resolve(&request.url)?;
        debug!(method = %request.method, url = %url, "sending request");

        let mut builder = self.http.request(request.method, url);
        if let Some(content_type) = request.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        if let Some(accept) = request.accept {
            builder = builder.header(ACCEPT, accept);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await?;
        Self::handle_response(resp).await
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response(resp: reqwest::Response) -> Result<Reply, Error> {
        let status = resp.status();

        if status == StatusCode::NOT_MODIFIED {
            return Ok(Reply::NotModified);
        }

        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                message: if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                },
            });
        }

        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(Reply::Content { status, body: None });
        }

        let value = serde_json::from_str(&body).map_err(|e| {
            let preview = body.chars().take(200).collect::<String>();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })?;

        Ok(Reply::Content {
            status,
            body: Some(value),
        })
    }
}
