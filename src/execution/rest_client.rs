use crate::error::RestError;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// HTTP verbs accepted by [`RestClient`]. Matching is case-insensitive.
pub const VALID_METHODS: [&str; 9] = [
    "GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS", "CONNECT", "TRACE",
];

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A request described as plain data, handed to [`RestClient::send`].
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub json: Option<Value>,
}

impl RestRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            json: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }
}

/// Check a method name against [`VALID_METHODS`].
pub fn validate_method(method: &str) -> Result<Method, RestError> {
    let upper = method.to_ascii_uppercase();
    if !VALID_METHODS.contains(&upper.as_str()) {
        return Err(RestError::InvalidMethod(method.to_string()));
    }
    Method::from_bytes(upper.as_bytes()).map_err(|_| RestError::InvalidMethod(method.to_string()))
}

/// Thin wrapper over `reqwest` used for every outbound call.
///
/// Each request is validated, sent with the client's fixed timeout,
/// rejected on 4xx/5xx, and decoded. Transport errors come back as
/// [`RestError::Http`] without any retry.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl RestClient {
    pub fn new(timeout: Duration) -> Result<Self, RestError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .tcp_keepalive(Some(Duration::from_secs(30)))
            .timeout(timeout)
            .user_agent("Mozilla/5.0")
            .build()?;

        Ok(Self { http, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Underlying client, for calls the request type cannot express (multipart uploads).
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Build the outgoing request without sending it.
    pub fn prepare(&self, req: &RestRequest) -> Result<reqwest::Request, RestError> {
        let method = validate_method(&req.method)?;

        let mut builder = self.http.request(method, &req.url).timeout(self.timeout);
        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(body) = &req.json {
            builder = builder.json(body);
        }

        Ok(builder.build()?)
    }

    async fn fetch(&self, req: &RestRequest) -> Result<(String, Vec<u8>), RestError> {
        let request = self.prepare(req)?;
        let url = request.url().to_string();
        debug!(method = %request.method(), %url, "HTTP request");

        let resp = self.http.execute(request).await?;
        let status = resp.status();
        let body = resp.bytes().await?.to_vec();

        if status.is_client_error() || status.is_server_error() {
            return Err(RestError::Status {
                status: status.as_u16(),
                url,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok((url, body))
    }

    /// Send and decode the body as JSON.
    pub async fn send(&self, req: &RestRequest) -> Result<Value, RestError> {
        self.send_as(req).await
    }

    /// Send and decode the body into `T`.
    pub async fn send_as<T: DeserializeOwned>(&self, req: &RestRequest) -> Result<T, RestError> {
        let (url, body) = self.fetch(req).await?;
        serde_json::from_slice(&body).map_err(|e| RestError::Decode {
            url,
            reason: e.to_string(),
        })
    }

    /// Send and return the body as UTF-8 text (CSV downloads, HTML pages).
    pub async fn send_text(&self, req: &RestRequest) -> Result<String, RestError> {
        let (url, body) = self.fetch(req).await?;
        String::from_utf8(body).map_err(|e| RestError::Decode {
            url,
            reason: e.to_string(),
        })
    }
}
