//! Typed errors for the HTTP wrapper and the Fyers integration.

/// Failures raised by [`crate::execution::rest_client::RestClient`].
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// Method name outside the allowed verb set. Raised before any I/O.
    #[error("invalid method: {0}")]
    InvalidMethod(String),

    /// Transport failure (connect, TLS, timeout), passed through unchanged.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// 4xx/5xx reply. `body` keeps the raw text for diagnostics.
    #[error("HTTP {status} from {url}: {body}")]
    Status { status: u16, url: String, body: String },

    /// Response body could not be decoded.
    #[error("failed to parse response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl RestError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RestError::Http(e) if e.is_timeout())
    }
}

/// Failures talking to the Fyers APIs.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error(transparent)]
    Rest(#[from] RestError),

    /// Payload with `"s": "error"` (or a negative code).
    #[error("broker rejected request (code {code}): {message}")]
    Api { code: i64, message: String },

    #[error("missing field `{0}` in broker response")]
    MissingField(&'static str),

    #[error("invalid auth code redirect: {0}")]
    AuthCode(String),

    #[error("invalid TOTP secret: {0}")]
    TotpSecret(String),
}
