use crate::config::FyersConfig;
use crate::error::BrokerError;
use crate::execution::fyers_client::{check_response, ist_today};
use crate::execution::retry::RetryPolicy;
use crate::execution::rest_client::{RestClient, RestRequest};
use crate::execution::totp::Totp;
use crate::storage::session::SessionStore;
use crate::telemetry::alerts::AlertManager;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;

/// Credentials for the trading API after a completed login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub client_id: String,
    pub access_token: String,
    /// Exchange date the token was issued; tokens expire overnight.
    pub created_on: NaiveDate,
}

impl Session {
    pub fn is_current(&self, today: NaiveDate) -> bool {
        self.created_on == today && !self.access_token.is_empty()
    }
}

/// `sha256("<client_id>:<secret_key>")` as lowercase hex.
pub fn app_id_hash(client_id: &str, secret_key: &str) -> String {
    hex::encode(Sha256::digest(format!("{client_id}:{secret_key}").as_bytes()))
}

/// Pull `auth_code` out of the redirect URL returned by `/token`.
pub fn extract_auth_code(redirect: &str) -> Result<String, BrokerError> {
    let parsed =
        url::Url::parse(redirect).map_err(|e| BrokerError::AuthCode(format!("{redirect}: {e}")))?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == "auth_code")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BrokerError::AuthCode(format!("no auth_code in {redirect}")))
}

fn str_field(value: &Value, pointer: &str, name: &'static str) -> Result<String, BrokerError> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or(BrokerError::MissingField(name))
}

/// Headless Fyers login: OTP request, TOTP, PIN, auth code, token exchange.
pub struct FyersLogin {
    config: FyersConfig,
    client: RestClient,
    alerts: Arc<AlertManager>,
    retry: RetryPolicy,
}

impl FyersLogin {
    pub fn new(config: FyersConfig, client: RestClient, alerts: Arc<AlertManager>) -> Self {
        Self {
            config,
            client,
            alerts,
            retry: RetryPolicy::login(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run the whole flow, retrying from the first step on any failure.
    pub async fn login(&self) -> Result<Session, BrokerError> {
        let session = self.retry.run("Fyers login", || self.attempt()).await?;
        self.alerts.send("Login successful!").await;
        Ok(session)
    }

    /// Today's cached session, or a fresh login that is then cached.
    pub async fn session(&self, store: &SessionStore) -> anyhow::Result<Session> {
        if let Some(session) = store.load_current(ist_today()) {
            return Ok(session);
        }
        let session = self.login().await?;
        store.save(&session)?;
        Ok(session)
    }

    async fn step(&self, name: &str, req: RestRequest) -> Result<Value, BrokerError> {
        let value = check_response(self.client.send(&req).await?)?;
        if let Some(message) = value.get("message").and_then(Value::as_str).filter(|m| !m.is_empty()) {
            self.alerts.send(&format!("{name} successful: {message}")).await;
        }
        info!("{name} done");
        Ok(value)
    }

    async fn attempt(&self) -> Result<Session, BrokerError> {
        let cfg = &self.config;
        let login = cfg.login_host.trim_end_matches('/');
        let api = cfg.api_host.trim_end_matches('/');
        let totp = Totp::from_base32(&cfg.totp_key)?;

        let otp = self
            .step(
                "Send login OTP",
                RestRequest::post(format!("{login}/send_login_otp"))
                    .json(json!({ "fy_id": cfg.fy_id, "app_id": cfg.app_id })),
            )
            .await?;
        let request_key = str_field(&otp, "/request_key", "request_key")?;

        let verified = self
            .step(
                "Verify TOTP",
                RestRequest::post(format!("{login}/verify_otp"))
                    .json(json!({ "request_key": request_key, "otp": totp.now() })),
            )
            .await?;
        let request_key = str_field(&verified, "/request_key", "request_key")?;

        let pin = self
            .step(
                "Verify PIN",
                RestRequest::post(format!("{login}/verify_pin")).json(json!({
                    "request_key": request_key,
                    "identity_type": "pin",
                    "identifier": cfg.pin,
                    "recaptcha_token": "",
                })),
            )
            .await?;
        let bearer = str_field(&pin, "/data/access_token", "data.access_token")?;

        let token = self
            .step(
                "Generate Auth Code",
                RestRequest::post(format!("{api}/token"))
                    .header("Authorization", format!("Bearer {bearer}"))
                    .json(json!({
                        "fyers_id": cfg.fy_id,
                        "app_id": cfg.app_id,
                        "redirect_uri": cfg.redirect_uri,
                        "appType": cfg.app_type,
                        "code_challenge": "",
                        "state": "None",
                        "scope": "",
                        "nonce": "",
                        "response_type": "code",
                        "create_cookie": true,
                    })),
            )
            .await?;
        let auth_code = extract_auth_code(&str_field(&token, "/Url", "Url")?)?;

        let client_id = cfg.client_id();
        let exchanged = self
            .step(
                "Generate Access Token",
                RestRequest::post(format!("{api}/validate-authcode")).json(json!({
                    "grant_type": "authorization_code",
                    "appIdHash": app_id_hash(&client_id, &cfg.secret_key),
                    "code": auth_code,
                })),
            )
            .await?;

        Ok(Session {
            client_id,
            access_token: str_field(&exchanged, "/access_token", "access_token")?,
            created_on: ist_today(),
        })
    }
}
