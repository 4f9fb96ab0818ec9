use crate::error::BrokerError;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

const STEP_SECS: u64 = 30;
const DIGITS: u32 = 6;

/// RFC 6238 time-based one-time passwords (HMAC-SHA1, 30s step, 6 digits),
/// the scheme behind the Fyers 2FA authenticator secret.
#[derive(Clone)]
pub struct Totp {
    mac: HmacSha1,
}

impl Totp {
    /// Build from a base32 secret. Spaces, padding and lowercase are tolerated.
    pub fn from_base32(secret: &str) -> Result<Self, BrokerError> {
        let cleaned: String = secret
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '=')
            .collect::<String>()
            .to_ascii_uppercase();

        let key = data_encoding::BASE32_NOPAD
            .decode(cleaned.as_bytes())
            .map_err(|e| BrokerError::TotpSecret(e.to_string()))?;
        if key.is_empty() {
            return Err(BrokerError::TotpSecret("empty secret".into()));
        }

        let mac = HmacSha1::new_from_slice(&key)
            .map_err(|e| BrokerError::TotpSecret(e.to_string()))?;
        Ok(Self { mac })
    }

    /// Code valid at `unix_secs`.
    pub fn at(&self, unix_secs: u64) -> String {
        let counter = unix_secs / STEP_SECS;

        let mut mac = self.mac.clone();
        mac.update(&counter.to_be_bytes());
        let hash = mac.finalize().into_bytes();

        // Dynamic truncation
        let offset = (hash[hash.len() - 1] & 0x0f) as usize;
        let code = u32::from_be_bytes([
            hash[offset] & 0x7f,
            hash[offset + 1],
            hash[offset + 2],
            hash[offset + 3],
        ]);

        format!("{:0width$}", code % 10u32.pow(DIGITS), width = DIGITS as usize)
    }

    pub fn now(&self) -> String {
        self.at(Utc::now().timestamp().max(0) as u64)
    }
}
