use anyhow::Context;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{accounts::repo_types::Account, config::JwtConfig};

/// Issues bearer tokens for accounts that already passed authentication.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, account: &Account) -> anyhow::Result<String>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // account id
    pub iat: usize,  // issued at
    pub exp: usize,  // expires at
    pub iss: String, // issuer
    pub aud: String, // audience
}

#[derive(Clone)]
pub struct JwtIssuer {
    encoding: EncodingKey,
    issuer: String,
    audience: String,
    ttl: TimeDuration,
}

impl JwtIssuer {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl: TimeDuration::seconds(config.ttl_minutes.clamp(0, i64::MAX / 60) * 60),
        }
    }
}

impl TokenIssuer for JwtIssuer {
    fn issue(&self, account: &Account) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now
            .checked_add(self.ttl)
            .context("token expiry out of range")?;
        let claims = Claims {
            sub: account.id.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(account_id = account.id, "jwt signed");
        Ok(token)
    }
}
