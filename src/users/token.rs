use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use sha2::Sha256;

use crate::config::JwtSecret;
use crate::types::{ModelError, ModelResult, ValidationError};

use super::models::UserId;

pub const TOKEN_LIFETIME_DAYS: i64 = 60;

/// Payload carried by every user token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub id: UserId,
    pub username: String,
    pub exp: i64,
}

impl Claims {
    pub fn new(id: UserId, username: &str) -> Claims {
        let exp = Utc::now() + Duration::days(TOKEN_LIFETIME_DAYS);
        Claims {
            id,
            username: username.to_string(),
            exp: exp.timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }
}

fn signing_key(secret: &JwtSecret) -> ModelResult<Hmac<Sha256>> {
    if secret.is_empty() {
        return Err(ModelError::MissingSecret);
    }
    Hmac::new_from_slice(secret.as_bytes()).map_err(|_| ModelError::MissingSecret)
}

pub fn sign(claims: &Claims, secret: &JwtSecret) -> ModelResult<String> {
    let key = signing_key(secret)?;
    Ok(claims.sign_with_key(&key)?)
}

/// Verifies signature and expiry. A bad token is reported against the `token` field.
pub fn decode(token: &str, secret: &JwtSecret) -> ModelResult<Claims> {
    let key = signing_key(secret)?;
    let claims: Claims = token
        .verify_with_key(&key)
        .map_err(|_| ValidationError::from("token", "Invalid jwt token"))?;
    if claims.is_expired() {
        return Err(ValidationError::from("token", "Expired jwt token").into());
    }
    Ok(claims)
}
