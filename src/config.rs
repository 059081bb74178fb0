use dotenv::dotenv;
use std::env;
use std::fmt;

use crate::errors::{ErrorKind, Result};

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const JWT_KEY: &str = "JWT_KEY";

/// Shared HMAC secret used to sign and verify user tokens.
#[derive(Clone, PartialEq)]
pub struct JwtSecret(String);

impl JwtSecret {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        JwtSecret(secret.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("JwtSecret(..)")
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: JwtSecret,
}

impl Config {
    /// Reads `DATABASE_URL` and `JWT_KEY`, loading a `.env` file first if one exists.
    pub fn from_env() -> Result<Config> {
        dotenv().ok();
        let database_url = env::var(DATABASE_URL)?;
        let secret = env::var(JWT_KEY).unwrap_or_default();
        if secret.is_empty() {
            return Err(ErrorKind::MissingSecret(JWT_KEY.to_string()).into());
        }
        Ok(Config {
            database_url,
            jwt_secret: JwtSecret::new(secret),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_is_not_printed() {
        let secret = JwtSecret::new("hunter2");
        assert_eq!(format!("{:?}", secret), "JwtSecret(..)");
        assert_eq!(secret.as_bytes(), b"hunter2");
    }
}
