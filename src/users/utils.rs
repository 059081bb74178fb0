use crypto::hmac::Hmac;
use crypto::pbkdf2::pbkdf2;
use crypto::sha2::Sha512;
use crypto::util::fixed_time_eq;
use diesel::prelude::*;
use diesel::SqliteConnection;
use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;

use crate::db::schema::users;
use crate::types::{ModelError, ValidationError, BLANK, INVALID, TAKEN};

use super::models::UserId;

pub const SALT_LEN: usize = 16;
pub const HASH_LEN: usize = 64;
pub const ITERATIONS: u32 = 10_000;

lazy_static! {
    static ref EMAIL_RE: Regex = {
        let pattern = r"\A[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\z";
        Regex::new(pattern).unwrap()
    };
}

/// Salt and hash, both hex encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub salt: String,
    pub hash: String,
}

impl Credentials {
    pub fn derive(password: &str) -> Credentials {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let salt = hex::encode(salt);
        let hash = hash_password(password, &salt);
        Credentials { salt, hash }
    }

    pub fn verify(&self, password: &str) -> bool {
        let candidate = hash_password(password, &self.salt);
        candidate.len() == self.hash.len() && fixed_time_eq(candidate.as_bytes(), self.hash.as_bytes())
    }
}

/// PBKDF2-HMAC-SHA512 keyed by the hex text of the salt.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut mac = Hmac::new(Sha512::new(), password.as_bytes());
    let mut output = [0u8; HASH_LEN];
    pbkdf2(&mut mac, salt.as_bytes(), ITERATIONS, &mut output);
    hex::encode(&output[..])
}

pub fn validate_email_re(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        Err(ValidationError::from("email", BLANK))
    } else if !EMAIL_RE.is_match(email) {
        Err(ValidationError::from("email", INVALID))
    } else {
        Ok(())
    }
}

pub fn validate_username_re(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        Err(ValidationError::from("username", BLANK))
    } else {
        Ok(())
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        Err(ValidationError::from("password", BLANK))
    } else {
        Ok(())
    }
}

/// Checks that no other user holds `username` or `email`.
pub fn validate_unique(
    username: &str,
    email: &str,
    current: Option<UserId>,
    connection: &mut SqliteConnection,
) -> Result<(), ModelError> {
    let mut errors = ValidationError::default();

    let username_holder = users::table
        .filter(users::username.eq(username))
        .select(users::id)
        .first::<UserId>(connection)
        .optional()?;
    if is_taken(username_holder, current) {
        errors.add_error("username", TAKEN);
    }

    let email_holder = users::table
        .filter(users::email.eq(email))
        .select(users::id)
        .first::<UserId>(connection)
        .optional()?;
    if is_taken(email_holder, current) {
        errors.add_error("email", TAKEN);
    }

    errors.into_result().map_err(ModelError::from)
}

fn is_taken(holder: Option<UserId>, current: Option<UserId>) -> bool {
    match holder {
        Some(holder) => Some(holder) != current,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_have_expected_encoding() {
        let credentials = Credentials::derive("correct horse");
        assert_eq!(credentials.salt.len(), SALT_LEN * 2);
        assert_eq!(credentials.hash.len(), HASH_LEN * 2);
        assert!(credentials.salt.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(credentials.hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn verify_accepts_only_the_original_password() {
        let credentials = Credentials::derive("correct horse");
        assert!(credentials.verify("correct horse"));
        assert!(!credentials.verify("correct horsE"));
        assert!(!credentials.verify(""));
    }

    #[test]
    fn salts_differ_between_derivations() {
        let first = Credentials::derive("same");
        let second = Credentials::derive("same");
        assert_ne!(first.salt, second.salt);
        assert_ne!(first.hash, second.hash);
    }

    #[test]
    fn hash_is_deterministic_for_a_salt() {
        assert_eq!(hash_password("pw", "00ff"), hash_password("pw", "00ff"));
        assert_ne!(hash_password("pw", "00ff"), hash_password("pw", "00fe"));
    }

    #[test]
    fn email_rules() {
        assert!(validate_email_re("jake@jake.jake").is_ok());
        assert!(validate_email_re("").unwrap_err().contains("email", BLANK));
        assert!(validate_email_re("not-an-email")
            .unwrap_err()
            .contains("email", INVALID));
    }

    #[test]
    fn blank_username_and_password_are_rejected() {
        assert!(validate_username_re("  ").unwrap_err().contains("username", BLANK));
        assert!(validate_password("").unwrap_err().contains("password", BLANK));
        assert!(validate_username_re("jake").is_ok());
    }

    #[test]
    fn own_username_is_not_taken() {
        assert!(!is_taken(Some(3), Some(3)));
        assert!(is_taken(Some(3), Some(4)));
        assert!(is_taken(Some(3), None));
        assert!(!is_taken(None, None));
    }
}
