use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::SqliteConnection;
use jwt::Error as JwtError;
use serde_json::Error as JsonError;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

pub const BLANK: &str = "can't be blank";
pub const INVALID: &str = "is invalid";
pub const TAKEN: &str = "is already taken.";

/// Pre-persist check run by every entity before it reaches the store.
pub trait Validate
where
    Self: Sized,
{
    type Error;
    fn validate(self, connection: &mut SqliteConnection) -> Result<Self, Self::Error>;
}

#[derive(Debug)]
pub enum ModelError {
    Diesel(DieselError),
    Validation(ValidationError),
    Serialization(JsonError),
    Jwt(JwtError),
    MissingSecret,
}

pub type ModelResult<T> = Result<T, ModelError>;

impl ModelError {
    /// True when `field` failed with `message`.
    pub fn is_validation(&self, field: &str, message: &str) -> bool {
        match self {
            ModelError::Validation(errors) => errors.contains(field, message),
            _ => false,
        }
    }

    pub fn is_taken(&self, field: &str) -> bool {
        self.is_validation(field, TAKEN)
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            ModelError::Diesel(DieselError::NotFound) => true,
            _ => false,
        }
    }
}

impl From<DieselError> for ModelError {
    fn from(err: DieselError) -> ModelError {
        match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                let column = violated_column(info.message()).map(str::to_owned);
                match column {
                    Some(column) => ModelError::Validation(ValidationError::from(column, TAKEN)),
                    None => ModelError::Diesel(DieselError::DatabaseError(
                        DatabaseErrorKind::UniqueViolation,
                        info,
                    )),
                }
            }
            other => ModelError::Diesel(other),
        }
    }
}

impl From<ValidationError> for ModelError {
    fn from(err: ValidationError) -> ModelError {
        ModelError::Validation(err)
    }
}

impl From<JsonError> for ModelError {
    fn from(err: JsonError) -> ModelError {
        ModelError::Serialization(err)
    }
}

impl From<JwtError> for ModelError {
    fn from(err: JwtError) -> ModelError {
        ModelError::Jwt(err)
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ModelError::Diesel(err) => write!(f, "storage error: {}", err),
            ModelError::Validation(err) => write!(f, "validation failed: {}", err),
            ModelError::Serialization(err) => write!(f, "serialization error: {}", err),
            ModelError::Jwt(err) => write!(f, "token signing failed: {}", err),
            ModelError::MissingSecret => write!(f, "token signing secret is not configured"),
        }
    }
}

impl StdError for ModelError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ModelError::Diesel(err) => Some(err),
            ModelError::Serialization(err) => Some(err),
            ModelError::Jwt(err) => Some(err),
            _ => None,
        }
    }
}

// SQLite reports "UNIQUE constraint failed: users.username".
fn violated_column(message: &str) -> Option<&str> {
    let columns = message.split("constraint failed:").nth(1)?;
    let first = columns.split(',').next()?.trim();
    first.rsplit('.').next().filter(|column| !column.is_empty())
}

#[derive(Debug, Serialize, Default, Clone, PartialEq)]
pub struct ValidationError(HashMap<String, Vec<String>>);

impl ValidationError {
    pub fn add_error<K: Into<String>, V: Into<String>>(&mut self, key: K, val: V) {
        let entry = self.0.entry(key.into()).or_insert_with(Vec::default);
        entry.push(val.into());
    }

    pub fn from<K: Into<String>, V: Into<String>>(key: K, val: V) -> Self {
        let mut error = ValidationError::default();
        error.add_error(key, val);
        error
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: ValidationError) {
        for (key, errors) in other.0.into_iter() {
            let entry = self.0.entry(key).or_default();
            entry.extend(errors);
        }
    }

    pub fn empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, field: &str, message: &str) -> bool {
        self.0
            .get(field)
            .map_or(false, |messages| messages.iter().any(|m| m == message))
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], |messages| messages.as_slice())
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut fields: Vec<_> = self.0.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));
        let mut first = true;
        for (field, messages) in fields {
            for message in messages {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{} {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl StdError for ValidationError {}
