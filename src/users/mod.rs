use chrono::Utc;
use diesel::prelude::*;
use diesel::SqliteConnection;
use std::collections::BTreeSet;
use tracing::info;

use crate::db::schema::users;
use crate::types::{ModelError, ModelResult, Validate, ValidationError};

pub mod models;
pub mod token;
mod utils;

use self::models::{NewUser, NewUserRecord, User, UserChanges, UserRecord};
use self::utils::*;

pub use self::utils::{hash_password, Credentials};

impl Validate for NewUser {
    type Error = ModelError;
    fn validate(self, connection: &mut SqliteConnection) -> Result<Self, Self::Error> {
        let new_user = self.normalized();
        let mut errors = ValidationError::default();

        if let Err(e) = validate_username_re(&new_user.username) {
            errors.merge(e);
        }
        if let Err(e) = validate_email_re(&new_user.email) {
            errors.merge(e);
        }
        if let Err(e) = validate_password(&new_user.password) {
            errors.merge(e);
        }

        match validate_unique(&new_user.username, &new_user.email, None, connection) {
            Ok(_) => {}
            Err(ModelError::Validation(e)) => errors.merge(e),
            Err(other) => return Err(other),
        }

        errors.into_result()?;
        Ok(new_user)
    }
}

impl Validate for User {
    type Error = ModelError;
    fn validate(mut self, connection: &mut SqliteConnection) -> Result<Self, Self::Error> {
        self.username = self.username.to_lowercase();
        self.email = self.email.to_lowercase();
        let mut errors = ValidationError::default();

        if let Err(e) = validate_username_re(&self.username) {
            errors.merge(e);
        }
        if let Err(e) = validate_email_re(&self.email) {
            errors.merge(e);
        }

        match validate_unique(&self.username, &self.email, Some(self.id), connection) {
            Ok(_) => {}
            Err(ModelError::Validation(e)) => errors.merge(e),
            Err(other) => return Err(other),
        }

        errors.into_result()?;
        Ok(self)
    }
}

impl User {
    pub fn create(new_user: NewUser, connection: &mut SqliteConnection) -> ModelResult<User> {
        let new_user = new_user.validate(connection)?;
        let credentials = Credentials::derive(&new_user.password);
        let now = Utc::now().naive_utc();
        let record = NewUserRecord {
            username: &new_user.username,
            email: &new_user.email,
            bio: new_user.bio.as_deref(),
            image: new_user.image.as_deref(),
            password_salt: &credentials.salt,
            password_hash: &credentials.hash,
            created_at: now,
            updated_at: now,
        };

        let user = connection.transaction::<_, ModelError, _>(|connection| {
            diesel::insert_into(users::table)
                .values(&record)
                .execute(connection)?;
            let record = users::table
                .filter(users::username.eq(&new_user.username))
                .select(UserRecord::as_select())
                .first(connection)?;
            Ok(User::from_record(record, BTreeSet::new(), BTreeSet::new()))
        })?;
        info!(user = user.id, username = %user.username, "user created");
        Ok(user)
    }

    /// Validates and writes the scalar fields and credentials. Username and
    /// email are lowercased on the way out.
    pub fn save(&mut self, connection: &mut SqliteConnection) -> ModelResult<()> {
        let mut user = self.clone().validate(connection)?;
        let now = Utc::now();
        diesel::update(users::table.find(user.id))
            .set((
                users::username.eq(&user.username),
                users::email.eq(&user.email),
                users::bio.eq(&user.bio),
                users::image.eq(&user.image),
                users::password_salt.eq(&user.credentials.salt),
                users::password_hash.eq(&user.credentials.hash),
                users::updated_at.eq(now.naive_utc()),
            ))
            .execute(connection)?;
        user.updated_at = now;
        *self = user;
        Ok(())
    }

    /// Applies `changes` and saves. Nothing changes in memory when validation fails.
    pub fn update(&mut self, changes: UserChanges, connection: &mut SqliteConnection) -> ModelResult<()> {
        let mut user = self.clone();
        if let Some(username) = changes.username {
            user.username = username.to_lowercase();
        }
        if let Some(email) = changes.email {
            user.email = email.to_lowercase();
        }
        if let Some(bio) = changes.bio {
            user.bio = Some(bio);
        }
        if let Some(image) = changes.image {
            user.image = Some(image);
        }
        if let Some(password) = changes.password {
            validate_password(&password)?;
            user.set_password(&password);
        }
        user.save(connection)?;
        *self = user;
        Ok(())
    }
}
