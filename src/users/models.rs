use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use diesel::SqliteConnection;
use std::collections::BTreeSet;
use tracing::debug;

use crate::article::ArticleId;
use crate::config::JwtSecret;
use crate::db::schema::{favorites, followers, users};
use crate::db::TryLoadById;
use crate::types::{ModelResult, ValidationError};
use crate::utils::from_naive;

use super::token::{self, Claims};
use super::utils::Credentials;

pub type UserId = i32;

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub(crate) credentials: Credentials,
    pub(crate) following: BTreeSet<UserId>,
    pub(crate) favorites: BTreeSet<ArticleId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(Sqlite))]
pub(crate) struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub password_salt: String,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewUserRecord<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub bio: Option<&'a str>,
    pub image: Option<&'a str>,
    pub password_salt: &'a str,
    pub password_hash: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Registration details. Username and email are stored lowercased.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl NewUser {
    pub fn new(username: &str, email: &str, password: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            bio: None,
            image: None,
        }
        .normalized()
    }

    pub(crate) fn normalized(mut self) -> NewUser {
        self.username = self.username.to_lowercase();
        self.email = self.email.to_lowercase();
        self
    }
}

/// Partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub image: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthView {
    pub username: String,
    pub email: String,
    pub token: String,
    pub bio: Option<String>,
    pub image: Option<String>,
}

impl User {
    pub(crate) fn from_record(
        record: UserRecord,
        following: BTreeSet<UserId>,
        favorites: BTreeSet<ArticleId>,
    ) -> User {
        User {
            id: record.id,
            username: record.username,
            email: record.email,
            bio: record.bio,
            image: record.image,
            credentials: Credentials {
                salt: record.password_salt,
                hash: record.password_hash,
            },
            following,
            favorites,
            created_at: from_naive(record.created_at),
            updated_at: from_naive(record.updated_at),
        }
    }

    fn resolve(record: UserRecord, connection: &mut SqliteConnection) -> ModelResult<User> {
        let following = followers::table
            .filter(followers::user_id.eq(record.id))
            .select(followers::followed_id)
            .load::<UserId>(connection)?;
        let favorites = favorites::table
            .filter(favorites::user_id.eq(record.id))
            .select(favorites::article_id)
            .load::<ArticleId>(connection)?;
        Ok(User::from_record(
            record,
            following.into_iter().collect(),
            favorites.into_iter().collect(),
        ))
    }

    pub fn load_by_name(name: &str, connection: &mut SqliteConnection) -> ModelResult<User> {
        let record = users::table
            .filter(users::username.eq(name.to_lowercase()))
            .select(UserRecord::as_select())
            .first(connection)?;
        User::resolve(record, connection)
    }

    pub fn load_by_email(email: &str, connection: &mut SqliteConnection) -> ModelResult<User> {
        let record = users::table
            .filter(users::email.eq(email.to_lowercase()))
            .select(UserRecord::as_select())
            .first(connection)?;
        User::resolve(record, connection)
    }

    pub fn load_from_token(
        jwt_token: &str,
        secret: &JwtSecret,
        connection: &mut SqliteConnection,
    ) -> ModelResult<User> {
        let claims = token::decode(jwt_token, secret)?;
        let user = User::try_load_by_id(claims.id, connection)?;
        if user.username != claims.username {
            return Err(ValidationError::from("token", "Invalid jwt token").into());
        }
        Ok(user)
    }

    /// Replaces the stored salt and hash. Persisted by the next `save`.
    pub fn set_password(&mut self, password: &str) {
        self.credentials = Credentials::derive(password);
    }

    pub fn validate_password(&self, password: &str) -> bool {
        self.credentials.verify(password)
    }

    pub fn password_salt(&self) -> &str {
        &self.credentials.salt
    }

    pub fn password_hash(&self) -> &str {
        &self.credentials.hash
    }

    pub fn issue_token(&self, secret: &JwtSecret) -> ModelResult<String> {
        token::sign(&Claims::new(self.id, &self.username), secret)
    }

    /// Always signs a fresh token.
    pub fn to_auth_view(&self, secret: &JwtSecret) -> ModelResult<AuthView> {
        Ok(AuthView {
            username: self.username.clone(),
            email: self.email.clone(),
            token: self.issue_token(secret)?,
            bio: self.bio.clone(),
            image: self.image.clone(),
        })
    }

    pub fn following(&self) -> &BTreeSet<UserId> {
        &self.following
    }

    pub fn favorites(&self) -> &BTreeSet<ArticleId> {
        &self.favorites
    }

    pub fn is_following(&self, id: UserId) -> bool {
        self.following.contains(&id)
    }

    pub fn is_favorite(&self, id: ArticleId) -> bool {
        self.favorites.contains(&id)
    }

    // The store is written even when the in-memory set already agrees, since
    // this copy may be stale. Relation writes are idempotent at the store.
    pub fn follow(&mut self, id: UserId, connection: &mut SqliteConnection) -> ModelResult<()> {
        let inserted = diesel::insert_or_ignore_into(followers::table)
            .values((followers::user_id.eq(self.id), followers::followed_id.eq(id)))
            .execute(connection)?;
        self.following.insert(id);
        if inserted > 0 {
            self.touch(connection)?;
            debug!(user = self.id, followed = id, "follow");
        }
        Ok(())
    }

    pub fn unfollow(&mut self, id: UserId, connection: &mut SqliteConnection) -> ModelResult<()> {
        let deleted = diesel::delete(
            followers::table
                .filter(followers::user_id.eq(self.id))
                .filter(followers::followed_id.eq(id)),
        ).execute(connection)?;
        self.following.remove(&id);
        if deleted > 0 {
            self.touch(connection)?;
            debug!(user = self.id, followed = id, "unfollow");
        }
        Ok(())
    }

    pub fn favorite(&mut self, id: ArticleId, connection: &mut SqliteConnection) -> ModelResult<()> {
        let inserted = diesel::insert_or_ignore_into(favorites::table)
            .values((favorites::user_id.eq(self.id), favorites::article_id.eq(id)))
            .execute(connection)?;
        self.favorites.insert(id);
        if inserted > 0 {
            self.touch(connection)?;
            debug!(user = self.id, article = id, "favorite");
        }
        Ok(())
    }

    pub fn unfavorite(&mut self, id: ArticleId, connection: &mut SqliteConnection) -> ModelResult<()> {
        let deleted = diesel::delete(
            favorites::table
                .filter(favorites::user_id.eq(self.id))
                .filter(favorites::article_id.eq(id)),
        ).execute(connection)?;
        self.favorites.remove(&id);
        if deleted > 0 {
            self.touch(connection)?;
            debug!(user = self.id, article = id, "unfavorite");
        }
        Ok(())
    }

    fn touch(&mut self, connection: &mut SqliteConnection) -> ModelResult<()> {
        let now = Utc::now();
        diesel::update(users::table.find(self.id))
            .set(users::updated_at.eq(now.naive_utc()))
            .execute(connection)?;
        self.updated_at = now;
        Ok(())
    }
}

impl TryLoadById for User {
    type Id = UserId;

    fn try_load_by_id(id: UserId, connection: &mut SqliteConnection) -> ModelResult<User> {
        let record = users::table
            .find(id)
            .select(UserRecord::as_select())
            .first(connection)?;
        User::resolve(record, connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: 1,
            username: "jake".to_string(),
            email: "jake@jake.jake".to_string(),
            bio: None,
            image: None,
            credentials: Credentials::derive("jakejake"),
            following: BTreeSet::new(),
            favorites: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn new_user_is_lowercased() {
        let new_user = NewUser::new("Jake", "Jake@Jake.JAKE", "Secret");
        assert_eq!(new_user.username, "jake");
        assert_eq!(new_user.email, "jake@jake.jake");
        assert_eq!(new_user.password, "Secret");
    }

    #[test]
    fn set_password_invalidates_the_previous_one() {
        let mut user = user();
        assert!(user.validate_password("jakejake"));
        user.set_password("new password");
        assert!(user.validate_password("new password"));
        assert!(!user.validate_password("jakejake"));
    }

    #[test]
    fn membership_predicates_follow_the_sets() {
        let mut user = user();
        user.following.insert(2);
        user.favorites.insert(9);
        assert!(user.is_following(2));
        assert!(!user.is_following(9));
        assert!(user.is_favorite(9));
        assert!(!user.is_favorite(2));
    }

    #[test]
    fn auth_view_carries_a_verifiable_token() {
        let secret = JwtSecret::new("secret");
        let user = user();
        let view = user.to_auth_view(&secret).unwrap();
        assert_eq!(view.username, "jake");
        assert_eq!(view.email, "jake@jake.jake");
        assert_eq!(view.image, None);

        let claims = token::decode(&view.token, &secret).unwrap();
        assert_eq!(claims.id, user.id);
        assert_eq!(claims.username, user.username);
    }

    #[test]
    fn auth_view_needs_a_secret() {
        assert!(user().to_auth_view(&JwtSecret::new("")).is_err());
    }
}
