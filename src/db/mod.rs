use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Error as ManagerError};
use diesel::sqlite::SqliteConnection;
use std::ops::{Deref, DerefMut};
use tracing::{debug, info};

use crate::config::Config;
use crate::errors::Result;
use crate::types::ModelResult;

pub mod schema;

// An alias to the type for a pool of Diesel SQLite connections.
pub type Pool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

pub struct DbConnection(pub r2d2::PooledConnection<ConnectionManager<SqliteConnection>>);

pub const IN_MEMORY: &str = ":memory:";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    bio TEXT,
    image TEXT,
    password_salt TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL,
    updated_at TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS followers (
    user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    followed_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, followed_id)
);

CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    body TEXT NOT NULL,
    tag_list TEXT NOT NULL DEFAULT '[]',
    favorites_count INTEGER NOT NULL DEFAULT 0,
    author_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    created_at TIMESTAMP NOT NULL,
    updated_at TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS favorites (
    user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    article_id INTEGER NOT NULL REFERENCES articles (id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, article_id)
);

CREATE INDEX IF NOT EXISTS favorites_article_id ON favorites (article_id);

CREATE TABLE IF NOT EXISTS article_comments (
    article_id INTEGER NOT NULL REFERENCES articles (id) ON DELETE CASCADE,
    comment_id INTEGER NOT NULL,
    PRIMARY KEY (article_id, comment_id)
);
"#;

/// Turns on foreign key enforcement for every connection handed out by the pool.
#[derive(Debug)]
struct ForeignKeys;

impl r2d2::CustomizeConnection<SqliteConnection, ManagerError> for ForeignKeys {
    fn on_acquire(&self, connection: &mut SqliteConnection) -> ::std::result::Result<(), ManagerError> {
        enable_foreign_keys(connection).map_err(ManagerError::QueryError)
    }
}

/// Attempts to retrieve a single connection from the pool.
pub fn connect(pool: &Pool) -> Result<DbConnection> {
    Ok(DbConnection(pool.get()?))
}

// For the convenience of using a &mut DbConnection as a &mut SqliteConnection.
impl Deref for DbConnection {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DbConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

pub fn init_pool(config: &Config) -> Result<Pool> {
    let manager = ConnectionManager::<SqliteConnection>::new(config.database_url.as_str());
    let mut builder = Pool::builder().connection_customizer(Box::new(ForeignKeys));
    // Every in-memory connection is its own database, so keep exactly one alive.
    if config.database_url == IN_MEMORY {
        builder = builder.max_size(1).max_lifetime(None).idle_timeout(None);
    }
    let pool = builder.build(manager)?;
    let mut connection = connect(&pool)?;
    migrate(&mut connection)?;
    info!(database_url = %config.database_url, "database pool ready");
    Ok(pool)
}

/// Opens a standalone connection with foreign keys on and the schema in place.
pub fn establish(database_url: &str) -> Result<SqliteConnection> {
    let mut connection = SqliteConnection::establish(database_url)?;
    enable_foreign_keys(&mut connection)?;
    migrate(&mut connection)?;
    Ok(connection)
}

/// Creates any missing table. Safe to run on every start.
pub fn migrate(connection: &mut SqliteConnection) -> Result<()> {
    connection.batch_execute(SCHEMA)?;
    debug!("schema is up to date");
    Ok(())
}

fn enable_foreign_keys(connection: &mut SqliteConnection) -> QueryResult<()> {
    connection.batch_execute("PRAGMA foreign_keys = ON;")
}

pub trait TryLoadById
where
    Self: Sized,
{
    type Id;
    fn try_load_by_id(id: Self::Id, connection: &mut SqliteConnection) -> ModelResult<Self>;
}
