#[macro_use]
extern crate diesel;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate serde_derive;

extern crate chrono;
extern crate crypto;
extern crate dotenv;
extern crate hex;
extern crate hmac;
extern crate jwt;
extern crate r2d2;
extern crate rand;
extern crate regex;
extern crate serde;
extern crate serde_json;
extern crate sha2;
extern crate slug;
extern crate tracing;

pub mod article;
pub mod config;
pub mod db;
pub mod errors;
pub mod profile;
pub mod types;
pub mod users;
mod utils;

pub use article::{Article, ArticleChanges, ArticleId, ArticleView, NewArticle};
pub use config::{Config, JwtSecret};
pub use profile::ProfileView;
pub use types::{ModelError, ModelResult, Validate, ValidationError};
pub use users::models::{AuthView, NewUser, User, UserChanges, UserId};
pub use users::token::Claims;
