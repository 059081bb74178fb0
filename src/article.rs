use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use diesel::{select, SqliteConnection};
use slug::slugify;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::db::schema::{article_comments, articles, favorites, users};
use crate::db::TryLoadById;
use crate::profile::ProfileView;
use crate::types::*;
use crate::users::models::{User, UserId};
use crate::utils::{from_naive, random_suffix, serialize_date};

pub type ArticleId = i32;
pub type CommentId = i32;

#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: ArticleId,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
    pub favorites_count: i64,
    pub(crate) comments: BTreeSet<CommentId>,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = articles)]
#[diesel(check_for_backend(Sqlite))]
struct ArticleRecord {
    id: ArticleId,
    slug: String,
    title: String,
    description: String,
    body: String,
    tag_list: String,
    favorites_count: i64,
    author_id: UserId,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = articles)]
struct NewArticleRecord<'a> {
    slug: &'a str,
    title: &'a str,
    description: &'a str,
    body: &'a str,
    tag_list: String,
    favorites_count: i64,
    author_id: UserId,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

/// An article that has not been stored yet. The slug is fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    pub author_id: UserId,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
}

/// Slug for a new article: the slugified title plus a random base-36 suffix.
pub fn slug_for(title: &str) -> String {
    format!("{}-{}", slugify(title), random_suffix())
}

impl NewArticle {
    pub fn new<T, D, B>(author_id: UserId, title: T, description: D, body: B, tag_list: Vec<String>) -> Self
    where
        T: Into<String>,
        D: Into<String>,
        B: Into<String>,
    {
        let title = title.into();
        NewArticle {
            author_id,
            slug: slug_for(&title),
            title,
            description: description.into(),
            body: body.into(),
            tag_list,
        }
    }

    /// Uses `slug`, slugified, instead of the generated one.
    pub fn with_slug<S: AsRef<str>>(mut self, slug: S) -> Self {
        self.slug = slugify(slug);
        self
    }
}

fn validate_content(title: &str, description: &str, body: &str) -> Result<(), ValidationError> {
    let mut error = ValidationError::default();
    if title.trim().is_empty() {
        error.add_error("title", BLANK);
    }

    if description.trim().is_empty() {
        error.add_error("description", BLANK);
    }

    if body.trim().is_empty() {
        error.add_error("body", BLANK);
    }
    error.into_result()
}

impl Validate for NewArticle {
    type Error = ModelError;
    fn validate(self, connection: &mut SqliteConnection) -> Result<Self, ModelError> {
        let mut error = ValidationError::default();
        if let Err(e) = validate_content(&self.title, &self.description, &self.body) {
            error.merge(e);
        }

        if self.slug.trim().is_empty() {
            error.add_error("slug", BLANK);
        } else if slugify(&self.slug) != self.slug {
            error.add_error("slug", INVALID);
        } else {
            let slug_exists = select(exists(articles::table.filter(articles::slug.eq(&self.slug))))
                .get_result::<bool>(connection)?;
            if slug_exists {
                error.add_error("slug", TAKEN);
            }
        }

        let author_exists = select(exists(users::table.find(self.author_id))).get_result::<bool>(connection)?;
        if !author_exists {
            error.add_error("author", INVALID);
        }

        error.into_result()?;
        Ok(self)
    }
}

/// Fields an author may change after publishing. The slug stays as it was.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    #[serde(rename = "tagList")]
    pub tag_list: Option<Vec<String>>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArticleView<'a> {
    pub slug: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub body: &'a str,
    pub tag_list: &'a [String],
    #[serde(serialize_with = "serialize_date")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: DateTime<Utc>,
    pub favorited: bool,
    pub favorites_count: i64,
    pub author: ProfileView<'a>,
}

#[derive(Debug, Serialize)]
pub struct ArticleResponse<'a> {
    pub article: ArticleView<'a>,
}

impl<'a> ArticleView<'a> {
    pub fn into_response(self) -> ArticleResponse<'a> {
        ArticleResponse { article: self }
    }
}

impl Article {
    fn resolve(record: ArticleRecord, connection: &mut SqliteConnection) -> ModelResult<Article> {
        let comments = article_comments::table
            .filter(article_comments::article_id.eq(record.id))
            .select(article_comments::comment_id)
            .load::<CommentId>(connection)?;
        Ok(Article {
            id: record.id,
            slug: record.slug,
            title: record.title,
            description: record.description,
            body: record.body,
            tag_list: serde_json::from_str(&record.tag_list)?,
            favorites_count: record.favorites_count,
            comments: comments.into_iter().collect(),
            author_id: record.author_id,
            created_at: from_naive(record.created_at),
            updated_at: from_naive(record.updated_at),
        })
    }

    pub fn create(new_article: NewArticle, connection: &mut SqliteConnection) -> ModelResult<Article> {
        let new_article = new_article.validate(connection)?;
        let now = Utc::now().naive_utc();
        let record = NewArticleRecord {
            slug: &new_article.slug,
            title: &new_article.title,
            description: &new_article.description,
            body: &new_article.body,
            tag_list: serde_json::to_string(&new_article.tag_list)?,
            favorites_count: 0,
            author_id: new_article.author_id,
            created_at: now,
            updated_at: now,
        };

        let article = connection.transaction::<_, ModelError, _>(|connection| {
            diesel::insert_into(articles::table)
                .values(&record)
                .execute(connection)?;
            Article::load_by_slug(&new_article.slug, connection)
        })?;
        info!(article = article.id, slug = %article.slug, author = article.author_id, "article created");
        Ok(article)
    }

    pub fn load_by_slug(slug_: &str, connection: &mut SqliteConnection) -> ModelResult<Article> {
        let record = articles::table
            .filter(articles::slug.eq(slug_))
            .select(ArticleRecord::as_select())
            .first(connection)?;
        Article::resolve(record, connection)
    }

    /// Loads the owning user. Views need it resolved first.
    pub fn author(&self, connection: &mut SqliteConnection) -> ModelResult<User> {
        User::try_load_by_id(self.author_id, connection)
    }

    pub fn comments(&self) -> &BTreeSet<CommentId> {
        &self.comments
    }

    pub fn has_comment(&self, id: CommentId) -> bool {
        self.comments.contains(&id)
    }

    pub fn add_comment(&mut self, id: CommentId, connection: &mut SqliteConnection) -> ModelResult<()> {
        let inserted = diesel::insert_or_ignore_into(article_comments::table)
            .values((
                article_comments::article_id.eq(self.id),
                article_comments::comment_id.eq(id),
            ))
            .execute(connection)?;
        self.comments.insert(id);
        if inserted > 0 {
            self.touch(connection)?;
        }
        Ok(())
    }

    pub fn remove_comment(&mut self, id: CommentId, connection: &mut SqliteConnection) -> ModelResult<()> {
        let deleted = diesel::delete(
            article_comments::table
                .filter(article_comments::article_id.eq(self.id))
                .filter(article_comments::comment_id.eq(id)),
        ).execute(connection)?;
        self.comments.remove(&id);
        if deleted > 0 {
            self.touch(connection)?;
        }
        Ok(())
    }

    /// Recounts the users who favorited this article and stores the result.
    ///
    /// The counter is never adjusted on favorite/unfavorite, so callers run
    /// this after every change to a user's favorites.
    pub fn recompute_favorite_count(&mut self, connection: &mut SqliteConnection) -> ModelResult<i64> {
        let count = favorites::table
            .filter(favorites::article_id.eq(self.id))
            .count()
            .get_result::<i64>(connection)?;
        let now = Utc::now();
        diesel::update(articles::table.find(self.id))
            .set((
                articles::favorites_count.eq(count),
                articles::updated_at.eq(now.naive_utc()),
            ))
            .execute(connection)?;
        self.favorites_count = count;
        self.updated_at = now;
        debug!(article = self.id, favorites_count = count, "favorite count recomputed");
        Ok(count)
    }

    /// Applies `changes` and saves. Nothing changes in memory when validation fails.
    pub fn update(&mut self, changes: ArticleChanges, connection: &mut SqliteConnection) -> ModelResult<()> {
        let mut article = self.clone();
        if let Some(title) = changes.title {
            article.title = title;
        }
        if let Some(description) = changes.description {
            article.description = description;
        }
        if let Some(body) = changes.body {
            article.body = body;
        }
        if let Some(tag_list) = changes.tag_list {
            article.tag_list = tag_list;
        }
        validate_content(&article.title, &article.description, &article.body)?;

        let now = Utc::now();
        diesel::update(articles::table.find(article.id))
            .set((
                articles::title.eq(&article.title),
                articles::description.eq(&article.description),
                articles::body.eq(&article.body),
                articles::tag_list.eq(serde_json::to_string(&article.tag_list)?),
                articles::updated_at.eq(now.naive_utc()),
            ))
            .execute(connection)?;
        article.updated_at = now;
        *self = article;
        Ok(())
    }

    /// `author` must be the resolved owner of this article.
    pub fn to_view<'a>(&'a self, author: &'a User, viewer: Option<&User>) -> ArticleView<'a> {
        ArticleView {
            slug: &self.slug,
            title: &self.title,
            description: &self.description,
            body: &self.body,
            tag_list: &self.tag_list,
            created_at: self.created_at,
            updated_at: self.updated_at,
            favorited: viewer.map_or(false, |viewer| viewer.is_favorite(self.id)),
            favorites_count: self.favorites_count,
            author: author.to_profile_view(viewer),
        }
    }

    fn touch(&mut self, connection: &mut SqliteConnection) -> ModelResult<()> {
        let now = Utc::now();
        diesel::update(articles::table.find(self.id))
            .set(articles::updated_at.eq(now.naive_utc()))
            .execute(connection)?;
        self.updated_at = now;
        Ok(())
    }
}

impl TryLoadById for Article {
    type Id = ArticleId;

    fn try_load_by_id(id: ArticleId, connection: &mut SqliteConnection) -> ModelResult<Article> {
        let record = articles::table
            .find(id)
            .select(ArticleRecord::as_select())
            .first(connection)?;
        Article::resolve(record, connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn slug_is_title_plus_random_suffix() {
        let new_article = NewArticle::new(1, "My First Post", "desc", "body", vec![]);
        let pattern = Regex::new(r"^my-first-post-[0-9a-z]{6}$").unwrap();
        assert!(pattern.is_match(&new_article.slug), "slug was {}", new_article.slug);
    }

    #[test]
    fn equal_titles_get_different_slugs() {
        let first = NewArticle::new(1, "How to train your dragon", "d", "b", vec![]);
        let second = NewArticle::new(1, "How to train your dragon", "d", "b", vec![]);
        assert_ne!(first.slug, second.slug);
    }

    #[test]
    fn explicit_slug_is_slugified() {
        let new_article = NewArticle::new(1, "Title", "d", "b", vec![]).with_slug("Custom-Slug");
        assert_eq!(new_article.slug, "custom-slug");
        let new_article = NewArticle::new(1, "Title", "d", "b", vec![]).with_slug("my slug");
        assert_eq!(new_article.slug, "my-slug");
    }

    #[test]
    fn blank_content_is_reported_per_field() {
        let err = validate_content(" ", "", "body").unwrap_err();
        assert!(err.contains("title", BLANK));
        assert!(err.contains("description", BLANK));
        assert!(!err.contains("body", BLANK));
    }
}
