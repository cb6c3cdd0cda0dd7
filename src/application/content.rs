//! Content model: CRUD over the `contents` collection and its embedded comments.
//!
//! Every mutating operation takes the extraction rule from its caller; the rule decides
//! which input fields are persisted. Errors are always returned, never panicked, and the
//! calling hook decides how to present them.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

use crate::{
    application::repos::{ContentQuery, ContentsRepo, RepoError},
    domain::{
        content::{
            self, COMMENT_ID_FIELD, CREATED_BY_FIELD, CREATED_FIELD, SLUG_FIELD, TITLE_FIELD,
            TYPE_FIELD,
        },
        document::{Document, DocumentId},
        extract::{ExtractError, ExtractionRule, FieldDirective, FieldKind},
        form::FormInput,
        user::{DEFAULT_COMMENT_LEVEL, User},
    },
};

pub const ID_PARAM: &str = "id";
pub const CONTENT_ID_PARAM: &str = "content_id";
pub const COMMENT_ID_PARAM: &str = "comment_id";
pub const COMMENT_LEVEL_OPTION: &str = "_comment_level";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("missing fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("can't insert an object which already has an id")]
    AlreadyHasId,
    #[error("no type when {operation} content")]
    NoType { operation: &'static str },
    #[error("no id when updating content")]
    NoId,
    #[error("`{field}` is not a valid identifier")]
    InvalidId { field: String },
    #[error("content type is `{stored}`, not `{requested}`")]
    TypeMismatch { stored: String, requested: String },
    #[error("you have no rights to do this: level {required} required, {actual} held")]
    InsufficientLevel { required: i32, actual: i32 },
    #[error("you are not the rightful owner of the comment")]
    NotOwner,
    #[error("content not found")]
    ContentNotFound,
    #[error("comment not found")]
    CommentNotFound,
    #[error("comment has no author")]
    NoAuthor,
    #[error(transparent)]
    Extraction(ExtractError),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<ExtractError> for ContentError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::MissingFields(fields) => Self::MissingFields(fields),
            other => Self::Extraction(other),
        }
    }
}

impl From<RepoError> for ContentError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => Self::ContentNotFound,
            other => Self::Repo(other),
        }
    }
}

/// Read a numeric level option, falling back to `default` when absent or malformed.
pub fn level_option(options: &Document, key: &str, default: i32) -> i32 {
    options
        .get(key)
        .and_then(|value| value.as_i64().or_else(|| value.as_f64().map(|f| f as i64)))
        .and_then(|level| i32::try_from(level).ok())
        .unwrap_or(default)
}

/// Level needed to comment on content configured with `options`.
pub fn comment_level(options: &Document) -> i32 {
    level_option(options, COMMENT_LEVEL_OPTION, DEFAULT_COMMENT_LEVEL)
}

/// Parse the identifiers named by `keys`, all of which must be present.
pub fn extract_ids(input: &FormInput, keys: &[&str]) -> Result<Vec<DocumentId>, ContentError> {
    let missing: Vec<String> = keys
        .iter()
        .filter(|key| input.first_non_empty(key).is_none())
        .map(|key| (*key).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ContentError::MissingFields(missing));
    }
    keys.iter()
        .map(|key| {
            input
                .first_non_empty(key)
                .and_then(|raw| DocumentId::parse(raw).ok())
                .ok_or_else(|| ContentError::InvalidId {
                    field: (*key).to_string(),
                })
        })
        .collect()
}

pub struct ContentService {
    contents: Arc<dyn ContentsRepo>,
}

impl ContentService {
    pub fn new(contents: Arc<dyn ContentsRepo>) -> Self {
        Self { contents }
    }

    pub async fn insert(
        &self,
        rule: &ExtractionRule,
        input: &FormInput,
        user: &User,
    ) -> Result<DocumentId, ContentError> {
        if input.first_non_empty(ID_PARAM).is_some() {
            return Err(ContentError::AlreadyHasId);
        }
        let Some(kind) = input.first_non_empty(TYPE_FIELD) else {
            return Err(ContentError::NoType {
                operation: "inserting",
            });
        };

        let mut document = rule.extract(input)?;
        if rule.contains(SLUG_FIELD) && !document.contains_key(SLUG_FIELD) {
            let derived = document
                .get(TITLE_FIELD)
                .and_then(Value::as_str)
                .map(slug::slugify)
                .filter(|slug| !slug.is_empty());
            if let Some(slug) = derived {
                document.insert(SLUG_FIELD.into(), Value::String(slug));
            }
        }
        content::stamp_created(&mut document, user, OffsetDateTime::now_utc());
        document.insert(TYPE_FIELD.into(), Value::String(kind.to_string()));

        let id = self.contents.insert_content(document).await?;
        info!(
            target = "sitehook::content",
            content_id = %id,
            content_type = kind,
            "Inserted content"
        );
        Ok(id)
    }

    pub async fn update(
        &self,
        rule: &ExtractionRule,
        input: &FormInput,
        user: &User,
    ) -> Result<DocumentId, ContentError> {
        let Some(raw_id) = input.first_non_empty(ID_PARAM) else {
            return Err(ContentError::NoId);
        };
        let Some(kind) = input.first_non_empty(TYPE_FIELD) else {
            return Err(ContentError::NoType {
                operation: "updating",
            });
        };
        let id = DocumentId::parse(raw_id).map_err(|_| ContentError::InvalidId {
            field: ID_PARAM.to_string(),
        })?;

        let stored = self
            .find_by_id(id)
            .await?
            .ok_or(ContentError::ContentNotFound)?;
        let stored_kind = stored
            .get(TYPE_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default();
        if stored_kind != kind {
            return Err(ContentError::TypeMismatch {
                stored: stored_kind.to_string(),
                requested: kind.to_string(),
            });
        }

        let mut document = rule.extract(input)?;
        document.remove(TYPE_FIELD);
        content::stamp_modified(&mut document, user, OffsetDateTime::now_utc());

        self.contents.update_content(id, document).await?;
        info!(
            target = "sitehook::content",
            content_id = %id,
            content_type = kind,
            "Updated content"
        );
        Ok(id)
    }

    /// Delete every identifier independently; one result slot per identifier.
    pub async fn delete(&self, ids: &[String], user: &User) -> Vec<Result<(), ContentError>> {
        let mut results = Vec::with_capacity(ids.len());
        for raw in ids {
            results.push(self.delete_one(raw, user).await);
        }
        results
    }

    pub async fn delete_one(&self, raw: &str, user: &User) -> Result<(), ContentError> {
        let id = DocumentId::parse(raw).map_err(|_| ContentError::InvalidId {
            field: ID_PARAM.to_string(),
        })?;
        self.contents.delete_content(id).await?;
        info!(
            target = "sitehook::content",
            content_id = %id,
            user_id = ?user.id,
            "Deleted content"
        );
        Ok(())
    }

    pub async fn insert_comment(
        &self,
        rule: &ExtractionRule,
        input: &FormInput,
        user: &User,
    ) -> Result<DocumentId, ContentError> {
        let mut comment = comment_fields(rule, input)?;
        let ids = extract_ids(input, &[CONTENT_ID_PARAM])?;
        let content_id = ids[0];

        content::stamp_created(&mut comment, user, OffsetDateTime::now_utc());
        let comment_id = DocumentId::generate();
        comment.insert(COMMENT_ID_FIELD.into(), comment_id.into());

        self.contents.push_comment(content_id, comment).await?;
        info!(
            target = "sitehook::content",
            content_id = %content_id,
            comment_id = %comment_id,
            "Inserted comment"
        );
        Ok(comment_id)
    }

    /// Replace the addressed comment, keeping its original creation stamp.
    pub async fn update_comment(
        &self,
        rule: &ExtractionRule,
        input: &FormInput,
        user: &User,
    ) -> Result<(), ContentError> {
        let mut comment = comment_fields(rule, input)?;
        let ids = extract_ids(input, &[CONTENT_ID_PARAM, COMMENT_ID_PARAM])?;
        let (content_id, comment_id) = (ids[0], ids[1]);

        let existing = self.find_comment(content_id, comment_id).await?;
        for field in [CREATED_FIELD, CREATED_BY_FIELD] {
            if let Some(value) = existing.get(field) {
                comment.insert(field.into(), value.clone());
            }
        }
        content::stamp_modified(&mut comment, user, OffsetDateTime::now_utc());

        if !self
            .contents
            .replace_comment(content_id, comment_id, comment)
            .await?
        {
            return Err(ContentError::CommentNotFound);
        }
        info!(
            target = "sitehook::content",
            content_id = %content_id,
            comment_id = %comment_id,
            "Updated comment"
        );
        Ok(())
    }

    pub async fn delete_comment(&self, input: &FormInput, user: &User) -> Result<(), ContentError> {
        let ids = extract_ids(input, &[CONTENT_ID_PARAM, COMMENT_ID_PARAM])?;
        let (content_id, comment_id) = (ids[0], ids[1]);

        if !self.contents.pull_comment(content_id, comment_id).await? {
            return Err(ContentError::CommentNotFound);
        }
        info!(
            target = "sitehook::content",
            content_id = %content_id,
            comment_id = %comment_id,
            user_id = ?user.id,
            "Deleted comment"
        );
        Ok(())
    }

    /// Authorization gate for comment mutations.
    ///
    /// Only `content_id` present means an insert; both identifiers mean an edit. Users below
    /// the moderator level may only edit comments they authored.
    pub async fn allows_comment(
        &self,
        input: &FormInput,
        content_options: &Document,
        user: &User,
    ) -> Result<(), ContentError> {
        let rule = ExtractionRule::new()
            .field(CONTENT_ID_PARAM, FieldDirective::optional(FieldKind::Id))
            .field(COMMENT_ID_PARAM, FieldDirective::optional(FieldKind::Id));
        let ids = rule.extract(input)?;

        let Some(content_id) = DocumentId::from_field(&ids, CONTENT_ID_PARAM) else {
            return Err(ContentError::MissingFields(vec![
                CONTENT_ID_PARAM.to_string(),
            ]));
        };
        let comment_id = DocumentId::from_field(&ids, COMMENT_ID_PARAM);

        let required = comment_level(content_options);
        if user.level < required {
            return Err(ContentError::InsufficientLevel {
                required,
                actual: user.level,
            });
        }

        if let Some(comment_id) = comment_id
            && !user.is_moderator()
        {
            let author = self.find_comment_author(content_id, comment_id).await?;
            if !user.is_author(author) {
                return Err(ContentError::NotOwner);
            }
        }
        Ok(())
    }

    /// Find a content document by any of `keys` equal to `value`.
    pub async fn find_content(
        &self,
        keys: &[&str],
        value: &str,
    ) -> Result<Option<Document>, ContentError> {
        let Some(query) = ContentQuery::by_keys(keys, value) else {
            return Ok(None);
        };
        Ok(self.contents.find_content(&query).await?)
    }

    pub async fn find_by_id(&self, id: DocumentId) -> Result<Option<Document>, ContentError> {
        Ok(self.contents.find_content(&ContentQuery::by_id(id)).await?)
    }

    pub async fn find_comment(
        &self,
        content_id: DocumentId,
        comment_id: DocumentId,
    ) -> Result<Document, ContentError> {
        let parent = self
            .find_by_id(content_id)
            .await?
            .ok_or(ContentError::ContentNotFound)?;
        content::find_comment(&parent, comment_id)
            .cloned()
            .ok_or(ContentError::CommentNotFound)
    }

    pub async fn find_comment_author(
        &self,
        content_id: DocumentId,
        comment_id: DocumentId,
    ) -> Result<DocumentId, ContentError> {
        let comment = self.find_comment(content_id, comment_id).await?;
        DocumentId::from_field(&comment, CREATED_BY_FIELD).ok_or(ContentError::NoAuthor)
    }
}

fn comment_fields(rule: &ExtractionRule, input: &FormInput) -> Result<Document, ContentError> {
    let mut comment = rule.extract(input)?;
    comment.remove(CONTENT_ID_PARAM);
    comment.remove(COMMENT_ID_PARAM);
    Ok(comment)
}
