//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::document::{Document, DocumentId, ID_FIELD};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Site configuration documents, newest first per host.
#[async_trait]
pub trait OptionsRepo: Send + Sync {
    /// The most recently created configuration document for `host`, as stored.
    async fn latest_options(&self, host: &str) -> Result<Option<Value>, RepoError>;

    async fn insert_options(&self, host: &str, document: &Document)
    -> Result<DocumentId, RepoError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentClause {
    Id(DocumentId),
    Field { key: String, value: String },
}

impl ContentClause {
    fn matches(&self, id: DocumentId, document: &Document) -> bool {
        match self {
            ContentClause::Id(expected) => *expected == id,
            ContentClause::Field { key, value } => {
                document.get(key).and_then(Value::as_str) == Some(value.as_str())
            }
        }
    }
}

/// Disjunction of clauses; a document matches when any clause does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentQuery {
    any_of: Vec<ContentClause>,
}

impl ContentQuery {
    pub fn by_id(id: DocumentId) -> Self {
        Self {
            any_of: vec![ContentClause::Id(id)],
        }
    }

    /// Address a document by any of `keys` holding `value`.
    ///
    /// `_id` keys compare against the native identifier when `value` is a canonical identifier.
    pub fn by_keys(keys: &[&str], value: &str) -> Option<Self> {
        if keys.is_empty() {
            return None;
        }
        let any_of = keys
            .iter()
            .map(|key| match (*key == ID_FIELD, DocumentId::parse(value)) {
                (true, Ok(id)) => ContentClause::Id(id),
                _ => ContentClause::Field {
                    key: (*key).to_string(),
                    value: value.to_string(),
                },
            })
            .collect();
        Some(Self { any_of })
    }

    pub fn clauses(&self) -> &[ContentClause] {
        &self.any_of
    }

    pub fn is_disjunction(&self) -> bool {
        self.any_of.len() > 1
    }

    pub fn matches(&self, id: DocumentId, document: &Document) -> bool {
        self.any_of.iter().any(|clause| clause.matches(id, document))
    }
}

/// The `contents` collection with embedded comment lists.
///
/// Documents returned by reads carry their identifier under `_id`.
#[async_trait]
pub trait ContentsRepo: Send + Sync {
    async fn insert_content(&self, document: Document) -> Result<DocumentId, RepoError>;

    /// Merge `fields` into the stored document; `RepoError::NotFound` when it does not exist.
    async fn update_content(&self, id: DocumentId, fields: Document) -> Result<(), RepoError>;

    async fn delete_content(&self, id: DocumentId) -> Result<(), RepoError>;

    async fn find_content(&self, query: &ContentQuery) -> Result<Option<Document>, RepoError>;

    async fn push_comment(&self, content_id: DocumentId, comment: Document)
    -> Result<(), RepoError>;

    /// Returns `false` when the parent exists but holds no comment with `comment_id`.
    async fn replace_comment(
        &self,
        content_id: DocumentId,
        comment_id: DocumentId,
        comment: Document,
    ) -> Result<bool, RepoError>;

    async fn pull_comment(
        &self,
        content_id: DocumentId,
        comment_id: DocumentId,
    ) -> Result<bool, RepoError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: DocumentId,
    pub level: i32,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<UserRecord>, RepoError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn single_key_uses_equality() {
        let query = ContentQuery::by_keys(&["slug"], "hello").expect("query");
        assert!(!query.is_disjunction());
        assert_eq!(
            query.clauses(),
            [ContentClause::Field {
                key: "slug".into(),
                value: "hello".into()
            }]
        );
        assert!(ContentQuery::by_keys(&[], "hello").is_none());
    }

    #[test]
    fn identifier_key_converts_canonical_values() {
        let id = DocumentId::generate();
        let query = ContentQuery::by_keys(&["_id"], &id.to_string()).expect("query");
        assert_eq!(query.clauses(), [ContentClause::Id(id)]);

        let short = ContentQuery::by_keys(&["_id"], "abc123").expect("query");
        assert!(matches!(short.clauses(), [ContentClause::Field { .. }]));
    }

    #[test]
    fn several_keys_match_either_field() {
        let query = ContentQuery::by_keys(&["slug", "_id"], "abc123").expect("query");
        assert!(query.is_disjunction());

        let mut by_slug = Document::new();
        by_slug.insert("slug".into(), json!("abc123"));
        assert!(query.matches(DocumentId::generate(), &by_slug));
        assert!(!query.matches(DocumentId::generate(), &Document::new()));

        let id = DocumentId::generate();
        let by_id = ContentQuery::by_keys(&["slug", "_id"], &id.to_string()).expect("query");
        assert!(by_id.matches(id, &Document::new()));
    }
}
