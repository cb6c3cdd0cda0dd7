//! Schemaless documents stored in the `options` and `contents` collections.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::error::DomainError;

/// A JSON object as persisted by the document store.
pub type Document = Map<String, Value>;

/// Field carrying a document's identifier once it is read back from the store.
pub const ID_FIELD: &str = "_id";

/// Length of the hyphenated textual form of an identifier.
pub const CANONICAL_ID_LEN: usize = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parse an identifier, rejecting anything other than the canonical hyphenated form.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.len() != CANONICAL_ID_LEN {
            return Err(DomainError::validation(format!(
                "identifier `{trimmed}` must be {CANONICAL_ID_LEN} characters long"
            )));
        }
        Uuid::parse_str(trimmed)
            .map(Self)
            .map_err(|err| DomainError::validation(format!("identifier `{trimmed}`: {err}")))
    }

    /// Read an identifier stored as a string field of `document`.
    pub fn from_field(document: &Document, field: &str) -> Option<Self> {
        document
            .get(field)
            .and_then(Value::as_str)
            .and_then(|raw| Self::parse(raw).ok())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for DocumentId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<DocumentId> for Value {
    fn from(id: DocumentId) -> Self {
        Value::String(id.to_string())
    }
}
