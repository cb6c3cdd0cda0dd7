//! Per-site configuration document: hook lists and module options.

use serde::Serialize;
use serde_json::Value;

use super::{document::Document, error::DomainError};

pub const FRONT_HOOKS_PATH: &str = "Hooks.Front";
pub const BACK_HOOKS_PATH: &str = "Hooks.Back";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SiteConfig(Document);

impl SiteConfig {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Accept a configuration value only when it is a top-level mapping.
    pub fn from_value(value: Value) -> Result<Self, DomainError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DomainError::validation(format!(
                "site configuration must be a JSON object, found {}",
                kind_of(&other)
            ))),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, DomainError> {
        let value: Value = serde_json::from_str(raw).map_err(|err| {
            DomainError::validation(format!("site configuration is not valid JSON: {err}"))
        })?;
        Self::from_value(value)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    /// Walk a dotted path such as `Hooks.Front` through nested objects.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    pub fn section(&self, path: &str) -> Option<&Document> {
        self.get_path(path).and_then(Value::as_object)
    }

    /// Ordered list of strings stored at `path`; an absent path yields an empty list.
    pub fn string_list(&self, path: &str) -> Result<Vec<String>, DomainError> {
        let Some(value) = self.get_path(path) else {
            return Ok(Vec::new());
        };
        let Some(items) = value.as_array() else {
            return Err(DomainError::validation(format!(
                "`{path}` must be a list, found {}",
                kind_of(value)
            )));
        };
        items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_owned).ok_or_else(|| {
                    DomainError::validation(format!(
                        "`{path}` entries must be strings, found {}",
                        kind_of(item)
                    ))
                })
            })
            .collect()
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }

    pub fn into_document(self) -> Document {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
