//! Extraction rules: which request fields an operation accepts, requires and how they are typed.
//!
//! A rule is configured as a JSON object mapping field names to directives:
//!
//! - `1`, `true` or `"must"`: required string
//! - `0`, `false` or `"opt"`: optional string
//! - `"int"`, `"float"`, `"bool"`, `"id"`, `"string"`: optional field of that kind
//! - `{ "must": bool, "type": "...", "min": n, "max": n }`: full form
//!
//! Input fields not named by the rule are dropped.

use std::collections::BTreeMap;

use serde_json::{Number, Value};
use thiserror::Error;

use super::{
    document::{Document, DocumentId},
    form::FormInput,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("missing fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("field `{field}` is invalid: {reason}")]
    InvalidField { field: String, reason: String },
    #[error("rule for `{field}` is invalid: {reason}")]
    InvalidRule { field: String, reason: String },
}

impl ExtractError {
    fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    fn invalid_rule(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Int,
    Float,
    Bool,
    Id,
}

impl FieldKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "string" => Some(Self::String),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "bool" => Some(Self::Bool),
            "id" => Some(Self::Id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDirective {
    pub required: bool,
    pub kind: FieldKind,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl FieldDirective {
    pub fn required(kind: FieldKind) -> Self {
        Self {
            required: true,
            kind,
            min: None,
            max: None,
        }
    }

    pub fn optional(kind: FieldKind) -> Self {
        Self {
            required: false,
            ..Self::required(kind)
        }
    }

    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    fn from_value(field: &str, value: &Value) -> Result<Self, ExtractError> {
        match value {
            Value::Bool(true) => Ok(Self::required(FieldKind::String)),
            Value::Bool(false) => Ok(Self::optional(FieldKind::String)),
            Value::Number(number) => match number.as_i64() {
                Some(0) => Ok(Self::optional(FieldKind::String)),
                Some(_) => Ok(Self::required(FieldKind::String)),
                None => Err(ExtractError::invalid_rule(field, "expected an integer flag")),
            },
            Value::String(raw) => match raw.as_str() {
                "must" => Ok(Self::required(FieldKind::String)),
                "opt" => Ok(Self::optional(FieldKind::String)),
                other => FieldKind::parse(other)
                    .map(Self::optional)
                    .ok_or_else(|| ExtractError::invalid_rule(field, format!("unknown directive `{other}`"))),
            },
            Value::Object(map) => {
                let required = match map.get("must") {
                    None => false,
                    Some(Value::Bool(flag)) => *flag,
                    Some(Value::Number(number)) => number.as_i64().is_some_and(|flag| flag != 0),
                    Some(_) => return Err(ExtractError::invalid_rule(field, "`must` must be a flag")),
                };
                let kind = match map.get("type") {
                    None => FieldKind::String,
                    Some(Value::String(raw)) => FieldKind::parse(raw).ok_or_else(|| {
                        ExtractError::invalid_rule(field, format!("unknown type `{raw}`"))
                    })?,
                    Some(_) => return Err(ExtractError::invalid_rule(field, "`type` must be a string")),
                };
                let min = bound(field, map.get("min"))?;
                let max = bound(field, map.get("max"))?;
                Ok(Self {
                    required,
                    kind,
                    min,
                    max,
                })
            }
            _ => Err(ExtractError::invalid_rule(field, "unsupported directive")),
        }
    }

    fn convert(&self, field: &str, raw: &str) -> Result<Value, ExtractError> {
        let value = match self.kind {
            FieldKind::String => {
                let length = raw.chars().count() as f64;
                self.check_bounds(field, length, "length")?;
                Value::String(raw.to_string())
            }
            FieldKind::Int => {
                let parsed: i64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| ExtractError::invalid_field(field, "expected an integer"))?;
                self.check_bounds(field, parsed as f64, "value")?;
                Value::from(parsed)
            }
            FieldKind::Float => {
                let parsed: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| ExtractError::invalid_field(field, "expected a number"))?;
                self.check_bounds(field, parsed, "value")?;
                Number::from_f64(parsed)
                    .map(Value::Number)
                    .ok_or_else(|| ExtractError::invalid_field(field, "number is not finite"))?
            }
            FieldKind::Bool => match raw.trim() {
                "true" | "1" | "on" | "yes" => Value::Bool(true),
                "false" | "0" | "off" | "no" => Value::Bool(false),
                _ => return Err(ExtractError::invalid_field(field, "expected a boolean")),
            },
            FieldKind::Id => DocumentId::parse(raw)
                .map(Value::from)
                .map_err(|err| ExtractError::invalid_field(field, err.to_string()))?,
        };
        Ok(value)
    }

    fn check_bounds(&self, field: &str, measured: f64, what: &str) -> Result<(), ExtractError> {
        if let Some(min) = self.min
            && measured < min
        {
            return Err(ExtractError::invalid_field(field, format!("{what} below {min}")));
        }
        if let Some(max) = self.max
            && measured > max
        {
            return Err(ExtractError::invalid_field(field, format!("{what} above {max}")));
        }
        Ok(())
    }
}

fn bound(field: &str, value: Option<&Value>) -> Result<Option<f64>, ExtractError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| ExtractError::invalid_rule(field, "bounds must be numbers")),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionRule {
    fields: BTreeMap<String, FieldDirective>,
}

impl ExtractionRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, directive: FieldDirective) -> Self {
        self.fields.insert(name.into(), directive);
        self
    }

    pub fn required(self, name: impl Into<String>) -> Self {
        self.field(name, FieldDirective::required(FieldKind::String))
    }

    pub fn optional(self, name: impl Into<String>) -> Self {
        self.field(name, FieldDirective::optional(FieldKind::String))
    }

    /// Build a rule from its configured JSON form.
    pub fn from_value(value: &Value) -> Result<Self, ExtractError> {
        let Some(map) = value.as_object() else {
            return Err(ExtractError::invalid_rule("*", "rule must be an object"));
        };
        let mut fields = BTreeMap::new();
        for (name, directive) in map {
            fields.insert(name.clone(), FieldDirective::from_value(name, directive)?);
        }
        Ok(Self { fields })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn directive(&self, name: &str) -> Option<&FieldDirective> {
        self.fields.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Required fields of this rule absent from `extracted`, sorted by name.
    pub fn missing(&self, extracted: &Document) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(name, directive)| directive.required && !extracted.contains_key(*name))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Pull the fields named by the rule out of `input`, typed per directive.
    ///
    /// Empty values count as absent. Repeated values become a list.
    pub fn extract(&self, input: &FormInput) -> Result<Document, ExtractError> {
        let mut extracted = Document::new();
        for (name, directive) in &self.fields {
            let values: Vec<&String> = input
                .all(name)
                .iter()
                .filter(|value| !value.is_empty())
                .collect();
            let value = match values.as_slice() {
                [] => continue,
                [single] => directive.convert(name, single)?,
                many => Value::Array(
                    many.iter()
                        .map(|raw| directive.convert(name, raw))
                        .collect::<Result<_, _>>()?,
                ),
            };
            extracted.insert(name.clone(), value);
        }

        let missing = self.missing(&extracted);
        if !missing.is_empty() {
            return Err(ExtractError::MissingFields(missing));
        }
        Ok(extracted)
    }
}
