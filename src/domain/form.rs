//! Multi-valued request parameters merged from the query string and form body.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormInput {
    values: BTreeMap<String, Vec<String>>,
}

impl FormInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_urlencoded(raw: &[u8]) -> Self {
        let mut input = Self::new();
        input.merge_urlencoded(raw);
        input
    }

    /// Append every pair of an `application/x-www-form-urlencoded` payload.
    pub fn merge_urlencoded(&mut self, raw: &[u8]) {
        for (key, value) in url::form_urlencoded::parse(raw) {
            self.push(key.into_owned(), value.into_owned());
        }
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_default().push(value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn all(&self, key: &str) -> &[String] {
        self.values.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.all(key).first().map(String::as_str)
    }

    pub fn first_non_empty(&self, key: &str) -> Option<&str> {
        self.first(key).filter(|value| !value.is_empty())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for FormInput
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut input = Self::new();
        for (key, value) in iter {
            input.push(key, value);
        }
        input
    }
}
