//! Search filters: path prefixes plus case-insensitive property matches

use crate::record::{search_document, FileRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors raised while building a search filter
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid property key '{0}': only letters, digits and '_' are allowed")]
    InvalidPropertyKey(String),

    #[error("Malformed filter entry '{0}'")]
    MalformedFilter(String),
}

pub type QueryResult<T> = Result<T, QueryError>;

/// A property name that is safe to place in query structure.
///
/// Values are always bound as parameters; keys cannot be, so they are
/// restricted to `[A-Za-z0-9_]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PropertyKey(String);

impl PropertyKey {
    pub fn is_valid(key: &str) -> bool {
        !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    pub fn parse(key: &str) -> QueryResult<Self> {
        if Self::is_valid(key) {
            Ok(Self(key.to_string()))
        } else {
            Err(QueryError::InvalidPropertyKey(key.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PropertyKey {
    type Error = QueryError;

    fn try_from(value: String) -> QueryResult<Self> {
        Self::parse(&value)
    }
}

impl From<PropertyKey> for String {
    fn from(key: PropertyKey) -> Self {
        key.0
    }
}

/// Which records a search returns.
///
/// A record matches when its path starts with any of `paths` (or `paths` is
/// empty) and, for every property filter, the property's text contains the
/// filter value. Both tests ignore case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub paths: Vec<String>,
    pub properties: BTreeMap<PropertyKey, String>,
}

impl SearchFilter {
    /// Matches every record
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, prefix: impl Into<String>) -> Self {
        self.paths.push(prefix.into());
        self
    }

    pub fn with_paths<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths.extend(prefixes.into_iter().map(Into::into));
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<String>) -> QueryResult<Self> {
        self.properties.insert(PropertyKey::parse(key)?, value.into());
        Ok(self)
    }

    /// Add filters typed as `key: value, key2: value2`.
    ///
    /// Entries are split on `,` and then on the first `:`; both sides are
    /// trimmed. Entries without a `:` are ignored.
    pub fn with_user_input(mut self, input: &str) -> QueryResult<Self> {
        self.properties.extend(Self::parse_user_input(input)?);
        Ok(self)
    }

    pub fn parse_user_input(input: &str) -> QueryResult<BTreeMap<PropertyKey, String>> {
        let mut filters = BTreeMap::new();
        for entry in input.split(',') {
            let Some((key, value)) = entry.split_once(':') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(QueryError::MalformedFilter(entry.trim().to_string()));
            }
            filters.insert(PropertyKey::parse(key)?, value.trim().to_string());
        }
        Ok(filters)
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.properties.is_empty()
    }

    /// Evaluate the filter against a record in memory
    pub fn matches(&self, record: &FileRecord) -> bool {
        if !self.paths.is_empty() {
            let path = record.file_path.to_lowercase();
            if !self
                .paths
                .iter()
                .any(|prefix| path.starts_with(&prefix.to_lowercase()))
            {
                return false;
            }
        }

        if self.properties.is_empty() {
            return true;
        }
        let document = search_document(record);
        self.properties.iter().all(|(key, needle)| {
            document
                .get(key.as_str())
                .is_some_and(|text| text.to_lowercase().contains(&needle.to_lowercase()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_keys_are_restricted() {
        assert!(PropertyKey::is_valid("company"));
        assert!(PropertyKey::is_valid("context_note2"));
        assert!(!PropertyKey::is_valid(""));
        assert!(!PropertyKey::is_valid("company name"));
        assert!(!PropertyKey::is_valid("x`) DETACH DELETE n //"));
        assert_eq!(
            PropertyKey::parse("a.b"),
            Err(QueryError::InvalidPropertyKey("a.b".into()))
        );
    }

    #[test]
    fn parses_user_input() {
        let filters = SearchFilter::parse_user_input("company: Toyota , category:cars, junk").unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[&PropertyKey::parse("company").unwrap()], "Toyota");
        assert_eq!(filters[&PropertyKey::parse("category").unwrap()], "cars");
    }

    #[test]
    fn value_keeps_later_colons() {
        let filters = SearchFilter::parse_user_input("note: call at 10:30").unwrap();
        assert_eq!(filters[&PropertyKey::parse("note").unwrap()], "call at 10:30");
    }

    #[test]
    fn rejects_bad_entries() {
        assert!(matches!(
            SearchFilter::parse_user_input(": orphan"),
            Err(QueryError::MalformedFilter(_))
        ));
        assert!(matches!(
            SearchFilter::parse_user_input("first name: Ann"),
            Err(QueryError::InvalidPropertyKey(_))
        ));
    }

    #[test]
    fn matches_ignore_case() {
        let record = FileRecord::new("card_1", "C:\\Users\\X\\cards\\card.pdf", "Business Card")
            .with_field("company", "Toyota Motors");

        let hit = SearchFilter::new()
            .with_path("c:\\users\\x\\")
            .with_property("company", "toyota")
            .unwrap();
        assert!(hit.matches(&record));

        let wrong_path = SearchFilter::new().with_path("D:\\");
        assert!(!wrong_path.matches(&record));

        let missing_field = SearchFilter::new().with_property("phone", "555").unwrap();
        assert!(!missing_field.matches(&record));

        assert!(SearchFilter::new().matches(&record));
    }

    #[test]
    fn any_path_prefix_is_enough() {
        let record = FileRecord::new("r", "/scans/b.pdf", "Receipt");
        let filter = SearchFilter::new().with_paths(["/docs/", "/SCANS/"]);
        assert!(filter.matches(&record));
    }
}
