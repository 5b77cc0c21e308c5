//! Record predicates and their boolean composition.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ConfigError, FieldAccessError};
use crate::pattern::{self, RegexFlags};
use crate::record::{require_str, Record};
use crate::registry::{params, Registry};

/// Expected value(s) for [`Match::KeyEquals`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    Value(Value),
    /// The field must equal one of these.
    OneOf(Vec<Value>),
}

impl From<Value> for Expected {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Expected::OneOf(items),
            other => Expected::Value(other),
        }
    }
}

/// A boolean test over a record. Immutable once built; evaluation never
/// mutates the record.
#[derive(Debug, Clone, Default)]
pub enum Match {
    #[default]
    True,
    /// `record[key]` equals the expected value (or is one of them). An
    /// absent field never matches.
    KeyEquals { key: String, expected: Expected },
    /// The pattern matches at the start of the string at `record[key]`.
    Regex { key: String, pattern: Regex },
    And(Box<Match>, Box<Match>),
    Or(Box<Match>, Box<Match>),
    Not(Box<Match>),
    /// Every listed field is present with an equal value.
    DictSubset(Record),
}

impl Match {
    pub fn key(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Match::KeyEquals {
            key: key.into(),
            expected: Expected::from(value.into()),
        }
    }

    pub fn regex(key: impl Into<String>, pattern: &str) -> Result<Self, ConfigError> {
        Self::regex_with_flags(key, pattern, RegexFlags::default())
    }

    pub fn regex_with_flags(
        key: impl Into<String>,
        pattern: &str,
        flags: RegexFlags,
    ) -> Result<Self, ConfigError> {
        Ok(Match::Regex {
            key: key.into(),
            pattern: pattern::compile(pattern, flags, true)?,
        })
    }

    pub fn and(a: Match, b: Match) -> Self {
        Match::And(Box::new(a), Box::new(b))
    }

    pub fn or(a: Match, b: Match) -> Self {
        Match::Or(Box::new(a), Box::new(b))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(a: Match) -> Self {
        Match::Not(Box::new(a))
    }

    /// Evaluate against a record.
    ///
    /// Fails only for [`Match::Regex`] when the target field is absent or not
    /// a string.
    pub fn matches(&self, record: &Record) -> Result<bool, FieldAccessError> {
        match self {
            Match::True => Ok(true),
            Match::KeyEquals { key, expected } => Ok(match (record.get(key), expected) {
                (None, _) => false,
                (Some(actual), Expected::Value(value)) => actual == value,
                (Some(actual), Expected::OneOf(values)) => values.contains(actual),
            }),
            Match::Regex { key, pattern } => Ok(pattern.is_match(require_str(record, key)?)),
            Match::And(a, b) => Ok(a.matches(record)? && b.matches(record)?),
            Match::Or(a, b) => Ok(a.matches(record)? || b.matches(record)?),
            Match::Not(a) => Ok(!a.matches(record)?),
            Match::DictSubset(required) => Ok(required
                .iter()
                .all(|(field, value)| record.get(field) == Some(value))),
        }
    }
}

#[derive(Deserialize)]
struct KeyParams {
    key: String,
    value: Value,
}

#[derive(Deserialize)]
struct RegexParams {
    key: String,
    pattern: String,
    #[serde(default)]
    flag: RegexFlags,
}

#[derive(Deserialize)]
struct BinaryParams {
    a: Value,
    b: Value,
}

#[derive(Deserialize)]
struct UnaryParams {
    a: Value,
}

#[derive(Deserialize)]
struct DictParams {
    #[serde(default)]
    data: Record,
}

const KIND: &str = "match";

pub(crate) fn register_builtins(registry: &mut Registry<Match>) {
    registry.register("true", |_, _| Ok(Match::True));
    registry.register("key", |cfg, _| {
        let p: KeyParams = params(KIND, cfg)?;
        Ok(Match::key(p.key, p.value))
    });
    registry.register("regex", |cfg, _| {
        let p: RegexParams = params(KIND, cfg)?;
        Match::regex_with_flags(p.key, &p.pattern, p.flag)
    });
    registry.register("and", |cfg, catalog| {
        let p: BinaryParams = params(KIND, cfg)?;
        Ok(Match::and(catalog.build_match(&p.a)?, catalog.build_match(&p.b)?))
    });
    registry.register("or", |cfg, catalog| {
        let p: BinaryParams = params(KIND, cfg)?;
        Ok(Match::or(catalog.build_match(&p.a)?, catalog.build_match(&p.b)?))
    });
    registry.register("not", |cfg, catalog| {
        let p: UnaryParams = params(KIND, cfg)?;
        Ok(Match::not(catalog.build_match(&p.a)?))
    });
    registry.register("dict", |cfg, _| {
        let p: DictParams = params(KIND, cfg)?;
        Ok(Match::DictSubset(p.data))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Catalog;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn samples() -> Vec<Record> {
        vec![
            record(json!({})),
            record(json!({"status": "ok", "name": "Mr. Smith"})),
            record(json!({"status": "drop", "name": "x"})),
            record(json!({"status": null, "name": "Mrs. Jones", "n": 3})),
        ]
    }

    fn predicates() -> Vec<Match> {
        vec![
            Match::True,
            Match::key("status", "ok"),
            Match::key("status", json!(["ok", "drop"])),
            Match::key("status", Value::Null),
            Match::DictSubset(record(json!({"status": "drop", "name": "x"}))),
        ]
    }

    #[test]
    fn test_key_equals() {
        let r = record(json!({"status": "ok", "n": 3}));
        assert!(Match::key("status", "ok").matches(&r).unwrap());
        assert!(!Match::key("status", "drop").matches(&r).unwrap());
        assert!(Match::key("n", 3).matches(&r).unwrap());
    }

    #[test]
    fn test_key_equals_missing_field_never_matches() {
        let r = record(json!({"other": 1}));
        assert!(!Match::key("status", Value::Null).matches(&r).unwrap());
        assert!(!Match::key("status", json!([null, "ok"])).matches(&r).unwrap());
    }

    #[test]
    fn test_key_membership() {
        let m = Match::key("country", json!(["US", "CA"]));
        assert!(m.matches(&record(json!({"country": "CA"}))).unwrap());
        assert!(!m.matches(&record(json!({"country": "MX"}))).unwrap());
    }

    #[test]
    fn test_regex_prefix_anchored() {
        let m = Match::regex("name", r"Mr\.").unwrap();
        assert!(m.matches(&record(json!({"name": "Mr. Smith"}))).unwrap());
        assert!(!m.matches(&record(json!({"name": "Dear Mr. Smith"}))).unwrap());
    }

    #[test]
    fn test_regex_fails_fast_on_bad_field() {
        let m = Match::regex("name", "x").unwrap();
        assert_eq!(
            m.matches(&record(json!({}))).unwrap_err(),
            FieldAccessError::Missing("name".to_string())
        );
        assert_eq!(
            m.matches(&record(json!({"name": 5}))).unwrap_err(),
            FieldAccessError::NotAString("name".to_string())
        );
    }

    #[test]
    fn test_dict_subset() {
        let m = Match::DictSubset(record(json!({"a": 1, "b": "x"})));
        assert!(m.matches(&record(json!({"a": 1, "b": "x", "c": 0}))).unwrap());
        assert!(!m.matches(&record(json!({"a": 1}))).unwrap());
        assert!(!m.matches(&record(json!({"a": 2, "b": "x"}))).unwrap());
        assert!(Match::DictSubset(Record::new()).matches(&record(json!({}))).unwrap());
    }

    #[test]
    fn test_algebra_laws() {
        let falsy = Match::not(Match::True);
        for r in samples() {
            for p in predicates() {
                let base = p.matches(&r).unwrap();
                assert_eq!(Match::not(p.clone()).matches(&r).unwrap(), !base);
                assert_eq!(Match::and(p.clone(), Match::True).matches(&r).unwrap(), base);
                assert_eq!(Match::or(p.clone(), falsy.clone()).matches(&r).unwrap(), base);
            }
        }
    }

    #[test]
    fn test_build_from_config() {
        let catalog = Catalog::with_builtins();
        let m = catalog
            .build_match(&json!({
                "type": "and",
                "a": {"type": "key", "key": "status", "value": ["ok", "new"]},
                "b": {"type": "not", "a": {"class": "regex", "key": "name", "pattern": "mr", "flag": 2}}
            }))
            .unwrap();
        assert!(m.matches(&record(json!({"status": "new", "name": "Ms. A"}))).unwrap());
        assert!(!m.matches(&record(json!({"status": "new", "name": "MR. B"}))).unwrap());
        assert!(!m.matches(&record(json!({"status": "old", "name": "Ms. A"}))).unwrap());
    }

    #[test]
    fn test_build_dict_match() {
        let catalog = Catalog::with_builtins();
        let m = catalog
            .build_match(&json!({"type": "dict", "data": {"a": 1}}))
            .unwrap();
        assert!(m.matches(&record(json!({"a": 1}))).unwrap());
    }

    #[test]
    fn test_build_errors() {
        let catalog = Catalog::with_builtins();
        assert!(matches!(
            catalog.build_match(&json!({"type": "maybe"})),
            Err(ConfigError::UnknownType { kind: "match", .. })
        ));
        assert!(matches!(
            catalog.build_match(&json!({"key": "a", "value": 1})),
            Err(ConfigError::MissingType { .. })
        ));
        assert!(matches!(
            catalog.build_match(&json!({"type": "key", "key": "a"})),
            Err(ConfigError::MissingField { ref field, .. }) if field == "value"
        ));
        assert!(matches!(
            catalog.build_match(&json!({"type": "and", "a": {"type": "true"}, "b": {"type": "bogus"}})),
            Err(ConfigError::UnknownType { ref tag, .. }) if tag == "bogus"
        ));
        assert!(matches!(
            catalog.build_match(&json!({"type": "regex", "key": "a", "pattern": "("})),
            Err(ConfigError::Regex { .. })
        ));
    }
}
