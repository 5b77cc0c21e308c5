//! Field updaters.
//!
//! An updater pairs a [`KeyMatcher`] (which fields) with a derivation rule
//! (what value). [`Updater::update`] never touches the record it is given:
//! it works on a copy and returns it.
//!
//! Variants:
//! - `static`: a fixed value, or the literal value carried by the matcher
//! - `regex`: regex substitution over a source field
//! - `mapper`: lookup-table value keyed by a record value or a field name
//! - `combine`: template over the field's value and an auxiliary map
//! - `format`: template over several record fields

mod format;
mod lookup;
mod substitute;

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ConfigError, Result};
use crate::keymatcher::KeyMatcher;
use crate::record::Record;
use crate::registry::{params, Catalog, Registry};

pub use format::{CombineUpdater, FormatUpdater};
pub use lookup::{Dependency, LookupMode, MapperUpdater, TableRef};
pub use substitute::RegexUpdater;

/// Outcome of deriving a field's value. `NoUpdate` is distinct from every
/// value, `null` and `""` included.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Set(Value),
    NoUpdate,
}

pub trait Updater: fmt::Debug {
    /// Registry tag of the variant, for logs.
    fn name(&self) -> &str;

    fn key_matcher(&self) -> &KeyMatcher;

    /// Compute the new value of `field`. `literal` is the payload the key
    /// matcher attached to the field, if any.
    fn derive(&self, record: &Record, field: &str, literal: Option<&Value>) -> Result<Update>;

    /// Called for every field whose derivation returned [`Update::NoUpdate`].
    fn on_empty_value(&self, record: &Record, field: &str) {
        let _ = (record, field);
    }

    /// Apply to a copy of `record` and return the copy.
    fn update(&self, record: &Record) -> Result<Record> {
        let mut updated = record.clone();
        for key in self.key_matcher().resolve(record)? {
            match self.derive(record, &key.field, key.literal)? {
                Update::Set(value) => {
                    updated.insert(key.field.into_owned(), value);
                }
                Update::NoUpdate => self.on_empty_value(record, &key.field),
            }
        }
        Ok(updated)
    }
}

/// How an updater config names its fields: `"keys"` holds a key matcher
/// rule (or an array shorthand for a list), `"values"` a literal
/// field → value map.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct KeySource {
    #[serde(default)]
    keys: Option<Value>,
    #[serde(default)]
    values: Option<Record>,
}

impl KeySource {
    pub(crate) fn into_matcher(
        self,
        catalog: &Catalog,
        fallback: Option<Vec<String>>,
    ) -> Result<KeyMatcher, ConfigError> {
        match (self.keys, self.values) {
            (Some(_), Some(_)) => Err(ConfigError::invalid(
                KIND,
                "use either \"keys\" or \"values\", not both",
            )),
            (Some(Value::Array(names)), None) => names
                .into_iter()
                .map(|n| match n {
                    Value::String(s) => Ok(s),
                    other => Err(ConfigError::invalid(
                        KIND,
                        format!("key names must be strings, got {}", other),
                    )),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(KeyMatcher::List),
            (Some(rule), None) => catalog.build_key_matcher(&rule),
            (None, Some(values)) => Ok(KeyMatcher::Literal(values)),
            (None, None) => fallback
                .map(KeyMatcher::List)
                .ok_or_else(|| ConfigError::missing(KIND, "keys")),
        }
    }
}

/// Sets each matched field to the literal the matcher carries, or else to
/// a configured constant.
#[derive(Debug, Clone)]
pub struct StaticUpdater {
    matcher: KeyMatcher,
    value: Option<Value>,
}

impl StaticUpdater {
    pub fn new(matcher: KeyMatcher, value: Option<Value>) -> Self {
        Self { matcher, value }
    }

    /// Literal mapping: each entry sets its field to its value.
    pub fn literal(values: Record) -> Self {
        Self::new(KeyMatcher::Literal(values), None)
    }
}

impl Updater for StaticUpdater {
    fn name(&self) -> &str {
        "static"
    }

    fn key_matcher(&self) -> &KeyMatcher {
        &self.matcher
    }

    fn derive(&self, _record: &Record, _field: &str, literal: Option<&Value>) -> Result<Update> {
        Ok(match literal.or(self.value.as_ref()) {
            Some(value) => Update::Set(value.clone()),
            None => Update::NoUpdate,
        })
    }
}

#[derive(Deserialize)]
struct StaticParams {
    #[serde(flatten)]
    source: KeySource,
    #[serde(default)]
    value: Option<Value>,
}

pub(crate) const KIND: &str = "updater";

pub(crate) fn register_builtins(registry: &mut Registry<Box<dyn Updater>>) {
    registry.register("static", |cfg, catalog| {
        let p: StaticParams = params(KIND, cfg)?;
        let matcher = p.source.into_matcher(catalog, None)?;
        Ok(Box::new(StaticUpdater::new(matcher, p.value)))
    });
    substitute::register(registry);
    lookup::register(registry);
    format::register(registry);
}
