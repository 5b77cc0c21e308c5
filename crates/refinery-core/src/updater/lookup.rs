use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{KeySource, Update, Updater, KIND};
use crate::error::{ConfigError, PipelineError, Result};
use crate::keymatcher::KeyMatcher;
use crate::record::{require, text, Record};
use crate::registry::{params, Registry};

/// Lookup tables by name; each maps a lookup key to a value.
pub type ValueMaps = HashMap<String, HashMap<String, Value>>;

/// Which table(s) a field depends on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TableRef {
    Single(String),
    /// Several tables combined into one key. Accepted in configs, rejected
    /// when a record reaches it.
    Composite(Vec<String>),
}

/// What the lookup key is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupMode {
    /// The record's value at `item_key`.
    #[default]
    Value,
    /// `item_key` itself.
    Key,
}

/// How one field finds its value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Dependency {
    /// Table name.
    pub key: TableRef,
    /// Source field (or literal key in [`LookupMode::Key`]); defaults to the
    /// field being updated.
    #[serde(default)]
    pub item_key: Option<String>,
    #[serde(rename = "type", default)]
    pub mode: LookupMode,
}

/// Updates fields from named lookup tables.
///
/// A field with no dependency takes the literal carried by the key matcher,
/// if any. A lookup miss leaves the field untouched.
#[derive(Debug, Clone)]
pub struct MapperUpdater {
    matcher: KeyMatcher,
    dependence: BTreeMap<String, Dependency>,
    value_maps: ValueMaps,
}

impl MapperUpdater {
    pub fn new(
        matcher: KeyMatcher,
        dependence: BTreeMap<String, Dependency>,
        value_maps: ValueMaps,
    ) -> Result<Self, ConfigError> {
        for (field, dep) in &dependence {
            let tables: Vec<&String> = match &dep.key {
                TableRef::Single(table) => vec![table],
                TableRef::Composite(tables) => tables.iter().collect(),
            };
            if let Some(missing) = tables.into_iter().find(|t| !value_maps.contains_key(*t)) {
                return Err(ConfigError::invalid(
                    KIND,
                    format!("field '{}' depends on unknown table '{}'", field, missing),
                ));
            }
        }
        Ok(Self {
            matcher,
            dependence,
            value_maps,
        })
    }

    /// Key matcher over exactly the fields that have a dependency.
    pub fn dependent_fields(dependence: &BTreeMap<String, Dependency>) -> Vec<String> {
        dependence.keys().cloned().collect()
    }

    fn single_key_value(
        &self,
        record: &Record,
        field: &str,
        table: &str,
        dep: &Dependency,
    ) -> Result<Update> {
        let item_key = dep.item_key.as_deref().unwrap_or(field);
        let search: Cow<'_, str> = match dep.mode {
            LookupMode::Value => text(require(record, item_key)?),
            LookupMode::Key => Cow::Borrowed(item_key),
        };
        Ok(self
            .value_maps
            .get(table)
            .and_then(|values| values.get(search.as_ref()))
            .map_or(Update::NoUpdate, |v| Update::Set(v.clone())))
    }
}

impl Updater for MapperUpdater {
    fn name(&self) -> &str {
        "mapper"
    }

    fn key_matcher(&self) -> &KeyMatcher {
        &self.matcher
    }

    fn derive(&self, record: &Record, field: &str, literal: Option<&Value>) -> Result<Update> {
        let Some(dep) = self.dependence.get(field) else {
            return Ok(literal.map_or(Update::NoUpdate, |v| Update::Set(v.clone())));
        };
        match &dep.key {
            TableRef::Single(table) => self.single_key_value(record, field, table, dep),
            TableRef::Composite(tables) => Err(PipelineError::Unsupported(format!(
                "field '{}' depends on multiple tables {:?}; multi-key lookup is not implemented",
                field, tables
            ))),
        }
    }

    fn on_empty_value(&self, record: &Record, field: &str) {
        debug!(
            field,
            current = ?record.get(field),
            dependency = ?self.dependence.get(field),
            "lookup produced no value, field left untouched"
        );
    }
}

#[derive(Deserialize)]
struct MapperParams {
    #[serde(flatten)]
    source: KeySource,
    #[serde(alias = "dependency")]
    dependence: BTreeMap<String, Dependency>,
    #[serde(alias = "tables")]
    value_maps: ValueMaps,
}

pub(super) fn register(registry: &mut Registry<Box<dyn Updater>>) {
    registry.register("mapper", |cfg, catalog| {
        let p: MapperParams = params(KIND, cfg)?;
        let fallback = MapperUpdater::dependent_fields(&p.dependence);
        let matcher = p.source.into_matcher(catalog, Some(fallback))?;
        Ok(Box::new(MapperUpdater::new(matcher, p.dependence, p.value_maps)?))
    });
}
