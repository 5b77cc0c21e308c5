use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use super::{gate, KIND};
use crate::error::{ConfigError, Result};
use crate::handler::Handler;
use crate::matches::Match;
use crate::record::{require, text, Record};
use crate::registry::{params, Registry};

/// Remaps one field through a static dictionary.
///
/// The value at `key` (in text form) is looked up in `mapper`; the result is
/// written to `dst` (default: `key` itself). On a miss the configured
/// default is written, or the original value when there is none.
#[derive(Debug, Clone)]
pub struct DictConverter {
    gate: Match,
    key: String,
    dst: String,
    mapper: HashMap<String, Value>,
    default: Option<Value>,
}

impl DictConverter {
    pub fn new(key: impl Into<String>, mapper: HashMap<String, Value>) -> Self {
        let key = key.into();
        Self {
            gate: Match::True,
            dst: key.clone(),
            key,
            mapper,
            default: None,
        }
    }

    pub fn with_dst(mut self, dst: impl Into<String>) -> Self {
        self.dst = dst.into();
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_gate(mut self, gate: Match) -> Self {
        self.gate = gate;
        self
    }
}

impl Handler for DictConverter {
    fn name(&self) -> &str {
        "dict_converter"
    }

    fn handle(&mut self, mut record: Record) -> Result<Option<Record>> {
        if !self.gate.matches(&record)? {
            return Ok(Some(record));
        }
        let current = require(&record, &self.key)?;
        let mapped = match self.mapper.get(text(current).as_ref()) {
            Some(value) => value.clone(),
            None => self.default.clone().unwrap_or_else(|| current.clone()),
        };
        record.insert(self.dst.clone(), mapped);
        Ok(Some(record))
    }
}

/// Copies the first present, non-null field among `keys` into `dst`. When
/// none qualifies the record is left as is.
#[derive(Debug, Clone)]
pub struct KeysPicker {
    gate: Match,
    keys: Vec<String>,
    dst: String,
}

impl KeysPicker {
    pub fn new<I, S>(keys: I, dst: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            gate: Match::True,
            keys: keys.into_iter().map(Into::into).collect(),
            dst: dst.into(),
        }
    }

    pub fn with_gate(mut self, gate: Match) -> Self {
        self.gate = gate;
        self
    }
}

impl Handler for KeysPicker {
    fn name(&self) -> &str {
        "keys_picker"
    }

    fn handle(&mut self, mut record: Record) -> Result<Option<Record>> {
        if !self.gate.matches(&record)? {
            return Ok(Some(record));
        }
        let picked = self
            .keys
            .iter()
            .filter_map(|k| record.get(k))
            .find(|v| !v.is_null())
            .cloned();
        if let Some(value) = picked {
            record.insert(self.dst.clone(), value);
        }
        Ok(Some(record))
    }
}

/// Inline dictionary or path to a JSON file holding one.
#[derive(Deserialize)]
#[serde(untagged)]
enum MapperSource {
    Inline(HashMap<String, Value>),
    File(String),
}

impl MapperSource {
    fn load(self) -> Result<HashMap<String, Value>, ConfigError> {
        match self {
            MapperSource::Inline(mapper) => Ok(mapper),
            MapperSource::File(path) => load_mapper(Path::new(&path)),
        }
    }
}

fn load_mapper(path: &Path) -> Result<HashMap<String, Value>, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|e| {
        ConfigError::invalid(KIND, format!("cannot read mapper file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        ConfigError::invalid(KIND, format!("mapper file {} is not a JSON object: {}", path.display(), e))
    })
}

#[derive(Deserialize)]
struct DictConverterParams {
    key: String,
    #[serde(default)]
    dst: Option<String>,
    mapper: MapperSource,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default, alias = "match")]
    condition: Option<Value>,
}

#[derive(Deserialize)]
struct KeysPickerParams {
    keys: Vec<String>,
    dst: String,
    #[serde(default, alias = "match")]
    condition: Option<Value>,
}

pub(super) fn register(registry: &mut Registry<Box<dyn Handler>>) {
    registry.register("dict_converter", |cfg, catalog| {
        let p: DictConverterParams = params(KIND, cfg)?;
        let mut handler = DictConverter::new(p.key, p.mapper.load()?)
            .with_gate(gate(p.condition.as_ref(), catalog)?);
        if let Some(dst) = p.dst {
            handler = handler.with_dst(dst);
        }
        if let Some(default) = p.default {
            handler = handler.with_default(default);
        }
        Ok(Box::new(handler))
    });
    registry.register("keys_picker", |cfg, catalog| {
        let p: KeysPickerParams = params(KIND, cfg)?;
        if p.keys.is_empty() {
            return Err(ConfigError::invalid(KIND, "keys_picker needs at least one key"));
        }
        Ok(Box::new(
            KeysPicker::new(p.keys, p.dst).with_gate(gate(p.condition.as_ref(), catalog)?),
        ))
    });
}
