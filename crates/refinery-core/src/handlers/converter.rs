use serde::Deserialize;
use serde_json::Value;

use super::{gate, KIND};
use crate::error::{ConfigError, Result};
use crate::handler::Handler;
use crate::matches::Match;
use crate::record::Record;
use crate::registry::{params, Registry};
use crate::updater::Updater;

/// Applies its updaters in order when the gate matches; otherwise the record
/// passes through unchanged. Each updater sees the previous one's output.
#[derive(Debug)]
pub struct Converter {
    gate: Match,
    updaters: Vec<Box<dyn Updater>>,
}

impl Converter {
    pub fn new(gate: Match, updaters: Vec<Box<dyn Updater>>) -> Self {
        Self { gate, updaters }
    }

    /// An ungated converter.
    pub fn always(updaters: Vec<Box<dyn Updater>>) -> Self {
        Self::new(Match::True, updaters)
    }
}

impl Handler for Converter {
    fn name(&self) -> &str {
        "converter"
    }

    fn handle(&mut self, record: Record) -> Result<Option<Record>> {
        if !self.gate.matches(&record)? {
            return Ok(Some(record));
        }
        let mut current = record;
        for updater in &self.updaters {
            current = updater.update(&current)?;
        }
        Ok(Some(current))
    }
}

#[derive(Deserialize)]
struct ConverterParams {
    #[serde(default, rename = "match", alias = "condition")]
    gate: Option<Value>,
    #[serde(alias = "updaters")]
    updater: Value,
}

pub(super) fn register(registry: &mut Registry<Box<dyn Handler>>) {
    registry.register("converter", |cfg, catalog| {
        let p: ConverterParams = params(KIND, cfg)?;
        let gate = gate(p.gate.as_ref(), catalog)?;
        let updaters = match &p.updater {
            Value::Array(items) => items
                .iter()
                .map(|item| catalog.build_updater(item))
                .collect::<Result<Vec<_>, ConfigError>>()?,
            single => vec![catalog.build_updater(single)?],
        };
        Ok(Box::new(Converter::new(gate, updaters)))
    });
}
