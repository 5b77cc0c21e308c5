//! The record source contract.

use std::fmt;

use serde::Deserialize;

use crate::error::Result;
use crate::record::Record;
use crate::registry::{params, Registry};

/// Lazy record stream. `Ok(None)` is an explicit end-of-stream sentinel and
/// is treated exactly like exhaustion; an `Err` aborts the run.
pub type RecordStream<'a> = Box<dyn Iterator<Item = Result<Option<Record>>> + 'a>;

/// A finite, non-restartable source of records.
pub trait Producer: fmt::Debug {
    fn name(&self) -> &str;

    /// Open the stream. Failing to open it fails the run.
    fn records(&mut self) -> Result<RecordStream<'_>>;
}

/// Records held in memory; a `None` entry ends the stream early.
#[derive(Debug, Clone, Default)]
pub struct InlineProducer {
    records: Vec<Option<Record>>,
}

impl InlineProducer {
    pub fn new(records: Vec<Option<Record>>) -> Self {
        Self { records }
    }
}

impl FromIterator<Record> for InlineProducer {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Some).collect())
    }
}

impl Producer for InlineProducer {
    fn name(&self) -> &str {
        "inline"
    }

    fn records(&mut self) -> Result<RecordStream<'_>> {
        Ok(Box::new(std::mem::take(&mut self.records).into_iter().map(Ok)))
    }
}

#[derive(Deserialize)]
struct InlineParams {
    #[serde(default)]
    records: Vec<Option<Record>>,
}

pub(crate) fn register_builtins(registry: &mut Registry<Box<dyn Producer>>) {
    registry.register("inline", |cfg, _| {
        let p: InlineParams = params("producer", cfg)?;
        Ok(Box::new(InlineProducer::new(p.records)))
    });
}
