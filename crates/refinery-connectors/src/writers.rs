//! File sinks.
//!
//! A sink opens its file on pipeline entry and closes it on exit. Records
//! pass through unchanged. Write failures are logged and swallowed: output
//! is best effort and never aborts a run.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use refinery_core::record::text;
use refinery_core::{Handler, Lifecycle, Match, Record, Result};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{csv_error, io_error};

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(value) => text(value).into_owned(),
    }
}

/// Writes delimited rows. With `headers`, a header row is written first and
/// every row follows that column order (absent fields become empty cells);
/// without, a row holds the record's values in field order.
#[derive(Debug)]
pub struct CsvWriter {
    path: PathBuf,
    separator: u8,
    headers: Option<Vec<String>>,
    writer: Option<csv::Writer<File>>,
    written: u64,
}

impl CsvWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            separator: b',',
            headers: None,
            writer: None,
            written: 0,
        }
    }

    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_headers(mut self, headers: Vec<String>) -> Self {
        self.headers = Some(headers);
        self
    }

    fn row(&self, record: &Record) -> Vec<String> {
        match &self.headers {
            Some(headers) => headers.iter().map(|h| cell(record.get(h))).collect(),
            None => record.values().map(|v| cell(Some(v))).collect(),
        }
    }
}

impl Handler for CsvWriter {
    fn name(&self) -> &str {
        "csv_writer"
    }

    fn handle(&mut self, record: Record) -> Result<Option<Record>> {
        let row = self.row(&record);
        match self.writer.as_mut() {
            Some(writer) => match writer.write_record(&row) {
                Ok(()) => self.written += 1,
                Err(e) => warn!(path = %self.path.display(), error = %e, "csv write failed"),
            },
            None => warn!(path = %self.path.display(), "csv writer is not open, record not written"),
        }
        Ok(Some(record))
    }

    fn lifecycle(&mut self) -> Option<&mut dyn Lifecycle> {
        Some(self)
    }
}

impl Lifecycle for CsvWriter {
    fn on_enter(&mut self) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.separator)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| csv_error("creating", &self.path, e))?;
        if let Some(headers) = &self.headers {
            writer
                .write_record(headers)
                .map_err(|e| csv_error("writing header to", &self.path, e))?;
        }
        self.writer = Some(writer);
        self.written = 0;
        info!(path = %self.path.display(), "csv writer opened");
        Ok(())
    }

    fn on_exit(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                warn!(path = %self.path.display(), error = %e, "csv flush failed");
            }
            info!(path = %self.path.display(), rows = self.written, "csv writer closed");
        }
    }
}

/// Writes one JSON object per line.
///
/// With `save_key`, the value at that field is written instead of the whole
/// record (records without it, or holding `null` there, are skipped). With `headers`, the written
/// object is projected onto those fields (absent ones become `null`). An
/// optional predicate selects which records are written.
#[derive(Debug)]
pub struct JsonWriter {
    path: PathBuf,
    headers: Vec<String>,
    save_key: Option<String>,
    gate: Match,
    out: Option<BufWriter<File>>,
    written: u64,
}

impl JsonWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            headers: Vec::new(),
            save_key: None,
            gate: Match::True,
            out: None,
            written: 0,
        }
    }

    pub fn with_headers(mut self, headers: Vec<String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_save_key(mut self, save_key: impl Into<String>) -> Self {
        self.save_key = Some(save_key.into());
        self
    }

    pub fn with_gate(mut self, gate: Match) -> Self {
        self.gate = gate;
        self
    }

    fn payload(&self, record: &Record) -> Option<Value> {
        let data = match &self.save_key {
            Some(key) => record.get(key)?,
            None => return Some(self.project(record)),
        };
        match data {
            Value::Object(nested) => Some(self.project(nested)),
            // A bare null line reads back as end of stream.
            Value::Null => None,
            other if self.headers.is_empty() => Some(other.clone()),
            _ => None,
        }
    }

    fn project(&self, data: &Record) -> Value {
        if self.headers.is_empty() {
            return Value::Object(data.clone());
        }
        Value::Object(
            self.headers
                .iter()
                .map(|h| (h.clone(), data.get(h).cloned().unwrap_or(Value::Null)))
                .collect(),
        )
    }
}

impl Handler for JsonWriter {
    fn name(&self) -> &str {
        "json_writer"
    }

    fn handle(&mut self, record: Record) -> Result<Option<Record>> {
        if !self.gate.matches(&record)? {
            return Ok(Some(record));
        }
        let Some(payload) = self.payload(&record) else {
            warn!(
                path = %self.path.display(),
                save_key = ?self.save_key,
                "record has no value to save, not written"
            );
            return Ok(Some(record));
        };
        let Some(out) = self.out.as_mut() else {
            warn!(path = %self.path.display(), "json writer is not open, record not written");
            return Ok(Some(record));
        };
        let written = serde_json::to_writer(&mut *out, &payload)
            .map_err(std::io::Error::from)
            .and_then(|()| out.write_all(b"\n"));
        match written {
            Ok(()) => self.written += 1,
            Err(e) => warn!(path = %self.path.display(), error = %e, "json write failed"),
        }
        Ok(Some(record))
    }

    fn lifecycle(&mut self) -> Option<&mut dyn Lifecycle> {
        Some(self)
    }
}

impl Lifecycle for JsonWriter {
    fn on_enter(&mut self) -> Result<()> {
        let file = File::create(&self.path).map_err(|e| io_error("creating", &self.path, e))?;
        self.out = Some(BufWriter::new(file));
        self.written = 0;
        info!(path = %self.path.display(), "json writer opened");
        Ok(())
    }

    fn on_exit(&mut self) {
        if let Some(mut out) = self.out.take() {
            if let Err(e) = out.flush() {
                warn!(path = %self.path.display(), error = %e, "json flush failed");
            }
            info!(path = %self.path.display(), rows = self.written, "json writer closed");
        }
    }
}
