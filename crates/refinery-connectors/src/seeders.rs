//! File producers.
//!
//! Opening or reading a source file fails the run; there is no retry.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use refinery_core::producer::RecordStream;
use refinery_core::{AdapterError, Producer, Record, Result};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{csv_error, io_error};

/// Reads delimited text. With explicit `keys` every row is data; without,
/// the first row names the columns. Rows whose column count differs from
/// the key count are skipped. All values are strings.
#[derive(Debug, Clone)]
pub struct CsvSeeder {
    path: PathBuf,
    separator: u8,
    keys: Option<Vec<String>>,
}

impl CsvSeeder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            separator: b',',
            keys: None,
        }
    }

    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.keys = Some(keys);
        self
    }
}

impl Producer for CsvSeeder {
    fn name(&self) -> &str {
        "csv"
    }

    fn records(&mut self) -> Result<RecordStream<'_>> {
        let path = self.path.as_path();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.separator)
            .has_headers(self.keys.is_none())
            .flexible(true)
            .from_path(path)
            .map_err(|e| csv_error("opening", path, e))?;
        let keys: Vec<String> = match &self.keys {
            Some(keys) => keys.clone(),
            None => reader
                .headers()
                .map_err(|e| csv_error("reading header of", path, e))?
                .iter()
                .map(str::to_string)
                .collect(),
        };
        info!(path = %path.display(), columns = keys.len(), "reading csv");

        Ok(Box::new(reader.into_records().filter_map(
            move |row| -> Option<Result<Option<Record>>> {
                let row = match row {
                    Ok(row) => row,
                    Err(e) => return Some(Err(csv_error("reading", path, e).into())),
                };
                if row.len() != keys.len() {
                    debug!(
                        line = row.position().map(|p| p.line()),
                        columns = row.len(),
                        expected = keys.len(),
                        "skipping csv row"
                    );
                    return None;
                }
                let record: Record = keys
                    .iter()
                    .cloned()
                    .zip(row.iter().map(|v| Value::String(v.to_string())))
                    .collect();
                Some(Ok(Some(record)))
            },
        )))
    }
}

/// Reads a JSON object of `id → record`. The id is stored under `key`
/// unless the record already has that field.
#[derive(Debug, Clone)]
pub struct JsonSeeder {
    path: PathBuf,
    key: String,
}

impl JsonSeeder {
    pub const DEFAULT_KEY: &'static str = "__KEY__";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key: Self::DEFAULT_KEY.to_string(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }
}

impl Producer for JsonSeeder {
    fn name(&self) -> &str {
        "json"
    }

    fn records(&mut self) -> Result<RecordStream<'_>> {
        let raw = fs::read_to_string(&self.path).map_err(|e| io_error("reading", &self.path, e))?;
        let entries: serde_json::Map<String, Value> = serde_json::from_str(&raw).map_err(|e| {
            AdapterError::parse(format!("parsing {}", self.path.display()), e)
        })?;
        info!(path = %self.path.display(), entries = entries.len(), "reading json");

        let key = self.key.as_str();
        let path = self.path.as_path();
        Ok(Box::new(entries.into_iter().map(
            move |(id, value)| -> Result<Option<Record>> {
                let Value::Object(mut record) = value else {
                    return Err(AdapterError::parse(
                        format!("parsing {}", path.display()),
                        format!("entry '{}' is not an object", id),
                    )
                    .into());
                };
                if !record.contains_key(key) {
                    record.insert(key.to_string(), Value::String(id));
                }
                Ok(Some(record))
            },
        )))
    }
}

/// Reads one JSON object per line. Blank lines are skipped; a `null` line
/// ends the stream.
#[derive(Debug, Clone)]
pub struct JsonLinesSeeder {
    path: PathBuf,
}

impl JsonLinesSeeder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Producer for JsonLinesSeeder {
    fn name(&self) -> &str {
        "json_lines"
    }

    fn records(&mut self) -> Result<RecordStream<'_>> {
        let path = self.path.as_path();
        let file = File::open(path).map_err(|e| io_error("opening", path, e))?;
        info!(path = %path.display(), "reading json lines");

        Ok(Box::new(BufReader::new(file).lines().enumerate().filter_map(
            move |(index, line)| -> Option<Result<Option<Record>>> {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => return Some(Err(io_error("reading", path, e).into())),
                };
                if line.trim().is_empty() {
                    return None;
                }
                let context = || format!("parsing {} line {}", path.display(), index + 1);
                Some(match serde_json::from_str::<Value>(&line) {
                    Ok(Value::Null) => Ok(None),
                    Ok(Value::Object(record)) => Ok(Some(record)),
                    Ok(other) => Err(AdapterError::parse(
                        context(),
                        format!("expected an object, got {}", other),
                    )
                    .into()),
                    Err(e) => Err(AdapterError::parse(context(), e).into()),
                })
            },
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn collect(producer: &mut dyn Producer) -> Vec<Option<Record>> {
        producer
            .records()
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
    }

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_csv_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "people.csv", "id,name\n1,Ada\n2,Grace,extra\n3,Alan\n");
        let items = collect(&mut CsvSeeder::new(path));
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0],
            Some(json!({"id": "1", "name": "Ada"}).as_object().cloned().unwrap())
        );
        assert_eq!(items[1].as_ref().unwrap()["name"], json!("Alan"));
    }

    #[test]
    fn test_csv_with_keys_and_separator() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "people.txt", "1;Ada\n2\n3;Alan\n");
        let mut seeder = CsvSeeder::new(path)
            .with_separator(b';')
            .with_keys(vec!["id".to_string(), "name".to_string()]);
        let items = collect(&mut seeder);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_ref().unwrap()["id"], json!("3"));
    }

    #[test]
    fn test_csv_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut seeder = CsvSeeder::new(dir.path().join("absent.csv"));
        assert!(seeder.records().is_err());
    }

    #[test]
    fn test_json_inserts_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "people.json",
            r#"{"a": {"name": "Ada"}, "b": {"name": "Bob", "id": "keep"}}"#,
        );
        let items = collect(&mut JsonSeeder::new(&path).with_key("id"));
        assert_eq!(items[0].as_ref().unwrap()["id"], json!("a"));
        assert_eq!(items[1].as_ref().unwrap()["id"], json!("keep"));

        let items = collect(&mut JsonSeeder::new(&path));
        assert_eq!(items[0].as_ref().unwrap()["__KEY__"], json!("a"));
    }

    #[test]
    fn test_json_rejects_non_object_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "bad.json", r#"{"a": 1}"#);
        let mut seeder = JsonSeeder::new(path);
        let first = seeder.records().unwrap().next().unwrap();
        assert!(first.is_err());
    }

    #[test]
    fn test_json_lines_sentinel_and_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "rows.jsonl", "{\"n\": 1}\n\n{\"n\": 2}\nnull\n{\"n\": 3}\n");
        let items = collect(&mut JsonLinesSeeder::new(path));
        assert_eq!(items.len(), 4);
        assert_eq!(items[1].as_ref().unwrap()["n"], json!(2));
        assert!(items[2].is_none());
        assert_eq!(items[3].as_ref().unwrap()["n"], json!(3));
    }

    #[test]
    fn test_json_lines_bad_line_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "rows.jsonl", "{\"n\": 1}\n[1, 2]\n");
        let mut seeder = JsonLinesSeeder::new(path);
        let results: Vec<_> = seeder.records().unwrap().collect();
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }
}
