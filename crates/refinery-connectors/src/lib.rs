//! Refinery Connectors - file producers and sinks
//!
//! Producers:
//! - `csv`: delimited text, header row or explicit keys
//! - `json`: a JSON object of `id → record`
//! - `json_lines`: one JSON object per line
//!
//! Sinks (handlers with lifecycle hooks):
//! - `csv_writer`
//! - `json_writer`

mod error;
pub mod seeders;
pub mod writers;

pub use seeders::{CsvSeeder, JsonLinesSeeder, JsonSeeder};
pub use writers::{CsvWriter, JsonWriter};

use refinery_core::registry::params;
use refinery_core::Catalog;
use serde::Deserialize;
use serde_json::Value;

fn default_separator() -> String {
    ",".to_string()
}

#[derive(Deserialize)]
struct CsvSeederParams {
    path: String,
    #[serde(default = "default_separator")]
    separator: String,
    #[serde(default)]
    keys: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct JsonSeederParams {
    path: String,
    #[serde(default)]
    key: Option<String>,
}

#[derive(Deserialize)]
struct PathParams {
    path: String,
}

#[derive(Deserialize)]
struct CsvWriterParams {
    path: String,
    #[serde(default = "default_separator")]
    separator: String,
    #[serde(default)]
    headers: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct JsonWriterParams {
    path: String,
    #[serde(default)]
    headers: Vec<String>,
    #[serde(default)]
    save_key: Option<String>,
    #[serde(default, rename = "match")]
    gate: Option<Value>,
}

/// Add the file producer and sink tags to `catalog`.
pub fn register_adapters(catalog: &mut Catalog) {
    catalog.producers.register("csv", |cfg, _| {
        let p: CsvSeederParams = params("producer", cfg)?;
        let mut seeder =
            CsvSeeder::new(p.path).with_separator(error::separator("producer", &p.separator)?);
        if let Some(keys) = p.keys {
            seeder = seeder.with_keys(keys);
        }
        Ok(Box::new(seeder))
    });
    catalog.producers.register("json", |cfg, _| {
        let p: JsonSeederParams = params("producer", cfg)?;
        let mut seeder = JsonSeeder::new(p.path);
        if let Some(key) = p.key {
            seeder = seeder.with_key(key);
        }
        Ok(Box::new(seeder))
    });
    catalog.producers.register("json_lines", |cfg, _| {
        let p: PathParams = params("producer", cfg)?;
        Ok(Box::new(JsonLinesSeeder::new(p.path)))
    });

    catalog.handlers.register("csv_writer", |cfg, _| {
        let p: CsvWriterParams = params("handler", cfg)?;
        let mut writer =
            CsvWriter::new(p.path).with_separator(error::separator("handler", &p.separator)?);
        if let Some(headers) = p.headers {
            writer = writer.with_headers(headers);
        }
        Ok(Box::new(writer))
    });
    catalog.handlers.register("json_writer", |cfg, catalog| {
        let p: JsonWriterParams = params("handler", cfg)?;
        let mut writer = JsonWriter::new(p.path).with_headers(p.headers);
        if let Some(save_key) = p.save_key {
            writer = writer.with_save_key(save_key);
        }
        if let Some(gate) = &p.gate {
            writer = writer.with_gate(catalog.build_match(gate)?);
        }
        Ok(Box::new(writer))
    });
}

/// The built-in catalog plus the file adapters.
pub fn full_catalog() -> Catalog {
    let mut catalog = Catalog::with_builtins();
    register_adapters(&mut catalog);
    catalog
}
