//! Refinery CLI - run declarative record pipelines

mod config;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use refinery_connectors::full_catalog;
use refinery_core::{Catalog, ConfigError, Pipeline};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "refinery")]
#[command(about = "Declarative record-transformation pipelines")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline description to the end of its seeder
    Run {
        /// Path to the pipeline JSON file
        pipeline: PathBuf,

        /// Print surviving records to stdout, one JSON object per line
        #[arg(short, long)]
        emit: bool,
    },

    /// Build a pipeline without running it
    Validate {
        /// Path to the pipeline JSON file
        pipeline: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(settings.env_filter(cli.verbose))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let catalog = full_catalog();
    match cli.command {
        Commands::Run { pipeline, emit } => run_pipeline(&catalog, &pipeline, emit),
        Commands::Validate { pipeline } => validate_pipeline(&catalog, &pipeline),
    }
}

fn read_description(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Pipeline file {} is not valid JSON", path.display()))
}

/// Build a pipeline, listing the known tags when a discriminator is unknown.
fn build_pipeline(catalog: &Catalog, path: &Path) -> Result<Pipeline> {
    let description = read_description(path)?;
    Pipeline::from_config(&description, catalog).map_err(|e| {
        let hint = match &e {
            ConfigError::UnknownType { kind: "handler", .. } => {
                Some(catalog.handlers.tags().join(", "))
            }
            ConfigError::UnknownType { kind: "producer", .. } => {
                Some(catalog.producers.tags().join(", "))
            }
            ConfigError::UnknownType { kind: "match", .. } => Some(catalog.matches.tags().join(", ")),
            ConfigError::UnknownType { kind: "updater", .. } => {
                Some(catalog.updaters.tags().join(", "))
            }
            ConfigError::UnknownType { kind: "key matcher", .. } => {
                Some(catalog.key_matchers.tags().join(", "))
            }
            _ => None,
        };
        let err = anyhow::Error::new(e)
            .context(format!("Invalid pipeline description {}", path.display()));
        match hint {
            Some(tags) => err.context(format!("known types: {}", tags)),
            None => err,
        }
    })
}

/// Build a pipeline that can run on its own, so it must carry a seeder.
fn build_runnable(catalog: &Catalog, path: &Path) -> Result<Pipeline> {
    let pipeline = build_pipeline(catalog, path)?;
    if pipeline.producer().is_none() {
        return Err(anyhow::Error::new(ConfigError::missing("pipeline", "seeder")))
            .with_context(|| format!("Invalid pipeline description {}", path.display()));
    }
    Ok(pipeline)
}

fn run_pipeline(catalog: &Catalog, path: &Path, emit: bool) -> Result<()> {
    info!("Loading pipeline from {:?}", path);
    let mut pipeline = build_runnable(catalog, path)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut write_error = None;
    let summary = pipeline
        .run_into(|record| {
            if !emit || write_error.is_some() {
                return;
            }
            if let Err(e) = writeln!(out, "{}", Value::Object(record)) {
                write_error = Some(e);
            }
        })
        .context("Pipeline run failed")?;
    if let Some(e) = write_error {
        return Err(e).context("Failed to write records to stdout");
    }

    eprintln!(
        "read {} records: {} emitted, {} dropped",
        summary.read, summary.emitted, summary.dropped
    );
    Ok(())
}

fn validate_pipeline(catalog: &Catalog, path: &Path) -> Result<()> {
    let pipeline = build_pipeline(catalog, path)?;
    println!("Pipeline {} is valid", path.display());
    match pipeline.producer() {
        Some(producer) => println!("  seeder: {}", producer.name()),
        None => println!("  seeder: (none)"),
    }
    for (index, handler) in pipeline.handlers().enumerate() {
        println!("  {}. {}", index + 1, handler.name());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_pipeline(dir: &tempfile::TempDir, description: &Value) -> PathBuf {
        let path = dir.path().join("pipeline.json");
        fs::write(&path, serde_json::to_string_pretty(description).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_build_pipeline_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pipeline(
            &dir,
            &serde_json::json!({
                "seeder": {"type": "inline", "records": [{"a": 1}]},
                "handlers": [{"type": "json_writer", "path": dir.path().join("out.jsonl")}]
            }),
        );
        let pipeline = build_pipeline(&full_catalog(), &path).unwrap();
        let names: Vec<&str> = pipeline.handlers().map(|h| h.name()).collect();
        assert_eq!(names, vec!["json_writer"]);
    }

    #[test]
    fn test_unknown_type_lists_known_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pipeline(&dir, &serde_json::json!({"handlers": [{"type": "teleport"}]}));
        let err = build_pipeline(&full_catalog(), &path).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("known types:"), "{}", message);
        assert!(message.contains("csv_writer"), "{}", message);
        assert!(message.contains("unknown handler type 'teleport'"), "{}", message);
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(&path, "{not json").unwrap();
        let err = build_pipeline(&full_catalog(), &path).unwrap_err();
        assert!(err.to_string().contains("is not valid JSON"));
    }

    #[test]
    fn test_run_rejects_pipeline_without_seeder() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.jsonl");
        let path = write_pipeline(
            &dir,
            &serde_json::json!({"handlers": [{"type": "json_writer", "path": out}]}),
        );
        assert!(build_pipeline(&full_catalog(), &path).is_ok());

        let err = build_runnable(&full_catalog(), &path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingField { field, .. }) if field == "seeder"
        ));
        assert!(run_pipeline(&full_catalog(), &path, false).is_err());
        assert!(!out.exists());
    }

    #[test]
    fn test_run_pipeline_writes_sink() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.jsonl");
        let path = write_pipeline(
            &dir,
            &serde_json::json!({
                "seeder": {"type": "inline", "records": [{"n": 1}, {"n": 2}]},
                "handlers": [
                    {"type": "filter", "match": {"type": "key", "key": "n", "value": 1}},
                    {"type": "json_writer", "path": out}
                ]
            }),
        );
        run_pipeline(&full_catalog(), &path, false).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "{\"n\":2}\n");
    }
}
