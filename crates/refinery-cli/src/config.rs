//! CLI settings from environment variables.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// `EnvFilter` directives from `REFINERY_LOG`, e.g. `refinery_core=debug`.
    pub log_filter: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let log_filter = std::env::var("REFINERY_LOG")
            .ok()
            .filter(|v| !v.trim().is_empty());
        if let Some(directives) = &log_filter {
            EnvFilter::try_new(directives).context("Invalid REFINERY_LOG")?;
        }
        Ok(Self { log_filter })
    }

    /// `--verbose` wins over `REFINERY_LOG`; the default level is info.
    pub fn env_filter(&self, verbose: bool) -> EnvFilter {
        if verbose {
            return EnvFilter::new("debug");
        }
        match &self.log_filter {
            Some(directives) => EnvFilter::new(directives),
            None => EnvFilter::new("info"),
        }
    }
}
