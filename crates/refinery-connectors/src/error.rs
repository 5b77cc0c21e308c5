//! Mapping of file and format errors onto the engine's adapter errors.

use std::path::Path;

use refinery_core::{AdapterError, ConfigError};

pub(crate) fn io_error(action: &str, path: &Path, source: std::io::Error) -> AdapterError {
    AdapterError::io(format!("{} {}", action, path.display()), source)
}

pub(crate) fn csv_error(action: &str, path: &Path, err: csv::Error) -> AdapterError {
    let context = format!("{} {}", action, path.display());
    if !err.is_io_error() {
        return AdapterError::parse(context, err);
    }
    match err.into_kind() {
        csv::ErrorKind::Io(source) => AdapterError::io(context, source),
        other => AdapterError::parse(context, format!("{:?}", other)),
    }
}

/// A CSV separator must be a single ASCII character.
pub(crate) fn separator(kind: &'static str, value: &str) -> Result<u8, ConfigError> {
    match value.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(ConfigError::invalid(
            kind,
            format!("separator must be a single ASCII character, got {:?}", value),
        )),
    }
}
