use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::{KeySource, Update, Updater, KIND};
use crate::error::{ConfigError, FieldAccessError, Result};
use crate::keymatcher::KeyMatcher;
use crate::pattern::{self, RegexFlags};
use crate::record::Record;
use crate::registry::{params, Registry};

/// Regex substitution. The value is read from `field` when set, otherwise
/// from the field being updated; every match is replaced.
#[derive(Debug, Clone)]
pub struct RegexUpdater {
    matcher: KeyMatcher,
    pattern: Regex,
    replace: String,
    field: Option<String>,
}

impl RegexUpdater {
    /// `replace` uses backslash group references (`\1`, `\g<name>`).
    pub fn new(
        matcher: KeyMatcher,
        pattern: &str,
        flags: RegexFlags,
        replace: &str,
        field: Option<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            matcher,
            pattern: pattern::compile(pattern, flags, false)?,
            replace: pattern::replacement(replace)?,
            field,
        })
    }

    /// Rewrite `field` in place with `pattern` → `replace`.
    pub fn on_field(field: &str, pattern: &str, replace: &str) -> Result<Self, ConfigError> {
        Self::new(
            KeyMatcher::list([field]),
            pattern,
            RegexFlags::default(),
            replace,
            Some(field.to_string()),
        )
    }
}

impl Updater for RegexUpdater {
    fn name(&self) -> &str {
        "regex"
    }

    fn key_matcher(&self) -> &KeyMatcher {
        &self.matcher
    }

    fn derive(&self, record: &Record, field: &str, _literal: Option<&Value>) -> Result<Update> {
        let source = self.field.as_deref().unwrap_or(field);
        match record.get(source) {
            None | Some(Value::Null) => Ok(Update::NoUpdate),
            Some(Value::String(text)) => Ok(Update::Set(Value::String(
                self.pattern
                    .replace_all(text, self.replace.as_str())
                    .into_owned(),
            ))),
            Some(_) => Err(FieldAccessError::NotAString(source.to_string()).into()),
        }
    }
}

#[derive(Deserialize)]
struct RegexParams {
    #[serde(flatten)]
    source: KeySource,
    pattern: String,
    #[serde(default)]
    replace: String,
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    flag: RegexFlags,
}

pub(super) fn register(registry: &mut Registry<Box<dyn Updater>>) {
    registry.register("regex", |cfg, catalog| {
        let p: RegexParams = params(KIND, cfg)?;
        let fallback = p.field.clone().map(|f| vec![f]);
        let matcher = p.source.into_matcher(catalog, fallback)?;
        Ok(Box::new(RegexUpdater::new(
            matcher,
            &p.pattern,
            p.flag,
            &p.replace,
            p.field,
        )?))
    });
}
