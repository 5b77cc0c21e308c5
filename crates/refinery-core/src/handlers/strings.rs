use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use super::KIND;
use crate::error::{ConfigError, FieldAccessError, Result};
use crate::handler::Handler;
use crate::record::{require, text, Record};
use crate::registry::{params, Registry};
use crate::template::Template;

/// Character range of a cut. Negative positions count from the end, out of
/// range positions are clamped, an empty range yields `""`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Cut {
    #[serde(default)]
    pub start: i64,
    pub end: i64,
}

impl Cut {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    fn clamp(position: i64, len: i64) -> usize {
        let absolute = if position < 0 { len + position } else { position };
        absolute.clamp(0, len) as usize
    }

    pub fn apply(&self, source: &str) -> String {
        let len = source.chars().count() as i64;
        let start = Self::clamp(self.start, len);
        let end = Self::clamp(self.end, len);
        if end <= start {
            return String::new();
        }
        source.chars().skip(start).take(end - start).collect()
    }
}

/// Cuts string fields to a character range. `null` and `""` are kept as
/// they are; an absent field is an error.
#[derive(Debug, Clone)]
pub struct StringCutter {
    keys: BTreeMap<String, Cut>,
}

impl StringCutter {
    pub fn new(keys: BTreeMap<String, Cut>) -> Self {
        Self { keys }
    }
}

impl Handler for StringCutter {
    fn name(&self) -> &str {
        "string_cutter"
    }

    fn handle(&mut self, mut record: Record) -> Result<Option<Record>> {
        for (field, cut) in &self.keys {
            let shortened = match require(&record, field)? {
                Value::Null => continue,
                Value::String(s) if s.is_empty() => continue,
                Value::String(s) => cut.apply(s),
                _ => return Err(FieldAccessError::NotAString(field.clone()).into()),
            };
            record.insert(field.clone(), Value::String(shortened));
        }
        Ok(Some(record))
    }
}

/// Renders a template over `keys` into `dst`. Absent or `null` fields render
/// as empty strings.
#[derive(Debug, Clone)]
pub struct StringFormatter {
    keys: Vec<String>,
    dst: String,
    template: Template,
}

impl StringFormatter {
    /// Every placeholder must be one of `keys`.
    pub fn new(keys: Vec<String>, dst: impl Into<String>, template: &str) -> Result<Self, ConfigError> {
        let template = Template::parse(template)?;
        if let Some(unknown) = template.fields().find(|f| !keys.iter().any(|k| k == f)) {
            return Err(ConfigError::Template {
                template: template.source().to_string(),
                reason: format!("placeholder {{{}}} is not listed in keys", unknown),
            });
        }
        Ok(Self {
            keys,
            dst: dst.into(),
            template,
        })
    }
}

impl Handler for StringFormatter {
    fn name(&self) -> &str {
        "string_formatter"
    }

    fn handle(&mut self, mut record: Record) -> Result<Option<Record>> {
        let keys = &self.keys;
        let rendered = self.template.render(|name| {
            if !keys.iter().any(|k| k == name) {
                return None;
            }
            match record.get(name) {
                None | Some(Value::Null) => Some(Cow::Borrowed("")),
                Some(value) => Some(text(value)),
            }
        })?;
        record.insert(self.dst.clone(), Value::String(rendered));
        Ok(Some(record))
    }
}

#[derive(Deserialize)]
struct CutterParams {
    keys: BTreeMap<String, Cut>,
}

#[derive(Deserialize)]
struct FormatterParams {
    keys: Vec<String>,
    dst: String,
    format: String,
}

pub(super) fn register(registry: &mut Registry<Box<dyn Handler>>) {
    registry.register("string_cutter", |cfg, _| {
        let p: CutterParams = params(KIND, cfg)?;
        Ok(Box::new(StringCutter::new(p.keys)))
    });
    registry.register("string_formatter", |cfg, _| {
        let p: FormatterParams = params(KIND, cfg)?;
        Ok(Box::new(StringFormatter::new(p.keys, p.dst, &p.format)?))
    });
}
