use std::borrow::Cow;
use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use super::{KeySource, Update, Updater, KIND};
use crate::error::{ConfigError, Result};
use crate::keymatcher::KeyMatcher;
use crate::record::{require, text, Record};
use crate::registry::{params, Registry};
use crate::template::Template;

const SRC: &str = "src";
const DST: &str = "dst";

/// Renders `{src}` (the value being updated, or `field`) and `{dst}` (the
/// auxiliary map's entry for the record's `key` value) into a template.
/// A miss in the auxiliary map is a no-update.
#[derive(Debug, Clone)]
pub struct CombineUpdater {
    matcher: KeyMatcher,
    template: Template,
    key: String,
    mapper: HashMap<String, Value>,
    field: Option<String>,
}

impl CombineUpdater {
    pub fn new(
        matcher: KeyMatcher,
        template: &str,
        key: impl Into<String>,
        mapper: HashMap<String, Value>,
        field: Option<String>,
    ) -> Result<Self, ConfigError> {
        let template = Template::parse(template)?;
        if let Some(other) = template.fields().find(|f| *f != SRC && *f != DST) {
            return Err(ConfigError::Template {
                template: template.source().to_string(),
                reason: format!("only {{src}} and {{dst}} are available, found {{{}}}", other),
            });
        }
        Ok(Self {
            matcher,
            template,
            key: key.into(),
            mapper,
            field,
        })
    }
}

impl Updater for CombineUpdater {
    fn name(&self) -> &str {
        "combine"
    }

    fn key_matcher(&self) -> &KeyMatcher {
        &self.matcher
    }

    fn derive(&self, record: &Record, field: &str, _literal: Option<&Value>) -> Result<Update> {
        let src = text(require(record, self.field.as_deref().unwrap_or(field))?);
        let aux = text(require(record, &self.key)?);
        let Some(dst) = self.mapper.get(aux.as_ref()) else {
            return Ok(Update::NoUpdate);
        };
        let dst = text(dst);
        let rendered = self.template.render(|name| match name {
            SRC => Some(Cow::Borrowed(src.as_ref())),
            DST => Some(Cow::Borrowed(dst.as_ref())),
            _ => None,
        })?;
        Ok(Update::Set(Value::String(rendered)))
    }
}

/// Renders a template over record fields.
#[derive(Debug, Clone)]
pub struct FormatUpdater {
    matcher: KeyMatcher,
    template: Template,
}

impl FormatUpdater {
    /// When `fields` is given, every placeholder must be one of them.
    pub fn new(
        matcher: KeyMatcher,
        template: &str,
        fields: Option<&[String]>,
    ) -> Result<Self, ConfigError> {
        let template = Template::parse(template)?;
        if let Some(fields) = fields {
            if let Some(unknown) = template.fields().find(|f| !fields.iter().any(|k| k == f)) {
                return Err(ConfigError::invalid(
                    KIND,
                    format!("placeholder '{}' is not listed in fields", unknown),
                ));
            }
        }
        Ok(Self { matcher, template })
    }
}

impl Updater for FormatUpdater {
    fn name(&self) -> &str {
        "format"
    }

    fn key_matcher(&self) -> &KeyMatcher {
        &self.matcher
    }

    fn derive(&self, record: &Record, _field: &str, _literal: Option<&Value>) -> Result<Update> {
        Ok(Update::Set(Value::String(
            self.template.render_record(record)?,
        )))
    }
}

#[derive(Deserialize)]
struct CombineParams {
    #[serde(flatten)]
    source: KeySource,
    format: String,
    key: String,
    mapper: HashMap<String, Value>,
    #[serde(default)]
    field: Option<String>,
}

#[derive(Deserialize)]
struct FormatParams {
    #[serde(flatten)]
    source: KeySource,
    #[serde(alias = "format")]
    pattern: String,
    #[serde(default)]
    fields: Option<Vec<String>>,
}

pub(super) fn register(registry: &mut Registry<Box<dyn Updater>>) {
    registry.register("combine", |cfg, catalog| {
        let p: CombineParams = params(KIND, cfg)?;
        let matcher = p.source.into_matcher(catalog, None)?;
        Ok(Box::new(CombineUpdater::new(
            matcher, &p.format, p.key, p.mapper, p.field,
        )?))
    });
    registry.register("format", |cfg, catalog| {
        let p: FormatParams = params(KIND, cfg)?;
        let matcher = p.source.into_matcher(catalog, None)?;
        Ok(Box::new(FormatUpdater::new(
            matcher,
            &p.pattern,
            p.fields.as_deref(),
        )?))
    });
}
