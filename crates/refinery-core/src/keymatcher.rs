//! Resolution of which record fields an updater touches.

use std::borrow::Cow;

use regex::Regex;
use serde::Deserialize;
use serde_json::map;
use serde_json::Value;

use crate::error::{ConfigError, FieldAccessError};
use crate::pattern::{self, RegexFlags};
use crate::record::Record;
use crate::registry::{params, Registry};
use crate::template::Template;

/// Selects the fields an updater applies to, per record.
#[derive(Debug, Clone)]
pub enum KeyMatcher {
    /// Every listed name, present in the record or not.
    List(Vec<String>),
    /// Every existing field whose name matches (anchored at the start).
    Regex(Regex),
    /// One name rendered from record fields.
    Format(Template),
    /// Fixed field → value pairs; the value travels with the field name.
    Literal(Record),
}

/// One resolved field plus its per-field payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedKey<'a> {
    pub field: Cow<'a, str>,
    /// Set only by [`KeyMatcher::Literal`].
    pub literal: Option<&'a Value>,
}

impl<'a> ResolvedKey<'a> {
    fn name(field: &'a str) -> Self {
        Self {
            field: Cow::Borrowed(field),
            literal: None,
        }
    }
}

/// Lazy sequence of resolved fields for one record.
pub struct ResolvedKeys<'a> {
    inner: Inner<'a>,
}

enum Inner<'a> {
    List(std::slice::Iter<'a, String>),
    Regex {
        pattern: &'a Regex,
        keys: map::Keys<'a>,
    },
    Once(Option<String>),
    Literal(map::Iter<'a>),
}

impl<'a> Iterator for ResolvedKeys<'a> {
    type Item = ResolvedKey<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            Inner::List(names) => names.next().map(|n| ResolvedKey::name(n)),
            Inner::Regex { pattern, keys } => keys
                .find(|k| pattern.is_match(k))
                .map(|k| ResolvedKey::name(k)),
            Inner::Once(name) => name.take().map(|n| ResolvedKey {
                field: Cow::Owned(n),
                literal: None,
            }),
            Inner::Literal(entries) => entries.next().map(|(k, v)| ResolvedKey {
                field: Cow::Borrowed(k.as_str()),
                literal: Some(v),
            }),
        }
    }
}

impl KeyMatcher {
    pub fn list<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        KeyMatcher::List(names.into_iter().map(Into::into).collect())
    }

    pub fn regex(pattern: &str, flags: RegexFlags) -> Result<Self, ConfigError> {
        Ok(KeyMatcher::Regex(pattern::compile(pattern, flags, true)?))
    }

    /// Format matcher. When `keys` is given, every placeholder must be one
    /// of them.
    pub fn format(template: &str, keys: Option<&[String]>) -> Result<Self, ConfigError> {
        let template = Template::parse(template)?;
        if let Some(keys) = keys {
            if let Some(unknown) = template.fields().find(|f| !keys.iter().any(|k| k == f)) {
                return Err(ConfigError::invalid(
                    KIND,
                    format!("placeholder '{}' is not listed in keys", unknown),
                ));
            }
        }
        Ok(KeyMatcher::Format(template))
    }

    /// Resolve against one record. Only the format variant can fail, when a
    /// referenced field is absent.
    pub fn resolve<'a>(&'a self, record: &'a Record) -> Result<ResolvedKeys<'a>, FieldAccessError> {
        let inner = match self {
            KeyMatcher::List(names) => Inner::List(names.iter()),
            KeyMatcher::Regex(pattern) => Inner::Regex {
                pattern,
                keys: record.keys(),
            },
            KeyMatcher::Format(template) => Inner::Once(Some(template.render_record(record)?)),
            KeyMatcher::Literal(values) => Inner::Literal(values.iter()),
        };
        Ok(ResolvedKeys { inner })
    }
}

#[derive(Deserialize)]
struct ListParams {
    keys: Vec<String>,
}

#[derive(Deserialize)]
struct RegexParams {
    regex: String,
    #[serde(default)]
    flag: RegexFlags,
}

#[derive(Deserialize)]
struct FormatParams {
    format: String,
    keys: Option<Vec<String>>,
}

const KIND: &str = "key matcher";

pub(crate) fn register_builtins(registry: &mut Registry<KeyMatcher>) {
    registry.register("list", |cfg, _| {
        let p: ListParams = params(KIND, cfg)?;
        Ok(KeyMatcher::List(p.keys))
    });
    registry.register("regex", |cfg, _| {
        let p: RegexParams = params(KIND, cfg)?;
        KeyMatcher::regex(&p.regex, p.flag)
    });
    registry.register("format", |cfg, _| {
        let p: FormatParams = params(KIND, cfg)?;
        KeyMatcher::format(&p.format, p.keys.as_deref())
    });
}
