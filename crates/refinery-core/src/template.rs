//! `{name}` placeholder templates.

use std::borrow::Cow;

use crate::error::{ConfigError, FieldAccessError};
use crate::record::{text, Record};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A parsed template. `{{` and `}}` are literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let fail = |reason: &str| ConfigError::Template {
            template: source.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') => return Err(fail("nested '{' in placeholder")),
                            Some(':') | Some('!') => {
                                return Err(fail("format specs and conversions are not supported"))
                            }
                            Some(n) => name.push(n),
                            None => return Err(fail("unterminated placeholder")),
                        }
                    }
                    if name.is_empty() {
                        return Err(fail("empty placeholder"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(name));
                }
                '}' => return Err(fail("single '}' outside a placeholder")),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of appearance (duplicates included).
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Render with an arbitrary lookup; an unresolved placeholder is a
    /// missing field.
    pub fn render<'a, F>(&self, mut lookup: F) -> Result<String, FieldAccessError>
    where
        F: FnMut(&str) -> Option<Cow<'a, str>>,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => out.push_str(literal),
                Segment::Field(name) => {
                    let value =
                        lookup(name).ok_or_else(|| FieldAccessError::Missing(name.clone()))?;
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }

    /// Render placeholders straight from record fields.
    pub fn render_record(&self, record: &Record) -> Result<String, FieldAccessError> {
        self.render(|name| record.get(name).map(text))
    }
}
