//! Regex compilation shared by predicates, key matchers and updaters.

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::error::ConfigError;

/// Regex flags as they appear in configs.
///
/// Accepts either an integer bit set (2 = ignore case, 8 = multi-line,
/// 16 = dot matches newline, 64 = verbose; 4 and 32 are accepted and
/// ignored) or a string of letters drawn from `imsx`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "FlagSpec")]
pub struct RegexFlags {
    pub ignore_case: bool,
    pub multi_line: bool,
    pub dot_all: bool,
    pub verbose: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagSpec {
    Bits(u32),
    Letters(String),
}

const IGNORE_CASE: u32 = 2;
const LOCALE: u32 = 4;
const MULTI_LINE: u32 = 8;
const DOT_ALL: u32 = 16;
const UNICODE: u32 = 32;
const VERBOSE: u32 = 64;

impl TryFrom<FlagSpec> for RegexFlags {
    type Error = String;

    fn try_from(spec: FlagSpec) -> Result<Self, Self::Error> {
        match spec {
            FlagSpec::Bits(bits) => {
                let known = IGNORE_CASE | LOCALE | MULTI_LINE | DOT_ALL | UNICODE | VERBOSE;
                if bits & !known != 0 {
                    return Err(format!("unsupported regex flag bits {:#x}", bits & !known));
                }
                Ok(RegexFlags {
                    ignore_case: bits & IGNORE_CASE != 0,
                    multi_line: bits & MULTI_LINE != 0,
                    dot_all: bits & DOT_ALL != 0,
                    verbose: bits & VERBOSE != 0,
                })
            }
            FlagSpec::Letters(letters) => {
                let mut flags = RegexFlags::default();
                for c in letters.chars() {
                    match c {
                        'i' => flags.ignore_case = true,
                        'm' => flags.multi_line = true,
                        's' => flags.dot_all = true,
                        'x' => flags.verbose = true,
                        other => return Err(format!("unsupported regex flag '{}'", other)),
                    }
                }
                Ok(flags)
            }
        }
    }
}

/// Compile `pattern`. With `anchored` the pattern must match at the start of
/// the haystack (but may end anywhere), whatever the multi-line flag says.
pub fn compile(pattern: &str, flags: RegexFlags, anchored: bool) -> Result<Regex, ConfigError> {
    let source = if anchored && flags.verbose {
        // a trailing comment in verbose mode must not swallow the group close
        format!("\\A(?:{}\n)", pattern)
    } else if anchored {
        format!(r"\A(?:{})", pattern)
    } else {
        pattern.to_string()
    };
    RegexBuilder::new(&source)
        .case_insensitive(flags.ignore_case)
        .multi_line(flags.multi_line)
        .dot_matches_new_line(flags.dot_all)
        .ignore_whitespace(flags.verbose)
        .build()
        .map_err(|source| ConfigError::Regex {
            pattern: pattern.to_string(),
            source,
        })
}

/// Translate a backslash-style substitution template (`\1`, `\g<name>`,
/// `\n`, `\\`) into the `$`-style syntax `Regex::replace_all` expects.
/// A literal `$` is escaped.
pub fn replacement(template: &str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.next() {
                Some(d) if d.is_ascii_digit() => {
                    let mut group = String::from(d);
                    if let Some(&e) = chars.peek() {
                        if e.is_ascii_digit() {
                            group.push(e);
                            chars.next();
                        }
                    }
                    out.push_str(&format!("${{{}}}", group));
                }
                Some('g') => {
                    if chars.next() != Some('<') {
                        return Err(bad_replacement(template, "expected '<' after \\g"));
                    }
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('>') => break,
                            Some(n) => name.push(n),
                            None => return Err(bad_replacement(template, "unterminated \\g<")),
                        }
                    }
                    if name.is_empty() {
                        return Err(bad_replacement(template, "empty group name"));
                    }
                    out.push_str(&format!("${{{}}}", name));
                }
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    Ok(out)
}

fn bad_replacement(template: &str, reason: &str) -> ConfigError {
    ConfigError::Template {
        template: template.to_string(),
        reason: reason.to_string(),
    }
}
