//! Type-tag registries: build components from declarative configuration.
//!
//! Every component config is a JSON object carrying a `"type"` (or legacy
//! `"class"`) discriminator. A [`Registry`] maps each discriminator to a
//! constructor; a [`Catalog`] bundles one registry per component kind so
//! that composite components (boolean predicates, converters, link
//! handlers) can build their children through the same tables.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::ConfigError;
use crate::handler::Handler;
use crate::keymatcher::KeyMatcher;
use crate::matches::Match;
use crate::producer::Producer;
use crate::updater::Updater;

/// Constructor for one variant of a component kind.
pub type Constructor<T> = Box<dyn Fn(&Value, &Catalog) -> Result<T, ConfigError> + Send + Sync>;

/// Discriminator → constructor table for one component kind.
pub struct Registry<T> {
    kind: &'static str,
    constructors: HashMap<String, Constructor<T>>,
}

impl<T> Registry<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            constructors: HashMap::new(),
        }
    }

    /// Human-readable component kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Register a constructor under `tag`. A later registration of the same
    /// tag replaces the earlier one.
    pub fn register<F>(&mut self, tag: &str, constructor: F)
    where
        F: Fn(&Value, &Catalog) -> Result<T, ConfigError> + Send + Sync + 'static,
    {
        self.constructors
            .insert(tag.to_string(), Box::new(constructor));
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Registered tags in sorted order.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Build a component from its config.
    pub fn build(&self, cfg: &Value, catalog: &Catalog) -> Result<T, ConfigError> {
        let tag = discriminator(self.kind, cfg)?;
        let constructor = self
            .constructors
            .get(tag)
            .ok_or_else(|| ConfigError::UnknownType {
                kind: self.kind,
                tag: tag.to_string(),
            })?;
        debug!(kind = self.kind, tag, "building component");
        constructor(cfg, catalog)
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("tags", &self.tags())
            .finish()
    }
}

/// Read the discriminator of a component config.
pub fn discriminator<'a>(kind: &'static str, cfg: &'a Value) -> Result<&'a str, ConfigError> {
    let object = cfg
        .as_object()
        .ok_or_else(|| ConfigError::invalid(kind, "expected a JSON object"))?;
    object
        .get("type")
        .or_else(|| object.get("class"))
        .and_then(Value::as_str)
        .ok_or(ConfigError::MissingType { kind })
}

/// Deserialize the variant-specific parameters of a component config.
///
/// A missing required parameter becomes [`ConfigError::MissingField`]; any
/// other shape problem becomes [`ConfigError::Invalid`].
pub fn params<T: DeserializeOwned>(kind: &'static str, cfg: &Value) -> Result<T, ConfigError> {
    T::deserialize(cfg).map_err(|e| {
        let message = e.to_string();
        match missing_field_name(&message) {
            Some(field) => ConfigError::missing(kind, field),
            None => ConfigError::invalid(kind, message),
        }
    })
}

fn missing_field_name(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("missing field `")?;
    rest.split('`').next()
}

/// One registry per component kind.
#[derive(Debug)]
pub struct Catalog {
    pub matches: Registry<Match>,
    pub key_matchers: Registry<KeyMatcher>,
    pub updaters: Registry<Box<dyn Updater>>,
    pub handlers: Registry<Box<dyn Handler>>,
    pub producers: Registry<Box<dyn Producer>>,
}

impl Catalog {
    /// A catalog with no registered variants.
    pub fn empty() -> Self {
        Self {
            matches: Registry::new("match"),
            key_matchers: Registry::new("key matcher"),
            updaters: Registry::new("updater"),
            handlers: Registry::new("handler"),
            producers: Registry::new("producer"),
        }
    }

    /// A catalog with every variant this crate provides.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::empty();
        crate::matches::register_builtins(&mut catalog.matches);
        crate::keymatcher::register_builtins(&mut catalog.key_matchers);
        crate::updater::register_builtins(&mut catalog.updaters);
        crate::handlers::register_builtins(&mut catalog.handlers);
        crate::producer::register_builtins(&mut catalog.producers);
        catalog
    }

    pub fn build_match(&self, cfg: &Value) -> Result<Match, ConfigError> {
        self.matches.build(cfg, self)
    }

    pub fn build_key_matcher(&self, cfg: &Value) -> Result<KeyMatcher, ConfigError> {
        self.key_matchers.build(cfg, self)
    }

    pub fn build_updater(&self, cfg: &Value) -> Result<Box<dyn Updater>, ConfigError> {
        self.updaters.build(cfg, self)
    }

    pub fn build_handler(&self, cfg: &Value) -> Result<Box<dyn Handler>, ConfigError> {
        self.handlers.build(cfg, self)
    }

    pub fn build_producer(&self, cfg: &Value) -> Result<Box<dyn Producer>, ConfigError> {
        self.producers.build(cfg, self)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::with_builtins()
    }
}
