//! Refinery Core - declarative record-transformation engine
//!
//! Records flow from a [`Producer`] through an ordered chain of [`Handler`]s
//! that filter, match and rewrite them. Every component can be built from a
//! JSON description through the type-tag registries of a [`Catalog`].

pub mod error;
pub mod handler;
pub mod handlers;
pub mod keymatcher;
pub mod matches;
pub mod pattern;
pub mod pipeline;
pub mod producer;
pub mod record;
pub mod registry;
pub mod template;
pub mod updater;

pub use error::{AdapterError, ConfigError, FieldAccessError, PipelineError, Result};
pub use handler::{Handler, Lifecycle};
pub use keymatcher::KeyMatcher;
pub use matches::Match;
pub use pipeline::{Pipeline, PipelineState, RunSummary};
pub use producer::{InlineProducer, Producer, RecordStream};
pub use record::Record;
pub use registry::{Catalog, Registry};
pub use updater::{Update, Updater};
