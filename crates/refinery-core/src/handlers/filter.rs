use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::KIND;
use crate::error::Result;
use crate::handler::Handler;
use crate::matches::Match;
use crate::record::Record;
use crate::registry::{params, Registry};

/// Drops every record its predicate matches.
#[derive(Debug, Clone)]
pub struct Filter {
    matcher: Match,
}

impl Filter {
    pub fn new(matcher: Match) -> Self {
        Self { matcher }
    }
}

impl Handler for Filter {
    fn name(&self) -> &str {
        "filter"
    }

    fn handle(&mut self, record: Record) -> Result<Option<Record>> {
        if self.matcher.matches(&record)? {
            debug!(matcher = ?self.matcher, "record filtered out");
            return Ok(None);
        }
        Ok(Some(record))
    }
}

#[derive(Deserialize)]
struct FilterParams {
    #[serde(alias = "match")]
    matcher: Value,
}

pub(super) fn register(registry: &mut Registry<Box<dyn Handler>>) {
    registry.register("filter", |cfg, catalog| {
        let p: FilterParams = params(KIND, cfg)?;
        Ok(Box::new(Filter::new(catalog.build_match(&p.matcher)?)))
    });
}
