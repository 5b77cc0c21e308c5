use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::KIND;
use crate::error::{ConfigError, Result};
use crate::handler::{Handler, Lifecycle};
use crate::record::Record;
use crate::registry::{params, Registry};

/// First-success branching over a list of alternative handlers.
///
/// Every child gets its own copy of the input record. The first output that
/// satisfies the target rule is returned; when none does (or a child drops
/// the record), the next child is tried, and the untouched input is
/// returned after the last one.
///
/// The target rule maps dotted paths (`"address.country"`) to expected
/// values. A path matches when every segment exists, no step is `null`, and
/// the final value is strictly equal to the expected one.
#[derive(Debug)]
pub struct LinkHandler {
    target: Record,
    handlers: Vec<Box<dyn Handler>>,
}

impl LinkHandler {
    pub fn new(target: Record, handlers: Vec<Box<dyn Handler>>) -> Self {
        Self { target, handlers }
    }
}

fn lookup_path<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = record.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn satisfies(target: &Record, record: &Record) -> bool {
    target.iter().all(|(path, expected)| match lookup_path(record, path) {
        None | Some(Value::Null) => false,
        Some(actual) => actual == expected,
    })
}

impl Handler for LinkHandler {
    fn name(&self) -> &str {
        "link"
    }

    fn handle(&mut self, record: Record) -> Result<Option<Record>> {
        let Self { target, handlers } = self;
        for (index, handler) in handlers.iter_mut().enumerate() {
            match handler.handle(record.clone())? {
                Some(candidate) if satisfies(target, &candidate) => {
                    debug!(branch = index, handler = handler.name(), "link branch selected");
                    return Ok(Some(candidate));
                }
                _ => {}
            }
        }
        debug!("no link branch satisfied the target, keeping the input");
        Ok(Some(record))
    }

    fn lifecycle(&mut self) -> Option<&mut dyn Lifecycle> {
        Some(self)
    }
}

impl Lifecycle for LinkHandler {
    fn on_enter(&mut self) -> Result<()> {
        for handler in &mut self.handlers {
            if let Some(hooks) = handler.lifecycle() {
                hooks.on_enter()?;
            }
        }
        Ok(())
    }

    fn on_exit(&mut self) {
        for handler in &mut self.handlers {
            if let Some(hooks) = handler.lifecycle() {
                hooks.on_exit();
            }
        }
    }
}

#[derive(Deserialize)]
struct LinkParams {
    #[serde(rename = "match")]
    target: Record,
    handlers: Vec<Value>,
}

pub(super) fn register(registry: &mut Registry<Box<dyn Handler>>) {
    registry.register("link", |cfg, catalog| {
        let p: LinkParams = params(KIND, cfg)?;
        let handlers = p
            .handlers
            .iter()
            .map(|h| catalog.build_handler(h))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Box::new(LinkHandler::new(p.target, handlers)))
    });
}
