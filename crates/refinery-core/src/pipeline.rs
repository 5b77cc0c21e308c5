//! Pipeline executor: folds records through an ordered handler chain.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ConfigError, Result};
use crate::handler::Handler;
use crate::producer::Producer;
use crate::record::Record;
use crate::registry::{params, Catalog};

/// Where a pipeline is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Created,
    /// Lifecycle setup hooks have run.
    Entered,
    /// Records are being folded.
    Running,
    /// Teardown hooks have run. A new run may start from here.
    Exited,
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub read: u64,
    pub emitted: u64,
    pub dropped: u64,
}

/// An ordered handler chain, optionally with its own producer.
///
/// Handlers run in insertion order. A handler returning `None` ends the
/// fold for that record only.
#[derive(Debug)]
pub struct Pipeline {
    handlers: Vec<Box<dyn Handler>>,
    producer: Option<Box<dyn Producer>>,
    state: PipelineState,
}

#[derive(Deserialize)]
struct PipelineConfig {
    #[serde(default, alias = "producer")]
    seeder: Option<Value>,
    #[serde(default)]
    handlers: Vec<Value>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            producer: None,
            state: PipelineState::Created,
        }
    }

    pub fn with_producer(producer: Box<dyn Producer>) -> Self {
        Self {
            producer: Some(producer),
            ..Self::new()
        }
    }

    /// Build from `{"seeder": {...}, "handlers": [...]}`.
    pub fn from_config(cfg: &Value, catalog: &Catalog) -> Result<Self, ConfigError> {
        let config: PipelineConfig = params("pipeline", cfg)?;
        let mut pipeline = Self::new();
        pipeline.producer = config
            .seeder
            .as_ref()
            .map(|seeder| catalog.build_producer(seeder))
            .transpose()?;
        for handler in &config.handlers {
            pipeline.push(catalog.build_handler(handler)?);
        }
        Ok(pipeline)
    }

    pub fn add<H: Handler + 'static>(&mut self, handler: H) -> &mut Self {
        self.push(Box::new(handler))
    }

    pub fn push(&mut self, handler: Box<dyn Handler>) -> &mut Self {
        self.handlers.push(handler);
        self
    }

    pub fn handlers(&self) -> impl Iterator<Item = &dyn Handler> {
        self.handlers.iter().map(|h| h.as_ref())
    }

    pub fn producer(&self) -> Option<&dyn Producer> {
        self.producer.as_deref()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Fold one record through the chain.
    ///
    /// Errors abort the rest of the chain for this record; mutations made by
    /// earlier handlers are not rolled back.
    pub fn handle(&mut self, record: Record) -> Result<Option<Record>> {
        let mut current = record;
        for handler in &mut self.handlers {
            match handler.handle(current)? {
                Some(next) => current = next,
                None => {
                    debug!(handler = handler.name(), "record dropped");
                    return Ok(None);
                }
            }
        }
        Ok(Some(current))
    }

    /// Run every handler's setup hook in order. Stops at the first failure.
    pub fn enter(&mut self) -> Result<()> {
        for handler in &mut self.handlers {
            if let Some(hooks) = handler.lifecycle() {
                hooks.on_enter()?;
            }
        }
        self.state = PipelineState::Entered;
        info!(handlers = self.handlers.len(), "pipeline entered");
        Ok(())
    }

    /// Run every handler's teardown hook in order.
    pub fn exit(&mut self) {
        for handler in &mut self.handlers {
            if let Some(hooks) = handler.lifecycle() {
                hooks.on_exit();
            }
        }
        self.state = PipelineState::Exited;
        info!("pipeline exited");
    }

    /// Drive the configured producer to the end of its stream.
    pub fn run(&mut self) -> Result<RunSummary> {
        self.run_into(|_| {})
    }

    /// Like [`Pipeline::run`], handing every surviving record to `emit`.
    ///
    /// A pipeline built without a seeder can only be driven through
    /// [`Pipeline::run_with`]; here it fails before any hook runs.
    pub fn run_into<F>(&mut self, emit: F) -> Result<RunSummary>
    where
        F: FnMut(Record),
    {
        let mut producer = self
            .producer
            .take()
            .ok_or_else(|| ConfigError::missing("pipeline", "seeder"))?;
        let outcome = self.run_with(producer.as_mut(), emit);
        self.producer = Some(producer);
        outcome
    }

    /// Drive `producer`, handing every surviving record to `emit`.
    ///
    /// Teardown hooks run whether the run succeeds or fails, including when
    /// a setup hook fails.
    pub fn run_with<F>(&mut self, producer: &mut dyn Producer, emit: F) -> Result<RunSummary>
    where
        F: FnMut(Record),
    {
        if let Err(e) = self.enter() {
            self.exit();
            return Err(e);
        }
        let outcome = self.fold(producer, emit);
        self.exit();
        let summary = outcome?;
        info!(
            producer = producer.name(),
            read = summary.read,
            emitted = summary.emitted,
            dropped = summary.dropped,
            "pipeline run finished"
        );
        Ok(summary)
    }

    fn fold<F>(&mut self, producer: &mut dyn Producer, mut emit: F) -> Result<RunSummary>
    where
        F: FnMut(Record),
    {
        self.state = PipelineState::Running;
        let mut summary = RunSummary::default();
        for item in producer.records()? {
            let Some(record) = item? else {
                debug!("producer signalled end of stream");
                break;
            };
            summary.read += 1;
            match self.handle(record)? {
                Some(record) => {
                    summary.emitted += 1;
                    emit(record);
                }
                None => summary.dropped += 1,
            }
        }
        Ok(summary)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::handler::Lifecycle;
    use crate::handlers::{Converter, Filter};
    use crate::matches::Match;
    use crate::producer::InlineProducer;
    use crate::updater::StaticUpdater;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[derive(Debug)]
    struct Probe {
        id: &'static str,
        log: Rc<RefCell<Vec<String>>>,
        fail_enter: bool,
        fail_handle: bool,
    }

    impl Probe {
        fn new(id: &'static str, log: &Rc<RefCell<Vec<String>>>) -> Self {
            Self {
                id,
                log: log.clone(),
                fail_enter: false,
                fail_handle: false,
            }
        }
    }

    impl Handler for Probe {
        fn name(&self) -> &str {
            self.id
        }

        fn handle(&mut self, record: Record) -> Result<Option<Record>> {
            self.log.borrow_mut().push(format!("handle {}", self.id));
            if self.fail_handle {
                return Err(PipelineError::Unsupported("probe".to_string()));
            }
            Ok(Some(record))
        }

        fn lifecycle(&mut self) -> Option<&mut dyn Lifecycle> {
            Some(self)
        }
    }

    impl Lifecycle for Probe {
        fn on_enter(&mut self) -> Result<()> {
            self.log.borrow_mut().push(format!("enter {}", self.id));
            if self.fail_enter {
                return Err(PipelineError::Unsupported("probe".to_string()));
            }
            Ok(())
        }

        fn on_exit(&mut self) {
            self.log.borrow_mut().push(format!("exit {}", self.id));
        }
    }

    #[test]
    fn test_handlers_run_in_insertion_order() {
        let mut pipeline = Pipeline::new();
        pipeline
            .add(Converter::always(vec![Box::new(StaticUpdater::literal(record(
                json!({"step": 1}),
            )))]))
            .add(Converter::always(vec![Box::new(StaticUpdater::literal(record(
                json!({"step": 2}),
            )))]));
        let out = pipeline.handle(record(json!({}))).unwrap().unwrap();
        assert_eq!(out["step"], json!(2));
    }

    #[test]
    fn test_drop_short_circuits() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline
            .add(Probe::new("a", &log))
            .add(Filter::new(Match::True))
            .add(Probe::new("b", &log));
        assert_eq!(pipeline.handle(record(json!({"x": 1}))).unwrap(), None);
        assert_eq!(*log.borrow(), vec!["handle a"]);
    }

    #[test]
    fn test_lifecycle_order_and_states() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline
            .add(Probe::new("a", &log))
            .add(Filter::new(Match::key("x", 2)))
            .add(Probe::new("b", &log));
        assert_eq!(pipeline.state(), PipelineState::Created);

        let mut producer: InlineProducer =
            vec![record(json!({"x": 1})), record(json!({"x": 2}))].into_iter().collect();
        let mut out = Vec::new();
        let summary = pipeline.run_with(&mut producer, |r| out.push(r)).unwrap();

        assert_eq!(
            summary,
            RunSummary {
                read: 2,
                emitted: 1,
                dropped: 1
            }
        );
        assert_eq!(out, vec![record(json!({"x": 1}))]);
        assert_eq!(
            *log.borrow(),
            vec!["enter a", "enter b", "handle a", "handle b", "handle a", "exit a", "exit b"]
        );
        assert_eq!(pipeline.state(), PipelineState::Exited);
    }

    #[test]
    fn test_exit_runs_after_handler_error() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut failing = Probe::new("a", &log);
        failing.fail_handle = true;
        let mut pipeline = Pipeline::new();
        pipeline.add(failing).add(Probe::new("b", &log));

        let mut producer: InlineProducer = vec![record(json!({}))].into_iter().collect();
        let err = pipeline.run_with(&mut producer, |_| {}).unwrap_err();
        assert!(matches!(err, PipelineError::Unsupported(_)));
        assert_eq!(
            *log.borrow(),
            vec!["enter a", "enter b", "handle a", "exit a", "exit b"]
        );
        assert_eq!(pipeline.state(), PipelineState::Exited);
    }

    #[test]
    fn test_exit_runs_after_enter_error() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut failing = Probe::new("b", &log);
        failing.fail_enter = true;
        let mut pipeline = Pipeline::new();
        pipeline
            .add(Probe::new("a", &log))
            .add(failing)
            .add(Probe::new("c", &log));

        let mut producer = InlineProducer::default();
        assert!(pipeline.run_with(&mut producer, |_| {}).is_err());
        assert_eq!(
            *log.borrow(),
            vec!["enter a", "enter b", "exit a", "exit b", "exit c"]
        );
    }

    #[test]
    fn test_none_sentinel_stops_the_run() {
        let mut pipeline = Pipeline::new();
        let mut producer = InlineProducer::new(vec![
            Some(record(json!({"n": 1}))),
            None,
            Some(record(json!({"n": 2}))),
        ]);
        let mut out = Vec::new();
        let summary = pipeline.run_with(&mut producer, |r| out.push(r)).unwrap();
        assert_eq!(summary.read, 1);
        assert_eq!(out, vec![record(json!({"n": 1}))]);
    }

    #[test]
    fn test_run_requires_a_producer() {
        let err = Pipeline::new().run().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Config(ConfigError::MissingField { ref field, .. }) if field == "seeder"
        ));
    }

    #[test]
    fn test_from_config() {
        let catalog = Catalog::with_builtins();
        let mut pipeline = Pipeline::from_config(
            &json!({
                "seeder": {"type": "inline", "records": [{"a": 1}, {"a": 2}]},
                "handlers": [
                    {"type": "filter", "matcher": {"type": "key", "key": "a", "value": 2}},
                    {"type": "converter", "updater": {"type": "static", "values": {"b": true}}}
                ]
            }),
            &catalog,
        )
        .unwrap();
        let names: Vec<&str> = pipeline.handlers().map(|h| h.name()).collect();
        assert_eq!(names, vec!["filter", "converter"]);
        assert_eq!(pipeline.producer().map(|p| p.name()), Some("inline"));

        let summary = pipeline.run().unwrap();
        assert_eq!(
            summary,
            RunSummary {
                read: 2,
                emitted: 1,
                dropped: 1
            }
        );
    }

    #[test]
    fn test_from_config_rejects_bad_handler() {
        let err = Pipeline::from_config(
            &json!({"handlers": [{"type": "converter"}, {"class": "nope"}]}),
            &Catalog::with_builtins(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { .. }));
    }
}
