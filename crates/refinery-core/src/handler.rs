//! The handler contract and the optional lifecycle capability.

use std::fmt;

use crate::error::Result;
use crate::record::Record;

/// Setup/teardown hooks around a pipeline run.
///
/// `on_enter` runs for every handler, in list order, before the first
/// record; `on_exit` runs for every handler, in list order, after the last
/// one, whether or not the run failed. `on_exit` must tolerate being called
/// without a successful `on_enter`.
pub trait Lifecycle {
    fn on_enter(&mut self) -> Result<()>;

    fn on_exit(&mut self);
}

/// One unit of work over a record.
pub trait Handler: fmt::Debug {
    /// Registry tag of the variant, for logs.
    fn name(&self) -> &str;

    /// Transform the record. `Ok(None)` drops it: later handlers and the
    /// sink never see it.
    fn handle(&mut self, record: Record) -> Result<Option<Record>>;

    /// The lifecycle hooks, for handlers that hold resources.
    fn lifecycle(&mut self) -> Option<&mut dyn Lifecycle> {
        None
    }
}
