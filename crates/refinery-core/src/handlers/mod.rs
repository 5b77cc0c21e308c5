//! Built-in handlers.
//!
//! | Tag | Handler |
//! |---|---|
//! | `converter` | [`Converter`]: predicate-gated updater chain |
//! | `dict_converter` | [`DictConverter`]: static dictionary remap of one field |
//! | `keys_picker` | [`KeysPicker`]: first non-null of several fields |
//! | `filter` | [`Filter`]: drop matching records |
//! | `link` | [`LinkHandler`]: first-success branching with identity fallback |
//! | `string_cutter` | [`StringCutter`]: character slicing |
//! | `string_formatter` | [`StringFormatter`]: template into a field |

mod converter;
mod filter;
mod link;
mod remap;
mod strings;

use serde_json::Value;

use crate::error::ConfigError;
use crate::handler::Handler;
use crate::matches::Match;
use crate::registry::{Catalog, Registry};

pub use converter::Converter;
pub use filter::Filter;
pub use link::LinkHandler;
pub use remap::{DictConverter, KeysPicker};
pub use strings::{Cut, StringCutter, StringFormatter};

pub(crate) const KIND: &str = "handler";

/// Build an optional predicate; absent means always.
pub(crate) fn gate(cfg: Option<&Value>, catalog: &Catalog) -> Result<Match, ConfigError> {
    cfg.map_or(Ok(Match::True), |cfg| catalog.build_match(cfg))
}

pub(crate) fn register_builtins(registry: &mut Registry<Box<dyn Handler>>) {
    converter::register(registry);
    remap::register(registry);
    filter::register(registry);
    link::register(registry);
    strings::register(registry);
}
