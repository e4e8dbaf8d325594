//! CLI command implementations

mod config;
mod list;
mod record;
mod status;
mod stop;

pub use config::{config, ConfigArgs};
pub use list::list_sources;
pub use record::{record, RecordArgs};
pub use status::status;
pub use stop::{begin, cancel, stop, BeginArgs};
