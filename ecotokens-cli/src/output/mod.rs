//! Output formatting for CLI.

mod csv;
mod json;
mod text;

pub use self::csv::export_csv;
pub use json::{AccountOutput, EventOutput, JsonFormatter, RecordOutput, StatsOutput, SyncOutput};
pub use text::TextFormatter;
