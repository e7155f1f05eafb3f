pub mod output;

pub use output::{create_writer, AnalyticsWriter, JsonWriter, OutputFormat, TerminalWriter};
