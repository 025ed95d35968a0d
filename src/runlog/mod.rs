//! Run log: the append-only record of every stage of every run.

pub mod model;
pub mod store;

pub use model::{AgentName, LogCommand, LogEntry, LogEvent, PROCESSING_PLACEHOLDER};
pub use store::RunLog;
