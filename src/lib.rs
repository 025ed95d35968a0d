//! Chained Actions — classify inbound documents, extract structured fields,
//! and route each one to a follow-up action.
//!
//! A run takes one document (email, JSON webhook, or PDF) through three
//! stages, each backed by the inference gateway:
//! - **Classifier** — format and business intent
//! - **Extractor** — format-specific fields (the JSON extractor validates locally)
//! - **Action Router** — picks an action and hands off to the dispatcher
//!
//! Every stage is recorded in an append-only run log that outlives individual runs.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod llm;
pub mod pipeline;
pub mod runlog;

pub use config::AppConfig;
pub use error::{Error, Result};
