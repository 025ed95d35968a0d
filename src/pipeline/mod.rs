//! Document processing pipeline.
//!
//! Every submitted document goes through three stages:
//! 1. `Classifier::classify()` — format and business intent
//! 2. One extractor per format — `EmailExtractor`, `JsonExtractor`, `PdfExtractor`
//! 3. `ActionRouter::route()` — follow-up action plus downstream dispatch
//!
//! `DocumentProcessor` drives a run and records each stage in the run log.

pub mod classifier;
pub mod extractors;
pub mod processor;
pub mod router;
pub mod schema;
pub mod types;

pub use processor::DocumentProcessor;
