//! Format-specific extractors. One per [`DocumentFormat`](crate::pipeline::types::DocumentFormat).

pub mod email;
pub mod json;
pub mod pdf;

pub use email::EmailExtractor;
pub use json::JsonExtractor;
pub use pdf::PdfExtractor;
