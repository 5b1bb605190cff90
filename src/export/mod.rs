//! Message writing.

pub mod eml;

pub use eml::{serialize_document, write_document};
