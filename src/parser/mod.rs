//! Message reading: file access and MIME tree construction.

pub mod eml;
pub mod mime;

pub use eml::read_document;
pub use mime::parse_document;
