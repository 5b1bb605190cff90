//! Core data model: the document tree handed between reader, rewriter and writer.

pub mod node;

pub use node::{Container, Disposition, DocumentNode, Headers, Leaf, MimeType, Params, WireBody};
