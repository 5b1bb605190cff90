//! Reading `.eml` files (RFC 5322 messages, optionally MBOX-framed).

use std::path::Path;

use crate::error::{Result, ShrinkError};
use crate::model::node::DocumentNode;
use crate::parser::mime;

/// Read and parse a single message file.
pub fn read_document(path: impl AsRef<Path>) -> Result<DocumentNode> {
    let path = path.as_ref();
    let data = read_message_bytes(path)?;
    tracing::debug!(path = %path.display(), bytes = data.len(), "Read message");
    mime::parse_document(&data)
}

/// Read raw message bytes, mapping a missing file to `FileNotFound`.
pub fn read_message_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ShrinkError::FileNotFound(path.to_path_buf())
        } else {
            ShrinkError::io(path, e)
        }
    })
}
