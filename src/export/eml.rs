//! MIME writer: [`DocumentNode`] tree → RFC 5322 bytes.
//!
//! Output uses CRLF line endings. Leaves that still carry their original
//! [`WireBody`](crate::model::node::WireBody) are written back exactly as
//! read, header block included. Containers keep their raw non-managed
//! header fields and get a rebuilt `Content-Type`. Every other leaf has its
//! headers rebuilt from the typed fields.

use std::path::Path;

use base64::Engine as _;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};

use crate::error::{Result, ShrinkError};
use crate::model::node::{Container, DocumentNode, Headers, Leaf};

const CRLF: &[u8] = b"\r\n";
/// Base64 line length (RFC 2045).
const BASE64_LINE: usize = 76;
/// Longest line a `7bit` body may carry (RFC 5322).
const MAX_7BIT_LINE: usize = 998;
/// RFC 2231 `attribute-char`: everything outside it is percent-encoded.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Serialize a document tree into a complete message.
pub fn serialize_document(root: &DocumentNode) -> Vec<u8> {
    let mut out = Vec::new();
    write_node(root, true, &mut out);
    out.extend_from_slice(CRLF);
    out
}

/// Serialize `root` and write it to `path`.
pub fn write_document(root: &DocumentNode, path: &Path) -> Result<()> {
    let bytes = serialize_document(root);
    std::fs::write(path, &bytes).map_err(|e| ShrinkError::io(path, e))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Wrote message");
    Ok(())
}

fn write_node(node: &DocumentNode, is_root: bool, out: &mut Vec<u8>) {
    match node {
        DocumentNode::Leaf(Leaf { wire: Some(wire), .. }) => {
            out.extend_from_slice(&wire.header);
            out.extend_from_slice(CRLF);
            out.extend_from_slice(&wire.raw);
        }
        DocumentNode::Leaf(leaf) => {
            write_headers(&leaf.headers, out);
            if is_root {
                out.extend_from_slice(b"MIME-Version: 1.0\r\n");
            }
            write_leaf(leaf, out);
        }
        DocumentNode::Container(container) => {
            match &container.wire_headers {
                Some(raw) => out.extend_from_slice(raw),
                None => write_headers(&container.headers, out),
            }
            if is_root {
                out.extend_from_slice(b"MIME-Version: 1.0\r\n");
            }
            write_container(container, out);
        }
    }
}

fn write_headers(headers: &Headers, out: &mut Vec<u8>) {
    for (name, value) in headers.iter() {
        header_line(out, name, value);
    }
}

fn header_line(out: &mut Vec<u8>, name: &str, value: &str) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(normalize_newlines(value.as_bytes()).as_slice());
    out.extend_from_slice(CRLF);
}

fn write_container(container: &Container, out: &mut Vec<u8>) {
    let children: Vec<Vec<u8>> = container
        .children
        .iter()
        .map(|child| {
            let mut buf = Vec::new();
            write_node(child, false, &mut buf);
            buf
        })
        .collect();

    let boundary = choose_boundary(container.boundary(), &children);

    let mut content_type = format!("multipart/{}", container.kind);
    content_type.push_str(&format_param("boundary", &boundary));
    content_type.push_str(&format_params(
        container
            .params
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case("boundary")),
    ));
    header_line(out, "Content-Type", &content_type);
    out.extend_from_slice(CRLF);

    for child in &children {
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        out.extend_from_slice(child);
        out.extend_from_slice(CRLF);
    }
    out.extend_from_slice(format!("--{boundary}--").as_bytes());
}

/// Reuse the original boundary when it is still safe, otherwise derive one
/// from the serialized children so identical trees produce identical output.
fn choose_boundary(original: Option<&str>, children: &[Vec<u8>]) -> String {
    if let Some(b) = original.filter(|b| !b.is_empty() && !collides(b, children)) {
        return b.to_string();
    }

    let mut hasher = Sha256::new();
    for child in children {
        hasher.update(child);
    }
    let digest = hasher.finalize();
    let hex: String = digest[..12].iter().map(|b| format!("{b:02x}")).collect();

    let mut candidate = format!("=_mailshrink_{hex}");
    let mut n = 0u32;
    while collides(&candidate, children) {
        n += 1;
        candidate = format!("=_mailshrink_{hex}_{n}");
    }
    candidate
}

fn collides(boundary: &str, children: &[Vec<u8>]) -> bool {
    let marker = format!("--{boundary}");
    children
        .iter()
        .any(|c| c.windows(marker.len()).any(|w| w == marker.as_bytes()))
}

/// Header block and body of a leaf without a wire form: one built in code,
/// or an image that was just re-encoded. Short-line ASCII text goes out as
/// `7bit`; anything else, re-encoded images included, as wrapped `base64`.
fn write_leaf(leaf: &Leaf, out: &mut Vec<u8>) {
    let content_type = format!("{}{}", leaf.content_type, format_params(leaf.params.iter()));
    header_line(out, "Content-Type", &content_type);

    if let Some(disposition) = &leaf.disposition {
        let mut value = disposition.as_str().to_string();
        if let Some(name) = &leaf.filename {
            value.push_str(&format_param("filename", name));
        }
        header_line(out, "Content-Disposition", &value);
    }
    if let Some(id) = &leaf.content_id {
        header_line(out, "Content-ID", &format!("<{id}>"));
    }

    if leaf.content_type.is_text() && is_7bit_safe(&leaf.payload) {
        header_line(out, "Content-Transfer-Encoding", "7bit");
        out.extend_from_slice(CRLF);
        let body = normalize_newlines(&leaf.payload);
        out.extend_from_slice(body.strip_suffix(CRLF).unwrap_or(&body));
    } else {
        header_line(out, "Content-Transfer-Encoding", "base64");
        out.extend_from_slice(CRLF);
        out.extend_from_slice(&encode_base64_lines(&leaf.payload));
    }
}

fn is_7bit_safe(payload: &[u8]) -> bool {
    payload.iter().all(|&b| b.is_ascii() && b != 0)
        && payload
            .split(|&b| b == b'\n')
            .all(|line| line.len() <= MAX_7BIT_LINE)
}

/// Base64 with CRLF every [`BASE64_LINE`] characters and no trailing break.
fn encode_base64_lines(payload: &[u8]) -> Vec<u8> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(payload);
    let mut out = Vec::with_capacity(encoded.len() + encoded.len() / BASE64_LINE * 2);
    for (i, line) in encoded.as_bytes().chunks(BASE64_LINE).enumerate() {
        if i > 0 {
            out.extend_from_slice(CRLF);
        }
        out.extend_from_slice(line);
    }
    out
}

/// Convert bare LF and bare CR line breaks to CRLF.
fn normalize_newlines(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                out.extend_from_slice(CRLF);
                i += 1;
            }
            b'\r' | b'\n' => out.extend_from_slice(CRLF),
            b => out.push(b),
        }
        i += 1;
    }
    out
}

fn format_params<'a>(params: impl Iterator<Item = &'a (String, String)>) -> String {
    params.map(|(k, v)| format_param(k, v)).collect()
}

/// `; name="value"`, or the RFC 2231 `; name*=utf-8''…` form for non-ASCII values.
fn format_param(name: &str, value: &str) -> String {
    if value.is_ascii() {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("; {name}=\"{escaped}\"")
    } else {
        format!("; {name}*=utf-8''{}", utf8_percent_encode(value, ATTR_CHAR))
    }
}
