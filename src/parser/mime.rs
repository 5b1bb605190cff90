//! MIME reader: raw RFC 5322 bytes → [`DocumentNode`] tree.
//!
//! Uses `mail-parser` for the heavy lifting (structure, transfer decoding,
//! RFC 2231 parameters) and keeps the raw header fields and body of every
//! part so that untouched parts can be written back byte-for-byte.

use mail_parser::{Header, MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::debug;

use crate::error::{Result, ShrinkError};
use crate::model::node::{Container, Disposition, DocumentNode, Headers, Leaf, MimeType, Params, WireBody};

/// Parse a complete raw message into a document tree.
///
/// A leading BOM and an MBOX `From ` separator line are skipped.
/// `message/rfc822` parts are kept as opaque leaves.
pub fn parse_document(raw_message: &[u8]) -> Result<DocumentNode> {
    let message_bytes = skip_from_line(raw_message);
    if message_bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ShrinkError::InvalidMessage("Empty message".into()));
    }

    let message = MessageParser::default()
        .parse(message_bytes)
        .ok_or_else(|| ShrinkError::InvalidMessage("mail-parser rejected the message".into()))?;

    let reader = TreeReader {
        raw: message_bytes,
        parts: &message.parts,
    };
    reader.node(0, 0)
}

struct TreeReader<'a, 'x> {
    raw: &'a [u8],
    parts: &'a [MessagePart<'x>],
}

impl TreeReader<'_, '_> {
    fn node(&self, id: usize, depth: usize) -> Result<DocumentNode> {
        // The parser flattens the tree into an id-indexed list; a cycle or a
        // dangling id means the part table is corrupt.
        if depth > crate::rewrite::MAX_DEPTH {
            return Err(ShrinkError::Structural(format!(
                "Nesting deeper than {} levels",
                crate::rewrite::MAX_DEPTH
            )));
        }
        let part = self
            .parts
            .get(id)
            .ok_or_else(|| ShrinkError::Structural(format!("Unknown part id {id}")))?;

        match &part.body {
            PartType::Multipart(children) => {
                let kind = part
                    .content_type()
                    .and_then(|ct| ct.subtype())
                    .unwrap_or("mixed");
                debug!(id, depth, kind, children = children.len(), "Multipart part");

                let children = children
                    .iter()
                    .map(|child| self.node(*child as usize, depth + 1))
                    .collect::<Result<Vec<_>>>()?;

                let mut container = Container::new(kind, children);
                container.params = content_type_params(part);
                container.headers = self.headers(part);
                container.wire_headers = Some(self.raw_fields(part, |name| !Headers::is_managed(name)));
                Ok(container.into())
            }
            _ => Ok(self.leaf(part).into()),
        }
    }

    fn leaf(&self, part: &MessagePart<'_>) -> Leaf {
        let content_type = part
            .content_type()
            .and_then(|ct| {
                let minor = ct.subtype()?;
                Some(MimeType::new(ct.ctype(), minor))
            })
            .unwrap_or_else(|| default_content_type(&part.body));

        let body = self.slice(part.offset_body as usize, part.offset_end as usize);
        let payload = match &part.body {
            // Nested messages are carried verbatim; they are never descended into.
            PartType::Message(_) => body.to_vec(),
            _ => part.contents().to_vec(),
        };

        Leaf {
            content_type,
            params: content_type_params(part),
            disposition: part
                .content_disposition()
                .map(|d| Disposition::parse(d.ctype())),
            filename: part.attachment_name().map(str::to_string),
            content_id: part
                .content_id()
                .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>').to_string())
                .filter(|id| !id.is_empty()),
            headers: self.headers(part),
            payload,
            wire: Some(WireBody {
                transfer_encoding: part.content_transfer_encoding().map(str::to_ascii_lowercase),
                header: self.raw_fields(part, |_| true),
                raw: strip_trailing_newline(body).to_vec(),
            }),
        }
    }

    /// Raw, non-managed header fields of a part, in source order.
    fn headers(&self, part: &MessagePart<'_>) -> Headers {
        let mut headers = Headers::new();
        for header in &part.headers {
            let name = header.name.as_str();
            if Headers::is_managed(name) {
                continue;
            }
            let value = decode_header_bytes(self.slice(header.offset_start as usize, header.offset_end as usize));
            headers.push(name, value.trim());
        }
        headers
    }

    /// The selected header fields of a part, byte-for-byte, each ending in CRLF.
    fn raw_fields(&self, part: &MessagePart<'_>, keep: impl Fn(&str) -> bool) -> Vec<u8> {
        let mut out = Vec::new();
        for header in part.headers.iter().filter(|h| keep(h.name.as_str())) {
            out.extend_from_slice(self.raw_field(header));
            out.extend_from_slice(b"\r\n");
        }
        out
    }

    /// `Name: value` of one field, folds included, without its line break.
    fn raw_field(&self, header: &Header<'_>) -> &[u8] {
        let field = self.slice(header.offset_field as usize, header.offset_end as usize);
        let end = field
            .iter()
            .rposition(|&b| b != b'\r' && b != b'\n')
            .map_or(0, |i| i + 1);
        &field[..end]
    }

    fn slice(&self, start: usize, end: usize) -> &[u8] {
        let end = end.min(self.raw.len());
        self.raw.get(start.min(end)..end).unwrap_or_default()
    }
}

fn content_type_params(part: &MessagePart<'_>) -> Params {
    part.content_type()
        .and_then(|ct| ct.attributes())
        .map(|attrs| {
            attrs
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

/// Content type of a part that carried no (or an incomplete) Content-Type header.
fn default_content_type(body: &PartType<'_>) -> MimeType {
    match body {
        PartType::Text(_) => MimeType::new("text", "plain"),
        PartType::Html(_) => MimeType::new("text", "html"),
        PartType::Message(_) => MimeType::new("message", "rfc822"),
        _ => MimeType::new("application", "octet-stream"),
    }
}

/// The line break before a boundary delimiter belongs to the delimiter.
fn strip_trailing_newline(body: &[u8]) -> &[u8] {
    body.strip_suffix(b"\r\n")
        .or_else(|| body.strip_suffix(b"\n"))
        .unwrap_or(body)
}

/// Decode header bytes, trying UTF-8 first, then Windows-1252.
fn decode_header_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Skip a leading BOM and the `From ` separator line of MBOX-framed messages.
pub(crate) fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}
