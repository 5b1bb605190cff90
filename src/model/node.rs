//! The document tree: multipart containers and single-part leaves.
//!
//! A tree is built once per message by the reader ([`crate::parser::mime`]),
//! rebuilt by the rewriter ([`crate::rewrite`]) and consumed by the writer
//! ([`crate::export::eml`]). Nodes are plain owned values; nothing here is
//! shared across documents.

use std::fmt;

/// Headers whose values are derived from the tree structure or from typed
/// leaf fields. They never appear in [`Headers`]; the writer regenerates them.
pub const MANAGED_HEADERS: &[&str] = &[
    "content-type",
    "mime-version",
    "content-transfer-encoding",
    "content-disposition",
    "content-id",
];

/// Content-Type parameters (`charset`, `name`, `boundary`, …) in source order.
pub type Params = Vec<(String, String)>;

/// Look up a parameter by case-insensitive name.
pub fn param<'a>(params: &'a Params, name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// A `major/minor` media type, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MimeType {
    pub major: String,
    pub minor: String,
}

impl MimeType {
    pub fn new(major: &str, minor: &str) -> Self {
        Self {
            major: major.trim().to_ascii_lowercase(),
            minor: minor.trim().to_ascii_lowercase(),
        }
    }

    /// Parse `"image/jpeg"` (parameters after `;` are ignored).
    ///
    /// Returns `None` when there is no `/` or either half is empty.
    pub fn parse(s: &str) -> Option<Self> {
        let essence = s.split(';').next().unwrap_or("").trim();
        let (major, minor) = essence.split_once('/')?;
        if major.trim().is_empty() || minor.trim().is_empty() {
            return None;
        }
        Some(Self::new(major, minor))
    }

    pub fn is_image(&self) -> bool {
        self.major == "image"
    }

    pub fn is_text(&self) -> bool {
        self.major == "text"
    }
}

impl Default for MimeType {
    fn default() -> Self {
        Self::new("text", "plain")
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.major, self.minor)
    }
}

/// Declared presentation of a leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
    /// Anything else (e.g. `form-data`), kept verbatim.
    Other(String),
}

impl Disposition {
    pub fn parse(s: &str) -> Self {
        let value = s.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match value.as_str() {
            "inline" => Self::Inline,
            "attachment" => Self::Attachment,
            _ => Self::Other(value),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Propagated (non-managed) headers, in source order.
///
/// Duplicates are legal (`Received`, `Comments`) and order is preserved, so
/// this is a list rather than a map. Values are raw: folding and encoded
/// words are kept as they appeared on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if `name` is derived from structure and must not be propagated.
    pub fn is_managed(name: &str) -> bool {
        MANAGED_HEADERS
            .iter()
            .any(|managed| managed.eq_ignore_ascii_case(name.trim()))
    }

    /// Append a header. Managed headers are silently dropped.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if !Self::is_managed(&name) {
            self.0.push((name, value.into()));
        }
    }

    /// First value for `name` (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (k, v) in iter {
            headers.push(k, v);
        }
        headers
    }
}

/// A part exactly as it appeared on the wire: header block and body, before
/// any decoding.
///
/// Opaque to the rewriter: the writer emits it in place of the typed fields
/// so an untouched leaf comes back byte-for-byte. A leaf whose content
/// changes must drop it; rewritten leaves carry `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireBody {
    /// `base64`, `quoted-printable`, `7bit`, … (`None` when the header was absent).
    pub transfer_encoding: Option<String>,
    /// Every header field of the part, raw, each terminated by CRLF.
    pub header: Vec<u8>,
    /// Encoded body.
    pub raw: Vec<u8>,
}

/// A `multipart/*` node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// Multipart subtype: `mixed`, `related`, `alternative`, …
    pub kind: String,
    /// Content-Type parameters, including the original `boundary` if any.
    pub params: Params,
    pub headers: Headers,
    /// The non-managed header fields exactly as read, each terminated by
    /// CRLF. Written instead of `headers` when present.
    pub wire_headers: Option<Vec<u8>>,
    /// Children in document order. Order is significant.
    pub children: Vec<DocumentNode>,
}

impl Container {
    pub fn new(kind: &str, children: Vec<DocumentNode>) -> Self {
        Self {
            kind: kind.trim().to_ascii_lowercase(),
            params: Params::new(),
            headers: Headers::new(),
            wire_headers: None,
            children,
        }
    }

    pub fn content_type(&self) -> MimeType {
        MimeType::new("multipart", &self.kind)
    }

    pub fn boundary(&self) -> Option<&str> {
        param(&self.params, "boundary")
    }
}

/// A single, non-composite body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub content_type: MimeType,
    /// Content-Type parameters (`charset`, `name`, …).
    pub params: Params,
    pub disposition: Option<Disposition>,
    pub filename: Option<String>,
    /// Content-ID without angle brackets.
    pub content_id: Option<String>,
    pub headers: Headers,
    /// Decoded payload bytes.
    pub payload: Vec<u8>,
    pub wire: Option<WireBody>,
}

impl Leaf {
    pub fn new(content_type: MimeType, payload: Vec<u8>) -> Self {
        Self {
            content_type,
            params: Params::new(),
            disposition: None,
            filename: None,
            content_id: None,
            headers: Headers::new(),
            payload,
            wire: None,
        }
    }

    pub fn with_disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = Some(disposition);
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_content_id(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(name, value);
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        param(&self.params, name)
    }
}

/// A node of the document tree.
///
/// The variant set is closed: every consumer matches exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentNode {
    Container(Container),
    Leaf(Leaf),
}

impl DocumentNode {
    pub fn content_type(&self) -> MimeType {
        match self {
            Self::Container(c) => c.content_type(),
            Self::Leaf(l) => l.content_type.clone(),
        }
    }

    pub fn headers(&self) -> &Headers {
        match self {
            Self::Container(c) => &c.headers,
            Self::Leaf(l) => &l.headers,
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Self::Leaf(l) => Some(l),
            Self::Container(_) => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Self::Container(c) => Some(c),
            Self::Leaf(_) => None,
        }
    }

    /// All leaves in document order (depth-first).
    pub fn leaves(&self) -> Vec<&Leaf> {
        let mut out = Vec::new();
        collect_leaves(self, &mut out);
        out
    }
}

fn collect_leaves<'a>(node: &'a DocumentNode, out: &mut Vec<&'a Leaf>) {
    match node {
        DocumentNode::Leaf(l) => out.push(l),
        DocumentNode::Container(c) => {
            for child in &c.children {
                collect_leaves(child, out);
            }
        }
    }
}

impl From<Leaf> for DocumentNode {
    fn from(leaf: Leaf) -> Self {
        Self::Leaf(leaf)
    }
}

impl From<Container> for DocumentNode {
    fn from(container: Container) -> Self {
        Self::Container(container)
    }
}
