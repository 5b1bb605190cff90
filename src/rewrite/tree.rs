//! Recursive tree rewriting.
//!
//! Every call consumes a node and returns its replacement. Containers are
//! rebuilt with the same kind, params, headers and child order; leaves are
//! either passed through untouched or swapped for a re-encoded image.
//! Per-image failures never escape: the original leaf is kept and the
//! failure is recorded in the [`RewriteReport`].

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::classifier::{is_eligible, EligibilityPolicy};
use crate::config::TransformConfig;
use crate::error::{Result, ShrinkError};
use crate::imaging::{Dimensions, ImageCodec, ImageEngine, OutputFormat, RustCodec, TransformedImage};
use crate::model::node::{Container, Disposition, DocumentNode, Leaf, MimeType};

/// Maximum container nesting accepted before the tree is considered malformed.
pub const MAX_DEPTH: usize = 64;

/// A rewritten image, for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageOutcome {
    pub filename: String,
    pub original: Dimensions,
    pub output: Dimensions,
    pub size_before: u64,
    pub size_after: u64,
}

/// An eligible image that was left as-is because it could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeafFailure {
    pub filename: String,
    pub error: String,
}

/// What one rewrite did. Sibling reports are merged bottom-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewriteReport {
    /// Leaves visited.
    pub leaves: usize,
    /// Leaves the classifier accepted.
    pub eligible: usize,
    pub images: Vec<ImageOutcome>,
    pub failures: Vec<LeafFailure>,
}

impl RewriteReport {
    pub fn merge(&mut self, other: RewriteReport) {
        self.leaves += other.leaves;
        self.eligible += other.eligible;
        self.images.extend(other.images);
        self.failures.extend(other.failures);
    }

    pub fn transformed(&self) -> usize {
        self.images.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn bytes_before(&self) -> u64 {
        self.images.iter().map(|i| i.size_before).sum()
    }

    pub fn bytes_after(&self) -> u64 {
        self.images.iter().map(|i| i.size_after).sum()
    }

    /// `"N of M eligible images could not be processed"`, when N > 0.
    pub fn failure_note(&self) -> Option<String> {
        (self.failed() > 0).then(|| {
            format!(
                "{} of {} eligible images could not be processed",
                self.failed(),
                self.eligible
            )
        })
    }
}

/// A rewritten tree and its report.
#[derive(Debug, Clone)]
pub struct Rewritten {
    pub root: DocumentNode,
    pub report: RewriteReport,
}

/// Walks a document tree and replaces eligible images.
pub struct Rewriter<C: ImageCodec = RustCodec> {
    engine: ImageEngine<C>,
    policy: EligibilityPolicy,
    parallel: bool,
}

impl Rewriter<RustCodec> {
    pub fn new(config: &TransformConfig) -> Result<Self> {
        Self::with_codec(RustCodec::new(), config)
    }
}

impl<C: ImageCodec> Rewriter<C> {
    pub fn with_codec(codec: C, config: &TransformConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine: ImageEngine::with_codec(codec, config.clone()),
            policy: EligibilityPolicy::from(config),
            parallel: config.parallel,
        })
    }

    pub fn engine(&self) -> &ImageEngine<C> {
        &self.engine
    }

    /// Rewrite a whole document.
    ///
    /// Only structural problems fail the call; image failures are reported.
    pub fn rewrite(&self, root: DocumentNode) -> Result<Rewritten> {
        let (root, report) = self.rewrite_node(root, 0)?;
        Ok(Rewritten { root, report })
    }

    fn rewrite_node(&self, node: DocumentNode, depth: usize) -> Result<(DocumentNode, RewriteReport)> {
        if depth > MAX_DEPTH {
            return Err(ShrinkError::Structural(format!(
                "Nesting deeper than {MAX_DEPTH} levels"
            )));
        }
        match node {
            DocumentNode::Container(container) => self.rewrite_container(container, depth),
            DocumentNode::Leaf(leaf) => self.rewrite_leaf(leaf, depth),
        }
    }

    fn rewrite_container(
        &self,
        container: Container,
        depth: usize,
    ) -> Result<(DocumentNode, RewriteReport)> {
        let Container {
            kind,
            params,
            headers,
            wire_headers,
            children,
        } = container;

        if kind.is_empty() {
            return Err(ShrinkError::Structural(
                "Multipart container without a subtype".into(),
            ));
        }
        debug!(depth, kind = %kind, children = children.len(), "Container");

        let results: Vec<(DocumentNode, RewriteReport)> = if self.parallel {
            children
                .into_par_iter()
                .map(|child| self.rewrite_node(child, depth + 1))
                .collect::<Result<_>>()?
        } else {
            children
                .into_iter()
                .map(|child| self.rewrite_node(child, depth + 1))
                .collect::<Result<_>>()?
        };

        let mut report = RewriteReport::default();
        let mut rebuilt = Vec::with_capacity(results.len());
        for (child, child_report) in results {
            report.merge(child_report);
            rebuilt.push(child);
        }

        let node = DocumentNode::Container(Container {
            kind,
            params,
            headers,
            wire_headers,
            children: rebuilt,
        });
        Ok((node, report))
    }

    fn rewrite_leaf(&self, leaf: Leaf, depth: usize) -> Result<(DocumentNode, RewriteReport)> {
        let mut report = RewriteReport {
            leaves: 1,
            ..RewriteReport::default()
        };
        debug!(
            depth,
            content_type = %leaf.content_type,
            disposition = ?leaf.disposition,
            filename = ?leaf.filename,
            "Leaf"
        );

        if !is_eligible(&leaf, &self.policy) {
            return Ok((DocumentNode::Leaf(leaf), report));
        }
        report.eligible = 1;
        let filename = leaf.filename.clone().unwrap_or_default();

        match self.engine.transform(&leaf.payload) {
            Ok(image) => {
                info!(
                    filename = %filename,
                    from = %image.original,
                    to = %image.dimensions(),
                    size_before = image.original_size,
                    size_after = image.bytes.len(),
                    "Rewrote image"
                );
                report.images.push(ImageOutcome {
                    filename,
                    original: image.original,
                    output: image.dimensions(),
                    size_before: image.original_size as u64,
                    size_after: image.bytes.len() as u64,
                });
                let format = self.engine.config().output_format;
                Ok((DocumentNode::Leaf(replace_leaf(leaf, image, format)), report))
            }
            Err(e) if e.is_recoverable() => {
                warn!(filename = %filename, error = %e, "Leaving image unchanged");
                report.failures.push(LeafFailure {
                    filename,
                    error: e.to_string(),
                });
                Ok((DocumentNode::Leaf(leaf), report))
            }
            Err(e) => Err(e),
        }
    }
}

/// Build the replacement for an eligible leaf.
///
/// Attachments stay attachments; everything else becomes `inline`. Filename,
/// Content-ID and propagated headers carry over; only a `name` parameter is
/// kept on the Content-Type.
fn replace_leaf(original: Leaf, image: TransformedImage, format: OutputFormat) -> Leaf {
    let disposition = match original.disposition {
        Some(Disposition::Attachment) => Disposition::Attachment,
        _ => Disposition::Inline,
    };
    let params = original
        .params
        .into_iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case("name"))
        .collect();

    Leaf {
        content_type: MimeType::new("image", format.subtype()),
        params,
        disposition: Some(disposition),
        filename: original.filename,
        content_id: original.content_id,
        headers: original.headers,
        payload: image.bytes,
        wire: None,
    }
}
