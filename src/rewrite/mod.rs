//! Document rewriting: decide which leaves are images worth shrinking and
//! rebuild the tree around the replacements.

pub mod classifier;
pub mod tree;

pub use classifier::{is_eligible, EligibilityPolicy};
pub use tree::{ImageOutcome, LeafFailure, RewriteReport, Rewriter, Rewritten, MAX_DEPTH};

use crate::config::TransformConfig;
use crate::error::Result;
use crate::model::node::DocumentNode;

/// Rewrite `root` with the production codec and return the new tree.
///
/// Fails only on an invalid `config` or a structurally malformed tree.
/// Images that cannot be processed are left untouched.
pub fn rewrite_document(root: DocumentNode, config: &TransformConfig) -> Result<DocumentNode> {
    Ok(Rewriter::new(config)?.rewrite(root)?.root)
}
