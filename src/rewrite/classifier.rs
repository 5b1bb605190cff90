//! Which leaves get rewritten.
//!
//! A leaf is a candidate when:
//! - its content type is `image/*`,
//! - it has a non-empty filename, and
//! - it is an attachment, or it is inline (or has no disposition) and carries
//!   a Content-ID, i.e. it is referenced from an HTML body.
//!
//! The Content-ID requirement for inline images is a policy knob
//! ([`EligibilityPolicy::inline_requires_content_id`]).

use crate::config::TransformConfig;
use crate::model::node::{Disposition, Leaf};

/// Tunables for [`is_eligible`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityPolicy {
    pub inline_requires_content_id: bool,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            inline_requires_content_id: true,
        }
    }
}

impl From<&TransformConfig> for EligibilityPolicy {
    fn from(config: &TransformConfig) -> Self {
        Self {
            inline_requires_content_id: config.inline_requires_content_id,
        }
    }
}

/// Decide whether `leaf` should go through the image engine. Pure.
pub fn is_eligible(leaf: &Leaf, policy: &EligibilityPolicy) -> bool {
    if !leaf.content_type.is_image() {
        return false;
    }
    if !has_text(leaf.filename.as_deref()) {
        return false;
    }

    match &leaf.disposition {
        Some(Disposition::Attachment) => true,
        None | Some(Disposition::Inline) => {
            !policy.inline_requires_content_id || has_text(leaf.content_id.as_deref())
        }
        Some(Disposition::Other(_)) => false,
    }
}

fn has_text(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}
