//! `mailshrink` — shrink the images inside e-mail messages.
//!
//! This crate reads an RFC 5322 message into a tree of MIME parts, rewrites
//! the image attachments and CID-referenced inline images so they fit a
//! bounded box (upright, re-encoded as JPEG), and writes the tree back out.
//! Everything else in the message passes through untouched.

pub mod config;
pub mod error;
pub mod export;
pub mod imaging;
pub mod model;
pub mod parser;
pub mod rewrite;

#[cfg(test)]
pub(crate) mod test_helpers;
