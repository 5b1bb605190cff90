//! Image processing — pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (format sniffed from content) |
//! | **Orientation** | `kamadak-exif`, tag 0x0112 |
//! | **Fit within box** | [`fit_within`] + `Lanczos3` |
//! | **Encode → JPEG** | `jpeg-encoder`, optimized Huffman tables |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Orientation**: EXIF orientation read / apply / reset
//! - **Codec**: [`ImageCodec`] trait + [`RustCodec`]
//! - **Engine**: [`ImageEngine`], the decode → upright → fit → encode pipeline

mod calculations;
pub mod codec;
pub mod engine;
pub mod orientation;
mod params;

pub use calculations::fit_within;
pub use codec::{DecodedImage, ImageCodec, RustCodec};
pub use engine::{ImageEngine, TransformedImage};
pub use orientation::Orientation;
pub use params::{Dimensions, EncodeParams, OutputFormat, Quality};
