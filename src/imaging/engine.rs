//! The image transform engine: decode → upright → fit → encode.
//!
//! The engine decides *what* the output should be (target box, quality,
//! whether EXIF survives) and delegates every pixel operation to an
//! [`ImageCodec`], so the pipeline can be exercised with a mock.

use super::calculations::fit_within;
use super::codec::{ImageCodec, RustCodec};
use super::orientation;
use super::params::{Dimensions, EncodeParams};
use crate::config::TransformConfig;
use crate::error::Result;

/// A re-encoded image and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedImage {
    /// Encoded output in the configured format.
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Stored (pre-orientation) dimensions of the source.
    pub original: Dimensions,
    /// Size of the source payload in bytes.
    pub original_size: usize,
}

impl TransformedImage {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

/// Turns raw image bytes into a bounded, upright, re-encoded image.
pub struct ImageEngine<C: ImageCodec = RustCodec> {
    codec: C,
    config: TransformConfig,
}

impl ImageEngine<RustCodec> {
    pub fn new(config: TransformConfig) -> Self {
        Self::with_codec(RustCodec::new(), config)
    }
}

impl<C: ImageCodec> ImageEngine<C> {
    pub fn with_codec(codec: C, config: TransformConfig) -> Self {
        Self { codec, config }
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Run the full pipeline on one payload.
    ///
    /// 1. Decode (fails with `Decode` on unrecognized bytes).
    /// 2. Apply EXIF orientation, if any, so the pixels are physically upright.
    /// 3. Fit within `max_width` x `max_height`, never upscaling.
    /// 4. Encode at the configured quality; any preserved EXIF has its
    ///    orientation reset to 1 so viewers do not rotate a second time.
    pub fn transform(&self, raw: &[u8]) -> Result<TransformedImage> {
        let decoded = self.codec.decode(raw)?;
        let original = Dimensions::of(&decoded.image);

        let image = match decoded.orientation {
            Some(o) if !o.is_identity() => self.codec.reorient(decoded.image, o)?,
            _ => decoded.image,
        };

        let upright = Dimensions::of(&image);
        let target = fit_within(upright, self.bounds());
        let image = if target == upright {
            image
        } else {
            self.codec.resize(image, target)?
        };

        let exif = match decoded.exif {
            Some(mut tiff) if self.config.preserve_exif => {
                orientation::reset_orientation_tag(&mut tiff);
                Some(tiff)
            }
            _ => None,
        };

        let bytes = self.codec.encode(
            &image,
            &EncodeParams {
                format: self.config.output_format,
                quality: self.config.quality,
                exif: exif.as_deref(),
            },
        )?;

        Ok(TransformedImage {
            bytes,
            width: image.width(),
            height: image.height(),
            original,
            original_size: raw.len(),
        })
    }

    fn bounds(&self) -> Dimensions {
        Dimensions::new(self.config.max_width, self.config.max_height)
    }
}
