//! Image codec trait and the pure-Rust production implementation.
//!
//! The [`ImageCodec`] trait defines the four pixel operations the engine
//! needs: decode, reorient, resize, and encode. [`RustCodec`] implements them
//! with the `image` crate for decoding and resampling, `kamadak-exif` for
//! orientation metadata and `jpeg-encoder` for optimized JPEG output.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, BMP, TIFF, WebP) | `image::ImageReader` |
//! | Orientation | `kamadak-exif` (tag 0x0112, primary IFD) |
//! | Reorient | `DynamicImage::{rotate90, rotate180, rotate270, fliph, flipv}` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `jpeg_encoder::Encoder` with optimized Huffman tables |

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};

use super::orientation::{self, Orientation};
use super::params::{Dimensions, EncodeParams, OutputFormat};
use crate::error::{Result, ShrinkError};

/// Largest APP1 payload a JPEG segment can hold.
const MAX_APP_SEGMENT: usize = 65_533;

const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";

/// A decoded pixel buffer plus its optional EXIF metadata.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    /// `None` when the container carries no (readable) orientation tag.
    pub orientation: Option<Orientation>,
    /// Raw TIFF-structured EXIF block, if any.
    pub exif: Option<Vec<u8>>,
}

/// Pixel-level image operations used by the transform engine.
///
/// `Sync` so one codec can serve sibling leaves processed on rayon threads.
pub trait ImageCodec: Sync {
    /// Parse bytes into pixels. Unrecognized input is [`ShrinkError::Decode`].
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage>;

    /// Physically re-render the pixels upright.
    fn reorient(&self, image: DynamicImage, orientation: Orientation) -> Result<DynamicImage>;

    /// Resample to exactly `target`.
    fn resize(&self, image: DynamicImage, target: Dimensions) -> Result<DynamicImage>;

    /// Compress the pixels into `params.format`.
    fn encode(&self, image: &DynamicImage, params: &EncodeParams<'_>) -> Result<Vec<u8>>;
}

/// Pure Rust codec. See the [module docs](self) for the crate mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ImageCodec for RustCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ShrinkError::Decode(format!("Failed to sniff format: {e}")))?;
        if reader.format().is_none() {
            return Err(ShrinkError::Decode("Unrecognized image format".into()));
        }
        let image = reader
            .decode()
            .map_err(|e| ShrinkError::Decode(format!("Failed to decode image: {e}")))?;

        let (orientation, exif) = match orientation::read_exif(bytes) {
            Some(block) => (block.orientation, Some(block.tiff)),
            None => (None, None),
        };

        Ok(DecodedImage {
            image,
            orientation,
            exif,
        })
    }

    fn reorient(&self, image: DynamicImage, orientation: Orientation) -> Result<DynamicImage> {
        Ok(orientation.apply(image))
    }

    fn resize(&self, image: DynamicImage, target: Dimensions) -> Result<DynamicImage> {
        if target.width == 0 || target.height == 0 {
            return Err(ShrinkError::Codec(format!(
                "Cannot resize to empty dimensions {target}"
            )));
        }
        Ok(image.resize_exact(target.width, target.height, FilterType::Lanczos3))
    }

    fn encode(&self, image: &DynamicImage, params: &EncodeParams<'_>) -> Result<Vec<u8>> {
        match params.format {
            OutputFormat::Jpeg => encode_jpeg(image, params),
        }
    }
}

/// Encode as baseline JPEG with optimized Huffman tables.
fn encode_jpeg(image: &DynamicImage, params: &EncodeParams<'_>) -> Result<Vec<u8>> {
    let width = u16::try_from(image.width())
        .map_err(|_| ShrinkError::Codec(format!("Width {} exceeds JPEG limit", image.width())))?;
    let height = u16::try_from(image.height()).map_err(|_| {
        ShrinkError::Codec(format!("Height {} exceeds JPEG limit", image.height()))
    })?;
    if width == 0 || height == 0 {
        return Err(ShrinkError::Codec("Cannot encode an empty image".into()));
    }

    let (pixels, color_type) = jpeg_pixels(image);

    let mut buf = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut buf, params.quality.value() as u8);
    encoder.set_optimized_huffman_tables(true);

    if let Some(tiff) = params.exif {
        if EXIF_HEADER.len() + tiff.len() <= MAX_APP_SEGMENT {
            let mut segment = Vec::with_capacity(EXIF_HEADER.len() + tiff.len());
            segment.extend_from_slice(EXIF_HEADER);
            segment.extend_from_slice(tiff);
            encoder
                .add_app_segment(1, &segment)
                .map_err(|e| ShrinkError::Codec(format!("Failed to embed EXIF: {e}")))?;
        } else {
            tracing::debug!(len = tiff.len(), "EXIF block too large for APP1, dropping");
        }
    }

    encoder
        .encode(&pixels, width, height, color_type)
        .map_err(|e| ShrinkError::Codec(format!("JPEG encode failed: {e}")))?;
    Ok(buf)
}

/// Pick the JPEG color model and flatten the pixels into it.
///
/// Greyscale stays single-channel. Anything with alpha is composited over
/// white, since JPEG has no transparency.
fn jpeg_pixels(image: &DynamicImage) -> (Vec<u8>, jpeg_encoder::ColorType) {
    let color = image.color();
    if color.has_alpha() {
        let rgba = image.to_rgba8();
        let mut rgb = Vec::with_capacity(rgba.width() as usize * rgba.height() as usize * 3);
        for px in rgba.pixels() {
            let [r, g, b, a] = px.0;
            rgb.extend_from_slice(&[over_white(r, a), over_white(g, a), over_white(b, a)]);
        }
        (rgb, jpeg_encoder::ColorType::Rgb)
    } else if !color.has_color() {
        (image.to_luma8().into_raw(), jpeg_encoder::ColorType::Luma)
    } else {
        (image.to_rgb8().into_raw(), jpeg_encoder::ColorType::Rgb)
    }
}

#[inline]
fn over_white(channel: u8, alpha: u8) -> u8 {
    let (c, a) = (channel as u32, alpha as u32);
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}
