//! Shared test utilities: synthetic images and EXIF blocks.
//!
//! Everything is generated in memory so tests need no binary fixtures.

use std::io::Cursor;

use image::{DynamicImage, ImageEncoder, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

// =========================================================================
// EXIF
// =========================================================================

/// Minimal TIFF block with a single IFD0 entry: Orientation (SHORT).
///
/// The orientation value sits at bytes 18..20.
pub fn exif_tiff(orientation: u16, little_endian: bool) -> Vec<u8> {
    exif_tiff_typed(orientation.into(), little_endian, false)
}

/// Like [`exif_tiff`], optionally storing the orientation as a LONG
/// (bytes 18..22) the way some writers do.
pub fn exif_tiff_typed(orientation: u32, little_endian: bool, long: bool) -> Vec<u8> {
    let u16b = |v: u16| {
        if little_endian {
            v.to_le_bytes()
        } else {
            v.to_be_bytes()
        }
    };
    let u32b = |v: u32| {
        if little_endian {
            v.to_le_bytes()
        } else {
            v.to_be_bytes()
        }
    };

    let mut tiff = Vec::new();
    tiff.extend_from_slice(if little_endian { b"II" } else { b"MM" });
    tiff.extend_from_slice(&u16b(42));
    tiff.extend_from_slice(&u32b(8)); // IFD0 offset
    tiff.extend_from_slice(&u16b(1)); // entry count
    tiff.extend_from_slice(&u16b(0x0112));
    if long {
        tiff.extend_from_slice(&u16b(4));
        tiff.extend_from_slice(&u32b(1));
        tiff.extend_from_slice(&u32b(orientation));
    } else {
        tiff.extend_from_slice(&u16b(3));
        tiff.extend_from_slice(&u32b(1));
        tiff.extend_from_slice(&u16b(orientation as u16));
        tiff.extend_from_slice(&[0, 0]);
    }
    tiff.extend_from_slice(&u32b(0)); // no next IFD
    tiff
}

// =========================================================================
// Images
// =========================================================================

/// Left half red, right half blue.
pub fn split_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgb([255, 0, 0])
        } else {
            Rgb([0, 0, 255])
        }
    })
}

/// Encode a [`split_image`] as JPEG, optionally with an EXIF orientation.
pub fn jpeg_with_exif(width: u32, height: u32, orientation: Option<u16>) -> Vec<u8> {
    let img = split_image(width, height);
    let mut buf = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut buf, 95);
    if let Some(value) = orientation {
        let mut segment = b"Exif\0\0".to_vec();
        segment.extend_from_slice(&exif_tiff(value, true));
        encoder.add_app_segment(1, &segment).unwrap();
    }
    encoder
        .encode(
            img.as_raw(),
            width as u16,
            height as u16,
            jpeg_encoder::ColorType::Rgb,
        )
        .unwrap();
    buf
}

/// A gradient JPEG of the given size, encoded by the `image` crate.
pub fn gradient_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// A fully transparent PNG (alpha = 0 everywhere).
pub fn transparent_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .unwrap();
    cursor.into_inner()
}

/// Decode any image the `image` crate understands.
pub fn decode(bytes: &[u8]) -> DynamicImage {
    image::load_from_memory(bytes).unwrap()
}
