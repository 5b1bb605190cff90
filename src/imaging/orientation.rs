//! EXIF orientation: reading, applying, and resetting tag 0x0112.
//!
//! EXIF orientation values:
//! 1 = Normal, 2 = Mirrored, 3 = 180°, 4 = Flipped vertically,
//! 5 = Mirrored + 90° CW, 6 = 90° CW, 7 = Mirrored + 270° CW, 8 = 270° CW

use std::io::Cursor;

use image::DynamicImage;

const ORIENTATION_TAG: u16 = 0x0112;
/// TIFF field types an orientation entry is stored as.
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;

/// How the stored pixel grid must be transformed to appear upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    Transpose,
    Rotate90,
    Transverse,
    Rotate270,
}

impl Orientation {
    /// Map an EXIF orientation value. Out-of-range values are `None`.
    pub fn from_exif(value: u32) -> Option<Self> {
        Some(match value {
            1 => Self::Normal,
            2 => Self::FlipHorizontal,
            3 => Self::Rotate180,
            4 => Self::FlipVertical,
            5 => Self::Transpose,
            6 => Self::Rotate90,
            7 => Self::Transverse,
            8 => Self::Rotate270,
            _ => return None,
        })
    }

    pub fn exif_value(self) -> u16 {
        match self {
            Self::Normal => 1,
            Self::FlipHorizontal => 2,
            Self::Rotate180 => 3,
            Self::FlipVertical => 4,
            Self::Transpose => 5,
            Self::Rotate90 => 6,
            Self::Transverse => 7,
            Self::Rotate270 => 8,
        }
    }

    pub fn is_identity(self) -> bool {
        self == Self::Normal
    }

    pub fn is_mirrored(self) -> bool {
        matches!(
            self,
            Self::FlipHorizontal | Self::FlipVertical | Self::Transpose | Self::Transverse
        )
    }

    /// `true` when the upright image has width and height swapped.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::Transpose | Self::Rotate90 | Self::Transverse | Self::Rotate270
        )
    }

    /// Physically re-render `image` upright.
    pub fn apply(self, image: DynamicImage) -> DynamicImage {
        match self {
            Self::Normal => image,
            Self::FlipHorizontal => image.fliph(),
            Self::Rotate180 => image.rotate180(),
            Self::FlipVertical => image.flipv(),
            Self::Transpose => image.rotate90().fliph(),
            Self::Rotate90 => image.rotate90(),
            Self::Transverse => image.rotate270().fliph(),
            Self::Rotate270 => image.rotate270(),
        }
    }
}

/// EXIF found in an image container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExifBlock {
    /// Raw TIFF-structured EXIF data (no `Exif\0\0` prefix).
    pub tiff: Vec<u8>,
    pub orientation: Option<Orientation>,
}

/// Read the EXIF block from a JPEG/PNG/TIFF/WebP container via `kamadak-exif`.
///
/// Missing or unreadable EXIF is `None`: orientation metadata is optional.
pub fn read_exif(bytes: &[u8]) -> Option<ExifBlock> {
    let mut cursor = Cursor::new(bytes);
    let exif = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif,
        Err(e) => {
            tracing::trace!(error = %e, "No readable EXIF");
            return None;
        }
    };

    let orientation = exif
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .and_then(Orientation::from_exif);

    Some(ExifBlock {
        tiff: exif.buf().to_vec(),
        orientation,
    })
}

/// Rewrite the orientation entry of IFD0 to 1 (Normal), in place.
///
/// Returns `true` if an entry was found and patched. The value keeps the
/// entry's own width (SHORT or LONG). Malformed or truncated data, and
/// entries of any other type, are left untouched.
pub fn reset_orientation_tag(tiff: &mut [u8]) -> bool {
    let le = match tiff.get(0..2) {
        Some(b"II") => true,
        Some(b"MM") => false,
        _ => return false,
    };

    let Some(ifd_offset) = read_u32(tiff, 4, le) else {
        return false;
    };
    let mut pos = ifd_offset as usize;
    let Some(entries) = read_u16(tiff, pos, le) else {
        return false;
    };
    pos += 2;

    for _ in 0..entries {
        let Some(tag) = read_u16(tiff, pos, le) else {
            return false;
        };
        if tag == ORIENTATION_TAG {
            // Entry layout: tag(2) type(2) count(4) value(4), value left-aligned.
            let normal = Orientation::Normal.exif_value();
            let value: Vec<u8> = match read_u16(tiff, pos + 2, le) {
                Some(TYPE_SHORT) if le => normal.to_le_bytes().to_vec(),
                Some(TYPE_SHORT) => normal.to_be_bytes().to_vec(),
                Some(TYPE_LONG) if le => u32::from(normal).to_le_bytes().to_vec(),
                Some(TYPE_LONG) => u32::from(normal).to_be_bytes().to_vec(),
                _ => return false,
            };
            let value_offset = pos + 8;
            let Some(slot) = tiff.get_mut(value_offset..value_offset + value.len()) else {
                return false;
            };
            slot.copy_from_slice(&value);
            return true;
        }
        pos += 12;
    }
    false
}

fn read_u16(buf: &[u8], at: usize, le: bool) -> Option<u16> {
    let bytes: [u8; 2] = buf.get(at..at + 2)?.try_into().ok()?;
    Some(if le {
        u16::from_le_bytes(bytes)
    } else {
        u16::from_be_bytes(bytes)
    })
}

fn read_u32(buf: &[u8], at: usize, le: bool) -> Option<u32> {
    let bytes: [u8; 4] = buf.get(at..at + 4)?.try_into().ok()?;
    Some(if le {
        u32::from_le_bytes(bytes)
    } else {
        u32::from_be_bytes(bytes)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{exif_tiff, exif_tiff_typed, jpeg_with_exif};
    use image::{GenericImageView, Rgb, RgbImage};

    const A: [u8; 3] = [255, 0, 0];
    const B: [u8; 3] = [0, 255, 0];
    const C: [u8; 3] = [0, 0, 255];
    const D: [u8; 3] = [255, 255, 255];

    /// 2x2 image, rows top to bottom: `A B` / `C D`. Every flip and rotation
    /// of it is distinct.
    fn quad() -> DynamicImage {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(0, 0, Rgb(A));
        img.put_pixel(1, 0, Rgb(B));
        img.put_pixel(0, 1, Rgb(C));
        img.put_pixel(1, 1, Rgb(D));
        DynamicImage::ImageRgb8(img)
    }

    fn grid(img: &DynamicImage) -> [[[u8; 3]; 2]; 2] {
        let px = |x, y| {
            let p = img.get_pixel(x, y).0;
            [p[0], p[1], p[2]]
        };
        [[px(0, 0), px(1, 0)], [px(0, 1), px(1, 1)]]
    }

    #[test]
    fn test_from_exif_range() {
        assert_eq!(Orientation::from_exif(1), Some(Orientation::Normal));
        assert_eq!(Orientation::from_exif(6), Some(Orientation::Rotate90));
        assert_eq!(Orientation::from_exif(0), None);
        assert_eq!(Orientation::from_exif(9), None);
        for v in 1..=8u32 {
            assert_eq!(Orientation::from_exif(v).unwrap().exif_value() as u32, v);
        }
    }

    #[test]
    fn test_mirroring_and_swaps() {
        let mirrored: Vec<u32> = (1..=8)
            .filter(|v| Orientation::from_exif(*v).unwrap().is_mirrored())
            .collect();
        assert_eq!(mirrored, vec![2, 4, 5, 7]);
        let swapped: Vec<u32> = (1..=8)
            .filter(|v| Orientation::from_exif(*v).unwrap().swaps_dimensions())
            .collect();
        assert_eq!(swapped, vec![5, 6, 7, 8]);
    }

    #[test]
    fn test_apply_renders_every_orientation_upright() {
        let expected = [
            (1, [[A, B], [C, D]]),
            (2, [[B, A], [D, C]]),
            (3, [[D, C], [B, A]]),
            (4, [[C, D], [A, B]]),
            (5, [[A, C], [B, D]]),
            (6, [[C, A], [D, B]]),
            (7, [[D, B], [C, A]]),
            (8, [[B, D], [A, C]]),
        ];
        for (value, upright) in expected {
            let out = Orientation::from_exif(value).unwrap().apply(quad());
            assert_eq!(grid(&out), upright, "orientation {value}");
        }
    }

    #[test]
    fn test_apply_agrees_with_image_crate() {
        for value in 1..=8u8 {
            let ours = Orientation::from_exif(value.into()).unwrap().apply(quad());
            let mut theirs = quad();
            theirs.apply_orientation(image::metadata::Orientation::from_exif(value).unwrap());
            assert_eq!(ours.dimensions(), theirs.dimensions(), "orientation {value}");
            assert_eq!(ours.as_bytes(), theirs.as_bytes(), "orientation {value}");
        }
    }

    #[test]
    fn test_reset_orientation_little_endian() {
        let mut tiff = exif_tiff(6, true);
        assert!(reset_orientation_tag(&mut tiff));
        assert_eq!(&tiff[18..20], &[1, 0]);
    }

    #[test]
    fn test_reset_orientation_big_endian() {
        let mut tiff = exif_tiff(8, false);
        assert!(reset_orientation_tag(&mut tiff));
        assert_eq!(&tiff[18..20], &[0, 1]);
    }

    #[test]
    fn test_reset_orientation_keeps_entry_width() {
        for le in [true, false] {
            let mut short = exif_tiff_typed(6, le, false);
            assert!(reset_orientation_tag(&mut short));
            assert_eq!(read_u16(&short, 18, le), Some(1));
            assert_eq!(&short[20..22], &[0, 0]);

            let mut long = exif_tiff_typed(6, le, true);
            assert!(reset_orientation_tag(&mut long));
            assert_eq!(read_u32(&long, 18, le), Some(1));
            assert_eq!(
                exif::Reader::new()
                    .read_raw(long.clone())
                    .unwrap()
                    .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                    .and_then(|f| f.value.get_uint(0)),
                Some(1)
            );
        }
    }

    #[test]
    fn test_reset_orientation_unknown_type_untouched() {
        let mut tiff = exif_tiff(6, true);
        tiff[12] = 1; // BYTE
        let before = tiff.clone();
        assert!(!reset_orientation_tag(&mut tiff));
        assert_eq!(tiff, before);
    }

    #[test]
    fn test_reset_orientation_garbage_untouched() {
        let mut junk = b"not a tiff at all".to_vec();
        let before = junk.clone();
        assert!(!reset_orientation_tag(&mut junk));
        assert_eq!(junk, before);

        let mut truncated = exif_tiff(6, true);
        truncated.truncate(12);
        assert!(!reset_orientation_tag(&mut truncated));
    }

    #[test]
    fn test_read_exif_from_jpeg() {
        let jpeg = jpeg_with_exif(8, 4, Some(6));
        let block = read_exif(&jpeg).expect("exif present");
        assert_eq!(block.orientation, Some(Orientation::Rotate90));
    }

    #[test]
    fn test_read_exif_absent() {
        let jpeg = jpeg_with_exif(8, 4, None);
        assert!(read_exif(&jpeg).is_none());
        assert!(read_exif(b"garbage").is_none());
    }
}
