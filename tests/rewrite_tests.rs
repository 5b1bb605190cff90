//! Integration tests: read → rewrite → write → read again.

use std::io::Cursor;
use std::path::Path;

use base64::Engine as _;
use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};

use mailshrink::config::TransformConfig;
use mailshrink::error::ShrinkError;
use mailshrink::export::serialize_document;
use mailshrink::model::node::{Disposition, DocumentNode};
use mailshrink::parser::{parse_document, read_document};
use mailshrink::rewrite::{rewrite_document, Rewriter};

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn encoded_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, format)
        .expect("encode test image");
    buf.into_inner()
}

fn base64_lines(data: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(data);
    encoded
        .as_bytes()
        .chunks(76)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect::<Vec<_>>()
        .join("\r\n")
}

fn mixed_with_attachment(name: &str, content_type: &str, data: &[u8]) -> String {
    format!(
        "From: alice@example.com\r\n\
         To: bob@example.com\r\n\
         Subject: Holiday photo\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: multipart/mixed; boundary=\"mix\"\r\n\
         \r\n\
         --mix\r\n\
         Content-Type: text/plain; charset=us-ascii\r\n\
         \r\n\
         Photo attached.\r\n\
         --mix\r\n\
         Content-Type: {content_type}; name=\"{name}\"\r\n\
         Content-Disposition: attachment; filename=\"{name}\"\r\n\
         Content-Transfer-Encoding: base64\r\n\
         \r\n\
         {}\r\n\
         --mix--\r\n",
        base64_lines(data)
    )
}

fn round_trip(root: &DocumentNode) -> DocumentNode {
    parse_document(&serialize_document(root)).expect("reparse output")
}

// ─── Oversized attachment is bounded and keeps its identity ─────────

#[test]
fn test_oversized_attachment_shrunk() {
    let raw = mixed_with_attachment("a.jpg", "image/jpeg", &encoded_image(3000, 1500, ImageFormat::Jpeg));
    let root = parse_document(raw.as_bytes()).unwrap();
    let rewritten = rewrite_document(root, &TransformConfig::default()).unwrap();
    let reparsed = round_trip(&rewritten);

    let container = reparsed.as_container().expect("multipart root");
    assert_eq!(container.kind, "mixed");
    assert_eq!(reparsed.headers().get("Subject"), Some("Holiday photo"));

    let leaves = reparsed.leaves();
    assert_eq!(leaves.len(), 2);
    assert_eq!(leaves[0].payload, b"Photo attached.".to_vec());

    let photo = leaves[1];
    assert_eq!(photo.content_type.to_string(), "image/jpeg");
    assert_eq!(photo.disposition, Some(Disposition::Attachment));
    assert_eq!(photo.filename.as_deref(), Some("a.jpg"));

    let decoded = image::load_from_memory(&photo.payload).unwrap();
    assert_eq!(decoded.dimensions(), (1920, 960));
}

// ─── Non-JPEG source is re-encoded as JPEG ──────────────────────────

#[test]
fn test_png_attachment_becomes_jpeg() {
    let raw = mixed_with_attachment("shot.png", "image/png", &encoded_image(2400, 2400, ImageFormat::Png));
    let root = parse_document(raw.as_bytes()).unwrap();
    let out = Rewriter::new(&TransformConfig::default())
        .unwrap()
        .rewrite(root)
        .unwrap();

    assert_eq!(out.report.transformed(), 1);
    let photo = out.root.leaves()[1];
    assert_eq!(photo.content_type.to_string(), "image/jpeg");
    assert_eq!(photo.filename.as_deref(), Some("shot.png"));
    assert_eq!(
        image::guess_format(&photo.payload).unwrap(),
        ImageFormat::Jpeg
    );
    assert_eq!(
        image::load_from_memory(&photo.payload).unwrap().dimensions(),
        (1080, 1080)
    );
    assert!(out.report.bytes_after() > 0);
}

// ─── Corrupt image: fail-open, everything else identical ────────────

#[test]
fn test_corrupt_image_left_unchanged() {
    let root = read_document(fixture("corrupt_image.eml")).unwrap();
    let out = Rewriter::new(&TransformConfig::default())
        .unwrap()
        .rewrite(root.clone())
        .unwrap();

    assert_eq!(out.root, root);
    assert_eq!(out.report.eligible, 1);
    assert_eq!(out.report.failed(), 1);
    assert_eq!(
        out.report.failure_note().as_deref(),
        Some("1 of 1 eligible images could not be processed")
    );

    let written = String::from_utf8(serialize_document(&out.root)).unwrap();
    assert!(written.contains("bm90IGEganBlZyBhdCBhbGwsIGp1c3QgdGV4dA==\r\n--mix-1--"));
}

// ─── Neighbours of a rewritten image keep their header bytes ────────

#[test]
fn test_untouched_parts_keep_headers_after_rewrite() {
    let raw = format!(
        "Subject: Report\r\n\
         Content-Type: multipart/mixed; boundary=\"mix\"\r\n\
         \r\n\
         --mix\r\n\
         Content-Type: application/pdf;\r\n \
         name=\"=?UTF-8?B?w6l0w6kucGRm?=\"\r\n\
         Content-Disposition: attachment; filename=\"report.pdf\"; size=1234\r\n\
         Content-Transfer-Encoding: base64\r\n\
         \r\n\
         JVBERi0xLjQK\r\n\
         --mix\r\n\
         Content-Type: image/jpeg; name=\"big.jpg\"\r\n\
         Content-Disposition: attachment; filename=\"big.jpg\"\r\n\
         Content-Transfer-Encoding: base64\r\n\
         \r\n\
         {}\r\n\
         --mix--\r\n",
        base64_lines(&encoded_image(2400, 1200, ImageFormat::Jpeg))
    );
    let root = parse_document(raw.as_bytes()).unwrap();
    let rewritten = rewrite_document(root, &TransformConfig::default()).unwrap();
    let written = String::from_utf8(serialize_document(&rewritten)).unwrap();

    assert!(written.contains(
        "Content-Type: application/pdf;\r\n \
         name=\"=?UTF-8?B?w6l0w6kucGRm?=\"\r\n\
         Content-Disposition: attachment; filename=\"report.pdf\"; size=1234\r\n\
         Content-Transfer-Encoding: base64\r\n\r\nJVBERi0xLjQK\r\n"
    ));
    assert!(written.contains("Content-Disposition: attachment; filename=\"big.jpg\"\r\n"));

    let photo = round_trip(&rewritten).leaves()[1].clone();
    assert_eq!(
        image::load_from_memory(&photo.payload).unwrap().dimensions(),
        (1920, 960)
    );
}

// ─── No eligible images: output reparses to the same tree ───────────

#[test]
fn test_text_only_message_passthrough() {
    let root = read_document(fixture("text_only.eml")).unwrap();
    let rewritten = rewrite_document(root.clone(), &TransformConfig::default()).unwrap();
    assert_eq!(rewritten, root);

    let written = String::from_utf8(serialize_document(&rewritten)).unwrap();
    assert!(written.contains("boundary=\"alt-1\""));
    assert!(written.contains("Content-Transfer-Encoding: quoted-printable\r\n\r\nCaf=C3=A9 menu attached.\r\n"));
    assert!(written.contains("Subject: =?UTF-8?Q?Caf=C3=A9_menu?="));

    let reparsed = round_trip(&rewritten);
    let before: Vec<_> = root.leaves().iter().map(|l| l.payload.clone()).collect();
    let after: Vec<_> = reparsed.leaves().iter().map(|l| l.payload.clone()).collect();
    assert_eq!(before, after);
}

// ─── Inline images: only CID-referenced ones are rewritten ──────────

#[test]
fn test_inline_images_need_content_id() {
    let big = base64_lines(&encoded_image(2000, 1000, ImageFormat::Jpeg));
    let raw = format!(
        "Subject: Newsletter\r\n\
         Content-Type: multipart/related; boundary=\"rel\"\r\n\
         \r\n\
         --rel\r\n\
         Content-Type: text/html\r\n\
         \r\n\
         <img src=\"cid:hero@news\">\r\n\
         --rel\r\n\
         Content-Type: image/jpeg\r\n\
         Content-Disposition: inline; filename=\"hero.jpg\"\r\n\
         Content-ID: <hero@news>\r\n\
         Content-Transfer-Encoding: base64\r\n\
         \r\n\
         {big}\r\n\
         --rel\r\n\
         Content-Type: image/jpeg\r\n\
         Content-Disposition: inline; filename=\"stray.jpg\"\r\n\
         Content-Transfer-Encoding: base64\r\n\
         \r\n\
         {big}\r\n\
         --rel--\r\n"
    );
    let root = parse_document(raw.as_bytes()).unwrap();
    let out = Rewriter::new(&TransformConfig::default())
        .unwrap()
        .rewrite(root.clone())
        .unwrap();

    assert_eq!(out.report.eligible, 1);
    let leaves = out.root.leaves();
    let hero = leaves[1];
    assert_eq!(hero.content_id.as_deref(), Some("hero@news"));
    assert_eq!(hero.disposition, Some(Disposition::Inline));
    assert_eq!(
        image::load_from_memory(&hero.payload).unwrap().dimensions(),
        (1920, 960)
    );
    assert_eq!(leaves[2], root.leaves()[2]);

    let reparsed = round_trip(&out.root);
    assert_eq!(reparsed.leaves()[1].content_id.as_deref(), Some("hero@news"));
}

// ─── Custom bounds and parallel traversal ───────────────────────────

#[test]
fn test_custom_bounds_parallel() {
    let raw = mixed_with_attachment("b.jpg", "image/jpeg", &encoded_image(1200, 900, ImageFormat::Jpeg));
    let config = TransformConfig {
        max_width: 400,
        max_height: 400,
        parallel: true,
        ..TransformConfig::default()
    };
    let rewritten = rewrite_document(parse_document(raw.as_bytes()).unwrap(), &config).unwrap();
    let photo = rewritten.leaves()[1];
    assert_eq!(
        image::load_from_memory(&photo.payload).unwrap().dimensions(),
        (400, 300)
    );
}

#[test]
fn test_invalid_bounds_rejected() {
    let root = read_document(fixture("text_only.eml")).unwrap();
    let config = TransformConfig {
        max_width: 0,
        ..TransformConfig::default()
    };
    assert!(matches!(
        rewrite_document(root, &config),
        Err(ShrinkError::Config(_))
    ));
}
