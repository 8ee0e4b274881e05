//! Magic-byte content sniffing for media files.
//!
//! Remote servers lie: a URL ending in `.jpg` can serve an HTML error page,
//! and a `Content-Type` header is whatever the server felt like sending.
//! The rewriter therefore decides what a fetched file IS by looking at its
//! first bytes, never at its name or at transport metadata.

use std::io::Read;
use std::path::Path;

/// Returned when no signature matches.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// How many leading bytes a signature match may need.
const SNIFF_LEN: usize = 64;

/// Known file signatures, checked in order. A `.` byte in a signature
/// matches any input byte at that position (container formats such as RIFF
/// and the ISO base media format carry a length field before their tag).
/// More specific signatures must precede generic ones (`ftypavif` before
/// `ftyp`).
const FILE_SIGNATURES: [(&[u8], &str); 24] = [
    // Images
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    (b"RIFF....WEBP", "image/webp"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"BM", "image/bmp"),
    (b"II*\x00", "image/tiff"),
    (b"MM\x00*", "image/tiff"),
    (b"....ftypavif", "image/avif"),
    (b"....ftypheic", "image/heic"),
    (b"<svg", "image/svg+xml"),
    // Audio
    (b"ID3", "audio/mpeg"),
    (b"\xFF\xFB", "audio/mpeg"),
    (b"OggS", "audio/ogg"),
    (b"RIFF....WAVE", "audio/wav"),
    (b"fLaC", "audio/x-flac"),
    // Video
    (b"RIFF....AVI ", "video/avi"),
    (b"....ftyp", "video/mp4"),
    (b"\x1A\x45\xDF\xA3", "video/webm"),
    // Documents a misbehaving server hands out instead of media
    (b"%PDF", "application/pdf"),
    (b"<!DOCTYPE", "text/html"),
    (b"<html", "text/html"),
    (b"<HTML", "text/html"),
];

/// Determine the media type of `data` from its leading bytes.
///
/// Falls back to [`OCTET_STREAM`] when nothing matches.
pub fn detect(data: &[u8]) -> &'static str {
    for (signature, media_type) in &FILE_SIGNATURES {
        if matches_signature(data, signature) {
            return media_type;
        }
    }

    // SVG files routinely open with an XML prolog instead of the bare
    // `<svg` root; look a little deeper for those.
    if data.starts_with(b"<?xml") && contains(data, b"<svg") {
        return "image/svg+xml";
    }

    OCTET_STREAM
}

/// Read the prefix of the file at `path` and sniff its media type.
pub fn detect_file(path: &Path) -> std::io::Result<&'static str> {
    let mut buf = Vec::with_capacity(SNIFF_LEN);
    std::fs::File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut buf)?;
    Ok(detect(&buf))
}

/// Whether a sniffed media type is an image category.
pub fn is_image(media_type: &str) -> bool {
    media_type.starts_with("image/")
}

fn matches_signature(data: &[u8], signature: &[u8]) -> bool {
    if data.len() < signature.len() {
        return false;
    }
    signature
        .iter()
        .zip(data)
        .all(|(&sig, &byte)| sig == b'.' || sig == byte)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}
