//! Media type rules
//!
//! The allowlist is a static table so validation never depends on the host's mime database.
//! Sniffing only recognizes the formats the allowlist accepts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::MediaTypeError;

/// Number of leading bytes inspected by [`sniff_content_type`].
pub const SNIFF_LEN: usize = 512;

/// Fallback returned when no known signature matches.
pub const OCTET_STREAM: &str = "application/octet-stream";

const ALLOWED: &[(&str, &[&str])] = &[
    ("image/jpeg", &["jpg", "jpeg"]),
    ("image/png", &["png"]),
    ("image/webp", &["webp"]),
    ("image/gif", &["gif"]),
    ("image/bmp", &["bmp"]),
    ("image/tiff", &["tif", "tiff"]),
    ("image/heic", &["heic"]),
    ("image/heif", &["heif"]),
    ("video/mp4", &["mp4"]),
    ("video/webm", &["webm"]),
    ("video/quicktime", &["mov"]),
    ("video/x-msvideo", &["avi"]),
    ("video/x-matroska", &["mkv"]),
    ("video/ogg", &["ogv"]),
    ("video/3gpp", &["3gp"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = MediaTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            other => Err(MediaTypeError::UnsupportedMediaType(other.to_string())),
        }
    }
}

/// Lowercased mime type without parameters (`image/JPEG; q=1` -> `image/jpeg`).
pub fn normalize_content_type(content_type: &str) -> Result<String, MediaTypeError> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.split_once('/') {
        Some((kind, subtype)) if !kind.is_empty() && !subtype.is_empty() => Ok(essence),
        _ => Err(MediaTypeError::InvalidContentType(content_type.to_string())),
    }
}

/// Validates a declared (filename, content type) pair and returns its media type.
pub fn classify(filename: &str, content_type: &str) -> Result<MediaType, MediaTypeError> {
    let mime_type = normalize_content_type(content_type)?;

    let extensions = ALLOWED
        .iter()
        .find(|(allowed, _)| *allowed == mime_type)
        .map(|(_, extensions)| *extensions)
        .ok_or_else(|| MediaTypeError::UnsupportedMimeType(mime_type.clone()))?;

    let extension = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => return Err(MediaTypeError::MissingExtension),
    };

    if !extensions.contains(&extension.as_str()) {
        return Err(MediaTypeError::ExtensionMismatch {
            extension,
            mime_type,
        });
    }

    if mime_type.starts_with("image/") {
        Ok(MediaType::Image)
    } else if mime_type.starts_with("video/") {
        Ok(MediaType::Video)
    } else {
        Err(MediaTypeError::UnsupportedMediaType(mime_type))
    }
}

/// Object storage key for a file: `{media_type}/{file_id}`.
pub fn storage_key(media_type: MediaType, file_id: Uuid) -> String {
    format!("{}/{}", media_type, file_id)
}

/// Detects the content type from the leading bytes of an object.
pub fn sniff_content_type(head: &[u8]) -> &'static str {
    let head = &head[..head.len().min(SNIFF_LEN)];

    if head.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    if head.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return "image/png";
    }
    if head.starts_with(b"GIF87a") || head.starts_with(b"GIF89a") {
        return "image/gif";
    }
    if head.starts_with(b"BM") {
        return "image/bmp";
    }
    if head.starts_with(b"II*\0") || head.starts_with(b"MM\0*") {
        return "image/tiff";
    }
    if head.len() >= 12 && &head[..4] == b"RIFF" {
        match &head[8..12] {
            b"WEBP" => return "image/webp",
            b"AVI " => return "video/x-msvideo",
            _ => {}
        }
    }
    if head.starts_with(b"OggS") {
        return "video/ogg";
    }
    if head.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        // EBML header; the DocType element tells WebM from Matroska.
        if contains(head, b"webm") {
            return "video/webm";
        }
        return "video/x-matroska";
    }
    if head.len() >= 12 && &head[4..8] == b"ftyp" {
        return match &head[8..12] {
            brand if is_hevc_brand(brand) => "image/heic",
            b"mif1" | b"msf1" if compatible_brands(head).any(is_hevc_brand) => "image/heic",
            b"mif1" | b"msf1" => "image/heif",
            b"qt  " => "video/quicktime",
            brand if brand.starts_with(b"3gp") => "video/3gpp",
            _ => "video/mp4",
        };
    }

    OCTET_STREAM
}

fn is_hevc_brand(brand: &[u8]) -> bool {
    matches!(brand, b"heic" | b"heix" | b"heim" | b"heis" | b"hevc" | b"hevx")
}

/// Compatible brands of the `ftyp` box, bounded by the box size and by `head`.
fn compatible_brands(head: &[u8]) -> impl Iterator<Item = &[u8]> {
    let box_size = u32::from_be_bytes([head[0], head[1], head[2], head[3]]) as usize;
    let end = box_size.min(head.len());
    head.get(16..end).unwrap_or_default().chunks_exact(4)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_image_and_video() {
        assert_eq!(classify("photo.jpg", "image/jpeg"), Ok(MediaType::Image));
        assert_eq!(classify("photo.JPEG", "image/jpeg"), Ok(MediaType::Image));
        assert_eq!(classify("clip.mp4", "video/mp4"), Ok(MediaType::Video));
        assert_eq!(
            classify("clip.mov", "video/quicktime; codecs=avc1"),
            Ok(MediaType::Video)
        );
    }

    #[test]
    fn test_classify_rejects_missing_extension() {
        assert_eq!(
            classify("photo", "image/jpeg"),
            Err(MediaTypeError::MissingExtension)
        );
        assert_eq!(
            classify(".jpg", "image/jpeg"),
            Err(MediaTypeError::MissingExtension)
        );
    }

    #[test]
    fn test_classify_rejects_mismatched_extension() {
        assert!(matches!(
            classify("photo.png", "image/jpeg"),
            Err(MediaTypeError::ExtensionMismatch { .. })
        ));
    }

    #[test]
    fn test_classify_rejects_unknown_mime_type() {
        assert_eq!(
            classify("notes.pdf", "application/pdf"),
            Err(MediaTypeError::UnsupportedMimeType(
                "application/pdf".to_string()
            ))
        );
        assert!(matches!(
            classify("photo.jpg", "jpeg"),
            Err(MediaTypeError::InvalidContentType(_))
        ));
    }

    #[test]
    fn test_storage_key_layout() {
        let id = Uuid::nil();
        assert_eq!(
            storage_key(MediaType::Video, id),
            "video/00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_sniff_known_signatures() {
        assert_eq!(sniff_content_type(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]), "image/jpeg");
        assert_eq!(
            sniff_content_type(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
            "image/png"
        );
        assert_eq!(sniff_content_type(b"GIF89a...."), "image/gif");
        assert_eq!(sniff_content_type(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(sniff_content_type(b"RIFF\0\0\0\0AVI LIST"), "video/x-msvideo");
    }

    #[test]
    fn test_sniff_iso_media_brands() {
        let mut mp4 = vec![0, 0, 0, 0x18];
        mp4.extend_from_slice(b"ftypisom");
        assert_eq!(sniff_content_type(&mp4), "video/mp4");

        let mut mov = vec![0, 0, 0, 0x14];
        mov.extend_from_slice(b"ftypqt  ");
        assert_eq!(sniff_content_type(&mov), "video/quicktime");

        let mut heic = vec![0, 0, 0, 0x18];
        heic.extend_from_slice(b"ftypheic");
        assert_eq!(sniff_content_type(&heic), "image/heic");
    }

    #[test]
    fn test_sniff_mif1_uses_compatible_brands() {
        let mut heic = vec![0, 0, 0, 0x18];
        heic.extend_from_slice(b"ftypmif1\0\0\0\0mif1heic");
        assert_eq!(sniff_content_type(&heic), "image/heic");

        let mut sequence = vec![0, 0, 0, 0x14];
        sequence.extend_from_slice(b"ftypmsf1\0\0\0\0hevc");
        assert_eq!(sniff_content_type(&sequence), "image/heic");

        let mut heif = vec![0, 0, 0, 0x14];
        heif.extend_from_slice(b"ftypmif1\0\0\0\0mif1");
        assert_eq!(sniff_content_type(&heif), "image/heif");

        // Brands past the end of the ftyp box belong to the next box.
        let mut truncated = vec![0, 0, 0, 0x14];
        truncated.extend_from_slice(b"ftypmif1\0\0\0\0mif1heic");
        assert_eq!(sniff_content_type(&truncated), "image/heif");
    }

    #[test]
    fn test_sniff_unknown_is_octet_stream() {
        assert_eq!(sniff_content_type(b"%PDF-1.7"), OCTET_STREAM);
        assert_eq!(sniff_content_type(&[]), OCTET_STREAM);
    }
}
