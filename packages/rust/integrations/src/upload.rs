//! Decoding of uploaded images and object-key derivation.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Datelike, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;

use snap2listing_shared::{Result, Snap2ListingError};

/// A decoded upload ready for the object store.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Decode an `image` field: either raw base64 or a `data:<mime>;base64,` URL.
///
/// The stored content type always comes from the leading bytes; a data URL
/// may only declare an `image/*` type, and bytes that are not a PNG, JPEG,
/// GIF or WebP image are refused.
pub fn decode_image(input: &str, max_bytes: usize) -> Result<DecodedImage> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Snap2ListingError::validation("image is required"));
    }

    let (declared_type, payload) = match input.strip_prefix("data:") {
        Some(rest) => {
            let (meta, payload) = rest
                .split_once(',')
                .ok_or_else(|| Snap2ListingError::validation("image data URL has no payload"))?;
            let mime = meta.strip_suffix(";base64").ok_or_else(|| {
                Snap2ListingError::validation("image data URL must be base64-encoded")
            })?;
            let mime = mime.trim().to_ascii_lowercase();
            if !mime.starts_with("image/") {
                return Err(Snap2ListingError::validation(format!(
                    "image data URL must declare an image type, got '{mime}'"
                )));
            }
            (Some(mime), payload)
        }
        None => (None, input),
    };

    // Base64 expands 3 bytes into 4 chars; reject before decoding.
    if payload.len() / 4 * 3 > max_bytes + 3 {
        return Err(too_large(max_bytes));
    }

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| Snap2ListingError::validation(format!("image is not valid base64: {e}")))?;

    if bytes.is_empty() {
        return Err(Snap2ListingError::validation("image is empty"));
    }
    if bytes.len() > max_bytes {
        return Err(too_large(max_bytes));
    }

    let content_type = sniff_content_type(&bytes).ok_or_else(|| {
        Snap2ListingError::validation("image must be a PNG, JPEG, GIF or WebP file")
    })?;
    if let Some(declared) = declared_type.filter(|m| m != content_type) {
        debug!(%declared, sniffed = content_type, "declared image type overridden");
    }

    Ok(DecodedImage {
        bytes,
        content_type: content_type.to_string(),
    })
}

/// Object key: `uploads/<yyyy>/<mm>/<sha256 prefix>-<sanitized name>`.
pub fn object_key(
    file_name: Option<&str>,
    image: &DecodedImage,
    now: DateTime<Utc>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(&image.bytes);
    let digest = format!("{:x}", hasher.finalize());

    let name = file_name
        .map(sanitize_file_name)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("image.{}", extension_for(&image.content_type)));

    format!(
        "uploads/{:04}/{:02}/{}-{}",
        now.year(),
        now.month(),
        &digest[..12],
        name
    )
}

/// Keep ASCII alphanumerics, `.`, `-`, `_`; everything else becomes `-`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    cleaned.trim_matches(|c| c == '-' || c == '.').to_string()
}

pub(crate) fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        _ => "bin",
    }
}

fn sniff_content_type(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        _ => None,
    }
}

fn too_large(max_bytes: usize) -> Snap2ListingError {
    Snap2ListingError::validation(format!(
        "image exceeds the {} MB upload limit",
        max_bytes / (1024 * 1024)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    #[test]
    fn decodes_data_url() {
        let encoded = STANDARD.encode(JPEG_HEADER);
        let image = decode_image(&format!("data:image/jpeg;base64,{encoded}"), 1024).unwrap();
        assert_eq!(image.content_type, "image/jpeg");
        assert_eq!(image.bytes, JPEG_HEADER);
    }

    #[test]
    fn content_type_comes_from_bytes() {
        let encoded = STANDARD.encode(PNG_HEADER);
        let image = decode_image(&format!("data:image/jpeg;base64,{encoded}"), 1024).unwrap();
        assert_eq!(image.content_type, "image/png");
    }

    #[test]
    fn rejects_non_image_payloads() {
        let html = STANDARD.encode(b"<html><script>alert(1)</script></html>");

        let err = decode_image(&format!("data:text/html;base64,{html}"), 1024).unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().contains("text/html"));

        // Declared as an image, but the bytes are not one.
        let err = decode_image(&format!("data:image/png;base64,{html}"), 1024).unwrap_err();
        assert!(err.is_client_error());

        let err = decode_image(&html, 1024).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn sniffs_raw_base64() {
        let image = decode_image(&STANDARD.encode(PNG_HEADER), 1024).unwrap();
        assert_eq!(image.content_type, "image/png");
    }

    #[test]
    fn rejects_bad_input() {
        assert!(decode_image("", 1024).is_err());
        assert!(decode_image("not base64 at all!", 1024).is_err());
        assert!(decode_image("data:image/png,rawtext", 1024).is_err());

        let big = STANDARD.encode(vec![0u8; 4096]);
        let err = decode_image(&big, 1024).unwrap_err();
        assert!(err.to_string().contains("upload limit"));
    }

    #[test]
    fn object_key_layout() {
        let image = DecodedImage {
            bytes: PNG_HEADER.to_vec(),
            content_type: "image/png".into(),
        };
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap();

        let key = object_key(Some("My Mug (1).png"), &image, now);
        assert!(key.starts_with("uploads/2025/03/"));
        assert!(key.ends_with("-My-Mug--1-.png"));

        let default = object_key(None, &image, now);
        assert!(default.ends_with("-image.png"));
        let hash = default.trim_start_matches("uploads/2025/03/");
        assert_eq!(hash.find('-'), Some(12));
    }

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\photos\\mug.jpg"), "mug.jpg");
    }
}
