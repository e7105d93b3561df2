//! ============================================================================
//! Upload Content-Type Resolver
//! ============================================================================
//! HeyGen validates the upload Content-Type against the actual bytes, and the
//! type reported by the OS or the caller is often wrong. The leading bytes
//! decide; the declared type is only a fallback.
//! ============================================================================

use tracing::debug;

/// MIME type used when neither signature nor declared type is available
pub const FALLBACK_MIME: &str = "image/jpeg";

/// Magic-byte prefixes, checked in order
const SIGNATURES: &[(&[u8], &str)] = &[
    (&[0x89, 0x50, 0x4E, 0x47], "image/png"),
    (&[0xFF, 0xD8, 0xFF], "image/jpeg"),
    (&[0x47, 0x49, 0x46], "image/gif"),
    (&[0x52, 0x49, 0x46, 0x46], "image/webp"),
];

/// Detect the image type from the first bytes of the payload, if known
pub fn sniff(bytes: &[u8]) -> Option<&'static str> {
    let head = &bytes[..bytes.len().min(4)];
    SIGNATURES
        .iter()
        .find(|(magic, _)| head.starts_with(magic))
        .map(|(_, mime)| *mime)
}

/// Resolve the Content-Type for an upload.
///
/// Runs on every upload: a matching signature always wins over `declared`.
pub fn resolve(bytes: &[u8], declared: Option<&str>) -> String {
    if let Some(mime) = sniff(bytes) {
        if let Some(d) = declared.filter(|d| !d.trim().is_empty() && *d != mime) {
            debug!("Overriding declared type {} with sniffed {}", d, mime);
        }
        return mime.to_string();
    }

    match declared.map(str::trim).filter(|d| !d.is_empty()) {
        Some(d) => d.to_string(),
        None => FALLBACK_MIME.to_string(),
    }
}
