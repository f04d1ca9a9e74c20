//! URL-to-filename resolution
//!
//! Downloads are content-addressed: the filename stem is a digest of the
//! normalized URL, which is what makes re-runs idempotent (same URL, same
//! path, and a prior download is detected by path existence).
//!
//! Extension resolution happens in two phases. [`resolve`] makes a
//! provisional guess from the URL alone; if that guess is not confident,
//! the worker corrects it after the fetch via [`reconcile`], using the
//! server's `Content-Type` and, failing that, a filename hint from
//! `Content-Disposition`. The two-phase split avoids a network round trip
//! purely to name a file, while still producing conventionally-named output.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Extension assigned when the URL gives no recognizable hint
pub const PLACEHOLDER_EXTENSION: &str = "jpg";

/// Canonical raster-image extensions this pipeline trusts from a URL alone
pub const CANONICAL_EXTENSIONS: &[&str] = &["jpg", "png", "gif", "bmp", "webp", "tif"];

/// A provisional download target derived from a URL
///
/// `path` is `output_dir/{content_hash}.{extension}`. When
/// `extension_confident` is false the extension is [`PLACEHOLDER_EXTENSION`]
/// and the worker must attempt reconciliation against server response
/// metadata before treating the path as final.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Hex digest of the cleaned URL, stable across runs and processes
    pub content_hash: String,
    /// Provisional (or trusted) file extension, canonical short form
    pub extension: String,
    /// Whether the extension is trusted from the URL alone
    pub extension_confident: bool,
    /// Full provisional path under the shard's output directory
    pub path: PathBuf,
}

impl ResolvedTarget {
    /// The same target under a different extension (used when committing a
    /// reconciled extension after download)
    pub fn with_extension(&self, extension: &str) -> PathBuf {
        self.path.with_extension(extension)
    }
}

/// Resolve a URL to its provisional download target.
///
/// The URL is cleaned of query-string and fragment-like suffixes before
/// hashing, so two URLs differing only in tracking parameters map to the
/// same content hash. That collapse is deliberate de-duplication.
pub fn resolve(url: &str, output_dir: &Path) -> ResolvedTarget {
    let cleaned = clean_url(url);
    let content_hash = content_hash(cleaned);
    let (extension, extension_confident) = guess_extension(cleaned);
    let path = output_dir.join(format!("{content_hash}.{extension}"));
    ResolvedTarget {
        content_hash,
        extension,
        extension_confident,
        path,
    }
}

/// Strip the query string and fragment-like trailing segments from a URL.
///
/// Truncates at the first of `?`, `&`, or `;`.
pub fn clean_url(url: &str) -> &str {
    match url.find(['?', '&', ';']) {
        Some(idx) => &url[..idx],
        None => url,
    }
}

/// Hex SHA-256 digest of a cleaned URL, used as the filename stem
pub fn content_hash(cleaned_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(cleaned_url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Map a raw extension onto its canonical short form, if it names a known
/// raster image type. Case-insensitive; a leading dot is tolerated.
pub fn canonical_extension(raw: &str) -> Option<&'static str> {
    let normalized = raw.trim().trim_start_matches('.').to_ascii_lowercase();
    match normalized.as_str() {
        "jpg" | "jpeg" => Some("jpg"),
        "png" => Some("png"),
        "gif" => Some("gif"),
        "bmp" => Some("bmp"),
        "webp" => Some("webp"),
        "tif" | "tiff" => Some("tif"),
        _ => None,
    }
}

/// Guess an extension from the cleaned URL's final path segment
fn guess_extension(cleaned_url: &str) -> (String, bool) {
    let last_segment = cleaned_url.rsplit('/').next().unwrap_or("");
    let raw = last_segment.rsplit_once('.').map(|(_, ext)| ext);
    match raw.and_then(canonical_extension) {
        Some(ext) => (ext.to_string(), true),
        None => (PLACEHOLDER_EXTENSION.to_string(), false),
    }
}

/// All paths a previous run could have stored this content under.
///
/// When the extension guess is not confident, a prior run may have
/// reconciled the same content onto any allow-listed extension; the worker
/// probes these before downloading again.
pub fn candidate_paths(output_dir: &Path, content_hash: &str) -> Vec<PathBuf> {
    CANONICAL_EXTENSIONS
        .iter()
        .map(|ext| output_dir.join(format!("{content_hash}.{ext}")))
        .collect()
}

/// Derive a confident extension from server response metadata.
///
/// Prefers the declared `Content-Type`; falls back to the extension of a
/// filename hint (from `Content-Disposition`). Returns `None` when neither
/// names a known raster image type.
pub fn reconcile(content_type: Option<&str>, filename_hint: Option<&str>) -> Option<&'static str> {
    if let Some(ct) = content_type
        && let Some(ext) = extension_from_content_type(ct)
    {
        return Some(ext);
    }
    filename_hint
        .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext))
        .and_then(canonical_extension)
}

/// Map a `Content-Type` header value onto a canonical extension
pub fn extension_from_content_type(value: &str) -> Option<&'static str> {
    // Parameters like "; charset=..." are not part of the media type
    let media_type = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match media_type.as_str() {
        "image/jpeg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/bmp" | "image/x-ms-bmp" => Some("bmp"),
        "image/webp" => Some("webp"),
        "image/tiff" => Some("tif"),
        _ => None,
    }
}

/// Extract a filename from a `Content-Disposition` header value.
///
/// Handles both the plain form (`attachment; filename="photo.png"`) and the
/// RFC 5987 encoded form (`filename*=UTF-8''photo%20one.png`).
pub fn filename_from_content_disposition(value: &str) -> Option<String> {
    for part in value.split(';') {
        let part = part.trim();
        if let Some(name) = part.strip_prefix("filename=") {
            let name = name.trim_matches('"');
            if !name.is_empty() {
                return Some(name.to_string());
            }
        } else if let Some(encoded) = part.strip_prefix("filename*=") {
            // Format is: charset'lang'encoded-filename
            if let Some(idx) = encoded.rfind('\'')
                && let Ok(decoded) = urlencoding::decode(&encoded[idx + 1..])
                && !decoded.is_empty()
            {
                return Some(decoded.into_owned());
            }
        }
    }
    None
}
