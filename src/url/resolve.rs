use sha2::{Digest, Sha256};
use url::Url;

/// Returns true for inline `data:` URIs
pub fn is_data_uri(src: &str) -> bool {
    src.trim_start()
        .get(..5)
        .map(|scheme| scheme.eq_ignore_ascii_case("data:"))
        .unwrap_or(false)
}

/// Resolves a resource reference found in a chapter body
///
/// Absolute references are returned as-is, relative references are joined
/// onto the chapter page URL and data URIs pass through untouched.
///
/// # Returns
///
/// * `Some(String)` - The absolute reference
/// * `None` - The reference is empty or cannot be resolved
pub fn resolve_resource_url(src: &str, page_url: &str) -> Option<String> {
    let src = src.trim();

    if src.is_empty() {
        return None;
    }

    if is_data_uri(src) {
        return Some(src.to_string());
    }

    if let Ok(absolute) = Url::parse(src) {
        return match absolute.scheme() {
            "http" | "https" => Some(absolute.to_string()),
            _ => None,
        };
    }

    let base = Url::parse(page_url).ok()?;
    let joined = base.join(src).ok()?;
    match joined.scheme() {
        "http" | "https" => Some(joined.to_string()),
        _ => None,
    }
}

/// Computes the content-address key of a resolved resource reference
///
/// The key is the lowercase hex SHA-256 of the reference, so the same image
/// referenced from several chapters maps to the same local file.
pub fn content_key(resolved: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(resolved.as_bytes());
    hex::encode(hasher.finalize())
}
