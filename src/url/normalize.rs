use crate::url::{UrlError, UrlResult};
use url::Url;

/// Normalizes a source base URL for registry lookups
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only http and https schemes
/// 3. Lowercase the host (the url crate already does this for special schemes)
/// 4. Drop query and fragment
/// 5. Ensure the path ends with a slash
///
/// Unlike page URLs, base URLs keep their `www.` prefix and scheme: sites
/// registered under several hosts are registered once per host.
///
/// # Examples
///
/// ```
/// use novel_harvest::url::normalize_base_url;
///
/// let url = normalize_base_url("https://Novels.Example.com/series").unwrap();
/// assert_eq!(url, "https://novels.example.com/series/");
/// ```
pub fn normalize_base_url(url_str: &str) -> UrlResult<String> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    url.set_query(None);
    url.set_fragment(None);

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url.to_string())
}
