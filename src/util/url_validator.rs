use thiserror::Error;
use url::Url;

/// Errors returned by [`validate_base_url`].
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Source paths are appended to the base, so it cannot carry a query or fragment.
    #[error("Base URL must not contain a query or fragment")]
    HasQuery,
}

/// Validate the feed base URL that every source path is appended to.
///
/// Returns the base with any trailing `/` removed so that
/// `base + "/r/rust" + ".rss"` never produces a double slash.
///
/// The base comes from the operator's config file, not from feed content, so
/// loopback and private hosts are allowed (a local mirror or test server).
///
/// # Examples
///
/// ```
/// use feedrelay::util::validate_base_url;
///
/// assert_eq!(validate_base_url("https://www.reddit.com/").unwrap(), "https://www.reddit.com");
/// assert!(validate_base_url("ftp://example.com").is_err());
/// ```
pub fn validate_base_url(url_str: &str) -> Result<String, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.query().is_some() || url.fragment().is_some() {
        return Err(UrlValidationError::HasQuery);
    }

    Ok(url_str.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert!(validate_base_url("https://www.reddit.com").is_ok());
        assert!(validate_base_url("http://127.0.0.1:8080").is_ok());
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        assert_eq!(
            validate_base_url("https://old.reddit.com//").unwrap(),
            "https://old.reddit.com"
        );
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            validate_base_url("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_query_rejected() {
        assert!(matches!(
            validate_base_url("https://www.reddit.com/?limit=5"),
            Err(UrlValidationError::HasQuery)
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            validate_base_url("not a url"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }
}
