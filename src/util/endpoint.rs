use thiserror::Error;
use url::Url;

/// Longest video id we accept from user input.
const MAX_VIDEO_ID_LEN: usize = 64;

/// Errors from endpoint and identifier validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain http pointed at a non-local host.
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
    /// Video id is empty, too long, or contains characters outside `[A-Za-z0-9_-]`.
    #[error("Invalid video id: {0:?}")]
    InvalidVideoId(String),
}

/// Validate the metadata-service root URL.
///
/// The API key travels as a query parameter, so the root must be https.
/// Plain http is accepted only for `localhost` / `127.0.0.1` (mock servers).
pub fn validate_base_url(raw: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(raw.trim())?;

    match url.scheme() {
        "https" => Ok(url),
        "http" => {
            let local = matches!(url.host_str(), Some("localhost") | Some("127.0.0.1"));
            if local {
                tracing::warn!(base_url = %url, "Using non-HTTPS base URL (localhost only)");
                Ok(url)
            } else {
                tracing::error!(base_url = %url, "Rejecting non-HTTPS base URL");
                Err(UrlValidationError::InsecureBaseUrl)
            }
        }
        scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
}

/// Check that a user-supplied video id is safe to place in a query or URL.
pub fn validate_video_id(id: &str) -> Result<&str, UrlValidationError> {
    let id = id.trim();
    let well_formed = !id.is_empty()
        && id.len() <= MAX_VIDEO_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if well_formed {
        Ok(id)
    } else {
        Err(UrlValidationError::InvalidVideoId(id.to_string()))
    }
}
