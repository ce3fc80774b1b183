// apkd-net/src/validation.rs
use apkd_common::error::ResolutionError;
use url::Url;

/// Validates a download URL, accepting only the `http` and `https` schemes.
pub fn validate_url(url_str: &str) -> Result<Url, ResolutionError> {
    let url = Url::parse(url_str.trim())
        .map_err(|e| ResolutionError::InvalidUrl(url_str.to_string(), e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ResolutionError::InvalidUrl(
            url_str.to_string(),
            format!("scheme must be http or https, got '{other}'"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https() {
        assert!(validate_url("https://github.com/o/r/releases/download/v1/app.apk").is_ok());
        assert!(validate_url("http://10.0.0.2:8080/app.apk").is_ok());
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        assert!(matches!(
            validate_url("file:///etc/passwd"),
            Err(ResolutionError::InvalidUrl(..))
        ));
        assert!(matches!(
            validate_url("not a url"),
            Err(ResolutionError::InvalidUrl(..))
        ));
    }
}
