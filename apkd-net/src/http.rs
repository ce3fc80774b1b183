use std::path::Path;
use std::time::Duration;

use apkd_common::error::{ApkdError, FetchError, ResolutionError, Result};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};

const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str = "apkd (Rust; APK catalog updater)";

/// Builds the shared client. `timeout` bounds a whole request, including
/// reading the body; API calls tighten it per request.
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| ApkdError::Generic(format!("Failed to build HTTP client: {e}")))
}

/// GETs `url` and parses the body as JSON. Every failure, including an
/// empty body, is reported as `ApiUnavailable`.
pub async fn get_json(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> std::result::Result<Value, ResolutionError> {
    debug!("Fetching JSON from {}", url);
    let response = client
        .get(url)
        .timeout(timeout)
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| {
            debug!("HTTP request failed for {url}: {e}");
            ResolutionError::ApiUnavailable(format!("request to {url} failed: {e}"))
        })?;

    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, url);
    if !status.is_success() {
        return Err(ResolutionError::ApiUnavailable(format!(
            "HTTP {status} from {url}"
        )));
    }

    let body = response.bytes().await.map_err(|e| {
        ResolutionError::ApiUnavailable(format!("failed to read body from {url}: {e}"))
    })?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ResolutionError::ApiUnavailable(format!(
            "empty response from {url}"
        )));
    }
    serde_json::from_slice(&body).map_err(|e| {
        ResolutionError::ApiUnavailable(format!("unparsable response from {url}: {e}"))
    })
}

/// Streams `url` into `dest` (created or truncated). A zero-length body is
/// `FetchError::Empty`; transport or HTTP failures are
/// `FetchError::Unreachable`.
pub async fn download_to_file(client: &Client, url: &str, dest: &Path) -> Result<u64> {
    download_to_file_as(client, url, url, dest).await
}

/// Same as [`download_to_file`], but logs and errors name the download by
/// `label` instead of its URL. For URLs that embed credentials.
pub async fn download_to_file_as(
    client: &Client,
    url: &str,
    label: &str,
    dest: &Path,
) -> Result<u64> {
    debug!("Downloading {} to {}", label, dest.display());
    let response = client.get(url).send().await.map_err(|e| {
        let e = e.without_url();
        debug!("HTTP request failed for {label}: {e}");
        FetchError::Unreachable(label.to_string(), e.to_string())
    })?;

    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, label);
    if !status.is_success() {
        error!("HTTP error {} for {}", status, label);
        return Err(FetchError::Unreachable(label.to_string(), format!("HTTP {status}")).into());
    }

    let mut file = TokioFile::create(dest).await.map_err(|e| {
        ApkdError::IoError(format!(
            "Failed to create staged file {}: {}",
            dest.display(),
            e
        ))
    })?;

    let mut total: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            FetchError::Unreachable(label.to_string(), e.without_url().to_string())
        })?;
        file.write_all(&chunk).await.map_err(|e| {
            ApkdError::IoError(format!(
                "Failed to write download stream to {}: {}",
                dest.display(),
                e
            ))
        })?;
        total += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    if total == 0 {
        return Err(FetchError::Empty(label.to_string()).into());
    }
    debug!("Finished download of {} bytes from {}", total, label);
    Ok(total)
}
