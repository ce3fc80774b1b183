// apkd-net/src/releases.rs
//! Asset lists of GitHub and GitLab release API responses.
use std::time::Duration;

use apkd_common::error::ResolutionError;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::http::get_json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseHost {
    GitHub,
    GitLab,
}

/// One downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub name: String,
    pub download_url: String,
}

#[derive(Deserialize)]
struct GitHubRelease {
    #[serde(default)]
    assets: Vec<GitHubAsset>,
}

#[derive(Deserialize)]
struct GitHubAsset {
    #[serde(default)]
    name: String,
    #[serde(default)]
    browser_download_url: Option<String>,
}

#[derive(Deserialize)]
struct GitLabRelease {
    #[serde(default)]
    assets: GitLabAssets,
}

#[derive(Deserialize, Default)]
struct GitLabAssets {
    #[serde(default, alias = "assets")]
    links: Vec<GitLabLink>,
}

#[derive(Deserialize)]
struct GitLabLink {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    direct_asset_url: Option<String>,
}

/// Extracts the assets in the order the API listed them. Entries without a
/// download URL are dropped.
pub fn parse_release_assets(
    host: ReleaseHost,
    body: Value,
) -> Result<Vec<ReleaseAsset>, ResolutionError> {
    let malformed =
        |e: serde_json::Error| ResolutionError::ApiUnavailable(format!("unexpected release JSON: {e}"));
    let assets = match host {
        ReleaseHost::GitHub => serde_json::from_value::<GitHubRelease>(body)
            .map_err(malformed)?
            .assets
            .into_iter()
            .filter_map(|a| {
                a.browser_download_url.map(|url| ReleaseAsset {
                    name: a.name,
                    download_url: url,
                })
            })
            .collect(),
        ReleaseHost::GitLab => serde_json::from_value::<GitLabRelease>(body)
            .map_err(malformed)?
            .assets
            .links
            .into_iter()
            .filter_map(|l| {
                l.url.or(l.direct_asset_url).map(|url| ReleaseAsset {
                    name: l.name,
                    download_url: url,
                })
            })
            .collect(),
    };
    Ok(assets)
}

/// GETs a releases endpoint and returns its assets.
pub async fn fetch_release_assets(
    client: &Client,
    host: ReleaseHost,
    endpoint: &str,
    timeout: Duration,
) -> Result<Vec<ReleaseAsset>, ResolutionError> {
    let body = get_json(client, endpoint, timeout).await?;
    let assets = parse_release_assets(host, body)?;
    debug!("{:?} release at {} lists {} assets", host, endpoint, assets.len());
    Ok(assets)
}
