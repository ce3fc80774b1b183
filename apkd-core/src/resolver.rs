// apkd-core/src/resolver.rs
//! Turns a source descriptor into a concrete download URL.
//!
//! `Custom` descriptors run their locator through the shell. The catalog is
//! operator-controlled and that is the only trust boundary: nothing received
//! from the network ever reaches this path.
use std::time::Duration;

use apkd_aio::run_shell_async;
use apkd_common::error::ResolutionError;
use apkd_common::{Config, SourceDescriptor, SourceMethod};
use apkd_net::{fetch_release_assets, validate_url, ReleaseHost};
use regex::Regex;
use reqwest::Client;
use tracing::{debug, warn};

const LOG_OUTPUT_LIMIT: usize = 300;

#[derive(Debug, Clone)]
pub struct SourceResolver {
    client: Client,
    api_timeout: Duration,
    command_timeout: Duration,
}

impl SourceResolver {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            api_timeout: config.api_timeout,
            command_timeout: config.command_timeout,
        }
    }

    pub async fn resolve(&self, descriptor: &SourceDescriptor) -> Result<String, ResolutionError> {
        debug!(
            "Resolving {} source '{}'",
            descriptor.method, descriptor.locator
        );
        let url = match descriptor.method {
            SourceMethod::Direct => {
                let locator = descriptor.locator.trim();
                validate_url(locator)?;
                locator.to_string()
            }
            SourceMethod::GithubRelease => {
                self.resolve_release(ReleaseHost::GitHub, descriptor).await?
            }
            SourceMethod::GitlabRelease => {
                self.resolve_release(ReleaseHost::GitLab, descriptor).await?
            }
            SourceMethod::Custom => self.resolve_custom(&descriptor.locator).await?,
        };
        debug!("Resolved {} source to {}", descriptor.method, url);
        Ok(url)
    }

    async fn resolve_release(
        &self,
        host: ReleaseHost,
        descriptor: &SourceDescriptor,
    ) -> Result<String, ResolutionError> {
        // Filter problems are reported before any network traffic.
        let filter = descriptor.required_filter()?;
        let pattern = Regex::new(filter)
            .map_err(|e| ResolutionError::InvalidFilter(filter.to_string(), e.to_string()))?;

        let assets =
            fetch_release_assets(&self.client, host, descriptor.locator.trim(), self.api_timeout)
                .await?;
        assets
            .into_iter()
            .find(|asset| pattern.is_match(&asset.name))
            .map(|asset| {
                debug!("Selected release asset '{}'", asset.name);
                asset.download_url
            })
            .ok_or_else(|| ResolutionError::NoMatchingAsset(filter.to_string()))
    }

    async fn resolve_custom(&self, command: &str) -> Result<String, ResolutionError> {
        let output = run_shell_async(command, self.command_timeout)
            .await
            .map_err(|e| ResolutionError::CustomCommandFailed(e.to_string()))?;

        if !output.success() {
            warn!(
                "Custom source command exited with {:?}: {}",
                output.exit_code,
                truncate(output.stderr.trim(), LOG_OUTPUT_LIMIT)
            );
            return Err(ResolutionError::CustomCommandFailed(match output.exit_code {
                Some(code) => format!("exit status {code}"),
                None => "terminated by signal".to_string(),
            }));
        }

        let first_line = output.stdout.trim().lines().next().unwrap_or_default().trim();
        if first_line.is_empty() {
            return Err(ResolutionError::CustomCommandFailed(
                "command printed nothing".to_string(),
            ));
        }
        validate_url(first_line).map_err(|_| {
            ResolutionError::CustomCommandFailed(format!(
                "output is not an http(s) URL: {}",
                truncate(first_line, LOG_OUTPUT_LIMIT)
            ))
        })?;
        Ok(first_line.to_string())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
