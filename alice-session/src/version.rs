//! Client version lookup.
//!
//! The gateway expects the version string of the current web client. It is
//! published in the landing page bundle as `"production",version:"..."`.

use std::sync::LazyLock;
use std::time::Duration;

use alice_common::config::ClientConfig;
use regex::Regex;

use crate::error::{SessionError, SessionResult};

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""production",version:"([^"\s]+)""#).expect("version pattern is valid")
});

/// Fetch the landing page. A non-success status yields an empty document.
pub async fn fetch_version_source(url: &str, timeout: Duration) -> SessionResult<String> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SessionError::Transport(format!("Failed to build HTTP client: {e}")))?;

    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| SessionError::Transport(format!("Failed to fetch {url}: {e}")))?;

    if !resp.status().is_success() {
        tracing::debug!(status = %resp.status(), "Version source returned non-success status");
        return Ok(String::new());
    }

    resp.text()
        .await
        .map_err(|e| SessionError::Transport(format!("Failed to read {url}: {e}")))
}

/// Pull the production client version out of a landing page.
pub fn extract_version(document: &str) -> Option<String> {
    VERSION_PATTERN
        .captures(document)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|v| !v.trim().is_empty())
}

/// Resolve the version to announce, falling back to the configured one.
pub async fn resolve_client_version(config: &ClientConfig) -> String {
    if !config.resolve_version {
        return config.app_version.clone();
    }

    let document =
        match fetch_version_source(&config.version_source_url, config.version_fetch_timeout()).await {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(error = %e, fallback = %config.app_version, "Version lookup failed");
                return config.app_version.clone();
            }
        };

    match extract_version(&document) {
        Some(version) => {
            tracing::info!(version = %version, "Resolved client version");
            version
        }
        None => {
            tracing::warn!(fallback = %config.app_version, "Client version not found on landing page");
            config.app_version.clone()
        }
    }
}
