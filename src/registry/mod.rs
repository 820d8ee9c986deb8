//! Registry collaborator: fetch licence metadata from upstream package registries.
//!
//! [`RegistryClient`] performs one idempotent GET per call and reports
//! "not found" as a value, not an error. Each [`Source`] knows how to render
//! the URL for a library of its ecosystem and how to read the licence out of
//! the payload it gets back.

pub mod crates_io;
pub mod maven;
pub mod npm;
pub mod pypi;

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};

use crate::config::RegistryConfig;
use crate::models::{Library, LibraryType};

/// Outcome of a successful round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryResponse {
    NotFound,
    Found(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("could not build HTTP client: {0}")]
    Client(String),
}

#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<RegistryResponse, RegistryError>;
}

/// `reqwest` backed client; every request carries the configured timeout.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    client: Client,
}

impl HttpRegistry {
    pub fn new(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| RegistryError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RegistryClient for HttpRegistry {
    async fn get(&self, url: &str) -> Result<RegistryResponse, RegistryError> {
        let transport = |e: reqwest::Error| {
            if e.is_timeout() {
                RegistryError::Timeout {
                    url: url.to_string(),
                }
            } else {
                RegistryError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        };

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json, application/xml;q=0.9, */*;q=0.8")
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        debug!("GET {url} -> {status}");
        if status == StatusCode::NOT_FOUND {
            return Ok(RegistryResponse::NotFound);
        }
        if !status.is_success() {
            return Err(RegistryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await.map_err(transport)?;
        Ok(RegistryResponse::Found(body))
    }
}

/// Knowledge about one registry: URL layout and payload format.
pub trait Source: Send + Sync {
    /// Base URL, used in log messages.
    fn base_url(&self) -> &str;

    fn library_type(&self) -> LibraryType;

    /// Lookup URL for `library`; `None` when its coordinates cannot be expressed.
    fn url(&self, library: &Library) -> Option<String>;

    /// Licence declared in `payload`; `Ok(None)` when the payload names none.
    ///
    /// `Err` means the payload could not be read at all.
    fn extract_license(&self, payload: &str) -> Result<Option<String>, String>;
}

/// Join a base URL and a path without doubling the separator.
pub(crate) fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_handles_trailing_slashes() {
        assert_eq!(join("https://registry.npmjs.org/", "/left-pad/1.3.0"), "https://registry.npmjs.org/left-pad/1.3.0");
        assert_eq!(join("https://pypi.org", "pypi/requests/json"), "https://pypi.org/pypi/requests/json");
    }
}
