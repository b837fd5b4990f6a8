//! HTTP access to a UTubs server.
//!
//! Three read endpoints feed the board:
//!
//! - `GET {server}/utubs`: the selector list
//! - `GET {server}/utubs/{id}`: a full snapshot of one UTub
//! - `GET {server}/utubs/{id}/urls/{url}`: one URL, after an edit
//!
//! Commands go through [`SnapshotSource`] so polling logic can be exercised
//! without a server.

use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use utub_core::ErrorCode;
use utub_core::config::ServerConfig;
use utub_core::model::{UrlId, UrlPayload, UtubId, UtubList, UtubPayload, UtubSummaryPayload};

use crate::output::CliError;

/// A failed request. HTTP failures keep the status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    Status { url: String, status: u16 },
    Transport { url: String, message: String },
    Decode { url: String, message: String },
}

impl FetchError {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Status { status, .. } => ErrorCode::from_http_status(*status),
            Self::Transport { .. } | Self::Decode { .. } => ErrorCode::FetchFailed,
        }
    }

    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn to_cli_error(&self) -> CliError {
        CliError::from_code(self.code(), self.to_string())
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status { url, status } => write!(f, "GET {url} returned HTTP {status}"),
            Self::Transport { url, message } => write!(f, "GET {url} failed: {message}"),
            Self::Decode { url, message } => {
                write!(f, "GET {url} returned an unreadable body: {message}")
            }
        }
    }
}

impl std::error::Error for FetchError {}

/// Where the board's payloads come from.
pub trait SnapshotSource {
    fn utubs(&self) -> Result<Vec<UtubSummaryPayload>, FetchError>;
    fn snapshot(&self, utub: UtubId) -> Result<UtubPayload, FetchError>;
    fn url(&self, utub: UtubId, url: UrlId) -> Result<UrlPayload, FetchError>;
}

pub struct HttpClient {
    base: String,
    agent: ureq::Agent,
    csrf_token: Option<String>,
}

impl HttpClient {
    pub fn new(server: &ServerConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(server.timeout().max(Duration::from_secs(1)))
            .build();
        Self {
            base: server.url.trim_end_matches('/').to_string(),
            agent,
            csrf_token: server.csrf_token.clone(),
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = format!("{}{path}", self.base);
        debug!(%url, "fetching");

        let mut request = self
            .agent
            .get(&url)
            .set("Accept", "application/json")
            .set("User-Agent", "utub-cli");
        if let Some(token) = &self.csrf_token {
            request = request.set("X-CSRFToken", token);
        }

        let response = request.call().map_err(|err| match err {
            ureq::Error::Status(status, _) => FetchError::Status {
                url: url.clone(),
                status,
            },
            ureq::Error::Transport(transport) => FetchError::Transport {
                url: url.clone(),
                message: transport.to_string(),
            },
        })?;

        response.into_json::<T>().map_err(|err| FetchError::Decode {
            url,
            message: err.to_string(),
        })
    }
}

impl SnapshotSource for HttpClient {
    fn utubs(&self) -> Result<Vec<UtubSummaryPayload>, FetchError> {
        self.get_json::<UtubList>("/utubs").map(|list| list.0)
    }

    fn snapshot(&self, utub: UtubId) -> Result<UtubPayload, FetchError> {
        self.get_json(&format!("/utubs/{utub}"))
    }

    fn url(&self, utub: UtubId, url: UrlId) -> Result<UrlPayload, FetchError> {
        self.get_json(&format!("/utubs/{utub}/urls/{url}"))
    }
}
