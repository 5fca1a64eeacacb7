//! Blocking HTTP client for the competition results server.
//!
//! Endpoints:
//! - `GET /api/v1/events` - event list
//! - `GET /api/v1/events/{id}` - event detail with roster and rules
//! - `POST /api/v1/results` - submit a [`ResultPayload`], success is HTTP 200

use std::time::Duration;

use tracing::debug;
use ureq::Agent;

use crate::results::{Event, ResultPayload};

/// Overall timeout for one request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for results server operations.
#[derive(Debug, thiserror::Error)]
pub enum ResultsError {
    /// Transport level failure (DNS, connect, timeout, reset)
    #[error("HTTP error: {0}")]
    Http(String),
    /// Server answered with something other than 200
    #[error("Server returned status {0}")]
    Status(u16),
    /// Body could not be encoded or decoded
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<ureq::Error> for ResultsError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => ResultsError::Status(code),
            other => ResultsError::Http(other.to_string()),
        }
    }
}

/// Client for one results server.
#[derive(Clone)]
pub struct ResultsClient {
    base_url: String,
    agent: Agent,
}

impl ResultsClient {
    /// Create a client for `host:port` (plain HTTP).
    pub fn new(server_address: &str) -> Self {
        let base_url = if server_address.starts_with("http://") || server_address.starts_with("https://") {
            server_address.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", server_address.trim_end_matches('/'))
        };

        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .into();

        Self { base_url, agent }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List the events available on the server.
    pub fn fetch_events(&self) -> Result<Vec<Event>, ResultsError> {
        self.get_json("/api/v1/events")
    }

    /// Fetch one event with its roster and rules.
    pub fn fetch_event(&self, event_id: &str) -> Result<Event, ResultsError> {
        self.get_json(&format!("/api/v1/events/{event_id}"))
    }

    /// Submit an athlete's series.
    pub fn post_result(&self, payload: &ResultPayload) -> Result<(), ResultsError> {
        let url = format!("{}/api/v1/results", self.base_url);
        let response = self.agent.post(&url).send_json(payload)?;

        if response.status() != 200 {
            return Err(ResultsError::Status(response.status().as_u16()));
        }

        debug!("Posted result for bib {} to {}", payload.athlete_bib, self.base_url);
        Ok(())
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ResultsError> {
        let url = format!("{}{}", self.base_url, path);
        let mut response = self.agent.get(&url).call()?;

        if response.status() != 200 {
            return Err(ResultsError::Status(response.status().as_u16()));
        }

        response
            .body_mut()
            .read_json::<T>()
            .map_err(|e| ResultsError::Parse(e.to_string()))
    }
}
