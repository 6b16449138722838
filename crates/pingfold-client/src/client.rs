//! HTTP client for the measurement API.
//!
//! Submits ping jobs and polls them to completion. Every call carries a
//! per-request timeout; completion polling is bounded by
//! [`PollBackoff`](crate::poll::PollBackoff) so a job that never leaves
//! the in-progress state surfaces as [`ClientError::Stalled`] instead of
//! polling forever.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{ProbeSelector, RawMeasurement};
use crate::error::{ClientError, ClientResult};
use crate::poll::{PollBackoff, PollConfig};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = concat!("pingfold/", env!("CARGO_PKG_VERSION"));

/// Client for submitting and fetching measurements.
#[derive(Debug, Clone)]
pub struct MeasurementClient {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl MeasurementClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> MeasurementClientBuilder {
        MeasurementClientBuilder::default()
    }

    /// Submit a ping job for `target`. Returns the upstream job id.
    pub async fn submit(
        &self,
        target: &str,
        selector: &ProbeSelector,
        packets: u32,
    ) -> ClientResult<String> {
        let url = format!("{}/measurements", self.endpoint);
        let body = SubmitBody {
            kind: "ping",
            target,
            locations: std::slice::from_ref(selector),
            measurement_options: MeasurementOptions { packets },
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status().as_u16()));
        }

        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        debug!(%target, job_id = %submitted.id, "measurement submitted");
        Ok(submitted.id)
    }

    /// Fetch the current state of a job, terminal or not.
    pub async fn fetch(&self, job_id: &str) -> ClientResult<RawMeasurement> {
        let url = format!("{}/measurements/{}", self.endpoint, job_id);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// Poll a job until it reaches a terminal state or the deadline
    /// passes. A terminal non-finished status is still returned; the
    /// ingest layer filters its sub-results.
    pub async fn wait_terminal(
        &self,
        job_id: &str,
        config: &PollConfig,
    ) -> ClientResult<RawMeasurement> {
        let mut backoff = PollBackoff::new(config);
        loop {
            let raw = self.fetch(job_id).await?;
            if raw.is_terminal() {
                debug!(%job_id, status = %raw.status, "measurement terminal");
                return Ok(raw);
            }
            match backoff.next_delay() {
                Some(delay) => tokio::time::sleep(delay).await,
                None => {
                    return Err(ClientError::Stalled {
                        job_id: job_id.to_string(),
                        waited_secs: backoff.waited().as_secs(),
                    });
                }
            }
        }
    }
}

/// Builder for [`MeasurementClient`].
#[derive(Debug, Default)]
pub struct MeasurementClientBuilder {
    endpoint: String,
    token: Option<String>,
    timeout: Option<Duration>,
}

impl MeasurementClientBuilder {
    /// Base API endpoint, e.g. `https://api.globalping.io/v1`.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Bearer token for authenticated submissions.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Per-HTTP-call timeout (default 15 s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> ClientResult<MeasurementClient> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|e| ClientError::Http(e.to_string()))?;
        Ok(MeasurementClient {
            client,
            endpoint: self.endpoint.trim_end_matches('/').to_string(),
            token: self.token,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    target: &'a str,
    locations: &'a [ProbeSelector],
    measurement_options: MeasurementOptions,
}

#[derive(Serialize)]
struct MeasurementOptions {
    packets: u32,
}

#[derive(Deserialize)]
struct SubmitResponse {
    id: String,
}
