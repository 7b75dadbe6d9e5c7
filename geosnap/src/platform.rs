//! Imagery platform client - scene queries and export tasks.
//!
//! The [`ImageryPlatform`] trait is the seam between the pipeline and the
//! remote processing service: a scene-availability summary, export
//! submission, and task polling. [`RestPlatformClient`] speaks the REST
//! contract; tests substitute scripted implementations.
//!
//! Authentication is an opaque bearer token supplied through
//! [`TokenProvider`]; acquiring the token (service accounts, OAuth) is the
//! caller's problem.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::imagery::{ImageStack, RegionOfInterest, SceneQuery};

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Errors raised by platform requests.
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    /// The HTTP request failed or returned a non-success status.
    #[error("platform request failed: {0}")]
    Http(String),

    /// The response body could not be interpreted.
    #[error("unexpected platform response: {0}")]
    Parse(String),

    /// No bearer token could be produced.
    #[error("platform authentication failed: {0}")]
    Auth(String),
}

/// Supplies the bearer token attached to every platform and storage
/// request.
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> Result<String, PlatformError>;
}

/// Token provider wrapping a token resolved once at startup.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> Result<String, PlatformError> {
        if self.0.is_empty() {
            return Err(PlatformError::Auth("empty bearer token".to_string()));
        }
        Ok(self.0.clone())
    }
}

/// Remote export task state.
///
/// `Pending` and `Running` are the only non-terminal states. Any wire
/// value other than the four known ones is carried through as `Other` and
/// treated as a failure terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
    Other(String),
}

impl TaskState {
    /// Map a wire value onto a state. Matching is case-sensitive on the
    /// upper-case contract values.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "PENDING" => TaskState::Pending,
            "RUNNING" => TaskState::Running,
            "COMPLETED" => TaskState::Completed,
            "FAILED" => TaskState::Failed,
            other => TaskState::Other(other.to_string()),
        }
    }

    /// True once no further transition will occur.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Pending | TaskState::Running)
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Running => "RUNNING",
            TaskState::Completed => "COMPLETED",
            TaskState::Failed => "FAILED",
            TaskState::Other(s) => s,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the platform needs to produce and store the composite.
#[derive(Debug, Clone, Serialize)]
pub struct ExportRequest {
    pub description: String,
    pub folder: String,
    pub output_name: String,
    pub stack: ImageStack,
    pub region: RegionOfInterest,
    pub scale_m: u32,
    pub max_pixels: u64,
}

/// Availability summary for a scene query: how many scenes qualify and
/// the earliest acquisition time (Unix milliseconds) among them.
/// `earliest_ms` is meaningless when `count` is zero.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SceneSummary {
    pub count: u64,
    #[serde(default)]
    pub earliest_ms: i64,
}

/// Point-in-time task status.
#[derive(Debug, Clone)]
pub struct TaskStatus {
    pub state: TaskState,
    pub detail: Option<String>,
}

/// The remote imagery platform: scene availability, export submission,
/// task polling.
pub trait ImageryPlatform: Send + Sync {
    /// Summarize the scenes matching a query.
    fn scene_summary(&self, query: &SceneQuery) -> Result<SceneSummary, PlatformError>;

    /// Submit an export; returns the task id. The task starts PENDING.
    fn submit_export(&self, request: &ExportRequest) -> Result<String, PlatformError>;

    /// Query the current state of a submitted task.
    fn task_status(&self, task_id: &str) -> Result<TaskStatus, PlatformError>;
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    state: String,
    #[serde(default)]
    detail: Option<String>,
}

/// REST client for the platform contract.
pub struct RestPlatformClient {
    client: reqwest::blocking::Client,
    base_url: String,
    token: Arc<dyn TokenProvider>,
}

impl RestPlatformClient {
    pub fn new(base_url: &str, token: Arc<dyn TokenProvider>) -> Result<Self, PlatformError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| PlatformError::Http(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn check_status(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, PlatformError> {
        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::Http(format!(
                "HTTP {} from {}",
                status,
                response.url()
            )));
        }
        Ok(response)
    }
}

/// Percent-encode a collection id for use as a single path segment.
/// Collection ids contain slashes ("COPERNICUS/S2_SR").
fn encode_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

impl ImageryPlatform for RestPlatformClient {
    fn scene_summary(&self, query: &SceneQuery) -> Result<SceneSummary, PlatformError> {
        let url = format!(
            "{}/collections/{}/scenes:summary",
            self.base_url,
            encode_segment(&query.collection)
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.token.bearer_token()?)
            .query(&[
                ("lat", query.roi.center_lat.to_string()),
                ("lon", query.roi.center_lon.to_string()),
                ("radius_m", query.roi.radius_m.to_string()),
                ("start", query.start_date.clone()),
                ("end", query.end_date.clone()),
                ("max_cloud_pct", query.max_cloud_pct.to_string()),
            ])
            .send()
            .map_err(|e| PlatformError::Http(e.to_string()))?;

        Self::check_status(response)?
            .json::<SceneSummary>()
            .map_err(|e| PlatformError::Parse(e.to_string()))
    }

    fn submit_export(&self, request: &ExportRequest) -> Result<String, PlatformError> {
        let url = format!("{}/exports", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.token.bearer_token()?)
            .json(request)
            .send()
            .map_err(|e| PlatformError::Http(e.to_string()))?;

        Self::check_status(response)?
            .json::<SubmitResponse>()
            .map(|r| r.task_id)
            .map_err(|e| PlatformError::Parse(e.to_string()))
    }

    fn task_status(&self, task_id: &str) -> Result<TaskStatus, PlatformError> {
        let url = format!("{}/exports/{}", self.base_url, encode_segment(task_id));
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.token.bearer_token()?)
            .send()
            .map_err(|e| PlatformError::Http(e.to_string()))?;

        let parsed: StatusResponse = Self::check_status(response)?
            .json()
            .map_err(|e| PlatformError::Parse(e.to_string()))?;

        Ok(TaskStatus {
            state: TaskState::from_wire(&parsed.state),
            detail: parsed.detail,
        })
    }
}
