use serde::{Deserialize, Deserializer, Serialize};
use serde_with::{DurationSeconds, serde_as};
use std::time::Duration;
use url::Url;

use crate::util::Fields;

/// Status code of the synthetic failure returned when the attempt budget runs out.
pub const TIMEOUT_CODE: &str = "timeout";
/// Status code of the synthetic failure returned when polling is cancelled.
pub const CANCELLED_CODE: &str = "cancelled";

/// A pointer to work the server accepted but has not finished.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHandle {
    /// Absolute status endpoint.
    pub status_url: Url,
    /// Interval the server suggests between status checks.
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<Duration>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobState {
    Processing,
    Succeeded,
    Failed,
}

impl JobState {
    /// Maps a server-reported state onto the three the poller knows.
    /// Anything unrecognized is still in progress.
    pub fn classify(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "succeeded" | "success" | "completed" | "complete" | "done" => JobState::Succeeded,
            "failed" | "error" | "cancelled" | "canceled" | "expired" => JobState::Failed,
            _ => JobState::Processing,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Processing)
    }
}

/// Body of a status check, `{ state, result?, error?, code? }`. The state is read
/// from `state`, then `status`.
#[derive(Debug, Clone, Default)]
pub struct StatusCheckWire {
    pub state: Option<String>,
    pub result: Option<serde_json::Value>,
    pub error: Option<serde_json::Value>,
    pub code: Option<String>,
}

impl<'de> Deserialize<'de> for StatusCheckWire {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = serde_json::Map::deserialize(deserializer)?;
        let fields = Fields::new(&map, "status check");
        Ok(Self {
            state: fields.first(&["state", "status"]),
            result: fields.raw(&["result"]).cloned(),
            error: fields.raw(&["error"]).cloned(),
            code: fields.first(&["code"]),
        })
    }
}

/// Status of a job after one or more checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Number of status checks issued so far.
    pub attempts: u32,
}

impl JobStatus {
    pub fn from_wire(wire: StatusCheckWire, attempts: u32) -> Self {
        let state = wire
            .state
            .as_deref()
            .map(JobState::classify)
            .unwrap_or(JobState::Processing);
        let error = wire.error.map(|e| match e {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
        Self {
            state,
            result: wire.result,
            error,
            code: wire.code,
            attempts,
        }
    }

    pub fn timed_out(attempts: u32) -> Self {
        Self {
            state: JobState::Failed,
            result: None,
            error: Some(format!("Job did not finish after {attempts} status checks")),
            code: Some(TIMEOUT_CODE.to_string()),
            attempts,
        }
    }

    pub fn cancelled(attempts: u32) -> Self {
        Self {
            state: JobState::Failed,
            result: None,
            error: Some("Polling cancelled".to_string()),
            code: Some(CANCELLED_CODE.to_string()),
            attempts,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_timeout(&self) -> bool {
        self.code.as_deref() == Some(TIMEOUT_CODE)
    }
}
