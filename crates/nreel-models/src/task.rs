//! Asynchronous video-generation task tracking.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::SceneId;

/// Provider-assigned identifier of an in-flight video job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(pub String);

impl TaskHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status string reported by the provider for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderTaskStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl ProviderTaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderTaskStatus::Queued => "queued",
            ProviderTaskStatus::Running => "running",
            ProviderTaskStatus::Succeeded => "succeeded",
            ProviderTaskStatus::Failed => "failed",
            ProviderTaskStatus::Cancelled => "cancelled",
            ProviderTaskStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProviderTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local lifecycle of a video task.
///
/// `Submitted -> Polling -> {Succeeded, Failed, Cancelled, TimedOut}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    #[default]
    Submitted,
    Polling,
    Succeeded,
    Failed,
    Cancelled,
    TimedOut,
}

impl TaskPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskPhase::Succeeded | TaskPhase::Failed | TaskPhase::Cancelled | TaskPhase::TimedOut
        )
    }
}

/// One video-generation job, tracked for the duration of a single call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoTask {
    pub handle: TaskHandle,
    pub scene_id: SceneId,
    pub phase: TaskPhase,
    /// Number of status queries issued
    pub polls: u32,
    pub result_url: Option<String>,
    pub failure: Option<String>,
}

impl VideoTask {
    pub fn new(handle: TaskHandle, scene_id: SceneId) -> Self {
        Self {
            handle,
            scene_id,
            phase: TaskPhase::Submitted,
            polls: 0,
            result_url: None,
            failure: None,
        }
    }

    /// Record one status query.
    pub fn record_poll(&mut self) {
        self.polls += 1;
        if !self.phase.is_terminal() {
            self.phase = TaskPhase::Polling;
        }
    }

    pub fn succeed(&mut self, url: impl Into<String>) {
        self.phase = TaskPhase::Succeeded;
        self.result_url = Some(url.into());
    }

    /// Mark the task as failed or cancelled by the provider.
    pub fn fail(&mut self, status: ProviderTaskStatus, message: impl Into<String>) {
        self.phase = if status == ProviderTaskStatus::Cancelled {
            TaskPhase::Cancelled
        } else {
            TaskPhase::Failed
        };
        self.failure = Some(message.into());
    }

    pub fn time_out(&mut self) {
        self.phase = TaskPhase::TimedOut;
    }
}
