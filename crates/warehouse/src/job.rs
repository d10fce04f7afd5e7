use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a submitted query job.
///
/// The service owns the transitions; callers only read a projection of the
/// current state. `Done` is the single terminal state; a failed job is
/// `Done` with an error payload attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    Pending,
    Running,
    Done,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Done => "DONE",
        };
        f.write_str(s)
    }
}

/// Error payload reported by the service for a failed job.
///
/// Surfaced to callers verbatim via [`crate::WarehouseError::JobFailed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    /// Machine-readable failure reason (e.g. "invalidQuery").
    pub reason: String,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(&self.reason)
        } else {
            write!(f, "{}: {}", self.reason, self.message)
        }
    }
}

/// Status projection returned by a single job-state check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub state: JobState,
    /// Present only when the terminal state carries a failure.
    pub error: Option<JobError>,
}

impl JobStatus {
    pub fn is_done(&self) -> bool {
        self.state == JobState::Done
    }
}

/// Handle to a submitted asynchronous query job.
///
/// The identifier is client-generated and must be unique per submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: String,
}

/// Handle to a query's result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultHandle {
    pub id: String,
}

impl From<JobHandle> for ResultHandle {
    /// Results of a completed job are fetched under the job's identifier.
    fn from(job: JobHandle) -> Self {
        Self { id: job.id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_state_serde_wire_form() {
        assert_eq!(serde_json::to_string(&JobState::Pending).unwrap(), "\"PENDING\"");
        let state: JobState = serde_json::from_str("\"DONE\"").unwrap();
        assert_eq!(state, JobState::Done);
    }

    #[test]
    fn job_error_display() {
        let err = JobError {
            reason: "invalidQuery".into(),
            message: "Syntax error at [1:8]".into(),
        };
        assert_eq!(err.to_string(), "invalidQuery: Syntax error at [1:8]");

        let bare = JobError {
            reason: "internalError".into(),
            message: String::new(),
        };
        assert_eq!(bare.to_string(), "internalError");
    }

    #[test]
    fn result_handle_from_job() {
        let job = JobHandle { id: "abc-123".into() };
        let results = ResultHandle::from(job);
        assert_eq!(results.id, "abc-123");
    }
}
