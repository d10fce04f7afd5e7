//! Warehouse collaborator interface.
//!
//! [`Warehouse`] is the seam between the local protocol logic and the remote
//! service: one submission call per query, repeated status checks for the
//! asynchronous path, and token-based page fetches. [`RestWarehouse`] is the
//! wire implementation; [`MockWarehouse`] scripts the collaborator for tests.
//!
//! [`RestWarehouse`]: crate::rest::RestWarehouse
//! [`MockWarehouse`]: crate::mock::MockWarehouse

use async_trait::async_trait;

use crate::job::{JobError, JobHandle, JobStatus, ResultHandle};
use crate::param::QueryParameter;
use crate::result::ResultPage;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors surfaced by warehouse operations.
///
/// All of these are fatal to the invocation; there is no local recovery and
/// nothing is retried. The only loop in the system is the unconditional
/// job-completion poll, which is readiness checking, not error recovery.
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    /// Placeholders and bindings disagree (mixed styles, count or name
    /// mismatch). Detected locally, before any request is issued.
    #[error("invalid parameter style: {0}")]
    InvalidParameterStyle(String),

    /// The service rejected the request at submission time.
    #[error("query rejected at submission: {0}")]
    Submission(String),

    /// The job reached its terminal state carrying an error payload.
    #[error("job {job_id} failed: {error}")]
    JobFailed { job_id: String, error: JobError },

    /// A configured poll deadline elapsed before the job completed.
    /// Never raised unless a deadline was explicitly set.
    #[error("job {job_id} did not complete within {seconds}s")]
    DeadlineExceeded { job_id: String, seconds: u64 },

    /// Network or service-availability failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service responded with something we could not decode.
    #[error("malformed service response: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// The external warehouse service, as consumed by this crate.
///
/// Implementations are expected to be cheap to share behind an `Arc`; the
/// runner holds exactly one handle per invocation.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Submit an asynchronous query job under a caller-generated unique id.
    async fn submit_query_job(
        &self,
        job_id: &str,
        sql: &str,
        params: &[QueryParameter],
        use_standard_sql: bool,
    ) -> Result<JobHandle, WarehouseError>;

    /// Read the job's current state and, when terminal, its error payload.
    async fn job_state(&self, handle: &JobHandle) -> Result<JobStatus, WarehouseError>;

    /// Submit a synchronous query. The service blocks internally until the
    /// result is ready; there is no separate job entity on this path.
    async fn submit_sync_query(
        &self,
        sql: &str,
        params: &[QueryParameter],
        use_standard_sql: bool,
    ) -> Result<ResultHandle, WarehouseError>;

    /// Fetch one result page. `page_token` is the continuation token from
    /// the previous page, absent for the first fetch.
    async fn fetch_page(
        &self,
        handle: &ResultHandle,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<ResultPage, WarehouseError>;
}
