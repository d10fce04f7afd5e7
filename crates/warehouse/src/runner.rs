//! Query execution driver: submit, poll, paginate.
//!
//! [`QueryRunner`] owns one [`Warehouse`] handle per invocation and drives
//! the full lifecycle of a parameterized query. Rows come back through
//! [`QueryRows`], a forward-only cursor that fetches one page at a time, so
//! arbitrarily large result sets never have to fit in memory.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, Stream};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::client::{Warehouse, WarehouseError};
use crate::job::{JobHandle, JobState, ResultHandle};
use crate::param::{validate_bindings, QueryParameter};
use crate::result::Row;

/// How the query is executed by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// The submission call blocks inside the service until the result is
    /// ready. No job entity exists on this path.
    Sync,
    /// Submit a job, then poll its state until it reaches `DONE`.
    Async,
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Drives one query through submission, completion, and pagination.
///
/// The warehouse handle is caller-owned and passed in explicitly; nothing in
/// this crate keeps a global client.
pub struct QueryRunner {
    warehouse: Arc<dyn Warehouse>,
    page_size: u32,
    poll_interval: Duration,
    poll_deadline: Option<Duration>,
}

impl QueryRunner {
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self {
            warehouse,
            page_size: 10,
            poll_interval: Duration::from_secs(1),
            poll_deadline: None,
        }
    }

    /// Build a runner with the tunables from `config`.
    pub fn from_config(warehouse: Arc<dyn Warehouse>, config: &crate::WarehouseConfig) -> Self {
        let mut runner = Self::new(warehouse)
            .with_page_size(config.page_size)
            .with_poll_interval(config.poll_interval());
        if let Some(deadline) = config.poll_deadline() {
            runner = runner.with_poll_deadline(deadline);
        }
        runner
    }

    /// Rows requested per page fetch (default 10).
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Fixed interval between job-status checks (default 1s). There is no
    /// backoff: the poll is a level-triggered readiness check.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Cap total polling time. Off by default: the default behavior is to
    /// poll until the job reaches its terminal state, however long that
    /// takes. Setting a deadline turns a stuck job into
    /// [`WarehouseError::DeadlineExceeded`].
    pub fn with_poll_deadline(mut self, deadline: Duration) -> Self {
        self.poll_deadline = Some(deadline);
        self
    }

    /// Execute `sql` with `params` and return a lazy row cursor.
    ///
    /// Validates the placeholder/binding shape before anything is sent.
    /// For [`ExecutionMode::Async`] this submits a job under a fresh UUID,
    /// polls until `DONE`, and fails with [`WarehouseError::JobFailed`] if
    /// the terminal state carries an error payload, in which case no page
    /// is ever fetched.
    pub async fn run(
        &self,
        sql: &str,
        params: Vec<QueryParameter>,
        mode: ExecutionMode,
    ) -> Result<QueryRows, WarehouseError> {
        validate_bindings(sql, &params)?;

        // Placeholders are only supported by the standard SQL dialect.
        let use_standard_sql = true;

        let handle = match mode {
            ExecutionMode::Sync => {
                self.warehouse
                    .submit_sync_query(sql, &params, use_standard_sql)
                    .await?
            }
            ExecutionMode::Async => {
                let job_id = Uuid::new_v4().to_string();
                let job = self
                    .warehouse
                    .submit_query_job(&job_id, sql, &params, use_standard_sql)
                    .await?;
                info!(job_id = %job.id, "query job submitted, waiting for completion");
                self.wait_for_job(&job).await?;
                ResultHandle::from(job)
            }
        };

        Ok(QueryRows::new(
            Arc::clone(&self.warehouse),
            handle,
            self.page_size,
        ))
    }

    /// Poll the job state at a fixed interval until `DONE`.
    async fn wait_for_job(&self, job: &JobHandle) -> Result<(), WarehouseError> {
        let start = Instant::now();

        loop {
            let status = self.warehouse.job_state(job).await?;
            debug!(
                job_id = %job.id,
                state = %status.state,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "polled job state"
            );

            if status.state == JobState::Done {
                return match status.error {
                    Some(err) => {
                        error!(job_id = %job.id, error = %err, "query job failed");
                        Err(WarehouseError::JobFailed {
                            job_id: job.id.clone(),
                            error: err,
                        })
                    }
                    None => Ok(()),
                };
            }

            if let Some(deadline) = self.poll_deadline {
                if start.elapsed() >= deadline {
                    return Err(WarehouseError::DeadlineExceeded {
                        job_id: job.id.clone(),
                        seconds: deadline.as_secs(),
                    });
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Row cursor
// ---------------------------------------------------------------------------

/// Lazy, single-pass cursor over a query's result rows.
///
/// Holds at most one page of rows locally. Each exhausted buffer triggers
/// one page fetch with the current continuation token; the cursor finishes
/// when a page comes back without a token. Not restartable.
pub struct QueryRows {
    warehouse: Arc<dyn Warehouse>,
    handle: ResultHandle,
    page_size: u32,
    page_token: Option<String>,
    buffered: VecDeque<Row>,
    total_rows: Option<u64>,
    exhausted: bool,
}

impl std::fmt::Debug for QueryRows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRows")
            .field("handle", &self.handle)
            .field("page_size", &self.page_size)
            .field("page_token", &self.page_token)
            .field("buffered", &self.buffered)
            .field("total_rows", &self.total_rows)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl QueryRows {
    fn new(warehouse: Arc<dyn Warehouse>, handle: ResultHandle, page_size: u32) -> Self {
        Self {
            warehouse,
            handle,
            page_size,
            page_token: None,
            buffered: VecDeque::new(),
            total_rows: None,
            exhausted: false,
        }
    }

    /// Next row, fetching the next page when the local buffer runs out.
    /// Returns `Ok(None)` once the final page has been drained.
    pub async fn next(&mut self) -> Result<Option<Row>, WarehouseError> {
        loop {
            if let Some(row) = self.buffered.pop_front() {
                return Ok(Some(row));
            }
            if self.exhausted {
                return Ok(None);
            }

            let page = self
                .warehouse
                .fetch_page(&self.handle, self.page_size, self.page_token.as_deref())
                .await?;
            debug!(
                result_id = %self.handle.id,
                rows = page.rows.len(),
                has_token = page.page_token.is_some(),
                "page received"
            );

            if page.total_rows.is_some() {
                self.total_rows = page.total_rows;
            }
            self.page_token = page.page_token;
            self.exhausted = self.page_token.is_none();
            self.buffered.extend(page.rows);
            // An empty page with a token just loops into the next fetch.
        }
    }

    /// Total row count reported by the service, known after the first page.
    pub fn total_rows(&self) -> Option<u64> {
        self.total_rows
    }

    /// Adapt the cursor into a [`Stream`] of rows, preserving its page-at-a-
    /// time laziness.
    pub fn into_stream(self) -> impl Stream<Item = Result<Row, WarehouseError>> {
        stream::try_unfold(self, |mut rows| async move {
            let row = rows.next().await?;
            Ok(row.map(|r| (r, rows)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobError;
    use crate::mock::MockWarehouse;
    use crate::param::ScalarType;
    use crate::result::Value;

    const SQL: &str = "SELECT word, word_count FROM t WHERE corpus = ? AND word_count >= ?";

    fn bindings() -> Vec<QueryParameter> {
        vec![
            QueryParameter::positional(ScalarType::String, "romeoandjuliet"),
            QueryParameter::positional(ScalarType::Int64, 100i64),
        ]
    }

    fn word_rows(words: &[(&str, i64)]) -> Vec<Row> {
        words
            .iter()
            .map(|(word, count)| {
                Row::from_pairs([
                    ("word", Value::from(*word)),
                    ("word_count", Value::from(*count)),
                ])
            })
            .collect()
    }

    fn fast_runner(warehouse: Arc<MockWarehouse>) -> QueryRunner {
        QueryRunner::new(warehouse).with_poll_interval(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn invalid_bindings_reach_no_submission() {
        let mock = Arc::new(MockWarehouse::new());
        let runner = fast_runner(Arc::clone(&mock));

        let err = runner
            .run(SQL, bindings()[..1].to_vec(), ExecutionMode::Async)
            .await
            .unwrap_err();

        assert!(matches!(err, WarehouseError::InvalidParameterStyle(_)));
        assert_eq!(mock.submit_count(), 0);
        assert_eq!(mock.sync_submit_count(), 0);
    }

    #[tokio::test]
    async fn async_run_polls_until_done() {
        let mock = Arc::new(
            MockWarehouse::new()
                .with_pending_polls(3)
                .with_pages(vec![word_rows(&[("the", 995)])]),
        );
        let runner = fast_runner(Arc::clone(&mock));

        let mut rows = runner.run(SQL, bindings(), ExecutionMode::Async).await.unwrap();
        assert_eq!(mock.submit_count(), 1);
        // 3 PENDING checks plus the DONE check.
        assert_eq!(mock.poll_count(), 4);

        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get("word"), Some(&Value::String("the".into())));
        assert!(rows.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_job_carries_payload_and_fetches_nothing() {
        let payload = JobError {
            reason: "invalidQuery".into(),
            message: "no such column".into(),
        };
        let mock = Arc::new(
            MockWarehouse::new()
                .with_pending_polls(2)
                .with_job_error(payload.clone()),
        );
        let runner = fast_runner(Arc::clone(&mock));

        let err = runner.run(SQL, bindings(), ExecutionMode::Async).await.unwrap_err();

        match err {
            WarehouseError::JobFailed { error, .. } => assert_eq!(error, payload),
            other => panic!("expected JobFailed, got {other:?}"),
        }
        assert_eq!(mock.fetch_count(), 0);
    }

    #[tokio::test]
    async fn sync_run_skips_polling() {
        let mock = Arc::new(MockWarehouse::new().with_pages(vec![word_rows(&[("romeo", 313)])]));
        let runner = fast_runner(Arc::clone(&mock));

        let mut rows = runner.run(SQL, bindings(), ExecutionMode::Sync).await.unwrap();
        assert_eq!(mock.sync_submit_count(), 1);
        assert_eq!(mock.poll_count(), 0);

        assert!(rows.next().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn pagination_is_lazy() {
        let mock = Arc::new(MockWarehouse::new().with_pages(vec![
            word_rows(&[("a", 1), ("b", 2)]),
            word_rows(&[("c", 3)]),
        ]));
        let runner = fast_runner(Arc::clone(&mock));

        let mut rows = runner.run(SQL, bindings(), ExecutionMode::Sync).await.unwrap();
        // Nothing fetched until the first row is asked for.
        assert_eq!(mock.fetch_count(), 0);

        rows.next().await.unwrap();
        assert_eq!(mock.fetch_count(), 1);
        rows.next().await.unwrap();
        assert_eq!(mock.fetch_count(), 1);

        // Third row lives on the second page.
        let third = rows.next().await.unwrap().unwrap();
        assert_eq!(third.get("word"), Some(&Value::String("c".into())));
        assert_eq!(mock.fetch_count(), 2);

        assert!(rows.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejected_submission_propagates() {
        let mock = Arc::new(MockWarehouse::new().rejecting("mismatched parameter count"));
        let runner = fast_runner(Arc::clone(&mock));

        let err = runner.run(SQL, bindings(), ExecutionMode::Async).await.unwrap_err();
        assert!(matches!(err, WarehouseError::Submission(_)));
        assert!(err.to_string().contains("mismatched parameter count"));
    }

    #[tokio::test]
    async fn poll_deadline_is_opt_in() {
        let mock = Arc::new(MockWarehouse::new().with_pending_polls(usize::MAX));
        let runner = fast_runner(Arc::clone(&mock)).with_poll_deadline(Duration::from_millis(5));

        let err = runner.run(SQL, bindings(), ExecutionMode::Async).await.unwrap_err();
        assert!(matches!(err, WarehouseError::DeadlineExceeded { .. }));
    }

    #[tokio::test]
    async fn total_rows_known_after_first_page() {
        let mock = Arc::new(MockWarehouse::new().with_pages(vec![
            word_rows(&[("a", 1)]),
            word_rows(&[("b", 2)]),
        ]));
        let runner = fast_runner(Arc::clone(&mock));

        let mut rows = runner.run(SQL, bindings(), ExecutionMode::Sync).await.unwrap();
        assert_eq!(rows.total_rows(), None);
        rows.next().await.unwrap();
        assert_eq!(rows.total_rows(), Some(2));
    }
}
