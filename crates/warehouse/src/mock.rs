//! Scripted in-memory warehouse for tests.
//!
//! [`MockWarehouse`] plays the external collaborator: it reports `PENDING`
//! for a configured number of status checks before `DONE`, can attach an
//! error payload to the terminal state, can reject submissions outright,
//! and serves pre-scripted result pages chained by generated continuation
//! tokens. Call counters let tests assert exactly how many requests each
//! protocol step issued.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{Warehouse, WarehouseError};
use crate::job::{JobError, JobHandle, JobState, JobStatus, ResultHandle};
use crate::param::QueryParameter;
use crate::result::{ResultPage, Row};

#[derive(Default)]
struct Inner {
    polls: usize,
    submits: usize,
    sync_submits: usize,
    fetches: usize,
    requested_tokens: Vec<Option<String>>,
}

/// Scripted collaborator. Pages ignore the `page_size` hint; each call
/// serves the next scripted page whole.
pub struct MockWarehouse {
    pending_polls: usize,
    job_error: Option<JobError>,
    rejection: Option<String>,
    pages: Vec<Vec<Row>>,
    inner: Mutex<Inner>,
}

impl MockWarehouse {
    /// A warehouse that completes immediately and returns no rows.
    pub fn new() -> Self {
        Self {
            pending_polls: 0,
            job_error: None,
            rejection: None,
            pages: Vec::new(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Report `PENDING` for the first `n` status checks, then `DONE`.
    pub fn with_pending_polls(mut self, n: usize) -> Self {
        self.pending_polls = n;
        self
    }

    /// Attach an error payload to the terminal state. The sync path reports
    /// it at submission, since the service blocks until completion there.
    pub fn with_job_error(mut self, error: JobError) -> Self {
        self.job_error = Some(error);
        self
    }

    /// Reject every submission with the given message.
    pub fn rejecting(mut self, message: impl Into<String>) -> Self {
        self.rejection = Some(message.into());
        self
    }

    /// Script the result pages. All but the last page get a continuation
    /// token of the form `page-{i}`.
    pub fn with_pages(mut self, pages: Vec<Vec<Row>>) -> Self {
        self.pages = pages;
        self
    }

    pub fn submit_count(&self) -> usize {
        self.inner.lock().unwrap().submits
    }

    pub fn sync_submit_count(&self) -> usize {
        self.inner.lock().unwrap().sync_submits
    }

    pub fn poll_count(&self) -> usize {
        self.inner.lock().unwrap().polls
    }

    pub fn fetch_count(&self) -> usize {
        self.inner.lock().unwrap().fetches
    }

    /// Tokens passed to `fetch_page`, in call order.
    pub fn requested_tokens(&self) -> Vec<Option<String>> {
        self.inner.lock().unwrap().requested_tokens.clone()
    }

    fn total_rows(&self) -> u64 {
        self.pages.iter().map(|p| p.len() as u64).sum()
    }
}

impl Default for MockWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Warehouse for MockWarehouse {
    async fn submit_query_job(
        &self,
        job_id: &str,
        _sql: &str,
        _params: &[QueryParameter],
        _use_standard_sql: bool,
    ) -> Result<JobHandle, WarehouseError> {
        if let Some(message) = &self.rejection {
            return Err(WarehouseError::Submission(message.clone()));
        }
        self.inner.lock().unwrap().submits += 1;
        Ok(JobHandle {
            id: job_id.to_string(),
        })
    }

    async fn job_state(&self, _handle: &JobHandle) -> Result<JobStatus, WarehouseError> {
        let polls = {
            let mut inner = self.inner.lock().unwrap();
            inner.polls += 1;
            inner.polls
        };

        if polls <= self.pending_polls {
            Ok(JobStatus {
                state: JobState::Pending,
                error: None,
            })
        } else {
            Ok(JobStatus {
                state: JobState::Done,
                error: self.job_error.clone(),
            })
        }
    }

    async fn submit_sync_query(
        &self,
        _sql: &str,
        _params: &[QueryParameter],
        _use_standard_sql: bool,
    ) -> Result<ResultHandle, WarehouseError> {
        if let Some(message) = &self.rejection {
            return Err(WarehouseError::Submission(message.clone()));
        }
        self.inner.lock().unwrap().sync_submits += 1;

        // The service blocks until the query finishes, so a failing query
        // surfaces here rather than through a poll.
        if let Some(error) = &self.job_error {
            return Err(WarehouseError::JobFailed {
                job_id: "sync-query".to_string(),
                error: error.clone(),
            });
        }

        Ok(ResultHandle {
            id: "sync-query".to_string(),
        })
    }

    async fn fetch_page(
        &self,
        _handle: &ResultHandle,
        _page_size: u32,
        page_token: Option<&str>,
    ) -> Result<ResultPage, WarehouseError> {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.fetches += 1;
            inner
                .requested_tokens
                .push(page_token.map(|t| t.to_string()));
        }

        let index = match page_token {
            None => 0,
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|i| i.parse::<usize>().ok())
                .ok_or_else(|| {
                    WarehouseError::Transport(format!("unknown page token {token:?}"))
                })?,
        };

        let rows = match self.pages.get(index) {
            Some(page) => page.clone(),
            None if index == 0 => Vec::new(),
            None => {
                return Err(WarehouseError::Transport(format!(
                    "page token {page_token:?} is out of range",
                )));
            }
        };

        let next_token = if index + 1 < self.pages.len() {
            Some(format!("page-{}", index + 1))
        } else {
            None
        };

        Ok(ResultPage {
            rows,
            total_rows: Some(self.total_rows()),
            page_token: next_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Value;

    fn row(word: &str) -> Row {
        Row::from_pairs([("word", Value::from(word))])
    }

    #[tokio::test]
    async fn pages_chain_through_tokens() {
        let mock = MockWarehouse::new().with_pages(vec![
            vec![row("a"), row("b")],
            vec![row("c")],
        ]);
        let handle = ResultHandle { id: "r".into() };

        let first = mock.fetch_page(&handle, 10, None).await.unwrap();
        assert_eq!(first.rows.len(), 2);
        assert_eq!(first.page_token.as_deref(), Some("page-1"));
        assert_eq!(first.total_rows, Some(3));

        let second = mock.fetch_page(&handle, 10, Some("page-1")).await.unwrap();
        assert_eq!(second.rows.len(), 1);
        assert_eq!(second.page_token, None);

        assert_eq!(mock.fetch_count(), 2);
        assert_eq!(
            mock.requested_tokens(),
            vec![None, Some("page-1".to_string())],
        );
    }

    #[tokio::test]
    async fn empty_script_serves_one_final_page() {
        let mock = MockWarehouse::new();
        let handle = ResultHandle { id: "r".into() };

        let page = mock.fetch_page(&handle, 10, None).await.unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.page_token, None);
    }

    #[tokio::test]
    async fn unknown_token_is_a_transport_error() {
        let mock = MockWarehouse::new().with_pages(vec![vec![row("a")]]);
        let handle = ResultHandle { id: "r".into() };

        let err = mock.fetch_page(&handle, 10, Some("bogus")).await.unwrap_err();
        assert!(matches!(err, WarehouseError::Transport(_)));
    }

    #[tokio::test]
    async fn pending_then_done() {
        let mock = MockWarehouse::new().with_pending_polls(2);
        let job = JobHandle { id: "j".into() };

        assert_eq!(mock.job_state(&job).await.unwrap().state, JobState::Pending);
        assert_eq!(mock.job_state(&job).await.unwrap().state, JobState::Pending);
        let done = mock.job_state(&job).await.unwrap();
        assert_eq!(done.state, JobState::Done);
        assert!(done.error.is_none());
    }
}
