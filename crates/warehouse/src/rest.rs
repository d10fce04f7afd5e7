//! REST implementation of the [`Warehouse`] trait.
//!
//! Speaks the warehouse's HTTP surface: job insertion, job-status reads,
//! synchronous queries, and token-paged result fetches. Transport failures
//! are stringified into [`WarehouseError::Transport`]; response decoding is
//! isolated in helpers so it can be tested without a network.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use async_trait::async_trait;

use crate::client::{Warehouse, WarehouseError};
use crate::config::WarehouseConfig;
use crate::job::{JobError, JobHandle, JobState, JobStatus, ResultHandle};
use crate::param::QueryParameter;
use crate::result::{ResultPage, Row, Value};

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the warehouse REST API.
///
/// Constructed once per invocation and shared behind an `Arc`; holds no
/// mutable state beyond the connection pool inside [`reqwest::Client`].
pub struct RestWarehouse {
    config: WarehouseConfig,
    http: reqwest::Client,
}

impl RestWarehouse {
    pub fn new(config: WarehouseConfig) -> Self {
        info!(
            endpoint = %config.endpoint,
            project = %config.project,
            "warehouse client initialised"
        );
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/projects/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.project,
            path,
        )
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn read_body(resp: reqwest::Response) -> Result<(StatusCode, String), WarehouseError> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| WarehouseError::Transport(e.to_string()))?;
        Ok((status, body))
    }

    fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, WarehouseError> {
        serde_json::from_str(body).map_err(|e| WarehouseError::Parse(e.to_string()))
    }
}

#[async_trait]
impl Warehouse for RestWarehouse {
    async fn submit_query_job(
        &self,
        job_id: &str,
        sql: &str,
        params: &[QueryParameter],
        use_standard_sql: bool,
    ) -> Result<JobHandle, WarehouseError> {
        let request = InsertJobRequest {
            job_reference: JobReferenceDto {
                job_id: job_id.to_string(),
            },
            configuration: JobConfigurationDto {
                query: QueryConfigDto::new(sql, params, use_standard_sql),
            },
        };

        let resp = self
            .authorize(self.http.post(self.url("jobs")).json(&request))
            .send()
            .await
            .map_err(|e| WarehouseError::Transport(e.to_string()))?;

        let (status, body) = Self::read_body(resp).await?;
        if !status.is_success() {
            return Err(WarehouseError::Submission(error_message(status, &body)));
        }

        let job: JobDto = Self::decode(&body)?;
        let id = job
            .job_reference
            .map(|r| r.job_id)
            .unwrap_or_else(|| job_id.to_string());

        info!(job_id = %id, "query job submitted");
        Ok(JobHandle { id })
    }

    async fn job_state(&self, handle: &JobHandle) -> Result<JobStatus, WarehouseError> {
        let resp = self
            .authorize(self.http.get(self.url(&format!("jobs/{}", handle.id))))
            .send()
            .await
            .map_err(|e| WarehouseError::Transport(e.to_string()))?;

        let (status, body) = Self::read_body(resp).await?;
        if !status.is_success() {
            return Err(WarehouseError::Transport(error_message(status, &body)));
        }

        let job: JobDto = Self::decode(&body)?;
        let dto = job
            .status
            .ok_or_else(|| WarehouseError::Parse("job response has no status".into()))?;

        debug!(job_id = %handle.id, state = %dto.state, "job state read");
        Ok(dto.into_status())
    }

    async fn submit_sync_query(
        &self,
        sql: &str,
        params: &[QueryParameter],
        use_standard_sql: bool,
    ) -> Result<ResultHandle, WarehouseError> {
        let request = SyncQueryRequest {
            config: QueryConfigDto::new(sql, params, use_standard_sql),
        };

        let resp = self
            .authorize(self.http.post(self.url("queries")).json(&request))
            .send()
            .await
            .map_err(|e| WarehouseError::Transport(e.to_string()))?;

        let (status, body) = Self::read_body(resp).await?;
        if !status.is_success() {
            return Err(WarehouseError::Submission(error_message(status, &body)));
        }

        let result: SyncQueryResponse = Self::decode(&body)?;
        if let Some(error) = result.error_result {
            let job_id = result
                .job_reference
                .map(|r| r.job_id)
                .unwrap_or_else(|| "unknown".to_string());
            return Err(WarehouseError::JobFailed {
                job_id,
                error: error.into_job_error(),
            });
        }

        let id = result
            .job_reference
            .map(|r| r.job_id)
            .ok_or_else(|| WarehouseError::Parse("query response has no job reference".into()))?;

        debug!(result_id = %id, "sync query completed");
        Ok(ResultHandle { id })
    }

    async fn fetch_page(
        &self,
        handle: &ResultHandle,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<ResultPage, WarehouseError> {
        let mut query = vec![("maxResults", page_size.to_string())];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let resp = self
            .authorize(
                self.http
                    .get(self.url(&format!("queries/{}", handle.id)))
                    .query(&query),
            )
            .send()
            .await
            .map_err(|e| WarehouseError::Transport(e.to_string()))?;

        let (status, body) = Self::read_body(resp).await?;
        if !status.is_success() {
            return Err(WarehouseError::Transport(error_message(status, &body)));
        }

        let page = parse_page(Self::decode(&body)?)?;
        debug!(
            result_id = %handle.id,
            rows = page.rows.len(),
            has_token = page.page_token.is_some(),
            "result page fetched"
        );
        Ok(page)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReferenceDto {
    job_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertJobRequest {
    job_reference: JobReferenceDto,
    configuration: JobConfigurationDto,
}

#[derive(Debug, Serialize)]
struct JobConfigurationDto {
    query: QueryConfigDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryConfigDto {
    query: String,
    use_legacy_sql: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameter_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    query_parameters: Vec<QueryParameterDto>,
}

impl QueryConfigDto {
    fn new(sql: &str, params: &[QueryParameter], use_standard_sql: bool) -> Self {
        let parameter_mode = if params.is_empty() {
            None
        } else if params.iter().any(|p| p.name.is_some()) {
            Some("NAMED")
        } else {
            Some("POSITIONAL")
        };

        Self {
            query: sql.to_string(),
            use_legacy_sql: !use_standard_sql,
            parameter_mode,
            query_parameters: params.iter().map(QueryParameterDto::from_param).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryParameterDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    parameter_type: ParameterTypeDto,
    parameter_value: ParameterValueDto,
}

impl QueryParameterDto {
    fn from_param(param: &QueryParameter) -> Self {
        // The wire encodes every scalar value as a string; NULL as absent.
        let value = match &param.value {
            Value::Null => None,
            other => Some(other.to_string()),
        };
        Self {
            name: param.name.clone(),
            parameter_type: ParameterTypeDto {
                kind: param.ty.as_str().to_string(),
            },
            parameter_value: ParameterValueDto { value },
        }
    }
}

#[derive(Debug, Serialize)]
struct ParameterTypeDto {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize)]
struct ParameterValueDto {
    value: Option<String>,
}

#[derive(Debug, Serialize)]
struct SyncQueryRequest {
    #[serde(flatten)]
    config: QueryConfigDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobDto {
    job_reference: Option<JobReferenceDto>,
    status: Option<JobStatusDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatusDto {
    state: JobState,
    error_result: Option<ErrorResultDto>,
}

impl JobStatusDto {
    fn into_status(self) -> JobStatus {
        JobStatus {
            state: self.state,
            error: self.error_result.map(ErrorResultDto::into_job_error),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResultDto {
    reason: Option<String>,
    message: Option<String>,
}

impl ErrorResultDto {
    fn into_job_error(self) -> JobError {
        JobError {
            reason: self.reason.unwrap_or_else(|| "unknown".to_string()),
            message: self.message.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncQueryResponse {
    job_reference: Option<JobReferenceDto>,
    error_result: Option<ErrorResultDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageDto {
    schema: Option<SchemaDto>,
    rows: Option<Vec<RowDto>>,
    page_token: Option<String>,
    /// The service encodes the total as a decimal string.
    total_rows: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SchemaDto {
    fields: Vec<FieldDto>,
}

#[derive(Debug, Deserialize)]
struct FieldDto {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct RowDto {
    f: Vec<CellDto>,
}

#[derive(Debug, Deserialize)]
struct CellDto {
    v: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Decoding helpers
// ---------------------------------------------------------------------------

/// Extract a human-readable message from an error response body.
///
/// Tries the service's `{"error": {"message": ...}}` envelope first, then
/// the raw body, then the bare status line.
fn error_message(status: StatusCode, body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorEnvelope {
        error: ErrorBody,
    }
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return envelope.error.message;
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return format!("{status}: {trimmed}");
    }
    status.to_string()
}

/// Assemble a [`ResultPage`] from the wire page, typing each cell by its
/// schema field.
fn parse_page(page: PageDto) -> Result<ResultPage, WarehouseError> {
    let raw_rows = page.rows.unwrap_or_default();

    let fields = match page.schema {
        Some(schema) => schema.fields,
        None if raw_rows.is_empty() => Vec::new(),
        None => return Err(WarehouseError::Parse("result page has no schema".into())),
    };

    let mut rows = Vec::with_capacity(raw_rows.len());
    for raw in raw_rows {
        if raw.f.len() != fields.len() {
            return Err(WarehouseError::Parse(format!(
                "row has {} cells but schema declares {} fields",
                raw.f.len(),
                fields.len(),
            )));
        }
        let mut row = Row::new();
        for (field, cell) in fields.iter().zip(raw.f) {
            row.push(&field.name, decode_cell(&field.kind, cell.v)?);
        }
        rows.push(row);
    }

    Ok(ResultPage {
        rows,
        total_rows: page.total_rows.as_deref().and_then(|t| t.parse().ok()),
        page_token: page.page_token,
    })
}

/// Decode one string-encoded cell into a typed [`Value`].
fn decode_cell(kind: &str, v: Option<serde_json::Value>) -> Result<Value, WarehouseError> {
    let raw = match v {
        None | Some(serde_json::Value::Null) => return Ok(Value::Null),
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Bool(b)) => return Ok(Value::Bool(b)),
        Some(serde_json::Value::Number(n)) => {
            return Ok(match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            });
        }
        Some(other) => {
            return Err(WarehouseError::Parse(format!(
                "unsupported cell encoding: {other}",
            )));
        }
    };

    match kind.to_ascii_uppercase().as_str() {
        "INT64" | "INTEGER" => raw
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| WarehouseError::Parse(format!("bad INT64 cell: {raw:?}"))),
        "FLOAT64" | "FLOAT" => raw
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| WarehouseError::Parse(format!("bad FLOAT64 cell: {raw:?}"))),
        "BOOL" | "BOOLEAN" => match raw.to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(WarehouseError::Parse(format!("bad BOOL cell: {raw:?}"))),
        },
        _ => Ok(Value::String(raw)),
    }
}

// ---------------------------------------------------------------------------
// Tests: wire encoding and decoding only, no network
// ---------------------------------------------------------------------------
