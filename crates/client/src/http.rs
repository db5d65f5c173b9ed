use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use govflow_core::backend::{ApiError, ApprovalApi, QuestionnaireApi};
use govflow_core::config::ApiConfig;
use govflow_core::domain::answer::{AnswerBatch, SaveReceipt};
use govflow_core::domain::approval::{ApprovalRecord, NewApprovalRequest, ReviewDecision};
use govflow_core::domain::phase::{Phase, PhaseId, QuestionId};
use govflow_core::domain::process::ProcessId;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("api base url `{url}` is invalid: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("could not build http client: {0}")]
    Build(#[from] reqwest::Error),
}

/// REST implementation of the governance backend.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    token: Option<SecretString>,
}

impl HttpBackend {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        token: Option<SecretString>,
    ) -> Result<Self, ClientError> {
        let invalid = |reason: String| ClientError::InvalidBaseUrl { url: base_url.to_owned(), reason };
        let base_url = Url::parse(base_url.trim()).map_err(|error| invalid(error.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(invalid("url cannot carry a path".to_owned()));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url, token })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ClientError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs), config.token.clone())
    }

    /// Same backend with a different bearer token, e.g. one restored from a
    /// stored session.
    pub fn with_token(mut self, token: Option<SecretString>) -> Self {
        self.token = token;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Transport(format!("base url `{}` has no path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> (RequestBuilder, String) {
        let correlation_id = Uuid::new_v4().to_string();
        let mut builder =
            self.client.request(method, url).header(CORRELATION_HEADER, correlation_id.as_str());
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        (builder, correlation_id)
    }

    async fn send(&self, builder: RequestBuilder, correlation_id: &str) -> Result<Response, ApiError> {
        let response = builder.send().await.map_err(|error| {
            warn!(
                event_name = "client.transport_failed",
                correlation_id,
                error = %error,
                "backend request failed before a response"
            );
            ApiError::Transport(error.to_string())
        })?;

        let status = response.status();
        debug!(
            event_name = "client.response",
            correlation_id,
            status = status.as_u16(),
            url = %response.url(),
            "backend responded"
        );
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status { status: status.as_u16(), message: error_message(status, &body) })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let (builder, correlation_id) = self.request(Method::GET, url);
        let response = self.send(builder, &correlation_id).await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await.map_err(|error| ApiError::Transport(error.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|error| ApiError::Decode(error.to_string()))
}

/// Prefers a `message` or `error` field of a JSON error body.
fn error_message(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        ["message", "error"]
            .iter()
            .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_owned))
    });
    let message = from_json.unwrap_or_else(|| body.trim().to_owned());
    if message.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_owned()
    } else {
        message
    }
}

/// Answer values are strings on the wire; scalars are tolerated and nulls dropped.
fn answer_map(raw: HashMap<QuestionId, Value>) -> HashMap<QuestionId, String> {
    raw.into_iter()
        .filter_map(|(question_id, value)| match value {
            Value::Null => None,
            Value::String(text) => Some((question_id, text)),
            other => Some((question_id, other.to_string())),
        })
        .collect()
}

#[async_trait]
impl ApprovalApi for HttpBackend {
    async fn pending_approvals(&self) -> Result<Vec<ApprovalRecord>, ApiError> {
        self.get_json(self.url(&["approvals", "pending"])?).await
    }

    async fn create_approval(&self, request: NewApprovalRequest) -> Result<(), ApiError> {
        let (builder, correlation_id) = self.request(Method::POST, self.url(&["approvals"])?);
        self.send(builder.json(&request), &correlation_id).await?;
        Ok(())
    }

    async fn review_approval(&self, decision: ReviewDecision) -> Result<(), ApiError> {
        let (builder, correlation_id) =
            self.request(Method::POST, self.url(&["approvals", "review"])?);
        self.send(builder.json(&decision), &correlation_id).await?;
        Ok(())
    }

    async fn latest_approval(
        &self,
        process_id: &ProcessId,
        phase_id: &PhaseId,
    ) -> Result<Option<ApprovalRecord>, ApiError> {
        let (builder, correlation_id) =
            self.request(Method::GET, self.url(&["approvals", "check"])?);
        let builder =
            builder.query(&[("processId", process_id.as_str()), ("phaseId", phase_id.as_str())]);

        let response = match self.send(builder, &correlation_id).await {
            Ok(response) => response,
            Err(error) if error.is_not_found() => return Ok(None),
            Err(error) => return Err(error),
        };

        let bytes =
            response.bytes().await.map_err(|error| ApiError::Transport(error.to_string()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice::<Option<ApprovalRecord>>(&bytes)
            .map_err(|error| ApiError::Decode(error.to_string()))
    }
}

#[async_trait]
impl QuestionnaireApi for HttpBackend {
    async fn phase(&self, phase_id: &PhaseId) -> Result<Phase, ApiError> {
        self.get_json(self.url(&["phases", phase_id.as_str()])?).await
    }

    async fn answers(
        &self,
        process_id: &ProcessId,
        phase_id: &PhaseId,
    ) -> Result<HashMap<QuestionId, String>, ApiError> {
        let (builder, correlation_id) = self.request(Method::GET, self.url(&["answers"])?);
        let builder =
            builder.query(&[("processId", process_id.as_str()), ("phaseId", phase_id.as_str())]);
        let response = self.send(builder, &correlation_id).await?;
        let raw: Option<HashMap<QuestionId, Value>> = decode(response).await?;
        Ok(raw.map(answer_map).unwrap_or_default())
    }

    async fn save_answers(&self, batch: AnswerBatch) -> Result<SaveReceipt, ApiError> {
        let (builder, correlation_id) = self.request(Method::POST, self.url(&["answers"])?);
        let response = self.send(builder.json(&batch), &correlation_id).await?;
        decode(response).await
    }
}
