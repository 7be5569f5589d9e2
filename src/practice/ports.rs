use super::model::QuestionPayload;
use async_trait::async_trait;
use color_eyre::eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{future::Future, time::Duration};
use tracing::{debug, warn};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_LOAD_RETRIES: u32 = 1;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Supplies the ordered question list for an exercise.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn fetch_questions(&self, exercise_id: &str) -> Result<Vec<QuestionPayload>>;
}

/// Sends a finished attempt to the remote grading endpoint.
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionReceipt>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSubmission {
    pub question_id: String,
    pub is_correct: bool,
}

/// Body of `POST /exercises/submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub exercise_id: String,
    pub user_id: String,
    pub question_submissions: Vec<QuestionSubmission>,
}

/// Confirmation from the grading service. Only success matters to the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionReceipt {
    pub message: Option<String>,
    pub data: Option<Value>,
}

/// Client-side limits applied around every port call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPolicy {
    pub timeout: Duration,
    /// Extra attempts for the question load. Submissions are never retried.
    pub load_retries: u32,
    /// Delay before the first load retry, doubled for each further retry.
    pub retry_backoff: Duration,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            load_retries: DEFAULT_LOAD_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// Fetch questions with a timeout per attempt, retrying failed attempts with
/// exponential backoff up to `policy.load_retries` times.
pub async fn fetch_with_retry(
    source: &dyn QuestionSource,
    exercise_id: &str,
    policy: &RequestPolicy,
) -> Result<Vec<QuestionPayload>> {
    let mut delay = policy.retry_backoff;
    let mut attempt = 0;

    loop {
        debug!(
            "Ports: fetching questions for exercise {} (attempt {})",
            exercise_id,
            attempt + 1
        );
        match with_timeout(policy.timeout, "question load", source.fetch_questions(exercise_id))
            .await
        {
            Ok(payloads) => return Ok(payloads),
            Err(err) if attempt < policy.load_retries => {
                attempt += 1;
                warn!(
                    "Ports: question load failed ({}); retry {}/{} in {}ms",
                    err,
                    attempt,
                    policy.load_retries,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            Err(err) => return Err(err),
        }
    }
}

/// Submit exactly once, bounded by the policy timeout.
pub async fn submit_once(
    gateway: &dyn SubmissionGateway,
    request: &SubmissionRequest,
    policy: &RequestPolicy,
) -> Result<SubmissionReceipt> {
    debug!(
        "Ports: submitting {} outcome(s) for exercise {}",
        request.question_submissions.len(),
        request.exercise_id
    );
    with_timeout(policy.timeout, "submission", gateway.submit(request)).await
}

async fn with_timeout<T>(
    limit: Duration,
    label: &str,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(eyre!("{} timed out after {}ms", label, limit.as_millis())),
    }
}
