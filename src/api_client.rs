use std::time::Duration;

use crate::{
    config::AppConfig,
    practice::{
        QuestionPayload, QuestionSource, SubmissionGateway, SubmissionReceipt, SubmissionRequest,
    },
};
use async_trait::async_trait;
use color_eyre::eyre::{Context, Result, eyre};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_API_BASE: &str = "http://localhost:5029/api";

/// Wrapper the LMS backend puts around most payloads.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    succeeded: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<T>,
}

/// Exercise overview shown above the questions. Only the fields the client
/// displays are kept.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExerciseDetails {
    pub title: String,
    pub instructions: Option<String>,
    /// Minutes.
    pub time_limit: Option<u32>,
    pub passing_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuestionsBody {
    Bare(Vec<QuestionPayload>),
    Enveloped(ApiEnvelope<Vec<QuestionPayload>>),
}

/// HTTP client for the question and submission endpoints of the LMS API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    api_base: String,
    access_token: Option<String>,
}

impl ApiClient {
    /// Create a new [`ApiClient`]. Requests carry `Authorization: Bearer` when a
    /// non-empty access token is supplied.
    pub fn new(
        api_base: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("failed to build HTTP client")?;
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            api_base,
            access_token: access_token.filter(|token| !token.trim().is_empty()),
        })
    }

    /// Construct an [`ApiClient`] from the resolved application configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            config.api_base_url.clone(),
            Some(config.access_token.clone()),
            config.request_policy().timeout,
        )
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Append `segments` to the base URL, percent-encoding each one so ids
    /// containing `/`, `?` or `#` stay a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_base)
            .wrap_err_with(|| format!("invalid API base URL {}", self.api_base))?;
        url.path_segments_mut()
            .map_err(|_| eyre!("API base URL {} cannot take a path", self.api_base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn questions_endpoint(&self, exercise_id: &str) -> Result<Url> {
        self.endpoint(&["questions", "by-exercise", exercise_id])
    }

    fn exercise_endpoint(&self, exercise_id: &str) -> Result<Url> {
        self.endpoint(&["exercises", exercise_id])
    }

    fn submit_endpoint(&self) -> Result<Url> {
        self.endpoint(&["exercises", "submit"])
    }

    /// Fetch the exercise overview (title, instructions, limits).
    pub async fn fetch_exercise(&self, exercise_id: &str) -> Result<ExerciseDetails> {
        let endpoint = self.exercise_endpoint(exercise_id)?;
        debug!("ApiClient: GET {}", endpoint);
        let response = self
            .authorized(self.client.get(endpoint.clone()))
            .send()
            .await
            .wrap_err_with(|| format!("failed to request exercise from {}", endpoint))?;

        let body = success_body(response).await?;
        parse_exercise_body(&body)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl QuestionSource for ApiClient {
    async fn fetch_questions(&self, exercise_id: &str) -> Result<Vec<QuestionPayload>> {
        let endpoint = self.questions_endpoint(exercise_id)?;
        debug!("ApiClient: GET {}", endpoint);
        let response = self
            .authorized(self.client.get(endpoint.clone()))
            .send()
            .await
            .wrap_err_with(|| format!("failed to request questions from {}", endpoint))?;

        let body = success_body(response).await?;
        parse_questions_body(&body)
    }
}

#[async_trait]
impl SubmissionGateway for ApiClient {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionReceipt> {
        let endpoint = self.submit_endpoint()?;
        debug!(
            "ApiClient: POST {} with {} outcome(s)",
            endpoint,
            request.question_submissions.len()
        );
        let response = self
            .authorized(self.client.post(endpoint.clone()))
            .json(request)
            .send()
            .await
            .wrap_err_with(|| format!("failed to send submission to {}", endpoint))?;

        let body = success_body(response).await?;
        parse_submission_body(&body)
    }
}

async fn success_body(response: Response) -> Result<String> {
    let status = response.status();
    debug!("ApiClient: response status {}", status);
    let body = response
        .text()
        .await
        .unwrap_or_else(|err| format!("<failed to read body: {}>", err));
    if !status.is_success() {
        debug!("ApiClient: error body: {}", body);
        return Err(eyre!("API returned {} with body: {}", status, body));
    }
    Ok(body)
}

/// Accept either a bare array of questions or the `{ succeeded, message, data }` envelope.
pub(crate) fn parse_questions_body(body: &str) -> Result<Vec<QuestionPayload>> {
    let parsed: QuestionsBody =
        serde_json::from_str(body).wrap_err("failed to parse question list response as JSON")?;
    match parsed {
        QuestionsBody::Bare(questions) => Ok(questions),
        QuestionsBody::Enveloped(envelope) => {
            if envelope.succeeded == Some(false) {
                return Err(eyre!(
                    "API reported failure: {}",
                    envelope.message.unwrap_or_else(|| "no message".to_string())
                ));
            }
            envelope
                .data
                .ok_or_else(|| eyre!("question list response did not include data"))
        }
    }
}

/// The exercise endpoint wraps its payload in the envelope; a bare object is
/// accepted too.
pub(crate) fn parse_exercise_body(body: &str) -> Result<ExerciseDetails> {
    let value: Value =
        serde_json::from_str(body).wrap_err("failed to parse exercise response as JSON")?;
    let enveloped = value.get("data").is_some() || value.get("succeeded").is_some();
    if !enveloped {
        return serde_json::from_value(value).wrap_err("unexpected exercise response shape");
    }

    let envelope: ApiEnvelope<ExerciseDetails> =
        serde_json::from_value(value).wrap_err("unexpected exercise response shape")?;
    if envelope.succeeded == Some(false) {
        return Err(eyre!(
            "API reported failure: {}",
            envelope.message.unwrap_or_else(|| "no message".to_string())
        ));
    }
    envelope
        .data
        .ok_or_else(|| eyre!("exercise response did not include data"))
}

/// The submit confirmation is opaque beyond success; an explicit
/// `succeeded: false` is still treated as a failure.
pub(crate) fn parse_submission_body(body: &str) -> Result<SubmissionReceipt> {
    if body.trim().is_empty() {
        return Ok(SubmissionReceipt::default());
    }

    let value: Value =
        serde_json::from_str(body).wrap_err("failed to parse submission response as JSON")?;
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string);
    if value.get("succeeded").and_then(Value::as_bool) == Some(false) {
        return Err(eyre!(
            "API rejected submission: {}",
            message.unwrap_or_else(|| "no message".to_string())
        ));
    }

    Ok(SubmissionReceipt {
        message,
        data: value.get("data").cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::practice::ports::QuestionSubmission;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };

    /// Serve a single canned HTTP response and hand back the raw request.
    async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buffer = [0u8; 4096];
            loop {
                let read = socket.read(&mut buffer).await.unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buffer[..read]);
                if request_complete(&request) {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}/api/", address), handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);
        request.len() >= header_end + 4 + content_length
    }

    fn client(base: &str, token: Option<&str>) -> ApiClient {
        ApiClient::new(base, token.map(str::to_string), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn trims_trailing_slash_and_ignores_blank_token() {
        let api = client("http://localhost:5029/api/", Some("  "));

        assert_eq!(api.api_base(), "http://localhost:5029/api");
        assert_eq!(
            api.questions_endpoint("ex-9").unwrap().as_str(),
            "http://localhost:5029/api/questions/by-exercise/ex-9"
        );
        assert_eq!(
            api.submit_endpoint().unwrap().as_str(),
            "http://localhost:5029/api/exercises/submit"
        );
        assert_eq!(
            api.exercise_endpoint("ex-9").unwrap().as_str(),
            "http://localhost:5029/api/exercises/ex-9"
        );
        assert!(api.access_token.is_none());
    }

    #[test]
    fn parses_bare_and_enveloped_question_lists() {
        let bare = r#"[{"id":"q1","text":"?","options":[]}]"#;
        assert_eq!(parse_questions_body(bare).unwrap().len(), 1);

        let enveloped = r#"{"succeeded":true,"message":null,"data":[{"id":"q1"},{"id":"q2"}]}"#;
        let questions = parse_questions_body(enveloped).unwrap();
        assert_eq!(questions[1].id.as_deref(), Some("q2"));
    }

    #[test]
    fn envelope_failure_or_missing_data_is_an_error() {
        let failed = r#"{"succeeded":false,"message":"Exercise not found"}"#;
        assert!(
            parse_questions_body(failed)
                .unwrap_err()
                .to_string()
                .contains("Exercise not found")
        );

        assert!(parse_questions_body(r#"{"succeeded":true}"#).is_err());
        assert!(parse_questions_body("not json").is_err());
    }

    #[test]
    fn submission_body_handles_empty_success_and_rejection() {
        assert_eq!(parse_submission_body("").unwrap(), SubmissionReceipt::default());

        let accepted = parse_submission_body(r#"{"succeeded":true,"message":"Saved","data":{"score":50}}"#)
            .unwrap();
        assert_eq!(accepted.message.as_deref(), Some("Saved"));
        assert_eq!(accepted.data, Some(serde_json::json!({ "score": 50 })));

        let rejected = parse_submission_body(r#"{"succeeded":false,"message":"Attempt limit reached"}"#);
        assert!(rejected.unwrap_err().to_string().contains("Attempt limit reached"));
    }

    #[tokio::test]
    async fn fetches_questions_with_bearer_token() {
        let body = r#"{"succeeded":true,"data":[{"id":"q1","text":"Pick one","options":[{"id":"a","text":"A","isCorrect":true}]}]}"#;
        let (base, server) = serve_once("200 OK", body).await;

        let questions = client(&base, Some("secret-token"))
            .fetch_questions("ex-1")
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/questions/by-exercise/ex-1 "));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer secret-token"));
        assert_eq!(questions[0].text.as_deref(), Some("Pick one"));
    }

    #[test]
    fn parses_enveloped_and_bare_exercise_details() {
        let enveloped = r#"{"succeeded":true,"data":{"id":"ex-1","title":"Ownership","timeLimit":15,"passingScore":70.0,"instructions":"Pick one answer each."}}"#;
        let details = parse_exercise_body(enveloped).unwrap();
        assert_eq!(details.title, "Ownership");
        assert_eq!(details.time_limit, Some(15));
        assert_eq!(details.passing_score, Some(70.0));
        assert_eq!(details.instructions.as_deref(), Some("Pick one answer each."));

        let bare = parse_exercise_body(r#"{"title":"Borrowing"}"#).unwrap();
        assert_eq!(bare.title, "Borrowing");
        assert_eq!(bare.time_limit, None);

        assert!(parse_exercise_body(r#"{"succeeded":false,"message":"Not found"}"#).is_err());
    }

    #[tokio::test]
    async fn exercise_id_is_sent_as_one_escaped_segment() {
        let (base, server) = serve_once("200 OK", "[]").await;

        let questions = client(&base, None)
            .fetch_questions("unit-3/quiz?draft#1")
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(
            request.starts_with("GET /api/questions/by-exercise/unit-3%2Fquiz%3Fdraft%231 "),
            "unexpected request line: {}",
            request.lines().next().unwrap_or_default()
        );
        assert!(questions.is_empty());
    }

    #[tokio::test]
    async fn non_success_status_fails_the_submission() {
        let (base, server) = serve_once("500 Internal Server Error", r#"{"message":"boom"}"#).await;
        let request = SubmissionRequest {
            exercise_id: "ex-1".to_string(),
            user_id: "user-1".to_string(),
            question_submissions: vec![QuestionSubmission {
                question_id: "q1".to_string(),
                is_correct: false,
            }],
        };

        let err = client(&base, None).submit(&request).await.unwrap_err();

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/exercises/submit "));
        assert!(raw.contains(r#""questionSubmissions":[{"questionId":"q1","isCorrect":false}]"#));
        assert!(err.to_string().contains("500"));
    }
}
