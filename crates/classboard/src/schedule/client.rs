//! HTTP client for the schedule API.
//!
//! `ScheduleApi` is the seam between the pipeline and the REST backend. Read
//! methods hand back raw JSON because upstream shapes are not trustworthy;
//! the normalizer and the student shape probe decide what they mean.

use super::config::BoardConfig;
use super::error::ScheduleError;
use super::session::SessionKey;
use super::types::{Actor, CleanlinessReport, ScheduleInput};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

/// Paths relative to the API root.
const LIVE_SCHEDULES_PATH: &str = "schedules/live";
const SCHEDULES_PATH: &str = "schedules/";
const TEACHER_CLASSES_PATH: &str = "teachers/me/classes";
const STUDENT_SCHEDULE_PATH: &str = "students/me/schedule";
const STUDENT_CLASSES_PATH: &str = "students/me/classes";
const ALL_CLASSES_PATH: &str = "classes/";
const TOKEN_PATH: &str = "token";
const CURRENT_USER_PATH: &str = "users/me";

/// Every call the pipeline makes against the backend.
#[async_trait]
pub trait ScheduleApi: Send + Sync {
    /// Unified, role-agnostic schedule source.
    async fn live_schedules(&self) -> Result<Value, ScheduleError>;

    /// Classes owned by the signed-in teacher, possibly with nested schedules.
    async fn teacher_classes(&self) -> Result<Value, ScheduleError>;

    /// Student-scoped schedule source. Shape varies.
    async fn student_schedule(&self) -> Result<Value, ScheduleError>;

    /// Classes the signed-in student is enrolled in.
    async fn student_classes(&self) -> Result<Value, ScheduleError>;

    /// Every class on the platform.
    async fn all_classes(&self) -> Result<Value, ScheduleError>;

    async fn create_schedule(&self, input: &ScheduleInput) -> Result<Value, ScheduleError>;

    async fn update_schedule(
        &self,
        id: &str,
        input: &ScheduleInput,
    ) -> Result<Value, ScheduleError>;

    async fn delete_schedule(&self, id: &str) -> Result<(), ScheduleError>;

    async fn current_user(&self) -> Result<Actor, ScheduleError>;

    async fn schedule_cleanliness(&self, id: &str) -> Result<CleanlinessReport, ScheduleError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// reqwest-backed implementation of [`ScheduleApi`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
    session: SessionKey,
}

impl ApiClient {
    /// Creates an unauthenticated client from configuration.
    pub fn new(config: &BoardConfig) -> Result<Self, ScheduleError> {
        let mut builder = Client::builder().user_agent(&config.user_agent);
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| ScheduleError::Network {
            message: format!("Failed to build HTTP client: {}", e),
        })?;

        // Url::join drops the last segment unless the base ends with '/'
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
            token: None,
            session: SessionKey::anonymous(),
        })
    }

    /// Returns a copy of this client that sends `token` as a bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.session = SessionKey::from_token(&token);
        self.token = Some(token);
        self
    }

    pub fn session(&self) -> &SessionKey {
        &self.session
    }

    /// Exchanges credentials for an access token via `POST /token`.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, ScheduleError> {
        let url = self.url(TOKEN_PATH)?;
        info!(username = %username, "Requesting access token");

        let response = self
            .send(
                "token",
                self.client
                    .post(url)
                    .form(&[("username", username), ("password", password)]),
            )
            .await?;
        let token: TokenResponse = response.json().await?;

        info!(session = %SessionKey::from_token(&token.access_token), "Logged in");
        Ok(token.access_token)
    }

    fn url(&self, path: &str) -> Result<Url, ScheduleError> {
        Ok(self.base_url.join(path)?)
    }

    /// Builds `schedules/{id}` (plus an optional trailing segment) with the id
    /// percent-encoded as a single path segment.
    fn schedule_url(&self, id: &str, suffix: Option<&str>) -> Result<Url, ScheduleError> {
        let mut url = self.url(SCHEDULES_PATH)?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| ScheduleError::UrlError {
                message: format!("{} cannot be a base URL", self.base_url),
            })?;
            segments.pop_if_empty().push(id);
            if let Some(suffix) = suffix {
                segments.push(suffix);
            }
        }
        Ok(url)
    }

    /// Attaches credentials, sends, and turns non-2xx into [`ScheduleError::Api`].
    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, ScheduleError> {
        let request = match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        debug!(
            session = %self.session,
            operation = operation,
            status = status.as_u16(),
            url = %response.url(),
            "API response"
        );

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = extract_detail(&body);
        warn!(
            session = %self.session,
            operation = operation,
            status = status.as_u16(),
            detail = detail.as_deref().unwrap_or(""),
            "API request failed"
        );
        Err(ScheduleError::Api {
            status: status.as_u16(),
            detail,
        })
    }

    async fn get_json(&self, operation: &'static str, path: &str) -> Result<Value, ScheduleError> {
        let url = self.url(path)?;
        let response = self.send(operation, self.client.get(url)).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ScheduleApi for ApiClient {
    async fn live_schedules(&self) -> Result<Value, ScheduleError> {
        self.get_json("live_schedules", LIVE_SCHEDULES_PATH).await
    }

    async fn teacher_classes(&self) -> Result<Value, ScheduleError> {
        self.get_json("teacher_classes", TEACHER_CLASSES_PATH).await
    }

    async fn student_schedule(&self) -> Result<Value, ScheduleError> {
        self.get_json("student_schedule", STUDENT_SCHEDULE_PATH).await
    }

    async fn student_classes(&self) -> Result<Value, ScheduleError> {
        self.get_json("student_classes", STUDENT_CLASSES_PATH).await
    }

    async fn all_classes(&self) -> Result<Value, ScheduleError> {
        self.get_json("all_classes", ALL_CLASSES_PATH).await
    }

    async fn create_schedule(&self, input: &ScheduleInput) -> Result<Value, ScheduleError> {
        let url = self.url(SCHEDULES_PATH)?;
        let response = self
            .send("create_schedule", self.client.post(url).json(input))
            .await?;
        Ok(response.json().await?)
    }

    async fn update_schedule(
        &self,
        id: &str,
        input: &ScheduleInput,
    ) -> Result<Value, ScheduleError> {
        let url = self.schedule_url(id, None)?;
        let response = self
            .send("update_schedule", self.client.put(url).json(input))
            .await?;
        Ok(response.json().await?)
    }

    async fn delete_schedule(&self, id: &str) -> Result<(), ScheduleError> {
        let url = self.schedule_url(id, None)?;
        self.send("delete_schedule", self.client.delete(url)).await?;
        Ok(())
    }

    async fn current_user(&self) -> Result<Actor, ScheduleError> {
        let value = self.get_json("current_user", CURRENT_USER_PATH).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn schedule_cleanliness(&self, id: &str) -> Result<CleanlinessReport, ScheduleError> {
        let url = self.schedule_url(id, Some("cleanliness"))?;
        let response = self
            .send("schedule_cleanliness", self.client.get(url))
            .await?;
        Ok(response.json().await?)
    }
}

/// Pulls the human-readable message out of an error body.
///
/// The backend reports errors as `{"detail": "..."}`; request validation
/// errors carry a list of `{"msg": "..."}` objects under `detail` instead.
pub fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let field = value.get("detail").or_else(|| value.get("message"))?;
    match field {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}
