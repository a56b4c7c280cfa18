//! HTTP client for the remote task store.
//!
//! [`TaskApi`] is the seam the cache and mutation coordinator talk through;
//! [`ApiClient`] implements it over `reqwest` with a cookie jar carrying the
//! session established by [`ApiClient::login`](crate::auth).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::error::ApiError;
use crate::task::{CompletionUpdate, Task, TaskDraft, TaskId};

const TASKS_PATH: &str = "api/TodoTasks";

/// Operations offered by the remote task store.
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// Fetch every task owned by the signed-in user, in server order.
    async fn list_tasks(&self) -> Result<Vec<Task>, ApiError>;

    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ApiError>;

    async fn update_task(&self, id: TaskId, draft: &TaskDraft) -> Result<Task, ApiError>;

    /// Partial update carrying only the completion flag.
    async fn set_completion(&self, id: TaskId, is_completed: bool) -> Result<Task, ApiError>;

    async fn delete_task(&self, id: TaskId) -> Result<(), ApiError>;
}

/// Problem details body returned by the service on rejection.
#[derive(Debug, Default, Deserialize)]
struct ProblemDetails {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    errors: BTreeMap<String, Vec<String>>,
}

/// Cookie-authenticated client for the task service.
pub struct ApiClient {
    base_url: Url,
    http: reqwest::Client,
    jar: Arc<Jar>,
}

impl ApiClient {
    /// Build a client for `base_url` with the given request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let mut base_url = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl {
            message: format!("{base_url}: {e}"),
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(timeout)
            .build()
            .map_err(ApiError::from)?;
        Ok(Self { base_url, http, jar })
    }

    /// Restore a session from a saved `Cookie` header value.
    pub fn with_session_cookie(self, cookie_header: &str) -> Self {
        for pair in cookie_header.split(';') {
            let pair = pair.trim();
            if !pair.is_empty() {
                self.jar.add_cookie_str(pair, &self.base_url);
            }
        }
        self
    }

    /// The `Cookie` header value the client would send, if any.
    pub fn session_cookie(&self) -> Option<String> {
        self.jar
            .cookies(&self.base_url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url.join(path).map_err(|e| ApiError::InvalidUrl {
            message: format!("{path}: {e}"),
        })
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        Ok(self.request_to(method, self.url(path)?))
    }

    pub(crate) fn request_to(&self, method: Method, url: Url) -> RequestBuilder {
        self.http.request(method, url)
    }

    /// Send a request and map non-success statuses to [`ApiError`].
    ///
    /// `id` is the task addressed by the request, used to report 404s.
    pub(crate) async fn send(&self, request: RequestBuilder, id: Option<TaskId>) -> Result<Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        trace!(%status, url = %response.url(), "response");
        if status.is_success() {
            return Ok(response);
        }
        Err(rejection(status, id, response).await)
    }

    fn task_path(id: TaskId) -> String {
        format!("{TASKS_PATH}/{id}")
    }
}

async fn rejection(status: StatusCode, id: Option<TaskId>, response: Response) -> ApiError {
    match (status, id) {
        (StatusCode::UNAUTHORIZED, _) => return ApiError::Unauthorized,
        (StatusCode::NOT_FOUND, Some(id)) => return ApiError::NotFound { id },
        _ => {}
    }
    let body = response.text().await.unwrap_or_default();
    let problem: ProblemDetails = serde_json::from_str(&body).unwrap_or_default();
    debug!(%status, title = ?problem.title, "request rejected");
    ApiError::ServerRejection {
        status: status.as_u16(),
        title: problem.title,
        field_errors: problem.errors,
    }
}

#[async_trait]
impl TaskApi for ApiClient {
    async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let response = self.send(self.request(Method::GET, TASKS_PATH)?, None).await?;
        let tasks: Vec<Task> = response.json().await?;
        debug!(count = tasks.len(), "fetched tasks");
        Ok(tasks)
    }

    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ApiError> {
        let request = self.request(Method::POST, TASKS_PATH)?.json(draft);
        Ok(self.send(request, None).await?.json().await?)
    }

    async fn update_task(&self, id: TaskId, draft: &TaskDraft) -> Result<Task, ApiError> {
        let request = self.request(Method::PUT, &Self::task_path(id))?.json(draft);
        Ok(self.send(request, Some(id)).await?.json().await?)
    }

    async fn set_completion(&self, id: TaskId, is_completed: bool) -> Result<Task, ApiError> {
        let path = format!("{}/completion", Self::task_path(id));
        let request = self
            .request(Method::PATCH, &path)?
            .json(&CompletionUpdate { is_completed });
        Ok(self.send(request, Some(id)).await?.json().await?)
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, &Self::task_path(id))?, Some(id))
            .await?;
        Ok(())
    }
}
