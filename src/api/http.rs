#![forbid(unsafe_code)]

use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Method;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::api::TaskApi;
use crate::error::TodoError;
use crate::task::model::{NewTask, Task, TaskUpdate};

const LOAD_FAILED: &str = "Failed to load tasks";
const CREATE_FAILED: &str = "Failed to create task";
const UPDATE_FAILED: &str = "Failed to update task";
const DELETE_FAILED: &str = "Failed to delete task";

/// Unreserved URL characters stay literal in path segments.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTaskApi {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TodoError> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            return Err(TodoError::Config("api.base_url must not be empty".to_owned()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("todui/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn tasks_url(&self, user_id: &str) -> String {
        format!(
            "{}/api/{}/tasks",
            self.base_url,
            utf8_percent_encode(user_id, PATH_SEGMENT)
        )
    }

    fn task_url(&self, user_id: &str, task_id: i64) -> String {
        format!("{}/{task_id}", self.tasks_url(user_id))
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
        fallback: &str,
    ) -> Result<reqwest::Response, TodoError> {
        let request_id = Uuid::new_v4().to_string();
        let mut req = self
            .client
            .request(method.clone(), url)
            .header("X-Request-Id", &request_id);
        if let Some(token) = self.token.as_deref() {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        tracing::debug!(%method, url, %request_id, "sending request");
        let resp = req.send().await.inspect_err(|e| {
            tracing::warn!(%method, url, %request_id, error = %e, "request failed");
        })?;

        let status = resp.status();
        tracing::debug!(%method, url, %request_id, status = status.as_u16(), "received response");
        if status.is_success() {
            return Ok(resp);
        }

        let text = resp.text().await.unwrap_or_default();
        let message = extract_error_message(&text).unwrap_or_else(|| fallback.to_owned());
        tracing::warn!(%method, url, %request_id, status = status.as_u16(), "{message}");
        Err(TodoError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
        fallback: &str,
    ) -> Result<T, TodoError> {
        let resp = self.execute(method, url, body, fallback).await?;
        Ok(resp.json::<T>().await?)
    }
}

impl TaskApi for HttpTaskApi {
    #[tracing::instrument(skip(self))]
    async fn get_tasks(&self, user_id: &str) -> Result<Vec<Task>, TodoError> {
        let url = self.tasks_url(user_id);
        self.execute_json(Method::GET, &url, None, LOAD_FAILED).await
    }

    #[tracing::instrument(skip(self, new))]
    async fn create_task(&self, user_id: &str, new: &NewTask) -> Result<Task, TodoError> {
        let url = self.tasks_url(user_id);
        let body = to_body(new)?;
        self.execute_json(Method::POST, &url, Some(body), CREATE_FAILED)
            .await
    }

    #[tracing::instrument(skip(self, fields))]
    async fn update_task(
        &self,
        user_id: &str,
        task_id: i64,
        fields: &TaskUpdate,
    ) -> Result<Task, TodoError> {
        let url = self.task_url(user_id, task_id);
        let body = to_body(fields)?;
        self.execute_json(Method::PUT, &url, Some(body), UPDATE_FAILED)
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn toggle_complete(&self, user_id: &str, task_id: i64) -> Result<Task, TodoError> {
        let url = format!("{}/complete", self.task_url(user_id, task_id));
        self.execute_json(Method::PATCH, &url, None, UPDATE_FAILED)
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_task(&self, user_id: &str, task_id: i64) -> Result<(), TodoError> {
        let url = self.task_url(user_id, task_id);
        self.execute(Method::DELETE, &url, None, DELETE_FAILED)
            .await?;
        Ok(())
    }
}

fn to_body(value: &impl serde::Serialize) -> Result<serde_json::Value, TodoError> {
    serde_json::to_value(value)
        .map_err(|e| TodoError::Other(format!("failed to encode request body: {e}")))
}

/// Pulls a human-readable message out of the error bodies the task service
/// is known to produce.
#[must_use]
pub fn extract_error_message(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    let candidates = [
        "/error/message",
        "/detail/error/message",
        "/detail/message",
        "/detail",
        "/detail/0/msg",
        "/message",
    ];
    candidates
        .iter()
        .filter_map(|p| v.pointer(p))
        .filter_map(serde_json::Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}
