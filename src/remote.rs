//! Gateway for a REST record store (PostgREST-style collection endpoints).
//!
//! Each collection lives at `{base}/{collection}`. Rows are filtered with
//! `?id=eq.{id}` and writes ask for the stored rows back through
//! `Prefer: return=representation`, so inserts and updates return the record
//! exactly as the server persisted it.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{Gateway, CATEGORIES, SUBTASKS, TASKS};
use crate::models::{Category, CategoryPatch, Subtask, SubtaskPatch, Task, TaskPatch, TaskStatus};

const RETURN_REPRESENTATION: &str = "return=representation";

pub struct RemoteGateway {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

/// Task as stored remotely; subtasks live in their own collection.
#[derive(Serialize)]
struct TaskRow<'a> {
    id: &'a str,
    title: &'a str,
    description: Option<&'a str>,
    category_id: &'a str,
    status: TaskStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'a> From<&'a Task> for TaskRow<'a> {
    fn from(task: &'a Task) -> Self {
        Self {
            id: &task.id,
            title: &task.title,
            description: task.description.as_deref(),
            category_id: &task.category_id,
            status: task.status,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

impl RemoteGateway {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> GatewayResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, collection: &str) -> String {
        format!("{}/{}", self.base_url, collection)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }

    async fn rows<T: DeserializeOwned>(response: Response) -> GatewayResult<Vec<T>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status { status, body });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn list<T: DeserializeOwned>(&self, collection: &'static str) -> GatewayResult<Vec<T>> {
        let request = self
            .client
            .get(self.url(collection))
            .query(&[("order", "created_at.asc")]);
        Self::rows(self.authorize(request).send().await?).await
    }

    async fn insert<B, T>(&self, collection: &'static str, body: &B) -> GatewayResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let request = self
            .client
            .post(self.url(collection))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(body);
        Self::rows(self.authorize(request).send().await?)
            .await?
            .into_iter()
            .next()
            .ok_or(GatewayError::EmptyResponse(collection))
    }

    async fn update<P, T>(&self, collection: &'static str, id: &str, patch: &P) -> GatewayResult<T>
    where
        P: Serialize + Sync,
        T: DeserializeOwned,
    {
        let request = self
            .client
            .patch(self.url(collection))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(patch);
        Self::rows(self.authorize(request).send().await?)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::not_found(collection, id))
    }

    /// Deletes rows where `field` equals `value`; returns how many went away.
    async fn delete_where(
        &self,
        collection: &'static str,
        field: &str,
        value: &str,
    ) -> GatewayResult<usize> {
        let request = self
            .client
            .delete(self.url(collection))
            .query(&[(field, format!("eq.{value}"))])
            .header("Prefer", RETURN_REPRESENTATION);
        let removed: Vec<serde_json::Value> =
            Self::rows(self.authorize(request).send().await?).await?;
        Ok(removed.len())
    }

    async fn delete(&self, collection: &'static str, id: &str) -> GatewayResult<()> {
        if self.delete_where(collection, "id", id).await? == 0 {
            return Err(GatewayError::not_found(collection, id));
        }
        Ok(())
    }
}

#[async_trait]
impl Gateway for RemoteGateway {
    async fn list_categories(&self) -> GatewayResult<Vec<Category>> {
        self.list(CATEGORIES).await
    }

    async fn insert_category(&self, category: &Category) -> GatewayResult<Category> {
        self.insert(CATEGORIES, category).await
    }

    async fn update_category(&self, id: &str, patch: &CategoryPatch) -> GatewayResult<Category> {
        self.update(CATEGORIES, id, patch).await
    }

    async fn delete_category(&self, id: &str) -> GatewayResult<()> {
        self.delete(CATEGORIES, id).await
    }

    async fn list_tasks(&self) -> GatewayResult<Vec<Task>> {
        self.list(TASKS).await
    }

    async fn insert_task(&self, task: &Task) -> GatewayResult<Task> {
        self.insert(TASKS, &TaskRow::from(task)).await
    }

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> GatewayResult<Task> {
        self.update(TASKS, id, patch).await
    }

    async fn delete_task(&self, id: &str) -> GatewayResult<()> {
        let removed = self.delete_where(SUBTASKS, "task_id", id).await?;
        tracing::debug!(task = id, removed, "dropped remote subtasks");
        self.delete(TASKS, id).await
    }

    async fn list_subtasks(&self) -> GatewayResult<Vec<Subtask>> {
        self.list(SUBTASKS).await
    }

    async fn insert_subtask(&self, subtask: &Subtask) -> GatewayResult<Subtask> {
        self.insert(SUBTASKS, subtask).await
    }

    async fn update_subtask(&self, id: &str, patch: &SubtaskPatch) -> GatewayResult<Subtask> {
        self.update(SUBTASKS, id, patch).await
    }

    async fn delete_subtask(&self, id: &str) -> GatewayResult<()> {
        self.delete(SUBTASKS, id).await
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_drops_trailing_slash() {
        let gateway =
            RemoteGateway::new("http://records.local/rest/v1/", None, Duration::from_secs(1))
                .unwrap();
        assert_eq!(gateway.url(TASKS), "http://records.local/rest/v1/tasks");
    }

    #[test]
    fn task_rows_leave_subtasks_out() {
        let now = Utc::now();
        let task = Task {
            id: "t".to_string(),
            title: "Write report".to_string(),
            description: None,
            category_id: "c".to_string(),
            status: TaskStatus::InProgress,
            subtasks: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let row = serde_json::to_value(TaskRow::from(&task)).unwrap();
        assert!(row.get("subtasks").is_none());
        assert_eq!(row["status"], "in-progress");
    }
}
