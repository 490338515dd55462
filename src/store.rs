//! The task store: the single owner of categories, tasks and subtasks.
//!
//! Every mutation validates its input, awaits the gateway write and only then
//! applies the stored record locally. After each successful mutation a new
//! [`StoreSnapshot`] is published to subscribers.
//!
//! Task status is derived from the checklist whenever a task's subtasks
//! change (add, update, delete, toggle). Tasks without subtasks keep whatever
//! status was set on them by hand.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{GatewayError, StoreError, StoreResult};
use crate::gateway::{Gateway, CATEGORIES, SUBTASKS, TASKS};
use crate::models::{
    Category, CategoryPatch, Subtask, SubtaskPatch, Task, TaskPatch, TaskStatus, TodoStats,
};

pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// Starter categories created on an empty board.
pub const DEFAULT_CATEGORIES: [(&str, &str); 3] = [
    ("Self Study", "#3B82F6"),
    ("Cooking Today", "#EF4444"),
    ("Work", "#10B981"),
];

/// Immutable view of the store at one point in time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreSnapshot {
    pub version: u64,
    pub loading: bool,
    pub categories: Vec<Category>,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub category_id: Option<String>,
    pub query: Option<String>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.status.map_or(true, |status| task.status == status)
            && self
                .category_id
                .as_deref()
                .map_or(true, |id| task.category_id == id)
            && self
                .query
                .as_deref()
                .filter(|q| !q.trim().is_empty())
                .map_or(true, |q| task.matches(q.trim()))
    }
}

pub struct TodoStore {
    gateway: Arc<dyn Gateway>,
    clock: Arc<dyn Clock>,
    state: Arc<StoreSnapshot>,
    notifier: watch::Sender<Arc<StoreSnapshot>>,
}

impl TodoStore {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self::with_clock(gateway, Arc::new(SystemClock))
    }

    pub fn with_clock(gateway: Arc<dyn Gateway>, clock: Arc<dyn Clock>) -> Self {
        let state = Arc::new(StoreSnapshot::default());
        let (notifier, _) = watch::channel(state.clone());
        Self {
            gateway,
            clock,
            state,
            notifier,
        }
    }

    // ----- reads -----

    pub fn categories(&self) -> &[Category] {
        &self.state.categories
    }

    pub fn tasks(&self) -> &[Task] {
        &self.state.tasks
    }

    pub fn is_loading(&self) -> bool {
        self.state.loading
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.state.categories.iter().find(|c| c.id == id)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.state.tasks.iter().find(|t| t.id == id)
    }

    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        self.state.clone()
    }

    /// Receives a fresh snapshot after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Arc<StoreSnapshot>> {
        self.notifier.subscribe()
    }

    /// Categories by most recent use first.
    pub fn recent_categories(&self, limit: usize) -> Vec<Category> {
        let mut categories = self.state.categories.clone();
        categories.sort_by(|a, b| b.last_used.cmp(&a.last_used));
        categories.truncate(limit);
        categories
    }

    pub fn tasks_in_category(&self, category_id: &str) -> Vec<&Task> {
        self.state
            .tasks
            .iter()
            .filter(|t| t.category_id == category_id)
            .collect()
    }

    pub fn task_count(&self, category_id: &str) -> usize {
        self.state
            .tasks
            .iter()
            .filter(|t| t.category_id == category_id)
            .count()
    }

    pub fn filter_tasks(&self, filter: &TaskFilter) -> Vec<&Task> {
        self.state.tasks.iter().filter(|t| filter.matches(t)).collect()
    }

    /// Tasks by latest update first.
    pub fn recently_updated(&self, limit: usize) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.state.tasks.iter().collect();
        tasks.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        tasks.truncate(limit);
        tasks
    }

    pub fn stats(&self) -> TodoStats {
        let tasks = &self.state.tasks;
        TodoStats {
            total: tasks.len(),
            completed: tasks.iter().filter(|t| t.status == TaskStatus::Done).count(),
            in_progress: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::InProgress)
                .count(),
            total_categories: self.state.categories.len(),
        }
    }

    // ----- loading -----

    /// Replaces local state with everything the gateway holds.
    pub async fn load(&mut self) -> StoreResult<()> {
        self.state_mut().loading = true;
        self.publish();

        let loaded = self.fetch_all().await;
        let state = self.state_mut();
        state.loading = false;
        match loaded {
            Ok((categories, tasks)) => {
                info!(
                    gateway = self.gateway.name(),
                    categories = categories.len(),
                    tasks = tasks.len(),
                    "loaded board"
                );
                let state = self.state_mut();
                state.categories = categories;
                state.tasks = tasks;
                self.publish();
                Ok(())
            }
            Err(err) => {
                self.publish();
                Err(err)
            }
        }
    }

    async fn fetch_all(&self) -> StoreResult<(Vec<Category>, Vec<Task>)> {
        let categories = self
            .gateway
            .list_categories()
            .await
            .map_err(|err| self.gateway_failure("load", "categories", err))?;
        let mut tasks = self
            .gateway
            .list_tasks()
            .await
            .map_err(|err| self.gateway_failure("load", "tasks", err))?;
        let subtasks = self
            .gateway
            .list_subtasks()
            .await
            .map_err(|err| self.gateway_failure("load", "subtasks", err))?;

        let mut by_task: HashMap<String, Vec<Subtask>> = HashMap::new();
        for subtask in subtasks {
            by_task
                .entry(subtask.task_id.clone())
                .or_default()
                .push(subtask);
        }
        for task in &mut tasks {
            let mut subtasks = by_task.remove(&task.id).unwrap_or_default();
            subtasks.sort_by_key(|s| s.created_at);
            task.subtasks = subtasks;
        }
        for (task_id, orphans) in by_task {
            warn!(task = %task_id, count = orphans.len(), "skipping subtasks of unknown task");
        }
        Ok((categories, tasks))
    }

    /// Creates the starter categories when the board has none.
    pub async fn seed_default_categories(&mut self) -> StoreResult<Vec<Category>> {
        if !self.state.categories.is_empty() {
            return Ok(Vec::new());
        }
        let mut created = Vec::with_capacity(DEFAULT_CATEGORIES.len());
        for (name, color) in DEFAULT_CATEGORIES {
            created.push(self.add_category(name, Some(color)).await?);
        }
        info!(count = created.len(), "seeded default categories");
        Ok(created)
    }

    // ----- categories -----

    pub async fn add_category(&mut self, name: &str, color: Option<&str>) -> StoreResult<Category> {
        let name = required("category name", name)?;
        let color = color.map(valid_color).transpose()?;
        let now = self.clock.now();
        let category = Category {
            id: new_id(),
            name,
            color,
            created_at: now,
            last_used: now,
        };

        let stored = self
            .gateway
            .insert_category(&category)
            .await
            .map_err(|err| self.gateway_failure("add_category", &category.id, err))?;
        self.state_mut().categories.push(stored.clone());
        self.publish();
        debug!(category = %stored.id, name = %stored.name, "category added");
        Ok(stored)
    }

    pub async fn update_category(
        &mut self,
        id: &str,
        mut patch: CategoryPatch,
    ) -> StoreResult<Category> {
        let index = self.category_index(id)?;
        if let Some(name) = &patch.name {
            patch.name = Some(required("category name", name)?);
        }
        if let Some(Some(color)) = &patch.color {
            patch.color = Some(Some(valid_color(color)?));
        }

        let stored = self
            .gateway
            .update_category(id, &patch)
            .await
            .map_err(|err| self.gateway_failure("update_category", id, err))?;
        self.state_mut().categories[index] = stored.clone();
        self.publish();
        debug!(category = %id, "category updated");
        Ok(stored)
    }

    /// Deletes the category and every task filed under it.
    pub async fn delete_category(&mut self, id: &str) -> StoreResult<()> {
        self.category_index(id)?;
        let doomed: Vec<String> = self
            .state
            .tasks
            .iter()
            .filter(|t| t.category_id == id)
            .map(|t| t.id.clone())
            .collect();

        let before = (self.state.tasks.len(), self.state.categories.len());
        let result = self.delete_category_cascade(id, &doomed).await;
        if (self.state.tasks.len(), self.state.categories.len()) != before {
            self.publish();
        }
        if result.is_ok() {
            debug!(category = %id, tasks = doomed.len(), "category deleted");
        }
        result
    }

    async fn delete_category_cascade(&mut self, id: &str, doomed: &[String]) -> StoreResult<()> {
        for task_id in doomed {
            self.gateway
                .delete_task(task_id)
                .await
                .map_err(|err| self.gateway_failure("delete_category", task_id, err))?;
            self.state_mut().tasks.retain(|t| &t.id != task_id);
        }
        self.gateway
            .delete_category(id)
            .await
            .map_err(|err| self.gateway_failure("delete_category", id, err))?;
        self.state_mut().categories.retain(|c| c.id != id);
        Ok(())
    }

    // ----- tasks -----

    pub async fn add_task(
        &mut self,
        title: &str,
        category_id: &str,
        description: Option<&str>,
    ) -> StoreResult<Task> {
        let title = required("task title", title)?;
        self.category_index(category_id)?;
        let now = self.clock.now();
        let task = Task {
            id: new_id(),
            title,
            description: optional_text(description),
            category_id: category_id.to_string(),
            status: TaskStatus::Todo,
            subtasks: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let stored = self
            .gateway
            .insert_task(&task)
            .await
            .map_err(|err| self.gateway_failure("add_task", &task.id, err))?;
        self.touch_category("add_task", category_id, now).await;

        self.state_mut().tasks.push(stored.clone());
        self.publish();
        debug!(task = %stored.id, category = %category_id, "task added");
        Ok(stored)
    }

    /// Merges `patch` into the task. `updated_at` is always refreshed.
    pub async fn update_task(&mut self, id: &str, mut patch: TaskPatch) -> StoreResult<Task> {
        let index = self.task_index(id)?;
        if let Some(title) = &patch.title {
            patch.title = Some(required("task title", title)?);
        }
        if let Some(description) = &patch.description {
            patch.description = Some(optional_text(description.as_deref()));
        }
        let now = self.clock.now();
        patch.updated_at = Some(now);

        let moved_to = patch
            .category_id
            .clone()
            .filter(|category_id| *category_id != self.state.tasks[index].category_id);
        if let Some(category_id) = &moved_to {
            self.category_index(category_id)?;
        }

        let task = self.write_task(index, "update_task", &patch).await?;
        if let Some(category_id) = &moved_to {
            self.touch_category("update_task", category_id, now).await;
        }
        self.publish();
        debug!(task = %id, "task updated");
        Ok(task)
    }

    pub async fn delete_task(&mut self, id: &str) -> StoreResult<()> {
        self.task_index(id)?;
        self.gateway
            .delete_task(id)
            .await
            .map_err(|err| self.gateway_failure("delete_task", id, err))?;
        self.state_mut().tasks.retain(|t| t.id != id);
        self.publish();
        debug!(task = %id, "task deleted");
        Ok(())
    }

    // ----- subtasks -----

    pub async fn add_subtask(
        &mut self,
        task_id: &str,
        title: &str,
        description: Option<&str>,
    ) -> StoreResult<Subtask> {
        let title = required("subtask title", title)?;
        let index = self.task_index(task_id)?;
        let subtask = Subtask {
            id: new_id(),
            task_id: task_id.to_string(),
            title,
            description: optional_text(description),
            completed: false,
            created_at: self.clock.now(),
        };

        let stored = self
            .gateway
            .insert_subtask(&subtask)
            .await
            .map_err(|err| self.gateway_failure("add_subtask", &subtask.id, err))?;
        self.state_mut().tasks[index].subtasks.push(stored.clone());

        let refreshed = self.refresh_task(index, "add_subtask").await;
        self.publish();
        refreshed?;
        debug!(task = %task_id, subtask = %stored.id, "subtask added");
        Ok(stored)
    }

    pub async fn update_subtask(
        &mut self,
        task_id: &str,
        subtask_id: &str,
        mut patch: SubtaskPatch,
    ) -> StoreResult<Subtask> {
        let (index, position) = self.subtask_position(task_id, subtask_id)?;
        if let Some(title) = &patch.title {
            patch.title = Some(required("subtask title", title)?);
        }
        if let Some(description) = &patch.description {
            patch.description = Some(optional_text(description.as_deref()));
        }

        let stored = self
            .gateway
            .update_subtask(subtask_id, &patch)
            .await
            .map_err(|err| self.gateway_failure("update_subtask", subtask_id, err))?;
        self.state_mut().tasks[index].subtasks[position] = stored.clone();

        let refreshed = self.refresh_task(index, "update_subtask").await;
        self.publish();
        refreshed?;
        debug!(task = %task_id, subtask = %subtask_id, "subtask updated");
        Ok(stored)
    }

    pub async fn delete_subtask(&mut self, task_id: &str, subtask_id: &str) -> StoreResult<()> {
        let (index, position) = self.subtask_position(task_id, subtask_id)?;
        self.gateway
            .delete_subtask(subtask_id)
            .await
            .map_err(|err| self.gateway_failure("delete_subtask", subtask_id, err))?;
        self.state_mut().tasks[index].subtasks.remove(position);

        let refreshed = self.refresh_task(index, "delete_subtask").await;
        self.publish();
        refreshed?;
        debug!(task = %task_id, subtask = %subtask_id, "subtask deleted");
        Ok(())
    }

    /// Flips the subtask's completion; the task status follows the checklist.
    pub async fn toggle_subtask(&mut self, task_id: &str, subtask_id: &str) -> StoreResult<Subtask> {
        let (index, position) = self.subtask_position(task_id, subtask_id)?;
        let completed = self.state.tasks[index].subtasks[position].completed;
        let patch = SubtaskPatch {
            completed: Some(!completed),
            ..SubtaskPatch::default()
        };
        self.update_subtask(task_id, subtask_id, patch).await
    }

    // ----- internals -----

    fn state_mut(&mut self) -> &mut StoreSnapshot {
        Arc::make_mut(&mut self.state)
    }

    fn publish(&mut self) {
        self.state_mut().version += 1;
        self.notifier.send_replace(self.state.clone());
    }

    fn category_index(&self, id: &str) -> StoreResult<usize> {
        self.state
            .categories
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| StoreError::not_found("category", id))
    }

    fn task_index(&self, id: &str) -> StoreResult<usize> {
        self.state
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| StoreError::not_found("task", id))
    }

    fn subtask_position(&self, task_id: &str, subtask_id: &str) -> StoreResult<(usize, usize)> {
        let index = self.task_index(task_id)?;
        let position = self.state.tasks[index]
            .subtasks
            .iter()
            .position(|s| s.id == subtask_id)
            .ok_or_else(|| StoreError::not_found("subtask", subtask_id))?;
        Ok((index, position))
    }

    /// Bumps `last_used` on the category and applies the stored record locally.
    ///
    /// Runs after the task write it belongs to has been stored. A failed touch
    /// is logged and leaves the category's recency as it was on both sides.
    async fn touch_category(&mut self, op: &'static str, category_id: &str, at: DateTime<Utc>) {
        let Ok(index) = self.category_index(category_id) else {
            return;
        };
        match self
            .gateway
            .update_category(category_id, &CategoryPatch::touched(at))
            .await
        {
            Ok(stored) => self.state_mut().categories[index] = stored,
            Err(err) => warn!(
                op,
                category = %category_id,
                gateway = self.gateway.name(),
                error = %err,
                "category recency not updated"
            ),
        }
    }

    /// Refreshes `updated_at` and, for tasks with a checklist, the derived status.
    async fn refresh_task(&mut self, index: usize, op: &'static str) -> StoreResult<Task> {
        let task = &self.state.tasks[index];
        let mut patch = TaskPatch {
            updated_at: Some(self.clock.now()),
            ..TaskPatch::default()
        };
        if !task.subtasks.is_empty() {
            patch.status = Some(TaskStatus::derive(&task.subtasks));
        }
        self.write_task(index, op, &patch).await
    }

    /// Sends a task patch and applies the stored fields locally, keeping the
    /// local checklist.
    async fn write_task(
        &mut self,
        index: usize,
        op: &'static str,
        patch: &TaskPatch,
    ) -> StoreResult<Task> {
        let id = self.state.tasks[index].id.clone();
        let stored = self
            .gateway
            .update_task(&id, patch)
            .await
            .map_err(|err| self.gateway_failure(op, &id, err))?;
        let task = &mut self.state_mut().tasks[index];
        let subtasks = std::mem::take(&mut task.subtasks);
        *task = Task { subtasks, ..stored };
        Ok(task.clone())
    }

    fn gateway_failure(&self, op: &'static str, id: &str, err: GatewayError) -> StoreError {
        error!(op, id, gateway = self.gateway.name(), error = %err, "gateway call failed");
        match err {
            GatewayError::NotFound { collection, id } => StoreError::not_found(kind_of(collection), id),
            other => StoreError::Gateway(other),
        }
    }
}

fn kind_of(collection: &'static str) -> &'static str {
    match collection {
        CATEGORIES => "category",
        TASKS => "task",
        SUBTASKS => "subtask",
        other => other,
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn required(field: &str, value: &str) -> StoreResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(StoreError::validation(format!("{field} must not be empty")));
    }
    Ok(value.to_string())
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Accepts `#RRGGBB`.
fn valid_color(value: &str) -> StoreResult<String> {
    let value = value.trim();
    let hex = value.strip_prefix('#').unwrap_or_default();
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(StoreError::validation(format!(
            "color `{value}` is not a #RRGGBB value"
        )));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::clock::SteppingClock;
    use crate::gateway::MemoryGateway;

    fn store() -> TodoStore {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        TodoStore::with_clock(
            Arc::new(MemoryGateway::new()),
            Arc::new(SteppingClock::new(start, Duration::seconds(1))),
        )
    }

    #[tokio::test]
    async fn add_category_trims_and_validates() {
        let mut store = store();
        let category = store.add_category("  Errands ", Some("#AABBCC")).await.unwrap();
        assert_eq!(category.name, "Errands");
        assert_eq!(category.created_at, category.last_used);

        assert!(store.add_category("   ", None).await.unwrap_err().is_validation());
        assert!(store
            .add_category("Paint", Some("blue"))
            .await
            .unwrap_err()
            .is_validation());
        assert_eq!(store.categories().len(), 1);
    }

    #[tokio::test]
    async fn update_category_keeps_identity() {
        let mut store = store();
        let category = store.add_category("Home", None).await.unwrap();

        let updated = store
            .update_category(&category.id, CategoryPatch::name("House"))
            .await
            .unwrap();
        assert_eq!(updated.id, category.id);
        assert_eq!(updated.name, "House");
        assert_eq!(store.category(&category.id).unwrap().name, "House");

        let err = store
            .update_category("missing", CategoryPatch::name("x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn manual_status_survives_on_tasks_without_subtasks() {
        let mut store = store();
        let category = store.add_category("Work", None).await.unwrap();
        let task = store.add_task("Ship it", &category.id, None).await.unwrap();

        store
            .update_task(&task.id, TaskPatch::status(TaskStatus::Done))
            .await
            .unwrap();
        assert_eq!(store.task(&task.id).unwrap().status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn deleting_the_last_subtask_keeps_status() {
        let mut store = store();
        let category = store.add_category("Work", None).await.unwrap();
        let task = store.add_task("Ship it", &category.id, None).await.unwrap();
        let subtask = store.add_subtask(&task.id, "Tag release", None).await.unwrap();
        store.toggle_subtask(&task.id, &subtask.id).await.unwrap();
        assert_eq!(store.task(&task.id).unwrap().status, TaskStatus::Done);

        store.delete_subtask(&task.id, &subtask.id).await.unwrap();
        let task = store.task(&task.id).unwrap();
        assert!(task.subtasks.is_empty());
        assert_eq!(task.status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn adding_a_subtask_to_a_done_task_reopens_it() {
        let mut store = store();
        let category = store.add_category("Work", None).await.unwrap();
        let task = store.add_task("Ship it", &category.id, None).await.unwrap();
        let first = store.add_subtask(&task.id, "Build", None).await.unwrap();
        store.toggle_subtask(&task.id, &first.id).await.unwrap();

        store.add_subtask(&task.id, "Publish", None).await.unwrap();
        assert_eq!(store.task(&task.id).unwrap().status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn update_subtask_edits_fields_and_rederives_status() {
        let mut store = store();
        let category = store.add_category("Garden", None).await.unwrap();
        let task = store.add_task("Repot", &category.id, None).await.unwrap();
        let subtask = store
            .add_subtask(&task.id, "Soil", Some("two bags"))
            .await
            .unwrap();
        store.add_subtask(&task.id, "Pots", None).await.unwrap();
        let before = store.task(&task.id).unwrap().clone();

        let err = store
            .update_subtask(
                &task.id,
                &subtask.id,
                SubtaskPatch {
                    title: Some("  ".to_string()),
                    ..SubtaskPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.task(&task.id).unwrap(), &before);

        let updated = store
            .update_subtask(
                &task.id,
                &subtask.id,
                SubtaskPatch {
                    title: Some(" Compost ".to_string()),
                    description: Some(None),
                    ..SubtaskPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Compost");
        assert_eq!(updated.description, None);
        let after_edit = store.task(&task.id).unwrap().clone();
        assert_eq!(after_edit.subtasks[0], updated);
        assert!(after_edit.updated_at > before.updated_at);
        assert_eq!(after_edit.status, TaskStatus::Todo);

        store
            .update_subtask(
                &task.id,
                &subtask.id,
                SubtaskPatch {
                    completed: Some(true),
                    ..SubtaskPatch::default()
                },
            )
            .await
            .unwrap();
        let task = store.task(&task.id).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(task.updated_at > after_edit.updated_at);
    }

    #[tokio::test]
    async fn moving_a_task_touches_the_new_category() {
        let mut store = store();
        let home = store.add_category("Home", None).await.unwrap();
        let work = store.add_category("Work", None).await.unwrap();
        let task = store.add_task("Laundry", &work.id, None).await.unwrap();
        assert_eq!(store.recent_categories(1)[0].id, work.id);

        let moved = store
            .update_task(
                &task.id,
                TaskPatch {
                    category_id: Some(home.id.clone()),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.category_id, home.id);
        assert_eq!(store.recent_categories(1)[0].id, home.id);

        let err = store
            .update_task(
                &task.id,
                TaskPatch {
                    category_id: Some("nowhere".to_string()),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn filter_and_recency_queries() {
        let mut store = store();
        let home = store.add_category("Home", None).await.unwrap();
        let work = store.add_category("Work", None).await.unwrap();
        let a = store
            .add_task("Fix sink", &home.id, Some("kitchen leak"))
            .await
            .unwrap();
        let b = store.add_task("Write report", &work.id, None).await.unwrap();
        store
            .update_task(&a.id, TaskPatch::status(TaskStatus::InProgress))
            .await
            .unwrap();

        let by_query = store.filter_tasks(&TaskFilter {
            query: Some("LEAK".to_string()),
            ..TaskFilter::default()
        });
        assert_eq!(by_query.len(), 1);
        assert_eq!(by_query[0].id, a.id);

        let by_status = store.filter_tasks(&TaskFilter {
            status: Some(TaskStatus::Todo),
            ..TaskFilter::default()
        });
        assert_eq!(by_status[0].id, b.id);

        assert_eq!(store.task_count(&home.id), 1);
        assert_eq!(store.tasks_in_category(&work.id)[0].id, b.id);
        assert_eq!(store.recently_updated(1)[0].id, a.id);
    }

    #[tokio::test]
    async fn seeding_only_happens_on_an_empty_board() {
        let mut store = store();
        let seeded = store.seed_default_categories().await.unwrap();
        assert_eq!(seeded.len(), DEFAULT_CATEGORIES.len());
        assert!(seeded.iter().all(|c| c.color.is_some()));

        assert!(store.seed_default_categories().await.unwrap().is_empty());
        assert_eq!(store.categories().len(), DEFAULT_CATEGORIES.len());
    }

    #[tokio::test]
    async fn load_rebuilds_checklists_from_the_gateway() {
        let gateway: Arc<dyn Gateway> = Arc::new(MemoryGateway::new());
        let mut writer = TodoStore::new(gateway.clone());
        let category = writer.add_category("Home", None).await.unwrap();
        let task = writer.add_task("Clean", &category.id, None).await.unwrap();
        writer.add_subtask(&task.id, "Floors", None).await.unwrap();
        writer.add_subtask(&task.id, "Windows", None).await.unwrap();

        let mut reader = TodoStore::new(gateway);
        let mut updates = reader.subscribe();
        reader.load().await.unwrap();

        assert!(!reader.is_loading());
        assert_eq!(reader.categories(), writer.categories());
        let loaded = reader.task(&task.id).unwrap();
        let titles: Vec<_> = loaded.subtasks.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["Floors", "Windows"]);

        assert!(updates.has_changed().unwrap());
        let latest = updates.borrow_and_update().clone();
        assert_eq!(latest.version, 2);
        assert!(!latest.loading);
    }

    #[test]
    fn color_must_be_hex() {
        assert!(valid_color("#0f0F0f").is_ok());
        assert!(valid_color("#0f0").is_err());
        assert!(valid_color("0f0f0f0").is_err());
    }
}
