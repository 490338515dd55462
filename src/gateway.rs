//! Storage abstraction the store persists through.
//!
//! A gateway is a plain record store: three collections (categories, tasks,
//! subtasks) with list/insert/update/delete each. It knows nothing about
//! status derivation or cascades beyond dropping a task's subtasks with it;
//! those rules live in [`crate::store::TodoStore`].

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{GatewayError, GatewayResult};
use crate::models::{Category, CategoryPatch, Subtask, SubtaskPatch, Task, TaskPatch};

pub const CATEGORIES: &str = "categories";
pub const TASKS: &str = "tasks";
pub const SUBTASKS: &str = "subtasks";

#[async_trait]
pub trait Gateway: Send + Sync {
    /// All categories, oldest first.
    async fn list_categories(&self) -> GatewayResult<Vec<Category>>;
    async fn insert_category(&self, category: &Category) -> GatewayResult<Category>;
    async fn update_category(&self, id: &str, patch: &CategoryPatch) -> GatewayResult<Category>;
    async fn delete_category(&self, id: &str) -> GatewayResult<()>;

    /// All tasks, oldest first. Returned tasks carry no subtasks.
    async fn list_tasks(&self) -> GatewayResult<Vec<Task>>;
    async fn insert_task(&self, task: &Task) -> GatewayResult<Task>;
    async fn update_task(&self, id: &str, patch: &TaskPatch) -> GatewayResult<Task>;
    /// Deletes the task together with its subtasks.
    async fn delete_task(&self, id: &str) -> GatewayResult<()>;

    /// All subtasks across tasks, oldest first.
    async fn list_subtasks(&self) -> GatewayResult<Vec<Subtask>>;
    async fn insert_subtask(&self, subtask: &Subtask) -> GatewayResult<Subtask>;
    async fn update_subtask(&self, id: &str, patch: &SubtaskPatch) -> GatewayResult<Subtask>;
    async fn delete_subtask(&self, id: &str) -> GatewayResult<()>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

#[derive(Debug, Default)]
struct Tables {
    categories: Vec<Category>,
    tasks: Vec<Task>,
    subtasks: Vec<Subtask>,
}

/// Gateway that keeps records in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    tables: Mutex<Tables>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> GatewayResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| GatewayError::Poisoned)
    }
}

fn sorted_by_created<T: Clone, K: Ord>(records: &[T], key: impl Fn(&T) -> K) -> Vec<T> {
    let mut records = records.to_vec();
    records.sort_by_key(key);
    records
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn list_categories(&self) -> GatewayResult<Vec<Category>> {
        Ok(sorted_by_created(&self.tables()?.categories, |c: &Category| c.created_at))
    }

    async fn insert_category(&self, category: &Category) -> GatewayResult<Category> {
        self.tables()?.categories.push(category.clone());
        Ok(category.clone())
    }

    async fn update_category(&self, id: &str, patch: &CategoryPatch) -> GatewayResult<Category> {
        let mut tables = self.tables()?;
        let category = tables
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| GatewayError::not_found(CATEGORIES, id))?;
        category.apply(patch);
        Ok(category.clone())
    }

    async fn delete_category(&self, id: &str) -> GatewayResult<()> {
        let mut tables = self.tables()?;
        let before = tables.categories.len();
        tables.categories.retain(|c| c.id != id);
        if tables.categories.len() == before {
            return Err(GatewayError::not_found(CATEGORIES, id));
        }
        Ok(())
    }

    async fn list_tasks(&self) -> GatewayResult<Vec<Task>> {
        Ok(sorted_by_created(&self.tables()?.tasks, |t: &Task| t.created_at))
    }

    async fn insert_task(&self, task: &Task) -> GatewayResult<Task> {
        let stored = Task {
            subtasks: Vec::new(),
            ..task.clone()
        };
        self.tables()?.tasks.push(stored.clone());
        Ok(stored)
    }

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> GatewayResult<Task> {
        let mut tables = self.tables()?;
        let task = tables
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| GatewayError::not_found(TASKS, id))?;
        task.apply(patch);
        Ok(task.clone())
    }

    async fn delete_task(&self, id: &str) -> GatewayResult<()> {
        let mut tables = self.tables()?;
        let before = tables.tasks.len();
        tables.tasks.retain(|t| t.id != id);
        if tables.tasks.len() == before {
            return Err(GatewayError::not_found(TASKS, id));
        }
        tables.subtasks.retain(|s| s.task_id != id);
        Ok(())
    }

    async fn list_subtasks(&self) -> GatewayResult<Vec<Subtask>> {
        Ok(sorted_by_created(&self.tables()?.subtasks, |s: &Subtask| s.created_at))
    }

    async fn insert_subtask(&self, subtask: &Subtask) -> GatewayResult<Subtask> {
        let mut tables = self.tables()?;
        if !tables.tasks.iter().any(|t| t.id == subtask.task_id) {
            return Err(GatewayError::not_found(TASKS, subtask.task_id.clone()));
        }
        tables.subtasks.push(subtask.clone());
        Ok(subtask.clone())
    }

    async fn update_subtask(&self, id: &str, patch: &SubtaskPatch) -> GatewayResult<Subtask> {
        let mut tables = self.tables()?;
        let subtask = tables
            .subtasks
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| GatewayError::not_found(SUBTASKS, id))?;
        subtask.apply(patch);
        Ok(subtask.clone())
    }

    async fn delete_subtask(&self, id: &str) -> GatewayResult<()> {
        let mut tables = self.tables()?;
        let before = tables.subtasks.len();
        tables.subtasks.retain(|s| s.id != id);
        if tables.subtasks.len() == before {
            return Err(GatewayError::not_found(SUBTASKS, id));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
