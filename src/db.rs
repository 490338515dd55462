use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{Gateway, CATEGORIES, SUBTASKS, TASKS};
use crate::models::{Category, CategoryPatch, Subtask, SubtaskPatch, Task, TaskPatch, TaskStatus};

/// Local-file gateway backed by SQLite.
pub struct SqliteGateway {
    conn: Mutex<Connection>,
}

impl SqliteGateway {
    pub fn connect<P: AsRef<Path>>(path: P) -> GatewayResult<Self> {
        tracing::debug!(path = %path.as_ref().display(), "opening sqlite database");
        Self::from_connection(Connection::open(path.as_ref())?)
    }

    pub fn in_memory() -> GatewayResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> GatewayResult<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> GatewayResult<()> {
        self.conn()?.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                color TEXT,
                created_at TEXT NOT NULL,
                last_used TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                category_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'todo',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS subtasks (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                description TEXT,
                completed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> GatewayResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| GatewayError::Poisoned)
    }

    fn category(conn: &Connection, id: &str) -> GatewayResult<Category> {
        conn.query_row(
            "SELECT id, name, color, created_at, last_used FROM categories WHERE id = ?1",
            params![id],
            category_from_row,
        )
        .optional()?
        .ok_or_else(|| GatewayError::not_found(CATEGORIES, id))
    }

    fn task(conn: &Connection, id: &str) -> GatewayResult<Task> {
        conn.query_row(
            "SELECT id, title, description, category_id, status, created_at, updated_at
             FROM tasks WHERE id = ?1",
            params![id],
            task_from_row,
        )
        .optional()?
        .ok_or_else(|| GatewayError::not_found(TASKS, id))
    }

    fn subtask(conn: &Connection, id: &str) -> GatewayResult<Subtask> {
        conn.query_row(
            "SELECT id, task_id, title, description, completed, created_at
             FROM subtasks WHERE id = ?1",
            params![id],
            subtask_from_row,
        )
        .optional()?
        .ok_or_else(|| GatewayError::not_found(SUBTASKS, id))
    }
}

#[async_trait]
impl Gateway for SqliteGateway {
    async fn list_categories(&self) -> GatewayResult<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, color, created_at, last_used FROM categories ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], category_from_row)?;

        let mut categories = Vec::new();
        for category in rows {
            categories.push(category?);
        }
        Ok(categories)
    }

    async fn insert_category(&self, category: &Category) -> GatewayResult<Category> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO categories (id, name, color, created_at, last_used) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                category.id,
                category.name,
                category.color,
                format_datetime(&category.created_at),
                format_datetime(&category.last_used),
            ],
        )?;
        Self::category(&conn, &category.id)
    }

    async fn update_category(&self, id: &str, patch: &CategoryPatch) -> GatewayResult<Category> {
        let conn = self.conn()?;
        let mut category = Self::category(&conn, id)?;
        category.apply(patch);
        conn.execute(
            "UPDATE categories SET name = ?1, color = ?2, last_used = ?3 WHERE id = ?4",
            params![
                category.name,
                category.color,
                format_datetime(&category.last_used),
                id
            ],
        )?;
        Ok(category)
    }

    async fn delete_category(&self, id: &str) -> GatewayResult<()> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM categories WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(GatewayError::not_found(CATEGORIES, id));
        }
        Ok(())
    }

    async fn list_tasks(&self) -> GatewayResult<Vec<Task>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, description, category_id, status, created_at, updated_at
             FROM tasks ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], task_from_row)?;

        let mut tasks = Vec::new();
        for task in rows {
            tasks.push(task?);
        }
        Ok(tasks)
    }

    async fn insert_task(&self, task: &Task) -> GatewayResult<Task> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO tasks (id, title, description, category_id, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                task.id,
                task.title,
                task.description,
                task.category_id,
                task.status.as_str(),
                format_datetime(&task.created_at),
                format_datetime(&task.updated_at),
            ],
        )?;
        Self::task(&conn, &task.id)
    }

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> GatewayResult<Task> {
        let conn = self.conn()?;
        let mut task = Self::task(&conn, id)?;
        task.apply(patch);
        conn.execute(
            "UPDATE tasks SET title = ?1, description = ?2, category_id = ?3, status = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                task.title,
                task.description,
                task.category_id,
                task.status.as_str(),
                format_datetime(&task.updated_at),
                id,
            ],
        )?;
        Ok(task)
    }

    async fn delete_task(&self, id: &str) -> GatewayResult<()> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(GatewayError::not_found(TASKS, id));
        }
        Ok(())
    }

    async fn list_subtasks(&self) -> GatewayResult<Vec<Subtask>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, task_id, title, description, completed, created_at
             FROM subtasks ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], subtask_from_row)?;

        let mut subtasks = Vec::new();
        for subtask in rows {
            subtasks.push(subtask?);
        }
        Ok(subtasks)
    }

    async fn insert_subtask(&self, subtask: &Subtask) -> GatewayResult<Subtask> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO subtasks (id, task_id, title, description, completed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                subtask.id,
                subtask.task_id,
                subtask.title,
                subtask.description,
                subtask.completed,
                format_datetime(&subtask.created_at),
            ],
        )?;
        Self::subtask(&conn, &subtask.id)
    }

    async fn update_subtask(&self, id: &str, patch: &SubtaskPatch) -> GatewayResult<Subtask> {
        let conn = self.conn()?;
        let mut subtask = Self::subtask(&conn, id)?;
        subtask.apply(patch);
        conn.execute(
            "UPDATE subtasks SET title = ?1, description = ?2, completed = ?3 WHERE id = ?4",
            params![subtask.title, subtask.description, subtask.completed, id],
        )?;
        Ok(subtask)
    }

    async fn delete_subtask(&self, id: &str) -> GatewayResult<()> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM subtasks WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(GatewayError::not_found(SUBTASKS, id));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    let created_at: String = row.get(3)?;
    let last_used: String = row.get(4)?;
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        created_at: parse_datetime(&created_at),
        last_used: parse_datetime(&last_used),
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let status: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category_id: row.get(3)?,
        status: status.parse().unwrap_or_else(|err| {
            tracing::warn!(%err, "falling back to todo");
            TaskStatus::Todo
        }),
        subtasks: Vec::new(),
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

fn subtask_from_row(row: &Row<'_>) -> rusqlite::Result<Subtask> {
    let created_at: String = row.get(5)?;
    Ok(Subtask {
        id: row.get(0)?,
        task_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        completed: row.get(4)?,
        created_at: parse_datetime(&created_at),
    })
}

// Fixed-width timestamps keep ORDER BY on the text column chronological.
fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_datetime(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
