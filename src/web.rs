use std::sync::Arc;

use axum::{
    extract::{Form, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::models::{Category, CategoryPatch, Task, TaskPatch, TaskStatus, TodoStats};
use crate::store::{StoreSnapshot, TaskFilter, TodoStore, DEFAULT_RECENT_LIMIT};

#[derive(Clone)]
pub struct AppState {
    store: Arc<Mutex<TodoStore>>,
}

#[derive(Deserialize, Default)]
pub struct BoardQuery {
    status: Option<String>,
    category: Option<String>,
    q: Option<String>,
}

#[derive(Deserialize)]
struct AddCategoryForm {
    name: String,
    color: Option<String>,
}

#[derive(Deserialize)]
struct RenameCategoryForm {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct IdForm {
    id: String,
}

#[derive(Deserialize)]
struct AddTaskForm {
    title: String,
    category_id: String,
    description: Option<String>,
}

#[derive(Deserialize)]
struct StatusForm {
    id: String,
    status: String,
}

#[derive(Deserialize)]
struct AddSubtaskForm {
    task_id: String,
    title: String,
}

#[derive(Deserialize)]
struct SubtaskForm {
    task_id: String,
    subtask_id: String,
}

pub fn router(store: Arc<Mutex<TodoStore>>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/state", get(api_state))
        .route("/api/stats", get(api_stats))
        .route("/categories/add", post(add_category))
        .route("/categories/rename", post(rename_category))
        .route("/categories/delete", post(delete_category))
        .route("/tasks/add", post(add_task))
        .route("/tasks/status", post(set_task_status))
        .route("/tasks/delete", post(delete_task))
        .route("/subtasks/add", post(add_subtask))
        .route("/subtasks/toggle", post(toggle_subtask))
        .route("/subtasks/delete", post(delete_subtask))
        .with_state(AppState { store })
}

async fn api_state(State(state): State<AppState>) -> Json<StoreSnapshot> {
    let snapshot = state.store.lock().await.snapshot();
    Json(snapshot.as_ref().clone())
}

async fn api_stats(State(state): State<AppState>) -> Json<TodoStats> {
    Json(state.store.lock().await.stats())
}

async fn add_category(
    State(state): State<AppState>,
    Form(form): Form<AddCategoryForm>,
) -> Result<Response, StatusCode> {
    let color = form.color.as_deref().filter(|c| !c.trim().is_empty());
    state
        .store
        .lock()
        .await
        .add_category(&form.name, color)
        .await
        .map_err(reject)?;
    Ok(redirect_home())
}

async fn rename_category(
    State(state): State<AppState>,
    Form(form): Form<RenameCategoryForm>,
) -> Result<Response, StatusCode> {
    state
        .store
        .lock()
        .await
        .update_category(&form.id, CategoryPatch::name(form.name))
        .await
        .map_err(reject)?;
    Ok(redirect_home())
}

async fn delete_category(
    State(state): State<AppState>,
    Form(form): Form<IdForm>,
) -> Result<Response, StatusCode> {
    state
        .store
        .lock()
        .await
        .delete_category(&form.id)
        .await
        .map_err(reject)?;
    Ok(redirect_home())
}

async fn add_task(
    State(state): State<AppState>,
    Form(form): Form<AddTaskForm>,
) -> Result<Response, StatusCode> {
    state
        .store
        .lock()
        .await
        .add_task(&form.title, &form.category_id, form.description.as_deref())
        .await
        .map_err(reject)?;
    Ok(redirect_home())
}

async fn set_task_status(
    State(state): State<AppState>,
    Form(form): Form<StatusForm>,
) -> Result<Response, StatusCode> {
    let status: TaskStatus = form.status.parse().map_err(|err| {
        tracing::warn!(%err, "rejected status change");
        StatusCode::BAD_REQUEST
    })?;
    state
        .store
        .lock()
        .await
        .update_task(&form.id, TaskPatch::status(status))
        .await
        .map_err(reject)?;
    Ok(redirect_home())
}

async fn delete_task(
    State(state): State<AppState>,
    Form(form): Form<IdForm>,
) -> Result<Response, StatusCode> {
    state
        .store
        .lock()
        .await
        .delete_task(&form.id)
        .await
        .map_err(reject)?;
    Ok(redirect_home())
}

async fn add_subtask(
    State(state): State<AppState>,
    Form(form): Form<AddSubtaskForm>,
) -> Result<Response, StatusCode> {
    state
        .store
        .lock()
        .await
        .add_subtask(&form.task_id, &form.title, None)
        .await
        .map_err(reject)?;
    Ok(redirect_home())
}

async fn toggle_subtask(
    State(state): State<AppState>,
    Form(form): Form<SubtaskForm>,
) -> Result<Response, StatusCode> {
    state
        .store
        .lock()
        .await
        .toggle_subtask(&form.task_id, &form.subtask_id)
        .await
        .map_err(reject)?;
    Ok(redirect_home())
}

async fn delete_subtask(
    State(state): State<AppState>,
    Form(form): Form<SubtaskForm>,
) -> Result<Response, StatusCode> {
    state
        .store
        .lock()
        .await
        .delete_subtask(&form.task_id, &form.subtask_id)
        .await
        .map_err(reject)?;
    Ok(redirect_home())
}

fn reject(err: StoreError) -> StatusCode {
    match err {
        StoreError::Validation(message) => {
            tracing::warn!(%message, "rejected input");
            StatusCode::BAD_REQUEST
        }
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        // already logged by the store
        StoreError::Gateway(_) => StatusCode::BAD_GATEWAY,
    }
}

fn redirect_home() -> Response {
    (StatusCode::SEE_OTHER, [(header::LOCATION, "/")]).into_response()
}

impl BoardQuery {
    fn filter(&self) -> TaskFilter {
        let chosen = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty() && *v != "all")
                .map(str::to_string)
        };
        TaskFilter {
            status: chosen(&self.status).and_then(|s| s.parse().ok()),
            category_id: chosen(&self.category),
            query: chosen(&self.q),
        }
    }
}

async fn index(State(state): State<AppState>, Query(query): Query<BoardQuery>) -> Html<String> {
    let store = state.store.lock().await;
    let filter = query.filter();
    Html(render_board(&store, &filter))
}

const STYLE: &str = r#"
    :root {
      color-scheme: light;
      font-family: "Inter", system-ui, -apple-system, sans-serif;
      background: #f4f5f7;
    }
    body { margin: 0; padding: 32px; display: flex; justify-content: center; }
    .app {
      width: min(960px, 100%);
      background: #ffffff;
      border-radius: 16px;
      box-shadow: 0 24px 48px rgba(15, 23, 42, 0.08);
      padding: 28px;
    }
    h1 { margin: 0 0 16px 0; font-size: 28px; letter-spacing: -0.02em; }
    h2 { font-size: 18px; margin: 24px 0 12px 0; }
    .subtitle { color: #64748b; margin-bottom: 24px; }
    .stats { display: grid; grid-template-columns: repeat(5, 1fr); gap: 12px; }
    .stat { background: #f8fafc; border: 1px solid #e2e8f0; border-radius: 12px; padding: 12px; }
    .stat .value { font-size: 22px; font-weight: 700; }
    .stat .label { font-size: 12px; color: #64748b; }
    form.row { display: flex; gap: 12px; margin-bottom: 12px; }
    input[type="text"], select {
      flex: 1;
      padding: 10px 12px;
      border-radius: 10px;
      border: 1px solid #e2e8f0;
      font-size: 14px;
    }
    button {
      border: none;
      border-radius: 10px;
      padding: 10px 14px;
      background: #111827;
      color: white;
      font-weight: 600;
      cursor: pointer;
    }
    .chips { display: flex; flex-wrap: wrap; gap: 8px; }
    .chip {
      display: flex; align-items: center; gap: 6px;
      padding: 6px 10px; border-radius: 999px; background: #f1f5f9; font-size: 13px;
    }
    .dot { width: 10px; height: 10px; border-radius: 999px; background: #94a3b8; }
    .task-list { display: grid; gap: 12px; }
    .task { padding: 14px 16px; border-radius: 12px; background: #f8fafc; border: 1px solid #e2e8f0; }
    .task .head { display: flex; justify-content: space-between; align-items: center; gap: 12px; }
    .task .title { font-weight: 600; }
    .task .meta { font-size: 12px; color: #94a3b8; }
    .subtasks { list-style: none; padding: 0; margin: 10px 0 0 0; display: grid; gap: 6px; }
    .subtasks li { display: flex; align-items: center; gap: 8px; }
    .subtasks li.completed span { text-decoration: line-through; color: #94a3b8; }
    .inline { display: inline; margin: 0; }
    .actions { display: flex; gap: 8px; align-items: center; }
    .actions button, .subtasks button { background: #e2e8f0; color: #0f172a; padding: 6px 10px; }
    button.delete { background: #fee2e2; color: #991b1b; }
    .status {
      font-size: 12px; text-transform: uppercase; letter-spacing: 0.08em;
      color: #0f172a; background: #e2e8f0; padding: 4px 8px; border-radius: 999px;
    }
    .status.in-progress { background: #fef3c7; color: #92400e; }
    .status.done { background: #dcfce7; color: #166534; }
"#;

fn render_board(store: &TodoStore, filter: &TaskFilter) -> String {
    let stats = store.stats();
    let recent = store.recent_categories(DEFAULT_RECENT_LIMIT);

    let mut body = String::new();
    body.push_str(&format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>taskboard</title>
  <style>{STYLE}</style>
</head>
<body>
  <div class="app">
    <h1>taskboard</h1>
    <div class="subtitle">Categories, tasks and checklists.</div>
"#
    ));

    render_stats(&mut body, &stats);
    render_categories(&mut body, store);
    render_task_forms(&mut body, store.categories(), &recent, filter);

    let tasks = store.filter_tasks(filter);
    body.push_str("<div class=\"task-list\">");
    if store.tasks().is_empty() {
        body.push_str("<div class=\"subtitle\">No tasks yet. Add one above.</div>");
    } else if tasks.is_empty() {
        body.push_str("<div class=\"subtitle\">Nothing matches these filters.</div>");
    }
    for task in tasks {
        render_task(&mut body, task, store.category(&task.category_id));
    }
    body.push_str(
        r#"    </div>
  </div>
</body>
</html>"#,
    );
    body
}

fn render_stats(body: &mut String, stats: &TodoStats) {
    body.push_str("<div class=\"stats\">");
    for (value, label) in [
        (stats.total.to_string(), "Tasks"),
        (stats.completed.to_string(), "Done"),
        (stats.in_progress.to_string(), "In progress"),
        (stats.total_categories.to_string(), "Categories"),
        (format!("{}%", stats.completion_rate()), "Completion"),
    ] {
        body.push_str(&format!(
            r#"<div class="stat"><div class="value">{value}</div><div class="label">{label}</div></div>"#
        ));
    }
    body.push_str("</div>");
}

fn render_categories(body: &mut String, store: &TodoStore) {
    body.push_str(
        r##"<h2>Categories</h2>
<form class="row" method="post" action="/categories/add">
  <input type="text" name="name" placeholder="New category" required />
  <input type="color" name="color" value="#3B82F6" />
  <button type="submit">Add</button>
</form>
<div class="chips">"##,
    );
    for category in store.categories() {
        let color = category.color.as_deref().unwrap_or("#94a3b8");
        body.push_str(&format!(
            r#"<div class="chip">
  <span class="dot" style="background: {color}"></span>
  <span>{name} ({count})</span>
  <form class="inline" method="post" action="/categories/rename">
    <input type="hidden" name="id" value="{id}" />
    <input type="text" name="name" value="{name}" size="10" />
  </form>
  <form class="inline" method="post" action="/categories/delete">
    <input type="hidden" name="id" value="{id}" />
    <button class="delete" type="submit">×</button>
  </form>
</div>"#,
            color = html_escape(color),
            name = html_escape(&category.name),
            count = store.task_count(&category.id),
            id = html_escape(&category.id),
        ));
    }
    body.push_str("</div>");
}

/// The add form offers the most recently used categories; the filter lists all.
fn render_task_forms(
    body: &mut String,
    categories: &[Category],
    recent: &[Category],
    filter: &TaskFilter,
) {
    body.push_str(
        r#"<h2>Tasks</h2>
<form class="row" method="post" action="/tasks/add">
  <input type="text" name="title" placeholder="New task" required />
  <select name="category_id" required>"#,
    );
    for category in recent {
        body.push_str(&format!(
            r#"<option value="{id}">{name}</option>"#,
            id = html_escape(&category.id),
            name = html_escape(&category.name)
        ));
    }
    body.push_str(
        r#"</select>
  <input type="text" name="description" placeholder="Description (optional)" />
  <button type="submit">Add</button>
</form>
<form class="row" method="get" action="/">
  <select name="status"><option value="all">All statuses</option>"#,
    );
    for status in TaskStatus::ALL {
        let selected = if filter.status == Some(status) { " selected" } else { "" };
        body.push_str(&format!(
            r#"<option value="{value}"{selected}>{label}</option>"#,
            value = status.as_str(),
            label = status.label()
        ));
    }
    body.push_str(r#"</select><select name="category"><option value="all">All categories</option>"#);
    for category in categories {
        let selected = if filter.category_id.as_deref() == Some(category.id.as_str()) {
            " selected"
        } else {
            ""
        };
        body.push_str(&format!(
            r#"<option value="{id}"{selected}>{name}</option>"#,
            id = html_escape(&category.id),
            name = html_escape(&category.name)
        ));
    }
    body.push_str(&format!(
        r#"</select>
  <input type="text" name="q" placeholder="Search" value="{q}" />
  <button type="submit">Filter</button>
</form>"#,
        q = html_escape(filter.query.as_deref().unwrap_or(""))
    ));
}

fn render_task(body: &mut String, task: &Task, category: Option<&Category>) {
    let category_name = category.map_or("(deleted category)", |c| c.name.as_str());
    let checklist = if task.subtasks.is_empty() {
        String::new()
    } else {
        format!(
            " · {}/{} subtasks",
            task.completed_subtasks(),
            task.subtasks.len()
        )
    };
    body.push_str(&format!(
        r#"<div class="task">
  <div class="head">
    <div>
      <div class="title">{title}</div>
      <div class="meta">{category} · updated {updated}{checklist}</div>
    </div>
    <div class="actions">
      <span class="status {status}">{label}</span>
      <form class="inline" method="post" action="/tasks/status">
        <input type="hidden" name="id" value="{id}" />
        <select name="status" onchange="this.form.submit()">"#,
        title = html_escape(&task.title),
        category = html_escape(category_name),
        updated = task.updated_at.format("%d.%m.%Y %H:%M"),
        checklist = checklist,
        status = task.status.as_str(),
        label = task.status.label(),
        id = html_escape(&task.id),
    ));
    for status in TaskStatus::ALL {
        let selected = if task.status == status { " selected" } else { "" };
        body.push_str(&format!(
            r#"<option value="{value}"{selected}>{label}</option>"#,
            value = status.as_str(),
            label = status.label()
        ));
    }
    body.push_str(&format!(
        r#"</select>
      </form>
      <form class="inline" method="post" action="/tasks/delete">
        <input type="hidden" name="id" value="{id}" />
        <button class="delete" type="submit">Delete</button>
      </form>
    </div>
  </div>"#,
        id = html_escape(&task.id)
    ));

    if let Some(description) = &task.description {
        body.push_str(&format!(
            r#"<div class="meta">{}</div>"#,
            html_escape(description)
        ));
    }

    body.push_str("<ul class=\"subtasks\">");
    for subtask in &task.subtasks {
        body.push_str(&format!(
            r#"<li class="{class}">
  <form class="inline" method="post" action="/subtasks/toggle">
    <input type="hidden" name="task_id" value="{task_id}" />
    <input type="hidden" name="subtask_id" value="{subtask_id}" />
    <button type="submit">{mark}</button>
  </form>
  <span>{title}</span>
  <form class="inline" method="post" action="/subtasks/delete">
    <input type="hidden" name="task_id" value="{task_id}" />
    <input type="hidden" name="subtask_id" value="{subtask_id}" />
    <button class="delete" type="submit">×</button>
  </form>
</li>"#,
            class = if subtask.completed { "completed" } else { "" },
            task_id = html_escape(&task.id),
            subtask_id = html_escape(&subtask.id),
            mark = if subtask.completed { "✓" } else { "○" },
            title = html_escape(&subtask.title),
        ));
    }
    body.push_str(&format!(
        r#"</ul>
  <form class="row" method="post" action="/subtasks/add">
    <input type="hidden" name="task_id" value="{id}" />
    <input type="text" name="title" placeholder="Add a subtask" required />
    <button type="submit">Add</button>
  </form>
</div>"#,
        id = html_escape(&task.id)
    ));
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
