use std::sync::Arc;

use reqwest::redirect::Policy;
use reqwest::StatusCode;
use serde_json::Value;
use taskboard::gateway::MemoryGateway;
use taskboard::store::TodoStore;
use taskboard::web;
use tokio::sync::Mutex;

async fn spawn_app() -> (String, Arc<Mutex<TodoStore>>) {
    let store = Arc::new(Mutex::new(TodoStore::new(Arc::new(MemoryGateway::new()))));
    let app = web::router(store.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), store)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn forms_drive_the_store() {
    let (base, store) = spawn_app().await;
    let client = client();

    let response = client
        .post(format!("{base}/categories/add"))
        .form(&[("name", "Garden"), ("color", "#10B981")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let category_id = store.lock().await.categories()[0].id.clone();
    client
        .post(format!("{base}/tasks/add"))
        .form(&[
            ("title", "Plant tomatoes"),
            ("category_id", category_id.as_str()),
            ("description", ""),
        ])
        .send()
        .await
        .unwrap();
    let task_id = store.lock().await.tasks()[0].id.clone();
    client
        .post(format!("{base}/subtasks/add"))
        .form(&[("task_id", task_id.as_str()), ("title", "Buy seedlings")])
        .send()
        .await
        .unwrap();
    let subtask_id = store.lock().await.tasks()[0].subtasks[0].id.clone();
    client
        .post(format!("{base}/subtasks/toggle"))
        .form(&[
            ("task_id", task_id.as_str()),
            ("subtask_id", subtask_id.as_str()),
        ])
        .send()
        .await
        .unwrap();

    let state: Value = client
        .get(format!("{base}/api/state"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state["tasks"][0]["status"], "done");
    assert_eq!(state["tasks"][0]["description"], Value::Null);
    assert_eq!(state["categories"][0]["name"], "Garden");

    let stats: Value = client
        .get(format!("{base}/api/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["completed"], 1);
    assert_eq!(stats["totalCategories"], 1);

    let page = client.get(&base).send().await.unwrap().text().await.unwrap();
    assert!(page.contains("Plant tomatoes"));
    assert!(page.contains("1/1 subtasks"));
}

#[tokio::test]
async fn bad_input_maps_to_client_errors() {
    let (base, _store) = spawn_app().await;
    let client = client();

    let empty = client
        .post(format!("{base}/categories/add"))
        .form(&[("name", "  ")])
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let missing = client
        .post(format!("{base}/tasks/delete"))
        .form(&[("id", "ghost")])
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let status = client
        .post(format!("{base}/tasks/status"))
        .form(&[("id", "ghost"), ("status", "someday")])
        .send()
        .await
        .unwrap();
    assert_eq!(status.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn board_escapes_user_text_and_filters() {
    let (base, store) = spawn_app().await;
    {
        let mut store = store.lock().await;
        let category = store.add_category("<script>", None).await.unwrap();
        store.add_task("Alpha", &category.id, None).await.unwrap();
        store.add_task("Beta", &category.id, None).await.unwrap();
    }

    let page = client()
        .get(format!("{base}/?q=alp&status=all"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("&lt;script&gt;"));
    assert!(!page.contains("<script>"));
    assert!(page.contains("Alpha"));
    assert!(!page.contains("Beta"));
}

#[tokio::test]
async fn every_category_stays_reachable_on_the_board() {
    let (base, store) = spawn_app().await;
    let stale = {
        let mut store = store.lock().await;
        let stale = store.add_category("Dormant", None).await.unwrap();
        for n in 0..10 {
            let category = store.add_category(&format!("Busy {n}"), None).await.unwrap();
            store.add_task("chore", &category.id, None).await.unwrap();
        }
        stale
    };

    let page = client().get(&base).send().await.unwrap().text().await.unwrap();
    assert!(page.contains("Dormant (0)"));
    let filter_option = format!(r#"<option value="{}">Dormant</option>"#, stale.id);
    // rename and delete chip forms plus the filter; the add form only offers recent ones
    assert_eq!(page.matches(&format!(r#"value="{}""#, stale.id)).count(), 3);
    assert_eq!(page.matches(&filter_option).count(), 1);
}
