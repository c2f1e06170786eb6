#![forbid(unsafe_code)]

use std::time::Duration;

use serde_json::json;
use todui::api::TaskApi as _;
use todui::api::http::HttpTaskApi;
use todui::error::TodoError;
use todui::task::list::{ConfirmedDelete, TaskController};
use todui::task::model::{NewTask, Priority, TaskUpdate};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api(server: &MockServer) -> HttpTaskApi {
    HttpTaskApi::new(
        &format!("{}/", server.uri()),
        Some("tok_123".to_owned()),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn task_json(id: i64, title: &str, completed: bool) -> serde_json::Value {
    json!({
        "id": id,
        "user_id": "usr_1",
        "title": title,
        "description": "",
        "completed": completed,
        "created_at": "2025-01-01T00:00:00Z",
        "updated_at": "2025-01-01T00:00:00Z"
    })
}

#[tokio::test]
async fn get_tasks_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/usr_1/tasks"))
        .and(header("authorization", "Bearer tok_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            task_json(2, "Buy milk", false),
            task_json(1, "Walk dog", true),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let tasks = api(&server).get_tasks("usr_1").await.unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].title, "Buy milk");
    // Fields from later server revisions default when absent.
    assert_eq!(tasks[0].priority, Priority::Medium);
    assert!(tasks[0].due_date.is_none());
}

#[tokio::test]
async fn create_posts_only_present_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/usr_1/tasks"))
        .and(body_json(json!({
            "title": "Buy milk",
            "description": "",
            "priority": "high"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(task_json(9, "Buy milk", false)))
        .expect(1)
        .mount(&server)
        .await;

    let mut new = NewTask::new("Buy milk");
    new.priority = Some(Priority::High);
    let task = api(&server).create_task("usr_1", &new).await.unwrap();
    assert_eq!(task.id, 9);
}

#[tokio::test]
async fn update_toggle_and_delete_hit_task_routes() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/usr_1/tasks/4"))
        .and(body_json(json!({ "title": "renamed", "due_date": null })))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json(4, "renamed", false)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/usr_1/tasks/4/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json(4, "renamed", true)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/usr_1/tasks/4"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let api = api(&server);
    let upd = TaskUpdate {
        title: Some("renamed".to_owned()),
        due_date: Some(None),
        ..TaskUpdate::default()
    };
    assert_eq!(api.update_task("usr_1", 4, &upd).await.unwrap().title, "renamed");
    assert!(api.toggle_complete("usr_1", 4).await.unwrap().completed);
    api.delete_task("usr_1", 4).await.unwrap();
}

#[tokio::test]
async fn error_bodies_become_api_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/usr_1/tasks"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "detail": { "error": { "message": "Title must be at most 200 characters" } }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/usr_1/tasks"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let api = api(&server);
    let err = api
        .create_task("usr_1", &NewTask::new("x"))
        .await
        .unwrap_err();
    match err {
        TodoError::Api { status, message } => {
            assert_eq!(status, 422);
            assert_eq!(message, "Title must be at most 200 characters");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = api.get_tasks("usr_1").await.unwrap_err();
    assert_eq!(err.user_message(), "Failed to load tasks");
}

#[tokio::test]
async fn controller_round_trips_through_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/usr_1/tasks"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([task_json(1, "Walk dog", false)])),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/usr_1/tasks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(task_json(2, "Buy milk", false)))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/usr_1/tasks/1"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "message": "Task not found" }
        })))
        .mount(&server)
        .await;

    let mut c = TaskController::new(api(&server), "usr_1");
    c.load().await.unwrap();
    c.create(NewTask::new("Buy milk")).await.unwrap();

    let ids: Vec<i64> = c.list().tasks().iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![2, 1]);

    let err = c.delete(ConfirmedDelete::new(1)).await.unwrap_err();
    assert_eq!(err.user_message(), "Task not found");
    assert_eq!(c.list().len(), 2);
}
