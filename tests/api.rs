//! End-to-end HTTP tests over an in-memory store.

use axum::http::StatusCode;
use axum::Router;
use axum_test::TestServer;
use roster_api::{
    common_routes, entity_routes, schema_routes, AppState, Registry, Representation, Store,
};
use serde_json::{json, Value};
use std::sync::Arc;

async fn spawn(representation: Representation) -> TestServer {
    let registry = Arc::new(Registry::standard().unwrap());
    let store = Store::in_memory(registry).await.unwrap();
    store.migrate().await.unwrap();
    let state = AppState::new(store, representation);
    let app = Router::new()
        .merge(common_routes(state.clone()))
        .merge(schema_routes(state.clone()))
        .merge(entity_routes(state));
    TestServer::new(app).unwrap()
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or("")
}

#[tokio::test]
async fn cohort_student_lifecycle() {
    let server = spawn(Representation::Embedded).await;

    let response = server
        .post("/cohort/")
        .json(&json!({"name": "Team A", "subject": "SEI"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let cohort: Value = response.json();
    assert_eq!(cohort, json!({"id": 1, "name": "Team A", "subject": "SEI"}));

    let response = server
        .post("/student/")
        .json(&json!({"name": "Ana", "cohort": 1}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let student: Value = response.json();
    assert_eq!(student, json!({"id": 1, "name": "Ana", "cohort": 1}));

    let response = server.get("/student/1/").await;
    response.assert_status_ok();
    let fetched: Value = response.json();
    assert_eq!(fetched, json!({"id": 1, "name": "Ana", "cohort": 1}));

    let response = server.delete("/cohort/1/").await;
    response.assert_status(StatusCode::NO_CONTENT);

    server.get("/student/1/").await.assert_status_not_found();
    server.get("/cohort/1/").await.assert_status_not_found();
}

#[tokio::test]
async fn create_rejects_unregistered_subject() {
    let server = spawn(Representation::Embedded).await;
    let response = server
        .post("/cohort/")
        .json(&json!({"name": "Team A", "subject": "XYZ"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(error_code(&body), "validation_error");
    assert_eq!(body["error"]["details"]["field"], json!("subject"));
}

#[tokio::test]
async fn create_student_with_dangling_cohort_fails() {
    let server = spawn(Representation::Embedded).await;
    let response = server
        .post("/student/")
        .json(&json!({"name": "Ana", "cohort": 999}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(error_code(&body), "validation_error");
    assert_eq!(body["error"]["details"]["field"], json!("cohort"));
}

#[tokio::test]
async fn missing_required_field_fails() {
    let server = spawn(Representation::Embedded).await;
    let response = server.post("/student/").json(&json!({"name": "Ana"})).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["details"]["field"], json!("cohort"));
}

#[tokio::test]
async fn overlong_name_fails() {
    let server = spawn(Representation::Embedded).await;
    let response = server
        .post("/cohort/")
        .json(&json!({"name": "x".repeat(101), "subject": "SEI"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_paths_are_not_found_before_the_store_runs() {
    let server = spawn(Representation::Embedded).await;
    server.get("/teacher/").await.assert_status_not_found();
    server.get("/cohort/abc/").await.assert_status_not_found();
    server
        .delete("/teacher/1/")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn update_replaces_fields() {
    let server = spawn(Representation::Embedded).await;
    server
        .post("/cohort/")
        .json(&json!({"name": "Team A", "subject": "SEI"}))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .put("/cohort/1/")
        .json(&json!({"name": "Team B", "subject": "UXDI"}))
        .await;
    response.assert_status_ok();
    let cohort: Value = response.json();
    assert_eq!(cohort, json!({"id": 1, "name": "Team B", "subject": "UXDI"}));

    // PUT is a full replacement: a partial body is invalid.
    server
        .put("/cohort/1/")
        .json(&json!({"name": "Team C"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .put("/cohort/42/")
        .json(&json!({"name": "Team D", "subject": "SEI"}))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn deleting_a_student_spares_cohort_and_siblings() {
    let server = spawn(Representation::Embedded).await;
    server
        .post("/cohort/")
        .json(&json!({"name": "Team A", "subject": "SEI"}))
        .await
        .assert_status(StatusCode::CREATED);
    for name in ["Ana", "Ben"] {
        server
            .post("/student/")
            .json(&json!({"name": name, "cohort": 1}))
            .await
            .assert_status(StatusCode::CREATED);
    }

    server
        .delete("/student/1/")
        .await
        .assert_status(StatusCode::NO_CONTENT);

    server.get("/cohort/1/").await.assert_status_ok();
    server.get("/student/2/").await.assert_status_ok();
    let remaining: Value = server.get("/student/").await.json();
    assert_eq!(remaining.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cascade_delete_removes_every_dependent_student() {
    let server = spawn(Representation::Embedded).await;
    server
        .post("/cohort/")
        .json(&json!({"name": "Team A", "subject": "SEI"}))
        .await
        .assert_status(StatusCode::CREATED);
    server
        .post("/cohort/")
        .json(&json!({"name": "Team B", "subject": "DSI"}))
        .await
        .assert_status(StatusCode::CREATED);
    for (name, cohort) in [("Ana", 1), ("Ben", 1), ("Cho", 2)] {
        server
            .post("/student/")
            .json(&json!({"name": name, "cohort": cohort}))
            .await
            .assert_status(StatusCode::CREATED);
    }

    server
        .delete("/cohort/1/")
        .await
        .assert_status(StatusCode::NO_CONTENT);

    server.get("/student/1/").await.assert_status_not_found();
    server.get("/student/2/").await.assert_status_not_found();
    let remaining: Value = server.get("/student/").await.json();
    assert_eq!(
        remaining,
        json!([{"id": 3, "name": "Cho", "cohort": 2}])
    );
}

#[tokio::test]
async fn list_preserves_insertion_order() {
    let server = spawn(Representation::Embedded).await;
    for (name, subject) in [("Team A", "SEI"), ("Team B", "UXDI"), ("Team C", "DSI")] {
        server
            .post("/cohort/")
            .json(&json!({"name": name, "subject": subject}))
            .await
            .assert_status(StatusCode::CREATED);
    }
    let cohorts: Value = server.get("/cohort/").await.json();
    let names: Vec<&str> = cohorts
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Team A", "Team B", "Team C"]);
}

#[tokio::test]
async fn include_attaches_students_on_request_only() {
    let server = spawn(Representation::Embedded).await;
    server
        .post("/cohort/")
        .json(&json!({"name": "Team A", "subject": "SEI"}))
        .await
        .assert_status(StatusCode::CREATED);
    server
        .post("/student/")
        .json(&json!({"name": "Ana", "cohort": 1}))
        .await
        .assert_status(StatusCode::CREATED);

    let bare: Value = server.get("/cohort/1/").await.json();
    assert!(bare.get("student").is_none());

    let with_students: Value = server.get("/cohort/1/?include=student").await.json();
    assert_eq!(
        with_students["student"],
        json!([{"id": 1, "name": "Ana", "cohort": 1}])
    );

    let listed: Value = server.get("/cohort/?include=student").await.json();
    assert_eq!(listed[0]["student"].as_array().unwrap().len(), 1);

    server
        .get("/cohort/1/?include=teacher")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn linked_representation_round_trips_locators() {
    let server = spawn(Representation::Linked).await;
    server
        .post("/cohort/")
        .json(&json!({"name": "Team A", "subject": "SEI"}))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .post("/student/")
        .json(&json!({"name": "Ana", "cohort": "/cohort/1/"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let student: Value = response.json();
    assert_eq!(
        student,
        json!({"id": 1, "name": "Ana", "cohort": "/cohort/1/"})
    );

    let fetched: Value = server.get("/student/1/").await.json();
    assert_eq!(fetched["cohort"], json!("/cohort/1/"));

    // A locator that parses but names a missing row is still a validation error.
    let response = server
        .post("/student/")
        .json(&json!({"name": "Ben", "cohort": "/cohort/999/"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/student/")
        .json(&json!({"name": "Ben", "cohort": "/teacher/1/"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn paths_work_with_and_without_trailing_slash() {
    let server = spawn(Representation::Embedded).await;
    server
        .post("/cohort")
        .json(&json!({"name": "Team A", "subject": "SEI"}))
        .await
        .assert_status(StatusCode::CREATED);
    server.get("/cohort/1").await.assert_status_ok();
    server.get("/cohort/1/").await.assert_status_ok();
}

#[tokio::test]
async fn schema_endpoint_exposes_choices_with_labels() {
    let server = spawn(Representation::Embedded).await;
    let schema: Value = server.get("/schema").await.json();
    let entities = schema["entities"].as_array().unwrap();
    assert_eq!(entities.len(), 2);
    let cohort = entities.iter().find(|e| e["name"] == "cohort").unwrap();
    let subject = cohort["fields"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["name"] == "subject")
        .unwrap();
    let choices = subject["choices"].as_array().unwrap();
    assert!(choices
        .iter()
        .any(|c| c["code"] == "SEI" && c["label"] == "Software Engineering Immersive"));
}

#[tokio::test]
async fn health_and_version_respond() {
    let server = spawn(Representation::Embedded).await;
    let health: Value = server.get("/health").await.json();
    assert_eq!(health["status"], json!("ok"));
    let ready: Value = server.get("/ready").await.json();
    assert_eq!(ready["database"], json!("ok"));
    let version: Value = server.get("/version").await.json();
    assert_eq!(version["name"], json!("roster-api"));
}
