use std::sync::Arc;

use serde_json::{json, Value};
use taskweave::api::routes::app;
use taskweave::core::{
    ExecutorRegistry, ManagerSettings, StaticPlanner, SubTask, WorkflowManager,
};
use taskweave::db::MemoryStore;
use taskweave::health::{HealthHandle, HealthSnapshot};

/// Serves the API on an ephemeral port and returns its base url
async fn serve() -> String {
    let manager = Arc::new(WorkflowManager::new(
        Arc::new(StaticPlanner::new(vec![
            SubTask::new(1, "research", "find the facts"),
            SubTask::new(2, "summary", "write them down").with_dependencies([1]),
        ])),
        ExecutorRegistry::new(),
        Arc::new(MemoryStore::new()),
        ManagerSettings::default(),
    ));
    let health = HealthHandle::fixed(HealthSnapshot::initial(["local"]));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(manager, health)).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn unknown_workflow_is_404_and_wrong_phase_is_400() {
    let base = serve().await;
    let client = reqwest::Client::new();

    let missing = client
        .get(format!("{}/workflows/nope", base))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["code"], 404);

    let created = client
        .post(format!("{}/workflows", base))
        .json(&json!({"request": "compare two libraries"}))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);
    let created: Value = created.json().await.unwrap();
    assert_eq!(created["phase"], "awaiting_approval");
    let thread_id = created["thread_id"].as_str().unwrap().to_string();

    let review = client
        .post(format!("{}/workflows/{}/review", base, thread_id))
        .json(&json!({"decision": "approve"}))
        .send()
        .await
        .unwrap();
    assert_eq!(review.status(), 400);

    let rejected = client
        .post(format!("{}/workflows/{}/approval", base, thread_id))
        .json(&json!({"decision": "reject", "feedback": "needs more detail"}))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), 202);

    let state: Value = client
        .get(format!("{}/workflows/{}", base, thread_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state["phase"], "rejected");
    assert_eq!(state["user_feedback"], "needs more detail");

    let again = client
        .post(format!("{}/workflows/{}/cancel", base, thread_id))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), 400);

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(health["backends"]["local"].is_object());
}
