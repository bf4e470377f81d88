use chrono::{Duration, Utc};
use taskweave::core::{AgentState, SubTask, TaskStatus, WorkflowPhase};
use taskweave::db::{SqliteStore, WorkflowStore};
use tempfile::TempDir;

fn open(dir: &TempDir) -> SqliteStore {
    let path = dir.path().join("workflows.db");
    SqliteStore::open(path.to_str().unwrap()).unwrap()
}

fn sample(thread_id: &str) -> AgentState {
    let mut state = AgentState::new(thread_id.into(), "compare two libraries".into());
    state
        .install_plan(vec![
            SubTask::new(1, "research", "read the docs"),
            SubTask::new(2, "summary", "compare").with_dependencies([1]),
        ])
        .unwrap();
    state
}

#[tokio::test]
async fn checkpoint_survives_reopening_the_database() {
    let dir = TempDir::new().unwrap();
    let mut state = sample("t-1");
    state.set_phase(WorkflowPhase::Executing);
    state.plan.mark_running(1).unwrap();
    state
        .plan
        .mark_result(1, TaskStatus::Succeeded, Some("docs read".into()))
        .unwrap();
    state.task_results.insert(1, "docs read".into());
    state.push_message("task:1", "Task 1 succeeded");

    open(&dir).save(&state).await.unwrap();

    let reopened = open(&dir);
    let loaded = reopened.load("t-1").await.unwrap().unwrap();
    assert_eq!(loaded, state);
    assert_eq!(loaded.plan.ready_tasks(), vec![2]);
    assert!(reopened.load("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn save_replaces_previous_checkpoint() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let mut state = sample("t-1");
    store.save(&state).await.unwrap();
    state.set_phase(WorkflowPhase::AwaitingApproval);
    store.save(&state).await.unwrap();

    let all = store.list().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].phase, WorkflowPhase::AwaitingApproval);

    assert!(store.delete("t-1").await.unwrap());
    assert!(!store.delete("t-1").await.unwrap());
}

#[tokio::test]
async fn purge_removes_only_old_terminal_workflows() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let mut done = sample("done");
    done.set_phase(WorkflowPhase::Completed);
    let mut failed = sample("failed");
    failed.set_phase(WorkflowPhase::Failed);
    let mut waiting = sample("waiting");
    waiting.set_phase(WorkflowPhase::AwaitingApproval);
    for s in [&done, &failed, &waiting] {
        store.save(s).await.unwrap();
    }

    let none = store
        .purge_terminal_before(Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    assert!(none.is_empty());

    let mut purged = store
        .purge_terminal_before(Utc::now() + Duration::seconds(1))
        .await
        .unwrap();
    purged.sort();
    assert_eq!(purged, vec!["done".to_string(), "failed".to_string()]);
    let left: Vec<String> = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.thread_id)
        .collect();
    assert_eq!(left, vec!["waiting".to_string()]);
}
