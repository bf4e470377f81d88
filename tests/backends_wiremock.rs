use std::time::Duration;

use serde_json::json;
use taskweave::config::{BackendConfig, BackendKind};
use taskweave::errors::{BackendError, RouterError};
use taskweave::health::{HealthHandle, HealthSnapshot, HealthStatus};
use taskweave::llm::{build_backend, ChatMessage};
use taskweave::router::{AttemptOutcome, ModelRouter, RouteRequest};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend_config(name: &str, kind: BackendKind, base_url: &str, timeout: &str) -> BackendConfig {
    BackendConfig {
        name: name.to_string(),
        kind,
        base_url: base_url.to_string(),
        model: "test-model".to_string(),
        capabilities: vec!["general".to_string()],
        timeout: timeout.to_string(),
        api_key_env: None,
        retries: None,
    }
}

fn request() -> RouteRequest {
    RouteRequest {
        capabilities: vec!["general".to_string()],
        messages: vec![ChatMessage::system("be brief"), ChatMessage::user("hi")],
    }
}

async fn openai_ok(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn ollama_parses_chat_response_and_probe() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({ "model": "test-model", "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": { "role": "assistant", "content": "  hello from ollama \n" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
        .mount(&server)
        .await;

    let backend =
        build_backend(&backend_config("local", BackendKind::Ollama, &server.uri(), "5s")).unwrap();
    let out = backend
        .complete(vec![ChatMessage::user("hi")])
        .await
        .unwrap();
    assert_eq!(out, "hello from ollama");
    backend.probe().await.unwrap();
}

#[tokio::test]
async fn openai_compatible_maps_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let backend =
        build_backend(&backend_config("vllm", BackendKind::Vllm, &server.uri(), "5s")).unwrap();
    let err = backend
        .complete(vec![ChatMessage::user("hi")])
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BackendError::Status {
            code: 503,
            body: "overloaded".to_string()
        }
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn anthropic_sends_key_and_reads_content() {
    std::env::set_var("TASKWEAVE_TEST_ANTHROPIC_KEY", "sk-ant-test");
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(body_partial_json(json!({ "system": "be brief" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{ "type": "text", "text": "hello from claude" }]
        })))
        .mount(&server)
        .await;

    let mut config = backend_config("hosted", BackendKind::Anthropic, &server.uri(), "5s");
    config.api_key_env = Some("TASKWEAVE_TEST_ANTHROPIC_KEY".to_string());
    let backend = build_backend(&config).unwrap();
    let out = backend.complete(request().messages).await.unwrap();
    assert_eq!(out, "hello from claude");
}

#[tokio::test]
async fn router_fails_over_on_server_error() {
    let bad = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&bad)
        .await;
    let good = MockServer::start().await;
    openai_ok(&good, "served by good").await;

    let backends = vec![
        build_backend(&backend_config("bad", BackendKind::OpenAi, &bad.uri(), "5s")).unwrap(),
        build_backend(&backend_config("good", BackendKind::OpenAi, &good.uri(), "5s")).unwrap(),
    ];
    let snapshot = HealthSnapshot::default()
        .with("bad", HealthStatus::Healthy, Some(Duration::from_millis(5)))
        .with("good", HealthStatus::Healthy, Some(Duration::from_millis(50)));
    let router = ModelRouter::new(backends, HealthHandle::fixed(snapshot), 1);

    let result = router.route(request()).await.unwrap();
    assert_eq!(result.backend_used, "good");
    assert_eq!(result.output, "served by good");
    assert_eq!(result.attempts.len(), 2);
    assert_eq!(result.attempts[0].backend, "bad");
    assert!(matches!(result.attempts[0].outcome, AttemptOutcome::Failed(_)));
    assert_eq!(result.attempts[1].outcome, AttemptOutcome::Succeeded);
}

#[tokio::test]
async fn router_fails_over_on_timeout() {
    let slow = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(3))
                .set_body_json(json!({ "choices": [{ "message": { "content": "late" } }] })),
        )
        .mount(&slow)
        .await;
    let fast = MockServer::start().await;
    openai_ok(&fast, "on time").await;

    let backends = vec![
        build_backend(&backend_config("slow", BackendKind::OpenAi, &slow.uri(), "200ms")).unwrap(),
        build_backend(&backend_config("fast", BackendKind::OpenAi, &fast.uri(), "5s")).unwrap(),
    ];
    let snapshot = HealthSnapshot::default()
        .with("slow", HealthStatus::Healthy, Some(Duration::from_millis(1)))
        .with("fast", HealthStatus::Degraded, Some(Duration::from_millis(1)));
    let router = ModelRouter::new(backends, HealthHandle::fixed(snapshot), 1);

    let result = router.route(request()).await.unwrap();
    assert_eq!(result.backend_used, "fast");
    assert_eq!(result.attempts.len(), 2);
}

#[tokio::test]
async fn router_does_not_retry_client_errors() {
    let bad = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&bad)
        .await;
    let good = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&good)
        .await;

    let backends = vec![
        build_backend(&backend_config("bad", BackendKind::OpenAi, &bad.uri(), "5s")).unwrap(),
        build_backend(&backend_config("good", BackendKind::OpenAi, &good.uri(), "5s")).unwrap(),
    ];
    let snapshot = HealthSnapshot::default()
        .with("bad", HealthStatus::Healthy, Some(Duration::from_millis(1)))
        .with("good", HealthStatus::Healthy, Some(Duration::from_millis(90)));
    let router = ModelRouter::new(backends, HealthHandle::fixed(snapshot), 1);

    match router.route(request()).await {
        Err(RouterError::BackendExhausted { attempts }) => {
            assert_eq!(attempts.len(), 1);
            assert_eq!(attempts[0].backend, "bad");
            assert!(attempts[0].reason.contains("400"));
        }
        other => panic!("expected exhaustion, got {:?}", other),
    }
}

#[tokio::test]
async fn router_exhausts_retry_budget() {
    let mut backends = Vec::new();
    let mut servers = Vec::new();
    for name in ["a", "b", "c"] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        backends.push(
            build_backend(&backend_config(name, BackendKind::OpenAi, &server.uri(), "5s")).unwrap(),
        );
        servers.push(server);
    }
    let router = ModelRouter::new(backends, HealthHandle::fixed(HealthSnapshot::default()), 1);

    match router.route(request()).await {
        Err(RouterError::BackendExhausted { attempts }) => assert_eq!(attempts.len(), 2),
        other => panic!("expected exhaustion, got {:?}", other),
    }
}

#[tokio::test]
async fn first_choice_backend_sets_the_retry_budget() {
    let mut servers = Vec::new();
    let mut configs = Vec::new();
    for name in ["a", "b", "c"] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        configs.push(backend_config(name, BackendKind::OpenAi, &server.uri(), "5s"));
        servers.push(server);
    }
    let backends: Vec<_> = configs.iter().map(|c| build_backend(c).unwrap()).collect();

    for (retries, expected) in [(0, 1), (2, 3)] {
        let router = ModelRouter::new(
            backends.clone(),
            HealthHandle::fixed(HealthSnapshot::default()),
            1,
        )
        .with_backend_retries([("a".to_string(), retries)]);
        match router.route(request()).await {
            Err(RouterError::BackendExhausted { attempts }) => {
                assert_eq!(attempts[0].backend, "a");
                assert_eq!(attempts.len(), expected);
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }
}
