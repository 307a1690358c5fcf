//! End-to-end tests: the real assistant client against a mocked Assistants
//! API, the real tool registry, and the HTTP surface on a random port.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use inbox_assist::agent::{AssistantRunner, ResponseFormat};
use inbox_assist::assistant::{OpenAiAssistantClient, RunStatus};
use inbox_assist::config::{AssistantIds, JobsConfig, OrchestratorConfig, PromptConfig};
use inbox_assist::jobs::JobRunner;
use inbox_assist::prompts::{AssistantKind, PromptStore};
use inbox_assist::server::{self, AppState};
use inbox_assist::store::MemoryStore;
use inbox_assist::tools::ToolRegistry;
use inbox_assist::tools::builtin::{Providers, register_builtin_tools};

fn run_body(status: &str) -> Value {
    json!({"id": "run_1", "object": "thread.run", "thread_id": "thread_1", "status": status})
}

async fn prompts_in(dir: &tempfile::TempDir) -> Arc<PromptStore> {
    let store = Arc::new(PromptStore::new(&PromptConfig {
        dir: dir.path().to_path_buf(),
    }));
    tokio::fs::write(store.path(AssistantKind::Chat), "Be brief.")
        .await
        .unwrap();
    store
}

fn registry_with(prompts: Arc<PromptStore>) -> Arc<ToolRegistry> {
    let registry = Arc::new(ToolRegistry::new());
    register_builtin_tools(
        &registry,
        &Providers {
            gmail: None,
            slack: None,
            trello: None,
            bookkeeping: None,
            prompts,
        },
    );
    registry
}

fn fast() -> OrchestratorConfig {
    OrchestratorConfig {
        poll_interval: Duration::ZERO,
        max_tool_call_attempts: 3,
    }
}

async fn mount_thread_endpoints(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/threads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "thread_1", "object": "thread", "created_at": 1700000000
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/threads/thread_1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_user", "object": "thread.message", "role": "user",
            "content": [{"type": "text", "text": {"value": "x", "annotations": []}}],
            "created_at": 1700000001
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/threads/thread_1/runs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_body("queued")))
        .mount(server)
        .await;
}

#[tokio::test]
async fn tool_call_round_trip_updates_prompt() {
    let server = MockServer::start().await;
    mount_thread_endpoints(&server).await;

    let arguments = json!({
        "assistant": "chat",
        "promptUpdate": {"mode": "append", "content": "Sign off with a wave."}
    })
    .to_string();
    let mut requires_action = run_body("requires_action");
    requires_action["required_action"] = json!({
        "type": "submit_tool_outputs",
        "submit_tool_outputs": {"tool_calls": [{
            "id": "call_1",
            "type": "function",
            "function": {"name": "update_system_prompt", "arguments": arguments}
        }]}
    });
    Mock::given(method("GET"))
        .and(path("/threads/thread_1/runs/run_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(requires_action))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/threads/thread_1/runs/run_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_body("completed")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/threads/thread_1/runs/run_1/submit_tool_outputs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_body("queued")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/threads/thread_1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{
                "id": "msg_reply", "object": "thread.message", "role": "assistant",
                "content": [{"type": "text", "text": {"value": "Done, I'll wave from now on.", "annotations": []}}],
                "created_at": 1700000009
            }]
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let prompts = prompts_in(&dir).await;
    let runner = AssistantRunner::new(
        Arc::new(OpenAiAssistantClient::with_base_url(
            SecretString::from("sk-test"),
            server.uri(),
        )),
        Arc::new(MemoryStore::new()),
        registry_with(prompts.clone()),
        fast(),
    );

    let outcome = runner
        .run_instruction(
            "asst_chat",
            None,
            "Please sign off with a wave",
            ResponseFormat::Text,
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.content(), Some("Done, I'll wave from now on."));
    assert_eq!(
        prompts.read(AssistantKind::Chat).await.unwrap(),
        "Be brief.\n\nSign off with a wave."
    );

    let submitted: Value = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .find(|r| r.url.path().ends_with("/submit_tool_outputs"))
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .unwrap();
    let output: Value = serde_json::from_str(
        submitted["tool_outputs"][0]["output"].as_str().unwrap(),
    )
    .unwrap();
    assert_eq!(submitted["tool_outputs"][0]["tool_call_id"], "call_1");
    assert_eq!(output["success"], true);
}

#[tokio::test]
async fn unconfigured_provider_tool_is_unknown_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let prompts = prompts_in(&dir).await;
    let registry = registry_with(prompts);
    let runner = AssistantRunner::new(
        Arc::new(OpenAiAssistantClient::with_base_url(
            SecretString::from("sk-test"),
            "http://127.0.0.1:9",
        )),
        Arc::new(MemoryStore::new()),
        registry.clone(),
        fast(),
    );
    let jobs = Arc::new(JobRunner::new(
        runner,
        AssistantIds::default(),
        None,
        &JobsConfig::default(),
    ));
    let app = server::router(AppState {
        dispatcher: registry,
        jobs,
        chat: None,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let http = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{port}");

    let resp = http
        .post(format!("{base}/tool-call"))
        .json(&json!({"function_name": "gmail_get_message", "arguments": "{\"messageId\":\"m1\"}"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Unknown function: gmail_get_message");

    let resp = http
        .post(format!("{base}/tool-call"))
        .json(&json!({
            "function_name": "update_system_prompt",
            "arguments": {"assistant": "nobody", "promptUpdate": {"mode": "full", "content": "x"}}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let resp = http
        .post(format!("{base}/jobs/daily-report"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 500);
}
