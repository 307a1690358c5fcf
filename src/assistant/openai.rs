//! HTTP client for the OpenAI Assistants (v2) API.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::assistant::api::{AssistantAdmin, AssistantApi};
use crate::assistant::types::{
    Assistant, AssistantDefinition, ListResponse, Role, Run, Thread, ThreadMessage, ToolOutput,
};
use crate::config::OpenAiConfig;
use crate::error::AssistantError;

const BETA_HEADER: &str = "OpenAI-Beta";
const BETA_VALUE: &str = "assistants=v2";

/// Assistants API client. Cheap to clone.
#[derive(Clone)]
pub struct OpenAiAssistantClient {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl OpenAiAssistantClient {
    pub fn new(config: &OpenAiConfig) -> Self {
        Self::with_base_url(config.api_key.clone(), config.base_url.clone())
    }

    pub fn with_base_url(api_key: SecretString, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .header(BETA_HEADER, BETA_VALUE)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
    ) -> Result<T, AssistantError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| AssistantError::RequestFailed {
                operation,
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AssistantError::Api {
                operation,
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| AssistantError::InvalidResponse {
                operation,
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl AssistantApi for OpenAiAssistantClient {
    async fn create_thread(&self) -> Result<Thread, AssistantError> {
        let req = self.request(Method::POST, "/threads").json(&json!({}));
        self.send("create_thread", req).await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
    ) -> Result<ThreadMessage, AssistantError> {
        let req = self
            .request(Method::POST, &format!("/threads/{thread_id}/messages"))
            .json(&json!({ "role": role, "content": content }));
        self.send("create_message", req).await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AssistantError> {
        let req = self
            .request(Method::GET, &format!("/threads/{thread_id}/messages"))
            .query(&[("order", "desc")]);
        let list: ListResponse<ThreadMessage> = self.send("list_messages", req).await?;
        Ok(list.data)
    }

    async fn create_run(
        &self,
        thread_id: &str,
        assistant_id: &str,
    ) -> Result<Run, AssistantError> {
        let req = self
            .request(Method::POST, &format!("/threads/{thread_id}/runs"))
            .json(&json!({ "assistant_id": assistant_id }));
        self.send("create_run", req).await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError> {
        let req = self.request(Method::GET, &format!("/threads/{thread_id}/runs/{run_id}"));
        self.send("retrieve_run", req).await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, AssistantError> {
        let req = self
            .request(
                Method::POST,
                &format!("/threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            )
            .json(&json!({ "tool_outputs": outputs }));
        self.send("submit_tool_outputs", req).await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, AssistantError> {
        let req = self.request(
            Method::POST,
            &format!("/threads/{thread_id}/runs/{run_id}/cancel"),
        );
        self.send("cancel_run", req).await
    }
}

#[async_trait]
impl AssistantAdmin for OpenAiAssistantClient {
    async fn create_assistant(
        &self,
        definition: &AssistantDefinition,
    ) -> Result<Assistant, AssistantError> {
        let req = self.request(Method::POST, "/assistants").json(definition);
        self.send("create_assistant", req).await
    }

    async fn update_assistant(
        &self,
        assistant_id: &str,
        definition: &AssistantDefinition,
    ) -> Result<Assistant, AssistantError> {
        let req = self
            .request(Method::POST, &format!("/assistants/{assistant_id}"))
            .json(definition);
        self.send("update_assistant", req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::types::RunStatus;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OpenAiAssistantClient {
        OpenAiAssistantClient::with_base_url(SecretString::from("sk-test"), server.uri())
    }

    #[tokio::test]
    async fn create_thread_sends_auth_and_beta_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("openai-beta", "assistants=v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "thread_abc",
                "object": "thread",
                "created_at": 1700000000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let thread = client(&server).create_thread().await.unwrap();
        assert_eq!(thread.id, "thread_abc");
        assert_eq!(thread.created_at, 1700000000);
    }

    #[tokio::test]
    async fn list_messages_requests_newest_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads/thread_1/messages"))
            .and(query_param("order", "desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [
                    {"id": "msg_2", "role": "assistant", "created_at": 2,
                     "content": [{"type": "text", "text": {"value": "hi", "annotations": []}}]},
                    {"id": "msg_1", "role": "user", "created_at": 1,
                     "content": [{"type": "text", "text": {"value": "hello", "annotations": []}}]}
                ]
            })))
            .mount(&server)
            .await;

        let messages = client(&server).list_messages("thread_1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "msg_2");
        assert_eq!(messages[0].text(), "hi");
    }

    #[tokio::test]
    async fn submit_tool_outputs_posts_all_outputs_at_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads/t/runs/r/submit_tool_outputs"))
            .and(body_json(json!({
                "tool_outputs": [
                    {"tool_call_id": "c1", "output": "{}"},
                    {"tool_call_id": "c2", "output": "{\"ok\":true}"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "r", "thread_id": "t", "status": "queued"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outputs = vec![
            ToolOutput {
                tool_call_id: "c1".into(),
                output: "{}".into(),
            },
            ToolOutput {
                tool_call_id: "c2".into(),
                output: "{\"ok\":true}".into(),
            },
        ];
        let run = client(&server)
            .submit_tool_outputs("t", "r", &outputs)
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::Queued);
    }

    #[tokio::test]
    async fn api_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/threads/t/runs"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such assistant"))
            .mount(&server)
            .await;

        let err = client(&server).create_run("t", "asst_x").await.unwrap_err();
        match err {
            AssistantError::Api {
                operation,
                status,
                body,
            } => {
                assert_eq!(operation, "create_run");
                assert_eq!(status, 404);
                assert_eq!(body, "no such assistant");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads/t/runs/r"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server).retrieve_run("t", "r").await.unwrap_err();
        assert!(matches!(
            err,
            AssistantError::InvalidResponse {
                operation: "retrieve_run",
                ..
            }
        ));
    }
}
