use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::channels::trello::TrelloClient;
use crate::tools::tool::{Tool, ToolError, optional_str, require_str};

/// Creates a task card, by default in the configured inbox list.
pub struct TrelloCreateCardTool {
    client: Arc<TrelloClient>,
}

impl TrelloCreateCardTool {
    pub fn new(client: Arc<TrelloClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for TrelloCreateCardTool {
    fn name(&self) -> &str {
        "trello_create_card"
    }

    fn description(&self) -> &str {
        "Creates a new card in Trello"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "The title of the card."},
                "description": {"type": "string", "description": "The description of the card."},
                "listId": {"type": "string", "description": "Optional list ID. Defaults to the inbox list."}
            },
            "required": ["name", "description"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let name = require_str(&params, "name")?;
        let description = require_str(&params, "description")?;
        let list_id = optional_str(&params, "listId");

        let card = self.client.create_card(name, description, list_id).await?;
        Ok(json!({
            "success": true,
            "id": card.id,
            "url": card.url,
            "name": card.name,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrelloConfig;
    use secrecy::SecretString;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn creates_card_and_reports_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cards"))
            .and(query_param("idList", "inbox"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "c1", "url": "https://trello.com/c/c1", "name": "Renew passport"
            })))
            .mount(&server)
            .await;

        let tool = TrelloCreateCardTool::new(Arc::new(TrelloClient::new(TrelloConfig {
            api_key: "k".into(),
            api_token: SecretString::from("t"),
            inbox_list_id: Some("inbox".into()),
            api_base: server.uri(),
        })));
        let out = tool
            .execute(json!({"name": "Renew passport", "description": "Expires in May"}))
            .await
            .unwrap();
        assert_eq!(
            out,
            json!({
                "success": true,
                "id": "c1",
                "url": "https://trello.com/c/c1",
                "name": "Renew passport"
            })
        );
    }

    #[tokio::test]
    async fn missing_description_is_rejected() {
        let tool = TrelloCreateCardTool::new(Arc::new(TrelloClient::new(TrelloConfig {
            api_key: "k".into(),
            api_token: SecretString::from("t"),
            inbox_list_id: None,
            api_base: "http://127.0.0.1:9".into(),
        })));
        let err = tool.execute(json!({"name": "x"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(_)));
    }
}
