//! Trello REST client (card creation only).

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::TrelloConfig;
use crate::error::ProviderError;

const PROVIDER: &str = "trello";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub name: String,
}

pub struct TrelloClient {
    http: reqwest::Client,
    config: TrelloConfig,
}

impl TrelloClient {
    pub fn new(config: TrelloConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Create a card in `list_id`, or in the configured inbox list.
    pub async fn create_card(
        &self,
        name: &str,
        description: &str,
        list_id: Option<&str>,
    ) -> Result<Card, ProviderError> {
        let list_id = list_id
            .or(self.config.inbox_list_id.as_deref())
            .ok_or_else(|| ProviderError::NotConfigured {
                provider: "trello inbox list".into(),
            })?;

        let resp = self
            .http
            .post(format!("{}/cards", self.config.api_base))
            .header("Accept", "application/json")
            .query(&[
                ("idList", list_id),
                ("name", name),
                ("desc", description),
                ("key", self.config.api_key.as_str()),
                ("token", self.config.api_token.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::request(PROVIDER, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider: PROVIDER.into(),
                status: status.as_u16(),
                body,
            });
        }

        let card: Card = resp
            .json()
            .await
            .map_err(|e| ProviderError::invalid(PROVIDER, e))?;
        tracing::info!(card_id = %card.id, list_id, "Created Trello card");
        Ok(card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, inbox: Option<&str>) -> TrelloClient {
        TrelloClient::new(TrelloConfig {
            api_key: "key".into(),
            api_token: SecretString::from("tok"),
            inbox_list_id: inbox.map(str::to_string),
            api_base: server.uri(),
        })
    }

    #[tokio::test]
    async fn creates_card_in_inbox_list_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cards"))
            .and(query_param("idList", "inbox"))
            .and(query_param("name", "Pay invoice"))
            .and(query_param("desc", "Due Friday & urgent"))
            .and(query_param("key", "key"))
            .and(query_param("token", "tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "card1",
                "url": "https://trello.com/c/card1",
                "name": "Pay invoice"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let card = client(&server, Some("inbox"))
            .create_card("Pay invoice", "Due Friday & urgent", None)
            .await
            .unwrap();
        assert_eq!(card.id, "card1");
    }

    #[tokio::test]
    async fn explicit_list_wins() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cards"))
            .and(query_param("idList", "other"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c"})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, Some("inbox"))
            .create_card("n", "d", Some("other"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_list_is_not_configured() {
        let server = MockServer::start().await;
        let err = client(&server, None)
            .create_card("n", "d", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured { .. }));
    }
}
