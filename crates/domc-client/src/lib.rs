//! HTTP transport for the condition-set REST surface.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use domc_core::{ConditionDraft, ConditionRecord, Offer};

pub const CRATE_NAME: &str = "domc-client";

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout: Duration::from_secs(20),
            user_agent: None,
        }
    }
}

/// One fetched page of condition records plus its paging metadata, exactly as
/// the backend frames it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConditionPage {
    pub allconditions: Vec<ConditionRecord>,
    pub total_pages: u32,
    pub total_records: u64,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Deserialize)]
struct DeleteEnvelope {
    #[serde(default)]
    deleted_condition: Option<ConditionRecord>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned status {status}")]
    Status { status: u16, message: Option<String> },
    #[error("unexpected response shape: {0}")]
    Malformed(String),
}

impl ApiError {
    /// Best available operator-facing message. Server-provided error text is
    /// surfaced verbatim; everything else collapses to a generic line.
    pub fn surface_message(&self) -> String {
        match self {
            ApiError::Status {
                message: Some(text),
                ..
            } => text.clone(),
            ApiError::Status { status, .. } => {
                format!("request rejected with status {status}")
            }
            ApiError::Transport(err) => err.to_string(),
            ApiError::Malformed(_) => "unexpected response from server".to_string(),
        }
    }
}

/// Backend surface the console depends on. Implemented over HTTP here; tests
/// substitute in-memory fakes.
#[async_trait]
pub trait ConditionApi: Send + Sync {
    async fn list_page(&self, page: u32, per_page: u32) -> Result<ConditionPage, ApiError>;
    async fn create(&self, draft: &ConditionDraft) -> Result<ConditionRecord, ApiError>;
    async fn update(&self, id: i64, draft: &ConditionDraft) -> Result<ConditionRecord, ApiError>;
    async fn delete(&self, id: i64) -> Result<ConditionRecord, ApiError>;
    async fn list_offers(&self) -> Result<Vec<Offer>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpConditionApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpConditionApi {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder().gzip(true).timeout(config.timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build().context("building reqwest client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Decode a 2xx body as `T`; map non-2xx to `Status` with any
    /// server-provided error text, and undecodable 2xx bodies to `Malformed`.
    async fn expect_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<ErrorEnvelope>()
                .await
                .ok()
                .and_then(|envelope| envelope.error);
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| ApiError::Malformed(err.to_string()))
    }
}

#[async_trait]
impl ConditionApi for HttpConditionApi {
    async fn list_page(&self, page: u32, per_page: u32) -> Result<ConditionPage, ApiError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("list_page", %request_id, page, per_page);
        async {
            let resp = self
                .client
                .get(self.url("/accepted_rides"))
                .query(&[("page", page), ("per_page", per_page)])
                .send()
                .await?;
            Self::expect_json(resp).await
        }
        .instrument(span)
        .await
    }

    async fn create(&self, draft: &ConditionDraft) -> Result<ConditionRecord, ApiError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("create_condition", %request_id);
        async {
            let resp = self
                .client
                .post(self.url("/conditions"))
                .json(draft)
                .send()
                .await?;
            Self::expect_json(resp).await
        }
        .instrument(span)
        .await
    }

    async fn update(&self, id: i64, draft: &ConditionDraft) -> Result<ConditionRecord, ApiError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("update_condition", %request_id, id);
        async {
            let resp = self
                .client
                .put(self.url(&format!("/conditions/{id}")))
                .json(draft)
                .send()
                .await?;
            Self::expect_json(resp).await
        }
        .instrument(span)
        .await
    }

    async fn delete(&self, id: i64) -> Result<ConditionRecord, ApiError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("delete_condition", %request_id, id);
        async {
            let resp = self
                .client
                .delete(self.url(&format!("/conditions/{id}")))
                .send()
                .await?;
            let status = resp.status().as_u16();
            let envelope: DeleteEnvelope = Self::expect_json(resp).await?;
            match envelope {
                DeleteEnvelope {
                    deleted_condition: Some(record),
                    ..
                } => Ok(record),
                DeleteEnvelope {
                    error: Some(message),
                    ..
                } => Err(ApiError::Status {
                    status,
                    message: Some(message),
                }),
                DeleteEnvelope { .. } => Err(ApiError::Malformed(
                    "delete response carried neither deleted_condition nor error".to_string(),
                )),
            }
        }
        .instrument(span)
        .await
    }

    async fn list_offers(&self) -> Result<Vec<Offer>, ApiError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("list_offers", %request_id);
        async {
            let resp = self.client.get(self.url("/get-offers")).send().await?;
            Self::expect_json(resp).await
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_for(server: &MockServer) -> HttpConditionApi {
        HttpConditionApi::new(HttpClientConfig {
            base_url: server.uri(),
            ..HttpClientConfig::default()
        })
        .expect("client")
    }

    fn record_json(id: i64, service_class: &str) -> serde_json::Value {
        json!({
            "id": id,
            "serviceClass": service_class,
            "pickupAddress": "A",
            "dropoffAddress": "B",
            "status": "active",
            "count": 2,
            "matchedOfferIds": ["offer-1"]
        })
    }

    #[tokio::test]
    async fn list_page_decodes_the_paging_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accepted_rides"))
            .and(query_param("page", "2"))
            .and(query_param("per_page", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "allconditions": [record_json(5, "business")],
                "total_pages": 3,
                "total_records": 25,
                "page": 2,
                "per_page": 10
            })))
            .mount(&server)
            .await;

        let page = api_for(&server).list_page(2, 10).await.expect("page");
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.allconditions.len(), 1);
        assert_eq!(page.allconditions[0].id, 5);
        assert_eq!(page.allconditions[0].matched_offer_ids, vec!["offer-1"]);
    }

    #[tokio::test]
    async fn non_2xx_surfaces_server_error_text_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accepted_rides"))
            .respond_with(
                ResponseTemplate::new(503).set_body_json(json!({"error": "backend draining"})),
            )
            .mount(&server)
            .await;

        let err = api_for(&server).list_page(1, 10).await.expect_err("error");
        assert_eq!(err.surface_message(), "backend draining");
        match err {
            ApiError::Status { status, .. } => assert_eq!(status, 503),
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_2xx_without_error_body_gets_a_generic_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accepted_rides"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = api_for(&server).list_page(1, 10).await.expect_err("error");
        assert_eq!(err.surface_message(), "request rejected with status 500");
    }

    #[tokio::test]
    async fn malformed_2xx_body_is_a_distinct_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accepted_rides"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = api_for(&server).list_page(1, 10).await.expect_err("error");
        assert!(matches!(err, ApiError::Malformed(_)));
        assert_eq!(err.surface_message(), "unexpected response from server");
    }

    #[tokio::test]
    async fn create_posts_the_draft_without_an_id() {
        let server = MockServer::start().await;
        let draft = ConditionDraft {
            service_class: "economy".to_string(),
            pickup_address: "X".to_string(),
            dropoff_address: "Y".to_string(),
            status: None,
            count: 1,
        };
        Mock::given(method("POST"))
            .and(path("/conditions"))
            .and(body_json(json!({
                "serviceClass": "economy",
                "pickupAddress": "X",
                "dropoffAddress": "Y",
                "count": 1
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(record_json(11, "economy")))
            .mount(&server)
            .await;

        let record = api_for(&server).create(&draft).await.expect("record");
        assert_eq!(record.id, 11);
    }

    #[tokio::test]
    async fn update_puts_to_the_per_id_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/conditions/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(record_json(5, "business")))
            .mount(&server)
            .await;

        let draft = ConditionDraft {
            service_class: "business".to_string(),
            ..ConditionDraft::default()
        };
        let record = api_for(&server).update(5, &draft).await.expect("record");
        assert_eq!(record.id, 5);
    }

    #[tokio::test]
    async fn delete_unwraps_the_deleted_condition_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/conditions/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "deleted_condition": record_json(5, "business")
            })))
            .mount(&server)
            .await;

        let record = api_for(&server).delete(5).await.expect("record");
        assert_eq!(record.id, 5);
    }

    #[tokio::test]
    async fn delete_error_envelope_is_surfaced_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/conditions/5"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "row is referenced"})),
            )
            .mount(&server)
            .await;

        let err = api_for(&server).delete(5).await.expect_err("error");
        assert_eq!(err.surface_message(), "row is referenced");
    }

    #[tokio::test]
    async fn offers_listing_decodes_localized_addresses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get-offers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "service_class": "business",
                "pickup_address": {"DE": "Flughafen", "EN": "Airport"},
                "dropoff_address": {"DE": "Bahnhof", "EN": "Station"}
            }])))
            .mount(&server)
            .await;

        let offers = api_for(&server).list_offers().await.expect("offers");
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].pickup_address.en, "Airport");
    }
}
