//! Organization API client
//!
//! Two calls gate the rest of the conversion and fail hard: organization
//! creation and the readiness poll. Everything after that goes through
//! [`OrgApiClient::send`], which logs failures and hands back an empty object.

use crate::config::{ConvertConfig, NOT_READY_STATUS};
use crate::error::{ConvertError, Result};
use crate::token::TokenProvider;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Client for one organization server
pub struct OrgApiClient {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<dyn TokenProvider>,
    config: ConvertConfig,
}

impl std::fmt::Debug for OrgApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrgApiClient")
            .field("transport", &self.transport)
            .field("server", &self.config.server_url())
            .finish_non_exhaustive()
    }
}

impl OrgApiClient {
    #[must_use]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<dyn TokenProvider>,
        config: ConvertConfig,
    ) -> Self {
        Self {
            transport,
            tokens,
            config,
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    fn api_url(&self, org_id: &str, uri: &str) -> String {
        format!(
            "{}{}{}",
            self.config.server_url(),
            self.config.api_base(org_id),
            uri
        )
    }

    async fn request(&self, method: Method, url: String, body: Option<Value>) -> Result<HttpResponse> {
        let bearer = self.tokens.token().await?;
        let response = self
            .transport
            .send(HttpRequest {
                method,
                url,
                bearer,
                body,
            })
            .await?;
        Ok(response)
    }

    /// Create a new organization for the configured state
    ///
    /// # Errors
    /// Any non-200 status, a missing `orgid`, or a transport failure
    pub async fn create_org(&self) -> Result<String> {
        const STEP: &str = "organization creation";

        let url = format!("{}/orgid/v1/new", self.config.server_url());
        let body = json!({ "state": self.config.state });
        let response = self.request(Method::Post, url, Some(body)).await?;
        if !response.is_ok() {
            return Err(ConvertError::Status {
                step: STEP,
                status: response.status,
            });
        }

        let org_id = response
            .str_field("orgid")
            .filter(|id| !id.is_empty())
            .ok_or(ConvertError::MissingField {
                step: STEP,
                field: "orgid",
            })?;
        info!(org_id, "organization created");
        Ok(org_id.to_string())
    }

    /// Poll until the organization is provisioned
    ///
    /// Sleeps `poll_interval` between attempts while the server answers
    /// "not ready". Returns the number of attempts used.
    ///
    /// # Errors
    /// Any other non-200 status, a transport failure, or running out of attempts
    pub async fn poll_ready(&self, org_id: &str) -> Result<u32> {
        let url = self.api_url(org_id, "/uncle");
        let max = self.config.max_poll_attempts;

        for attempt in 1..=max {
            let response = self.request(Method::Get, url.clone(), None).await?;
            match response.status {
                200 => {
                    info!(org_id, attempt, "organization ready");
                    return Ok(attempt);
                }
                NOT_READY_STATUS => {
                    debug!(org_id, attempt, "organization not ready");
                    if attempt < max {
                        tokio::time::sleep(self.config.poll_interval).await;
                    }
                }
                status => {
                    return Err(ConvertError::Status {
                        step: "readiness poll",
                        status,
                    })
                }
            }
        }

        Err(ConvertError::NotReady { attempts: max })
    }

    /// POST to an organization endpoint, best-effort
    ///
    /// Returns the response body, or an empty object when the token, the
    /// transport or the status fails.
    pub async fn send(&self, org_id: &str, uri: &str, body: Value) -> Value {
        let url = self.api_url(org_id, uri);
        match self.request(Method::Post, url, Some(body)).await {
            Ok(response) if response.is_ok() => response.body,
            Ok(response) => {
                warn!(uri, status = response.status, "request rejected");
                Value::Object(Map::new())
            }
            Err(e) => {
                warn!(uri, error = %e, "request failed");
                Value::Object(Map::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::MockTokenProvider;
    use crate::transport::TransportError;
    use std::result::Result;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct Canned {
        responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Canned {
        fn with(responses: Vec<Result<HttpResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::default(),
            })
        }
    }

    #[async_trait]
    impl HttpTransport for Canned {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().push(request);
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::new(200, json!({}))))
        }
    }

    fn tokens() -> Arc<MockTokenProvider> {
        let mut mock = MockTokenProvider::new();
        mock.expect_token().returning(|| Ok("tok".to_string()));
        Arc::new(mock)
    }

    fn client(transport: Arc<Canned>) -> OrgApiClient {
        let config = ConvertConfig::new("CA").with_poll_interval(Duration::from_millis(1));
        OrgApiClient::new(transport, tokens(), config)
    }

    #[tokio::test]
    async fn create_org_reads_orgid() {
        let transport = Canned::with(vec![Ok(HttpResponse::new(200, json!({"orgid": "ORG1"})))]);
        let client = client(transport.clone());

        assert_eq!(client.create_org().await.unwrap(), "ORG1");

        let seen = transport.seen.lock();
        assert_eq!(seen[0].url, "https://gotv-ca.ourvoiceusa.org/orgid/v1/new");
        assert_eq!(seen[0].method, Method::Post);
        assert_eq!(seen[0].bearer, "tok");
        assert_eq!(seen[0].body, Some(json!({"state": "CA"})));
    }

    #[tokio::test]
    async fn create_org_failures_are_fatal() {
        let client_500 = client(Canned::with(vec![Ok(HttpResponse::new(500, Value::Null))]));
        assert!(matches!(
            client_500.create_org().await,
            Err(ConvertError::Status { status: 500, .. })
        ));

        let client_empty = client(Canned::with(vec![Ok(HttpResponse::new(200, json!({})))]));
        assert!(matches!(
            client_empty.create_org().await,
            Err(ConvertError::MissingField { field: "orgid", .. })
        ));
    }

    #[tokio::test]
    async fn poll_retries_while_not_ready() {
        let transport = Canned::with(vec![
            Ok(HttpResponse::new(418, Value::Null)),
            Ok(HttpResponse::new(418, Value::Null)),
            Ok(HttpResponse::new(200, json!({}))),
        ]);
        let client = client(transport.clone());

        assert_eq!(client.poll_ready("ORG1").await.unwrap(), 3);
        let seen = transport.seen.lock();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].method, Method::Get);
        assert_eq!(
            seen[0].url,
            "https://gotv-ca.ourvoiceusa.org/HelloVoterHQ/ORG1/api/v1/uncle"
        );
    }

    #[tokio::test]
    async fn poll_gives_up() {
        let transport = Canned::with(
            (0..20)
                .map(|_| Ok(HttpResponse::new(418, Value::Null)))
                .collect(),
        );
        let client = client(transport.clone());

        assert!(matches!(
            client.poll_ready("ORG1").await,
            Err(ConvertError::NotReady { attempts: 12 })
        ));
        assert_eq!(transport.seen.lock().len(), 12);
    }

    #[tokio::test]
    async fn poll_unexpected_status_is_fatal() {
        let transport = Canned::with(vec![
            Ok(HttpResponse::new(418, Value::Null)),
            Ok(HttpResponse::new(503, Value::Null)),
        ]);
        let client = client(transport.clone());

        assert!(matches!(
            client.poll_ready("ORG1").await,
            Err(ConvertError::Status { status: 503, .. })
        ));
        assert_eq!(transport.seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn send_swallows_failures() {
        let transport = Canned::with(vec![
            Ok(HttpResponse::new(500, json!({"error": "boom"}))),
            Err(TransportError::new("u", "connection reset")),
            Ok(HttpResponse::new(200, json!({"turfId": "T1"}))),
        ]);
        let client = client(transport);

        assert_eq!(client.send("ORG1", "/hello", json!({})).await, json!({}));
        assert_eq!(client.send("ORG1", "/hello", json!({})).await, json!({}));
        assert_eq!(
            client.send("ORG1", "/turf/create", json!({})).await,
            json!({"turfId": "T1"})
        );
    }

    #[tokio::test]
    async fn token_failure_blocks_gating_calls() {
        let mut mock = MockTokenProvider::new();
        mock.expect_token()
            .returning(|| Err(ConvertError::Token("expired".into())));
        let transport = Canned::with(vec![]);
        let client = OrgApiClient::new(transport.clone(), Arc::new(mock), ConvertConfig::new("ca"));

        assert!(matches!(client.create_org().await, Err(ConvertError::Token(_))));
        assert_eq!(client.send("ORG1", "/hello", json!({})).await, json!({}));
        assert!(transport.seen.lock().is_empty());
    }
}
