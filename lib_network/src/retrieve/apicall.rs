//! # Response Pipeline
//!
//! `ApiCall` sends requests through a `NetworkService` and turns the outcome
//! into typed values:
//!
//! - GET responses are decoded as a paginated [`Page`] envelope. An
//!   `error_id`/`error_message` pair inside a 2xx body is an application
//!   error and, under the default [`PipelinePolicy`], wins over the HTTP
//!   success status, even when the body carries nothing else. Any other body
//!   that is not a complete envelope is `ServiceError::Parsing`.
//! - PUT responses are decoded as `T` and handed to a caller transform.
//! - Transport errors get exactly one reinterpretation pass: a 4xx payload is
//!   read as an auth-style object, then as a request-style object, and
//!   otherwise becomes `ServiceError::Parsing`.
//!
//! Nothing here retries.

use std::any::type_name;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::endpoint::{CustomHost, Endpoint, EndpointError, QueryItem};
use super::errors::{ApiFailure, AuthErrorPayload, RequestErrorPayload, ServiceError, TransportError};
use super::transport::NetworkService;
use crate::loggers::LoggerLocal;

/// Paginated response envelope (`snake_case` on the wire). Only the error
/// pair may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
    pub quota_max: i64,
    pub quota_remaining: i64,
    #[serde(default)]
    pub error_id: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl<T> Page<T> {
    /// The embedded application error, when both halves are present.
    pub fn embedded_error(&self) -> Option<ApiFailure> {
        embedded_failure(self.error_id, self.error_message.as_deref())
    }
}

/// The error pair alone, read before the envelope so an error-only body
/// still reports its error.
#[derive(Debug, Deserialize)]
struct EmbeddedError {
    #[serde(default)]
    error_id: Option<i64>,
    #[serde(default)]
    error_message: Option<String>,
}

fn embedded_failure(error_id: Option<i64>, error_message: Option<&str>) -> Option<ApiFailure> {
    match (error_id, error_message) {
        (Some(id), Some(message)) => Some(ApiFailure {
            error: id.to_string(),
            error_description: message.to_string(),
        }),
        _ => None,
    }
}

/// How the pipeline treats application errors embedded in 2xx envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PipelinePolicy {
    /// Fail with `ServiceError::Api` when an envelope embeds an error.
    /// When false the items are returned and the error is logged.
    pub embedded_errors_take_precedence: bool,
}

impl Default for PipelinePolicy {
    fn default() -> Self {
        Self {
            embedded_errors_take_precedence: true,
        }
    }
}

/// Typed request executor bound to one host configuration.
#[derive(Clone)]
pub struct ApiCall {
    service: Arc<dyn NetworkService>,
    custom_host: CustomHost,
    authorization: Option<HeaderMap>,
    logger: Arc<LoggerLocal>,
    policy: PipelinePolicy,
}

impl std::fmt::Debug for ApiCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCall")
            .field("custom_host", &self.custom_host)
            .field("authorized", &self.authorization.is_some())
            .field("policy", &self.policy)
            .finish()
    }
}

impl ApiCall {
    pub fn new(service: Arc<dyn NetworkService>, custom_host: CustomHost) -> Self {
        Self {
            service,
            custom_host,
            authorization: None,
            logger: Arc::new(LoggerLocal::new("Network", None)),
            policy: PipelinePolicy::default(),
        }
    }

    /// Sends `Authorization: Bearer <token>` with every request.
    pub fn with_bearer_token(mut self, token: &str) -> Result<Self, ServiceError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ServiceError::InvalidHeader(AUTHORIZATION.to_string()))?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        self.authorization = Some(headers);
        Ok(self)
    }

    pub fn with_logger(mut self, logger: Arc<LoggerLocal>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_policy(mut self, policy: PipelinePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn custom_host(&self) -> &CustomHost {
        &self.custom_host
    }

    pub fn policy(&self) -> PipelinePolicy {
        self.policy
    }

    /// An endpoint for `api` on the configured host.
    pub fn endpoint(&self, api: &str, query_items: Option<Vec<QueryItem>>) -> Result<Endpoint, EndpointError> {
        Endpoint::new(&self.custom_host, api, query_items)
    }

    /// GETs `url` and decodes the whole envelope.
    pub async fn get_page<T: DeserializeOwned>(&self, url: &Url) -> Result<Page<T>, ServiceError> {
        let data = self
            .service
            .get(url, self.authorization.as_ref())
            .await
            .map_err(|e| self.reinterpret(e))?;

        let embedded = serde_json::from_slice::<EmbeddedError>(&data)
            .ok()
            .and_then(|e| embedded_failure(e.error_id, e.error_message.as_deref()));
        if let Some(failure) = &embedded {
            if self.policy.embedded_errors_take_precedence {
                return Err(ServiceError::Api(failure.clone()));
            }
        }

        let page: Page<T> = self.parse(&data).ok_or(ServiceError::Parsing)?;

        if let Some(failure) = embedded {
            self.logger.warning(
                &format!(
                    "Ignoring embedded error {} ({}) from {}",
                    failure.error, failure.error_description, url
                ),
                None,
            );
        }

        Ok(page)
    }

    /// GETs `url` and returns only the envelope's items.
    pub async fn get_list<T: DeserializeOwned>(&self, url: &Url) -> Result<Vec<T>, ServiceError> {
        self.get_page(url).await.map(|page| page.items)
    }

    /// PUTs `body` to `url`, decodes the response as `T` and applies `transform`.
    pub async fn put<T, R, F>(&self, url: &Url, body: Bytes, transform: F) -> Result<R, ServiceError>
    where
        T: DeserializeOwned,
        F: FnOnce(T) -> R,
    {
        let data = self
            .service
            .put(url, self.authorization.as_ref(), body)
            .await
            .map_err(|e| self.reinterpret(e))?;

        let parsed: T = self.parse(&data).ok_or(ServiceError::Parsing)?;
        Ok(transform(parsed))
    }

    /// Decodes `data` as `T`, logging the failure.
    fn parse<T: DeserializeOwned>(&self, data: &[u8]) -> Option<T> {
        match serde_json::from_slice(data) {
            Ok(value) => Some(value),
            Err(e) => {
                self.logger
                    .error(&format!("JSON parsing failed for {}: {}", type_name::<T>(), e), None);
                None
            }
        }
    }

    /// The single reinterpretation pass from transport to service errors.
    fn reinterpret(&self, error: TransportError) -> ServiceError {
        match error {
            TransportError::NetworkFailure { .. } => ServiceError::Network,
            TransportError::NoData | TransportError::ParsingFailure => ServiceError::Parsing,
            TransportError::ClientError(payload) => self.reinterpret_payload(&payload),
        }
    }

    fn reinterpret_payload(&self, payload: &[u8]) -> ServiceError {
        if let Ok(auth) = serde_json::from_slice::<AuthErrorPayload>(payload) {
            return ServiceError::Api(auth);
        }
        if let Ok(request) = serde_json::from_slice::<RequestErrorPayload>(payload) {
            return ServiceError::Api(ApiFailure::from(request));
        }
        self.logger.debug(
            &format!("Client error payload of {} bytes has no known shape", payload.len()),
            None,
        );
        ServiceError::Parsing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieve::mock::NetworkServicesFailed;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays one canned outcome and records the headers it was called with.
    struct Canned {
        outcome: Result<Bytes, TransportError>,
        seen_headers: Mutex<Option<HeaderMap>>,
    }

    impl Canned {
        fn new(outcome: Result<&'static [u8], TransportError>) -> Arc<Self> {
            Arc::new(Self {
                outcome: outcome.map(Bytes::from_static),
                seen_headers: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl NetworkService for Canned {
        async fn get(&self, _url: &Url, headers: Option<&HeaderMap>) -> Result<Bytes, TransportError> {
            *self.seen_headers.lock().unwrap() = headers.cloned();
            self.outcome.clone()
        }

        async fn put(&self, _url: &Url, headers: Option<&HeaderMap>, _body: Bytes) -> Result<Bytes, TransportError> {
            *self.seen_headers.lock().unwrap() = headers.cloned();
            self.outcome.clone()
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u32,
    }

    fn call(service: Arc<dyn NetworkService>) -> ApiCall {
        ApiCall::new(service, CustomHost::new("api.example.com"))
            .with_logger(Arc::new(LoggerLocal::disabled()))
    }

    fn url() -> Url {
        Url::parse("https://api.example.com/items").unwrap()
    }

    #[tokio::test]
    async fn envelope_items_are_returned() {
        let service = Canned::new(Ok(br#"{"items":[{"id":1},{"id":2}],"has_more":true,"quota_max":300,"quota_remaining":299}"#));
        let page: Page<Item> = call(service).get_page(&url()).await.unwrap();
        assert_eq!(page.items, vec![Item { id: 1 }, Item { id: 2 }]);
        assert!(page.has_more);
        assert_eq!(page.quota_remaining, 299);
    }

    #[tokio::test]
    async fn embedded_error_wins_over_success() {
        let service = Canned::new(Ok(br#"{"items":[],"error_id":400,"error_message":"bad_parameter"}"#));
        let result: Result<Vec<Item>, _> = call(service).get_list(&url()).await;
        assert_eq!(
            result,
            Err(ServiceError::Api(ApiFailure {
                error: "400".to_string(),
                error_description: "bad_parameter".to_string(),
            }))
        );
    }

    #[tokio::test]
    async fn embedded_error_can_be_demoted_to_a_warning() {
        let service = Canned::new(Ok(br#"{"items":[{"id":7}],"has_more":false,"quota_max":300,"quota_remaining":1,"error_id":400,"error_message":"bad_parameter"}"#));
        let policy = PipelinePolicy {
            embedded_errors_take_precedence: false,
        };
        let items: Vec<Item> = call(service).with_policy(policy).get_list(&url()).await.unwrap();
        assert_eq!(items, vec![Item { id: 7 }]);
    }

    #[tokio::test]
    async fn half_an_embedded_error_is_ignored() {
        let service = Canned::new(Ok(br#"{"items":[{"id":3}],"has_more":false,"quota_max":300,"quota_remaining":1,"error_id":400}"#));
        let items: Vec<Item> = call(service).get_list(&url()).await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn error_only_body_without_precedence_is_a_parsing_error() {
        let service = Canned::new(Ok(br#"{"error_id":400,"error_message":"bad_parameter"}"#));
        let policy = PipelinePolicy {
            embedded_errors_take_precedence: false,
        };
        let result: Result<Vec<Item>, _> = call(service).with_policy(policy).get_list(&url()).await;
        assert_eq!(result, Err(ServiceError::Parsing));
    }

    #[tokio::test]
    async fn body_of_another_shape_is_a_parsing_error() {
        let service = Canned::new(Ok(br#"{"unexpected":"shape"}"#));
        let result: Result<Vec<Item>, _> = call(service).get_list(&url()).await;
        assert_eq!(result, Err(ServiceError::Parsing));

        let service = Canned::new(Ok(br#"{"items":[{"id":1}]}"#));
        let result: Result<Vec<Item>, _> = call(service).get_list(&url()).await;
        assert_eq!(result, Err(ServiceError::Parsing));
    }

    #[tokio::test]
    async fn malformed_body_is_a_parsing_error() {
        let service = Canned::new(Ok(b"<html>"));
        let result: Result<Vec<Item>, _> = call(service).get_list(&url()).await;
        assert_eq!(result, Err(ServiceError::Parsing));
    }

    #[tokio::test]
    async fn auth_style_payload_becomes_api_error() {
        let service = Canned::new(Err(TransportError::ClientError(Bytes::from_static(
            br#"{"error":"404","error_description":"not_found"}"#,
        ))));
        let result: Result<Vec<Item>, _> = call(service).get_list(&url()).await;
        match result {
            Err(ServiceError::Api(failure)) => assert!(failure.error_description.contains("not_found")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn request_style_payload_becomes_api_error() {
        let service = Canned::new(Err(TransportError::ClientError(Bytes::from_static(
            br#"{"errors":[{"message":"name taken"}],"success":false}"#,
        ))));
        let result: Result<Vec<Item>, _> = call(service).get_list(&url()).await;
        assert_eq!(
            result,
            Err(ServiceError::Api(ApiFailure {
                error: String::new(),
                error_description: "name taken".to_string(),
            }))
        );
    }

    #[tokio::test]
    async fn unknown_payload_falls_back_to_parsing() {
        let service = Canned::new(Err(TransportError::ClientError(Bytes::from_static(b"nope"))));
        let result: Result<Vec<Item>, _> = call(service).get_list(&url()).await;
        assert_eq!(result, Err(ServiceError::Parsing));
    }

    #[tokio::test]
    async fn transport_failures_map_once() {
        let result: Result<Vec<Item>, _> = call(Arc::new(NetworkServicesFailed)).get_list(&url()).await;
        assert_eq!(result, Err(ServiceError::Network));

        let service = Canned::new(Err(TransportError::NoData));
        let result: Result<Vec<Item>, _> = call(service).get_list(&url()).await;
        assert_eq!(result, Err(ServiceError::Parsing));
    }

    #[tokio::test]
    async fn put_transforms_the_decoded_body() {
        let service = Canned::new(Ok(br#"{"id":42}"#));
        let id = call(service)
            .put(&url(), Bytes::from_static(b"{}"), |item: Item| item.id * 2)
            .await
            .unwrap();
        assert_eq!(id, 84);
    }

    #[tokio::test]
    async fn put_sends_an_empty_body_as_is() {
        let service = Canned::new(Ok(br#"{"id":42}"#));
        let id = call(service).put(&url(), Bytes::new(), |item: Item| item.id).await.unwrap();
        assert_eq!(id, 42);
    }

    #[tokio::test]
    async fn bearer_token_is_sent() {
        let service = Canned::new(Ok(br#"{"items":[],"has_more":false,"quota_max":300,"quota_remaining":300}"#));
        let api = call(service.clone()).with_bearer_token("secret").unwrap();
        let _: Vec<Item> = api.get_list(&url()).await.unwrap();

        let headers = service.seen_headers.lock().unwrap().clone().unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer secret");
    }

    #[test]
    fn invalid_token_is_a_typed_error() {
        let result = call(Arc::new(NetworkServicesFailed)).with_bearer_token("bad\ntoken");
        assert!(matches!(result, Err(ServiceError::InvalidHeader(_))));
    }
}
