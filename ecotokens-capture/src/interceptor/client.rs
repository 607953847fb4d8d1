//! A reqwest client whose responses pass through a [`ResponseTap`].

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::instrument;

use super::layer::RequestHook;
use super::tap::{ObservedResponse, ResponseTap};

/// A fully read response.
#[derive(Debug, Clone)]
pub struct TappedResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body, unchanged.
    pub body: Bytes,
}

impl TappedResponse {
    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Body decoded as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// HTTP client that shows every response body to a tap.
///
/// The caller gets the response exactly as received; the tap sees a clone
/// of the body.
#[derive(Debug)]
pub struct TappedClient {
    client: Client,
    tap: RwLock<Arc<ResponseTap>>,
}

impl TappedClient {
    /// Wraps `client`.
    pub fn new(client: Client, tap: Arc<ResponseTap>) -> Self {
        Self {
            client,
            tap: RwLock::new(tap),
        }
    }

    /// Starts a GET request.
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Starts a POST request with a JSON body.
    pub fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> RequestBuilder {
        self.client.post(url).json(body)
    }

    /// Sends a request, reads the body, and shows it to the tap.
    #[instrument(skip(self, request))]
    pub async fn send(&self, request: RequestBuilder) -> Result<TappedResponse, reqwest::Error> {
        let response = request.send().await?;
        let url = response.url().to_string();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        let tap = Arc::clone(&self.tap.read().unwrap_or_else(PoisonError::into_inner));
        tap.observe(&ObservedResponse {
            url,
            body: body.clone(),
        });

        Ok(TappedResponse {
            status,
            headers,
            body,
        })
    }
}

impl RequestHook for TappedClient {
    fn name(&self) -> &str {
        "reqwest"
    }

    fn is_installed(&self, tap: &Arc<ResponseTap>) -> bool {
        Arc::ptr_eq(&self.tap.read().unwrap_or_else(PoisonError::into_inner), tap)
    }

    fn install(&self, tap: Arc<ResponseTap>) {
        *self.tap.write().unwrap_or_else(PoisonError::into_inner) = tap;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::layer::InterceptionLayer;
    use ecotokens_core::ProviderKind;
    use serde_json::{Value, json};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BODY: &str = r#"{"usage":{"prompt_tokens":10,"completion_tokens":20}}"#;

    #[tokio::test]
    async fn test_caller_and_tap_both_see_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/backend-api/conversation"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(BODY, "application/json"))
            .expect(1)
            .mount(&server)
            .await;
        let (tap, mut rx) = ResponseTap::channel(Some(ProviderKind::ChatGpt));
        let client = TappedClient::new(Client::new(), Arc::new(tap));

        let url = format!("{}/backend-api/conversation", server.uri());
        let response = client.send(client.get(&url)).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text(), BODY);
        let value: Value = response.json().unwrap();
        assert_eq!(value["usage"]["prompt_tokens"], 10);

        let message = rx.try_recv().unwrap();
        assert_eq!(message.event().provider, ProviderKind::ChatGpt);
        assert_eq!(message.event().total_tokens, 30);
        assert_eq!(message.event().url, url);
    }

    #[tokio::test]
    async fn test_large_post_body_reaches_server_and_reply_is_tapped() {
        let request = json!({ "action": "next", "prompt": "x".repeat(8192) });
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/backend-api/f/conversation"))
            .and(body_json(&request))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "gpt-4o",
                "usage": { "prompt_tokens": 7, "completion_tokens": 5 }
            })))
            .expect(1)
            .mount(&server)
            .await;
        let (tap, mut rx) = ResponseTap::channel(Some(ProviderKind::ChatGpt));
        let client = TappedClient::new(Client::new(), Arc::new(tap));

        let url = format!("{}/backend-api/f/conversation", server.uri());
        let response = client.send(client.post_json(&url, &request)).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);

        let received = server.received_requests().await.unwrap();
        assert_eq!(received[0].body_json::<Value>().unwrap(), request);

        let message = rx.try_recv().unwrap();
        assert_eq!(message.event().model, "gpt-4o");
        assert_eq!(message.event().total_tokens, 12);
    }

    #[tokio::test]
    async fn test_layer_installs_client_tap() {
        let (first, _rx1) = ResponseTap::channel(None);
        let (second, _rx2) = ResponseTap::channel(None);
        let second = Arc::new(second);
        let client = Arc::new(TappedClient::new(Client::new(), Arc::new(first)));
        assert!(!client.is_installed(&second));

        let _handle = InterceptionLayer::new(Arc::clone(&second))
            .with_hook(client.clone())
            .install();
        assert!(client.is_installed(&second));
    }
}
