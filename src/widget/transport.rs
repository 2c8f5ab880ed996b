use async_trait::async_trait;
use log::debug;
use reqwest::Client as HttpClient;
use thiserror::Error;
use url::Url;

use crate::models::chat::{ ChatMessage, ChatRequest, ChatResponse, ErrorResponse };

pub const CHAT_ROUTE: &str = "/api/chat";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid concierge URL '{0}'")]
    InvalidEndpoint(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
    },
}

/// Delivers the visible conversation to the concierge backend.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, messages: &[ChatMessage]) -> Result<String, TransportError>;
}

pub struct HttpTransport {
    http: HttpClient,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let endpoint = Url::parse(base_url)
            .and_then(|base| base.join(CHAT_ROUTE))
            .map_err(|_| TransportError::InvalidEndpoint(base_url.to_string()))?;
        Ok(Self { http: HttpClient::new(), endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, messages: &[ChatMessage]) -> Result<String, TransportError> {
        let request = ChatRequest { messages: messages.to_vec() };
        debug!("POST {} with {} message(s)", self.endpoint, request.messages.len());

        let resp = self.http.post(self.endpoint.clone()).json(&request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<ErrorResponse>().await
                .map(|e| e.error)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());
            return Err(TransportError::Status { status: status.as_u16(), message });
        }

        let body: ChatResponse = resp.json().await?;
        Ok(body.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn joins_chat_route_onto_base() {
        let transport = HttpTransport::new("http://127.0.0.1:4000/").unwrap();
        assert_eq!(transport.endpoint().as_str(), "http://127.0.0.1:4000/api/chat");
        assert!(matches!(HttpTransport::new("not a url"), Err(TransportError::InvalidEndpoint(_))));
    }

    #[tokio::test]
    async fn posts_messages_and_returns_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", CHAT_ROUTE)
            .match_body(
                Matcher::Json(json!({ "messages": [{ "role": "user", "content": "シワが気になります" }] }))
            )
            .with_status(200)
            .with_body(r#"{"content":"ご相談ありがとうございます。"}"#)
            .create_async().await;

        let transport = HttpTransport::new(&server.url()).unwrap();
        let reply = transport.send(&[ChatMessage::user("シワが気になります")]).await.unwrap();
        assert_eq!(reply, "ご相談ありがとうございます。");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", CHAT_ROUTE)
            .with_status(500)
            .with_body(r#"{"error":"Internal Server Error"}"#)
            .create_async().await;

        let transport = HttpTransport::new(&server.url()).unwrap();
        let err = transport.send(&[ChatMessage::user("q")]).await.unwrap_err();
        match err {
            TransportError::Status { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Internal Server Error");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
