//! `reqwest` implementation of [`ChatBackend`].

use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::ChatBackend;
use super::dto::{ApiErrorBody, EmptyBody, SendMessageRequest};
use crate::config::ChatClientConfig;
use crate::domain::{Conversation, ConversationId, CustomerView, Message, SupportView};
use crate::error::ChatError;

/// HTTP client for the storefront chat endpoints.
///
/// Every request carries the configured bearer token and is bounded by the
/// configured request timeout.
#[derive(Debug, Clone)]
pub struct HttpChatBackend {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpChatBackend {
    /// Builds a backend from the client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(config: &ChatClientConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ChatError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    /// Base URL all endpoint paths are appended to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let builder = self.client.request(method, url);
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
    ) -> Result<Response, ChatError> {
        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(operation, e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let raw = response.text().await.unwrap_or_default();
        let mut message = ApiErrorBody::message_from(&raw);
        if message.is_empty() {
            message = status.canonical_reason().unwrap_or("request failed").to_string();
        }
        tracing::warn!(operation, status = status.as_u16(), %message, "chat request rejected");
        Err(ChatError::Request {
            operation,
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
    ) -> Result<T, ChatError> {
        let response = self
            .execute(operation, self.request(Method::GET, path))
            .await?;
        decode(operation, response).await
    }

    async fn send_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ChatError> {
        let response = self
            .execute(operation, self.request(method, path).json(body))
            .await?;
        decode(operation, response).await
    }

    async fn put_empty(&self, operation: &'static str, path: &str) -> Result<(), ChatError> {
        self.execute(operation, self.request(Method::PUT, path).json(&EmptyBody {}))
            .await?;
        Ok(())
    }
}

impl ChatBackend for HttpChatBackend {
    async fn start_conversation(&self) -> Result<Conversation, ChatError> {
        self.send_json(
            "start_conversation",
            Method::POST,
            "/conversations/start",
            &EmptyBody {},
        )
        .await
    }

    async fn close_conversation(&self, id: &ConversationId) -> Result<(), ChatError> {
        self.put_empty("close_conversation", &format!("/conversations/close/{id}"))
            .await
    }

    async fn list_own_conversations(
        &self,
        view: &CustomerView,
    ) -> Result<Vec<Conversation>, ChatError> {
        tracing::debug!(user_id = %view.user_id(), "listing own conversations");
        self.get_json("list_own_conversations", "/conversations").await
    }

    async fn list_all_conversations(
        &self,
        view: &SupportView,
    ) -> Result<Vec<Conversation>, ChatError> {
        tracing::debug!(user_id = %view.user_id(), "listing all conversations");
        self.get_json("list_all_conversations", "/conversations/all")
            .await
    }

    async fn mark_read(&self, id: &ConversationId) -> Result<(), ChatError> {
        self.put_empty("mark_read", &format!("/messages/{id}/read"))
            .await
    }

    async fn send_message(&self, id: &ConversationId, content: &str) -> Result<Message, ChatError> {
        let body = SendMessageRequest {
            conversation_id: id.clone(),
            content: content.to_string(),
        };
        self.send_json("send_message", Method::POST, "/messages", &body)
            .await
    }

    async fn fetch_messages(&self, id: &ConversationId) -> Result<Vec<Message>, ChatError> {
        self.get_json("fetch_messages", &format!("/messages/{id}"))
            .await
    }
}

async fn decode<T: DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> Result<T, ChatError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| map_reqwest_error(operation, e))?;
    serde_json::from_slice(&bytes).map_err(|e| ChatError::Decode {
        operation,
        message: e.to_string(),
    })
}

fn map_reqwest_error(operation: &'static str, err: reqwest::Error) -> ChatError {
    if err.is_timeout() {
        tracing::warn!(operation, "chat request timed out");
        ChatError::Timeout { operation }
    } else {
        tracing::warn!(operation, error = %err, "chat request failed");
        ChatError::Http {
            operation,
            source: err,
        }
    }
}
