//! HTTP collaborator: registration and history pull.

use async_trait::async_trait;

use crate::{
    config::ClientConfig,
    domain::Message,
    dto::{HistoryResponse, RegisterRequest, RegisterResponse},
    error::ClientError,
};

/// Requests the chat client makes over HTTP
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Register `username` and return the assigned user id
    async fn register(&self, username: &str) -> Result<i64, ClientError>;

    /// Pull the message history; `None` when the response carries no list
    async fn pull_history(&self) -> Result<Option<Vec<Message>>, ClientError>;
}

/// `reqwest` implementation of [`ChatApi`]
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    http: reqwest::Client,
    register_url: String,
    history_url: String,
}

impl HttpChatApi {
    /// Build a client whose requests give up after `config.request_timeout`
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        Ok(Self::with_client(http, config))
    }

    pub fn with_client(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            register_url: config.register_url(),
            history_url: config.history_url(),
        }
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn register(&self, username: &str) -> Result<i64, ClientError> {
        tracing::debug!("POST {}", self.register_url);
        let response = self
            .http
            .post(&self.register_url)
            .json(&RegisterRequest {
                username: username.to_string(),
            })
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ClientError::Registration(e.to_string()))?;

        let body: RegisterResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Registration(e.to_string()))?;
        Ok(body.id)
    }

    async fn pull_history(&self) -> Result<Option<Vec<Message>>, ClientError> {
        tracing::debug!("GET {}", self.history_url);
        let response = self
            .http
            .get(&self.history_url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ClientError::History(e.to_string()))?;

        let body: HistoryResponse = response
            .json()
            .await
            .map_err(|e| ClientError::History(e.to_string()))?;
        Ok(body
            .messages
            .map(|messages| messages.into_iter().map(Message::from).collect()))
    }
}
