use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend-call failure, classified so callers can tell transport trouble
/// from a response that doesn't match the wire contract.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("server returned {0}")]
    Status(StatusCode),
    #[error("malformed response: {0}")]
    Protocol(#[source] reqwest::Error),
    #[error("response missing field `{0}`")]
    MissingField(&'static str),
}

impl ApiError {
    fn classify(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Protocol(err)
        } else {
            ApiError::Network(err)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub preview: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

#[derive(Deserialize)]
struct SessionsResponse {
    sessions: Vec<SessionSummary>,
}

#[derive(Deserialize)]
struct HistoryResponse {
    history: Vec<HistoryMessage>,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    message: &'a str,
    session_id: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    response: Option<String>,
}

/// HTTP client for the chat backend. Pure data access: no terminal or
/// storage knowledge.
#[derive(Clone)]
pub struct ChatApi {
    client: Client,
    base_url: String,
}

impl ChatApi {
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Lists known sessions. Ordering is the backend's; the last element is
    /// the most recent.
    pub async fn fetch_sessions(&self) -> Result<Vec<SessionSummary>, ApiError> {
        let url = format!("{}/api/chat/sessions", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ApiError::classify)?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }

        let body: SessionsResponse = response.json().await.map_err(ApiError::classify)?;
        Ok(body.sessions)
    }

    /// Message history of one session. An empty list is a valid result for
    /// a brand-new session.
    pub async fn fetch_history(&self, session_id: &str) -> Result<Vec<HistoryMessage>, ApiError> {
        let url = format!("{}/api/chat/history", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("session_id", session_id)])
            .send()
            .await
            .map_err(ApiError::classify)?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }

        let body: HistoryResponse = response.json().await.map_err(ApiError::classify)?;
        Ok(body.history)
    }

    /// Posts one user message tagged with its session and returns the
    /// assistant's reply text.
    pub async fn send_message(&self, session_id: &str, text: &str) -> Result<String, ApiError> {
        let url = format!("{}/api/chat", self.base_url);

        let request = SendRequest {
            message: text,
            session_id,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(ApiError::classify)?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }

        let body: SendResponse = response.json().await.map_err(ApiError::classify)?;
        body.response.ok_or(ApiError::MissingField("response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let api = ChatApi::new("http://localhost:5000/");
        assert_eq!(api.base_url, "http://localhost:5000");
    }

    #[test]
    fn test_send_response_missing_field_is_not_a_decode_error() {
        let body: SendResponse = serde_json::from_str("{}").unwrap();
        assert!(body.response.is_none());

        let body: SendResponse = serde_json::from_str(r#"{"response": "42"}"#).unwrap();
        assert_eq!(body.response.as_deref(), Some("42"));
    }

    #[test]
    fn test_history_shape_parses() {
        let raw = r#"{"history": [
            {"role": "user", "content": "hi"},
            {"role": "assistant", "content": "hello"}
        ]}"#;
        let body: HistoryResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(body.history.len(), 2);
        assert_eq!(body.history[0].role, "user");
        assert_eq!(body.history[1].content, "hello");
    }

    #[test]
    fn test_sessions_shape_parses() {
        let raw = r#"{"sessions": [{"id": "s1", "preview": "a"}, {"id": "s2", "preview": "b"}]}"#;
        let body: SessionsResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(body.sessions.len(), 2);
        assert_eq!(body.sessions[1].id, "s2");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_network_error() {
        // Nothing listens on this port; connection is refused immediately.
        let api = ChatApi::new("http://127.0.0.1:9");
        match api.fetch_sessions().await {
            Err(ApiError::Network(_)) | Err(ApiError::Timeout) => {}
            other => panic!("expected transport error, got {:?}", other.map(|_| ())),
        }
    }
}
