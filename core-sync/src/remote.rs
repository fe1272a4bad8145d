//! # Per-entity Remote API
//!
//! Immediate (non-batched) propagation of single mutations to the remote
//! CRUD endpoints.
//!
//! ## Overview
//!
//! The batch engine is the convergence mechanism; these calls are a
//! best-effort fast path fired at mutation time. Their failures are
//! independent of the batch retry policy: a failed CRUD call is logged and
//! the entity simply stays pending until a batch cycle delivers it. Deletes
//! are the exception that matters: the batch path never carries deletions,
//! so the DELETE calls here are the only signal the remote store gets.

use crate::error::{Result, SyncError};
use crate::transport::TransportError;
use bridge_traits::{BridgeError, HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_store::{CardId, ListId, TodoCard, TodoList};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Acknowledgement shape of the per-entity CRUD endpoints
#[derive(Debug, Clone, Deserialize)]
struct AckResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Server-side timestamp of the most recent accepted write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LastSaved {
    pub timestamp: i64,
}

/// Client for the per-entity CRUD endpoints under `/todo-lists/` and
/// `/todo-cards/`.
pub struct RemoteApi {
    http: Arc<dyn HttpClient>,
    base_url: String,
    request_timeout: Duration,
}

impl RemoteApi {
    pub fn new(
        http: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            request_timeout,
        }
    }

    pub async fn create_list(&self, list: &TodoList) -> Result<()> {
        let request = self
            .request(HttpMethod::Post, "/todo-lists/")
            .json(list)
            .map_err(classify)?;
        self.send_acknowledged(request).await
    }

    pub async fn update_list(&self, list: &TodoList) -> Result<()> {
        let request = self
            .request(HttpMethod::Put, &format!("/todo-lists/{}/", list.id))
            .json(list)
            .map_err(classify)?;
        self.send_acknowledged(request).await
    }

    pub async fn delete_list(&self, id: &ListId) -> Result<()> {
        let request = self.request(HttpMethod::Delete, &format!("/todo-lists/{}", id));
        self.send_acknowledged(request).await
    }

    pub async fn create_card(&self, card: &TodoCard) -> Result<()> {
        let request = self
            .request(HttpMethod::Post, "/todo-cards/")
            .json(card)
            .map_err(classify)?;
        self.send_acknowledged(request).await
    }

    pub async fn update_card(&self, card: &TodoCard) -> Result<()> {
        let request = self
            .request(HttpMethod::Put, &format!("/todo-cards/{}/", card.id))
            .json(card)
            .map_err(classify)?;
        self.send_acknowledged(request).await
    }

    pub async fn delete_card(&self, id: &CardId) -> Result<()> {
        let request = self.request(HttpMethod::Delete, &format!("/todo-cards/{}", id));
        self.send_acknowledged(request).await
    }

    /// Read the server-side timestamp of the most recent accepted write
    pub async fn read_last_saved(&self) -> Result<LastSaved> {
        let request = self.request(HttpMethod::Get, "/last-saved/");
        let response = self.execute(request).await?;

        response
            .json::<LastSaved>()
            .map_err(|e| SyncError::Transport(TransportError::Application(e.to_string())))
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest::new(method, format!("{}{}", self.base_url, path))
            .timeout(self.request_timeout)
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.clone();
        let response = self.http.execute(request).await.map_err(classify)?;

        if !response.is_success() {
            return Err(SyncError::RemoteRejected {
                status: response.status,
                message: response.text().unwrap_or_default(),
            });
        }

        debug!(%url, status = response.status, "Remote CRUD call accepted");
        Ok(response)
    }

    async fn send_acknowledged(&self, request: HttpRequest) -> Result<()> {
        let response = self.execute(request).await?;

        let ack: AckResponse = response
            .json()
            .map_err(|e| SyncError::Transport(TransportError::Application(e.to_string())))?;

        if !ack.success {
            return Err(SyncError::RemoteRejected {
                status: response.status,
                message: ack
                    .error
                    .unwrap_or_else(|| "endpoint reported failure".to_string()),
            });
        }

        Ok(())
    }
}

fn classify(error: BridgeError) -> SyncError {
    if error.is_connectivity() {
        SyncError::Transport(TransportError::Connectivity(error.to_string()))
    } else {
        SyncError::Transport(TransportError::Application(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bytes::Bytes;
    use std::collections::HashMap;

    mockall::mock! {
        Http {}

        #[async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn api(mock: MockHttp) -> RemoteApi {
        RemoteApi::new(
            Arc::new(mock),
            "https://todo.example.com",
            Duration::from_millis(5000),
        )
    }

    #[tokio::test]
    async fn test_create_list_posts_to_collection() {
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .withf(|request| {
                request.method == HttpMethod::Post
                    && request.url == "https://todo.example.com/todo-lists/"
            })
            .returning(|_| Ok(response(200, r#"{"success":true}"#)));

        let list = TodoList::new("Groceries").unwrap();
        api(mock).create_list(&list).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_card_targets_entity() {
        let card_id = CardId::new();
        let expected_url = format!("https://todo.example.com/todo-cards/{}", card_id);

        let mut mock = MockHttp::new();
        mock.expect_execute()
            .withf(move |request| {
                request.method == HttpMethod::Delete && request.url == expected_url
            })
            .returning(|_| Ok(response(200, r#"{"success":true}"#)));

        api(mock).delete_card(&card_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_remote_rejection() {
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .returning(|_| Ok(response(404, "no such list")));

        let list = TodoList::new("Groceries").unwrap();
        let err = api(mock).update_list(&list).await.unwrap_err();

        assert!(matches!(
            err,
            SyncError::RemoteRejected { status: 404, .. }
        ));
    }

    #[tokio::test]
    async fn test_unsuccessful_ack_is_remote_rejection() {
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .returning(|_| Ok(response(200, r#"{"success":false,"error":"duplicate"}"#)));

        let list = TodoList::new("Groceries").unwrap();
        let err = api(mock).create_list(&list).await.unwrap_err();

        assert!(matches!(err, SyncError::RemoteRejected { .. }));
    }

    #[tokio::test]
    async fn test_read_last_saved() {
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .withf(|request| {
                request.method == HttpMethod::Get
                    && request.url == "https://todo.example.com/last-saved/"
            })
            .returning(|_| Ok(response(200, r#"{"timestamp":1722850000000}"#)));

        let last_saved = api(mock).read_last_saved().await.unwrap();
        assert_eq!(last_saved.timestamp, 1_722_850_000_000);
    }
}
