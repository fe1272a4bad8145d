//! # Sync Transport
//!
//! Transmits a batch of pending entities to the remote sync endpoint and
//! classifies the outcome.
//!
//! ## Overview
//!
//! The engine's retry policy hinges on a closed, explicit classification of
//! failures produced here, never inferred from error message contents:
//!
//! - [`TransportError::Connectivity`]: the network itself was unreachable
//!   (timeout, refused connection, DNS). The engine goes back to idle without
//!   consuming a retry and waits for a reconnect signal or the next tick.
//! - [`TransportError::Application`]: the exchange completed but the remote
//!   store did not accept the batch (HTTP error status, `success: false`, or
//!   an unparseable response). The engine retries the same batch with
//!   exponential backoff.

use async_trait::async_trait;
use bridge_traits::{HttpClient, HttpMethod, HttpRequest};
use core_store::UnsyncedBatch;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Closed classification of batch transmission failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The network was unreachable; nothing reached the remote store
    #[error("connectivity failure: {0}")]
    Connectivity(String),

    /// The remote store was reached but did not accept the batch
    #[error("application failure: {0}")]
    Application(String),
}

/// Response shape of the batch sync endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SyncResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Batch transmission seam between the engine and the wire.
///
/// If the remote store ever gains per-item acknowledgements, this is the
/// interface to extend; the engine currently treats acceptance as
/// all-or-nothing because that is the contract the endpoint exposes.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Transmit all entities of `batch` in a single request.
    async fn push_batch(&self, batch: &UnsyncedBatch) -> std::result::Result<(), TransportError>;
}

/// HTTP implementation POSTing `{ "lists": [...], "cards": [...] }` to
/// `{base_url}/sync`.
pub struct HttpSyncTransport {
    http: Arc<dyn HttpClient>,
    base_url: String,
    request_timeout: Duration,
}

impl HttpSyncTransport {
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
}

#[async_trait]
impl SyncTransport for HttpSyncTransport {
    async fn push_batch(&self, batch: &UnsyncedBatch) -> std::result::Result<(), TransportError> {
        let request = HttpRequest::new(HttpMethod::Post, format!("{}/sync", self.base_url))
            .timeout(self.request_timeout)
            .json(batch)
            .map_err(|e| TransportError::Application(e.to_string()))?;

        let response = self.http.execute(request).await.map_err(|e| {
            if e.is_connectivity() {
                TransportError::Connectivity(e.to_string())
            } else {
                TransportError::Application(e.to_string())
            }
        })?;

        if !response.is_success() {
            return Err(TransportError::Application(format!(
                "HTTP {}",
                response.status
            )));
        }

        let body: SyncResponse = response
            .json()
            .map_err(|e| TransportError::Application(e.to_string()))?;

        if !body.success {
            return Err(TransportError::Application(
                body.error
                    .unwrap_or_else(|| "sync endpoint reported failure".to_string()),
            ));
        }

        debug!(
            lists = batch.lists.len(),
            cards = batch.cards.len(),
            "Sync batch accepted by remote"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{BridgeError, HttpResponse};
    use bytes::Bytes;
    use core_store::{TodoCard, TodoList};
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

    fn sample_batch() -> UnsyncedBatch {
        let list = TodoList::new("Groceries").unwrap();
        let card = TodoCard::new(list.id, "Milk").unwrap();
        UnsyncedBatch {
            lists: vec![list],
            cards: vec![card],
        }
    }

    fn transport(mock: MockHttp) -> HttpSyncTransport {
        HttpSyncTransport::new(
            Arc::new(mock),
            "https://todo.example.com/",
            Duration::from_millis(5000),
        )
    }

    #[tokio::test]
    async fn test_push_batch_success() {
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .withf(|request| {
                let body = request.body.as_ref().unwrap();
                request.url == "https://todo.example.com/sync"
                    && request.method == HttpMethod::Post
                    && request.timeout == Some(Duration::from_millis(5000))
                    && std::str::from_utf8(body).unwrap().contains("\"lists\"")
            })
            .returning(|_| Ok(response(200, r#"{"success":true}"#)));

        transport(mock).push_batch(&sample_batch()).await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_classified_as_connectivity() {
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .returning(|_| Err(BridgeError::Timeout("deadline elapsed".to_string())));

        let err = transport(mock).push_batch(&sample_batch()).await.unwrap_err();
        assert!(matches!(err, TransportError::Connectivity(_)));
    }

    #[tokio::test]
    async fn test_http_error_status_classified_as_application() {
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .returning(|_| Ok(response(500, "internal error")));

        let err = transport(mock).push_batch(&sample_batch()).await.unwrap_err();
        assert_eq!(err, TransportError::Application("HTTP 500".to_string()));
    }

    #[tokio::test]
    async fn test_unsuccessful_response_classified_as_application() {
        let mut mock = MockHttp::new();
        mock.expect_execute().returning(|_| {
            Ok(response(
                200,
                r#"{"success":false,"error":"schema mismatch"}"#,
            ))
        });

        let err = transport(mock).push_batch(&sample_batch()).await.unwrap_err();
        assert_eq!(err, TransportError::Application("schema mismatch".to_string()));
    }

    #[tokio::test]
    async fn test_malformed_response_classified_as_application() {
        let mut mock = MockHttp::new();
        mock.expect_execute()
            .returning(|_| Ok(response(200, "not json")));

        let err = transport(mock).push_batch(&sample_batch()).await.unwrap_err();
        assert!(matches!(err, TransportError::Application(_)));
    }
}
