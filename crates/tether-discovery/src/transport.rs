use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{DiscoveryError, DiscoveryResult};

/// Plain HTTP GET transport.
///
/// Implementations return the response body on status 200 and a
/// [`DiscoveryError::Status`] for anything else.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, url: &str) -> DiscoveryResult<Vec<u8>>;
}

/// [`HttpFetcher`] backed by a shared `reqwest` client.
#[derive(Clone, Debug)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> DiscoveryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DiscoveryError::Transport {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

pub(crate) fn map_reqwest_error(url: &str, err: reqwest::Error) -> DiscoveryError {
    if err.is_timeout() {
        DiscoveryError::Timeout { url: url.to_string() }
    } else {
        DiscoveryError::Transport {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str) -> DiscoveryResult<Vec<u8>> {
        debug!(url, "http get");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, e))?;
        let status = resp.status().as_u16();
        if status != 200 {
            return Err(DiscoveryError::status(url, status));
        }
        let body = resp.bytes().await.map_err(|e| map_reqwest_error(url, e))?;
        Ok(body.to_vec())
    }
}

/// In-memory [`HttpFetcher`] serving fixed responses, counting every call.
///
/// Unknown URLs answer with status 404.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    responses: RwLock<HashMap<String, (u16, Vec<u8>)>>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 at `url`.
    pub fn serve(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.respond(url, 200, body);
    }

    pub fn respond(&self, url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) {
        self.responses
            .write()
            .expect("fetcher lock poisoned")
            .insert(url.into(), (status, body.into()));
    }

    /// Total number of `get` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpFetcher for StaticFetcher {
    async fn get(&self, url: &str) -> DiscoveryResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let responses = self.responses.read().expect("fetcher lock poisoned");
        match responses.get(url) {
            Some((200, body)) => Ok(body.clone()),
            Some((status, _)) => Err(DiscoveryError::status(url, *status)),
            None => Err(DiscoveryError::status(url, 404)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;
    use tether_types::{Classify, ErrorClass};

    async fn spawn_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn reqwest_fetcher_reads_body() {
        let app = Router::new().route("/obj", get(|| async { "payload" }));
        let base = spawn_server(app).await;
        let fetcher = ReqwestFetcher::new(Duration::from_secs(5)).unwrap();
        let body = fetcher.get(&format!("{base}/obj")).await.unwrap();
        assert_eq!(body, b"payload");
    }

    #[tokio::test]
    async fn reqwest_fetcher_reports_status() {
        let base = spawn_server(Router::new()).await;
        let fetcher = ReqwestFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher.get(&format!("{base}/missing")).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Status { status: 404, .. }));
        assert_eq!(err.class(), ErrorClass::NotFound);
    }

    #[tokio::test]
    async fn reqwest_fetcher_times_out() {
        let app = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                "late"
            }),
        );
        let base = spawn_server(app).await;
        let fetcher = ReqwestFetcher::new(Duration::from_millis(100)).unwrap();
        let err = fetcher.get(&format!("{base}/slow")).await.unwrap_err();
        assert!(err.class().is_retryable());
    }

    #[tokio::test]
    async fn static_fetcher_counts_calls() {
        let fetcher = StaticFetcher::new();
        fetcher.serve("http://a/x", b"x".to_vec());
        fetcher.respond("http://a/down", 503, Vec::new());

        assert_eq!(fetcher.get("http://a/x").await.unwrap(), b"x");
        let err = fetcher.get("http://a/down").await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Transient);
        assert!(fetcher.get("http://a/none").await.is_err());
        assert_eq!(fetcher.calls(), 3);
    }
}
