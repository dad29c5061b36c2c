//! HTTP client for a remote retrieval service
//!
//! The service accepts `POST {"query": ..., "k": ...}` and answers with
//! `{"results": [{"code", "title", "text", "score"}]}`.

use super::{ClassificationIndex, IndexError, RetrievedEntry};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct RetrieveRequest<'a> {
    query: &'a str,
    k: usize,
}

#[derive(Debug, Deserialize)]
struct RetrieveResponse {
    results: Vec<RetrievedEntry>,
}

pub struct HttpIndexClient {
    endpoint: String,
    http_client: Client,
}

impl HttpIndexClient {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        // Builder only fails on TLS backend initialisation; fall back to the
        // default client in that case.
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            endpoint,
            http_client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ClassificationIndex for HttpIndexClient {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedEntry>, IndexError> {
        debug!(endpoint = %self.endpoint, k, "Querying retrieval service");

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&RetrieveRequest { query, k })
            .send()
            .await
            .map_err(|e| IndexError::Unavailable {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(endpoint = %self.endpoint, "Retrieval service throttled the request");
            return Err(IndexError::Throttled {
                message: format!("HTTP {}", status),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Unavailable {
                message: format!("HTTP {}: {}", status, body),
            });
        }

        let parsed: RetrieveResponse =
            response
                .json()
                .await
                .map_err(|e| IndexError::InvalidResponse {
                    message: e.to_string(),
                })?;

        let mut results = parsed.results;
        results.truncate(k);
        for entry in &mut results {
            if entry.text.is_empty() {
                entry.text = entry.title.clone();
            }
        }
        Ok(results)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves exactly one canned HTTP response and returns the request body.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if buf.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            let text = String::from_utf8_lossy(&buf).to_string();
            text.split("\r\n\r\n").nth(1).unwrap_or_default().to_string()
        });

        (format!("http://{}/retrieve", addr), handle)
    }

    #[tokio::test]
    async fn test_parses_results_and_sends_query() {
        let (url, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"results":[{"code":"315990","title":"Apparel Accessories","score":0.9},{"code":"339920","title":"Sporting Goods","text":"balls and gloves"}]}"#,
        )
        .await;

        let client = HttpIndexClient::new(url, Duration::from_secs(5));
        let results = client.retrieve("work gloves", 3).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].code, "315990");
        assert_eq!(results[0].text, "Apparel Accessories");
        assert_eq!(results[1].text, "balls and gloves");

        let body: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(body["query"], "work gloves");
        assert_eq!(body["k"], 3);
    }

    #[tokio::test]
    async fn test_429_maps_to_throttled() {
        let (url, _server) = serve_once("HTTP/1.1 429 Too Many Requests", "{}").await;

        let client = HttpIndexClient::new(url, Duration::from_secs(5));
        let err = client.retrieve("x", 3).await.unwrap_err();
        assert!(err.is_throttling());
    }

    #[tokio::test]
    async fn test_server_error_is_not_throttling() {
        let (url, _server) = serve_once("HTTP/1.1 500 Internal Server Error", "{}").await;

        let client = HttpIndexClient::new(url, Duration::from_secs(5));
        let err = client.retrieve("x", 3).await.unwrap_err();
        assert!(matches!(err, IndexError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let (url, _server) = serve_once("HTTP/1.1 200 OK", "{\"nope\": 1}").await;

        let client = HttpIndexClient::new(url, Duration::from_secs(5));
        let err = client.retrieve("x", 3).await.unwrap_err();
        assert!(matches!(err, IndexError::InvalidResponse { .. }));
    }
}
