// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

//! HTTP event source backed by the audit query endpoint.
//!
//! Issues `GET <base_url><endpoint>?pageSize=..&days=..[&continuationToken=..]`
//! and decodes the `{success, data, message}` envelope. Transport errors,
//! non-2xx statuses and `success: false` all surface as a [`FetchError`] carrying
//! the server-provided message when there is one. No retries are attempted.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use super::{EventSource, FetchError, Page, PageQuery, GENERIC_FETCH_ERROR};
use crate::config::BackendConfig;

/// Response envelope shared by every backend endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Page>,
    #[serde(default)]
    message: Option<String>,
}

/// Event source talking to the backend over HTTP.
pub struct HttpEventSource {
    url: String,
    auth_token: String,
    client: reqwest::Client,
}

impl HttpEventSource {
    /// Build a source from configuration.
    ///
    /// The request timeout bounds every page fetch so a hung request cannot
    /// leave the feed stuck in a loading state.
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let client = client_builder(config).build()?;
        Ok(Self::with_client(config, client))
    }

    fn with_client(config: &BackendConfig, client: reqwest::Client) -> Self {
        Self {
            url: join_url(&config.base_url, &config.endpoint),
            auth_token: config.auth_token.clone(),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn client_builder(config: &BackendConfig) -> reqwest::ClientBuilder {
    reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs))
}

fn join_url(base: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// Decode a response body into a page.
///
/// `status_ok` is whether the HTTP status was 2xx; a non-2xx body is still
/// searched for a `message` to show the user.
fn decode_envelope(status_ok: bool, body: &str) -> Result<Page, FetchError> {
    let envelope: Envelope = match serde_json::from_str(body) {
        Ok(env) => env,
        Err(e) if status_ok => {
            return Err(FetchError::Decode(format!("{}: {}", GENERIC_FETCH_ERROR, e)));
        }
        Err(_) => return Err(FetchError::Transport(GENERIC_FETCH_ERROR.to_string())),
    };

    let message = envelope
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| GENERIC_FETCH_ERROR.to_string());

    if !status_ok {
        return Err(FetchError::Transport(message));
    }
    if !envelope.success {
        return Err(FetchError::Backend(message));
    }
    envelope
        .data
        .ok_or_else(|| FetchError::Decode(format!("{}: missing data", GENERIC_FETCH_ERROR)))
}

#[async_trait]
impl EventSource for HttpEventSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_page(
        &self,
        query: &PageQuery,
        continuation_token: Option<&str>,
    ) -> Result<Page, FetchError> {
        let request_id = Uuid::new_v4().to_string();
        let mut request = self
            .client
            .get(&self.url)
            .query(&query.to_pairs(continuation_token))
            .header("X-Request-Id", request_id.as_str());
        if !self.auth_token.is_empty() {
            request = request.bearer_auth(&self.auth_token);
        }

        tracing::debug!(
            request_id = %request_id,
            paginated = continuation_token.is_some(),
            "fetching audit events page"
        );

        let resp = request.send().await.map_err(|e| {
            tracing::warn!(request_id = %request_id, "audit events request failed: {}", e);
            FetchError::Transport(if e.is_timeout() {
                format!("{}: request timed out", GENERIC_FETCH_ERROR)
            } else {
                GENERIC_FETCH_ERROR.to_string()
            })
        })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Transport(format!("{}: {}", GENERIC_FETCH_ERROR, e)))?;

        let page = decode_envelope(status.is_success(), &body);
        match &page {
            Ok(p) => tracing::debug!(
                request_id = %request_id,
                events = p.events.len(),
                has_more = p.has_more,
                "audit events page received"
            ),
            Err(e) => tracing::warn!(
                request_id = %request_id,
                status = status.as_u16(),
                "audit events page rejected: {}",
                e
            ),
        }
        page
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    fn test_config(base_url: &str, endpoint: &str) -> BackendConfig {
        BackendConfig {
            base_url: base_url.to_string(),
            endpoint: endpoint.to_string(),
            auth_token: String::new(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_url_join_handles_slashes() {
        let source = HttpEventSource::new(&test_config("https://api.example.com/", "/v1/audit/events")).unwrap();
        assert_eq!(source.url(), "https://api.example.com/v1/audit/events");
        assert_eq!(source.name(), "http");
    }

    #[test]
    fn test_decode_success_envelope() {
        let body = json!({
            "success": true,
            "data": {
                "events": [
                    { "eventId": "e1", "eventType": "CRONRUN", "subType": "Completed" },
                    { "eventId": "e2", "eventType": "SECURITY_REPORT", "subType": "Sent" }
                ],
                "continuationToken": "next-1",
                "hasMore": true
            }
        })
        .to_string();

        let page = decode_envelope(true, &body).unwrap();
        assert_eq!(page.events.len(), 2);
        assert_eq!(page.continuation_token.as_deref(), Some("next-1"));
        assert!(page.has_more);
    }

    #[test]
    fn test_decode_backend_failure_uses_server_message() {
        let body = json!({ "success": false, "message": "Organization not found" }).to_string();
        let err = decode_envelope(true, &body).unwrap_err();
        assert_eq!(err, FetchError::Backend("Organization not found".into()));
    }

    #[test]
    fn test_decode_backend_failure_without_message_uses_fallback() {
        let body = json!({ "success": false }).to_string();
        let err = decode_envelope(true, &body).unwrap_err();
        assert_eq!(err.message(), GENERIC_FETCH_ERROR);
    }

    #[test]
    fn test_decode_http_error_keeps_message() {
        let body = json!({ "success": false, "message": "Unauthorized" }).to_string();
        let err = decode_envelope(false, &body).unwrap_err();
        assert_eq!(err, FetchError::Transport("Unauthorized".into()));

        let err = decode_envelope(false, "<html>502 Bad Gateway</html>").unwrap_err();
        assert_eq!(err.message(), GENERIC_FETCH_ERROR);
    }

    #[test]
    fn test_decode_garbage_body() {
        let err = decode_envelope(true, "not json").unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn test_decode_success_without_data() {
        let body = json!({ "success": true }).to_string();
        assert!(matches!(decode_envelope(true, &body), Err(FetchError::Decode(_))));
    }

    #[test]
    fn test_decode_last_page() {
        let body = json!({
            "success": true,
            "data": { "events": [], "continuationToken": null, "hasMore": false }
        })
        .to_string();
        let page = decode_envelope(true, &body).unwrap();
        assert!(page.events.is_empty());
        assert!(page.continuation_token.is_none());
        assert!(!page.has_more);
    }

    /// Source pointed at a local listener, bypassing any proxy from the environment.
    fn local_source(addr: std::net::SocketAddr, auth_token: &str, timeout_secs: u64) -> HttpEventSource {
        let mut config = test_config(&format!("http://{}", addr), "/audit/events");
        config.auth_token = auth_token.to_string();
        config.timeout_secs = timeout_secs;
        let client = client_builder(&config).no_proxy().build().unwrap();
        HttpEventSource::with_client(&config, client)
    }

    /// Accept one connection, answer it with `status` and `body`, and report the
    /// raw request head on the returned channel.
    async fn serve_once(status: &'static str, body: String) -> (std::net::SocketAddr, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&head).into_owned());
        });
        (addr, rx)
    }

    #[tokio::test]
    async fn test_fetch_forwards_token_flags_and_auth() {
        let body = json!({
            "success": true,
            "data": {
                "events": [{ "eventId": "e9", "eventType": "LICENSE", "subType": "Issued" }],
                "continuationToken": "cursor3",
                "hasMore": true
            }
        })
        .to_string();
        let (addr, head) = serve_once("200 OK", body).await;
        let source = local_source(addr, "secret-token", 5);

        let mut flags = BTreeMap::new();
        flags.insert("includeSystem".to_string(), "true".to_string());
        let query = PageQuery { days: 14, page_size: 25, flags };

        let page = source.fetch_page(&query, Some("cursor2")).await.unwrap();
        assert_eq!(page.events.len(), 1);
        assert_eq!(page.continuation_token.as_deref(), Some("cursor3"));

        let head = head.await.unwrap();
        let request_line = head.lines().next().unwrap_or_default();
        assert!(request_line.starts_with("GET /audit/events?"), "{}", request_line);
        assert!(request_line.contains("continuationToken=cursor2"), "{}", request_line);
        assert!(request_line.contains("includeSystem=true"), "{}", request_line);
        assert!(request_line.contains("days=14"), "{}", request_line);
        assert!(request_line.contains("pageSize=25"), "{}", request_line);

        let lower = head.to_ascii_lowercase();
        assert!(lower.contains("authorization: bearer secret-token"), "{}", head);
        assert!(lower.contains("x-request-id: "), "{}", head);
    }

    #[tokio::test]
    async fn test_fetch_first_page_has_no_token_or_auth() {
        let body = json!({ "success": true, "data": { "events": [], "hasMore": false } }).to_string();
        let (addr, head) = serve_once("200 OK", body).await;
        let source = local_source(addr, "", 5);

        let page = source.fetch_page(&PageQuery::default(), None).await.unwrap();
        assert!(!page.has_more);

        let head = head.await.unwrap().to_ascii_lowercase();
        assert!(!head.contains("continuationtoken"), "{}", head);
        assert!(!head.contains("authorization:"), "{}", head);
    }

    #[tokio::test]
    async fn test_fetch_non_2xx_keeps_server_message() {
        let body = json!({ "success": false, "message": "Unauthorized" }).to_string();
        let (addr, _head) = serve_once("401 Unauthorized", body).await;
        let source = local_source(addr, "", 5);

        let err = source.fetch_page(&PageQuery::default(), None).await.unwrap_err();
        assert_eq!(err, FetchError::Transport("Unauthorized".into()));
    }

    #[tokio::test]
    async fn test_fetch_times_out_on_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            // Hold the connection open without ever answering.
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });
        let source = local_source(addr, "", 1);

        let err = source.fetch_page(&PageQuery::default(), None).await.unwrap_err();
        match &err {
            FetchError::Transport(message) => assert!(message.contains("timed out"), "{}", message),
            other => panic!("expected transport timeout, got {:?}", other),
        }
        server.abort();
    }
}
