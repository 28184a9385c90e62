use crate::domain::ports::{ProbeOutcome, RuntimeProbe};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Live probes over HTTP. Every transport failure becomes a `ProbeOutcome`.
#[derive(Debug, Clone, Default)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RuntimeProbe for HttpProbe {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        tracing::debug!("📡 GET {}", url);
        let response = match self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return ProbeOutcome::TimedOut,
            Err(e) => {
                return ProbeOutcome::Unreachable {
                    reason: e.to_string(),
                }
            }
        };

        let status = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(bytes) => serde_json::from_slice(&bytes).ok(),
            Err(e) if e.is_timeout() => return ProbeOutcome::TimedOut,
            Err(e) => {
                tracing::debug!("📡 {} body unreadable: {}", url, e);
                None
            }
        };
        tracing::debug!("📡 {} answered HTTP {}", url, status);
        ProbeOutcome::Response { status, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_probe_captures_status_and_json() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/health");
            then.status(200).json_body(json!({"status": "ok"}));
        });

        let outcome = HttpProbe::new()
            .probe(&server.url("/health"), Duration::from_secs(5))
            .await;
        mock.assert();
        assert_eq!(
            outcome,
            ProbeOutcome::Response {
                status: 200,
                body: Some(json!({"status": "ok"}))
            }
        );
    }

    #[tokio::test]
    async fn test_probe_non_json_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/health");
            then.status(503).body("upstream down");
        });

        let outcome = HttpProbe::new()
            .probe(&server.url("/health"), Duration::from_secs(5))
            .await;
        assert_eq!(outcome, ProbeOutcome::Response { status: 503, body: None });
    }

    #[tokio::test]
    async fn test_probe_timeout() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/slow");
            then.status(200).delay(Duration::from_millis(500));
        });

        let outcome = HttpProbe::new()
            .probe(&server.url("/slow"), Duration::from_millis(50))
            .await;
        assert_eq!(outcome, ProbeOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_probe_unreachable() {
        let outcome = HttpProbe::new()
            .probe("http://127.0.0.1:1/health", Duration::from_secs(2))
            .await;
        assert!(matches!(outcome, ProbeOutcome::Unreachable { .. }));
    }
}
