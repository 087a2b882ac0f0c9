// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publishing transports and the outbound connectivity probe.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use tidepool_core::{ConnectivityProbe, ContentItem, ContentPublisher, Fault, TidepoolError};
use tokio::time::Instant;
use tracing::{debug, info};

/// Body POSTed to the webhook for each item.
#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    id: &'a str,
    title: &'a str,
    caption: String,
    media_kind: &'static str,
    media_urls: Vec<&'a str>,
    post_type: String,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    id: String,
}

fn build_client(
    access_token: Option<&str>,
    timeout: Duration,
) -> Result<reqwest::Client, TidepoolError> {
    let mut headers = HeaderMap::new();
    if let Some(token) = access_token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| TidepoolError::Config(format!("invalid access token header value: {e}")))?;
        headers.insert(AUTHORIZATION, value);
    }
    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| TidepoolError::Internal(format!("failed to build HTTP client: {e}")))
}

fn transport_fault(err: reqwest::Error, timeout: Duration) -> Fault {
    if err.is_timeout() {
        Fault::Timeout(timeout)
    } else {
        Fault::Connection(err.to_string())
    }
}

/// Seconds form of `Retry-After`; the HTTP-date form is ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Publishes items by POSTing them as JSON to a webhook.
///
/// The webhook answers 2xx with `{"id": "<platform id>"}`. Other statuses
/// become [`Fault::Http`] carrying any `Retry-After` hint.
#[derive(Debug, Clone)]
pub struct WebhookPublisher {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl WebhookPublisher {
    pub fn new(
        endpoint: impl Into<String>,
        access_token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, TidepoolError> {
        Ok(Self {
            client: build_client(access_token, timeout)?,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ContentPublisher for WebhookPublisher {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn publish(&self, item: &ContentItem) -> Result<String, Fault> {
        let request = PublishRequest {
            id: &item.id,
            title: &item.title,
            caption: item.body.full_text(),
            media_kind: item.body.media.kind(),
            media_urls: item.body.media.urls(),
            post_type: item.post_type.to_string(),
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_fault(e, self.timeout))?;

        let status = response.status();
        debug!(content_id = %item.id, status = %status, "webhook responded");
        if !status.is_success() {
            let hint = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(Fault::Http {
                status: status.as_u16(),
                message: if body.is_empty() {
                    status.to_string()
                } else {
                    body
                },
                retry_after: hint,
            });
        }

        let parsed: PublishResponse = response
            .json()
            .await
            .map_err(|e| Fault::Other(format!("invalid webhook response: {e}")))?;
        Ok(parsed.id)
    }
}

/// Publisher used when no endpoint is configured. Publishes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunPublisher;

#[async_trait]
impl ContentPublisher for DryRunPublisher {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn publish(&self, item: &ContentItem) -> Result<String, Fault> {
        info!(
            content_id = %item.id,
            title = %item.title,
            length = item.body.total_length(),
            "dry run: would publish"
        );
        Ok(format!("dry-run-{}", item.id))
    }
}

/// Probes outbound connectivity with a GET request.
///
/// Any answer below 500 counts as reachable.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TidepoolError> {
        Ok(Self {
            client: build_client(None, timeout)?,
            url: url.into(),
            timeout,
        })
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    fn target(&self) -> &str {
        &self.url
    }

    async fn probe(&self) -> Result<Duration, Fault> {
        let started = Instant::now();
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| transport_fault(e, self.timeout))?;
        let status = response.status();
        if status >= StatusCode::INTERNAL_SERVER_ERROR {
            return Err(Fault::Http {
                status: status.as_u16(),
                message: status.to_string(),
                retry_after: retry_after(response.headers()),
            });
        }
        Ok(started.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tidepool_core::{ContentBody, ContentSource, ContentStatus, Media, PostType};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn item() -> ContentItem {
        let now = Utc::now();
        ContentItem {
            id: "c-1".into(),
            title: "Iwagumi at dawn".into(),
            body: ContentBody::new(
                "Seiryu stone layout",
                Media::Image("https://cdn.example.test/1.jpg".into()),
                vec!["iwagumi".into()],
            ),
            post_type: PostType::Showcase,
            source: ContentSource::Manual,
            priority: 5,
            target_time: Some(now),
            tags: Vec::new(),
            notes: None,
            performance_prediction: 70.0,
            status: ContentStatus::Scheduled,
            created_by: "ana".into(),
            approved_by: None,
            created_at: now,
            updated_at: now,
            retry_count: 0,
            external_id: None,
            last_error: None,
            validation_results: Vec::new(),
        }
    }

    fn publisher(server: &MockServer) -> WebhookPublisher {
        WebhookPublisher::new(
            format!("{}/publish", server.uri()),
            Some("secret"),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn success_returns_platform_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/publish"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(serde_json::json!({
                "id": "c-1",
                "caption": "Seiryu stone layout\n\n#iwagumi",
                "media_kind": "image",
                "post_type": "showcase",
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "ig-778"})),
            )
            .mount(&server)
            .await;

        let id = publisher(&server).publish(&item()).await.unwrap();
        assert_eq!(id, "ig-778");
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "120")
                    .set_body_string("slow down"),
            )
            .mount(&server)
            .await;

        let fault = publisher(&server).publish(&item()).await.unwrap_err();
        assert_eq!(
            fault,
            Fault::Http {
                status: 429,
                message: "slow down".into(),
                retry_after: Some(Duration::from_secs(120)),
            }
        );
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_fault() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let fault = publisher(&server).publish(&item()).await.unwrap_err();
        assert!(matches!(fault, Fault::Other(_)));
    }

    #[tokio::test]
    async fn slow_webhook_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "late"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let publisher = WebhookPublisher::new(
            format!("{}/publish", server.uri()),
            None,
            Duration::from_millis(200),
        )
        .unwrap();
        let fault = publisher.publish(&item()).await.unwrap_err();
        assert_eq!(fault, Fault::Timeout(Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_connection_fault() {
        // Nothing listens on the discard port.
        let publisher =
            WebhookPublisher::new("http://127.0.0.1:9/publish", None, Duration::from_secs(2))
                .unwrap();
        let fault = publisher.publish(&item()).await.unwrap_err();
        assert!(matches!(fault, Fault::Connection(_)), "{fault:?}");
    }

    #[tokio::test]
    async fn dry_run_never_fails() {
        let id = DryRunPublisher.publish(&item()).await.unwrap();
        assert_eq!(id, "dry-run-c-1");
    }

    #[tokio::test]
    async fn probe_reports_reachability() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let ok = HttpProbe::new(format!("{}/ok", server.uri()), Duration::from_secs(2)).unwrap();
        assert!(ok.probe().await.is_ok());

        let down =
            HttpProbe::new(format!("{}/down", server.uri()), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            down.probe().await,
            Err(Fault::Http { status: 502, .. })
        ));
    }
}
