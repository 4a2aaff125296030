//! HTTP ping transport.

use crate::record::TelemetryRecord;
use crate::services::TelemetryTransport;
use adscope_core::{AdscopeError, Result, TelemetryConfig};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// Submits pings as JSON documents to a telemetry ingestion endpoint.
///
/// Each ping is posted to `<endpoint>/<ping name>/<document id>`, where the
/// document id is a fresh UUID so the server can deduplicate resubmissions.
#[derive(Debug, Clone)]
pub struct HttpPingTransport {
    client: Client,
    endpoint: Url,
}

impl HttpPingTransport {
    /// Create a transport from telemetry settings.
    ///
    /// # Errors
    /// Returns error if the endpoint is not a usable base URL or the HTTP
    /// client cannot be created.
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            AdscopeError::Emission(format!("invalid telemetry endpoint {}: {e}", config.endpoint))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(AdscopeError::Emission(format!(
                "telemetry endpoint {} cannot carry a path",
                config.endpoint
            )));
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AdscopeError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, endpoint })
    }

    /// URL a ping with the given document id is posted to.
    #[must_use]
    pub fn submission_url(&self, ping_name: &str, document_id: Uuid) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(ping_name)
                .push(&document_id.to_string());
        }
        url
    }
}

#[async_trait]
impl TelemetryTransport for HttpPingTransport {
    async fn send_ping(&self, ping_name: &str, payload: &TelemetryRecord) -> Result<()> {
        let url = self.submission_url(ping_name, Uuid::new_v4());

        let response = self
            .client
            .post(url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                AdscopeError::Emission(format!("failed to submit {ping_name} ping: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AdscopeError::Emission(format!(
                "{ping_name} ping rejected with HTTP {}: {error_text}",
                status.as_u16()
            )));
        }

        debug!(ping = ping_name, url = %url, visit_id = %payload.visit_id, "submitted ping");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> TelemetryConfig {
        TelemetryConfig {
            endpoint: endpoint.to_string(),
            ..TelemetryConfig::default()
        }
    }

    #[test]
    fn test_submission_url_layout() {
        let transport =
            HttpPingTransport::new(&config("https://telemetry.example/submit/adscope/"))
                .expect("valid endpoint");
        let id = Uuid::nil();

        assert_eq!(
            transport.submission_url("advertisement", id).as_str(),
            format!("https://telemetry.example/submit/adscope/advertisement/{id}")
        );
        assert!(transport
            .submission_url("advertisement", id)
            .as_str()
            .ends_with("/00000000-0000-0000-0000-000000000000"));
    }

    #[test]
    fn test_endpoint_without_trailing_slash() {
        let transport = HttpPingTransport::new(&config("http://localhost:8080/submit"))
            .expect("valid endpoint");
        let url = transport.submission_url("advertisement", Uuid::nil());
        assert!(url
            .as_str()
            .starts_with("http://localhost:8080/submit/advertisement/"));
    }

    #[test]
    fn test_invalid_endpoints_are_rejected() {
        assert!(matches!(
            HttpPingTransport::new(&config("not a url")),
            Err(AdscopeError::Emission(_))
        ));
        assert!(matches!(
            HttpPingTransport::new(&config("mailto:ops@example.com")),
            Err(AdscopeError::Emission(_))
        ));
    }
}
