use std::time::Duration;

use reqwest::Client;
use sark_domain::config::{AuditSinkConfig, SinkKind};
use sark_domain::AuditEvent;

use crate::compression::{compress_payload, CompressionConfig};
use crate::error::SinkError;
use crate::sink::AuditSink;

/// Generic HTTP SIEM sink covering the two wire formats the registry
/// configures: Splunk HEC (newline-delimited JSON, bearer-style token) and
/// Datadog Logs (a JSON array, API-key header).
pub struct HttpSink {
    name: String,
    kind: SinkKind,
    endpoint: String,
    token: String,
    index: Option<String>,
    client: Client,
    compression: CompressionConfig,
}

impl HttpSink {
    pub fn new(name: impl Into<String>, config: &AuditSinkConfig, token: String) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| SinkError::Other(e.to_string()))?;
        Ok(Self {
            name: name.into(),
            kind: config.kind,
            endpoint: config.endpoint.clone(),
            token,
            index: config.index.clone(),
            client,
            compression: CompressionConfig {
                min_size_bytes: config.compression_min_size_bytes,
                ..Default::default()
            },
        })
    }

    fn body_for(&self, events: &[AuditEvent]) -> Vec<u8> {
        match self.kind {
            SinkKind::Hec => {
                let mut body = String::new();
                for event in events {
                    let wrapped = serde_json::json!({
                        "time": event.timestamp.timestamp(),
                        "source": "sark",
                        "sourcetype": "sark:audit:event",
                        "index": self.index,
                        "event": event,
                    });
                    body.push_str(&wrapped.to_string());
                    body.push('\n');
                }
                body.into_bytes()
            }
            SinkKind::Datadog => serde_json::to_vec(events).unwrap_or_default(),
        }
    }

    fn request(&self, body: Vec<u8>, compressed: bool) -> reqwest::RequestBuilder {
        let mut req = self.client.post(&self.endpoint).body(body);
        req = match self.kind {
            SinkKind::Hec => req.header("Authorization", format!("Splunk {}", self.token)),
            SinkKind::Datadog => req.header("DD-API-KEY", self.token.clone()),
        };
        req = req.header("Content-Type", "application/json");
        if compressed {
            req = req.header("Content-Encoding", "gzip");
        }
        req
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> SinkError {
    if e.is_timeout() {
        SinkError::Timeout(e.to_string())
    } else if e.is_connect() {
        SinkError::Network(e.to_string())
    } else {
        SinkError::Other(e.to_string())
    }
}

#[async_trait::async_trait]
impl AuditSink for HttpSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_batch(&self, events: &[AuditEvent]) -> Result<(), SinkError> {
        if events.is_empty() {
            return Ok(());
        }
        let raw = self.body_for(events);
        let outcome = compress_payload(&raw, &self.compression);
        let resp = self
            .request(outcome.bytes, outcome.compressed)
            .send()
            .await
            .map_err(classify_reqwest_error)?;
        let status = resp.status();
        if status.is_success() || status.as_u16() == 202 {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(SinkError::Http {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn health_check(&self) -> Result<(), SinkError> {
        let resp = self
            .client
            .head(&self.endpoint)
            .send()
            .await
            .map_err(classify_reqwest_error)?;
        let status = resp.status();
        // HEAD against a collector endpoint commonly answers 405
        // method-not-allowed; reachability is what matters here.
        if status.is_success() || status.as_u16() == 405 {
            Ok(())
        } else {
            Err(SinkError::Http {
                status: status.as_u16(),
                body: String::new(),
            })
        }
    }
}
