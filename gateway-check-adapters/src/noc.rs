//! TTN NOC adapter using the v2 gateway status HTTP API.
//!
//! The NOC answers `GET <base>/<gateway id>` with a JSON document describing
//! the gateway's last contact with the network.
//!
//! ## Identifier formats
//!
//! Gateways registered under the older scheme are only known as
//! `eui-<lowercase EUI>`. When the identifier from the inventory returns
//! `404 Not Found` the adapter retries exactly once with that form and never
//! more than once.
//!
//! ## Fields Used
//!
//! - **timestamp**: last time the network heard from the gateway (required)
//! - **rx_ok**: packets received by the gateway (required)
//!
//! ## Example
//!
//! ```rust,no_run
//! use gateway_check_adapters::noc::NocStatusProvider;
//! use gateway_check_adapters::StatusProvider;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = NocStatusProvider::builder()
//!         .endpoint("http://noc.thethingsnetwork.org:8085/api/v2/gateways")
//!         .timeout(Duration::from_secs(5))
//!         .build()?;
//!
//!     let record = provider.fetch("B827EBFFFE000001").await?;
//!     println!("last seen {} ({} packets)", record.remote_timestamp, record.rx_count);
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use gateway_check_types::StatusRecord;

use crate::provider::legacy_id;
use crate::{BuildError, LookupError, StatusProvider};

/// Public TTN NOC gateway endpoint.
pub const DEFAULT_NOC_ENDPOINT: &str = "http://noc.thethingsnetwork.org:8085/api/v2/gateways";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Status provider backed by the TTN NOC.
#[derive(Debug, Clone)]
pub struct NocStatusProvider {
    client: Client,
    endpoint: String,
}

/// Body of a single NOC request.
enum NocResponse {
    NotFound,
    Found(String),
}

impl NocStatusProvider {
    /// Create a new builder for configuring the provider.
    pub fn builder() -> NocStatusProviderBuilder {
        NocStatusProviderBuilder::default()
    }

    /// The base URL requests are made against.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url_for(&self, gateway_id: &str) -> String {
        format!("{}/{}", self.endpoint, gateway_id)
    }

    async fn get(&self, gateway_id: &str) -> Result<NocResponse, LookupError> {
        let url = self.url_for(gateway_id);
        debug!(url = %url, "Querying NOC");

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(NocResponse::NotFound);
        }

        if !status.is_success() {
            return Err(LookupError::Http(format!("NOC returned status {}", status)));
        }

        Ok(NocResponse::Found(response.text().await?))
    }
}

#[async_trait]
impl StatusProvider for NocStatusProvider {
    async fn fetch(&self, remote_id: &str) -> Result<StatusRecord, LookupError> {
        let body = match self.get(remote_id).await? {
            NocResponse::Found(body) => body,
            NocResponse::NotFound => {
                let fallback = legacy_id(remote_id);
                debug!(remote_id, fallback = %fallback, "Gateway not found, retrying with legacy identifier");

                match self.get(&fallback).await? {
                    NocResponse::Found(body) => body,
                    NocResponse::NotFound => {
                        return Err(LookupError::NotFound {
                            primary: remote_id.to_string(),
                            fallback,
                        })
                    }
                }
            }
        };

        parse_status(&body)
    }
}

/// Builder for NocStatusProvider.
#[derive(Debug, Default)]
pub struct NocStatusProviderBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl NocStatusProviderBuilder {
    /// Set the gateway status endpoint (default: the public TTN NOC).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the provider.
    pub fn build(self) -> Result<NocStatusProvider, BuildError> {
        let endpoint = self
            .endpoint
            .unwrap_or_else(|| DEFAULT_NOC_ENDPOINT.to_string());

        if let Err(e) = reqwest::Url::parse(&endpoint) {
            return Err(BuildError::InvalidEndpoint {
                endpoint,
                reason: e.to_string(),
            });
        }

        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        Ok(NocStatusProvider {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

/// Gateway document from the NOC. Only the fields we use are declared.
#[derive(Debug, Deserialize)]
struct NocGateway {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default, deserialize_with = "counter")]
    rx_ok: Option<u64>,
}

/// Accept counters encoded either as JSON numbers or as decimal strings.
fn counter<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("counter out of range: {}", n))),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("counter is not a number: {:?}", s))),
        Some(other) => Err(D::Error::custom(format!("unexpected counter value: {}", other))),
    }
}

/// Turn a NOC response body into a status record.
fn parse_status(body: &str) -> Result<StatusRecord, LookupError> {
    let gateway: NocGateway =
        serde_json::from_str(body).map_err(|e| LookupError::Parse(e.to_string()))?;

    let raw = gateway
        .timestamp
        .filter(|ts| !ts.trim().is_empty())
        .ok_or(LookupError::MissingTimestamp)?;

    let remote_timestamp = parse_timestamp(&raw)?;
    let rx_count = gateway.rx_ok.ok_or(LookupError::MissingField("rx_ok"))?;

    Ok(StatusRecord::new(remote_timestamp, rx_count))
}

/// Parse an ISO-8601 style timestamp into UTC.
///
/// Offsets are honoured and normalized to UTC. A timestamp without an
/// offset is taken to already be UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, LookupError> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(ts) = DateTime::parse_from_str(raw, fmt) {
            return Ok(ts.with_timezone(&Utc));
        }
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(LookupError::InvalidTimestamp(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StubResponse, StubServer};

    fn provider_for(server: &StubServer) -> NocStatusProvider {
        NocStatusProvider::builder()
            .endpoint(server.url("/api/v2/gateways"))
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let provider = NocStatusProvider::builder().build().unwrap();
        assert_eq!(provider.endpoint(), DEFAULT_NOC_ENDPOINT);
    }

    #[test]
    fn test_builder_trims_trailing_slash() {
        let provider = NocStatusProvider::builder()
            .endpoint("http://noc.local/api/v2/gateways/")
            .build()
            .unwrap();
        assert_eq!(provider.endpoint(), "http://noc.local/api/v2/gateways");
        assert_eq!(provider.url_for("abc"), "http://noc.local/api/v2/gateways/abc");
    }

    #[test]
    fn test_builder_rejects_invalid_endpoint() {
        let err = NocStatusProvider::builder()
            .endpoint("not a url")
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_parse_status() {
        let record =
            parse_status(r#"{"timestamp":"2019-03-01T12:34:56.123456789Z","rx_ok":42,"tx_in":7}"#)
                .unwrap();
        assert_eq!(record.rx_count, 42);
        assert_eq!(
            record.remote_timestamp,
            Utc.with_ymd_and_hms(2019, 3, 1, 12, 34, 56).unwrap()
                + chrono::Duration::nanoseconds(123_456_789)
        );
    }

    #[test]
    fn test_parse_status_string_counter() {
        let record = parse_status(r#"{"timestamp":"2019-03-01T12:00:00Z","rx_ok":"17"}"#).unwrap();
        assert_eq!(record.rx_count, 17);
    }

    #[test]
    fn test_parse_status_missing_timestamp() {
        assert!(matches!(
            parse_status(r#"{"rx_ok":42}"#),
            Err(LookupError::MissingTimestamp)
        ));
        assert!(matches!(
            parse_status(r#"{"timestamp":"","rx_ok":42}"#),
            Err(LookupError::MissingTimestamp)
        ));
        assert!(matches!(
            parse_status(r#"{"timestamp":null,"rx_ok":42}"#),
            Err(LookupError::MissingTimestamp)
        ));
    }

    #[test]
    fn test_parse_status_missing_rx() {
        assert!(matches!(
            parse_status(r#"{"timestamp":"2019-03-01T12:00:00Z"}"#),
            Err(LookupError::MissingField("rx_ok"))
        ));
    }

    #[test]
    fn test_parse_status_malformed() {
        assert!(matches!(parse_status("not json"), Err(LookupError::Parse(_))));
        assert!(matches!(parse_status("[1,2,3]"), Err(LookupError::Parse(_))));
    }

    #[test]
    fn test_parse_timestamp_offsets_normalized() {
        let expected = Utc.with_ymd_and_hms(2019, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2019-03-01T12:00:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2019-03-01T14:00:00+02:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2019-03-01 14:00:00+02:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2019-03-01T12:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2019-03-01 12:00:00").unwrap(), expected);
    }

    #[test]
    fn test_parse_timestamp_invalid() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(LookupError::InvalidTimestamp(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_primary_id() {
        let server = StubServer::start(|_| {
            StubResponse::json(200, r#"{"timestamp":"2019-03-01T12:00:00Z","rx_ok":5}"#)
        })
        .await;
        let provider = provider_for(&server);

        let record = provider.fetch("B827EBFFFE000001").await.unwrap();
        assert_eq!(record.rx_count, 5);
        assert_eq!(server.paths(), vec!["/api/v2/gateways/B827EBFFFE000001"]);
    }

    #[tokio::test]
    async fn test_fetch_falls_back_once_on_not_found() {
        let server = StubServer::start(|req| {
            if req.path == "/api/v2/gateways/eui-aa:bb" {
                StubResponse::json(200, r#"{"timestamp":"2019-03-01T12:00:00Z","rx_ok":42}"#)
            } else {
                StubResponse::json(404, r#"{"error":"not found"}"#)
            }
        })
        .await;
        let provider = provider_for(&server);

        let record = provider.fetch("AA:BB").await.unwrap();
        assert_eq!(record.rx_count, 42);
        assert_eq!(
            server.paths(),
            vec!["/api/v2/gateways/AA:BB", "/api/v2/gateways/eui-aa:bb"]
        );
    }

    #[tokio::test]
    async fn test_fetch_fallback_not_found_stops() {
        let server = StubServer::start(|_| StubResponse::json(404, "")).await;
        let provider = provider_for(&server);

        let err = provider.fetch("AA:BB").await.unwrap_err();
        assert!(matches!(err, LookupError::NotFound { .. }));
        assert_eq!(server.paths().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_success_without_timestamp_fails() {
        let server = StubServer::start(|_| StubResponse::json(200, r#"{"rx_ok":42}"#)).await;
        let provider = provider_for(&server);

        let err = provider.fetch("AA:BB").await.unwrap_err();
        assert!(matches!(err, LookupError::MissingTimestamp));
        assert_eq!(server.paths().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_server_error_does_not_fall_back() {
        let server = StubServer::start(|_| StubResponse::json(500, "{}")).await;
        let provider = provider_for(&server);

        let err = provider.fetch("AA:BB").await.unwrap_err();
        assert!(matches!(err, LookupError::Http(_)));
        assert_eq!(server.paths().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provider = NocStatusProvider::builder()
            .endpoint(format!("http://{}/api/v2/gateways", addr))
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();

        let err = provider.fetch("AA:BB").await.unwrap_err();
        assert!(matches!(
            err,
            LookupError::Connection(_) | LookupError::Http(_)
        ));
    }
}
