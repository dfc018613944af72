//! InfluxDB 1.x sink using the HTTP write API.
//!
//! Points are posted one per request to `/write?db=<database>&precision=ns`
//! as line protocol, authenticated with HTTP basic auth.
//!
//! ## Example
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use gateway_check_adapters::influxdb::InfluxSink;
//! use gateway_check_adapters::MetricSink;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sink = InfluxSink::builder()
//!         .host("influx.local")
//!         .port(8086)
//!         .credentials("writer", "secret")
//!         .database("lora")
//!         .build()?;
//!
//!     sink.record_status("rooftop", true, Utc::now()).await?;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use tracing::debug;

use crate::sink::Point;
use crate::{BuildError, MetricSink, WriteError};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Metric sink writing to an InfluxDB 1.x database.
#[derive(Clone)]
pub struct InfluxSink {
    client: Client,
    write_url: Url,
    username: String,
    password: String,
}

impl InfluxSink {
    /// Create a new builder for configuring the sink.
    pub fn builder() -> InfluxSinkBuilder {
        InfluxSinkBuilder::default()
    }

    /// The full write URL, including the database and precision parameters.
    pub fn write_url(&self) -> &Url {
        &self.write_url
    }

    async fn write(&self, point: Point) -> Result<(), WriteError> {
        point.validate()?;
        let line = point.to_line_protocol();
        debug!(line = %line, "Writing point");

        let response = self
            .client
            .post(self.write_url.clone())
            .basic_auth(&self.username, Some(&self.password))
            .body(line)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(WriteError::Rejected {
            status: status.as_u16(),
            body: body.trim().to_string(),
        })
    }
}

impl std::fmt::Debug for InfluxSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxSink")
            .field("write_url", &self.write_url.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl MetricSink for InfluxSink {
    async fn record_status(
        &self,
        gateway_id: &str,
        online: bool,
        at: DateTime<Utc>,
    ) -> Result<(), WriteError> {
        self.write(Point::status(gateway_id, online, at)).await
    }

    async fn record_packet_count(
        &self,
        gateway_id: &str,
        rx: u64,
        tx: u64,
        at: DateTime<Utc>,
    ) -> Result<(), WriteError> {
        self.write(Point::packet_count(gateway_id, rx, tx, at)).await
    }
}

/// Builder for InfluxSink.
#[derive(Debug, Default)]
pub struct InfluxSinkBuilder {
    host: Option<String>,
    port: Option<u16>,
    ssl: bool,
    username: Option<String>,
    password: Option<String>,
    database: Option<String>,
    timeout: Option<Duration>,
}

impl InfluxSinkBuilder {
    /// Set the server host name (default: "localhost").
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the HTTP API port (default: 8086).
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Use HTTPS instead of HTTP.
    pub fn ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    /// Set the username and password for authentication.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the database to write to (default: "gateways").
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the sink.
    pub fn build(self) -> Result<InfluxSink, BuildError> {
        let scheme = if self.ssl { "https" } else { "http" };
        let host = self.host.unwrap_or_else(|| "localhost".to_string());
        let port = self.port.unwrap_or(8086);
        let database = self.database.unwrap_or_else(|| "gateways".to_string());

        let endpoint = format!("{}://{}:{}/write", scheme, host, port);
        let write_url = Url::parse_with_params(
            &endpoint,
            &[("db", database.as_str()), ("precision", "ns")],
        )
        .map_err(|e| BuildError::InvalidEndpoint {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        Ok(InfluxSink {
            client,
            write_url,
            username: self.username.unwrap_or_default(),
            password: self.password.unwrap_or_default(),
        })
    }
}
