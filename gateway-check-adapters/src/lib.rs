//! # gateway-check-adapters
//!
//! The two external seams of a gateway check, plus ready-to-use
//! implementations of each.
//!
//! - [`StatusProvider`]: where a gateway's last-seen timestamp and receive
//!   counter come from
//! - [`MetricSink`]: where status and packet-count samples go
//!
//! ## Implementations
//!
//! - **TTN NOC** (`noc` feature) - [`noc::NocStatusProvider`] queries the v2
//!   gateway status API, retrying once with the legacy `eui-` identifier
//! - **InfluxDB** (`influxdb` feature) - [`influxdb::InfluxSink`] writes line
//!   protocol to the 1.x HTTP write API
//! - **In-memory** - [`MemorySink`] keeps points in memory for dry runs and tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use gateway_check_adapters::influxdb::InfluxSink;
//! use gateway_check_adapters::noc::NocStatusProvider;
//! use gateway_check_adapters::{MetricSink, StatusProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = NocStatusProvider::builder().build()?;
//!     let sink = InfluxSink::builder()
//!         .host("localhost")
//!         .credentials("writer", "secret")
//!         .database("lora")
//!         .build()?;
//!
//!     let record = provider.fetch("B827EBFFFE000001").await?;
//!     sink.record_packet_count("rooftop", record.rx_count, 0, Utc::now()).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
mod memory;
mod provider;
mod sink;

#[cfg(feature = "noc")]
pub mod noc;

#[cfg(feature = "influxdb")]
pub mod influxdb;

#[cfg(all(test, any(feature = "noc", feature = "influxdb")))]
mod test_support;

pub use error::{BuildError, LookupError, WriteError};
pub use memory::MemorySink;
pub use provider::{legacy_id, StatusProvider};
pub use sink::{MetricSink, Point, DEVICE_TAG, PACKET_COUNT_MEASUREMENT, STATUS_MEASUREMENT};

// Re-export types for convenience
pub use gateway_check_types::{GatewayDescriptor, StatusRecord};
