//! # gateway-check
//!
//! Checks whether the LoRaWAN gateways in a local inventory are still
//! reporting to The Things Network NOC, and records the result in InfluxDB.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌────────────────┐   ┌────────────┐
//! │  inventory   │──▶│   runner    │──▶│ StatusProvider │   │ MetricSink │
//! │ (directory)  │   │ (per gw)    │   │  (TTN NOC)     │   │ (InfluxDB) │
//! └──────────────┘   └──────┬──────┘   └────────────────┘   └─────▲──────┘
//!                           │      classify(last seen, now, window) │
//!                           └───────────────────────────────────────┘
//! ```
//!
//! - **[`inventory`]**: the [`InventorySource`] trait and the directory-backed
//!   [`DirectoryInventory`]
//! - **[`runner`]**: [`CheckRunner`], which checks every gateway independently
//!   with bounded concurrency and returns a [`RunReport`]
//! - **[`config`]**: [`Settings`] loaded from a file plus environment overrides
//! - **[`duration`]**: human-friendly durations such as `10m` or `250ms`
//!
//! The adapters live in `gateway-check-adapters` and the data model in
//! `gateway-check-types`.
//!
//! ## Usage
//!
//! ```bash
//! gateway-check --config gateway-check.toml --inventory /etc/gateways
//!
//! # Check every five minutes, write nothing, keep the last report
//! gateway-check --config gateway-check.toml --inventory /etc/gateways \
//!     --interval 5m --dry-run --report last-run.json
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use gateway_check::{CheckRunner, DirectoryInventory, InventorySource};
//! use gateway_check_adapters::noc::NocStatusProvider;
//! use gateway_check_adapters::MemorySink;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let gateways = DirectoryInventory::new("/etc/gateways").load().into_gateways();
//! let runner = CheckRunner::new(
//!     Arc::new(NocStatusProvider::builder().build()?),
//!     Arc::new(MemorySink::new()),
//! );
//!
//! let report = runner.run(&gateways, &CancellationToken::new()).await;
//! println!("{} online, {} offline", report.online(), report.offline());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod duration;
pub mod inventory;
pub mod runner;

// Re-export main types for convenience
pub use config::{ConfigError, Settings};
pub use inventory::{DirectoryInventory, InventoryLoad, InventoryLoadError, InventorySource};
pub use runner::{CheckRunner, Clock, TX_COUNT};
pub use gateway_check_types::{CheckOutcome, FailureKind, Freshness, FreshnessWindow, RunReport};
