//! # gateway-check-types
//!
//! Core types shared by every part of gateway-check: what a gateway is, what
//! the remote lookup service tells us about it, how freshness is decided and
//! what a single check pass produces.
//!
//! ## Design Goals
//!
//! - **No I/O**: everything here is plain data or a pure function
//! - **Optional serialization**: enable the `serde` feature to (de)serialize outcomes and reports
//! - **UTC everywhere**: all instants are `DateTime<Utc>`; zone information is normalized, never dropped
//!
//! ## Example
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use gateway_check_types::{classify, Freshness, FreshnessWindow};
//!
//! let now = Utc::now();
//! let window = FreshnessWindow::default(); // 10 minutes
//!
//! assert_eq!(classify(now - Duration::minutes(5), now, window), Freshness::Online);
//! assert_eq!(classify(now - Duration::minutes(15), now, window), Freshness::Offline);
//! ```

mod freshness;
mod gateway;
mod outcome;

pub use freshness::*;
pub use gateway::*;
pub use outcome::*;
