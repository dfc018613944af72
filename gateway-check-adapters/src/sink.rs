//! The metric sink seam and the points it writes.
//!
//! Two measurement streams are written per gateway:
//!
//! | Measurement            | Tag         | Fields              |
//! |------------------------|-------------|---------------------|
//! | `gateways`             | `device_id` | `status` (0 or 1)   |
//! | `gateway_packet_count` | `device_id` | `rx`, `tx`          |
//!
//! `tx` is always written as 0: the NOC reports no transmit counter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::WriteError;

/// Measurement holding the online/offline status.
pub const STATUS_MEASUREMENT: &str = "gateways";

/// Measurement holding packet counters.
pub const PACKET_COUNT_MEASUREMENT: &str = "gateway_packet_count";

/// Tag identifying the gateway on every point.
pub const DEVICE_TAG: &str = "device_id";

/// Persists timestamped gateway samples.
///
/// Each call is an independent write. Nothing ties the status sample and the
/// packet-count sample of one gateway together, so one may be stored while
/// the other fails.
#[async_trait]
pub trait MetricSink: Send + Sync {
    /// Record whether `gateway_id` is online.
    async fn record_status(
        &self,
        gateway_id: &str,
        online: bool,
        at: DateTime<Utc>,
    ) -> Result<(), WriteError>;

    /// Record the packet counters of `gateway_id`.
    async fn record_packet_count(
        &self,
        gateway_id: &str,
        rx: u64,
        tx: u64,
        at: DateTime<Utc>,
    ) -> Result<(), WriteError>;
}

/// A single sample destined for a measurement stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Point {
    pub measurement: &'static str,
    pub device_id: String,
    pub fields: Vec<(&'static str, i64)>,
    pub at: DateTime<Utc>,
}

impl Point {
    /// A `gateways` point with `status` 1 (online) or 0 (offline).
    pub fn status(gateway_id: &str, online: bool, at: DateTime<Utc>) -> Self {
        Self {
            measurement: STATUS_MEASUREMENT,
            device_id: gateway_id.to_string(),
            fields: vec![("status", i64::from(online))],
            at,
        }
    }

    /// A `gateway_packet_count` point.
    pub fn packet_count(gateway_id: &str, rx: u64, tx: u64, at: DateTime<Utc>) -> Self {
        Self {
            measurement: PACKET_COUNT_MEASUREMENT,
            device_id: gateway_id.to_string(),
            fields: vec![("rx", saturating_i64(rx)), ("tx", saturating_i64(tx))],
            at,
        }
    }

    /// Value of the named field.
    pub fn field(&self, name: &str) -> Option<i64> {
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    /// Check that the point encodes to exactly one line.
    ///
    /// Line protocol has no escape for line breaks, so a tag value holding
    /// one would split the write into two points.
    pub fn validate(&self) -> Result<(), WriteError> {
        if self.device_id.is_empty() {
            return Err(WriteError::InvalidPoint(format!(
                "{} has an empty {}",
                self.measurement, DEVICE_TAG
            )));
        }
        if self.device_id.contains(['\n', '\r']) {
            return Err(WriteError::InvalidPoint(format!(
                "{} {:?} contains a line break",
                DEVICE_TAG, self.device_id
            )));
        }
        Ok(())
    }

    /// Encode as one line of InfluxDB line protocol with nanosecond precision.
    ///
    /// ```rust
    /// use chrono::{TimeZone, Utc};
    /// use gateway_check_adapters::Point;
    ///
    /// let at = Utc.timestamp_opt(1_551_441_600, 0).unwrap();
    /// let point = Point::packet_count("roof top", 42, 0, at);
    /// assert_eq!(
    ///     point.to_line_protocol(),
    ///     "gateway_packet_count,device_id=roof\\ top rx=42i,tx=0i 1551441600000000000"
    /// );
    /// ```
    pub fn to_line_protocol(&self) -> String {
        let fields = self
            .fields
            .iter()
            .map(|(name, value)| format!("{}={}i", name, value))
            .collect::<Vec<_>>()
            .join(",");

        let mut line = format!(
            "{},{}={} {}",
            self.measurement,
            DEVICE_TAG,
            escape_tag(&self.device_id),
            fields
        );

        // Instants outside the i64 nanosecond range are left to the server clock.
        if let Some(nanos) = self.at.timestamp_nanos_opt() {
            line.push(' ');
            line.push_str(&nanos.to_string());
        }

        line
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Escape a tag value for line protocol: backslashes, commas, equals signs and spaces.
fn escape_tag(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | ',' | '=' | ' ') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_status_point() {
        let online = Point::status("gw-1", true, at());
        assert_eq!(online.measurement, STATUS_MEASUREMENT);
        assert_eq!(online.field("status"), Some(1));

        let offline = Point::status("gw-1", false, at());
        assert_eq!(offline.field("status"), Some(0));
        assert_eq!(
            offline.to_line_protocol(),
            "gateways,device_id=gw-1 status=0i 1551441600000000000"
        );
    }

    #[test]
    fn test_packet_count_point() {
        let point = Point::packet_count("gw-1", 42, 0, at());
        assert_eq!(point.measurement, PACKET_COUNT_MEASUREMENT);
        assert_eq!(point.field("rx"), Some(42));
        assert_eq!(point.field("tx"), Some(0));
        assert_eq!(point.field("missing"), None);
    }

    #[test]
    fn test_packet_count_saturates() {
        let point = Point::packet_count("gw-1", u64::MAX, 0, at());
        assert_eq!(point.field("rx"), Some(i64::MAX));
    }

    #[test]
    fn test_escape_tag() {
        assert_eq!(escape_tag("plain"), "plain");
        assert_eq!(escape_tag("a b,c=d"), "a\\ b\\,c\\=d");
        assert_eq!(escape_tag("roof\\"), "roof\\\\");
    }

    #[test]
    fn test_trailing_backslash_keeps_field_separator() {
        let line = Point::status("roof\\", false, at()).to_line_protocol();
        assert_eq!(line, "gateways,device_id=roof\\\\ status=0i 1551441600000000000");
    }

    #[test]
    fn test_validate_rejects_line_breaks() {
        let point = Point::status("roof\ngateways,device_id=evil status=1i", false, at());
        assert!(matches!(point.validate(), Err(WriteError::InvalidPoint(_))));
        assert!(Point::status("roof\rtop", true, at()).validate().is_err());
        assert!(Point::status("", true, at()).validate().is_err());
        assert!(Point::status("roof top,a=b\\", true, at()).validate().is_ok());
    }
}
