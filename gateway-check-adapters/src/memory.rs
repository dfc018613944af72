//! In-memory sink.
//!
//! Keeps every point it is given. Used for dry runs, where nothing should
//! reach the time-series store, and in tests, where writes for chosen
//! gateways can be made to fail.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::sink::{Point, PACKET_COUNT_MEASUREMENT, STATUS_MEASUREMENT};
use crate::{MetricSink, WriteError};

/// Metric sink that records points in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    points: Mutex<Vec<Point>>,
    failing_status: Mutex<HashSet<String>>,
    failing_packet_count: Mutex<HashSet<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every status write for `gateway_id` fail.
    pub fn fail_status_for(&self, gateway_id: impl Into<String>) {
        self.failing_status.lock().insert(gateway_id.into());
    }

    /// Make every packet-count write for `gateway_id` fail.
    pub fn fail_packet_count_for(&self, gateway_id: impl Into<String>) {
        self.failing_packet_count.lock().insert(gateway_id.into());
    }

    /// All points written so far, in write order.
    pub fn points(&self) -> Vec<Point> {
        self.points.lock().clone()
    }

    /// Points written to the status measurement.
    pub fn status_points(&self) -> Vec<Point> {
        self.measurement(STATUS_MEASUREMENT)
    }

    /// Points written to the packet-count measurement.
    pub fn packet_count_points(&self) -> Vec<Point> {
        self.measurement(PACKET_COUNT_MEASUREMENT)
    }

    /// Remove and return every point written so far.
    pub fn drain(&self) -> Vec<Point> {
        std::mem::take(&mut *self.points.lock())
    }

    pub fn len(&self) -> usize {
        self.points.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.lock().is_empty()
    }

    fn measurement(&self, measurement: &str) -> Vec<Point> {
        self.points
            .lock()
            .iter()
            .filter(|p| p.measurement == measurement)
            .cloned()
            .collect()
    }

    fn push(&self, point: Point, failing: &Mutex<HashSet<String>>) -> Result<(), WriteError> {
        point.validate()?;
        if failing.lock().contains(&point.device_id) {
            return Err(WriteError::Unavailable(format!(
                "writes to {} for {} are configured to fail",
                point.measurement, point.device_id
            )));
        }
        self.points.lock().push(point);
        Ok(())
    }
}

#[async_trait]
impl MetricSink for MemorySink {
    async fn record_status(
        &self,
        gateway_id: &str,
        online: bool,
        at: DateTime<Utc>,
    ) -> Result<(), WriteError> {
        self.push(Point::status(gateway_id, online, at), &self.failing_status)
    }

    async fn record_packet_count(
        &self,
        gateway_id: &str,
        rx: u64,
        tx: u64,
        at: DateTime<Utc>,
    ) -> Result<(), WriteError> {
        self.push(
            Point::packet_count(gateway_id, rx, tx, at),
            &self.failing_packet_count,
        )
    }
}
