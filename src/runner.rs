//! Check runner.
//!
//! Runs one pass over the inventory: for every gateway, look up its status,
//! classify it and write the two samples. Each gateway is checked on its own;
//! a failure is recorded in that gateway's outcome and never stops the pass.
//!
//! Gateways are checked by a bounded pool. Outcomes come back in inventory
//! order whatever the completion order.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use gateway_check_adapters::{MetricSink, StatusProvider};
use gateway_check_types::{
    classify, CheckFailure, CheckOutcome, CheckState, FailureKind, FreshnessWindow,
    GatewayDescriptor, RunReport,
};
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument, Span};

/// Transmit count written with every packet-count sample. The lookup service
/// does not report one.
pub const TX_COUNT: u64 = 0;

/// Default number of gateways checked at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Source of "now" for classification and sample timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Runs check passes against a status provider and a metric sink.
pub struct CheckRunner {
    provider: Arc<dyn StatusProvider>,
    sink: Arc<dyn MetricSink>,
    window: FreshnessWindow,
    concurrency: usize,
    deadline: Option<Duration>,
    clock: Clock,
    span: Span,
}

impl CheckRunner {
    pub fn new(provider: Arc<dyn StatusProvider>, sink: Arc<dyn MetricSink>) -> Self {
        Self {
            provider,
            sink,
            window: FreshnessWindow::default(),
            concurrency: DEFAULT_CONCURRENCY,
            deadline: None,
            clock: Arc::new(Utc::now),
            span: Span::none(),
        }
    }

    /// Set the freshness window.
    pub fn with_window(mut self, window: impl Into<FreshnessWindow>) -> Self {
        self.window = window.into();
        self
    }

    /// Set how many gateways are checked at once. Values below 1 are raised to 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Abandon checks still unfinished this long after a pass starts.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Replace the wall clock.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Span every pass and gateway check is recorded under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn window(&self) -> FreshnessWindow {
        self.window
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Check every gateway once.
    ///
    /// Returns exactly one outcome per gateway, in the order given. Once
    /// `cancel` fires or the deadline passes, unfinished checks are reported
    /// as failed; samples already written stay written.
    pub async fn run(&self, gateways: &[GatewayDescriptor], cancel: &CancellationToken) -> RunReport {
        let started_at = (self.clock)();
        let deadline = self.deadline.map(|d| Instant::now() + d);

        info!(
            parent: &self.span,
            gateways = gateways.len(),
            concurrency = self.concurrency,
            window_secs = self.window.as_duration().as_secs(),
            "Starting check pass"
        );

        // Slots refill as soon as any check finishes; order is restored after.
        let mut indexed = stream::iter(gateways.iter().enumerate())
            .map(|(index, gateway)| async move {
                (index, self.check_bounded(gateway, cancel, deadline).await)
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .instrument(self.span.clone())
            .await;
        indexed.sort_unstable_by_key(|(index, _)| *index);
        let outcomes = indexed.into_iter().map(|(_, outcome)| outcome).collect();

        let report = RunReport::new(started_at, (self.clock)(), outcomes);
        info!(
            parent: &self.span,
            recorded = report.recorded(),
            failed = report.failed(),
            online = report.online(),
            offline = report.offline(),
            "Check pass finished"
        );
        report
    }

    /// Run one check, giving up when the pass is cancelled or out of time.
    async fn check_bounded(
        &self,
        gateway: &GatewayDescriptor,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> CheckOutcome {
        let span = info_span!(
            parent: &self.span,
            "gateway",
            gateway = %gateway.name,
            remote_id = %gateway.remote_id
        );
        let progress = Mutex::new(CheckState::Pending);

        let outcome = async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => CheckOutcome::failed(
                    gateway.clone(),
                    CheckFailure::new(FailureKind::Cancelled, *progress.lock(), "check pass was cancelled"),
                ),
                _ = expire(deadline) => CheckOutcome::failed(
                    gateway.clone(),
                    CheckFailure::new(FailureKind::DeadlineExceeded, *progress.lock(), "check pass deadline exceeded"),
                ),
                outcome = self.check(gateway, &progress) => outcome,
            }
        }
        .instrument(span.clone())
        .await;

        match &outcome {
            CheckOutcome::Recorded {
                freshness, rx_count, ..
            } => info!(parent: &span, status = freshness.label(), rx = rx_count, "Gateway recorded"),
            CheckOutcome::Failed { failure, .. } => error!(
                parent: &span,
                kind = %failure.kind,
                reached = ?failure.reached,
                error = %failure.message,
                "Gateway check failed"
            ),
        }
        outcome
    }

    /// Look up, classify and record a single gateway, tracking progress.
    async fn check(&self, gateway: &GatewayDescriptor, progress: &Mutex<CheckState>) -> CheckOutcome {
        let fail = |kind: FailureKind, message: String| {
            CheckOutcome::failed(
                gateway.clone(),
                CheckFailure::new(kind, *progress.lock(), message),
            )
        };

        let record = match self.provider.fetch(&gateway.remote_id).await {
            Ok(record) => record,
            Err(e) => return fail(FailureKind::Lookup, e.to_string()),
        };
        *progress.lock() = CheckState::LookedUp;

        let now = (self.clock)();
        let freshness = classify(record.remote_timestamp, now, self.window);
        *progress.lock() = CheckState::Classified;
        debug!(
            last_seen = %record.remote_timestamp,
            now = %now,
            status = freshness.label(),
            "Classified gateway"
        );

        if let Err(e) = self
            .sink
            .record_status(&gateway.name, freshness.is_online(), now)
            .await
        {
            return fail(FailureKind::StatusWrite, e.to_string());
        }

        if let Err(e) = self
            .sink
            .record_packet_count(&gateway.name, record.rx_count, TX_COUNT, now)
            .await
        {
            return fail(FailureKind::PacketCountWrite, e.to_string());
        }

        *progress.lock() = CheckState::Recorded;
        CheckOutcome::recorded(gateway.clone(), freshness, record.rx_count)
    }
}

impl std::fmt::Debug for CheckRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckRunner")
            .field("window", &self.window)
            .field("concurrency", &self.concurrency)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

/// Resolves at `deadline`, or never when there is none.
async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}


/// Passes run against the HTTP status provider, served by a local server.
#[cfg(test)]
mod noc_tests {
    use super::*;
    use std::convert::Infallible;

    use chrono::TimeZone;
    use gateway_check_adapters::noc::NocStatusProvider;
    use gateway_check_adapters::MemorySink;
    use gateway_check_types::Freshness;
    use http_body_util::Full;
    use hyper::body::{Bytes, Incoming};
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use tokio::net::TcpListener;

    type Routes = Arc<dyn Fn(&str) -> (StatusCode, String) + Send + Sync>;

    /// Serve `routes` on a local port, recording every requested path.
    async fn serve(routes: Routes) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let paths = Arc::new(Mutex::new(Vec::new()));

        let seen = paths.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let routes = routes.clone();
                let seen = seen.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let path = req.uri().path().to_string();
                        let (status, body) = routes(&path);
                        seen.lock().push(path);
                        async move {
                            Ok::<_, Infallible>(
                                Response::builder()
                                    .status(status)
                                    .header("Content-Type", "application/json")
                                    .body(Full::new(Bytes::from(body)))
                                    .unwrap(),
                            )
                        }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        (base, paths)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 3, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_legacy_id_fallback_records_samples() {
        let (base, paths) = serve(Arc::new(|path: &str| match path {
            "/api/v2/gateways/eui-aa:bb" => (
                StatusCode::OK,
                r#"{"timestamp": "2019-03-01T11:55:00Z", "rx_ok": 42}"#.to_string(),
            ),
            _ => (StatusCode::NOT_FOUND, String::new()),
        }))
        .await;

        let provider = NocStatusProvider::builder()
            .endpoint(format!("{}/api/v2/gateways", base))
            .build()
            .unwrap();
        let sink = Arc::new(MemorySink::new());
        let gateway = GatewayDescriptor::new("rooftop", "AA:BB");

        let report = CheckRunner::new(Arc::new(provider), sink.clone())
            .with_clock(Arc::new(now))
            .run(std::slice::from_ref(&gateway), &CancellationToken::new())
            .await;

        assert_eq!(
            report.outcomes,
            vec![CheckOutcome::recorded(gateway, Freshness::Online, 42)]
        );
        assert_eq!(
            *paths.lock(),
            vec!["/api/v2/gateways/AA:BB", "/api/v2/gateways/eui-aa:bb"]
        );

        let status = sink.status_points();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].device_id, "rooftop");
        assert_eq!(status[0].field("status"), Some(1));
        assert_eq!(status[0].at, now());

        let packets = sink.packet_count_points();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].field("rx"), Some(42));
        assert_eq!(packets[0].field("tx"), Some(0));
    }

    #[tokio::test]
    async fn test_unknown_gateway_writes_nothing() {
        let (base, paths) = serve(Arc::new(|_: &str| (StatusCode::NOT_FOUND, String::new()))).await;

        let provider = NocStatusProvider::builder()
            .endpoint(format!("{}/api/v2/gateways", base))
            .build()
            .unwrap();
        let sink = Arc::new(MemorySink::new());

        let report = CheckRunner::new(Arc::new(provider), sink.clone())
            .with_clock(Arc::new(now))
            .run(&[GatewayDescriptor::new("ghost", "CC:DD")], &CancellationToken::new())
            .await;

        let failure = report.outcomes[0].failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Lookup);
        assert_eq!(paths.lock().len(), 2);
        assert!(sink.is_empty());
    }
}
