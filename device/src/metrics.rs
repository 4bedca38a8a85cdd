//! # Prometheus Metrics
//!
//! Counters for what the scanner saw and what the handoff did with it.
//! Rejections are silent on screen; this is where they show up. Scraped at
//! `/metrics` when `--metrics-port` is given.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] with
//! the `offpay` prefix.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Router;
use offpay_protocol::{BalanceAction, RejectReason, ScanOutcome};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use tower_http::trace::TraceLayer;

/// Metric handles for one device.
#[derive(Clone)]
pub struct DeviceMetrics {
    registry: Registry,
    /// Every frame handed to the dispatcher.
    pub frames_seen_total: IntCounter,
    /// Frames dropped because a scan was already in flight.
    pub frames_dropped_busy_total: IntCounter,
    /// Accepted transitions, by resulting step.
    pub transitions_total: IntCounterVec,
    /// Rejected frames, by reason.
    pub rejections_total: IntCounterVec,
    /// Results discarded because the session was replaced mid-scan.
    pub stale_results_total: IntCounter,
    /// Debits and credits requested by accepted transitions, by kind and by
    /// whether the wallet applied or refused them.
    pub wallet_mutations_total: IntCounterVec,
}

impl DeviceMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("offpay".into()), None)?;

        let frames_seen_total =
            IntCounter::new("frames_seen_total", "Frames submitted by the capture pipeline")?;
        registry.register(Box::new(frames_seen_total.clone()))?;

        let frames_dropped_busy_total = IntCounter::new(
            "frames_dropped_busy_total",
            "Frames dropped while a previous scan was being processed",
        )?;
        registry.register(Box::new(frames_dropped_busy_total.clone()))?;

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Accepted protocol transitions"),
            &["step"],
        )?;
        registry.register(Box::new(transitions_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("rejections_total", "Frames that produced no transition"),
            &["reason"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let stale_results_total = IntCounter::new(
            "stale_results_total",
            "Transitions discarded because the session was reset mid-scan",
        )?;
        registry.register(Box::new(stale_results_total.clone()))?;

        let wallet_mutations_total = IntCounterVec::new(
            Opts::new("wallet_mutations_total", "Balance mutations requested by the handoff"),
            &["kind", "result"],
        )?;
        registry.register(Box::new(wallet_mutations_total.clone()))?;

        // Zero series for every reason so dashboards see them before the
        // first rejection.
        for reason in RejectReason::ALL {
            rejections_total.with_label_values(&[reason.as_str()]);
        }

        Ok(Self {
            registry,
            frames_seen_total,
            frames_dropped_busy_total,
            transitions_total,
            rejections_total,
            stale_results_total,
            wallet_mutations_total,
        })
    }

    /// Counts one dispatcher outcome.
    pub fn record(&self, outcome: &ScanOutcome) {
        self.frames_seen_total.inc();
        match outcome {
            ScanOutcome::Busy => self.frames_dropped_busy_total.inc(),
            ScanOutcome::Stale => self.stale_results_total.inc(),
            ScanOutcome::Rejected(reason) => self
                .rejections_total
                .with_label_values(&[reason.as_str()])
                .inc(),
            ScanOutcome::Accepted {
                step,
                action,
                wallet_error,
                ..
            } => {
                self.transitions_total
                    .with_label_values(&[step.as_str()])
                    .inc();
                if let Some(action) = action {
                    let kind = match action {
                        BalanceAction::Debit(_) => "debit",
                        BalanceAction::Credit(_) => "credit",
                    };
                    let result = if wallet_error.is_some() { "failed" } else { "applied" };
                    self.wallet_mutations_total
                        .with_label_values(&[kind, result])
                        .inc();
                }
            }
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<DeviceMetrics>;

/// `/metrics` route with request tracing.
pub fn router(metrics: SharedMetrics) -> Router {
    Router::new()
        .route("/metrics", axum::routing::get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
