// Prometheus metrics definitions for the bot.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Teams currently locked by an operator.
    pub static ref ACTIVE_PANEL_SESSIONS: IntGauge = IntGauge::new(
        "towermaiden_active_panel_sessions",
        "Scoring sessions currently held",
    )
    .unwrap();

    /// Register/team confirmations awaiting an answer.
    pub static ref PENDING_CONFIRMATIONS: IntGauge = IntGauge::new(
        "towermaiden_pending_confirmations",
        "Confirmation prompts awaiting an answer",
    )
    .unwrap();

    pub static ref ACTIVE_WIZARDS: IntGauge =
        IntGauge::new("towermaiden_active_wizards", "Setup wizards in progress").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Interactions received, by kind (command, component, modal, autocomplete).
    pub static ref INTERACTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("towermaiden_interactions_total", "Interactions received"),
        &["kind"],
    )
    .unwrap();

    pub static ref STORE_WRITES_TOTAL: IntCounter = IntCounter::new(
        "towermaiden_store_writes_total",
        "Aggregate rewrites committed to disk",
    )
    .unwrap();

    /// Reads or writes that failed on I/O or parsing.
    pub static ref STORE_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "towermaiden_store_failures_total",
        "Store operations that failed on I/O or parsing",
    )
    .unwrap();

    /// Point catalog buttons applied, by group.
    pub static ref POINT_CHANGES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("towermaiden_point_changes_total", "Point changes applied"),
        &["group"],
    )
    .unwrap();

    /// Flows dropped on timeout, by flow (confirmation, wizard, panel).
    pub static ref EXPIRED_FLOWS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("towermaiden_expired_flows_total", "Interactive flows that timed out"),
        &["flow"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    pub static ref INTERACTION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "towermaiden_interaction_duration_seconds",
            "Time to answer an interaction",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 3.0]),
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Safe to call more than once.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(ACTIVE_PANEL_SESSIONS.clone()),
        Box::new(PENDING_CONFIRMATIONS.clone()),
        Box::new(ACTIVE_WIZARDS.clone()),
        Box::new(INTERACTIONS_TOTAL.clone()),
        Box::new(STORE_WRITES_TOTAL.clone()),
        Box::new(STORE_FAILURES_TOTAL.clone()),
        Box::new(POINT_CHANGES_TOTAL.clone()),
        Box::new(EXPIRED_FLOWS_TOTAL.clone()),
        Box::new(INTERACTION_DURATION_SECONDS.clone()),
    ];

    for c in collectors {
        match REGISTRY.register(c) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => tracing::warn!("Failed to register metric: {e}"),
        }
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
