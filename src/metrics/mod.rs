//! Prometheus metrics for lineup generation and buffer maintenance
//!
//! This module provides metrics tracking for:
//! - Generation: items generated per type, generation duration, degradations
//! - Maintenance: per-schedule outcomes of buffer maintenance passes
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, or it is never called, metrics operations are
//! no-ops.

use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for generation metrics
struct GenerationMetrics {
    items_generated: CounterVec,
    generation_duration: HistogramVec,
    degradations: CounterVec,
}

/// Container for buffer-maintenance metrics
struct MaintenanceMetrics {
    outcomes: CounterVec,
    last_pass_schedules: Gauge,
}

static GENERATION_METRICS: OnceLock<GenerationMetrics> = OnceLock::new();

static MAINTENANCE_METRICS: OnceLock<MaintenanceMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// If metric registration fails, the error is returned and subsequent
/// metric operations become no-ops.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = lineup::metrics::init_metrics() {
///     tracing::warn!("Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // Prevent double initialization
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let generation = GenerationMetrics {
        items_generated: register_counter_vec!(
            "lineup_items_generated_total",
            "Total schedule items generated by item type",
            &["item_type"]
        )?,
        generation_duration: register_histogram_vec!(
            "lineup_generation_duration_seconds",
            "Time spent generating a schedule window in seconds",
            &["mode"],
            vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
        )?,
        degradations: register_counter_vec!(
            "lineup_degradations_total",
            "Pools degraded to flex or empty results instead of failing",
            &["reason"]
        )?,
    };

    let maintenance = MaintenanceMetrics {
        outcomes: register_counter_vec!(
            "lineup_maintenance_outcomes_total",
            "Buffer maintenance outcomes per schedule",
            &["outcome"]
        )?,
        last_pass_schedules: register_gauge!(
            "lineup_maintenance_last_pass_schedules",
            "Number of schedules scanned by the most recent maintenance pass"
        )?,
    };

    GENERATION_METRICS
        .set(generation)
        .map_err(|_| "Generation metrics already initialized")?;
    MAINTENANCE_METRICS
        .set(maintenance)
        .map_err(|_| "Maintenance metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    GENERATION_METRICS.get().is_some() && MAINTENANCE_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record generated items of one type
pub fn record_items_generated(item_type: &str, count: usize) {
    if count == 0 {
        return;
    }
    if let Some(m) = GENERATION_METRICS.get() {
        m.items_generated
            .with_label_values(&[item_type])
            .inc_by(count as f64);
    }
}

/// Record a pool that was degraded instead of failing generation
pub fn record_degradation(reason: &str) {
    if let Some(m) = GENERATION_METRICS.get() {
        m.degradations.with_label_values(&[reason]).inc();
    }
}

/// Record one maintenance outcome (`extended`, `skipped`, `in_flight`, `failed`)
pub fn record_maintenance_outcome(outcome: &str) {
    if let Some(m) = MAINTENANCE_METRICS.get() {
        m.outcomes.with_label_values(&[outcome]).inc();
    }
}

/// Record how many schedules the last maintenance pass looked at
pub fn record_maintenance_pass(schedules: usize) {
    if let Some(m) = MAINTENANCE_METRICS.get() {
        m.last_pass_schedules.set(schedules as f64);
    }
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a generation timer; `mode` names the caller (`commit`, `preview`, `regenerate`, `replay`)
pub fn start_generation_timer(mode: &str) -> MetricsTimer {
    match GENERATION_METRICS.get() {
        Some(m) => MetricsTimer::new(
            m.generation_duration
                .with_label_values(&[mode])
                .start_timer(),
        ),
        None => MetricsTimer::noop(),
    }
}

// ============================================================================
// Tests
// ============================================================================
