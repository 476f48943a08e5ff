//! Serving counters and their Prometheus text rendering

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct ServingMetrics {
    predictions: AtomicU64,
    drift_detected: AtomicU64,
    drift_indeterminate: AtomicU64,
    errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub predictions: u64,
    pub drift_detected: u64,
    pub drift_indeterminate: u64,
    pub errors: u64,
}

impl ServingMetrics {
    pub fn record_prediction(&self) {
        self.predictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drift(&self) {
        self.drift_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_indeterminate(&self) {
        self.drift_indeterminate.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            predictions: self.predictions.load(Ordering::Relaxed),
            drift_detected: self.drift_detected.load(Ordering::Relaxed),
            drift_indeterminate: self.drift_indeterminate.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Prometheus text exposition format 0.0.4
    pub fn render_prometheus(&self, model_loaded: bool) -> String {
        let mut out = String::new();

        let counters = [
            ("prediction_count_total", "Predictions served", self.predictions),
            ("drift_count_total", "Requests flagged as drifted", self.drift_detected),
            (
                "drift_check_indeterminate_total",
                "Drift checks that produced no verdict",
                self.drift_indeterminate,
            ),
            ("prediction_errors_total", "Failed prediction requests", self.errors),
        ];

        for (name, help, value) in counters {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} counter", name);
            let _ = writeln!(out, "{} {}", name, value);
        }

        let _ = writeln!(out, "# HELP model_loaded Whether the inference bundle is ready");
        let _ = writeln!(out, "# TYPE model_loaded gauge");
        let _ = writeln!(out, "model_loaded {}", u8::from(model_loaded));

        out
    }
}
