//! Counter metrics.
//!
//! Components receive an `Arc<dyn MetricsSink>` at construction and call
//! [`MetricsSink::increment`]; nothing touches process-wide counters. The
//! [`Recorder`] implementation keeps the counters in memory and renders them
//! in the Prometheus text exposition format for `GET /metrics`.

use dashmap::DashMap;
use std::fmt::Write;

/// Destination for counter increments.
pub trait MetricsSink: Send + Sync {
    fn increment(&self, name: &'static str, labels: &[(&'static str, &str)]);
}

pub const AUTH_SUCCESSES: &str = "auth_successes";
pub const AUTH_FAILURES: &str = "auth_failures";
pub const AUTH_INACTIVATIONS: &str = "auth_inactivations";
pub const HTTP_ERRORS: &str = "http_errors";
pub const CLIENT_GENERATIONS: &str = "oauth2_client_generations";
pub const TOKEN_GENERATIONS: &str = "oauth2_token_generations";

const DESCRIPTORS: &[(&str, &str)] = &[
    (AUTH_SUCCESSES, "Count of successful authorizations"),
    (AUTH_FAILURES, "Count of failed authorizations"),
    (AUTH_INACTIVATIONS, "Count of inactivated auths (i.e. user logout)"),
    (HTTP_ERRORS, "Count of how many 5xx errors we send out"),
    (CLIENT_GENERATIONS, "Count of OAuth2 clients created"),
    (TOKEN_GENERATIONS, "Count of OAuth2 access tokens created"),
];

/// In-memory counter registry.
#[derive(Debug, Default)]
pub struct Recorder {
    // (metric name, rendered label set) -> value
    counters: DashMap<(String, String), u64>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter series, zero if it was never incremented.
    pub fn get(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        self.counters
            .get(&(name.to_string(), render_labels(labels)))
            .map(|v| *v)
            .unwrap_or(0)
    }

    /// Render all counters in Prometheus text format.
    pub fn render(&self) -> String {
        let mut series: Vec<((String, String), u64)> = self
            .counters
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        series.sort();

        let mut out = String::new();
        for (name, help) in DESCRIPTORS {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            let mut any = false;
            for ((series_name, labels), value) in &series {
                if series_name == name {
                    let _ = writeln!(out, "{name}{labels} {value}");
                    any = true;
                }
            }
            if !any && !name.starts_with("auth_") {
                let _ = writeln!(out, "{name} 0");
            }
        }
        out
    }
}

impl MetricsSink for Recorder {
    fn increment(&self, name: &'static str, labels: &[(&'static str, &str)]) {
        *self
            .counters
            .entry((name.to_string(), render_labels(labels)))
            .or_insert(0) += 1;
    }
}

/// Sink that drops every increment.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn increment(&self, _name: &'static str, _labels: &[(&'static str, &str)]) {}
}

fn render_labels(labels: &[(&str, &str)]) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let mut sorted: Vec<_> = labels.to_vec();
    sorted.sort();
    let body: Vec<String> = sorted
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("{{{}}}", body.join(","))
}
