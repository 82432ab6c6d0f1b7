// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process counters and gauges exported in Prometheus text format.
//!
//! A series is identified by its family name plus labels, e.g.
//! `security_decisions_total{chain="api",outcome="allow"}`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;

const NAMESPACE: &str = "todolist";

pub struct MetricsRegistry {
    counters: RwLock<BTreeMap<String, Arc<AtomicU64>>>,
    gauges: RwLock<BTreeMap<String, Arc<AtomicU64>>>,
    start_time: Instant,
}

/// Render `name{k="v",...}`; labels keep the order given.
pub fn series(name: &str, labels: &[(&str, &str)]) -> String {
    if labels.is_empty() {
        return name.to_string();
    }
    let rendered: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("{name}{{{}}}", rendered.join(","))
}

fn family(series: &str) -> &str {
    series.split('{').next().unwrap_or(series)
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(BTreeMap::new()),
            gauges: RwLock::new(BTreeMap::new()),
            start_time: Instant::now(),
        }
    }

    pub async fn inc_counter(&self, name: &str, labels: &[(&str, &str)]) {
        let key = series(name, labels);
        let counters = self.counters.read().await;
        if let Some(counter) = counters.get(&key) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        drop(counters);

        let mut counters = self.counters.write().await;
        counters
            .entry(key)
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub async fn set_gauge(&self, name: &str, labels: &[(&str, &str)], value: u64) {
        let key = series(name, labels);
        let gauges = self.gauges.read().await;
        if let Some(gauge) = gauges.get(&key) {
            gauge.store(value, Ordering::Relaxed);
            return;
        }
        drop(gauges);

        let mut gauges = self.gauges.write().await;
        gauges.insert(key, Arc::new(AtomicU64::new(value)));
    }

    pub async fn get_counter(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        self.counters
            .read()
            .await
            .get(&series(name, labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export every series in Prometheus text exposition format.
    pub async fn to_prometheus(&self) -> String {
        let mut output = String::new();

        let _ = writeln!(output, "# HELP {NAMESPACE}_uptime_seconds Time since service start");
        let _ = writeln!(output, "# TYPE {NAMESPACE}_uptime_seconds gauge");
        let _ = writeln!(output, "{NAMESPACE}_uptime_seconds {}", self.uptime_seconds());

        render(&mut output, &*self.counters.read().await, "counter");
        render(&mut output, &*self.gauges.read().await, "gauge");
        output
    }
}

fn render(output: &mut String, values: &BTreeMap<String, Arc<AtomicU64>>, kind: &str) {
    let mut typed = BTreeSet::new();
    for (key, value) in values {
        let name = family(key);
        if typed.insert(name) {
            let _ = writeln!(output, "# TYPE {name} {kind}");
        }
        let _ = writeln!(output, "{key} {}", value.load(Ordering::Relaxed));
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_per_label_set() {
        let registry = MetricsRegistry::new();
        let allow = [("chain", "api"), ("outcome", "allow")];
        let reject = [("chain", "api"), ("outcome", "reject")];

        registry.inc_counter("security_decisions_total", &allow).await;
        registry.inc_counter("security_decisions_total", &allow).await;
        registry.inc_counter("security_decisions_total", &reject).await;

        assert_eq!(registry.get_counter("security_decisions_total", &allow).await, 2);
        assert_eq!(registry.get_counter("security_decisions_total", &reject).await, 1);
        assert_eq!(registry.get_counter("unknown_total", &[]).await, 0);
    }

    #[tokio::test]
    async fn prometheus_format_types_each_family_once() {
        let registry = MetricsRegistry::new();
        registry
            .inc_counter("security_decisions_total", &[("outcome", "allow")])
            .await;
        registry
            .inc_counter("security_decisions_total", &[("outcome", "reject")])
            .await;
        registry.set_gauge("todo_items", &[], 3).await;

        let text = registry.to_prometheus().await;
        assert!(text.contains("todolist_uptime_seconds "));
        assert_eq!(text.matches("# TYPE security_decisions_total counter").count(), 1);
        assert!(text.contains("security_decisions_total{outcome=\"allow\"} 1"));
        assert!(text.contains("security_decisions_total{outcome=\"reject\"} 1"));
        assert!(text.contains("# TYPE todo_items gauge\ntodo_items 3"));
    }

    #[test]
    fn escapes_label_values() {
        assert_eq!(series("x", &[("p", "a\"b")]), "x{p=\"a\\\"b\"}");
    }
}
